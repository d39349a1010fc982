use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum AnomalyError {
    DatabaseError(String),
    RegistrationError(String),
    SchedulerError(String),
    NotificationError(String),
    ValidationError(String),
    ConfigurationError(String),
    /// Raised by the user guard when an open anomaly blocks a new operation.
    /// This is the only error surfaced synchronously to calling business code.
    OperationUnavailable(String),
}

impl fmt::Display for AnomalyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnomalyError::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            AnomalyError::RegistrationError(msg) => write!(f, "Registration error: {msg}"),
            AnomalyError::SchedulerError(msg) => write!(f, "Scheduler error: {msg}"),
            AnomalyError::NotificationError(msg) => write!(f, "Notification error: {msg}"),
            AnomalyError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            AnomalyError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
            AnomalyError::OperationUnavailable(msg) => {
                write!(f, "Operation temporarily unavailable: {msg}")
            }
        }
    }
}

impl std::error::Error for AnomalyError {}

impl From<sqlx::Error> for AnomalyError {
    fn from(err: sqlx::Error) -> Self {
        AnomalyError::DatabaseError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnomalyError>;
