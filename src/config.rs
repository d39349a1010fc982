use crate::constants::defaults;
use crate::error::{AnomalyError, Result};

/// Engine configuration surface.
///
/// Defaults are suitable for local development; production deployments
/// override through environment variables. Sender/recipient settings are
/// deliberately not validated here — escalation notification treats
/// missing mail configuration as a hard error at send time, so a process
/// that never escalates can run without it.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// Scheduler tick interval in seconds
    pub scan_interval_seconds: u64,
    /// Whether the escalation notifier attempts delivery at all
    pub notify_enabled: bool,
    /// Sender address stamped on escalation alerts
    pub mail_from: String,
    /// Recipient addresses for escalation alerts
    pub mail_recipients: Vec<String>,
    /// Upper bound on candidates fetched per type per tick
    pub candidate_batch_limit: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: "postgresql://localhost/anomaly_core_development".to_string(),
            max_connections: 10,
            scan_interval_seconds: defaults::SCAN_INTERVAL_SECONDS,
            notify_enabled: true,
            mail_from: String::new(),
            mail_recipients: Vec::new(),
            candidate_batch_limit: defaults::CANDIDATE_BATCH_LIMIT,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(db_url) = std::env::var("ANOMALY_DATABASE_URL") {
            config.database_url = db_url;
        } else if let Ok(db_url) = std::env::var("DATABASE_URL") {
            config.database_url = db_url;
        }

        if let Ok(max_connections) = std::env::var("ANOMALY_MAX_CONNECTIONS") {
            config.max_connections = max_connections.parse().map_err(|e| {
                AnomalyError::ConfigurationError(format!("Invalid max_connections: {e}"))
            })?;
        }

        if let Ok(interval) = std::env::var("ANOMALY_SCAN_INTERVAL_SECONDS") {
            config.scan_interval_seconds = interval.parse().map_err(|e| {
                AnomalyError::ConfigurationError(format!("Invalid scan_interval_seconds: {e}"))
            })?;
        }

        if let Ok(enabled) = std::env::var("ANOMALY_NOTIFY_ENABLED") {
            config.notify_enabled = enabled.parse().map_err(|e| {
                AnomalyError::ConfigurationError(format!("Invalid notify_enabled: {e}"))
            })?;
        }

        if let Ok(mail_from) = std::env::var("ANOMALY_MAIL_FROM") {
            config.mail_from = mail_from;
        }

        if let Ok(recipients) = std::env::var("ANOMALY_MAIL_RECIPIENTS") {
            config.mail_recipients = recipients
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan_interval_seconds == 0 {
            return Err(AnomalyError::ConfigurationError(
                "scan_interval_seconds must be greater than zero".to_string(),
            ));
        }
        if self.candidate_batch_limit <= 0 {
            return Err(AnomalyError::ConfigurationError(
                "candidate_batch_limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scan_interval_seconds, 60);
        assert!(config.notify_enabled);
        assert!(config.mail_recipients.is_empty());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = EngineConfig {
            scan_interval_seconds: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_nonpositive_batch_limit_rejected() {
        let config = EngineConfig {
            candidate_batch_limit: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
