//! # Anomaly Type Descriptor
//!
//! Static per-business-type configuration: which table backs the type, which
//! columns carry its identity/owner/status, what the success and failure
//! status values are, and the retry/escalation thresholds.
//!
//! Every identifier that will ever be interpolated into SQL text is
//! whitelisted here, once, at construction time. Downstream query builders
//! trust descriptor fields and bind all *values* as parameters.

use crate::error::{AnomalyError, Result};
use serde::{Deserialize, Serialize};

/// Cast token for writing bound text parameters into business columns
/// (status value on escalation resolution, owner value on marking).
/// Resolved from `information_schema.columns` at registration time so the
/// engine supports integer- and text-typed columns without ever
/// interpolating caller input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    #[default]
    Text,
    SmallInt,
    Integer,
    BigInt,
    Numeric,
}

impl ColumnType {
    /// SQL cast suffix applied to a bound text parameter on assignment.
    pub fn cast_token(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::SmallInt => "int2",
            Self::Integer => "int4",
            Self::BigInt => "int8",
            Self::Numeric => "numeric",
        }
    }

    /// Map a Postgres `information_schema.columns.data_type` value.
    pub fn from_data_type(data_type: &str) -> Self {
        match data_type {
            "smallint" => Self::SmallInt,
            "integer" => Self::Integer,
            "bigint" => Self::BigInt,
            "numeric" => Self::Numeric,
            _ => Self::Text,
        }
    }
}

/// Immutable configuration for one registered business type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyTypeDescriptor {
    /// Human-readable business label used in logs and alerts
    pub label: String,
    /// Backing table holding the business records plus tracking columns
    pub table: String,
    /// Primary-key column of the backing table
    pub id_column: String,
    /// Column carrying the user/owner identity
    pub user_column: String,
    /// Business status column inspected for self-healing
    pub status_column: String,
    /// Value of `status_column` when the business operation succeeded
    pub status_success_value: String,
    /// Value of `status_column` when the business operation failed
    pub status_failure_value: String,
    /// Minimum interval between automatic retries, in seconds
    pub min_retry_interval_secs: i64,
    /// Window after which a still-open anomaly must escalate, in seconds
    pub timeout_secs: i64,
    /// Maximum automatic retry attempts before escalation
    pub max_retry_count: i32,
    /// Configured human-remind interval, in seconds
    pub manual_remind_interval_secs: i64,
    /// Manual-completion callback path, e.g. `/anomaly/payout/complete`
    pub manual_completion_path: String,
}

impl AnomalyTypeDescriptor {
    /// Registry key: the backing-table identity.
    pub fn type_key(&self) -> &str {
        &self.table
    }

    /// Validate every field that participates in SQL text or routing.
    ///
    /// Rejected descriptors are never registered, so all downstream query
    /// construction can interpolate `table`/`*_column` without re-checking.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("table", &self.table),
            ("id_column", &self.id_column),
            ("user_column", &self.user_column),
            ("status_column", &self.status_column),
        ] {
            if !is_safe_identifier(value) {
                return Err(AnomalyError::ValidationError(format!(
                    "descriptor '{}': {} '{}' is not a valid SQL identifier",
                    self.label, field, value
                )));
            }
        }

        if self.label.trim().is_empty() {
            return Err(AnomalyError::ValidationError(
                "descriptor label must not be empty".to_string(),
            ));
        }

        if self.status_success_value == self.status_failure_value {
            return Err(AnomalyError::ValidationError(format!(
                "descriptor '{}': success and failure status values are identical",
                self.label
            )));
        }

        if self.min_retry_interval_secs <= 0
            || self.timeout_secs <= 0
            || self.manual_remind_interval_secs <= 0
        {
            return Err(AnomalyError::ValidationError(format!(
                "descriptor '{}': intervals and timeout must be positive",
                self.label
            )));
        }

        if self.max_retry_count < 0 {
            return Err(AnomalyError::ValidationError(format!(
                "descriptor '{}': max_retry_count must be >= 0",
                self.label
            )));
        }

        if !self.manual_completion_path.starts_with('/')
            || self.manual_completion_path.len() < 2
        {
            return Err(AnomalyError::ValidationError(format!(
                "descriptor '{}': manual completion path '{}' must start with '/'",
                self.label, self.manual_completion_path
            )));
        }

        Ok(())
    }
}

/// Whitelist check for table/column identifiers: lowercase snake_case,
/// starting with a letter or underscore.
pub fn is_safe_identifier(ident: &str) -> bool {
    if ident.is_empty() || ident.len() > 63 {
        return false;
    }
    let mut chars = ident.chars();
    let first = chars.next().unwrap_or('0');
    if !(first.is_ascii_lowercase() || first == '_') {
        return false;
    }
    ident
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payout_descriptor() -> AnomalyTypeDescriptor {
        AnomalyTypeDescriptor {
            label: "payout".to_string(),
            table: "payout_orders".to_string(),
            id_column: "id".to_string(),
            user_column: "user_id".to_string(),
            status_column: "payout_status".to_string(),
            status_success_value: "2".to_string(),
            status_failure_value: "3".to_string(),
            min_retry_interval_secs: 5,
            timeout_secs: 180,
            max_retry_count: 2,
            manual_remind_interval_secs: 600,
            manual_completion_path: "/anomaly/payout/complete".to_string(),
        }
    }

    #[test]
    fn test_valid_descriptor_passes() {
        assert!(payout_descriptor().validate().is_ok());
    }

    #[test]
    fn test_identifier_whitelist() {
        assert!(is_safe_identifier("payout_orders"));
        assert!(is_safe_identifier("_shadow"));
        assert!(is_safe_identifier("t2"));

        assert!(!is_safe_identifier(""));
        assert!(!is_safe_identifier("2fast"));
        assert!(!is_safe_identifier("Payouts"));
        assert!(!is_safe_identifier("orders; drop table users"));
        assert!(!is_safe_identifier("orders--"));
        assert!(!is_safe_identifier(&"x".repeat(64)));
    }

    #[test]
    fn test_rejects_unsafe_table() {
        let mut desc = payout_descriptor();
        desc.table = "payout_orders; --".to_string();
        assert!(desc.validate().is_err());
    }

    #[test]
    fn test_rejects_equal_status_values() {
        let mut desc = payout_descriptor();
        desc.status_failure_value = desc.status_success_value.clone();
        assert!(desc.validate().is_err());
    }

    #[test]
    fn test_rejects_nonpositive_thresholds() {
        let mut desc = payout_descriptor();
        desc.timeout_secs = 0;
        assert!(desc.validate().is_err());

        let mut desc = payout_descriptor();
        desc.min_retry_interval_secs = -5;
        assert!(desc.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_completion_path() {
        let mut desc = payout_descriptor();
        desc.manual_completion_path = "complete".to_string();
        assert!(desc.validate().is_err());
    }

    #[test]
    fn test_column_type_mapping() {
        assert_eq!(ColumnType::from_data_type("integer"), ColumnType::Integer);
        assert_eq!(
            ColumnType::from_data_type("character varying"),
            ColumnType::Text
        );
        assert_eq!(ColumnType::Integer.cast_token(), "int4");
        assert_eq!(ColumnType::Text.cast_token(), "text");
    }
}
