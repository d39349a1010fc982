//! # Anomaly Entry Points
//!
//! The two calls business code makes into the engine: mark a failed record
//! for tracking, and guard a new operation against a user's open anomalies.

use crate::constants::status_values;
use crate::database::tracking_queries;
use crate::error::{AnomalyError, Result};
use crate::registry::anomaly_type_registry::AnomalyTypeRegistry;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Business-facing entry points for anomaly intake and the user guard.
pub struct AnomalyMarker {
    pool: PgPool,
    registry: Arc<AnomalyTypeRegistry>,
}

impl AnomalyMarker {
    pub fn new(pool: PgPool, registry: Arc<AnomalyTypeRegistry>) -> Self {
        Self { pool, registry }
    }

    /// Mark a record anomalous, entering it into the retry state machine.
    ///
    /// Idempotent against repeated failures of the same record: the first
    /// failure timestamp is preserved while the attempt budget and the
    /// escalation bookkeeping are reset, so the timeout window always
    /// measures from the original failure.
    #[instrument(skip(self), fields(type_key = type_key))]
    pub async fn mark_anomalous(
        &self,
        type_key: &str,
        record_id: i64,
        user_value: Option<&str>,
    ) -> Result<()> {
        let registered = self.registry.get(type_key).ok_or_else(|| {
            AnomalyError::ValidationError(format!("anomaly type '{type_key}' is not registered"))
        })?;
        let descriptor = &registered.descriptor;

        let now = Utc::now();
        let min_interval = clamp_to_i32(descriptor.min_retry_interval_secs);
        let timeout = clamp_to_i32(descriptor.timeout_secs);

        let sql = tracking_queries::mark_anomalous(
            descriptor,
            user_value.map(|_| registered.casts.user),
        );
        let mut query = sqlx::query(&sql)
            .bind(status_values::WAIT_AUTO)
            .bind(now)
            .bind(min_interval)
            .bind(timeout)
            .bind(record_id);
        if let Some(user) = user_value {
            query = query.bind(user);
        }

        let affected = query.execute(&self.pool).await?.rows_affected();
        if affected == 0 {
            warn!(
                type_key = type_key,
                record_id = record_id,
                "mark_anomalous matched no row"
            );
            return Err(AnomalyError::ValidationError(format!(
                "record {record_id} not found in '{}'",
                descriptor.table
            )));
        }

        info!(
            label = %descriptor.label,
            record_id = record_id,
            user = user_value.unwrap_or("-"),
            "Record marked anomalous, automatic retry scheduled"
        );
        Ok(())
    }

    /// Guard called before an operation that requires exclusivity: fails
    /// with [`AnomalyError::OperationUnavailable`] while the user has any
    /// unresolved anomaly of this type.
    #[instrument(skip(self), fields(type_key = type_key))]
    pub async fn check_user_has_open_anomaly(
        &self,
        type_key: &str,
        user_value: &str,
    ) -> Result<()> {
        let registered = self.registry.get(type_key).ok_or_else(|| {
            AnomalyError::ValidationError(format!("anomaly type '{type_key}' is not registered"))
        })?;
        let descriptor = &registered.descriptor;

        let sql = tracking_queries::count_open_for_user(descriptor);
        let open_count: i64 = sqlx::query_scalar(&sql)
            .bind(user_value)
            .bind(status_values::WAIT_AUTO)
            .bind(status_values::WAIT_MANUAL)
            .fetch_one(&self.pool)
            .await?;

        guard_outcome(&descriptor.label, user_value, open_count)
    }
}

/// Pure guard decision: any open anomaly blocks the new operation.
fn guard_outcome(label: &str, user_value: &str, open_count: i64) -> Result<()> {
    if open_count > 0 {
        warn!(
            label = label,
            user = user_value,
            open_count = open_count,
            "Blocking operation, user has unresolved anomalies"
        );
        return Err(AnomalyError::OperationUnavailable(format!(
            "{label} is temporarily unavailable while a previous operation is being repaired"
        )));
    }
    Ok(())
}

fn clamp_to_i32(value: i64) -> i32 {
    value.min(i64::from(i32::MAX)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_blocks_on_open_anomalies() {
        let result = guard_outcome("payout", "user-7", 1);
        assert!(matches!(
            result,
            Err(AnomalyError::OperationUnavailable(_))
        ));

        let result = guard_outcome("payout", "user-7", 3);
        assert!(result.is_err());
    }

    #[test]
    fn test_guard_passes_with_no_open_anomalies() {
        assert!(guard_outcome("payout", "user-7", 0).is_ok());
    }

    #[test]
    fn test_clamp_to_i32() {
        assert_eq!(clamp_to_i32(180), 180);
        assert_eq!(clamp_to_i32(i64::MAX), i32::MAX);
    }
}
