//! # Retry Executor
//!
//! Per-record locked processing for the automatic retry path.
//!
//! ## Processing discipline
//!
//! Each candidate is handled inside its own short transaction:
//!
//! 1. fetch the row with `FOR UPDATE SKIP LOCKED` — a concurrently running
//!    scheduler already holding the row makes the fetch come back empty and
//!    the record is silently skipped for this tick;
//! 2. re-validate retry eligibility on the locked row (candidate lists go
//!    stale between the scan and the lock);
//! 3. drive the attempt flow against the business handler;
//! 4. apply the resulting state mutation and commit.
//!
//! The attempt flow itself ([`run_attempt`]) is pure apart from the handler
//! calls: it never touches the database, which is what makes the escalation
//! and backoff arithmetic directly testable.

use crate::constants::status_values;
use crate::database::tracking_queries;
use crate::error::Result;
use crate::models::AnomalyRecord;
use crate::orchestration::handler::AnomalyHandler;
use crate::registry::anomaly_type_registry::RegisteredType;
use crate::registry::descriptor::AnomalyTypeDescriptor;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument, warn};

/// Outcome of one locked attempt on one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The business status was already successful before remediation ran
    AlreadyHealed,
    /// Remediation ran and the status check now reports success
    Healed,
    /// Attempt budget or time budget exhausted; hand over to a human
    Escalate { retry_count: i32 },
    /// Attempt failed but budgets remain; schedule the next attempt
    Reschedule {
        retry_count: i32,
        next_retry_time: DateTime<Utc>,
    },
}

/// How a candidate was disposed of, for tick accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordDisposition {
    SkippedLocked,
    SkippedStale,
    AutoSuccess,
    Escalated,
    Rescheduled,
}

/// Linear backoff: the gap to the next attempt widens with every failure,
/// scaled by the type's minimum interval.
pub fn compute_next_retry_time(
    now: DateTime<Utc>,
    min_interval_secs: i64,
    retry_count: i32,
) -> DateTime<Utc> {
    now + Duration::seconds(min_interval_secs * (i64::from(retry_count) + 1))
}

/// Decide what happens after a failed attempt. Escalates when the record
/// ran out of time (measured from the first failure, not the last attempt)
/// or out of attempts, whichever comes first; the incremented attempt
/// count participates in the decision so an exhausted budget escalates in
/// the same evaluation.
pub fn plan_after_failed_attempt(
    descriptor: &AnomalyTypeDescriptor,
    record: &AnomalyRecord,
    now: DateTime<Utc>,
) -> AttemptOutcome {
    let retry_count = record.err_retry_count.saturating_add(1);
    let elapsed_secs = record
        .elapsed_since_start(now)
        .map(|elapsed| elapsed.num_seconds())
        .unwrap_or(0);

    if elapsed_secs >= descriptor.timeout_secs || retry_count >= descriptor.max_retry_count {
        AttemptOutcome::Escalate { retry_count }
    } else {
        AttemptOutcome::Reschedule {
            retry_count,
            next_retry_time: compute_next_retry_time(
                now,
                descriptor.min_retry_interval_secs,
                retry_count,
            ),
        }
    }
}

/// Drive one attempt against the business handler.
///
/// Handler errors are caught and logged here and count as a failed
/// attempt; nothing a handler does can abort the tick.
pub async fn run_attempt(
    handler: &dyn AnomalyHandler,
    descriptor: &AnomalyTypeDescriptor,
    record: &AnomalyRecord,
    now: DateTime<Utc>,
) -> AttemptOutcome {
    let record_id = record.record_id;

    match handler.check_status(record_id).await {
        Ok(true) => return AttemptOutcome::AlreadyHealed,
        Ok(false) => {}
        Err(e) => warn!(
            label = %descriptor.label,
            record_id = record_id,
            error = %e,
            "check_status failed before remediation"
        ),
    }

    match handler.exception_handling(record_id).await {
        Ok(claimed_fixed) => debug!(
            label = %descriptor.label,
            record_id = record_id,
            claimed_fixed = claimed_fixed,
            "Remediation attempt finished"
        ),
        Err(e) => warn!(
            label = %descriptor.label,
            record_id = record_id,
            error = %e,
            "Remediation attempt raised, counting as failed attempt"
        ),
    }

    match handler.check_status(record_id).await {
        Ok(true) => return AttemptOutcome::Healed,
        Ok(false) => {}
        Err(e) => warn!(
            label = %descriptor.label,
            record_id = record_id,
            error = %e,
            "check_status failed after remediation"
        ),
    }

    plan_after_failed_attempt(descriptor, record, now)
}

/// Locked per-record processor for the automatic retry path.
pub struct RetryExecutor {
    pool: PgPool,
}

impl RetryExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Heal sweep: promote open records whose business column already
    /// flipped to the success value, without invoking the handler.
    pub async fn heal_sweep(&self, registered: &RegisteredType) -> Result<u64> {
        let descriptor = &registered.descriptor;
        let sql = tracking_queries::heal_flipped_records(descriptor);
        let healed = sqlx::query(&sql)
            .bind(status_values::AUTO_SUCCESS)
            .bind(status_values::WAIT_AUTO)
            .bind(&descriptor.status_success_value)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if healed > 0 {
            debug!(label = %descriptor.label, healed = healed, "Heal sweep promoted flipped records");
        }
        Ok(healed)
    }

    /// Candidate ids for this tick's retry pass.
    pub async fn fetch_retry_candidates(
        &self,
        registered: &RegisteredType,
        now: DateTime<Utc>,
        batch_limit: i64,
    ) -> Result<Vec<i64>> {
        let descriptor = &registered.descriptor;
        let sql = tracking_queries::select_retry_candidates(descriptor);
        let window_start = now - Duration::seconds(descriptor.timeout_secs);
        let ids: Vec<i64> = sqlx::query_scalar(&sql)
            .bind(status_values::WAIT_AUTO)
            .bind(now)
            .bind(window_start)
            .bind(descriptor.max_retry_count)
            .bind(&descriptor.status_failure_value)
            .bind(batch_limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    /// Process one candidate under lock. Lock contention and stale
    /// candidates are silent skips, retried naturally on a later tick.
    #[instrument(skip(self, registered), fields(label = %registered.descriptor.label))]
    pub async fn process_record(
        &self,
        registered: &RegisteredType,
        record_id: i64,
        now: DateTime<Utc>,
    ) -> Result<RecordDisposition> {
        let descriptor = &registered.descriptor;
        let mut tx = self.pool.begin().await?;

        let lock_sql = tracking_queries::select_record_for_update(descriptor);
        let record: Option<AnomalyRecord> = sqlx::query_as(&lock_sql)
            .bind(record_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(record) = record else {
            debug!(record_id = record_id, "Row held by another worker, skipping");
            return Ok(RecordDisposition::SkippedLocked);
        };

        if !record.is_retry_eligible(descriptor, now) {
            debug!(record_id = record_id, "Candidate no longer eligible under lock, skipping");
            tx.commit().await?;
            return Ok(RecordDisposition::SkippedStale);
        }

        let outcome = run_attempt(registered.handler.as_ref(), descriptor, &record, now).await;

        let disposition = match outcome {
            AttemptOutcome::AlreadyHealed | AttemptOutcome::Healed => {
                let sql = tracking_queries::mark_auto_success(descriptor);
                sqlx::query(&sql)
                    .bind(status_values::AUTO_SUCCESS)
                    .bind(record_id)
                    .execute(&mut *tx)
                    .await?;
                RecordDisposition::AutoSuccess
            }
            AttemptOutcome::Escalate { retry_count } => {
                let sql = tracking_queries::escalate_to_manual(descriptor);
                sqlx::query(&sql)
                    .bind(status_values::WAIT_MANUAL)
                    .bind(retry_count)
                    .bind(record_id)
                    .execute(&mut *tx)
                    .await?;
                RecordDisposition::Escalated
            }
            AttemptOutcome::Reschedule {
                retry_count,
                next_retry_time,
            } => {
                let sql = tracking_queries::reschedule_retry(descriptor);
                sqlx::query(&sql)
                    .bind(retry_count)
                    .bind(next_retry_time)
                    .bind(record_id)
                    .execute(&mut *tx)
                    .await?;
                RecordDisposition::Rescheduled
            }
        };

        tx.commit().await?;
        Ok(disposition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnomalyError;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn descriptor() -> AnomalyTypeDescriptor {
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

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn record(retry_count: i32) -> AnomalyRecord {
        AnomalyRecord {
            record_id: 42,
            user_value: Some("user-7".to_string()),
            err_status: status_values::WAIT_AUTO.to_string(),
            err_start_time: Some(t(0)),
            err_retry_count: retry_count,
            err_next_retry_time: None,
            err_next_remind_staff_time: None,
            err_manual_notify_count: 0,
            err_submit_manual_status: None,
            business_status: Some("3".to_string()),
        }
    }

    /// Handler whose status checks answer from a fixed script.
    struct ScriptedHandler {
        status_script: Vec<bool>,
        status_calls: AtomicU32,
        remediation: std::result::Result<bool, String>,
    }

    impl ScriptedHandler {
        fn failing() -> Self {
            Self {
                status_script: vec![false, false],
                status_calls: AtomicU32::new(0),
                remediation: Ok(false),
            }
        }

        fn healed_on_second_check() -> Self {
            Self {
                status_script: vec![false, true],
                status_calls: AtomicU32::new(0),
                remediation: Ok(true),
            }
        }

        fn already_healed() -> Self {
            Self {
                status_script: vec![true],
                status_calls: AtomicU32::new(0),
                remediation: Ok(false),
            }
        }

        fn panicky() -> Self {
            Self {
                status_script: vec![false, false],
                status_calls: AtomicU32::new(0),
                remediation: Err("remote endpoint exploded".to_string()),
            }
        }
    }

    #[async_trait]
    impl AnomalyHandler for ScriptedHandler {
        async fn check_status(&self, _record_id: i64) -> crate::error::Result<bool> {
            let call = self.status_calls.fetch_add(1, Ordering::SeqCst) as usize;
            Ok(*self.status_script.get(call).unwrap_or(&false))
        }

        async fn exception_handling(&self, _record_id: i64) -> crate::error::Result<bool> {
            self.remediation
                .clone()
                .map_err(AnomalyError::SchedulerError)
        }

        async fn processing_successful(&self, _record_id: i64) -> crate::error::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_backoff_widens_linearly() {
        assert_eq!(compute_next_retry_time(t(0), 5, 1), t(10));
        assert_eq!(compute_next_retry_time(t(0), 5, 2), t(15));
        assert_eq!(compute_next_retry_time(t(0), 5, 3), t(20));
    }

    #[tokio::test]
    async fn test_scenario_a_first_attempt_reschedules() {
        // marked anomalous at t=0, first failed attempt at t=5
        let handler = ScriptedHandler::failing();
        let outcome = run_attempt(&handler, &descriptor(), &record(0), t(5)).await;

        assert_eq!(
            outcome,
            AttemptOutcome::Reschedule {
                retry_count: 1,
                next_retry_time: t(15),
            }
        );
    }

    #[tokio::test]
    async fn test_scenario_a_second_attempt_escalates_regardless_of_elapsed_time() {
        // second failed attempt at t=15 exhausts max_retry_count=2
        let handler = ScriptedHandler::failing();
        let outcome = run_attempt(&handler, &descriptor(), &record(1), t(15)).await;

        assert_eq!(outcome, AttemptOutcome::Escalate { retry_count: 2 });
    }

    #[tokio::test]
    async fn test_timeout_escalates_with_attempts_remaining() {
        let handler = ScriptedHandler::failing();
        let outcome = run_attempt(&handler, &descriptor(), &record(0), t(180)).await;

        assert_eq!(outcome, AttemptOutcome::Escalate { retry_count: 1 });
    }

    #[tokio::test]
    async fn test_scenario_b_healed_on_second_check() {
        let handler = ScriptedHandler::healed_on_second_check();
        let outcome = run_attempt(&handler, &descriptor(), &record(1), t(15)).await;

        // healed, not escalated, and the retry count is left alone
        assert_eq!(outcome, AttemptOutcome::Healed);
    }

    #[tokio::test]
    async fn test_already_healed_short_circuits_remediation() {
        let handler = ScriptedHandler::already_healed();
        let outcome = run_attempt(&handler, &descriptor(), &record(0), t(5)).await;

        assert_eq!(outcome, AttemptOutcome::AlreadyHealed);
        // only the first status check ran
        assert_eq!(handler.status_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_error_counts_as_failed_attempt() {
        let handler = ScriptedHandler::panicky();
        let outcome = run_attempt(&handler, &descriptor(), &record(0), t(5)).await;

        assert_eq!(
            outcome,
            AttemptOutcome::Reschedule {
                retry_count: 1,
                next_retry_time: t(15),
            }
        );
    }

    #[test]
    fn test_escalation_decision_prefers_whichever_budget_runs_out_first() {
        // time budget exhausted, attempts remain
        let outcome = plan_after_failed_attempt(&descriptor(), &record(0), t(500));
        assert_eq!(outcome, AttemptOutcome::Escalate { retry_count: 1 });

        // attempt budget exhausted, time remains
        let outcome = plan_after_failed_attempt(&descriptor(), &record(1), t(20));
        assert_eq!(outcome, AttemptOutcome::Escalate { retry_count: 2 });

        // both budgets open
        let outcome = plan_after_failed_attempt(&descriptor(), &record(0), t(20));
        assert!(matches!(outcome, AttemptOutcome::Reschedule { .. }));
    }
}
