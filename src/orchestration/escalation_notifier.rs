//! # Escalation Notifier
//!
//! Builds and delivers the human alert for records that exhausted their
//! automatic budget, and keeps the remind cadence moving.
//!
//! Delivery success and failure are both recorded — a dead mail relay must
//! not stop reminders from advancing, or an escalated record would go
//! silent exactly when a human is needed. The remind gate is derived from
//! the record's age (see [`plan_remind`]), a pinned behavior rather than a
//! fixed-interval cadence.

use crate::constants::{status_values, submit_status_values};
use crate::database::tracking_queries;
use crate::error::{AnomalyError, Result};
use crate::messaging::{AlertMessage, AlertTransport};
use crate::models::AnomalyRecord;
use crate::registry::anomaly_type_registry::RegisteredType;
use crate::registry::descriptor::AnomalyTypeDescriptor;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// How an escalation candidate was disposed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyDisposition {
    SkippedLocked,
    SkippedStale,
    Delivered,
    DeliveryFailed,
}

/// Per-type escalation sweep counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NotifySweepStats {
    pub delivered: u64,
    pub delivery_failed: u64,
    pub skipped: u64,
    pub errors: u64,
}

/// Next remind time, derived from elapsed time since the first failure:
/// the reminder fires again once the record's age has doubled. The
/// configured remind interval only backstops records with no start time,
/// which eligibility normally filters out.
pub fn plan_remind(
    descriptor: &AnomalyTypeDescriptor,
    record: &AnomalyRecord,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    match record.err_start_time {
        Some(start) => now + (now - start),
        None => now + Duration::seconds(descriptor.manual_remind_interval_secs),
    }
}

/// Delivery bookkeeping: which submit status a delivery result records.
pub fn submit_status_for(delivered: bool) -> &'static str {
    if delivered {
        submit_status_values::SUBMITTED
    } else {
        submit_status_values::SUBMIT_FAILED
    }
}

/// Render the plain-text alert for one escalated record.
pub fn render_alert(
    descriptor: &AnomalyTypeDescriptor,
    record: &AnomalyRecord,
    now: DateTime<Utc>,
    from: &str,
    recipients: &[String],
) -> AlertMessage {
    let elapsed_minutes = record
        .elapsed_since_start(now)
        .map(|elapsed| elapsed.num_minutes())
        .unwrap_or(0);
    let first_failure = record
        .err_start_time
        .map(|start| start.to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string());
    let snapshot = serde_json::to_string_pretty(record)
        .unwrap_or_else(|_| "<snapshot unavailable>".to_string());

    let subject = format!(
        "[anomaly] {} record {} requires manual handling",
        descriptor.label, record.record_id
    );
    let body = format!(
        "Anomaly record awaiting manual handling.\n\
         \n\
         type:              {label}\n\
         record id:         {record_id}\n\
         owner:             {owner}\n\
         first failure:     {first_failure} ({elapsed_minutes} minutes ago)\n\
         automatic retries: {retries}\n\
         alerts sent:       {alerts}\n\
         completion path:   {path}\n\
         \n\
         row snapshot:\n{snapshot}\n",
        label = descriptor.label,
        record_id = record.record_id,
        owner = record.user_value.as_deref().unwrap_or("-"),
        retries = record.err_retry_count,
        alerts = record.err_manual_notify_count,
        path = descriptor.manual_completion_path,
    );

    AlertMessage {
        from: from.to_string(),
        to: recipients.to_vec(),
        subject,
        body,
    }
}

/// Escalation delivery component. The transport is optional by
/// construction; its absence only surfaces when a send is actually due.
pub struct EscalationNotifier {
    pool: PgPool,
    transport: Option<Arc<dyn AlertTransport>>,
    notify_enabled: bool,
    mail_from: String,
    mail_recipients: Vec<String>,
}

impl EscalationNotifier {
    pub fn new(
        pool: PgPool,
        transport: Option<Arc<dyn AlertTransport>>,
        notify_enabled: bool,
        mail_from: String,
        mail_recipients: Vec<String>,
    ) -> Self {
        Self {
            pool,
            transport,
            notify_enabled,
            mail_from,
            mail_recipients,
        }
    }

    pub fn notify_enabled(&self) -> bool {
        self.notify_enabled
    }

    /// Candidate ids for this tick's escalation sweep.
    pub async fn fetch_escalation_candidates(
        &self,
        registered: &RegisteredType,
        now: DateTime<Utc>,
        batch_limit: i64,
    ) -> Result<Vec<i64>> {
        let descriptor = &registered.descriptor;
        let sql = tracking_queries::select_escalation_candidates(descriptor);
        let timeout_horizon = now - Duration::seconds(descriptor.timeout_secs);
        let ids: Vec<i64> = sqlx::query_scalar(&sql)
            .bind(status_values::WAIT_AUTO)
            .bind(status_values::WAIT_MANUAL)
            .bind(timeout_horizon)
            .bind(descriptor.max_retry_count)
            .bind(now)
            .bind(&descriptor.status_failure_value)
            .bind(batch_limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    /// Run the escalation sweep for one type. Per-record failures are
    /// isolated: one bad record never stops the rest of the sweep.
    pub async fn sweep_type(
        &self,
        registered: &RegisteredType,
        now: DateTime<Utc>,
        batch_limit: i64,
    ) -> Result<NotifySweepStats> {
        let mut stats = NotifySweepStats::default();
        if !self.notify_enabled {
            debug!(
                label = %registered.descriptor.label,
                "Escalation notification disabled, skipping sweep"
            );
            return Ok(stats);
        }

        let candidates = self
            .fetch_escalation_candidates(registered, now, batch_limit)
            .await?;
        for record_id in candidates {
            match self.notify_record(registered, record_id, now).await {
                Ok(NotifyDisposition::Delivered) => stats.delivered += 1,
                Ok(NotifyDisposition::DeliveryFailed) => stats.delivery_failed += 1,
                Ok(NotifyDisposition::SkippedLocked | NotifyDisposition::SkippedStale) => {
                    stats.skipped += 1;
                }
                Err(e) => {
                    stats.errors += 1;
                    error!(
                        label = %registered.descriptor.label,
                        record_id = record_id,
                        error = %e,
                        "Escalation notify failed for record"
                    );
                }
            }
        }
        Ok(stats)
    }

    /// Notify one escalated record under lock.
    ///
    /// The bookkeeping UPDATE also finalizes the `wait_auto → wait_manual`
    /// transition for records that timed out while waiting on a backoff
    /// gate and were therefore never escalated by the retry executor.
    #[instrument(skip(self, registered), fields(label = %registered.descriptor.label))]
    pub async fn notify_record(
        &self,
        registered: &RegisteredType,
        record_id: i64,
        now: DateTime<Utc>,
    ) -> Result<NotifyDisposition> {
        let descriptor = &registered.descriptor;
        let mut tx = self.pool.begin().await?;

        let lock_sql = tracking_queries::select_record_for_update(descriptor);
        let record: Option<AnomalyRecord> = sqlx::query_as(&lock_sql)
            .bind(record_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(record) = record else {
            debug!(record_id = record_id, "Row held by another worker, skipping notify");
            return Ok(NotifyDisposition::SkippedLocked);
        };

        if !record.is_manual_notify_eligible(descriptor, now) {
            debug!(record_id = record_id, "Candidate no longer notify-eligible under lock");
            tx.commit().await?;
            return Ok(NotifyDisposition::SkippedStale);
        }

        let transport = self.transport.as_ref().ok_or_else(|| {
            AnomalyError::ConfigurationError(
                "escalation notification requires an alert transport".to_string(),
            )
        })?;
        if self.mail_from.is_empty() || self.mail_recipients.is_empty() {
            return Err(AnomalyError::ConfigurationError(
                "escalation notification requires mail_from and mail_recipients".to_string(),
            ));
        }

        let message = render_alert(descriptor, &record, now, &self.mail_from, &self.mail_recipients);
        let delivered = match transport.send(&message).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    record_id = record_id,
                    error = %e,
                    "Alert delivery failed, remind cadence continues"
                );
                false
            }
        };

        let next_remind = plan_remind(descriptor, &record, now);
        let sql = tracking_queries::record_notify_attempt(descriptor);
        sqlx::query(&sql)
            .bind(status_values::WAIT_MANUAL)
            .bind(submit_status_for(delivered))
            .bind(next_remind)
            .bind(record_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(
            record_id = record_id,
            delivered = delivered,
            notify_count = record.err_manual_notify_count + 1,
            next_remind = %next_remind,
            "Escalation alert processed"
        );
        Ok(if delivered {
            NotifyDisposition::Delivered
        } else {
            NotifyDisposition::DeliveryFailed
        })
    }
}
