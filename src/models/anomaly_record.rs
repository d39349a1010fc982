//! # Anomaly Record Model
//!
//! Typed view of one backing-table row's tracking fields, materialized per
//! scan or per locked attempt — never held as a long-lived object.
//!
//! ## Overview
//!
//! Every query in `database::tracking_queries` selects the dynamic
//! per-descriptor columns under fixed aliases (`record_id`, `user_value`,
//! `business_status`), so this one `FromRow` struct serves every registered
//! backing table regardless of its real column names.
//!
//! The retry/manual-notify eligibility predicates live here as pure
//! functions of `(record, descriptor, now)`; the executor re-evaluates them
//! under the row lock to guard against stale candidate lists.

use crate::registry::descriptor::AnomalyTypeDescriptor;
use crate::state_machine::{AnomalyStatus, ManualSubmitStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Tracking-field view of one anomalous business record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AnomalyRecord {
    /// Primary-key value, aliased from the descriptor's id column
    pub record_id: i64,
    /// Owner identity, aliased from the descriptor's user column
    pub user_value: Option<String>,
    /// Raw `err_status` string as stored
    pub err_status: String,
    /// First-failure timestamp; set once when the record turns anomalous
    pub err_start_time: Option<DateTime<Utc>>,
    /// Automatic attempts performed so far
    pub err_retry_count: i32,
    /// Gate for the next automatic attempt
    pub err_next_retry_time: Option<DateTime<Utc>>,
    /// Gate for the next human reminder
    pub err_next_remind_staff_time: Option<DateTime<Utc>>,
    /// Human alerts sent so far, delivered or not
    pub err_manual_notify_count: i32,
    /// Raw escalation delivery status as stored
    pub err_submit_manual_status: Option<String>,
    /// Current value of the business status column, cast to text
    pub business_status: Option<String>,
}

impl AnomalyRecord {
    /// Parsed anomaly status; unknown strings read as `Normal` so that a
    /// row that was never marked (NULL/empty status) is simply ineligible.
    pub fn status(&self) -> AnomalyStatus {
        self.err_status.parse().unwrap_or(AnomalyStatus::Normal)
    }

    /// Parsed escalation delivery status, if any.
    pub fn submit_status(&self) -> Option<ManualSubmitStatus> {
        self.err_submit_manual_status
            .as_deref()
            .and_then(|s| s.parse().ok())
    }

    /// Time elapsed since the first failure, if the record is anomalous.
    pub fn elapsed_since_start(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.err_start_time.map(|start| now - start)
    }

    /// Whether the business status column still carries the descriptor's
    /// failure value. A flipped value means the operation self-healed out
    /// of band and the record must not be retried or escalated.
    pub fn business_still_failed(&self, descriptor: &AnomalyTypeDescriptor) -> bool {
        self.business_status.as_deref() == Some(descriptor.status_failure_value.as_str())
    }

    /// Retry eligibility: open for automated retry, past its backoff gate,
    /// inside the timeout window, under the attempt budget, and still
    /// failed on the business side.
    pub fn is_retry_eligible(
        &self,
        descriptor: &AnomalyTypeDescriptor,
        now: DateTime<Utc>,
    ) -> bool {
        if self.status() != AnomalyStatus::WaitAuto {
            return false;
        }
        if let Some(next_retry) = self.err_next_retry_time {
            if next_retry > now {
                return false;
            }
        }
        let within_timeout = match self.elapsed_since_start(now) {
            Some(elapsed) => elapsed.num_seconds() < descriptor.timeout_secs,
            None => false,
        };
        within_timeout
            && self.err_retry_count < descriptor.max_retry_count
            && self.business_still_failed(descriptor)
    }

    /// Manual-notify eligibility: still open, out of time, out of attempts,
    /// past its remind gate, and still failed on the business side.
    pub fn is_manual_notify_eligible(
        &self,
        descriptor: &AnomalyTypeDescriptor,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.status().is_open() {
            return false;
        }
        let timed_out = match self.elapsed_since_start(now) {
            Some(elapsed) => elapsed.num_seconds() > descriptor.timeout_secs,
            None => false,
        };
        if let Some(next_remind) = self.err_next_remind_staff_time {
            if next_remind > now {
                return false;
            }
        }
        timed_out
            && self.err_retry_count >= descriptor.max_retry_count
            && self.business_still_failed(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::status_values;
    use chrono::TimeZone;

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

    fn open_record(retry_count: i32) -> AnomalyRecord {
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

    #[test]
    fn test_fresh_record_is_retry_eligible() {
        let record = open_record(0);
        assert!(record.is_retry_eligible(&descriptor(), t(5)));
    }

    #[test]
    fn test_backoff_gate_blocks_retry() {
        let mut record = open_record(1);
        record.err_next_retry_time = Some(t(15));
        assert!(!record.is_retry_eligible(&descriptor(), t(10)));
        assert!(record.is_retry_eligible(&descriptor(), t(15)));
    }

    #[test]
    fn test_exhausted_attempts_block_retry() {
        let record = open_record(2); // == max_retry_count
        assert!(!record.is_retry_eligible(&descriptor(), t(20)));
    }

    #[test]
    fn test_timeout_blocks_retry() {
        let record = open_record(0);
        assert!(!record.is_retry_eligible(&descriptor(), t(180)));
        assert!(record.is_retry_eligible(&descriptor(), t(179)));
    }

    #[test]
    fn test_flipped_business_status_blocks_retry() {
        let mut record = open_record(0);
        record.business_status = Some("2".to_string());
        assert!(!record.is_retry_eligible(&descriptor(), t(5)));
    }

    #[test]
    fn test_unmarked_record_is_never_eligible() {
        let mut record = open_record(0);
        record.err_start_time = None;
        assert!(!record.is_retry_eligible(&descriptor(), t(5)));
        record.err_retry_count = 5;
        assert!(!record.is_manual_notify_eligible(&descriptor(), t(500)));
    }

    #[test]
    fn test_manual_notify_requires_timeout_and_exhaustion() {
        let record = open_record(2);
        // attempts exhausted but still inside the timeout window
        assert!(!record.is_manual_notify_eligible(&descriptor(), t(100)));
        // out of time and out of attempts
        assert!(record.is_manual_notify_eligible(&descriptor(), t(181)));

        // out of time but attempts remain
        let record = open_record(1);
        assert!(!record.is_manual_notify_eligible(&descriptor(), t(181)));
    }

    #[test]
    fn test_manual_notify_respects_remind_gate() {
        let mut record = open_record(2);
        record.err_status = status_values::WAIT_MANUAL.to_string();
        record.err_next_remind_staff_time = Some(t(400));
        assert!(!record.is_manual_notify_eligible(&descriptor(), t(300)));
        assert!(record.is_manual_notify_eligible(&descriptor(), t(400)));
    }

    #[test]
    fn test_terminal_records_are_inert() {
        let mut record = open_record(2);
        record.err_status = status_values::AUTO_SUCCESS.to_string();
        assert!(!record.is_retry_eligible(&descriptor(), t(5)));
        assert!(!record.is_manual_notify_eligible(&descriptor(), t(500)));
    }

    #[test]
    fn test_status_parsing_defaults_to_normal() {
        let mut record = open_record(0);
        record.err_status = String::new();
        assert_eq!(record.status(), AnomalyStatus::Normal);
        record.err_submit_manual_status = Some("submit_failed".to_string());
        assert_eq!(
            record.submit_status(),
            Some(ManualSubmitStatus::SubmitFailed)
        );
    }
}
