//! # System Constants
//!
//! Core constants that define the operational boundaries of the anomaly
//! retry-and-escalation engine: the tracking columns stamped onto every
//! registered backing table, the canonical status strings stored in them,
//! and the engine-wide defaults.

/// Tracking columns the schema provisioner guarantees on every registered
/// backing table. Column names are engine-owned and never derived from
/// caller input.
pub mod tracking_columns {
    /// Current anomaly status (`AnomalyStatus` as a snake_case string).
    pub const ERR_STATUS: &str = "err_status";
    /// Timestamp of the first failure; set once, never overwritten while open.
    pub const ERR_START_TIME: &str = "err_start_time";
    /// Automatic attempts performed so far.
    pub const ERR_RETRY_COUNT: &str = "err_retry_count";
    /// Gate for the next automatic attempt (NULL = immediately eligible).
    pub const ERR_NEXT_RETRY_TIME: &str = "err_next_retry_time";
    /// Minimum retry interval stamped from the type descriptor, in seconds.
    pub const ERR_MIN_INTERVAL: &str = "err_min_interval";
    /// Escalation timeout stamped from the type descriptor, in seconds.
    pub const ERR_TIMEOUT: &str = "err_timeout";
    /// Escalation delivery status (`ManualSubmitStatus` as a string).
    pub const ERR_SUBMIT_MANUAL_STATUS: &str = "err_submit_manual_status";
    /// Gate for the next human reminder (NULL = immediately eligible).
    pub const ERR_NEXT_REMIND_STAFF_TIME: &str = "err_next_remind_staff_time";
    /// Human alerts sent so far, delivered or not.
    pub const ERR_MANUAL_NOTIFY_COUNT: &str = "err_manual_notify_count";
}

/// Canonical status strings as stored in `err_status`.
pub mod status_values {
    pub const NORMAL: &str = "normal";
    pub const WAIT_AUTO: &str = "wait_auto";
    pub const WAIT_MANUAL: &str = "wait_manual";
    pub const AUTO_SUCCESS: &str = "auto_success";
    pub const MANUAL_SUCCESS: &str = "manual_success";
}

/// Canonical strings as stored in `err_submit_manual_status`.
pub mod submit_status_values {
    pub const SUBMITTED: &str = "submitted";
    pub const SUBMIT_FAILED: &str = "submit_failed";
    pub const MANUAL_SUCCESS: &str = "manual_success";
}

/// Engine-wide defaults, overridable through `EngineConfig`.
pub mod defaults {
    /// Scheduler tick interval in seconds.
    pub const SCAN_INTERVAL_SECONDS: u64 = 60;
    /// Upper bound on retry candidates fetched per type per tick.
    pub const CANDIDATE_BATCH_LIMIT: i64 = 200;
}
