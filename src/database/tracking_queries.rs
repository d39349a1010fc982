//! # Tracking Query Builder
//!
//! Central construction of every SQL statement the engine runs against a
//! registered backing table.
//!
//! ## Identifier discipline
//!
//! Table and column names are the only text interpolated into statements,
//! and they come exclusively from an `AnomalyTypeDescriptor` that passed
//! identifier whitelisting at registration time. Every *value* — status
//! strings, timestamps, counts, ids — is a `$n` bind parameter.
//!
//! ## Alias discipline
//!
//! Row-returning statements select the dynamic columns under the fixed
//! aliases `record_id`, `user_value` and `business_status`, so the single
//! [`AnomalyRecord`](crate::models::AnomalyRecord) `FromRow` impl serves
//! every registered table. Business columns of unknown type are compared
//! through a `::text` cast on the column; assignments into them cast the
//! bound text parameter through the [`ColumnType`] token resolved from
//! `information_schema` at registration.

use crate::registry::descriptor::{AnomalyTypeDescriptor, ColumnType};

/// Fixed alias list used by every row-returning statement.
fn record_columns(descriptor: &AnomalyTypeDescriptor) -> String {
    format!(
        "{id}::int8 AS record_id, {user}::text AS user_value, err_status, err_start_time, \
         err_retry_count, err_next_retry_time, err_next_remind_staff_time, \
         err_manual_notify_count, err_submit_manual_status, {status}::text AS business_status",
        id = descriptor.id_column,
        user = descriptor.user_column,
        status = descriptor.status_column,
    )
}

/// Locked single-row fetch for per-record processing.
///
/// `SKIP LOCKED` makes concurrent scheduler instances (same or another
/// process) silently skip rows another worker already holds; a miss is not
/// an error, just contention.
///
/// Binds: `$1` record id.
pub fn select_record_for_update(descriptor: &AnomalyTypeDescriptor) -> String {
    format!(
        "SELECT {columns} FROM {table} WHERE {id} = $1 FOR UPDATE SKIP LOCKED",
        columns = record_columns(descriptor),
        table = descriptor.table,
        id = descriptor.id_column,
    )
}

/// Unlocked single-row fetch, used to load alert context.
///
/// Binds: `$1` record id.
pub fn select_record(descriptor: &AnomalyTypeDescriptor) -> String {
    format!(
        "SELECT {columns} FROM {table} WHERE {id} = $1",
        columns = record_columns(descriptor),
        table = descriptor.table,
        id = descriptor.id_column,
    )
}

/// Candidate ids for the automatic retry pass.
///
/// Binds: `$1` wait_auto, `$2` now, `$3` window start (now − timeout),
/// `$4` max retry count, `$5` failure value, `$6` batch limit.
pub fn select_retry_candidates(descriptor: &AnomalyTypeDescriptor) -> String {
    format!(
        "SELECT {id}::int8 AS record_id FROM {table} \
         WHERE err_status = $1 \
           AND (err_next_retry_time IS NULL OR err_next_retry_time <= $2) \
           AND err_start_time IS NOT NULL AND err_start_time > $3 \
           AND err_retry_count < $4 \
           AND {status}::text = $5 \
         ORDER BY err_start_time ASC LIMIT $6",
        id = descriptor.id_column,
        table = descriptor.table,
        status = descriptor.status_column,
    )
}

/// Candidate ids for the escalation sweep: open records that ran out of
/// time and attempts and whose remind gate is open.
///
/// Binds: `$1` wait_auto, `$2` wait_manual, `$3` timeout horizon
/// (now − timeout), `$4` max retry count, `$5` now, `$6` failure value,
/// `$7` batch limit.
pub fn select_escalation_candidates(descriptor: &AnomalyTypeDescriptor) -> String {
    format!(
        "SELECT {id}::int8 AS record_id FROM {table} \
         WHERE err_status IN ($1, $2) \
           AND err_start_time IS NOT NULL AND err_start_time < $3 \
           AND err_retry_count >= $4 \
           AND (err_next_remind_staff_time IS NULL OR err_next_remind_staff_time <= $5) \
           AND {status}::text = $6 \
         ORDER BY err_start_time ASC LIMIT $7",
        id = descriptor.id_column,
        table = descriptor.table,
        status = descriptor.status_column,
    )
}

/// Heal sweep: promote open retry records whose business column already
/// flipped to the success value, without invoking the handler.
///
/// Binds: `$1` auto_success, `$2` wait_auto, `$3` success value.
pub fn heal_flipped_records(descriptor: &AnomalyTypeDescriptor) -> String {
    format!(
        "UPDATE {table} SET err_status = $1 WHERE err_status = $2 AND {status}::text = $3",
        table = descriptor.table,
        status = descriptor.status_column,
    )
}

/// Mark a record anomalous. Idempotent against repeated failures: the
/// start time is only stamped when currently unset, while the attempt
/// budget and escalation bookkeeping reset every time.
///
/// Binds: `$1` wait_auto, `$2` now, `$3` min interval secs, `$4` timeout
/// secs, `$5` record id, and — with `user_cast` present — `$6` user value.
pub fn mark_anomalous(
    descriptor: &AnomalyTypeDescriptor,
    user_cast: Option<ColumnType>,
) -> String {
    let user_assignment = match user_cast {
        Some(cast) => format!(
            ", {user} = $6::{cast}",
            user = descriptor.user_column,
            cast = cast.cast_token()
        ),
        None => String::new(),
    };
    format!(
        "UPDATE {table} SET err_status = $1, \
         err_start_time = COALESCE(err_start_time, $2), \
         err_retry_count = 0, err_next_retry_time = NULL, \
         err_min_interval = $3, err_timeout = $4, \
         err_submit_manual_status = NULL, err_next_remind_staff_time = NULL, \
         err_manual_notify_count = 0{user_assignment} \
         WHERE {id} = $5",
        table = descriptor.table,
        id = descriptor.id_column,
    )
}

/// Record a failed attempt that stays on the automatic path.
///
/// Binds: `$1` new retry count, `$2` next retry time, `$3` record id.
pub fn reschedule_retry(descriptor: &AnomalyTypeDescriptor) -> String {
    format!(
        "UPDATE {table} SET err_retry_count = $1, err_next_retry_time = $2 WHERE {id} = $3",
        table = descriptor.table,
        id = descriptor.id_column,
    )
}

/// Escalate an exhausted record to the human queue.
///
/// Binds: `$1` wait_manual, `$2` final retry count, `$3` record id.
pub fn escalate_to_manual(descriptor: &AnomalyTypeDescriptor) -> String {
    format!(
        "UPDATE {table} SET err_status = $1, err_retry_count = $2 WHERE {id} = $3",
        table = descriptor.table,
        id = descriptor.id_column,
    )
}

/// Promote a record that self-healed during a locked attempt.
///
/// Binds: `$1` auto_success, `$2` record id.
pub fn mark_auto_success(descriptor: &AnomalyTypeDescriptor) -> String {
    format!(
        "UPDATE {table} SET err_status = $1 WHERE {id} = $2",
        table = descriptor.table,
        id = descriptor.id_column,
    )
}

/// Record one escalation delivery attempt, successful or not. The remind
/// gate always advances and the notify counter always increments; the
/// status assignment also finalizes the `wait_auto → wait_manual`
/// transition for records that timed out without exhausting a retry pass.
///
/// Binds: `$1` wait_manual, `$2` delivery status, `$3` next remind time,
/// `$4` record id.
pub fn record_notify_attempt(descriptor: &AnomalyTypeDescriptor) -> String {
    format!(
        "UPDATE {table} SET err_status = $1, err_submit_manual_status = $2, \
         err_next_remind_staff_time = $3, \
         err_manual_notify_count = err_manual_notify_count + 1 \
         WHERE {id} = $4",
        table = descriptor.table,
        id = descriptor.id_column,
    )
}

/// Human resolution: terminal status, delivery bookkeeping, and the
/// business status column flipped to the configured success value, in one
/// statement.
///
/// Binds: `$1` manual_success, `$2` manual_success (submit status),
/// `$3` success value, `$4` record id.
pub fn complete_manual(descriptor: &AnomalyTypeDescriptor, status_cast: ColumnType) -> String {
    format!(
        "UPDATE {table} SET err_status = $1, err_submit_manual_status = $2, \
         {status} = $3::{cast} WHERE {id} = $4",
        table = descriptor.table,
        status = descriptor.status_column,
        cast = status_cast.cast_token(),
        id = descriptor.id_column,
    )
}

/// Open-anomaly count for the user guard.
///
/// Binds: `$1` user value, `$2` wait_auto, `$3` wait_manual.
pub fn count_open_for_user(descriptor: &AnomalyTypeDescriptor) -> String {
    format!(
        "SELECT COUNT(*) FROM {table} WHERE {user}::text = $1 AND err_status IN ($2, $3)",
        table = descriptor.table,
        user = descriptor.user_column,
    )
}

/// Backing-table existence probe. Fixed statement, value bound.
pub const TABLE_EXISTS: &str = "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
     WHERE table_schema = current_schema() AND table_name = $1)";

/// Column name/type listing for provisioning and cast resolution.
pub const EXISTING_COLUMNS: &str = "SELECT column_name, data_type FROM information_schema.columns \
     WHERE table_schema = current_schema() AND table_name = $1";

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_locked_fetch_skips_contended_rows() {
        let sql = select_record_for_update(&descriptor());
        assert!(sql.ends_with("FOR UPDATE SKIP LOCKED"));
        assert!(sql.contains("id::int8 AS record_id"));
        assert!(sql.contains("user_id::text AS user_value"));
        assert!(sql.contains("payout_status::text AS business_status"));
        assert!(sql.contains("WHERE id = $1"));
    }

    #[test]
    fn test_retry_candidates_encode_eligibility() {
        let sql = select_retry_candidates(&descriptor());
        assert!(sql.contains("err_status = $1"));
        assert!(sql.contains("err_next_retry_time IS NULL OR err_next_retry_time <= $2"));
        assert!(sql.contains("err_start_time IS NOT NULL AND err_start_time > $3"));
        assert!(sql.contains("err_retry_count < $4"));
        assert!(sql.contains("payout_status::text = $5"));
        assert!(sql.contains("LIMIT $6"));
    }

    #[test]
    fn test_escalation_candidates_encode_eligibility() {
        let sql = select_escalation_candidates(&descriptor());
        assert!(sql.contains("err_status IN ($1, $2)"));
        assert!(sql.contains("err_start_time < $3"));
        assert!(sql.contains("err_retry_count >= $4"));
        assert!(
            sql.contains("err_next_remind_staff_time IS NULL OR err_next_remind_staff_time <= $5")
        );
    }

    #[test]
    fn test_mark_anomalous_preserves_first_failure_time() {
        let sql = mark_anomalous(&descriptor(), None);
        assert!(sql.contains("err_start_time = COALESCE(err_start_time, $2)"));
        assert!(sql.contains("err_retry_count = 0"));
        assert!(sql.contains("err_next_retry_time = NULL"));
        assert!(sql.contains("err_manual_notify_count = 0"));
        assert!(!sql.contains("user_id ="));

        let sql = mark_anomalous(&descriptor(), Some(ColumnType::BigInt));
        assert!(sql.contains("user_id = $6::int8"));
    }

    #[test]
    fn test_complete_manual_casts_status_value() {
        let sql = complete_manual(&descriptor(), ColumnType::Integer);
        assert!(sql.contains("payout_status = $3::int4"));

        let sql = complete_manual(&descriptor(), ColumnType::Text);
        assert!(sql.contains("payout_status = $3::text"));
    }

    #[test]
    fn test_notify_bookkeeping_always_advances() {
        let sql = record_notify_attempt(&descriptor());
        assert!(sql.contains("err_manual_notify_count = err_manual_notify_count + 1"));
        assert!(sql.contains("err_next_remind_staff_time = $3"));
        assert!(sql.contains("err_status = $1"));
    }

    #[test]
    fn test_no_value_interpolation() {
        // statement text never embeds status values, only descriptor identifiers
        for sql in [
            select_retry_candidates(&descriptor()),
            select_escalation_candidates(&descriptor()),
            heal_flipped_records(&descriptor()),
            mark_anomalous(&descriptor(), None),
            count_open_for_user(&descriptor()),
        ] {
            assert!(!sql.contains("wait_auto"));
            assert!(!sql.contains("'3'"));
        }
    }
}
