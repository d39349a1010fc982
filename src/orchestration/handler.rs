//! # Anomaly Handler Contract
//!
//! The per-business-type trait supplying remediation and status-check
//! logic. One implementation is bound to each registered type; the engine
//! owns everything else (scheduling, locking, bookkeeping, escalation).

use crate::error::Result;
use async_trait::async_trait;

/// Business-supplied operations for one registered anomaly type.
///
/// Implementations must be safely repeatable: the scheduler may invoke
/// `exception_handling` for the same record many times across ticks, and
/// remote side effects are the implementor's responsibility to keep
/// idempotent.
#[async_trait]
pub trait AnomalyHandler: Send + Sync {
    /// Has the business operation already succeeded? Inspected before and
    /// after each remediation attempt so a self-healed record is promoted
    /// without further work.
    async fn check_status(&self, record_id: i64) -> Result<bool>;

    /// Attempt remediation for the record. Returning `Ok(true)` means the
    /// attempt believes it fixed the problem (the engine still re-checks
    /// `check_status` before promoting); `Ok(false)` or `Err` count as a
    /// failed attempt. Errors are caught and logged by the executor, never
    /// propagated out of the tick.
    async fn exception_handling(&self, record_id: i64) -> Result<bool>;

    /// Apply the business effects of a human resolution, invoked by the
    /// manual-completion dispatcher before the record is finalized.
    async fn processing_successful(&self, record_id: i64) -> Result<()>;
}
