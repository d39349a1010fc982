//! # Retry Scheduler
//!
//! The periodic driver of the engine: each tick scans every registered
//! type, runs the heal sweep, processes retry candidates under lock, and
//! hands exhausted records to the escalation sweep.
//!
//! Multiple scheduler instances (service replicas, or an embedded and a
//! standalone one) can run the same tick concurrently; per-record
//! `SKIP LOCKED` claiming makes double-processing impossible and tick
//! collisions cheap. Per-record and per-type failures are isolated and
//! logged — nothing short of shutdown stops a tick partway.

use crate::config::EngineConfig;
use crate::orchestration::escalation_notifier::{EscalationNotifier, NotifySweepStats};
use crate::orchestration::retry_executor::{RecordDisposition, RetryExecutor};
use crate::registry::anomaly_type_registry::{AnomalyTypeRegistry, RegisteredType};
use chrono::Utc;
use parking_lot::RwLock;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{error, info};
use uuid::Uuid;

/// Aggregated counters for one scheduler tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub types_scanned: usize,
    pub healed_by_sweep: u64,
    pub attempted: u64,
    pub auto_success: u64,
    pub escalated: u64,
    pub rescheduled: u64,
    pub skipped: u64,
    pub alerts_delivered: u64,
    pub alerts_failed: u64,
}

impl TickSummary {
    fn absorb_disposition(&mut self, disposition: RecordDisposition) {
        match disposition {
            RecordDisposition::AutoSuccess => self.auto_success += 1,
            RecordDisposition::Escalated => self.escalated += 1,
            RecordDisposition::Rescheduled => self.rescheduled += 1,
            RecordDisposition::SkippedLocked | RecordDisposition::SkippedStale => {
                self.skipped += 1;
            }
        }
    }

    fn absorb_notify(&mut self, stats: NotifySweepStats) {
        self.alerts_delivered += stats.delivered;
        self.alerts_failed += stats.delivery_failed + stats.errors;
        self.skipped += stats.skipped;
    }
}

/// Periodic scan-and-process driver over all registered anomaly types.
pub struct RetryScheduler {
    id: Uuid,
    registry: Arc<AnomalyTypeRegistry>,
    executor: RetryExecutor,
    notifier: Arc<EscalationNotifier>,
    scan_interval: Duration,
    batch_limit: i64,
    shutdown: Arc<Notify>,
    running: RwLock<bool>,
}

impl RetryScheduler {
    pub fn new(
        pool: PgPool,
        registry: Arc<AnomalyTypeRegistry>,
        notifier: Arc<EscalationNotifier>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            registry,
            executor: RetryExecutor::new(pool),
            notifier,
            scan_interval: Duration::from_secs(config.scan_interval_seconds),
            batch_limit: config.candidate_batch_limit,
            shutdown: Arc::new(Notify::new()),
            running: RwLock::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_running(&self) -> bool {
        *self.running.read()
    }

    /// Spawn the tick loop. The loop runs until [`stop`](Self::stop).
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let scheduler = Arc::clone(self);
        *scheduler.running.write() = true;

        info!(
            scheduler_id = %scheduler.id,
            interval_secs = scheduler.scan_interval.as_secs(),
            types = scheduler.registry.stats().total_types,
            "🔄 SCHEDULER: Starting anomaly retry scheduler"
        );

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(scheduler.scan_interval) => {
                        let summary = scheduler.run_tick().await;
                        info!(
                            scheduler_id = %scheduler.id,
                            types = summary.types_scanned,
                            healed = summary.healed_by_sweep,
                            attempted = summary.attempted,
                            auto_success = summary.auto_success,
                            escalated = summary.escalated,
                            rescheduled = summary.rescheduled,
                            skipped = summary.skipped,
                            alerts_delivered = summary.alerts_delivered,
                            alerts_failed = summary.alerts_failed,
                            "🔄 SCHEDULER: Tick complete"
                        );
                    }
                    _ = scheduler.shutdown.notified() => {
                        *scheduler.running.write() = false;
                        info!(scheduler_id = %scheduler.id, "🔄 SCHEDULER: Shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Signal the tick loop to exit after its current cycle.
    pub fn stop(&self) {
        self.shutdown.notify_waiters();
    }

    /// Run one full tick over every registered type. Public so embedding
    /// applications and tests can drive ticks without the timer.
    pub async fn run_tick(&self) -> TickSummary {
        let mut summary = TickSummary::default();
        for registered in self.registry.all() {
            summary.types_scanned += 1;
            self.process_type(&registered, &mut summary).await;
        }
        summary
    }

    async fn process_type(&self, registered: &RegisteredType, summary: &mut TickSummary) {
        let label = &registered.descriptor.label;
        let now = Utc::now();

        match self.executor.heal_sweep(registered).await {
            Ok(healed) => summary.healed_by_sweep += healed,
            Err(e) => error!(label = %label, error = %e, "Heal sweep failed"),
        }

        let candidates = match self
            .executor
            .fetch_retry_candidates(registered, now, self.batch_limit)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                error!(label = %label, error = %e, "Retry candidate scan failed");
                Vec::new()
            }
        };

        for record_id in candidates {
            summary.attempted += 1;
            match self.executor.process_record(registered, record_id, now).await {
                Ok(disposition) => summary.absorb_disposition(disposition),
                Err(e) => error!(
                    label = %label,
                    record_id = record_id,
                    error = %e,
                    "Record processing failed, continuing tick"
                ),
            }
        }

        match self.notifier.sweep_type(registered, now, self.batch_limit).await {
            Ok(stats) => summary.absorb_notify(stats),
            Err(e) => error!(label = %label, error = %e, "Escalation sweep failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_absorbs_dispositions() {
        let mut summary = TickSummary::default();
        summary.absorb_disposition(RecordDisposition::AutoSuccess);
        summary.absorb_disposition(RecordDisposition::Escalated);
        summary.absorb_disposition(RecordDisposition::Rescheduled);
        summary.absorb_disposition(RecordDisposition::SkippedLocked);
        summary.absorb_disposition(RecordDisposition::SkippedStale);

        assert_eq!(summary.auto_success, 1);
        assert_eq!(summary.escalated, 1);
        assert_eq!(summary.rescheduled, 1);
        assert_eq!(summary.skipped, 2);
    }

    #[test]
    fn test_summary_absorbs_notify_stats() {
        let mut summary = TickSummary::default();
        summary.absorb_notify(NotifySweepStats {
            delivered: 2,
            delivery_failed: 1,
            skipped: 3,
            errors: 1,
        });

        assert_eq!(summary.alerts_delivered, 2);
        assert_eq!(summary.alerts_failed, 2);
        assert_eq!(summary.skipped, 3);
    }
}
