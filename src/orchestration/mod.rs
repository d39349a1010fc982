//! # Engine Orchestration
//!
//! The moving parts of the retry-and-escalation engine: the business-facing
//! entry points, the periodic scheduler, the locked per-record executor,
//! the escalation notifier, and the manual-completion dispatcher.
//!
//! ## Control flow
//!
//! ```text
//! business failure ──▶ AnomalyMarker ──▶ wait_auto
//!                                          │ tick
//!                                          ▼
//!                    RetryScheduler ──▶ RetryExecutor ──▶ auto_success
//!                                          │ exhausted
//!                                          ▼
//!                    EscalationNotifier ──▶ wait_manual (reminded)
//!                                          │ human acts
//!                                          ▼
//!                    ManualCompletionDispatcher ──▶ manual_success
//! ```

pub mod anomaly_marker;
pub mod escalation_notifier;
pub mod handler;
pub mod manual_completion;
pub mod retry_executor;
pub mod retry_scheduler;

pub use anomaly_marker::AnomalyMarker;
pub use escalation_notifier::{EscalationNotifier, NotifySweepStats};
pub use handler::AnomalyHandler;
pub use manual_completion::ManualCompletionDispatcher;
pub use retry_executor::{AttemptOutcome, RecordDisposition, RetryExecutor};
pub use retry_scheduler::{RetryScheduler, TickSummary};
