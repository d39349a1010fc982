#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Anomaly Core
//!
//! Generic anomaly retry-and-escalation engine.
//!
//! ## Overview
//!
//! Any business operation that writes a status-bearing record — a payout
//! against a remote ledger, a deduction, a mint — can fail in ways that
//! usually self-heal but sometimes need a human. This crate tracks such
//! records, retries them automatically on a bounded schedule, and
//! escalates the survivors to an operator with full context, while
//! guaranteeing that concurrent scheduler instances never double-process
//! the same record.
//!
//! ## Architecture
//!
//! Business modules register a **type** at startup: a descriptor naming
//! the backing table, its id/owner/status columns, the success and
//! failure status values, and the retry thresholds, bound to a
//! business-supplied [`AnomalyHandler`](orchestration::AnomalyHandler).
//! Registration provisions tracking columns onto the backing table, so
//! any existing table becomes monitorable without migrations.
//!
//! From there the engine owns the record lifecycle:
//! `wait_auto → {auto_success | wait_manual} → manual_success`, driven by
//! a periodic scheduler that claims each record with
//! `FOR UPDATE SKIP LOCKED`, re-validates eligibility under the lock,
//! invokes the handler, and applies linear backoff or escalation.
//!
//! ## Module Organization
//!
//! - [`registry`] - Type descriptors, registration, handler binding
//! - [`database`] - Tracking-query construction and schema provisioning
//! - [`models`] - Typed row views and eligibility predicates
//! - [`state_machine`] - Anomaly status definitions and transitions
//! - [`orchestration`] - Scheduler, executor, notifier, dispatcher
//! - [`messaging`] - Alert transport seam
//! - [`config`] - Engine configuration
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use anomaly_core::config::EngineConfig;
//! use anomaly_core::orchestration::{EscalationNotifier, RetryScheduler};
//! use anomaly_core::registry::{AnomalyTypeRegistry, Registrar};
//! use anomaly_core::orchestration::ManualCompletionDispatcher;
//! use std::sync::Arc;
//!
//! # async fn example(pool: sqlx::PgPool, handler: Arc<dyn anomaly_core::orchestration::AnomalyHandler>, descriptor: anomaly_core::registry::AnomalyTypeDescriptor) -> anomaly_core::error::Result<()> {
//! let config = EngineConfig::from_env()?;
//! let registry = Arc::new(AnomalyTypeRegistry::new());
//! let dispatcher = Arc::new(ManualCompletionDispatcher::new(pool.clone(), registry.clone()));
//!
//! // each business module registers its type explicitly at startup
//! let registrar = Registrar::new(pool.clone(), registry.clone(), dispatcher.clone());
//! registrar.register(descriptor, handler).await?;
//!
//! let notifier = Arc::new(EscalationNotifier::new(
//!     pool.clone(),
//!     None, // alert transport wired per deployment
//!     config.notify_enabled,
//!     config.mail_from.clone(),
//!     config.mail_recipients.clone(),
//! ));
//! let scheduler = Arc::new(RetryScheduler::new(pool, registry, notifier, &config));
//! let _handle = scheduler.start();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod orchestration;
pub mod registry;
pub mod state_machine;

pub use error::{AnomalyError, Result};
