//! # Anomaly State Management
//!
//! Status definitions and transition rules for tracked anomaly records.
//!
//! A record enters the machine when business code marks it anomalous and
//! moves strictly forward: `normal → wait_auto → {auto_success | wait_manual}
//! → manual_success`. A record never reverts to `normal` once anomalous.
//! Re-marking a still-open record is modelled as the `wait_auto → wait_auto`
//! self-transition.

pub mod states;

pub use states::{AnomalyStatus, ManualSubmitStatus};
