//! # Record Models
//!
//! Typed views over the tracking columns of registered backing tables.

pub mod anomaly_record;

pub use anomaly_record::AnomalyRecord;
