//! # Database Operations
//!
//! SQL statement construction and schema provisioning for registered
//! backing tables. All engine persistence goes through this module's
//! statements; see [`tracking_queries`] for the identifier discipline.

pub mod schema_provisioner;
pub mod tracking_queries;

pub use schema_provisioner::SchemaProvisioner;
