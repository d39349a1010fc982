//! # Type Registry
//!
//! Static per-type configuration and handler binding.
//!
//! Registration is explicit and happens once at process start: each
//! business module calls [`Registrar::register`] with its descriptor and
//! handler, in deterministic order. The registry itself is insert-only and
//! read-mostly; after startup it is treated as immutable.

pub mod anomaly_type_registry;
pub mod descriptor;
pub mod registrar;

pub use anomaly_type_registry::{AnomalyTypeRegistry, RegisteredType, RegistryStats};
pub use descriptor::{AnomalyTypeDescriptor, ColumnType};
pub use registrar::Registrar;
