//! # Anomaly Type Registry
//!
//! In-memory mapping from type identity (backing-table name) to the
//! registered descriptor/handler binding. Insert-only and duplicate
//! rejecting; lookups are lock-free reads on a concurrent map.

use crate::database::schema_provisioner::ResolvedCasts;
use crate::error::{AnomalyError, Result};
use crate::orchestration::handler::AnomalyHandler;
use crate::registry::descriptor::AnomalyTypeDescriptor;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::warn;

/// A descriptor bound to one handler instance and the column casts
/// resolved for its table at registration time.
pub struct RegisteredType {
    pub descriptor: AnomalyTypeDescriptor,
    pub handler: Arc<dyn AnomalyHandler>,
    pub casts: ResolvedCasts,
}

impl RegisteredType {
    pub fn type_key(&self) -> &str {
        self.descriptor.type_key()
    }
}

impl std::fmt::Debug for RegisteredType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredType")
            .field("descriptor", &self.descriptor)
            .field("casts", &self.casts)
            .finish_non_exhaustive()
    }
}

/// Registry statistics for diagnostics and startup logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    pub total_types: usize,
    pub labels: Vec<String>,
}

/// Concurrent map of registered anomaly types, keyed by table identity.
#[derive(Default)]
pub struct AnomalyTypeRegistry {
    types: DashMap<String, Arc<RegisteredType>>,
}

impl AnomalyTypeRegistry {
    pub fn new() -> Self {
        Self {
            types: DashMap::new(),
        }
    }

    /// Insert a new type binding. A duplicate table identity is rejected
    /// with a warning and leaves the first registration untouched.
    pub fn insert(&self, registered: RegisteredType) -> Result<Arc<RegisteredType>> {
        let key = registered.type_key().to_string();
        if self.types.contains_key(&key) {
            warn!(
                type_key = %key,
                label = %registered.descriptor.label,
                "Anomaly type already registered, ignoring duplicate registration"
            );
            return Err(AnomalyError::RegistrationError(format!(
                "type '{key}' is already registered"
            )));
        }
        let registered = Arc::new(registered);
        self.types.insert(key, registered.clone());
        Ok(registered)
    }

    /// Resolve a type binding by its table identity.
    pub fn get(&self, type_key: &str) -> Option<Arc<RegisteredType>> {
        self.types.get(type_key).map(|entry| entry.value().clone())
    }

    /// Snapshot of all registered types, for the scheduler's per-tick scan.
    pub fn all(&self) -> Vec<Arc<RegisteredType>> {
        self.types.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn contains(&self, type_key: &str) -> bool {
        self.types.contains_key(type_key)
    }

    pub fn stats(&self) -> RegistryStats {
        let mut labels: Vec<String> = self
            .types
            .iter()
            .map(|entry| entry.value().descriptor.label.clone())
            .collect();
        labels.sort();
        RegistryStats {
            total_types: self.types.len(),
            labels,
        }
    }
}
