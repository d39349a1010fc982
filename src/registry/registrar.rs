//! # Type Registrar
//!
//! Startup-time registration orchestration. Each business module calls
//! [`Registrar::register`] once, in its initialization code, making
//! registration order explicit and deterministic — there is no reflection
//! or annotation scanning anywhere in the engine.
//!
//! A registration that cannot proceed (missing backing table, duplicate
//! type) is logged as a warning and skipped; other types are unaffected.

use crate::database::SchemaProvisioner;
use crate::error::Result;
use crate::orchestration::handler::AnomalyHandler;
use crate::orchestration::manual_completion::ManualCompletionDispatcher;
use crate::registry::anomaly_type_registry::{AnomalyTypeRegistry, RegisteredType};
use crate::registry::descriptor::AnomalyTypeDescriptor;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};

/// Registers anomaly types: backing-table check, schema provisioning,
/// registry insert, manual-completion route binding.
pub struct Registrar {
    provisioner: SchemaProvisioner,
    registry: Arc<AnomalyTypeRegistry>,
    dispatcher: Arc<ManualCompletionDispatcher>,
}

impl Registrar {
    pub fn new(
        pool: PgPool,
        registry: Arc<AnomalyTypeRegistry>,
        dispatcher: Arc<ManualCompletionDispatcher>,
    ) -> Self {
        Self {
            provisioner: SchemaProvisioner::new(pool),
            registry,
            dispatcher,
        }
    }

    /// Register one anomaly type. Returns `Ok(true)` when the type was
    /// registered, `Ok(false)` when it was skipped with a warning
    /// (missing table or duplicate), and `Err` on descriptor or database
    /// failures.
    pub async fn register(
        &self,
        descriptor: AnomalyTypeDescriptor,
        handler: Arc<dyn AnomalyHandler>,
    ) -> Result<bool> {
        descriptor.validate()?;

        if !self.provisioner.table_exists(&descriptor.table).await? {
            warn!(
                label = %descriptor.label,
                table = %descriptor.table,
                "Backing table does not exist, skipping anomaly type registration"
            );
            return Ok(false);
        }

        if self.registry.contains(descriptor.type_key()) {
            warn!(
                label = %descriptor.label,
                type_key = %descriptor.type_key(),
                "Anomaly type already registered, skipping"
            );
            return Ok(false);
        }

        self.provisioner
            .ensure_tracking_columns(&descriptor.table)
            .await?;
        let casts = self.provisioner.resolve_casts(&descriptor).await?;

        let path = descriptor.manual_completion_path.clone();
        let registered = match self.registry.insert(RegisteredType {
            descriptor,
            handler,
            casts,
        }) {
            Ok(registered) => registered,
            // lost a registration race; first wins, same as the early check
            Err(_) => return Ok(false),
        };

        self.dispatcher
            .register_route(&path, registered.type_key());

        let stats = self.registry.stats();
        info!(
            label = %registered.descriptor.label,
            type_key = %registered.type_key(),
            completion_path = %path,
            total_types = stats.total_types,
            "📋 REGISTRY: Anomaly type registered"
        );
        Ok(true)
    }
}
