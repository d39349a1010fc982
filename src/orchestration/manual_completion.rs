//! # Manual-Completion Dispatcher
//!
//! Routes human "this record is fixed" callbacks to the right type.
//!
//! One dispatch table, built at startup from each registered descriptor's
//! declared completion path, consulted by a single generic entry point —
//! an HTTP layer exposes one POST route per path and forwards `(path,
//! record id)` here. No web-framework route injection is involved.

use crate::constants::{status_values, submit_status_values};
use crate::database::tracking_queries;
use crate::error::{AnomalyError, Result};
use crate::registry::anomaly_type_registry::{AnomalyTypeRegistry, RegisteredType};
use dashmap::DashMap;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Dispatch table from completion path to registered type.
pub struct ManualCompletionDispatcher {
    pool: PgPool,
    registry: Arc<AnomalyTypeRegistry>,
    routes: DashMap<String, String>,
}

impl ManualCompletionDispatcher {
    pub fn new(pool: PgPool, registry: Arc<AnomalyTypeRegistry>) -> Self {
        Self {
            pool,
            registry,
            routes: DashMap::new(),
        }
    }

    /// Bind a completion path to a type. A conflicting registration is
    /// rejected with a warning; the first registration wins.
    pub fn register_route(&self, path: &str, type_key: &str) -> bool {
        if let Some(existing) = self.routes.get(path) {
            warn!(
                path = path,
                existing_type = %existing.value(),
                rejected_type = type_key,
                "Manual completion path already registered, first registration wins"
            );
            return false;
        }
        self.routes.insert(path.to_string(), type_key.to_string());
        info!(path = path, type_key = type_key, "Manual completion route registered");
        true
    }

    /// Resolve a path to its registered type binding.
    pub fn resolve(&self, path: &str) -> Option<Arc<RegisteredType>> {
        let type_key = self.routes.get(path)?;
        self.registry.get(type_key.value())
    }

    /// Registered paths, for startup diagnostics.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Mark a record as resolved by a human.
    ///
    /// Applies the handler's business effects, then finalizes the record
    /// in one update: terminal anomaly status, terminal delivery status,
    /// and the business status column flipped to the configured success
    /// value. An unresolved path mutates nothing.
    #[instrument(skip(self))]
    pub async fn complete_manually(&self, path: &str, record_id: i64) -> Result<()> {
        let registered = self.resolve(path).ok_or_else(|| {
            AnomalyError::ValidationError(format!(
                "manual completion path '{path}' is not registered"
            ))
        })?;
        let descriptor = &registered.descriptor;

        registered.handler.processing_successful(record_id).await?;

        let sql = tracking_queries::complete_manual(descriptor, registered.casts.status);
        let affected = sqlx::query(&sql)
            .bind(status_values::MANUAL_SUCCESS)
            .bind(submit_status_values::MANUAL_SUCCESS)
            .bind(&descriptor.status_success_value)
            .bind(record_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(AnomalyError::ValidationError(format!(
                "record {record_id} not found in '{}'",
                descriptor.table
            )));
        }

        info!(
            label = %descriptor.label,
            record_id = record_id,
            "Record resolved manually"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema_provisioner::ResolvedCasts;
    use crate::orchestration::handler::AnomalyHandler;
    use crate::registry::descriptor::{AnomalyTypeDescriptor, ColumnType};
    use async_trait::async_trait;
    use sqlx::postgres::PgPoolOptions;

    struct NoopHandler;

    #[async_trait]
    impl AnomalyHandler for NoopHandler {
        async fn check_status(&self, _record_id: i64) -> Result<bool> {
            Ok(false)
        }
        async fn exception_handling(&self, _record_id: i64) -> Result<bool> {
            Ok(false)
        }
        async fn processing_successful(&self, _record_id: i64) -> Result<()> {
            Ok(())
        }
    }

    fn lazy_pool() -> PgPool {
        // never connected in these tests
        PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/anomaly_core_test")
            .expect("lazy pool")
    }

    fn registry_with_type(table: &str) -> Arc<AnomalyTypeRegistry> {
        let registry = Arc::new(AnomalyTypeRegistry::new());
        registry
            .insert(RegisteredType {
                descriptor: AnomalyTypeDescriptor {
                    label: table.to_string(),
                    table: table.to_string(),
                    id_column: "id".to_string(),
                    user_column: "user_id".to_string(),
                    status_column: "status".to_string(),
                    status_success_value: "2".to_string(),
                    status_failure_value: "3".to_string(),
                    min_retry_interval_secs: 5,
                    timeout_secs: 180,
                    max_retry_count: 2,
                    manual_remind_interval_secs: 600,
                    manual_completion_path: format!("/anomaly/{table}/complete"),
                },
                handler: Arc::new(NoopHandler),
                casts: ResolvedCasts {
                    status: ColumnType::Integer,
                    user: ColumnType::BigInt,
                },
            })
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_duplicate_route_first_wins() {
        let registry = registry_with_type("payout_orders");
        let dispatcher = ManualCompletionDispatcher::new(lazy_pool(), registry);

        assert!(dispatcher.register_route("/anomaly/payout/complete", "payout_orders"));
        assert!(!dispatcher.register_route("/anomaly/payout/complete", "other_table"));
        assert_eq!(dispatcher.route_count(), 1);

        let resolved = dispatcher.resolve("/anomaly/payout/complete").unwrap();
        assert_eq!(resolved.type_key(), "payout_orders");
    }

    #[tokio::test]
    async fn test_resolve_unknown_path() {
        let registry = registry_with_type("payout_orders");
        let dispatcher = ManualCompletionDispatcher::new(lazy_pool(), registry);
        assert!(dispatcher.resolve("/anomaly/unknown/complete").is_none());
    }

    #[tokio::test]
    async fn test_scenario_d_unregistered_path_mutates_nothing() {
        let registry = registry_with_type("payout_orders");
        let dispatcher = ManualCompletionDispatcher::new(lazy_pool(), registry);

        // no route registered: the call must fail before touching the pool
        let result = dispatcher.complete_manually("/anomaly/ghost/complete", 42).await;
        match result {
            Err(AnomalyError::ValidationError(msg)) => {
                assert!(msg.contains("not registered"));
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }
}
