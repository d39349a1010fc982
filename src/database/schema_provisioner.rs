//! # Schema Provisioner
//!
//! Ensures the tracking columns exist on a registered backing table.
//!
//! Provisioning runs once per type at registration: probe
//! `information_schema.columns`, add whatever is missing with its
//! documented default, and resolve the cast tokens for the business status
//! and owner columns. A failure to add an individual column is logged and
//! does not abort the remaining columns or the registration — the type
//! degrades to whatever tracking surface the table actually has.

use crate::database::tracking_queries;
use crate::error::{AnomalyError, Result};
use crate::registry::descriptor::{AnomalyTypeDescriptor, ColumnType};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// One engine-owned tracking column and its SQL definition.
struct TrackingColumnSpec {
    name: &'static str,
    definition: &'static str,
}

/// The nine columns stamped onto every registered backing table.
const TRACKING_COLUMNS: [TrackingColumnSpec; 9] = [
    TrackingColumnSpec {
        name: "err_status",
        definition: "TEXT NOT NULL DEFAULT 'normal'",
    },
    TrackingColumnSpec {
        name: "err_start_time",
        definition: "TIMESTAMPTZ",
    },
    TrackingColumnSpec {
        name: "err_retry_count",
        definition: "INTEGER NOT NULL DEFAULT 0",
    },
    TrackingColumnSpec {
        name: "err_next_retry_time",
        definition: "TIMESTAMPTZ",
    },
    TrackingColumnSpec {
        name: "err_min_interval",
        definition: "INTEGER NOT NULL DEFAULT 0",
    },
    TrackingColumnSpec {
        name: "err_timeout",
        definition: "INTEGER NOT NULL DEFAULT 0",
    },
    TrackingColumnSpec {
        name: "err_submit_manual_status",
        definition: "TEXT",
    },
    TrackingColumnSpec {
        name: "err_next_remind_staff_time",
        definition: "TIMESTAMPTZ",
    },
    TrackingColumnSpec {
        name: "err_manual_notify_count",
        definition: "INTEGER NOT NULL DEFAULT 0",
    },
];

/// Resolved cast tokens for the descriptor's business columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedCasts {
    pub status: ColumnType,
    pub user: ColumnType,
}

/// Schema inspection and provisioning against one connection pool.
pub struct SchemaProvisioner {
    pool: PgPool,
}

impl SchemaProvisioner {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Check whether the backing table exists in the current schema.
    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(tracking_queries::TABLE_EXISTS)
            .bind(table)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AnomalyError::DatabaseError(format!("failed to probe table '{table}': {e}"))
            })?;
        Ok(exists)
    }

    /// Column name → `information_schema` data type for the table.
    pub async fn column_types(&self, table: &str) -> Result<HashMap<String, String>> {
        let rows = sqlx::query(tracking_queries::EXISTING_COLUMNS)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AnomalyError::DatabaseError(format!("failed to list columns of '{table}': {e}"))
            })?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get::<String, _>("column_name"), row.get::<String, _>("data_type")))
            .collect())
    }

    /// Add any missing tracking columns to the table.
    ///
    /// The table identifier comes from a validated descriptor; column names
    /// and definitions are engine constants, so the ALTER text contains no
    /// caller input. Individual failures are logged and skipped.
    pub async fn ensure_tracking_columns(&self, table: &str) -> Result<()> {
        let existing = self.column_types(table).await?;
        let mut added = 0usize;

        for spec in &TRACKING_COLUMNS {
            if existing.contains_key(spec.name) {
                continue;
            }
            let statement = format!(
                "ALTER TABLE {table} ADD COLUMN {name} {definition}",
                name = spec.name,
                definition = spec.definition,
            );
            match sqlx::query(&statement).execute(&self.pool).await {
                Ok(_) => {
                    debug!(table = table, column = spec.name, "Added tracking column");
                    added += 1;
                }
                Err(e) => {
                    warn!(
                        table = table,
                        column = spec.name,
                        error = %e,
                        "Failed to add tracking column, continuing with remaining columns"
                    );
                }
            }
        }

        if added > 0 {
            info!(table = table, added = added, "Provisioned tracking columns");
        }
        Ok(())
    }

    /// Resolve the cast tokens for the descriptor's status and user columns.
    /// Missing columns fall back to text, which keeps comparisons working
    /// and surfaces assignment problems as ordinary database errors.
    pub async fn resolve_casts(
        &self,
        descriptor: &AnomalyTypeDescriptor,
    ) -> Result<ResolvedCasts> {
        let columns = self.column_types(&descriptor.table).await?;
        let lookup = |column: &str| {
            columns
                .get(column)
                .map(|data_type| ColumnType::from_data_type(data_type))
                .unwrap_or_default()
        };
        Ok(ResolvedCasts {
            status: lookup(&descriptor.status_column),
            user: lookup(&descriptor.user_column),
        })
    }
}
