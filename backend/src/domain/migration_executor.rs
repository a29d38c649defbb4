//! Applies an approved plan atomically, together with its provenance.

use serde::Serialize;
use tracing::info;

use super::migration_error::MigrationError;
use super::migration_id::MigrationId;
use super::migration_plan::MigrationPlan;
use super::ports::{MigrationStore, ProvenanceKind, ProvenanceRecord};
use super::provenance::ProvenanceStore;
use super::transaction::in_transaction;

/// Result of applying a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// Schema changed; provenance was committed with it.
    Applied(ProvenanceRecord),
    /// The plan was a no-op; nothing ran and nothing was recorded.
    Noop {
        /// Table that already satisfied the mapping.
        table_name: String,
    },
}

/// Runs DDL and the provenance write inside one transaction.
#[derive(Clone)]
pub struct MigrationExecutor {
    provenance: ProvenanceStore,
}

impl MigrationExecutor {
    /// Create an executor recording through `provenance`.
    pub fn new(provenance: ProvenanceStore) -> Self {
        Self { provenance }
    }

    /// Apply `plan` under `migration_id`.
    ///
    /// Any failure rolls the whole unit back, so no partial columns persist
    /// and no record is left behind.
    pub fn apply<S>(
        &self,
        store: &mut S,
        plan: &MigrationPlan,
        migration_id: &MigrationId,
    ) -> Result<ApplyOutcome, MigrationError>
    where
        S: MigrationStore + ?Sized,
    {
        let (table_name, columns, kind) = match plan {
            MigrationPlan::Noop { table_name } => {
                info!(table = %table_name, "plan is a no-op; nothing to apply");
                return Ok(ApplyOutcome::Noop {
                    table_name: table_name.clone(),
                });
            }
            MigrationPlan::CreateTable {
                table_name,
                columns,
            } => (table_name, columns, ProvenanceKind::CreatedTable),
            MigrationPlan::AddColumns {
                table_name,
                columns,
            } => (table_name, columns, ProvenanceKind::AddedColumns),
        };

        let record = in_transaction(store, "apply", |store| {
            match kind {
                ProvenanceKind::CreatedTable => {
                    store.create_table(table_name, columns)?;
                    info!(table = %table_name, columns = columns.len(), "table created");
                }
                ProvenanceKind::AddedColumns => {
                    for column in columns {
                        store.add_column(table_name, column)?;
                        info!(table = %table_name, column = column.name.as_str(), "column added");
                    }
                }
            }
            let record = self.provenance.record(
                store,
                migration_id,
                table_name,
                kind,
                plan.column_names(),
            )?;
            Ok(record)
        })?;

        info!(migration_id = %migration_id, table = %table_name, "migration applied");
        Ok(ApplyOutcome::Applied(record))
    }
}
