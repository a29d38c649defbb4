//! Reverses applied migrations using their provenance.
//!
//! Recorded migrations drop exactly the columns they added. Without a
//! record, the columns are derived from the current mapping and the
//! operator must confirm the derived list, since the mapping may have
//! changed since apply time. A table the engine created, or one reverted by
//! inference, is dropped once only system columns (or nothing) would remain.
//! A host table that was only extended always keeps its other columns.
//! System columns are never dropped on their own.

use serde::Serialize;
use tracing::{info, warn};

use super::column::{SYSTEM_COLUMN_NAMES, is_system_column};
use super::field_mapping::FieldMapping;
use super::migration_error::MigrationError;
use super::migration_id::MigrationId;
use super::ports::{ApprovalChannel, MigrationStore, ProvenanceKind, ProvenanceRecord};
use super::provenance::ProvenanceStore;
use super::schema_state::probe;
use super::transaction::in_transaction;

/// Result of one revert step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RevertResult {
    /// Nothing but system columns would have remained, so the table went.
    DroppedTable {
        /// Dropped table.
        table_name: String,
        /// Record that drove the revert; `None` on the inferred path.
        migration_id: Option<MigrationId>,
    },
    /// Only the listed columns were dropped.
    DroppedColumns {
        /// Table that kept its other columns.
        table_name: String,
        /// Columns dropped, in record order.
        columns: Vec<String>,
        /// Record that drove the revert; `None` on the inferred path.
        migration_id: Option<MigrationId>,
    },
    /// The table or its columns were already gone.
    AlreadyReverted {
        /// Table that was inspected.
        table_name: String,
        /// Record that was looked up, if any.
        migration_id: Option<MigrationId>,
    },
}

/// Drives reverts for one table and mapping.
#[derive(Clone)]
pub struct RevertEngine {
    provenance: ProvenanceStore,
    mapping: FieldMapping,
    table_name: String,
    allow_inferred: bool,
}

impl RevertEngine {
    /// Create an engine for `table_name` under `mapping`.
    pub fn new(
        provenance: ProvenanceStore,
        mapping: FieldMapping,
        table_name: impl Into<String>,
        allow_inferred: bool,
    ) -> Self {
        Self {
            provenance,
            mapping,
            table_name: table_name.into(),
            allow_inferred,
        }
    }

    /// Revert exactly `migration_id`.
    pub fn revert<S>(
        &self,
        store: &mut S,
        channel: &dyn ApprovalChannel,
        migration_id: &MigrationId,
    ) -> Result<RevertResult, MigrationError>
    where
        S: MigrationStore + ?Sized,
    {
        match self.provenance.find(store, migration_id)? {
            Some(record) if !record.is_active() => {
                info!(migration_id = %migration_id, "migration already reverted");
                Ok(RevertResult::AlreadyReverted {
                    table_name: record.table_name,
                    migration_id: Some(record.migration_id),
                })
            }
            Some(record) => self.revert_recorded(store, record),
            None => self.revert_inferred(store, channel, &migration_id.to_string()),
        }
    }

    /// Revert the newest active migration of `family`.
    ///
    /// Inference is only attempted when `family` has no records at all; once
    /// every record is reverted the result is `AlreadyReverted`.
    pub fn revert_latest<S>(
        &self,
        store: &mut S,
        channel: &dyn ApprovalChannel,
        family: &str,
    ) -> Result<RevertResult, MigrationError>
    where
        S: MigrationStore + ?Sized,
    {
        let records = self.provenance.list(store, family)?;
        if let Some(record) = records.iter().find(|record| record.is_active()) {
            return self.revert_recorded(store, record.clone());
        }
        match records.into_iter().next() {
            Some(newest) => {
                info!(family, migration_id = %newest.migration_id, "every migration already reverted");
                Ok(RevertResult::AlreadyReverted {
                    table_name: newest.table_name,
                    migration_id: Some(newest.migration_id),
                })
            }
            None => self.revert_inferred(store, channel, family),
        }
    }

    /// Revert migrations of `family` newest first, asking before each further step.
    ///
    /// Each step commits on its own; declining stops the chain and leaves
    /// earlier steps in place.
    pub fn revert_chain<S>(
        &self,
        store: &mut S,
        channel: &dyn ApprovalChannel,
        family: &str,
    ) -> Result<Vec<RevertResult>, MigrationError>
    where
        S: MigrationStore + ?Sized,
    {
        let mut results = vec![self.revert_latest(store, channel, family)?];

        while let Some(next) = self.provenance.latest_active(store, family)? {
            let question = format!(
                "Revert previous migration {} on table '{}' (columns: {})? (y/n): ",
                next.migration_id,
                next.table_name,
                next.added_columns.join(", ")
            );
            if !channel.ask(&question) {
                info!(family, remaining = %next.migration_id, "revert chain stopped by operator");
                break;
            }
            results.push(self.revert_recorded(store, next)?);
        }

        Ok(results)
    }

    fn revert_recorded<S>(
        &self,
        store: &mut S,
        record: ProvenanceRecord,
    ) -> Result<RevertResult, MigrationError>
    where
        S: MigrationStore + ?Sized,
    {
        let migration_id = record.migration_id.clone();
        info!(
            migration_id = %migration_id,
            table = %record.table_name,
            columns = ?record.added_columns,
            "reverting recorded migration"
        );
        in_transaction(store, "revert", |store| {
            let result = remove_columns(
                store,
                &record.table_name,
                &record.added_columns,
                Some(&migration_id),
                record.kind == ProvenanceKind::CreatedTable,
            )?;
            self.provenance.mark_reverted(store, &migration_id)?;
            Ok(result)
        })
    }

    fn revert_inferred<S>(
        &self,
        store: &mut S,
        channel: &dyn ApprovalChannel,
        looked_up: &str,
    ) -> Result<RevertResult, MigrationError>
    where
        S: MigrationStore + ?Sized,
    {
        if !self.allow_inferred {
            warn!(migration_id = looked_up, "no provenance and inferred revert is disabled");
            return Err(MigrationError::provenance_not_found(looked_up));
        }

        let state = probe(store, &self.table_name)?;
        let derived: Vec<String> = self
            .mapping
            .column_names()
            .into_iter()
            .filter(|name| state.has_column(name))
            .collect();
        if derived.is_empty() {
            info!(table = %self.table_name, "no mapped columns present; nothing to revert");
            return Ok(RevertResult::AlreadyReverted {
                table_name: self.table_name.clone(),
                migration_id: None,
            });
        }

        let question = format!(
            "No provenance found for {looked_up}. Columns derived from the current mapping: {}. \
             They may differ from what was originally added. Drop them from '{}'? (y/n): ",
            derived.join(", "),
            self.table_name
        );
        if !channel.ask(&question) {
            info!(migration_id = looked_up, "inferred revert declined");
            return Err(MigrationError::provenance_not_found(looked_up));
        }

        warn!(table = %self.table_name, columns = ?derived, "reverting from inferred columns");
        in_transaction(store, "revert", |store| {
            remove_columns(store, &self.table_name, &derived, None, true)
        })
    }
}

fn remove_columns<S>(
    store: &mut S,
    table_name: &str,
    columns: &[String],
    migration_id: Option<&MigrationId>,
    drop_bare_table: bool,
) -> Result<RevertResult, MigrationError>
where
    S: MigrationStore + ?Sized,
{
    let state = probe(store, table_name)?;
    let present: Vec<&String> = columns
        .iter()
        .filter(|name| state.has_column(name))
        .collect();
    if present.is_empty() {
        info!(table = table_name, "columns already absent");
        return Ok(RevertResult::AlreadyReverted {
            table_name: table_name.to_owned(),
            migration_id: migration_id.cloned(),
        });
    }

    let remaining: Vec<String> = state
        .column_names()
        .into_iter()
        .filter(|name| !present.contains(&name))
        .collect();
    if drop_bare_table && only_system_columns(&remaining) {
        store.drop_table(table_name)?;
        info!(table = table_name, "table dropped");
        return Ok(RevertResult::DroppedTable {
            table_name: table_name.to_owned(),
            migration_id: migration_id.cloned(),
        });
    }

    let mut dropped = Vec::with_capacity(present.len());
    for name in present {
        if is_system_column(name) {
            warn!(table = table_name, column = %name, "keeping system column");
            continue;
        }
        store.drop_column(table_name, name)?;
        info!(table = table_name, column = %name, "column dropped");
        dropped.push(name.clone());
    }
    Ok(RevertResult::DroppedColumns {
        table_name: table_name.to_owned(),
        columns: dropped,
        migration_id: migration_id.cloned(),
    })
}

fn only_system_columns(remaining: &[String]) -> bool {
    remaining.is_empty()
        || (remaining.len() == SYSTEM_COLUMN_NAMES.len()
            && SYSTEM_COLUMN_NAMES
                .iter()
                .all(|system| remaining.iter().any(|name| name == system)))
}

#[cfg(test)]
#[path = "revert_engine_tests.rs"]
mod tests;
