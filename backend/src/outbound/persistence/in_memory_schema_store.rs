//! In-memory adapter for the schema store and provenance ports.
//!
//! Transactions snapshot the whole store on `begin` and restore it on
//! `rollback`, matching PostgreSQL's transactional DDL. Faults can be
//! injected to exercise rollback paths.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::postgres_ddl::{add_column_sql, create_table_sql, drop_column_sql, drop_table_sql};
use super::postgres_schema_store::DEFAULT_SCHEMA;
use crate::domain::column::{ColumnDefault, ColumnDefinition, ColumnDescriptor};
use crate::domain::migration_id::MigrationId;
use crate::domain::ports::{
    ProvenanceRecord, ProvenanceRepository, ProvenanceRepositoryError, SchemaStore,
    SchemaStoreError,
};

#[derive(Debug, Clone, Default)]
struct Table {
    columns: Vec<ColumnDescriptor>,
    row_count: u64,
}

#[derive(Debug, Clone, Default)]
struct State {
    tables: BTreeMap<String, Table>,
    provenance: Option<Vec<ProvenanceRecord>>,
    ddl: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct Faults {
    add_column: Option<String>,
    provenance_insert: bool,
}

/// Schema store and provenance repository held in process memory.
///
/// # Examples
///
/// ```rust
/// use chat_backend::domain::ports::SchemaStore;
/// use chat_backend::outbound::persistence::InMemorySchemaStore;
///
/// let mut store = InMemorySchemaStore::new().with_table("users", &["id", "username"], 3);
///
/// assert_eq!(store.row_count("users"), Ok(3));
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemorySchemaStore {
    state: State,
    snapshot: Option<State>,
    faults: Faults,
}

impl InMemorySchemaStore {
    /// Empty store: no tables, provenance never bootstrapped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a host table with untyped nullable text columns.
    #[must_use]
    pub fn with_table(mut self, table: &str, columns: &[&str], row_count: u64) -> Self {
        let columns = columns
            .iter()
            .map(|name| ColumnDescriptor {
                name: (*name).to_owned(),
                data_type: "text".to_owned(),
                is_nullable: true,
                default: None,
            })
            .collect();
        self.state
            .tables
            .insert(table.to_owned(), Table { columns, row_count });
        self
    }

    /// Fail when `column` is added.
    #[must_use]
    pub fn fail_on_add_column(mut self, column: &str) -> Self {
        self.faults.add_column = Some(column.to_owned());
        self
    }

    /// Fail every provenance insert.
    #[must_use]
    pub fn fail_on_provenance_insert(mut self) -> Self {
        self.faults.provenance_insert = true;
        self
    }

    /// Change the row count of an existing table.
    pub fn set_row_count(&mut self, table: &str, row_count: u64) {
        if let Some(entry) = self.state.tables.get_mut(table) {
            entry.row_count = row_count;
        }
    }

    /// Column names of `table`, or `None` when it does not exist.
    pub fn table_columns(&self, table: &str) -> Option<Vec<String>> {
        self.state.tables.get(table).map(|entry| {
            entry
                .columns
                .iter()
                .map(|column| column.name.clone())
                .collect()
        })
    }

    /// Committed DDL in execution order, rendered as PostgreSQL would see it.
    pub fn ddl_statements(&self) -> &[String] {
        &self.state.ddl
    }

    fn table_mut(&mut self, table: &str) -> Result<&mut Table, SchemaStoreError> {
        self.state
            .tables
            .get_mut(table)
            .ok_or_else(|| SchemaStoreError::query(format!("relation \"{table}\" does not exist")))
    }

    fn provenance_mut(&mut self) -> Result<&mut Vec<ProvenanceRecord>, ProvenanceRepositoryError> {
        self.state.provenance.as_mut().ok_or_else(|| {
            ProvenanceRepositoryError::query("provenance table has not been created")
        })
    }
}

fn describe(column: &ColumnDefinition) -> ColumnDescriptor {
    ColumnDescriptor {
        name: column.name.to_string(),
        data_type: column.column_type.sql_type().to_owned(),
        is_nullable: column.is_nullable,
        default: column.default.as_ref().map(|default| match default {
            ColumnDefault::Literal(value) => format!("'{value}'::text"),
            ColumnDefault::CurrentTimestamp => "CURRENT_TIMESTAMP".to_owned(),
        }),
    }
}

impl SchemaStore for InMemorySchemaStore {
    fn table_exists(&mut self, table: &str) -> Result<bool, SchemaStoreError> {
        Ok(self.state.tables.contains_key(table))
    }

    fn list_columns(&mut self, table: &str) -> Result<Vec<ColumnDescriptor>, SchemaStoreError> {
        Ok(self
            .state
            .tables
            .get(table)
            .map(|entry| entry.columns.clone())
            .unwrap_or_default())
    }

    fn row_count(&mut self, table: &str) -> Result<u64, SchemaStoreError> {
        Ok(self.table_mut(table)?.row_count)
    }

    fn create_table(
        &mut self,
        table: &str,
        columns: &[ColumnDefinition],
    ) -> Result<(), SchemaStoreError> {
        if self.state.tables.contains_key(table) {
            return Err(SchemaStoreError::query(format!(
                "relation \"{table}\" already exists"
            )));
        }
        let entry = Table {
            columns: columns.iter().map(describe).collect(),
            row_count: 0,
        };
        self.state.tables.insert(table.to_owned(), entry);
        self.state
            .ddl
            .push(create_table_sql(DEFAULT_SCHEMA, table, columns));
        Ok(())
    }

    fn add_column(
        &mut self,
        table: &str,
        column: &ColumnDefinition,
    ) -> Result<(), SchemaStoreError> {
        if self.faults.add_column.as_deref() == Some(column.name.as_str()) {
            return Err(SchemaStoreError::query(format!(
                "injected failure adding column \"{}\"",
                column.name
            )));
        }
        let entry = self.table_mut(table)?;
        if entry.columns.iter().any(|existing| existing.name == column.name.as_str()) {
            return Err(SchemaStoreError::query(format!(
                "column \"{}\" of relation \"{table}\" already exists",
                column.name
            )));
        }
        entry.columns.push(describe(column));
        self.state.ddl.push(add_column_sql(DEFAULT_SCHEMA, table, column));
        Ok(())
    }

    fn drop_column(&mut self, table: &str, column: &str) -> Result<(), SchemaStoreError> {
        let entry = self.table_mut(table)?;
        let before = entry.columns.len();
        entry.columns.retain(|existing| existing.name != column);
        if entry.columns.len() == before {
            return Err(SchemaStoreError::query(format!(
                "column \"{column}\" of relation \"{table}\" does not exist"
            )));
        }
        self.state.ddl.push(drop_column_sql(DEFAULT_SCHEMA, table, column));
        Ok(())
    }

    fn drop_table(&mut self, table: &str) -> Result<(), SchemaStoreError> {
        if self.state.tables.remove(table).is_none() {
            return Err(SchemaStoreError::query(format!(
                "table \"{table}\" does not exist"
            )));
        }
        self.state.ddl.push(drop_table_sql(DEFAULT_SCHEMA, table));
        Ok(())
    }

    fn begin(&mut self) -> Result<(), SchemaStoreError> {
        if self.snapshot.is_some() {
            return Err(SchemaStoreError::query("transaction already open"));
        }
        self.snapshot = Some(self.state.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), SchemaStoreError> {
        self.snapshot
            .take()
            .map(|_| ())
            .ok_or_else(|| SchemaStoreError::query("no transaction is open"))
    }

    fn rollback(&mut self) -> Result<(), SchemaStoreError> {
        let snapshot = self
            .snapshot
            .take()
            .ok_or_else(|| SchemaStoreError::query("no transaction is open"))?;
        self.state = snapshot;
        Ok(())
    }
}

impl ProvenanceRepository for InMemorySchemaStore {
    fn ensure_provenance_table(&mut self) -> Result<(), ProvenanceRepositoryError> {
        self.state.provenance.get_or_insert_with(Vec::new);
        Ok(())
    }

    fn insert_provenance(
        &mut self,
        record: &ProvenanceRecord,
    ) -> Result<(), ProvenanceRepositoryError> {
        if self.faults.provenance_insert {
            return Err(ProvenanceRepositoryError::query("injected provenance failure"));
        }
        let records = self.provenance_mut()?;
        if records
            .iter()
            .any(|existing| existing.migration_id == record.migration_id)
        {
            return Err(ProvenanceRepositoryError::conflict(
                record.migration_id.to_string(),
            ));
        }
        records.push(record.clone());
        Ok(())
    }

    fn find_provenance(
        &mut self,
        migration_id: &MigrationId,
    ) -> Result<Option<ProvenanceRecord>, ProvenanceRepositoryError> {
        Ok(self.state.provenance.as_ref().and_then(|records| {
            records
                .iter()
                .find(|record| &record.migration_id == migration_id)
                .cloned()
        }))
    }

    fn list_provenance(
        &mut self,
        family: &str,
    ) -> Result<Vec<ProvenanceRecord>, ProvenanceRepositoryError> {
        let mut records: Vec<ProvenanceRecord> = self
            .state
            .provenance
            .iter()
            .flatten()
            .filter(|record| record.migration_id.family() == family)
            .cloned()
            .collect();
        records.sort_by(|left, right| {
            right
                .migration_id
                .version()
                .cmp(&left.migration_id.version())
        });
        Ok(records)
    }

    fn mark_reverted(
        &mut self,
        migration_id: &MigrationId,
        reverted_at: DateTime<Utc>,
    ) -> Result<(), ProvenanceRepositoryError> {
        let record = self
            .provenance_mut()?
            .iter_mut()
            .find(|record| &record.migration_id == migration_id)
            .ok_or_else(|| {
                ProvenanceRepositoryError::query(format!("no provenance row for {migration_id}"))
            })?;
        record.reverted_at = Some(reverted_at);
        Ok(())
    }
}
