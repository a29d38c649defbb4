//! Port abstraction for durable migration provenance.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::migration_id::MigrationId;

use super::define_port_error;

/// What an applied migration did to the managed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceKind {
    /// The table did not exist and was created.
    CreatedTable,
    /// Columns were appended to an existing table.
    AddedColumns,
}

impl ProvenanceKind {
    /// Stable label persisted alongside the record.
    pub const fn label(self) -> &'static str {
        match self {
            Self::CreatedTable => "created_table",
            Self::AddedColumns => "added_columns",
        }
    }
}

impl fmt::Display for ProvenanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ProvenanceKind {
    type Err = ProvenanceRepositoryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "created_table" => Ok(Self::CreatedTable),
            "added_columns" => Ok(Self::AddedColumns),
            other => Err(ProvenanceRepositoryError::corrupt(format!(
                "unknown provenance kind {other:?}"
            ))),
        }
    }
}

/// Durable evidence of which columns one migration run added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    /// Structured identifier of the run.
    pub migration_id: MigrationId,
    /// Table the run changed.
    pub table_name: String,
    /// Whether the run created the table or extended it.
    pub kind: ProvenanceKind,
    /// Concrete column names the run added, in DDL order.
    pub added_columns: Vec<String>,
    /// When the run committed.
    pub applied_at: DateTime<Utc>,
    /// When the run was reverted, if it has been.
    pub reverted_at: Option<DateTime<Utc>>,
}

impl ProvenanceRecord {
    /// Whether the record still describes live schema.
    pub fn is_active(&self) -> bool {
        self.reverted_at.is_none()
    }
}

define_port_error! {
    /// Errors raised by provenance repository adapters.
    pub enum ProvenanceRepositoryError {
        /// Provenance query failed.
        Query { message: String } =>
            "provenance query failed: {message}",
        /// A record with the same migration identifier already exists.
        Conflict { migration_id: String } =>
            "provenance already recorded for {migration_id}",
        /// A stored row could not be decoded.
        Corrupt { message: String } =>
            "provenance row is corrupt: {message}",
    }
}

/// Driven port persisting [`ProvenanceRecord`]s next to the managed table.
///
/// Adapters share the session of their [`super::SchemaStore`], so writes made
/// here join whatever transaction is open on it.
#[cfg_attr(test, mockall::automock)]
pub trait ProvenanceRepository: Send {
    /// Create the bookkeeping table when absent. Idempotent.
    fn ensure_provenance_table(&mut self) -> Result<(), ProvenanceRepositoryError>;

    /// Insert a new record; fails with `Conflict` on a duplicate identifier.
    fn insert_provenance(
        &mut self,
        record: &ProvenanceRecord,
    ) -> Result<(), ProvenanceRepositoryError>;

    /// Look up a record by exact identifier.
    fn find_provenance(
        &mut self,
        migration_id: &MigrationId,
    ) -> Result<Option<ProvenanceRecord>, ProvenanceRepositoryError>;

    /// Records of `family`, newest version first.
    fn list_provenance(
        &mut self,
        family: &str,
    ) -> Result<Vec<ProvenanceRecord>, ProvenanceRepositoryError>;

    /// Stamp a record as reverted.
    fn mark_reverted(
        &mut self,
        migration_id: &MigrationId,
        reverted_at: DateTime<Utc>,
    ) -> Result<(), ProvenanceRepositoryError>;
}
