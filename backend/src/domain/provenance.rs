//! Provenance bookkeeping over the [`ProvenanceRepository`] port.
//!
//! Every operation bootstraps the bookkeeping table first, so a store that
//! has never seen a migration behaves like one with an empty history.

use std::sync::Arc;

use mockable::Clock;
use tracing::{debug, info};

use super::migration_id::MigrationId;
use super::ports::{
    ProvenanceKind, ProvenanceRecord, ProvenanceRepository, ProvenanceRepositoryError,
};

/// Records and looks up which columns each migration added.
#[derive(Clone)]
pub struct ProvenanceStore {
    clock: Arc<dyn Clock>,
}

impl ProvenanceStore {
    /// Create a store stamping records with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Persist a new record for `migration_id`.
    pub fn record<R>(
        &self,
        repository: &mut R,
        migration_id: &MigrationId,
        table_name: &str,
        kind: ProvenanceKind,
        added_columns: Vec<String>,
    ) -> Result<ProvenanceRecord, ProvenanceRepositoryError>
    where
        R: ProvenanceRepository + ?Sized,
    {
        repository.ensure_provenance_table()?;
        let record = ProvenanceRecord {
            migration_id: migration_id.clone(),
            table_name: table_name.to_owned(),
            kind,
            added_columns,
            applied_at: self.clock.utc(),
            reverted_at: None,
        };
        repository.insert_provenance(&record)?;
        info!(
            migration_id = %record.migration_id,
            table = table_name,
            kind = %kind,
            columns = ?record.added_columns,
            "provenance recorded"
        );
        Ok(record)
    }

    /// Record for exactly `migration_id`, if any.
    pub fn find<R>(
        &self,
        repository: &mut R,
        migration_id: &MigrationId,
    ) -> Result<Option<ProvenanceRecord>, ProvenanceRepositoryError>
    where
        R: ProvenanceRepository + ?Sized,
    {
        repository.ensure_provenance_table()?;
        let found = repository.find_provenance(migration_id)?;
        debug!(migration_id = %migration_id, found = found.is_some(), "provenance lookup");
        Ok(found)
    }

    /// Newest record of `family` that has not been reverted.
    pub fn latest_active<R>(
        &self,
        repository: &mut R,
        family: &str,
    ) -> Result<Option<ProvenanceRecord>, ProvenanceRepositoryError>
    where
        R: ProvenanceRepository + ?Sized,
    {
        Ok(self
            .list(repository, family)?
            .into_iter()
            .find(ProvenanceRecord::is_active))
    }

    /// Every record of `family`, newest first.
    pub fn list<R>(
        &self,
        repository: &mut R,
        family: &str,
    ) -> Result<Vec<ProvenanceRecord>, ProvenanceRepositoryError>
    where
        R: ProvenanceRepository + ?Sized,
    {
        repository.ensure_provenance_table()?;
        let mut records = repository.list_provenance(family)?;
        records.retain(|record| record.migration_id.family() == family);
        records.sort_by(|left, right| right.migration_id.version().cmp(&left.migration_id.version()));
        Ok(records)
    }

    /// Stamp `migration_id` as reverted now.
    pub fn mark_reverted<R>(
        &self,
        repository: &mut R,
        migration_id: &MigrationId,
    ) -> Result<(), ProvenanceRepositoryError>
    where
        R: ProvenanceRepository + ?Sized,
    {
        repository.ensure_provenance_table()?;
        repository.mark_reverted(migration_id, self.clock.utc())?;
        info!(migration_id = %migration_id, "provenance marked reverted");
        Ok(())
    }
}
