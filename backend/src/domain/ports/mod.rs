//! Driven ports at the hexagonal boundary of the migration engine.

mod macros;
pub(crate) use macros::define_port_error;

mod approval_channel;
mod provenance_repository;
mod schema_store;

#[cfg(test)]
pub use approval_channel::MockApprovalChannel;
pub use approval_channel::{
    ApprovalChannel, NonInteractiveApprovalChannel, PreApprovedChannel, ScriptedApprovalChannel,
};
#[cfg(test)]
pub use provenance_repository::MockProvenanceRepository;
pub use provenance_repository::{
    ProvenanceKind, ProvenanceRecord, ProvenanceRepository, ProvenanceRepositoryError,
};
#[cfg(test)]
pub use schema_store::MockSchemaStore;
pub use schema_store::{SchemaStore, SchemaStoreError};

/// A store that holds both the managed table and its provenance on one session.
///
/// DDL and provenance writes issued through the same value share one
/// transaction.
pub trait MigrationStore: SchemaStore + ProvenanceRepository {}

impl<T> MigrationStore for T where T: SchemaStore + ProvenanceRepository + ?Sized {}
