//! Domain model and services of the identity schema engine.
//!
//! Purpose: map the three abstract identity fields onto a host-defined user
//! table, reconcile that mapping with the live schema, and reverse what was
//! changed. Types here are pure; store access goes through [`ports`].
//!
//! Public surface:
//! - `resolve_field_mapping`: merge host overrides with built-in defaults.
//! - `probe` / `plan_migration`: inspect the table and diff it.
//! - `SafetyGate`, `MigrationExecutor`, `ProvenanceStore`, `RevertEngine`:
//!   the apply and revert path.
//! - `IdentityRecordType`: accessors delegating to mapped columns.
//! - `IdentitySchemaService`: orchestration used by inbound adapters.

pub mod column;
pub mod field_mapping;
pub mod identity_field;
pub mod identity_record;
pub mod identity_schema_service;
pub mod migration_error;
pub mod migration_executor;
pub mod migration_id;
pub mod migration_plan;
pub mod ports;
pub mod provenance;
pub mod revert_engine;
pub mod safety_gate;
pub mod schema_state;
mod transaction;

pub use self::column::{
    COLUMN_NAME_MAX, ColumnDefault, ColumnDefinition, ColumnDescriptor, ColumnName,
    ColumnNameError, ColumnType, SYSTEM_COLUMN_NAMES, is_system_column, system_columns,
};
pub use self::field_mapping::{
    ColumnOverride, ColumnSpec, ConfigurationError, DEFAULT_AVATAR_URL, DEFAULT_FULL_NAME,
    FieldMapping, FieldOverrides, resolve_field_mapping,
};
pub use self::identity_field::{IdentityField, UnknownIdentityField};
pub use self::identity_record::{IdentityRecord, IdentityRecordType, Row};
pub use self::identity_schema_service::{
    DEFAULT_TABLE_NAME, EngineOptions, IdentitySchemaService, PlanReport,
};
pub use self::migration_error::MigrationError;
pub use self::migration_executor::{ApplyOutcome, MigrationExecutor};
pub use self::migration_id::{DEFAULT_MIGRATION_FAMILY, MigrationId, MigrationIdError};
pub use self::migration_plan::{MigrationPlan, plan_migration};
pub use self::provenance::ProvenanceStore;
pub use self::revert_engine::{RevertEngine, RevertResult};
pub use self::safety_gate::{GateDecision, SafetyGate};
pub use self::schema_state::{SchemaState, probe};
