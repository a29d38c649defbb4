//! Error taxonomy surfaced by the migration engine.
//!
//! `Configuration` and `SchemaConflict` are raised before any DDL runs.
//! `Execution` always follows a rollback. `UserDeclined` is ordinary control
//! flow and carries its own exit code so automation can tell it apart from
//! a fault.

use super::field_mapping::ConfigurationError;
use super::migration_id::MigrationIdError;
use super::ports::{ProvenanceRepositoryError, SchemaStoreError};

/// Exit code for a successful run.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code for a store or transaction failure.
pub const EXIT_EXECUTION: u8 = 1;
/// Exit code for invalid configuration.
pub const EXIT_CONFIGURATION: u8 = 2;
/// Exit code when the operator declined.
pub const EXIT_DECLINED: u8 = 3;
/// Exit code for an unsafe column addition.
pub const EXIT_SCHEMA_CONFLICT: u8 = 4;
/// Exit code when revert found nothing to work from.
pub const EXIT_PROVENANCE_NOT_FOUND: u8 = 5;

/// Failures raised while planning, applying, or reverting a migration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MigrationError {
    /// The field mapping or engine settings are invalid.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// A column cannot be added to a populated table.
    #[error(
        "cannot add column {column} to populated table {table}: it has no default and is not nullable"
    )]
    SchemaConflict {
        /// Managed table.
        table: String,
        /// First offending column.
        column: String,
    },
    /// The operator declined.
    #[error("operator declined {stage}")]
    UserDeclined {
        /// What was declined.
        stage: String,
    },
    /// A store statement or transaction step failed; nothing was committed.
    #[error("migration failed and was rolled back: {message}")]
    Execution {
        /// Underlying failure.
        message: String,
    },
    /// No provenance record exists and the inferred fallback was not taken.
    #[error("no provenance found for migration {migration_id}")]
    ProvenanceNotFound {
        /// Identifier or family that was looked up.
        migration_id: String,
    },
}

impl MigrationError {
    /// Build a declined error for `stage`.
    pub fn user_declined(stage: impl Into<String>) -> Self {
        Self::UserDeclined {
            stage: stage.into(),
        }
    }

    /// Build an execution error.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    /// Build a provenance-not-found error.
    pub fn provenance_not_found(migration_id: impl Into<String>) -> Self {
        Self::ProvenanceNotFound {
            migration_id: migration_id.into(),
        }
    }

    /// Process exit code for this failure.
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Execution { .. } => EXIT_EXECUTION,
            Self::Configuration(_) => EXIT_CONFIGURATION,
            Self::UserDeclined { .. } => EXIT_DECLINED,
            Self::SchemaConflict { .. } => EXIT_SCHEMA_CONFLICT,
            Self::ProvenanceNotFound { .. } => EXIT_PROVENANCE_NOT_FOUND,
        }
    }

    /// Whether the failure is the operator's choice rather than a fault.
    pub const fn is_declined(&self) -> bool {
        matches!(self, Self::UserDeclined { .. })
    }
}

impl From<SchemaStoreError> for MigrationError {
    fn from(error: SchemaStoreError) -> Self {
        Self::execution(error.to_string())
    }
}

impl From<ProvenanceRepositoryError> for MigrationError {
    fn from(error: ProvenanceRepositoryError) -> Self {
        Self::execution(error.to_string())
    }
}

impl From<MigrationIdError> for MigrationError {
    fn from(error: MigrationIdError) -> Self {
        Self::Configuration(ConfigurationError::InvalidSetting {
            setting: "migration_family".to_owned(),
            message: error.to_string(),
        })
    }
}
