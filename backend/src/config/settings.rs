//! Engine settings loaded via OrthoConfig.

use std::env;
use std::path::PathBuf;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::{DEFAULT_MIGRATION_FAMILY, DEFAULT_TABLE_NAME, EngineOptions};

/// Fallback connection variable shared with the host application.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Settings for the identity schema engine.
///
/// Layered from defaults, configuration files, and `CHAT_SCHEMA_*`
/// environment variables.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "CHAT_SCHEMA")]
pub struct IdentitySchemaSettings {
    /// PostgreSQL connection URL.
    pub database_url: Option<String>,
    /// Managed table name.
    pub table_name: Option<String>,
    /// JSON file holding the host's field overrides.
    pub mapping_path: Option<PathBuf>,
    /// Whether revert may fall back to columns derived from the mapping.
    pub allow_inferred_revert: Option<bool>,
    /// Family stamped on migration ids.
    pub migration_family: Option<String>,
}

impl IdentitySchemaSettings {
    /// Configured URL, falling back to `DATABASE_URL`.
    pub fn database_url(&self) -> Option<String> {
        self.database_url
            .clone()
            .or_else(|| env::var(DATABASE_URL_ENV).ok())
            .filter(|url| !url.trim().is_empty())
    }

    /// Configured table, falling back to `users`.
    pub fn table_name(&self) -> &str {
        self.table_name.as_deref().unwrap_or(DEFAULT_TABLE_NAME)
    }

    /// Configured family, falling back to the identity-column family.
    pub fn migration_family(&self) -> &str {
        self.migration_family
            .as_deref()
            .unwrap_or(DEFAULT_MIGRATION_FAMILY)
    }

    /// Whether the inferred revert path is allowed; on unless disabled.
    pub fn allow_inferred_revert(&self) -> bool {
        self.allow_inferred_revert.unwrap_or(true)
    }

    /// Engine options derived from these settings.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            table_name: self.table_name().to_owned(),
            migration_family: self.migration_family().to_owned(),
            allow_inferred_revert: self.allow_inferred_revert(),
        }
    }
}
