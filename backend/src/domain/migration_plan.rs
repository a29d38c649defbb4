//! Diff of required columns against the live schema.
//!
//! Column identity is concrete-name equality. A present column whose type,
//! nullability, or default differs from the mapping is left as it is.

use serde::Serialize;

use super::column::{ColumnDefinition, system_columns};
use super::field_mapping::FieldMapping;
use super::schema_state::SchemaState;

/// Action needed to bring the table in line with the mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MigrationPlan {
    /// The table is absent; create it with mapped then system columns.
    CreateTable {
        /// Table to create.
        table_name: String,
        /// Columns in creation order.
        columns: Vec<ColumnDefinition>,
    },
    /// The table exists but lacks some mapped columns.
    AddColumns {
        /// Table to extend.
        table_name: String,
        /// Missing columns in mapping order.
        columns: Vec<ColumnDefinition>,
    },
    /// Nothing to do.
    Noop {
        /// Table that already satisfies the mapping.
        table_name: String,
    },
}

impl MigrationPlan {
    /// Table the plan targets.
    pub fn table_name(&self) -> &str {
        match self {
            Self::CreateTable { table_name, .. }
            | Self::AddColumns { table_name, .. }
            | Self::Noop { table_name } => table_name,
        }
    }

    /// Columns the plan would create; empty for `Noop`.
    pub fn columns(&self) -> &[ColumnDefinition] {
        match self {
            Self::CreateTable { columns, .. } | Self::AddColumns { columns, .. } => columns,
            Self::Noop { .. } => &[],
        }
    }

    /// Names of the columns the plan would create.
    pub fn column_names(&self) -> Vec<String> {
        self.columns()
            .iter()
            .map(|column| column.name.to_string())
            .collect()
    }

    /// Short label used in logs and command output.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::CreateTable { .. } => "create_table",
            Self::AddColumns { .. } => "add_columns",
            Self::Noop { .. } => "noop",
        }
    }

    /// Whether applying the plan changes nothing.
    pub const fn is_noop(&self) -> bool {
        matches!(self, Self::Noop { .. })
    }
}

/// Compute the plan for `mapping` against `state`.
///
/// # Examples
///
/// ```rust
/// use chat_backend::domain::{FieldMapping, MigrationPlan, SchemaState, plan_migration};
///
/// let plan = plan_migration(&FieldMapping::defaults(), &SchemaState::absent("users"));
///
/// assert!(matches!(plan, MigrationPlan::CreateTable { .. }));
/// assert_eq!(
///     plan.column_names(),
///     vec!["full_name", "avatar", "bio", "id", "created_at", "updated_at"],
/// );
/// ```
pub fn plan_migration(mapping: &FieldMapping, state: &SchemaState) -> MigrationPlan {
    let table_name = state.table_name.clone();
    let mapped = mapping.column_definitions();

    if !state.exists {
        let mut columns = mapped;
        columns.extend(system_columns());
        return MigrationPlan::CreateTable {
            table_name,
            columns,
        };
    }

    let missing: Vec<ColumnDefinition> = mapped
        .into_iter()
        .filter(|column| !state.has_column(column.name.as_str()))
        .collect();
    if missing.is_empty() {
        MigrationPlan::Noop { table_name }
    } else {
        MigrationPlan::AddColumns {
            table_name,
            columns: missing,
        }
    }
}
