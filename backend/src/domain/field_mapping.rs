//! Host field mapping: overrides as supplied, and the resolved total mapping.
//!
//! The host application describes how the abstract identity fields map onto
//! its own user table. [`FieldOverrides`] is that description as plain data;
//! [`resolve_field_mapping`] validates it and fills gaps from the built-in
//! defaults. Resolution is pure, so a mistyped key is reported before any
//! store is touched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::column::{ColumnDefault, ColumnDefinition, ColumnName, ColumnNameError, ColumnType};
use super::identity_field::IdentityField;

/// Default literal for `full_name` on rows that predate the column.
pub const DEFAULT_FULL_NAME: &str = "User";
/// Default literal for `avatar` on rows that predate the column.
pub const DEFAULT_AVATAR_URL: &str = "https://example.com/default-avatar.png";

/// One host-supplied override, exactly as configured.
///
/// Accepts either a bare column name or an object:
/// `{ "name": "username", "default": "anon", "nullable": true }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ColumnOverrideRepr")]
pub struct ColumnOverride {
    /// Concrete column name, validated during resolution.
    pub name: String,
    /// Literal default for rows that predate the column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Whether NULL is allowed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
}

impl ColumnOverride {
    /// Override naming only the concrete column.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            nullable: None,
        }
    }

    /// Attach a literal default.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Set the nullability flag.
    #[must_use]
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColumnOverrideRepr {
    Name(String),
    Spec {
        #[serde(alias = "concrete_name")]
        name: String,
        #[serde(default)]
        default: Option<String>,
        #[serde(default, alias = "isNullable")]
        nullable: Option<bool>,
    },
}

impl From<ColumnOverrideRepr> for ColumnOverride {
    fn from(value: ColumnOverrideRepr) -> Self {
        match value {
            ColumnOverrideRepr::Name(name) => Self::named(name),
            ColumnOverrideRepr::Spec {
                name,
                default,
                nullable,
            } => Self {
                name,
                default,
                nullable,
            },
        }
    }
}

/// Partial map of overrides keyed by configuration key.
///
/// Keys are kept as strings so resolution can reject unknown ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldOverrides(BTreeMap<String, ColumnOverride>);

impl FieldOverrides {
    /// Empty overrides; resolution yields the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace one override.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, column: ColumnOverride) -> Self {
        self.0.insert(key.into(), column);
        self
    }

    /// Iterate overrides in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnOverride)> {
        self.0.iter().map(|(key, column)| (key.as_str(), column))
    }

    /// Whether no overrides were supplied.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, ColumnOverride)> for FieldOverrides {
    fn from_iter<T: IntoIterator<Item = (String, ColumnOverride)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Resolved definition of one mapped column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Concrete column name.
    pub concrete_name: ColumnName,
    /// Literal default, if any.
    pub default: Option<String>,
    /// Explicit nullability, if any.
    pub nullable: Option<bool>,
}

impl ColumnSpec {
    /// Whether NULL is allowed; absent means `false`.
    pub fn is_nullable(&self) -> bool {
        self.nullable.unwrap_or(false)
    }

    /// Column definition used for DDL.
    pub fn to_definition(&self) -> ColumnDefinition {
        ColumnDefinition {
            name: self.concrete_name.clone(),
            column_type: ColumnType::Text,
            is_nullable: self.is_nullable(),
            default: self.default.clone().map(ColumnDefault::Literal),
            is_primary_key: false,
            is_identity: false,
        }
    }

    fn built_in(field: IdentityField) -> Self {
        let (default, nullable) = match field {
            IdentityField::FullName => (Some(DEFAULT_FULL_NAME), None),
            IdentityField::Avatar => (Some(DEFAULT_AVATAR_URL), None),
            IdentityField::Bio => (None, Some(true)),
        };
        Self {
            concrete_name: ColumnName::from_static(field.key()),
            default: default.map(str::to_owned),
            nullable,
        }
    }
}

/// Errors raised while resolving host overrides.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// Overrides named keys outside the fixed field set.
    #[error("unknown identity field key(s): {}; expected full_name, avatar, or bio", .keys.join(", "))]
    UnknownFields {
        /// Every rejected key, in key order.
        keys: Vec<String>,
    },
    /// A concrete column name failed validation.
    #[error("invalid column name {name:?} for {field}: {source}")]
    InvalidColumnName {
        /// Field whose override was rejected.
        field: IdentityField,
        /// The rejected name.
        name: String,
        /// Validation failure.
        source: ColumnNameError,
    },
    /// A field was mapped onto a system column.
    #[error("{field} cannot be mapped to reserved column {column}")]
    ReservedColumn {
        /// Offending field.
        field: IdentityField,
        /// Reserved column name.
        column: String,
    },
    /// Two fields share a column but disagree on its definition.
    #[error("{first} and {second} share column {column} with different definitions")]
    ConflictingColumnSpecs {
        /// Column both fields map to.
        column: String,
        /// First field in mapping order.
        first: IdentityField,
        /// Second field in mapping order.
        second: IdentityField,
    },
    /// An engine setting outside the mapping was rejected.
    #[error("invalid setting {setting}: {message}")]
    InvalidSetting {
        /// Setting name.
        setting: String,
        /// Failure detail.
        message: String,
    },
    /// The overrides document could not be read or parsed.
    #[error("failed to load field mapping from {source_name}: {message}")]
    Unreadable {
        /// Where the overrides came from.
        source_name: String,
        /// Failure detail.
        message: String,
    },
}

/// Total mapping from every abstract field to a concrete column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMapping {
    columns: [ColumnSpec; 3],
}

impl FieldMapping {
    /// Mapping produced when the host supplies no overrides.
    pub fn defaults() -> Self {
        Self {
            columns: IdentityField::ALL.map(ColumnSpec::built_in),
        }
    }

    /// Column definition for `field`.
    pub fn get(&self, field: IdentityField) -> &ColumnSpec {
        &self.columns[field.index()]
    }

    /// Iterate fields and their columns in mapping order.
    pub fn iter(&self) -> impl Iterator<Item = (IdentityField, &ColumnSpec)> {
        IdentityField::ALL.into_iter().zip(self.columns.iter())
    }

    /// Definitions of the mapped columns, in mapping order, one per concrete name.
    pub fn column_definitions(&self) -> Vec<ColumnDefinition> {
        let mut definitions: Vec<ColumnDefinition> = Vec::with_capacity(self.columns.len());
        for (_, spec) in self.iter() {
            if definitions
                .iter()
                .all(|existing| existing.name != spec.concrete_name)
            {
                definitions.push(spec.to_definition());
            }
        }
        definitions
    }

    /// Concrete column names, in mapping order, without duplicates.
    pub fn column_names(&self) -> Vec<String> {
        self.column_definitions()
            .into_iter()
            .map(|definition| definition.name.into())
            .collect()
    }
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Merge host overrides with the built-in defaults.
///
/// Every field ends up mapped: an override wins when present, otherwise the
/// default applies. Unknown keys fail the whole resolution.
///
/// # Examples
///
/// ```rust
/// use chat_backend::domain::{
///     ColumnOverride, FieldOverrides, IdentityField, resolve_field_mapping,
/// };
///
/// let overrides = FieldOverrides::new().with("full_name", ColumnOverride::named("username"));
/// let mapping = resolve_field_mapping(&overrides).expect("overrides are valid");
///
/// assert_eq!(mapping.get(IdentityField::FullName).concrete_name.as_str(), "username");
/// assert_eq!(mapping.get(IdentityField::Bio).concrete_name.as_str(), "bio");
/// ```
pub fn resolve_field_mapping(
    overrides: &FieldOverrides,
) -> Result<FieldMapping, ConfigurationError> {
    reject_unknown_keys(overrides)?;

    let mut columns = IdentityField::ALL.map(ColumnSpec::built_in);
    for (key, column) in overrides.iter() {
        let Some(field) = IdentityField::from_key(key) else {
            continue;
        };
        columns[field.index()] = resolve_override(field, column)?;
    }

    let mapping = FieldMapping { columns };
    reject_conflicting_specs(&mapping)?;
    Ok(mapping)
}

fn reject_unknown_keys(overrides: &FieldOverrides) -> Result<(), ConfigurationError> {
    let keys: Vec<String> = overrides
        .iter()
        .filter(|(key, _)| IdentityField::from_key(key).is_none())
        .map(|(key, _)| key.to_owned())
        .collect();
    if keys.is_empty() {
        Ok(())
    } else {
        Err(ConfigurationError::UnknownFields { keys })
    }
}

fn resolve_override(
    field: IdentityField,
    column: &ColumnOverride,
) -> Result<ColumnSpec, ConfigurationError> {
    let concrete_name = ColumnName::new(column.name.as_str()).map_err(|source| {
        ConfigurationError::InvalidColumnName {
            field,
            name: column.name.clone(),
            source,
        }
    })?;
    if concrete_name.is_system() {
        return Err(ConfigurationError::ReservedColumn {
            field,
            column: concrete_name.into(),
        });
    }
    Ok(ColumnSpec {
        concrete_name,
        default: column.default.clone(),
        nullable: column.nullable,
    })
}

fn reject_conflicting_specs(mapping: &FieldMapping) -> Result<(), ConfigurationError> {
    let entries: Vec<(IdentityField, &ColumnSpec)> = mapping.iter().collect();
    for (position, (first, first_spec)) in entries.iter().enumerate() {
        for (second, second_spec) in entries.iter().skip(position + 1) {
            if first_spec.concrete_name == second_spec.concrete_name
                && first_spec.to_definition() != second_spec.to_definition()
            {
                return Err(ConfigurationError::ConflictingColumnSpecs {
                    column: first_spec.concrete_name.to_string(),
                    first: *first,
                    second: *second,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "field_mapping_tests.rs"]
mod tests;
