//! Column model shared by planning, execution, and revert.
//!
//! [`ColumnName`] is the validated identifier used whenever the engine
//! issues DDL. [`ColumnDescriptor`] is what the live store reports and is
//! deliberately left unvalidated: host tables may carry names the engine
//! would never create.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Maximum identifier length accepted by PostgreSQL.
pub const COLUMN_NAME_MAX: usize = 63;

/// Surrogate key column present on every table the engine creates.
pub const ID_COLUMN: &str = "id";
/// Creation timestamp column present on every table the engine creates.
pub const CREATED_AT_COLUMN: &str = "created_at";
/// Modification timestamp column present on every table the engine creates.
pub const UPDATED_AT_COLUMN: &str = "updated_at";
/// System columns in creation order.
pub const SYSTEM_COLUMN_NAMES: [&str; 3] = [ID_COLUMN, CREATED_AT_COLUMN, UPDATED_AT_COLUMN];

static COLUMN_NAME_RE: OnceLock<Regex> = OnceLock::new();

fn column_name_regex() -> &'static Regex {
    COLUMN_NAME_RE.get_or_init(|| {
        // Length is enforced separately; this regex constrains allowed characters.
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
            .unwrap_or_else(|error| panic!("column name regex failed to compile: {error}"))
    })
}

/// Validation errors returned by [`ColumnName::new`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColumnNameError {
    /// The name was empty.
    #[error("column name must not be empty")]
    Empty,
    /// The name exceeded [`COLUMN_NAME_MAX`] bytes.
    #[error("column name must be at most {max} characters")]
    TooLong {
        /// Maximum accepted length.
        max: usize,
    },
    /// The name contained characters outside `[A-Za-z0-9_]` or began with a digit.
    #[error("column name may only contain letters, digits, or underscores and must not start with a digit")]
    InvalidCharacters,
}

/// Validated concrete column identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ColumnName(String);

impl ColumnName {
    /// Validate and construct a column name.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chat_backend::domain::ColumnName;
    ///
    /// assert!(ColumnName::new("display_name").is_ok());
    /// assert!(ColumnName::new("1st").is_err());
    /// ```
    pub fn new(name: impl Into<String>) -> Result<Self, ColumnNameError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ColumnNameError::Empty);
        }
        if name.len() > COLUMN_NAME_MAX {
            return Err(ColumnNameError::TooLong {
                max: COLUMN_NAME_MAX,
            });
        }
        if !column_name_regex().is_match(&name) {
            return Err(ColumnNameError::InvalidCharacters);
        }
        Ok(Self(name))
    }

    /// Borrow the identifier.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Whether this is one of [`SYSTEM_COLUMN_NAMES`].
    pub fn is_system(&self) -> bool {
        is_system_column(self.as_str())
    }

    /// Name known valid at compile time.
    pub(crate) fn from_static(name: &'static str) -> Self {
        Self(name.to_owned())
    }
}

impl AsRef<str> for ColumnName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ColumnName> for String {
    fn from(value: ColumnName) -> Self {
        value.0
    }
}

impl TryFrom<String> for ColumnName {
    type Error = ColumnNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Whether `name` is one of the system columns.
pub fn is_system_column(name: &str) -> bool {
    SYSTEM_COLUMN_NAMES.contains(&name)
}

/// Storage type of a column the engine creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Unbounded text; every mapped identity column uses this.
    Text,
    /// 32-bit integer, used for the surrogate key.
    Integer,
    /// Timestamp without time zone.
    Timestamp,
}

impl ColumnType {
    /// SQL spelling of the type.
    pub const fn sql_type(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Timestamp => "timestamp",
        }
    }
}

/// Default applied to existing and future rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnDefault {
    /// A string literal, stored verbatim.
    Literal(String),
    /// The transaction timestamp at insert time.
    CurrentTimestamp,
}

/// Full definition of a column the engine may create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Concrete column name.
    pub name: ColumnName,
    /// Storage type.
    pub column_type: ColumnType,
    /// Whether NULL is allowed.
    pub is_nullable: bool,
    /// Optional default.
    pub default: Option<ColumnDefault>,
    /// Whether the column is the primary key.
    pub is_primary_key: bool,
    /// Whether values are generated by the store.
    pub is_identity: bool,
}

impl ColumnDefinition {
    /// Whether existing rows would receive a value when this column is added.
    ///
    /// A column that is neither nullable nor defaulted cannot be added to a
    /// populated table.
    pub fn is_safe_for_populated_table(&self) -> bool {
        self.is_nullable || self.default.is_some() || self.is_identity
    }
}

/// System columns appended to every table the engine creates.
pub fn system_columns() -> [ColumnDefinition; 3] {
    [
        ColumnDefinition {
            name: ColumnName::from_static(ID_COLUMN),
            column_type: ColumnType::Integer,
            is_nullable: false,
            default: None,
            is_primary_key: true,
            is_identity: true,
        },
        timestamp_column(CREATED_AT_COLUMN),
        timestamp_column(UPDATED_AT_COLUMN),
    ]
}

fn timestamp_column(name: &'static str) -> ColumnDefinition {
    ColumnDefinition {
        name: ColumnName::from_static(name),
        column_type: ColumnType::Timestamp,
        is_nullable: false,
        default: Some(ColumnDefault::CurrentTimestamp),
        is_primary_key: false,
        is_identity: false,
    }
}

/// Column as reported by the live store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name exactly as stored.
    pub name: String,
    /// Store-specific type name.
    pub data_type: String,
    /// Whether NULL is allowed.
    pub is_nullable: bool,
    /// Default expression, if any.
    pub default: Option<String>,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("full_name")]
    #[case("_private")]
    #[case("Avatar2")]
    fn accepts_plain_identifiers(#[case] name: &str) {
        let column = ColumnName::new(name).expect("name should be valid");
        assert_eq!(column.as_str(), name);
    }

    #[rstest]
    #[case("", ColumnNameError::Empty)]
    #[case("2fa", ColumnNameError::InvalidCharacters)]
    #[case("user name", ColumnNameError::InvalidCharacters)]
    #[case("bio\"; DROP TABLE users; --", ColumnNameError::InvalidCharacters)]
    fn rejects_unsafe_identifiers(#[case] name: &str, #[case] expected: ColumnNameError) {
        assert_eq!(ColumnName::new(name), Err(expected));
    }

    #[rstest]
    fn rejects_overlong_identifiers() {
        let name = "a".repeat(COLUMN_NAME_MAX + 1);
        assert_eq!(
            ColumnName::new(name),
            Err(ColumnNameError::TooLong {
                max: COLUMN_NAME_MAX
            })
        );
    }

    #[rstest]
    fn system_columns_follow_creation_order() {
        let names = system_columns().map(|column| column.name.to_string());
        assert_eq!(names, SYSTEM_COLUMN_NAMES.map(str::to_owned));
        assert!(system_columns().iter().all(ColumnDefinition::is_safe_for_populated_table));
    }

    #[rstest]
    #[case(false, None, false)]
    #[case(true, None, true)]
    #[case(false, Some(ColumnDefault::Literal("x".to_owned())), true)]
    fn populated_table_safety_requires_default_or_null(
        #[case] is_nullable: bool,
        #[case] default: Option<ColumnDefault>,
        #[case] expected: bool,
    ) {
        let column = ColumnDefinition {
            name: ColumnName::new("bio").expect("valid name"),
            column_type: ColumnType::Text,
            is_nullable,
            default,
            is_primary_key: false,
            is_identity: false,
        };
        assert_eq!(column.is_safe_for_populated_table(), expected);
    }
}
