//! Structured migration identifiers.
//!
//! Identifiers render as `family@version`. Lookup compares both parts, so
//! families sharing a prefix never match each other.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Family used for identity-column migrations unless configured otherwise.
pub const DEFAULT_MIGRATION_FAMILY: &str = "user_identity_columns";
/// Maximum family length.
pub const MIGRATION_FAMILY_MAX: usize = 64;

static FAMILY_RE: OnceLock<Regex> = OnceLock::new();

fn family_regex() -> &'static Regex {
    FAMILY_RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9_]+$")
            .unwrap_or_else(|error| panic!("migration family regex failed to compile: {error}"))
    })
}

/// Validation errors for [`MigrationId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MigrationIdError {
    /// The family was empty.
    #[error("migration family must not be empty")]
    EmptyFamily,
    /// The family exceeded [`MIGRATION_FAMILY_MAX`].
    #[error("migration family must be at most {max} characters")]
    FamilyTooLong {
        /// Maximum accepted length.
        max: usize,
    },
    /// The family contained characters outside `[a-z0-9_]`.
    #[error("migration family may only contain lowercase letters, digits, or underscores")]
    InvalidFamily,
    /// The text had no `@` separator.
    #[error("migration id must look like family@version")]
    MissingSeparator,
    /// The version was not an unsigned integer.
    #[error("migration version must be an unsigned integer")]
    InvalidVersion,
}

/// Stable identifier of one migration run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MigrationId {
    family: String,
    version: u64,
}

impl MigrationId {
    /// Validate and construct an identifier.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chat_backend::domain::MigrationId;
    ///
    /// let id = MigrationId::new("user_identity_columns", 7).expect("valid id");
    /// assert_eq!(id.to_string(), "user_identity_columns@7");
    /// ```
    pub fn new(family: impl Into<String>, version: u64) -> Result<Self, MigrationIdError> {
        let family = family.into();
        validate_family(&family)?;
        Ok(Self { family, version })
    }

    /// Migration family.
    pub fn family(&self) -> &str {
        self.family.as_str()
    }

    /// Version within the family.
    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Check a family name without building an identifier.
pub fn validate_family(family: &str) -> Result<(), MigrationIdError> {
    if family.is_empty() {
        return Err(MigrationIdError::EmptyFamily);
    }
    if family.len() > MIGRATION_FAMILY_MAX {
        return Err(MigrationIdError::FamilyTooLong {
            max: MIGRATION_FAMILY_MAX,
        });
    }
    if !family_regex().is_match(family) {
        return Err(MigrationIdError::InvalidFamily);
    }
    Ok(())
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.family, self.version)
    }
}

impl FromStr for MigrationId {
    type Err = MigrationIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (family, version) = value
            .rsplit_once('@')
            .ok_or(MigrationIdError::MissingSeparator)?;
        let version = version
            .parse::<u64>()
            .map_err(|_| MigrationIdError::InvalidVersion)?;
        Self::new(family, version)
    }
}

impl TryFrom<String> for MigrationId {
    type Error = MigrationIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MigrationId> for String {
    fn from(value: MigrationId) -> Self {
        value.to_string()
    }
}
