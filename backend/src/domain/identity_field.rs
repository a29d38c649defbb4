//! The three abstract identity fields the chat engine manages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Logical identity field, independent of how the host names its columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityField {
    /// Human-readable display name.
    FullName,
    /// Avatar image location.
    Avatar,
    /// Free-form biography.
    Bio,
}

impl IdentityField {
    /// Every field in mapping order.
    pub const ALL: [Self; 3] = [Self::FullName, Self::Avatar, Self::Bio];

    /// Configuration key for this field.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chat_backend::domain::IdentityField;
    ///
    /// assert_eq!(IdentityField::FullName.key(), "full_name");
    /// ```
    pub const fn key(self) -> &'static str {
        match self {
            Self::FullName => "full_name",
            Self::Avatar => "avatar",
            Self::Bio => "bio",
        }
    }

    /// Look up a field by its configuration key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == key)
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::FullName => 0,
            Self::Avatar => 1,
            Self::Bio => 2,
        }
    }
}

impl fmt::Display for IdentityField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Error returned when parsing an unrecognised field key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown identity field: {key}")]
pub struct UnknownIdentityField {
    /// The rejected key.
    pub key: String,
}

impl FromStr for IdentityField {
    type Err = UnknownIdentityField;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_key(value).ok_or_else(|| UnknownIdentityField {
            key: value.to_owned(),
        })
    }
}
