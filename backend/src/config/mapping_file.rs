//! Loads the host's field overrides from a JSON document.
//!
//! Two shapes are accepted: a bare object keyed by field name, or the host
//! application's `{ "User": { "field_mapping": { ... } } }` wrapper. Keys are
//! kept verbatim so resolution can reject unknown ones.

use std::path::Path;

use cap_std::{ambient_authority, fs::Dir};
use serde::Deserialize;
use tracing::debug;

use crate::domain::{ConfigurationError, FieldOverrides};

#[derive(Deserialize)]
#[serde(untagged)]
enum MappingDocument {
    Wrapped {
        #[serde(rename = "User")]
        user: EntitySection,
    },
    Direct(FieldOverrides),
}

#[derive(Deserialize)]
struct EntitySection {
    #[serde(default)]
    field_mapping: FieldOverrides,
}

/// Parse overrides from `contents`; `source_name` labels errors.
pub fn parse_field_overrides(
    source_name: &str,
    contents: &str,
) -> Result<FieldOverrides, ConfigurationError> {
    let document: MappingDocument =
        serde_json::from_str(contents).map_err(|error| ConfigurationError::Unreadable {
            source_name: source_name.to_owned(),
            message: error.to_string(),
        })?;
    Ok(match document {
        MappingDocument::Wrapped { user } => user.field_mapping,
        MappingDocument::Direct(overrides) => overrides,
    })
}

/// Read and parse the overrides file at `path`.
pub fn load_field_overrides(path: &Path) -> Result<FieldOverrides, ConfigurationError> {
    let source_name = path.display().to_string();
    let unreadable = |message: String| ConfigurationError::Unreadable {
        source_name: source_name.clone(),
        message,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| unreadable("mapping path must name a file".to_owned()))?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .map_err(|error| unreadable(error.to_string()))?;
    let contents = dir
        .read_to_string(Path::new(file_name))
        .map_err(|error| unreadable(error.to_string()))?;

    let overrides = parse_field_overrides(&source_name, &contents)?;
    debug!(path = %source_name, keys = overrides.iter().count(), "field overrides loaded");
    Ok(overrides)
}

/// Overrides from `path`, or none when no file is configured.
pub fn load_optional_field_overrides(
    path: Option<&Path>,
) -> Result<FieldOverrides, ConfigurationError> {
    path.map_or_else(|| Ok(FieldOverrides::new()), load_field_overrides)
}
