//! Process configuration: engine settings and the host's field overrides.
//!
//! Overrides are plain data supplied at startup; nothing here validates
//! them beyond parsing. Validation belongs to
//! [`crate::domain::resolve_field_mapping`].

mod mapping_file;
mod settings;

pub use mapping_file::{load_field_overrides, load_optional_field_overrides, parse_field_overrides};
pub use settings::{DATABASE_URL_ENV, IdentitySchemaSettings};
