//! Identity records whose fixed accessors delegate to mapped columns.
//!
//! [`IdentityRecordType`] is built once per [`FieldMapping`] and wraps host
//! rows. Chat logic reads and writes `full_name`, `avatar`, and `bio` without
//! knowing the host's column names. Values pass through untouched.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use super::field_mapping::FieldMapping;
use super::identity_field::IdentityField;

/// Concrete row keyed by column name; `None` is SQL NULL.
pub type Row = BTreeMap<String, Option<String>>;

/// Accessor wiring derived from one mapping.
///
/// Cloning is cheap; every record built from the same type shares its
/// column table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecordType {
    columns: Arc<[String; 3]>,
}

impl IdentityRecordType {
    /// Wire accessors to the concrete columns of `mapping`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chat_backend::domain::{
    ///     ColumnOverride, FieldOverrides, IdentityField, IdentityRecordType,
    ///     resolve_field_mapping,
    /// };
    ///
    /// let overrides = FieldOverrides::new().with("full_name", ColumnOverride::named("username"));
    /// let mapping = resolve_field_mapping(&overrides).expect("valid overrides");
    /// let record_type = IdentityRecordType::build(&mapping);
    ///
    /// let mut record = record_type.empty_record();
    /// record.set_full_name("Ada");
    ///
    /// assert_eq!(record_type.column_for(IdentityField::FullName), "username");
    /// assert_eq!(record.full_name(), Some("Ada"));
    /// ```
    pub fn build(mapping: &FieldMapping) -> Self {
        let columns =
            IdentityField::ALL.map(|field| mapping.get(field).concrete_name.to_string());
        Self {
            columns: Arc::new(columns),
        }
    }

    /// Concrete column backing `field`.
    pub fn column_for(&self, field: IdentityField) -> &str {
        self.columns[field.index()].as_str()
    }

    /// Wrap an existing row.
    pub fn wrap(&self, row: Row) -> IdentityRecord {
        IdentityRecord {
            record_type: self.clone(),
            row,
        }
    }

    /// Record over an empty row.
    pub fn empty_record(&self) -> IdentityRecord {
        self.wrap(Row::new())
    }
}

/// One host row seen through the abstract identity accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    record_type: IdentityRecordType,
    row: Row,
}

impl IdentityRecord {
    /// Value of `field`; `None` when unset or NULL.
    pub fn get(&self, field: IdentityField) -> Option<&str> {
        self.row
            .get(self.record_type.column_for(field))
            .and_then(Option::as_deref)
    }

    /// Store `value` verbatim in the column backing `field`.
    pub fn set(&mut self, field: IdentityField, value: impl Into<String>) {
        let column = self.record_type.column_for(field).to_owned();
        self.row.insert(column, Some(value.into()));
    }

    /// Set the column backing `field` to NULL.
    pub fn clear(&mut self, field: IdentityField) {
        let column = self.record_type.column_for(field).to_owned();
        self.row.insert(column, None);
    }

    /// Display name.
    pub fn full_name(&self) -> Option<&str> {
        self.get(IdentityField::FullName)
    }

    /// Set the display name.
    pub fn set_full_name(&mut self, value: impl Into<String>) {
        self.set(IdentityField::FullName, value);
    }

    /// Avatar location.
    pub fn avatar(&self) -> Option<&str> {
        self.get(IdentityField::Avatar)
    }

    /// Set the avatar location.
    pub fn set_avatar(&mut self, value: impl Into<String>) {
        self.set(IdentityField::Avatar, value);
    }

    /// Biography.
    pub fn bio(&self) -> Option<&str> {
        self.get(IdentityField::Bio)
    }

    /// Set the biography.
    pub fn set_bio(&mut self, value: impl Into<String>) {
        self.set(IdentityField::Bio, value);
    }

    /// Underlying row, including host columns outside the mapping.
    pub fn row(&self) -> &Row {
        &self.row
    }

    /// Hand the row back for persistence.
    pub fn into_row(self) -> Row {
        self.row
    }
}

impl Serialize for IdentityRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("IdentityRecord", 3)?;
        state.serialize_field("full_name", &self.full_name())?;
        state.serialize_field("avatar", &self.avatar())?;
        state.serialize_field("bio", &self.bio())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;
    use crate::domain::field_mapping::{ColumnOverride, FieldOverrides, resolve_field_mapping};

    #[fixture]
    fn host_type() -> IdentityRecordType {
        let overrides = FieldOverrides::new()
            .with("full_name", ColumnOverride::named("username"))
            .with("avatar", ColumnOverride::named("picture_url"));
        IdentityRecordType::build(&resolve_field_mapping(&overrides).expect("valid overrides"))
    }

    #[rstest]
    #[case(IdentityField::FullName, "")]
    #[case(IdentityField::Avatar, "https://cdn.example/ünïcode.png")]
    #[case(IdentityField::Bio, "  leading and trailing  \n")]
    #[case(IdentityField::Bio, "İstanbul")]
    fn set_then_get_returns_exact_value(
        host_type: IdentityRecordType,
        #[case] field: IdentityField,
        #[case] value: &str,
    ) {
        let mut record = host_type.empty_record();

        record.set(field, value);

        assert_eq!(record.get(field), Some(value));
    }

    #[rstest]
    fn accessors_write_mapped_columns(host_type: IdentityRecordType) {
        let mut record = host_type.wrap(Row::from([("id".to_owned(), Some("7".to_owned()))]));

        record.set_full_name("Grace");
        record.set_avatar("https://example.com/grace.png");
        record.clear(IdentityField::Bio);

        let row = record.into_row();
        assert_eq!(row.get("username"), Some(&Some("Grace".to_owned())));
        assert_eq!(
            row.get("picture_url"),
            Some(&Some("https://example.com/grace.png".to_owned()))
        );
        assert_eq!(row.get("bio"), Some(&None));
        assert_eq!(row.get("id"), Some(&Some("7".to_owned())));
    }

    #[rstest]
    fn identical_mappings_wire_identically() {
        let first = IdentityRecordType::build(&FieldMapping::defaults());
        let second = IdentityRecordType::build(&FieldMapping::defaults());

        assert_eq!(first, second);
    }

    #[rstest]
    fn serializes_to_normalized_view(host_type: IdentityRecordType) {
        let mut record = host_type.empty_record();
        record.set_full_name("Ada");

        let value = serde_json::to_value(&record).expect("serializes");

        assert_eq!(value, json!({ "full_name": "Ada", "avatar": null, "bio": null }));
    }
}
