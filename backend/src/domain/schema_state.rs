//! Snapshot of the managed table as the live store reports it.

use serde::Serialize;
use tracing::debug;

use super::column::ColumnDescriptor;
use super::ports::{SchemaStore, SchemaStoreError};

/// Observed state of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaState {
    /// Table that was probed.
    pub table_name: String,
    /// Whether the table exists.
    pub exists: bool,
    /// Columns in ordinal order; empty when the table is absent.
    pub columns: Vec<ColumnDescriptor>,
    /// Rows held at probe time; zero when the table is absent.
    pub row_count: u64,
}

impl SchemaState {
    /// State of a table that does not exist.
    pub fn absent(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            exists: false,
            columns: Vec::new(),
            row_count: 0,
        }
    }

    /// Whether a column named exactly `name` is present.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column.name == name)
    }

    /// Column names in ordinal order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }

    /// Whether existing rows would be affected by new columns.
    pub fn is_populated(&self) -> bool {
        self.row_count > 0
    }
}

/// Read-only inspection of `table_name`.
///
/// A store that has never been initialised reports the table as absent.
pub fn probe<S>(store: &mut S, table_name: &str) -> Result<SchemaState, SchemaStoreError>
where
    S: SchemaStore + ?Sized,
{
    if !store.table_exists(table_name)? {
        debug!(table = table_name, "probe: table absent");
        return Ok(SchemaState::absent(table_name));
    }

    let columns = store.list_columns(table_name)?;
    let row_count = store.row_count(table_name)?;
    debug!(
        table = table_name,
        columns = columns.len(),
        rows = row_count,
        "probe: table present"
    );
    Ok(SchemaState {
        table_name: table_name.to_owned(),
        exists: true,
        columns,
        row_count,
    })
}
