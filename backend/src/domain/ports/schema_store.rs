//! Port abstraction over the relational store whose user table is managed.

use crate::domain::column::{ColumnDefinition, ColumnDescriptor};

use super::define_port_error;

define_port_error! {
    /// Errors raised by schema store adapters.
    pub enum SchemaStoreError {
        /// Connection to the backing datastore failed.
        Connection { message: String } =>
            "schema store connection failed: {message}",
        /// A catalog query or DDL statement failed.
        Query { message: String } =>
            "schema store query failed: {message}",
    }
}

/// Driven port for schema inspection, DDL, and transaction control.
///
/// Every method takes `&mut self`: one adapter instance owns one session, and
/// the transaction opened by [`SchemaStore::begin`] belongs to the caller
/// until it commits or rolls back.
#[cfg_attr(test, mockall::automock)]
pub trait SchemaStore: Send {
    /// Whether `table` exists.
    fn table_exists(&mut self, table: &str) -> Result<bool, SchemaStoreError>;

    /// Columns of `table` in ordinal order.
    fn list_columns(&mut self, table: &str) -> Result<Vec<ColumnDescriptor>, SchemaStoreError>;

    /// Number of rows currently held by `table`.
    fn row_count(&mut self, table: &str) -> Result<u64, SchemaStoreError>;

    /// Create `table` with `columns` in the given order.
    fn create_table(
        &mut self,
        table: &str,
        columns: &[ColumnDefinition],
    ) -> Result<(), SchemaStoreError>;

    /// Append one column to `table`.
    fn add_column(&mut self, table: &str, column: &ColumnDefinition)
    -> Result<(), SchemaStoreError>;

    /// Drop one column from `table`.
    fn drop_column(&mut self, table: &str, column: &str) -> Result<(), SchemaStoreError>;

    /// Drop `table` entirely.
    fn drop_table(&mut self, table: &str) -> Result<(), SchemaStoreError>;

    /// Open a transaction.
    fn begin(&mut self) -> Result<(), SchemaStoreError>;

    /// Commit the open transaction.
    fn commit(&mut self) -> Result<(), SchemaStoreError>;

    /// Discard the open transaction.
    fn rollback(&mut self) -> Result<(), SchemaStoreError>;
}
