//! SQL rendering for the statements the PostgreSQL store issues.
//!
//! Identifiers are always double-quoted and literals single-quoted, with
//! embedded quotes doubled, so host-supplied names and defaults never reach
//! the server unescaped.

use crate::domain::column::{ColumnDefault, ColumnDefinition};

pub(crate) fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

pub(crate) fn quote_literal(literal: &str) -> String {
    format!("'{}'", literal.replace('\'', "''"))
}

pub(crate) fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_identifier(schema), quote_identifier(table))
}

pub(crate) fn render_column(column: &ColumnDefinition) -> String {
    let mut sql = format!(
        "{} {}",
        quote_identifier(column.name.as_str()),
        column.column_type.sql_type()
    );
    if column.is_identity {
        sql.push_str(" GENERATED BY DEFAULT AS IDENTITY");
    }
    if !column.is_nullable {
        sql.push_str(" NOT NULL");
    }
    match &column.default {
        Some(ColumnDefault::Literal(value)) => {
            sql.push_str(" DEFAULT ");
            sql.push_str(&quote_literal(value));
        }
        Some(ColumnDefault::CurrentTimestamp) => sql.push_str(" DEFAULT CURRENT_TIMESTAMP"),
        None => {}
    }
    if column.is_primary_key {
        sql.push_str(" PRIMARY KEY");
    }
    sql
}

pub(crate) fn create_table_sql(schema: &str, table: &str, columns: &[ColumnDefinition]) -> String {
    let body = columns
        .iter()
        .map(render_column)
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({body})", qualified_table(schema, table))
}

pub(crate) fn add_column_sql(schema: &str, table: &str, column: &ColumnDefinition) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {}",
        qualified_table(schema, table),
        render_column(column)
    )
}

pub(crate) fn drop_column_sql(schema: &str, table: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN {}",
        qualified_table(schema, table),
        quote_identifier(column)
    )
}

pub(crate) fn drop_table_sql(schema: &str, table: &str) -> String {
    format!("DROP TABLE {}", qualified_table(schema, table))
}

pub(crate) fn row_count_sql(schema: &str, table: &str) -> String {
    format!("SELECT COUNT(*) AS row_count FROM {}", qualified_table(schema, table))
}
