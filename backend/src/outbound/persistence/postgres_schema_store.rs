//! PostgreSQL adapter for the schema store and provenance ports.
//!
//! One [`Client`] session backs both ports, so DDL and provenance writes
//! issued between `begin` and `commit` land in one transaction. Catalog
//! reads go to `pg_catalog` directly.

use chrono::{DateTime, Utc};
use postgres::error::SqlState;
use postgres::{Client, NoTls, Row};
use tracing::debug;

use super::postgres_ddl::{
    add_column_sql, create_table_sql, drop_column_sql, drop_table_sql, qualified_table,
    row_count_sql,
};
use crate::domain::column::{ColumnDefinition, ColumnDescriptor};
use crate::domain::migration_id::MigrationId;
use crate::domain::ports::{
    ProvenanceKind, ProvenanceRecord, ProvenanceRepository, ProvenanceRepositoryError,
    SchemaStore, SchemaStoreError,
};

/// Schema holding the managed table unless configured otherwise.
pub const DEFAULT_SCHEMA: &str = "public";
/// Bookkeeping table holding provenance records.
pub const PROVENANCE_TABLE: &str = "chat_schema_migrations";

/// Schema store and provenance repository over one PostgreSQL session.
pub struct PostgresSchemaStore {
    client: Client,
    schema: String,
}

impl PostgresSchemaStore {
    /// Connect to `database_url` and manage tables in the `public` schema.
    pub fn connect(database_url: &str) -> Result<Self, SchemaStoreError> {
        let client = Client::connect(database_url, NoTls)
            .map_err(|error| SchemaStoreError::connection(error.to_string()))?;
        Ok(Self::from_client(client))
    }

    /// Wrap an existing session.
    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            schema: DEFAULT_SCHEMA.to_owned(),
        }
    }

    /// Manage tables in `schema` instead of `public`.
    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    fn execute_ddl(&mut self, sql: &str) -> Result<(), SchemaStoreError> {
        debug!(statement = sql, "executing ddl");
        self.client
            .batch_execute(sql)
            .map_err(|error| SchemaStoreError::query(error.to_string()))
    }

    fn provenance_table(&self) -> String {
        qualified_table(&self.schema, PROVENANCE_TABLE)
    }
}

impl SchemaStore for PostgresSchemaStore {
    fn table_exists(&mut self, table: &str) -> Result<bool, SchemaStoreError> {
        let query = concat!(
            "SELECT EXISTS (",
            "  SELECT 1 ",
            "  FROM pg_catalog.pg_class cls ",
            "  JOIN pg_catalog.pg_namespace ns ",
            "    ON ns.oid = cls.relnamespace ",
            "  WHERE ns.nspname = $1 ",
            "    AND cls.relname = $2 ",
            "    AND cls.relkind IN ('r', 'p')",
            ") AS table_exists"
        );

        let row = self
            .client
            .query_one(query, &[&self.schema, &table])
            .map_err(|error| SchemaStoreError::query(error.to_string()))?;
        Ok(row.get("table_exists"))
    }

    fn list_columns(&mut self, table: &str) -> Result<Vec<ColumnDescriptor>, SchemaStoreError> {
        let query = concat!(
            "SELECT ",
            "  attr.attname AS column_name, ",
            "  pg_catalog.format_type(attr.atttypid, attr.atttypmod) AS data_type, ",
            "  NOT attr.attnotnull AS is_nullable, ",
            "  pg_catalog.pg_get_expr(def.adbin, def.adrelid) AS column_default ",
            "FROM pg_catalog.pg_attribute attr ",
            "JOIN pg_catalog.pg_class cls ",
            "  ON cls.oid = attr.attrelid ",
            "JOIN pg_catalog.pg_namespace ns ",
            "  ON ns.oid = cls.relnamespace ",
            "LEFT JOIN pg_catalog.pg_attrdef def ",
            "  ON def.adrelid = attr.attrelid ",
            " AND def.adnum = attr.attnum ",
            "WHERE ns.nspname = $1 ",
            "  AND cls.relname = $2 ",
            "  AND attr.attnum > 0 ",
            "  AND NOT attr.attisdropped ",
            "ORDER BY attr.attnum"
        );

        let rows = self
            .client
            .query(query, &[&self.schema, &table])
            .map_err(|error| SchemaStoreError::query(error.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| ColumnDescriptor {
                name: row.get("column_name"),
                data_type: row.get("data_type"),
                is_nullable: row.get("is_nullable"),
                default: row.get("column_default"),
            })
            .collect())
    }

    fn row_count(&mut self, table: &str) -> Result<u64, SchemaStoreError> {
        let row = self
            .client
            .query_one(row_count_sql(&self.schema, table).as_str(), &[])
            .map_err(|error| SchemaStoreError::query(error.to_string()))?;
        let count: i64 = row.get("row_count");
        u64::try_from(count).map_err(|error| SchemaStoreError::query(error.to_string()))
    }

    fn create_table(
        &mut self,
        table: &str,
        columns: &[ColumnDefinition],
    ) -> Result<(), SchemaStoreError> {
        let sql = create_table_sql(&self.schema, table, columns);
        self.execute_ddl(&sql)
    }

    fn add_column(
        &mut self,
        table: &str,
        column: &ColumnDefinition,
    ) -> Result<(), SchemaStoreError> {
        let sql = add_column_sql(&self.schema, table, column);
        self.execute_ddl(&sql)
    }

    fn drop_column(&mut self, table: &str, column: &str) -> Result<(), SchemaStoreError> {
        let sql = drop_column_sql(&self.schema, table, column);
        self.execute_ddl(&sql)
    }

    fn drop_table(&mut self, table: &str) -> Result<(), SchemaStoreError> {
        let sql = drop_table_sql(&self.schema, table);
        self.execute_ddl(&sql)
    }

    fn begin(&mut self) -> Result<(), SchemaStoreError> {
        self.execute_ddl("BEGIN")
    }

    fn commit(&mut self) -> Result<(), SchemaStoreError> {
        self.execute_ddl("COMMIT")
    }

    fn rollback(&mut self) -> Result<(), SchemaStoreError> {
        self.execute_ddl("ROLLBACK")
    }
}

impl ProvenanceRepository for PostgresSchemaStore {
    fn ensure_provenance_table(&mut self) -> Result<(), ProvenanceRepositoryError> {
        let sql = format!(
            concat!(
                "CREATE TABLE IF NOT EXISTS {} (",
                "migration_id text PRIMARY KEY, ",
                "family text NOT NULL, ",
                "version bigint NOT NULL, ",
                "table_name text NOT NULL, ",
                "kind text NOT NULL, ",
                "added_columns text[] NOT NULL, ",
                "applied_at timestamptz NOT NULL, ",
                "reverted_at timestamptz NULL, ",
                "UNIQUE (family, version))"
            ),
            self.provenance_table()
        );
        self.client
            .batch_execute(&sql)
            .map_err(|error| ProvenanceRepositoryError::query(error.to_string()))
    }

    fn insert_provenance(
        &mut self,
        record: &ProvenanceRecord,
    ) -> Result<(), ProvenanceRepositoryError> {
        let sql = format!(
            concat!(
                "INSERT INTO {} ",
                "(migration_id, family, version, table_name, kind, added_columns, applied_at, reverted_at) ",
                "VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
            ),
            self.provenance_table()
        );
        let migration_id = record.migration_id.to_string();
        let version = version_param(&record.migration_id)?;
        let kind = record.kind.label();

        self.client
            .execute(
                sql.as_str(),
                &[
                    &migration_id,
                    &record.migration_id.family(),
                    &version,
                    &record.table_name,
                    &kind,
                    &record.added_columns,
                    &record.applied_at,
                    &record.reverted_at,
                ],
            )
            .map_err(|error| {
                if error.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    ProvenanceRepositoryError::conflict(migration_id.clone())
                } else {
                    ProvenanceRepositoryError::query(error.to_string())
                }
            })?;
        Ok(())
    }

    fn find_provenance(
        &mut self,
        migration_id: &MigrationId,
    ) -> Result<Option<ProvenanceRecord>, ProvenanceRepositoryError> {
        let sql = format!(
            "{} WHERE family = $1 AND version = $2",
            select_provenance(&self.provenance_table())
        );
        let version = version_param(migration_id)?;
        let row = self
            .client
            .query_opt(sql.as_str(), &[&migration_id.family(), &version])
            .map_err(|error| ProvenanceRepositoryError::query(error.to_string()))?;
        row.as_ref().map(decode_provenance).transpose()
    }

    fn list_provenance(
        &mut self,
        family: &str,
    ) -> Result<Vec<ProvenanceRecord>, ProvenanceRepositoryError> {
        let sql = format!(
            "{} WHERE family = $1 ORDER BY version DESC",
            select_provenance(&self.provenance_table())
        );
        let rows = self
            .client
            .query(sql.as_str(), &[&family])
            .map_err(|error| ProvenanceRepositoryError::query(error.to_string()))?;
        rows.iter().map(decode_provenance).collect()
    }

    fn mark_reverted(
        &mut self,
        migration_id: &MigrationId,
        reverted_at: DateTime<Utc>,
    ) -> Result<(), ProvenanceRepositoryError> {
        let sql = format!(
            "UPDATE {} SET reverted_at = $3 WHERE family = $1 AND version = $2",
            self.provenance_table()
        );
        let version = version_param(migration_id)?;
        let updated = self
            .client
            .execute(
                sql.as_str(),
                &[&migration_id.family(), &version, &reverted_at],
            )
            .map_err(|error| ProvenanceRepositoryError::query(error.to_string()))?;
        if updated == 0 {
            return Err(ProvenanceRepositoryError::query(format!(
                "no provenance row for {migration_id}"
            )));
        }
        Ok(())
    }
}

fn select_provenance(table: &str) -> String {
    format!(
        concat!(
            "SELECT migration_id, table_name, kind, added_columns, applied_at, reverted_at ",
            "FROM {}"
        ),
        table
    )
}

fn version_param(migration_id: &MigrationId) -> Result<i64, ProvenanceRepositoryError> {
    i64::try_from(migration_id.version()).map_err(|_| {
        ProvenanceRepositoryError::query(format!(
            "migration version {} exceeds bigint range",
            migration_id.version()
        ))
    })
}

fn decode_provenance(row: &Row) -> Result<ProvenanceRecord, ProvenanceRepositoryError> {
    let raw_id: String = row.get("migration_id");
    let migration_id = raw_id
        .parse::<MigrationId>()
        .map_err(|error| ProvenanceRepositoryError::corrupt(format!("{raw_id}: {error}")))?;
    let raw_kind: String = row.get("kind");
    let kind = raw_kind.parse::<ProvenanceKind>()?;

    Ok(ProvenanceRecord {
        migration_id,
        table_name: row.get("table_name"),
        kind,
        added_columns: row.get("added_columns"),
        applied_at: row.get("applied_at"),
        reverted_at: row.get("reverted_at"),
    })
}
