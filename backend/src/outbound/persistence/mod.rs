//! Persistence adapters for the schema store and provenance ports.
//!
//! - **PostgreSQL**: [`PostgresSchemaStore`] over one synchronous `postgres`
//!   session, reading `pg_catalog` and issuing quoted DDL.
//! - **In-memory**: [`InMemorySchemaStore`] with snapshot transactions and
//!   fault injection, for behaviour tests and embedding hosts' own tests.
//!
//! Both implement [`crate::domain::ports::SchemaStore`] and
//! [`crate::domain::ports::ProvenanceRepository`] on the same value, so DDL
//! and provenance share a transaction.

mod in_memory_schema_store;
mod postgres_ddl;
mod postgres_schema_store;

pub use in_memory_schema_store::InMemorySchemaStore;
pub use postgres_schema_store::{DEFAULT_SCHEMA, PROVENANCE_TABLE, PostgresSchemaStore};
