//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! Adapters translate between domain types and store-specific
//! representations. They contain no migration logic.

pub mod persistence;
