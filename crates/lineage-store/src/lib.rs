//! Lineage Store - Persistence for replayable provenance
//!
//! Provides:
//! - The `ProvenanceStore` contract shared by every backend
//! - A flat-file backend writing append-only delimited files
//! - A SQLite backend with an embedded, checksummed migrations framework
//! - TOML store configuration and `open_store`

pub mod buffer;
pub mod config;
pub mod db;
pub mod errors;
pub mod flat;
pub mod migrations;
pub mod sqlite;
pub mod store;

// Re-export key types
pub use config::{BackendConfig, StoreConfig};
pub use errors::Result;
pub use flat::FlatFileStore;
pub use sqlite::SqliteStore;
pub use store::{open_store, PersistedBatch, PersistedRecord, PersistedStep, ProvenanceStore};
