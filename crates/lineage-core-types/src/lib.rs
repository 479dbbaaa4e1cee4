//! Core types shared across the lineage crates
//!
//! - **Identifiers**: RecordId, BatchId, TransformId, RunName
//! - **Schema constants**: Canonical field keys and event names for structured logging

pub mod ids;
pub mod schema;

pub use ids::{BatchId, RecordId, RunName, TransformId};
