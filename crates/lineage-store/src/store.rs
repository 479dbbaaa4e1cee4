//! The provenance store contract and what replay reads back from it

use crate::config::{BackendConfig, StoreConfig};
use crate::errors::Result;
use crate::flat::FlatFileStore;
use crate::sqlite::SqliteStore;
use lineage_core::rng::RngState;
use lineage_core::{Label, ProvenanceSink, TransformationDescriptor};
use lineage_core_types::{BatchId, TransformId};
use std::collections::BTreeMap;

/// One applied transformation in a persisted history
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedStep {
    pub transform_id: TransformId,
    /// Pre-call RNG snapshot of this specific application
    pub rng_state: Option<RngState>,
}

/// An original input and the ordered steps that produced its final text
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedRecord {
    pub text: String,
    pub target: Option<Label>,
    pub steps: Vec<PersistedStep>,
}

impl PersistedRecord {
    pub fn transform_ids(&self) -> Vec<TransformId> {
        self.steps.iter().map(|s| s.transform_id).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersistedBatch {
    pub batch_id: BatchId,
    pub records: Vec<PersistedRecord>,
}

/// A [`ProvenanceSink`] that can also be read back, reset and inspected
///
/// Backends buffer rows in memory and write them on `flush`. A flush either
/// writes every buffered row and clears the buffer, or writes nothing and
/// keeps the buffer, so a failed flush is retried by calling it again.
pub trait ProvenanceStore: ProvenanceSink {
    /// Delete everything persisted and buffered; batch and transform ids restart at 0
    ///
    /// # Errors
    ///
    /// `Io` or `Persistence` if the backing storage cannot be cleared.
    fn clean_data_store(&mut self) -> Result<()>;

    /// Replayable batches in increasing batch id order
    ///
    /// # Errors
    ///
    /// `CorruptProvenance` for rows that do not decode.
    fn load_batches(&self) -> Result<Vec<PersistedBatch>>;

    /// The de-duplicated transformation definitions, without RNG state
    ///
    /// # Errors
    ///
    /// `CorruptProvenance` for rows that do not decode.
    fn transform_definitions(&self) -> Result<BTreeMap<TransformId, TransformationDescriptor>>;

    /// Rows buffered but not yet written
    fn pending_rows(&self) -> usize;

    /// This store as a plain sink, for `apply` and `BatchSession`
    fn as_sink(&mut self) -> &mut dyn ProvenanceSink;
}

/// Open the backend named by `config`
///
/// # Errors
///
/// Backend-specific open errors (I/O, migrations, corrupt existing files).
pub fn open_store(config: &StoreConfig) -> Result<Box<dyn ProvenanceStore>> {
    config.validate()?;
    let store: Box<dyn ProvenanceStore> = match &config.backend {
        BackendConfig::FlatFile { .. } => Box::new(FlatFileStore::open(config)?),
        BackendConfig::Sqlite { path } => Box::new(SqliteStore::open(path, config)?),
    };
    Ok(store)
}
