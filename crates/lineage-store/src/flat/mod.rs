//! Flat-file provenance store
//!
//! Three append-only files, no header rows:
//! - records: `[batch_id, text, target, transform_ids_json, rng_states_json]`
//! - transforms: `[transform_id, definition_json]`
//! - applications: `[batch_id, input_text, input_target, output_text,
//!   output_target, transform_id, rng_state_json, diff_json]`
//!
//! Transformation definitions are stored once, keyed by their digest; every
//! record and application refers to them by integer id.

mod append;
pub mod csv;

use crate::buffer::WriteBuffer;
use crate::config::{BackendConfig, StoreConfig};
use crate::errors::{config_error, corrupt_row, flush_failure, io_error, Result};
use crate::store::{PersistedBatch, PersistedRecord, PersistedStep, ProvenanceStore};
use lineage_core::errors::ExError;
use lineage_core::rng::RngState;
use lineage_core::{
    log_op_end, log_op_error, log_op_start, Label, LineageRecord, ProvenanceSink,
    TransformationDescriptor,
};
use lineage_core_types::{BatchId, TransformId};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

const RECORDS: &str = "records";
const TRANSFORMS: &str = "transforms";

pub struct FlatFileStore {
    records_path: PathBuf,
    transforms_path: PathBuf,
    applications_path: PathBuf,
    buffer: WriteBuffer,
    /// definition digest -> id, for definitions already on disk
    transform_ids: HashMap<String, TransformId>,
    next_transform_id: TransformId,
}

impl FlatFileStore {
    /// Open (or create) the store described by a flat-file `config`
    ///
    /// Existing files are scanned so transform ids and batch ids continue
    /// where the previous run stopped.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a non flat-file backend, `Io` if the directory
    /// cannot be created, `CorruptProvenance` for unreadable existing rows.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let BackendConfig::FlatFile {
            dir,
            records_file,
            transforms_file,
            applications_file,
        } = &config.backend
        else {
            return Err(config_error("flat-file store needs a flat_file backend"));
        };
        std::fs::create_dir_all(dir).map_err(|e| io_error("create_store_dir", e))?;

        let mut store = Self {
            records_path: dir.join(records_file),
            transforms_path: dir.join(transforms_file),
            applications_path: dir.join(applications_file),
            buffer: WriteBuffer::new(config, BatchId(0)),
            transform_ids: HashMap::new(),
            next_transform_id: TransformId(0),
        };

        for (id, descriptor) in store.transform_definitions()? {
            store
                .transform_ids
                .insert(descriptor.definition_digest()?, id);
            if id >= store.next_transform_id {
                store.next_transform_id = id.next();
            }
        }
        let next_batch = store
            .load_batches()?
            .last()
            .map_or(BatchId(0), |b| b.batch_id.next());
        store.buffer.reset(next_batch);

        tracing::debug!(
            component = module_path!(),
            dir = %dir.display(),
            batch_id = next_batch.get(),
            transforms = store.transform_ids.len(),
            "flat-file store opened"
        );
        Ok(store)
    }

    pub fn records_path(&self) -> &Path {
        &self.records_path
    }

    pub fn transforms_path(&self) -> &Path {
        &self.transforms_path
    }

    pub fn applications_path(&self) -> &Path {
        &self.applications_path
    }

    /// Batch id stamped on rows logged from now on
    pub fn current_batch_id(&self) -> BatchId {
        self.buffer.batch_id()
    }

    /// Write every buffered row; returns the definitions that got new ids
    fn write_buffered(&self) -> Result<(HashMap<String, TransformId>, TransformId)> {
        let mut ids = TransformIds {
            known: &self.transform_ids,
            added: HashMap::new(),
            next: self.next_transform_id,
            rows: String::new(),
        };

        let mut records = String::new();
        for row in self.buffer.histories() {
            let mut transform_ids = Vec::with_capacity(row.steps.len());
            let mut rng_states = Vec::with_capacity(row.steps.len());
            for descriptor in &row.steps {
                transform_ids.push(ids.resolve(descriptor)?);
                rng_states.push(descriptor.rng_state.clone());
            }
            records.push_str(&csv::write_row(&[
                row.batch_id.to_string(),
                row.text.clone(),
                serde_json::to_string(&row.target)?,
                serde_json::to_string(&transform_ids)?,
                serde_json::to_string(&rng_states)?,
            ]));
        }

        let mut applications = String::new();
        for row in self.buffer.applications() {
            let step = &row.step;
            let transform_id = ids.resolve(&step.descriptor)?;
            applications.push_str(&csv::write_row(&[
                row.batch_id.to_string(),
                step.input_text.clone(),
                serde_json::to_string(&step.input_target)?,
                step.output_text.clone(),
                serde_json::to_string(&step.output_target)?,
                transform_id.to_string(),
                serde_json::to_string(&step.descriptor.rng_state)?,
                serde_json::to_string(&step.diff_tags)?,
            ]));
        }

        append::append_all(&[
            (self.transforms_path.as_path(), ids.rows.as_str()),
            (self.records_path.as_path(), records.as_str()),
            (self.applications_path.as_path(), applications.as_str()),
        ])?;
        Ok((ids.added, ids.next))
    }

    fn read_rows(&self, path: &Path, file: &str) -> Result<Vec<Vec<String>>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("read_flat_file", e)),
        };
        csv::parse_rows(&content).map_err(|line| corrupt_row(file, line, "unterminated quoted field"))
    }
}

/// Id assignment during one flush; nothing is committed until the write succeeds
struct TransformIds<'a> {
    known: &'a HashMap<String, TransformId>,
    added: HashMap<String, TransformId>,
    next: TransformId,
    rows: String,
}

impl TransformIds<'_> {
    fn resolve(&mut self, descriptor: &TransformationDescriptor) -> Result<TransformId> {
        let digest = descriptor.definition_digest()?;
        if let Some(id) = self.known.get(&digest).or_else(|| self.added.get(&digest)) {
            return Ok(*id);
        }
        let id = self.next;
        self.next = id.next();
        self.rows.push_str(&csv::write_row(&[
            id.to_string(),
            descriptor.definition_key()?,
        ]));
        self.added.insert(digest, id);
        Ok(id)
    }
}

fn field<'a>(row: &'a [String], index: usize, file: &str, line: usize) -> Result<&'a str> {
    row.get(index)
        .map(String::as_str)
        .ok_or_else(|| corrupt_row(file, line, format!("missing column {}", index)))
}

fn parse_json<T: serde::de::DeserializeOwned>(raw: &str, file: &str, line: usize) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| corrupt_row(file, line, e))
}

fn parse_id(raw: &str, file: &str, line: usize) -> Result<u64> {
    raw.parse()
        .map_err(|_| corrupt_row(file, line, format!("'{}' is not an id", raw)))
}

impl FlatFileStore {
    /// Threshold flush after buffering a row
    ///
    /// A failure here is logged, not returned: the rows stay buffered and
    /// the next flush retries them, while the caller's row was accepted.
    fn auto_flush(&mut self) {
        if let Err(err) = self.flush(false) {
            tracing::warn!(
                component = module_path!(),
                error = %err,
                pending = self.buffer.pending_rows(),
                "auto flush failed; rows stay buffered"
            );
        }
    }
}

impl ProvenanceSink for FlatFileStore {
    fn log(&mut self, input: &LineageRecord, output: &LineageRecord) -> Result<()> {
        self.buffer.push_application(input, output)?;
        self.auto_flush();
        Ok(())
    }

    fn log_original(&mut self, text: &str, target: Option<&Label>) -> Result<()> {
        self.buffer.push_original(text, target);
        Ok(())
    }

    fn log_transform_prov(&mut self, entries: &[TransformationDescriptor]) -> Result<()> {
        self.buffer.push_history(entries)?;
        self.auto_flush();
        Ok(())
    }

    fn flush(&mut self, force: bool) -> Result<()> {
        // rows carry their batch id already, so a forced flush ends the
        // batch whether or not the write below succeeds
        if force {
            self.buffer.close_batch();
        }
        if !self.buffer.should_flush(force) {
            return Ok(());
        }

        let pending = self.buffer.pending_rows();
        log_op_start!("flush", rows = pending, force = force);
        let start = std::time::Instant::now();

        let (added, next_transform_id) = self.write_buffered().map_err(|e| {
            let err: ExError = flush_failure(pending, e);
            log_op_error!(
                "flush",
                err.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            err
        })?;
        self.transform_ids.extend(added);
        self.next_transform_id = next_transform_id;
        self.buffer.commit();

        log_op_end!(
            "flush",
            duration_ms = start.elapsed().as_millis() as u64,
            rows = pending
        );
        Ok(())
    }
}

impl ProvenanceStore for FlatFileStore {
    fn clean_data_store(&mut self) -> Result<()> {
        for path in [
            &self.records_path,
            &self.transforms_path,
            &self.applications_path,
        ] {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(io_error("clean_data_store", e)),
            }
        }
        self.transform_ids.clear();
        self.next_transform_id = TransformId(0);
        self.buffer.reset(BatchId(0));
        Ok(())
    }

    fn load_batches(&self) -> Result<Vec<PersistedBatch>> {
        let mut batches: BTreeMap<BatchId, Vec<PersistedRecord>> = BTreeMap::new();
        for (i, row) in self.read_rows(&self.records_path, RECORDS)?.iter().enumerate() {
            let line = i + 1;
            let batch_id = BatchId(parse_id(field(row, 0, RECORDS, line)?, RECORDS, line)?);
            let target: Option<Label> = parse_json(field(row, 2, RECORDS, line)?, RECORDS, line)?;
            let ids: Vec<TransformId> = parse_json(field(row, 3, RECORDS, line)?, RECORDS, line)?;
            let rng_states: Vec<Option<RngState>> = match row.get(4) {
                Some(raw) => parse_json(raw, RECORDS, line)?,
                None => vec![None; ids.len()],
            };
            if rng_states.len() != ids.len() {
                return Err(corrupt_row(
                    RECORDS,
                    line,
                    format!("{} rng states for {} transforms", rng_states.len(), ids.len()),
                ));
            }

            batches.entry(batch_id).or_default().push(PersistedRecord {
                text: field(row, 1, RECORDS, line)?.to_string(),
                target,
                steps: ids
                    .into_iter()
                    .zip(rng_states)
                    .map(|(transform_id, rng_state)| PersistedStep {
                        transform_id,
                        rng_state,
                    })
                    .collect(),
            });
        }

        Ok(batches
            .into_iter()
            .map(|(batch_id, records)| PersistedBatch { batch_id, records })
            .collect())
    }

    fn transform_definitions(&self) -> Result<BTreeMap<TransformId, TransformationDescriptor>> {
        let mut definitions = BTreeMap::new();
        for (i, row) in self.read_rows(&self.transforms_path, TRANSFORMS)?.iter().enumerate() {
            let line = i + 1;
            let id = TransformId(parse_id(field(row, 0, TRANSFORMS, line)?, TRANSFORMS, line)?);
            let descriptor = parse_json(field(row, 1, TRANSFORMS, line)?, TRANSFORMS, line)?;
            definitions.insert(id, descriptor);
        }
        Ok(definitions)
    }

    fn pending_rows(&self) -> usize {
        self.buffer.pending_rows()
    }

    fn as_sink(&mut self) -> &mut dyn ProvenanceSink {
        self
    }
}
