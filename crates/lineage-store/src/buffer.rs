//! In-memory write buffer shared by the store backends
//!
//! Originals wait in a FIFO queue until their history arrives through
//! `log_transform_prov`; only then do they become a buffered row. Every row
//! is stamped with the batch id that was open when it was logged.

use crate::config::StoreConfig;
use crate::errors::Result;
use lineage_core::errors::{ExError, ExErrorKind};
use lineage_core::{AppliedStep, Label, LineageRecord, TransformationDescriptor};
use lineage_core_types::BatchId;
use std::collections::VecDeque;

/// An original and its ordered transformation history
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub batch_id: BatchId,
    pub text: String,
    pub target: Option<Label>,
    pub steps: Vec<TransformationDescriptor>,
}

/// Audit row for one `(input, output)` pair
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationRow {
    pub batch_id: BatchId,
    pub step: AppliedStep,
}

#[derive(Debug)]
pub struct WriteBuffer {
    originals: VecDeque<(String, Option<Label>)>,
    histories: Vec<HistoryRow>,
    applications: Vec<ApplicationRow>,
    batch_id: BatchId,
    batch_has_histories: bool,
    flush_after: usize,
    record_applications: bool,
}

impl WriteBuffer {
    pub fn new(config: &StoreConfig, batch_id: BatchId) -> Self {
        Self {
            originals: VecDeque::new(),
            histories: Vec::new(),
            applications: Vec::new(),
            batch_id,
            batch_has_histories: false,
            flush_after: config.flush_after_n_items,
            record_applications: config.record_applications,
        }
    }

    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    pub fn histories(&self) -> &[HistoryRow] {
        &self.histories
    }

    pub fn applications(&self) -> &[ApplicationRow] {
        &self.applications
    }

    pub fn pending_rows(&self) -> usize {
        self.histories.len() + self.applications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending_rows() == 0
    }

    /// Whether a flush with this `force` flag has anything to write
    pub fn should_flush(&self, force: bool) -> bool {
        !self.is_empty() && (force || self.pending_rows() >= self.flush_after)
    }

    pub fn push_original(&mut self, text: &str, target: Option<&Label>) {
        self.originals
            .push_back((text.to_string(), target.cloned()));
    }

    /// Pair `entries` with the oldest queued original
    ///
    /// # Errors
    ///
    /// `InvalidInput` if no original is waiting for a history.
    pub fn push_history(&mut self, entries: &[TransformationDescriptor]) -> Result<()> {
        let (text, target) = self.originals.pop_front().ok_or_else(|| {
            ExError::new(ExErrorKind::InvalidInput)
                .with_op("log_transform_prov")
                .with_batch_id(self.batch_id)
                .with_message("no logged original is waiting for a transformation history")
        })?;
        self.histories.push(HistoryRow {
            batch_id: self.batch_id,
            text,
            target,
            steps: entries.to_vec(),
        });
        self.batch_has_histories = true;
        Ok(())
    }

    /// Buffer an audit row unless audit rows are disabled
    ///
    /// # Errors
    ///
    /// `ProvenanceDeltaMismatch` unless `output` is exactly one step past `input`.
    pub fn push_application(&mut self, input: &LineageRecord, output: &LineageRecord) -> Result<()> {
        if !self.record_applications {
            return Ok(());
        }
        let step = AppliedStep::from_pair(input, output)?;
        self.applications.push(ApplicationRow {
            batch_id: self.batch_id,
            step,
        });
        Ok(())
    }

    /// Drop the rows a successful flush has written
    pub fn commit(&mut self) {
        self.histories.clear();
        self.applications.clear();
    }

    /// Start a new batch if the current one has any history
    pub fn close_batch(&mut self) {
        if self.batch_has_histories {
            self.batch_id = self.batch_id.next();
            self.batch_has_histories = false;
        }
    }

    /// Forget everything, restarting at `batch_id`
    pub fn reset(&mut self, batch_id: BatchId) {
        self.originals.clear();
        self.histories.clear();
        self.applications.clear();
        self.batch_id = batch_id;
        self.batch_has_histories = false;
    }
}
