//! Replayable batch sessions
//!
//! A [`BatchSession`] brackets the life of one batch of raw records: it logs
//! the originals on open, forwards every transformation through
//! [`apply`](crate::apply::apply),
//! and on close logs each record's ordered transformation history and forces
//! a flush. Dropping an unclosed session performs the same close, so buffered
//! rows reach the store on early returns and error paths too.

use crate::apply::apply_committed;
use crate::errors::Result;
use crate::label::Label;
use crate::record::RecordArena;
use crate::sink::ProvenanceSink;
use crate::text::Tokenizer;
use crate::transform::{Invocation, Transformation};
use crate::{log_op_end, log_op_error, log_op_start};
use lineage_core_types::RecordId;

pub struct BatchSession<'a> {
    arena: &'a mut RecordArena,
    sink: &'a mut dyn ProvenanceSink,
    tokenizer: &'a dyn Tokenizer,
    current: Vec<RecordId>,
    closed: bool,
}

impl<'a> BatchSession<'a> {
    /// Register `pairs` as raw records and log them as originals
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a target with no JSON encoding (NaN or infinite
    /// score), checked before anything is logged; sink errors while logging
    /// originals.
    pub fn open<I>(
        arena: &'a mut RecordArena,
        sink: &'a mut dyn ProvenanceSink,
        tokenizer: &'a dyn Tokenizer,
        pairs: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Option<Label>)>,
    {
        let pairs: Vec<(String, Option<Label>)> = pairs.into_iter().collect();
        for target in pairs.iter().filter_map(|(_, t)| t.as_ref()) {
            target.ensure_persistable()?;
        }

        let mut current = Vec::with_capacity(pairs.len());
        for (text, target) in pairs {
            sink.log_original(&text, target.as_ref())?;
            current.push(arena.insert_raw(text, target, tokenizer));
        }
        tracing::debug!(
            component = module_path!(),
            batch_len = current.len(),
            "batch session opened"
        );

        Ok(Self {
            arena,
            sink,
            tokenizer,
            current,
            closed: false,
        })
    }

    /// Ids of the newest generation
    pub fn records(&self) -> &[RecordId] {
        &self.current
    }

    pub fn arena(&self) -> &RecordArena {
        &*self.arena
    }

    /// Transform the newest generation; it becomes the session's current batch
    ///
    /// # Errors
    ///
    /// Errors from [`crate::apply::apply`]. When the transformation itself
    /// fails the current generation is unchanged. When the sink fails after
    /// the children were committed, the session still advances to them, so
    /// the histories logged on close match what the arena holds.
    pub fn apply(
        &mut self,
        transform: &mut dyn Transformation,
        call: &Invocation,
    ) -> Result<&[RecordId]> {
        let committed = apply_committed(
            self.arena,
            &self.current,
            transform,
            call,
            self.tokenizer,
            Some(&mut *self.sink),
        )?;
        self.current = committed.derived;
        match committed.sink_error {
            Some(err) => Err(err),
            None => Ok(&self.current),
        }
    }

    /// Log transformation histories, force a flush and return the final ids
    ///
    /// # Errors
    ///
    /// The first sink error while logging histories, or the forced flush
    /// error. Every history is offered to the sink and the flush is always
    /// attempted, so originals and histories stay paired; the sink keeps its
    /// buffer and `flush(true)` can be retried on the store directly.
    pub fn close(mut self) -> Result<Vec<RecordId>> {
        self.finish()?;
        Ok(std::mem::take(&mut self.current))
    }

    fn finish(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        log_op_start!("session_close", batch_len = self.current.len());
        let start = std::time::Instant::now();
        let result = self.log_histories().map_err(|e| {
            log_op_error!(
                "session_close",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        });
        if result.is_ok() {
            log_op_end!(
                "session_close",
                duration_ms = start.elapsed().as_millis() as u64
            );
        }
        result
    }

    fn log_histories(&mut self) -> Result<()> {
        let mut first_error = None;
        for &id in &self.current {
            let descriptors = self
                .arena
                .get(id)?
                .transformation_provenance()
                .descriptors()?;
            if let Err(err) = self.sink.log_transform_prov(&descriptors) {
                tracing::warn!(
                    component = module_path!(),
                    record_id = id.get(),
                    error = %err,
                    "history not accepted by sink"
                );
                first_error.get_or_insert(err);
            }
        }
        let flushed = self.sink.flush(true);
        match first_error {
            Some(err) => Err(err.into()),
            None => flushed.map_err(Into::into),
        }
    }
}

impl Drop for BatchSession<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = self.finish() {
            tracing::error!(
                component = module_path!(),
                error = %err,
                "batch session closed with unflushed provenance"
            );
        }
    }
}
