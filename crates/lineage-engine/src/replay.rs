//! Replay Engine
//!
//! Reconstructs the final outputs of every persisted batch using only what
//! the store holds: the original `(text, target)` pairs, each record's
//! ordered transformation ids, the de-duplicated transformation definitions
//! and the RNG state captured before each application.
//!
//! ## Operations
//!
//! - `replay_all`: returns the final `(text, target)` pairs, batch by batch
//! - `replay_into`: rebuilds the full lineage inside a [`RecordArena`]
//!
//! ## Logging Ownership
//!
//! Both operations emit `log_op_start!`/`log_op_end!`/`log_op_error!`.
//! Per-step detail is `debug!` only.

use crate::registry::TransformRegistry;
use lineage_core::errors::{LineageError, Result};
use lineage_core::rng::RngState;
use lineage_core::{
    apply, Batch, Label, RecordArena, Tokenizer, Transformation, TransformationDescriptor,
};
use lineage_core::{log_op_end, log_op_error, log_op_start};
use lineage_core_types::{BatchId, RecordId, TransformId};
use lineage_store::{PersistedBatch, PersistedStep, ProvenanceStore};
use std::collections::BTreeMap;

pub struct ReplayEngine<'a> {
    store: &'a dyn ProvenanceStore,
    registry: &'a TransformRegistry,
}

/// One step of a batch plan, resolved against the definitions table
struct PlannedStep<'d> {
    transform_id: TransformId,
    descriptor: &'d TransformationDescriptor,
    rng_state: Option<&'d RngState>,
}

impl<'a> ReplayEngine<'a> {
    pub fn new(store: &'a dyn ProvenanceStore, registry: &'a TransformRegistry) -> Self {
        Self { store, registry }
    }

    /// Replay every persisted batch and return the final pairs
    ///
    /// Batches come back in increasing batch id order; records keep their
    /// original order inside each batch.
    ///
    /// # Errors
    ///
    /// - `CorruptProvenance` for undecodable rows, unknown transform ids,
    ///   inconsistent histories within a batch, or RNG state that cannot be
    ///   restored into the rebuilt transformation
    /// - `TransformNotFound` when no factory is registered for a step
    /// - `ShapeMismatch` when a rebuilt transformation changes the batch length
    /// - any error a transformation raises
    pub fn replay_all(&self) -> Result<Vec<(String, Option<Label>)>> {
        log_op_start!("replay_all");
        let start = std::time::Instant::now();

        let result = self.replay_all_impl();
        match &result {
            Ok(pairs) => {
                log_op_end!(
                    "replay_all",
                    duration_ms = start.elapsed().as_millis() as u64,
                    records = pairs.len()
                );
            }
            Err(e) => {
                log_op_error!(
                    "replay_all",
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64
                );
            }
        }
        result
    }

    fn replay_all_impl(&self) -> Result<Vec<(String, Option<Label>)>> {
        let (batches, definitions) = self.load()?;
        let mut out = Vec::new();
        for batch in &batches {
            let plan = plan_batch(batch, &definitions)?;
            let mut current: Batch = batch
                .records
                .iter()
                .map(|r| (r.text.clone(), r.target.clone()))
                .collect();

            for step in &plan {
                let mut transform = self.prepare(step, batch.batch_id)?;
                let call = step.descriptor.invocation();
                let expected = current.len();
                current = transform
                    .invoke(current, &call)
                    .map_err(|e| locate(e, step.transform_id, batch.batch_id))?;
                if current.texts.len() != expected || current.targets.len() != expected {
                    return Err(LineageError::ShapeMismatch {
                        callable: call.method,
                        expected,
                        actual: current.texts.len().max(current.targets.len()),
                    });
                }
            }

            tracing::debug!(
                component = module_path!(),
                batch_id = batch.batch_id.get(),
                steps = plan.len(),
                "batch replayed"
            );
            out.extend(current.into_pairs());
        }
        Ok(out)
    }

    /// Replay every persisted batch into `arena` and return the final record ids
    ///
    /// Originals become raw records and every step goes through [`apply`],
    /// so the rebuilt records carry full transformation and feature
    /// provenance and can be traced.
    ///
    /// # Errors
    ///
    /// Same as [`replay_all`](Self::replay_all).
    pub fn replay_into(
        &self,
        arena: &mut RecordArena,
        tokenizer: &dyn Tokenizer,
    ) -> Result<Vec<RecordId>> {
        log_op_start!("replay_into");
        let start = std::time::Instant::now();

        let result = self.replay_into_impl(arena, tokenizer);
        match &result {
            Ok(ids) => {
                log_op_end!(
                    "replay_into",
                    duration_ms = start.elapsed().as_millis() as u64,
                    records = ids.len()
                );
            }
            Err(e) => {
                log_op_error!(
                    "replay_into",
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64
                );
            }
        }
        result
    }

    fn replay_into_impl(
        &self,
        arena: &mut RecordArena,
        tokenizer: &dyn Tokenizer,
    ) -> Result<Vec<RecordId>> {
        let (batches, definitions) = self.load()?;
        let mut out = Vec::new();
        for batch in &batches {
            let plan = plan_batch(batch, &definitions)?;
            let mut ids: Vec<RecordId> = batch
                .records
                .iter()
                .map(|r| arena.insert_raw(r.text.clone(), r.target.clone(), tokenizer))
                .collect();

            for step in &plan {
                let mut transform = self.prepare(step, batch.batch_id)?;
                let call = step.descriptor.invocation();
                ids = apply(arena, &ids, transform.as_mut(), &call, tokenizer, None)
                    .map_err(|e| locate(e, step.transform_id, batch.batch_id))?;
            }
            out.extend(ids);
        }
        Ok(out)
    }

    fn load(
        &self,
    ) -> Result<(
        Vec<PersistedBatch>,
        BTreeMap<TransformId, TransformationDescriptor>,
    )> {
        let batches = self.store.load_batches()?;
        let definitions = self.store.transform_definitions()?;
        tracing::debug!(
            component = module_path!(),
            batches = batches.len(),
            definitions = definitions.len(),
            "provenance loaded for replay"
        );
        Ok((batches, definitions))
    }

    /// Fresh transformation for `step` with its RNG positioned for the call
    fn prepare(&self, step: &PlannedStep<'_>, batch_id: BatchId) -> Result<Box<dyn Transformation>> {
        let mut transform = self
            .registry
            .resolve(step.descriptor)
            .map_err(|e| locate(e, step.transform_id, batch_id))?;

        match step.rng_state {
            Some(state) => {
                let handle = transform.rng_handle().ok_or_else(|| {
                    corrupt_at(
                        format!(
                            "'{}' has recorded RNG state but exposes no generator",
                            step.descriptor.registry_key()
                        ),
                        step.transform_id,
                        batch_id,
                    )
                })?;
                if let Some(attr) = &step.descriptor.class_rng_attr {
                    if attr != handle.attr {
                        return Err(corrupt_at(
                            format!(
                                "RNG attribute '{}' recorded but '{}' exposed",
                                attr, handle.attr
                            ),
                            step.transform_id,
                            batch_id,
                        ));
                    }
                }
                state
                    .restore_into(handle.rng)
                    .map_err(|e| locate(e, step.transform_id, batch_id))?;
            }
            None if step.descriptor.callable_is_stochastic => {
                return Err(corrupt_at(
                    format!(
                        "stochastic '{}' has no recorded RNG state",
                        step.descriptor.callable_name
                    ),
                    step.transform_id,
                    batch_id,
                ));
            }
            None => {}
        }
        Ok(transform)
    }
}

/// Resolve the shared history of a batch against the definitions table
fn plan_batch<'d>(
    batch: &'d PersistedBatch,
    definitions: &'d BTreeMap<TransformId, TransformationDescriptor>,
) -> Result<Vec<PlannedStep<'d>>> {
    let steps: &[PersistedStep] = match batch.records.first() {
        Some(first) => &first.steps,
        None => return Ok(Vec::new()),
    };
    if let Some(index) = batch.records.iter().position(|r| r.steps != steps) {
        return Err(LineageError::CorruptProvenance {
            reason: format!(
                "record {} of batch {} has a different transformation history",
                index, batch.batch_id
            ),
            transform_id: None,
            batch_id: Some(batch.batch_id),
        });
    }

    steps
        .iter()
        .map(|s| {
            let descriptor = definitions.get(&s.transform_id).ok_or_else(|| {
                corrupt_at(
                    format!("transform id {} has no definition", s.transform_id),
                    s.transform_id,
                    batch.batch_id,
                )
            })?;
            Ok(PlannedStep {
                transform_id: s.transform_id,
                descriptor,
                rng_state: s.rng_state.as_ref(),
            })
        })
        .collect()
}

fn corrupt_at(reason: String, transform_id: TransformId, batch_id: BatchId) -> LineageError {
    LineageError::CorruptProvenance {
        reason,
        transform_id: Some(transform_id),
        batch_id: Some(batch_id),
    }
}

/// Attach step location to errors that carry one
fn locate(err: LineageError, transform_id: TransformId, batch_id: BatchId) -> LineageError {
    match err {
        LineageError::TransformNotFound { key, .. } => LineageError::TransformNotFound {
            key,
            transform_id: Some(transform_id),
            batch_id: Some(batch_id),
        },
        LineageError::CorruptProvenance { reason, .. } => {
            corrupt_at(reason, transform_id, batch_id)
        }
        other => other,
    }
}
