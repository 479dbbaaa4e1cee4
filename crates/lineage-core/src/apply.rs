//! Batch transformation with provenance tracking
//!
//! `apply` is the only way a derived record comes into existence. It runs one
//! transformation call over a batch, then commits one child per input with
//! the parent's provenance plus exactly one new transformation entry.

use crate::descriptor::TransformationDescriptor;
use crate::diff::diff;
use crate::errors::{LineageError, Result};
use crate::record::{PendingRecord, RecordArena};
use crate::sink::ProvenanceSink;
use crate::text::{TextUnit, Tokenizer};
use crate::transform::{Batch, Invocation, Transformation};
use crate::{log_op_end, log_op_error, log_op_start};
use lineage_core_types::RecordId;

/// Apply `transform` to the records `ids` and return the derived record ids
///
/// The RNG snapshot is taken once, before the call, and shared by every
/// record of the batch. Output shape is validated before anything is written
/// to the arena, so a `ShapeMismatch` leaves the arena unchanged.
///
/// When a sink is given, output targets must be persistable (no NaN or
/// infinite scores), and one `log(input, output)` event is emitted per pair
/// after the children are committed. A sink error is returned but the
/// children stay in the arena; [`BatchSession::apply`] still advances to them.
///
/// [`BatchSession::apply`]: crate::session::BatchSession::apply
///
/// # Errors
///
/// - `RecordNotFound` for an unknown id
/// - `ShapeMismatch` if the transformation returns a batch of another length
/// - any error raised by the transformation itself
/// - sink errors converted from `ExError`
pub fn apply(
    arena: &mut RecordArena,
    ids: &[RecordId],
    transform: &mut dyn Transformation,
    call: &Invocation,
    tokenizer: &dyn Tokenizer,
    sink: Option<&mut dyn ProvenanceSink>,
) -> Result<Vec<RecordId>> {
    let committed = apply_committed(arena, ids, transform, call, tokenizer, sink)?;
    match committed.sink_error {
        Some(err) => Err(err),
        None => Ok(committed.derived),
    }
}

/// Children written to the arena, plus the sink error raised while logging
/// them, if any
pub(crate) struct Committed {
    pub(crate) derived: Vec<RecordId>,
    pub(crate) sink_error: Option<LineageError>,
}

/// Like [`apply`], but hands back the committed children even when the sink
/// fails afterwards
pub(crate) fn apply_committed(
    arena: &mut RecordArena,
    ids: &[RecordId],
    transform: &mut dyn Transformation,
    call: &Invocation,
    tokenizer: &dyn Tokenizer,
    sink: Option<&mut dyn ProvenanceSink>,
) -> Result<Committed> {
    log_op_start!("apply", batch_len = ids.len(), callable = call.method.as_str());
    let start = std::time::Instant::now();

    let report = |e: &LineageError| {
        log_op_error!(
            "apply",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64,
            callable = call.method.as_str()
        );
    };

    let committed = apply_impl(arena, ids, transform, call, tokenizer, sink).map_err(|e| {
        report(&e);
        e
    })?;

    match &committed.sink_error {
        Some(e) => report(e),
        None => {
            log_op_end!(
                "apply",
                duration_ms = start.elapsed().as_millis() as u64,
                batch_len = committed.derived.len()
            );
        }
    }
    Ok(committed)
}

fn apply_impl(
    arena: &mut RecordArena,
    ids: &[RecordId],
    transform: &mut dyn Transformation,
    call: &Invocation,
    tokenizer: &dyn Tokenizer,
    sink: Option<&mut dyn ProvenanceSink>,
) -> Result<Committed> {
    let mut input = Batch::default();
    for &id in ids {
        let record = arena.get(id)?;
        input.texts.push(record.text().text().to_string());
        input.targets.push(record.target().cloned());
    }

    let canonical = TransformationDescriptor::capture(transform, call).canonical()?;
    let output = transform.invoke(input, call)?;

    let actual = if output.texts.len() != ids.len() {
        output.texts.len()
    } else {
        output.targets.len()
    };
    if actual != ids.len() {
        return Err(LineageError::ShapeMismatch {
            callable: call.method.clone(),
            expected: ids.len(),
            actual,
        });
    }
    if sink.is_some() {
        for target in output.targets.iter().flatten() {
            target.ensure_persistable()?;
        }
    }

    for &id in ids {
        arena.share_provenance(id)?;
    }

    let mut pending = Vec::with_capacity(ids.len());
    for (&id, (text, target)) in ids.iter().zip(output.into_pairs()) {
        let parent = arena.get(id)?;
        let text = TextUnit::new(text, tokenizer);
        let ops = diff(parent.text().tokens(), text.tokens());

        let transformation_provenance = parent.transformation_provenance().add(canonical.clone());
        transformation_provenance.single_delta(parent.transformation_provenance())?;

        pending.push(PendingRecord {
            feature_provenance: parent.feature_provenance().with_edits(&ops),
            transformation_provenance,
            text,
            target,
            prev: id,
        });
    }

    let derived: Vec<RecordId> = pending
        .into_iter()
        .map(|p| arena.insert_derived(p))
        .collect();

    let mut sink_error = None;
    if let Some(sink) = sink {
        for (&parent, &child) in ids.iter().zip(&derived) {
            if let Err(e) = sink.log(arena.get(parent)?, arena.get(child)?) {
                sink_error = Some(e.into());
                break;
            }
        }
    }

    Ok(Committed {
        derived,
        sink_error,
    })
}
