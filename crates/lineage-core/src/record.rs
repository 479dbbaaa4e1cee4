//! Lineage records and the arena that owns them
//!
//! Records are never linked by reference. `prev` is a [`RecordId`] into the
//! same arena, so walking a lineage is repeated index lookup and no record
//! keeps its ancestors alive on its own.

use crate::errors::{LineageError, Result};
use crate::label::Label;
use crate::provenance::{FeatureProvenance, TransformationProvenance};
use crate::text::{TextUnit, Tokenizer};
use lineage_core_types::RecordId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Entered the system as input; empty provenance, no predecessor
    Raw,
    /// Produced by a transformation
    Derived,
}

#[derive(Debug, Clone)]
pub struct LineageRecord {
    id: RecordId,
    text: TextUnit,
    target: Option<Label>,
    transformation_provenance: TransformationProvenance,
    feature_provenance: FeatureProvenance,
    prev: Option<RecordId>,
}

impl LineageRecord {
    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn text(&self) -> &TextUnit {
        &self.text
    }

    pub fn target(&self) -> Option<&Label> {
        self.target.as_ref()
    }

    pub fn transformation_provenance(&self) -> &TransformationProvenance {
        &self.transformation_provenance
    }

    pub fn feature_provenance(&self) -> &FeatureProvenance {
        &self.feature_provenance
    }

    pub fn prev(&self) -> Option<RecordId> {
        self.prev
    }

    pub fn state(&self) -> RecordState {
        if self.prev.is_none() && self.transformation_provenance.is_empty() {
            RecordState::Raw
        } else {
            RecordState::Derived
        }
    }
}

/// Fields of a record about to be derived, before it receives an id
#[derive(Debug)]
pub(crate) struct PendingRecord {
    pub text: TextUnit,
    pub target: Option<Label>,
    pub transformation_provenance: TransformationProvenance,
    pub feature_provenance: FeatureProvenance,
    pub prev: RecordId,
}

/// One hop of a reconstructed trace
#[derive(Debug, Clone, PartialEq)]
pub struct TraceStep {
    pub record_id: RecordId,
    pub text: String,
    pub target: Option<Label>,
    /// Callable that produced this step; `None` for the raw root
    pub transform: Option<String>,
}

#[derive(Debug, Default)]
pub struct RecordArena {
    records: Vec<LineageRecord>,
}

impl RecordArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Register an input `(text, target)` pair as a raw record
    pub fn insert_raw(
        &mut self,
        text: impl Into<String>,
        target: Option<Label>,
        tokenizer: &dyn Tokenizer,
    ) -> RecordId {
        let id = RecordId(self.records.len() as u64);
        self.records.push(LineageRecord {
            id,
            text: TextUnit::new(text, tokenizer),
            target,
            transformation_provenance: TransformationProvenance::new(),
            feature_provenance: FeatureProvenance::new(),
            prev: None,
        });
        id
    }

    pub(crate) fn insert_derived(&mut self, pending: PendingRecord) -> RecordId {
        let id = RecordId(self.records.len() as u64);
        self.records.push(LineageRecord {
            id,
            text: pending.text,
            target: pending.target,
            transformation_provenance: pending.transformation_provenance,
            feature_provenance: pending.feature_provenance,
            prev: Some(pending.prev),
        });
        id
    }

    /// # Errors
    ///
    /// `RecordNotFound` for an id this arena never issued.
    pub fn get(&self, id: RecordId) -> Result<&LineageRecord> {
        self.records
            .get(id.0 as usize)
            .ok_or(LineageError::RecordNotFound { record_id: id.0 })
    }

    /// Mark a record's provenance as observed by children
    pub(crate) fn share_provenance(&mut self, id: RecordId) -> Result<()> {
        let record = self
            .records
            .get_mut(id.0 as usize)
            .ok_or(LineageError::RecordNotFound { record_id: id.0 })?;
        record.transformation_provenance.mark_shared();
        record.feature_provenance.mark_shared();
        Ok(())
    }

    /// Ancestor chain from the raw root down to `id` (inclusive)
    ///
    /// # Errors
    ///
    /// `RecordNotFound` if `id` or any `prev` link is dangling.
    pub fn lineage(&self, id: RecordId) -> Result<Vec<RecordId>> {
        let mut chain = vec![id];
        let mut current = self.get(id)?;
        while let Some(prev) = current.prev {
            chain.push(prev);
            current = self.get(prev)?;
        }
        chain.reverse();
        Ok(chain)
    }

    /// Reconstruct how `id` came to be, one step per record in its lineage
    ///
    /// Each non-root step names the callable recorded as the newest entry of
    /// its transformation provenance.
    ///
    /// # Errors
    ///
    /// `RecordNotFound` for dangling links; `ProvenanceDeltaMismatch` or
    /// `Serialization` if a step's provenance does not hold exactly one new
    /// readable descriptor.
    pub fn trace(&self, id: RecordId) -> Result<Vec<TraceStep>> {
        let mut steps = Vec::new();
        let mut parent: Option<&LineageRecord> = None;
        for record_id in self.lineage(id)? {
            let record = self.get(record_id)?;
            let transform = match parent {
                Some(p) => {
                    let delta = record
                        .transformation_provenance
                        .single_delta(&p.transformation_provenance)?;
                    let descriptor = delta.payload.parse()?;
                    Some(match descriptor.class_name {
                        Some(class) => format!("{}.{}", class, descriptor.callable_name),
                        None => descriptor.callable_name,
                    })
                }
                None => None,
            };
            steps.push(TraceStep {
                record_id,
                text: record.text.text().to_string(),
                target: record.target.clone(),
                transform,
            });
            parent = Some(record);
        }
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::WordTokenizer;

    #[test]
    fn test_raw_record_state() {
        let mut arena = RecordArena::new();
        let id = arena.insert_raw("hello", Some(Label::Class(1)), &WordTokenizer);
        let record = arena.get(id).unwrap();
        assert_eq!(record.state(), RecordState::Raw);
        assert!(record.transformation_provenance().is_empty());
        assert_eq!(arena.lineage(id).unwrap(), vec![id]);
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let arena = RecordArena::new();
        assert_eq!(
            arena.get(RecordId(9)).err(),
            Some(LineageError::RecordNotFound { record_id: 9 })
        );
    }

    #[test]
    fn test_share_marks_both_provenances() {
        let mut arena = RecordArena::new();
        let id = arena.insert_raw("x", None, &WordTokenizer);
        arena.share_provenance(id).unwrap();
        let record = arena.get(id).unwrap();
        assert!(record.transformation_provenance().is_shared());
        assert!(record.feature_provenance().is_shared());
    }
}
