use super::Provenance;
use crate::diff::EditOp;
use serde::{Deserialize, Serialize};

/// One changed span in a derived text
///
/// `span` is the half-open destination token range; `tag` is the op string
/// such as `"replace: [1,2]-[1,3]"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureEdit {
    pub span: (usize, usize),
    pub tag: String,
}

impl FeatureEdit {
    /// `None` for `Equal` ops
    pub fn from_op(op: &EditOp) -> Option<Self> {
        op.feature_tag().map(|tag| Self {
            span: (op.to.start, op.to.end),
            tag,
        })
    }
}

pub type FeatureProvenance = Provenance<FeatureEdit>;

impl Provenance<FeatureEdit> {
    /// Tag strings in insertion order
    pub fn tags(&self) -> Vec<String> {
        self.payloads().map(|edit| edit.tag.clone()).collect()
    }

    /// A copy of `self` extended with one entry per non-equal op
    pub fn with_edits(&self, ops: &[EditOp]) -> Self {
        ops.iter()
            .filter_map(FeatureEdit::from_op)
            .fold(self.clone(), |prov, edit| prov.into_added(edit))
    }
}
