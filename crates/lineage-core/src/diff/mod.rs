//! Token-level diff engine
//!
//! Produces an edit script between two token sequences as a list of
//! [`EditOp`]s: maximal `Equal` runs separated by `Replace`, `Insert` and
//! `Delete` runs. The script is deterministic for a given input pair.
//!
//! # Example
//!
//! ```
//! use lineage_core::diff::{diff, EditTag};
//!
//! let a = ["the", " ", "cat"];
//! let b = ["the", " ", "dog"];
//! let ops = diff(&a, &b);
//! assert_eq!(ops.len(), 2);
//! assert_eq!(ops[1].tag, EditTag::Replace);
//! ```

mod align;
mod matcher;

pub use align::{align_weights, merge_subwords, SUBWORD_PREFIX};

use matcher::Matcher;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Kind of edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditTag {
    Equal,
    Replace,
    Insert,
    Delete,
}

impl EditTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditTag::Equal => "equal",
            EditTag::Replace => "replace",
            EditTag::Insert => "insert",
            EditTag::Delete => "delete",
        }
    }
}

impl std::fmt::Display for EditTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One opcode: `from` indexes the source, `to` the destination
///
/// `to` is empty for `Delete`, `from` is empty for `Insert`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditOp {
    pub tag: EditTag,
    pub from: Range<usize>,
    pub to: Range<usize>,
}

impl EditOp {
    fn new(tag: EditTag, from: Range<usize>, to: Range<usize>) -> Self {
        Self { tag, from, to }
    }

    /// Tag string recorded in feature provenance
    ///
    /// `"replace: [i1,i2]-[j1,j2]"`, `"insert: [i1,i2]-[j1,j2]"`,
    /// `"delete: [i1,i2]"`. `None` for `Equal`.
    pub fn feature_tag(&self) -> Option<String> {
        let (i1, i2, j1, j2) = (self.from.start, self.from.end, self.to.start, self.to.end);
        match self.tag {
            EditTag::Equal => None,
            EditTag::Delete => Some(format!("delete: [{},{}]", i1, i2)),
            EditTag::Replace | EditTag::Insert => Some(format!(
                "{}: [{},{}]-[{},{}]",
                self.tag, i1, i2, j1, j2
            )),
        }
    }
}

/// Compute the edit script turning `src` into `dst`
///
/// - empty `src`: a single `Insert` covering `dst`
/// - empty `dst`: a single `Delete` covering `src`
/// - `src == dst`: a single `Equal` spanning both (zero-width when both are empty)
pub fn diff<T>(src: &[T], dst: &[T]) -> Vec<EditOp>
where
    T: Eq + std::hash::Hash,
{
    if src.is_empty() && dst.is_empty() {
        return vec![EditOp::new(EditTag::Equal, 0..0, 0..0)];
    }

    let mut ops = Vec::new();
    let (mut i, mut j) = (0, 0);
    for (ai, bj, size) in Matcher::new(src, dst).matching_blocks() {
        let tag = match (i < ai, j < bj) {
            (true, true) => Some(EditTag::Replace),
            (true, false) => Some(EditTag::Delete),
            (false, true) => Some(EditTag::Insert),
            (false, false) => None,
        };
        if let Some(tag) = tag {
            ops.push(EditOp::new(tag, i..ai, j..bj));
        }
        i = ai + size;
        j = bj + size;
        if size > 0 {
            ops.push(EditOp::new(EditTag::Equal, ai..i, bj..j));
        }
    }
    ops
}

/// Apply an edit script to `src`, taking inserted content from `dst`
///
/// For a script produced by `diff(src, dst)` the result equals `dst`.
pub fn reconstruct<T: Clone>(src: &[T], dst: &[T], ops: &[EditOp]) -> Vec<T> {
    revert(src, dst, ops, |_| false)
}

/// Apply an edit script but undo every op for which `undo` returns true
///
/// Undone ops keep the source tokens in place of the destination ones, which
/// isolates the effect of individual edits on a derived text.
pub fn revert<T, F>(src: &[T], dst: &[T], ops: &[EditOp], mut undo: F) -> Vec<T>
where
    T: Clone,
    F: FnMut(&EditOp) -> bool,
{
    let mut out = Vec::with_capacity(dst.len().max(src.len()));
    for op in ops {
        let keep_source = op.tag == EditTag::Equal || undo(op);
        if keep_source {
            out.extend_from_slice(&src[op.from.clone()]);
        } else {
            out.extend_from_slice(&dst[op.to.clone()]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn toks(s: &str) -> Vec<String> {
        s.split(' ').filter(|t| !t.is_empty()).map(str::to_string).collect()
    }

    #[test]
    fn test_empty_source_is_single_insert() {
        let ops = diff::<String>(&[], &toks("a b"));
        assert_eq!(ops, vec![EditOp::new(EditTag::Insert, 0..0, 0..2)]);
    }

    #[test]
    fn test_empty_destination_is_single_delete() {
        let ops = diff::<String>(&toks("a b c"), &[]);
        assert_eq!(ops, vec![EditOp::new(EditTag::Delete, 0..3, 0..0)]);
    }

    #[test]
    fn test_both_empty_is_zero_width_equal() {
        let ops = diff::<String>(&[], &[]);
        assert_eq!(ops, vec![EditOp::new(EditTag::Equal, 0..0, 0..0)]);
    }

    #[test]
    fn test_mixed_script() {
        let a = toks("the quick brown fox");
        let b = toks("the slow brown fox jumps");
        let ops = diff(&a, &b);
        assert_eq!(
            ops,
            vec![
                EditOp::new(EditTag::Equal, 0..1, 0..1),
                EditOp::new(EditTag::Replace, 1..2, 1..2),
                EditOp::new(EditTag::Equal, 2..4, 2..4),
                EditOp::new(EditTag::Insert, 4..4, 4..5),
            ]
        );
    }

    #[test]
    fn test_feature_tags() {
        assert_eq!(
            EditOp::new(EditTag::Replace, 1..2, 1..3).feature_tag().as_deref(),
            Some("replace: [1,2]-[1,3]")
        );
        assert_eq!(
            EditOp::new(EditTag::Delete, 4..6, 3..3).feature_tag().as_deref(),
            Some("delete: [4,6]")
        );
        assert!(EditOp::new(EditTag::Equal, 0..1, 0..1).feature_tag().is_none());
    }

    #[test]
    fn test_revert_selected_edit() {
        let a = toks("a b c d");
        let b = toks("a x c y");
        let ops = diff(&a, &b);
        let reverted = revert(&a, &b, &ops, |op| op.from == (1..2));
        assert_eq!(reverted, toks("a b c y"));
    }

    #[test]
    fn test_diff_is_deterministic() {
        let a = toks("a b a b a b");
        let b = toks("b a b a");
        assert_eq!(diff(&a, &b), diff(&a, &b));
    }

    fn token_seq() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(prop::sample::select(vec!["a", "b", "c", " ", "!"]), 0..24)
            .prop_map(|v| v.into_iter().map(str::to_string).collect())
    }

    proptest! {
        #[test]
        fn prop_round_trip(a in token_seq(), b in token_seq()) {
            let ops = diff(&a, &b);
            prop_assert_eq!(reconstruct(&a, &b, &ops), b);
        }

        #[test]
        fn prop_identity_is_single_equal(a in token_seq()) {
            let ops = diff(&a, &a);
            prop_assert_eq!(ops, vec![EditOp::new(EditTag::Equal, 0..a.len(), 0..a.len())]);
        }

        #[test]
        fn prop_equal_runs_really_match(a in token_seq(), b in token_seq()) {
            for op in diff(&a, &b).iter().filter(|op| op.tag == EditTag::Equal) {
                prop_assert_eq!(&a[op.from.clone()], &b[op.to.clone()]);
            }
        }

        #[test]
        fn prop_ops_tile_both_sequences(a in token_seq(), b in token_seq()) {
            let ops = diff(&a, &b);
            let (mut i, mut j) = (0, 0);
            for op in &ops {
                prop_assert_eq!(op.from.start, i);
                prop_assert_eq!(op.to.start, j);
                i = op.from.end;
                j = op.to.end;
            }
            prop_assert_eq!((i, j), (a.len(), b.len()));
        }
    }
}
