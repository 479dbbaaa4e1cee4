//! Edit statistics over derived records
//!
//! Aggregates which concrete edits transformations made, by re-diffing each
//! derived record against its predecessor. Paired with pass/fail counts from
//! an evaluation run, [`suspicious_score`] ranks edits by how strongly they
//! are associated with failures.

use crate::diff::{diff, EditTag};
use crate::errors::Result;
use crate::record::RecordArena;
use lineage_core_types::RecordId;
use std::collections::BTreeMap;

/// A concrete edit: op kind plus the replaced and replacing text
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EditKey {
    pub tag: EditTag,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct EditStats {
    op_counts: BTreeMap<EditTag, usize>,
    edits: BTreeMap<EditKey, usize>,
}

impl EditStats {
    /// Count edits for every derived record among `ids`; raw records are skipped
    ///
    /// # Errors
    ///
    /// `RecordNotFound` for unknown ids or dangling `prev` links.
    pub fn from_records(arena: &RecordArena, ids: &[RecordId]) -> Result<Self> {
        let mut stats = Self::default();
        for &id in ids {
            let record = arena.get(id)?;
            let Some(prev) = record.prev() else {
                continue;
            };
            let parent = arena.get(prev)?;
            let (src, dst) = (parent.text().tokens(), record.text().tokens());
            for op in diff(src, dst).into_iter().filter(|op| op.tag != EditTag::Equal) {
                *stats.op_counts.entry(op.tag).or_default() += 1;
                let key = EditKey {
                    tag: op.tag,
                    from: src[op.from].concat(),
                    to: dst[op.to].concat(),
                };
                *stats.edits.entry(key).or_default() += 1;
            }
        }
        Ok(stats)
    }

    pub fn op_count(&self, tag: EditTag) -> usize {
        self.op_counts.get(&tag).copied().unwrap_or(0)
    }

    pub fn edit_count(&self, key: &EditKey) -> usize {
        self.edits.get(key).copied().unwrap_or(0)
    }

    /// The `n` most frequent edits, ties broken by key order
    pub fn most_common(&self, n: usize) -> Vec<(EditKey, usize)> {
        let mut ranked: Vec<(EditKey, usize)> =
            self.edits.iter().map(|(k, &c)| (k.clone(), c)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(n);
        ranked
    }
}

/// Share of an edit's failure rate in its combined failure and pass rates, in percent
///
/// `fail / total_fail` and `pass / total_pass` are each taken as 0 when their
/// total is 0; the score is 0 when both rates are 0.
pub fn suspicious_score(fail: usize, pass: usize, total_fail: usize, total_pass: usize) -> f64 {
    let rate = |n: usize, total: usize| {
        if total == 0 {
            0.0
        } else {
            n as f64 / total as f64
        }
    };
    let fail_rate = rate(fail, total_fail);
    let pass_rate = rate(pass, total_pass);
    if fail_rate + pass_rate == 0.0 {
        0.0
    } else {
        fail_rate / (fail_rate + pass_rate) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suspicious_score() {
        assert_eq!(suspicious_score(0, 0, 10, 10), 0.0);
        assert_eq!(suspicious_score(5, 0, 10, 10), 100.0);
        assert_eq!(suspicious_score(5, 5, 10, 10), 50.0);
        assert_eq!(suspicious_score(3, 3, 0, 10), 0.0);
    }

    #[test]
    fn test_empty_stats() {
        let stats = EditStats::default();
        assert_eq!(stats.op_count(EditTag::Insert), 0);
        assert!(stats.most_common(3).is_empty());
    }
}
