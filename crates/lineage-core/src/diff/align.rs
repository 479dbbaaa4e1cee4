//! Weight alignment across tokenizations
//!
//! Model attributions usually arrive per sub-word piece while lineage spans
//! are per word. These helpers carry per-token weights from one tokenization
//! onto another using the same opcode alignment as the diff engine.

use super::{diff, EditTag};
use crate::errors::{LineageError, Result};

/// Continuation marker used by word-piece tokenizers
pub const SUBWORD_PREFIX: &str = "##";

#[derive(Clone, Copy, Default)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Redistribute `weights` (one per `weighted` token) onto `target` tokens
///
/// Aligns `target` against `weighted`:
/// - `Equal` copies weights one to one
/// - `Replace` gives every target token in the span the mean of the replaced weights
/// - `Insert` (pieces with no target counterpart) averages into the nearest
///   preceding Equal-aligned target token, or the next one when none precedes
/// - `Delete` (target tokens with nothing to align to) yields `None`
///
/// # Errors
///
/// `InvalidInput` when `weights` and `weighted` differ in length.
pub fn align_weights(
    target: &[String],
    weighted: &[String],
    weights: &[f64],
) -> Result<Vec<Option<f64>>> {
    if weighted.len() != weights.len() {
        return Err(LineageError::InvalidInput {
            reason: format!(
                "{} weights supplied for {} tokens",
                weights.len(),
                weighted.len()
            ),
        });
    }

    let mut acc = vec![Mean::default(); target.len()];
    let mut last_equal: Option<usize> = None;
    let mut pending: Vec<f64> = Vec::new();

    for op in diff(target, weighted) {
        match op.tag {
            EditTag::Equal => {
                if op.from.is_empty() {
                    continue;
                }
                for (i, j) in op.from.clone().zip(op.to.clone()) {
                    acc[i].push(weights[j]);
                }
                for w in pending.drain(..) {
                    acc[op.from.start].push(w);
                }
                last_equal = Some(op.from.end - 1);
            }
            EditTag::Replace => {
                let m = mean(&weights[op.to.clone()]);
                for i in op.from.clone() {
                    acc[i].push(m);
                }
            }
            EditTag::Insert => match last_equal {
                Some(i) => weights[op.to.clone()].iter().for_each(|&w| acc[i].push(w)),
                None => pending.extend_from_slice(&weights[op.to.clone()]),
            },
            EditTag::Delete => {}
        }
    }

    Ok(acc.into_iter().map(Mean::value).collect())
}

/// Merge word-piece continuations into their head token
///
/// A token starting with `prefix` is glued (prefix stripped) onto the token
/// before it and the merged weight is the mean of its pieces. A continuation
/// with no head keeps its own slot.
///
/// # Errors
///
/// `InvalidInput` when `tokens` and `weights` differ in length.
pub fn merge_subwords(
    tokens: &[String],
    weights: &[f64],
    prefix: &str,
) -> Result<(Vec<String>, Vec<f64>)> {
    if tokens.len() != weights.len() {
        return Err(LineageError::InvalidInput {
            reason: format!("{} weights supplied for {} tokens", weights.len(), tokens.len()),
        });
    }

    let mut words: Vec<String> = Vec::new();
    let mut means: Vec<Mean> = Vec::new();
    for (token, &weight) in tokens.iter().zip(weights) {
        let continuation = token.strip_prefix(prefix).filter(|_| !prefix.is_empty());
        if let Some(rest) = continuation {
            if let (Some(head), Some(m)) = (words.last_mut(), means.last_mut()) {
                head.push_str(rest);
                m.push(weight);
                continue;
            }
        }
        words.push(token.clone());
        let mut m = Mean::default();
        m.push(weight);
        means.push(m);
    }

    let merged = means.into_iter().filter_map(Mean::value).collect();
    Ok((words, merged))
}
