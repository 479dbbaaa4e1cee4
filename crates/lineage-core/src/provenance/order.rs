use serde::{Deserialize, Serialize};

/// Position of an entry within its provenance branch
///
/// A fresh entry gets the single-element path `[len]`. Merging pushes the
/// branch index onto the front, so independently numbered branches never
/// collide. Ordering is lexicographic over the path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderKey(Vec<u64>);

impl OrderKey {
    pub fn root(seq: u64) -> Self {
        Self(vec![seq])
    }

    pub fn with_branch(&self, branch: u64) -> Self {
        let mut path = Vec::with_capacity(self.0.len() + 1);
        path.push(branch);
        path.extend_from_slice(&self.0);
        Self(path)
    }

    pub fn path(&self) -> &[u64] {
        &self.0
    }

    /// Sequence number within the innermost branch
    pub fn seq(&self) -> u64 {
        self.0.last().copied().unwrap_or(0)
    }
}

impl std::fmt::Display for OrderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u64::to_string).collect();
        f.write_str(&parts.join("#"))
    }
}
