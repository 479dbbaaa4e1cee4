use crate::errors::{LineageError, Result};
use serde::{Deserialize, Serialize};

/// Target attached to a text
///
/// Serialized untagged, so class labels persist as plain JSON numbers.
/// JSON has no encoding for NaN or infinity; [`Label::ensure_persistable`]
/// rejects such scores before they reach a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Class(i64),
    Score(f64),
    Text(String),
}

impl Label {
    pub fn as_class(&self) -> Option<i64> {
        match self {
            Label::Class(c) => Some(*c),
            _ => None,
        }
    }

    /// Reject scores that would not survive a JSON round trip
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a NaN or infinite `Score`.
    pub fn ensure_persistable(&self) -> Result<()> {
        match self {
            Label::Score(s) if !s.is_finite() => Err(LineageError::InvalidInput {
                reason: format!("score label {} has no JSON encoding", s),
            }),
            _ => Ok(()),
        }
    }
}

impl From<i64> for Label {
    fn from(value: i64) -> Self {
        Label::Class(value)
    }
}

impl From<f64> for Label {
    fn from(value: f64) -> Self {
        Label::Score(value)
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Label::Text(value.to_string())
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Class(c) => write!(f, "{}", c),
            Label::Score(s) => write!(f, "{}", s),
            Label::Text(t) => f.write_str(t),
        }
    }
}
