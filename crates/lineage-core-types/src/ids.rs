//! Identifier types for records, batches, transforms and runs
//!
//! Numeric ids are dense and assigned by their owner (the record arena for
//! `RecordId`, a provenance store for `BatchId` and `TransformId`). They are
//! transparent on the wire so persisted rows hold plain integers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Get the raw integer value
            pub fn get(self) -> u64 {
                self.0
            }

            /// The id following this one
            pub fn next(self) -> Self {
                Self(self.0 + 1)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Index of a lineage record inside its arena
    RecordId
);
numeric_id!(
    /// Sequence number of a persisted batch, increasing per flush
    BatchId
);
numeric_id!(
    /// Id of a de-duplicated transformation definition
    TransformId
);

/// Human-readable name of a logging run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunName(String);

impl RunName {
    /// Generate a fresh run name using UUIDv7
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create from an existing string
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for RunName {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
