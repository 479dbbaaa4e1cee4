use lineage_core_types::{BatchId, TransformId};
use thiserror::Error;

/// Result type alias using LineageError
pub type Result<T> = std::result::Result<T, LineageError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Stable, structured classification of every error the lineage crates can
/// raise. Each kind maps to a stable error code usable in tests and by
/// callers that need to branch on failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Structural/Validation
    InvalidInput,
    NotFound,
    ShapeMismatch,

    // Provenance
    ProvenanceDeltaMismatch,
    SharedProvenanceMutation,
    CorruptProvenance,

    // Replay
    TransformNotFound,

    // Persistence
    FlushFailure,
    Io,
    Serialization,
    Persistence,
    ChecksumMismatch,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::ShapeMismatch => "ERR_SHAPE_MISMATCH",
            ExErrorKind::ProvenanceDeltaMismatch => "ERR_PROVENANCE_DELTA_MISMATCH",
            ExErrorKind::SharedProvenanceMutation => "ERR_SHARED_PROVENANCE_MUTATION",
            ExErrorKind::CorruptProvenance => "ERR_CORRUPT_PROVENANCE",
            ExErrorKind::TransformNotFound => "ERR_TRANSFORM_NOT_FOUND",
            ExErrorKind::FlushFailure => "ERR_FLUSH_FAILURE",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::ChecksumMismatch => "ERR_CHECKSUM_MISMATCH",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// Whether re-invoking the failed operation can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExErrorKind::FlushFailure | ExErrorKind::Io)
    }
}

/// Canonical structured error type
///
/// Carries a kind for programmatic handling plus enough context (batch,
/// record index, transform id) to locate the offending row in a persisted log.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    batch_id: Option<BatchId>,
    record_index: Option<usize>,
    transform_id: Option<TransformId>,
    pending_rows: Option<usize>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            batch_id: None,
            record_index: None,
            transform_id: None,
            pending_rows: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add batch context
    pub fn with_batch_id(mut self, batch_id: BatchId) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    /// Add record index context (position inside the batch)
    pub fn with_record_index(mut self, index: usize) -> Self {
        self.record_index = Some(index);
        self
    }

    /// Add transform id context
    pub fn with_transform_id(mut self, transform_id: TransformId) -> Self {
        self.transform_id = Some(transform_id);
        self
    }

    /// Add the number of rows still buffered after a failed flush
    pub fn with_pending_rows(mut self, pending: usize) -> Self {
        self.pending_rows = Some(pending);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the batch context, if any
    pub fn batch_id(&self) -> Option<BatchId> {
        self.batch_id
    }

    /// Get the record index context, if any
    pub fn record_index(&self) -> Option<usize> {
        self.record_index
    }

    /// Get the transform id context, if any
    pub fn transform_id(&self) -> Option<TransformId> {
        self.transform_id
    }

    /// Rows still buffered, for flush failures
    pub fn pending_rows(&self) -> Option<usize> {
        self.pending_rows
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(batch_id) = self.batch_id {
            write!(f, " (batch_id: {})", batch_id)?;
        }
        if let Some(index) = self.record_index {
            write!(f, " (record_index: {})", index)?;
        }
        if let Some(transform_id) = self.transform_id {
            write!(f, " (transform_id: {})", transform_id)?;
        }
        if let Some(pending) = self.pending_rows {
            write!(f, " (pending_rows: {})", pending)?;
        }
        if let Some(source) = &self.source {
            write!(f, " caused by {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|s| s as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Domain errors raised by the lineage core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LineageError {
    /// A batch transformation returned a different number of texts or targets
    #[error("Transformation '{callable}' returned {actual} outputs for {expected} inputs")]
    ShapeMismatch {
        callable: String,
        expected: usize,
        actual: usize,
    },

    /// No registered factory resolves the persisted transformation identity
    #[error("Transformation not found: {key}")]
    TransformNotFound {
        key: String,
        transform_id: Option<TransformId>,
        batch_id: Option<BatchId>,
    },

    /// Persisted provenance cannot be decoded or is inconsistent
    #[error("Corrupt provenance: {reason}")]
    CorruptProvenance {
        reason: String,
        transform_id: Option<TransformId>,
        batch_id: Option<BatchId>,
    },

    /// A single apply step should add exactly one transformation entry
    #[error("Expected exactly {expected} new provenance entry, found {actual}")]
    ProvenanceDeltaMismatch { expected: usize, actual: usize },

    /// In-place mutation attempted on provenance that has other owners
    #[error("Provenance is shared and cannot be mutated in place")]
    SharedProvenanceMutation,

    /// Lineage record id is not present in the arena
    #[error("Record not found: {record_id}")]
    RecordNotFound { record_id: u64 },

    /// Caller supplied malformed input
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Buffered rows could not be written; the buffer is unchanged
    #[error("Flush failed with {pending} rows still buffered: {reason}")]
    FlushFailure {
        pending: usize,
        reason: String,
        batch_id: Option<BatchId>,
    },

    /// Serialization error
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl LineageError {
    /// Build a corrupt-provenance error without location context
    pub fn corrupt(reason: impl Into<String>) -> Self {
        LineageError::CorruptProvenance {
            reason: reason.into(),
            transform_id: None,
            batch_id: None,
        }
    }
}

impl From<LineageError> for ExError {
    fn from(err: LineageError) -> Self {
        match err {
            LineageError::ShapeMismatch {
                callable,
                expected,
                actual,
            } => ExError::new(ExErrorKind::ShapeMismatch)
                .with_op("apply")
                .with_message(format!(
                    "'{}' returned {} outputs for {} inputs",
                    callable, actual, expected
                )),

            LineageError::TransformNotFound {
                key,
                transform_id,
                batch_id,
            } => with_location(
                ExError::new(ExErrorKind::TransformNotFound)
                    .with_op("replay")
                    .with_message(format!("No factory registered for '{}'", key)),
                transform_id,
                batch_id,
            ),

            LineageError::CorruptProvenance {
                reason,
                transform_id,
                batch_id,
            } => with_location(
                ExError::new(ExErrorKind::CorruptProvenance).with_message(reason),
                transform_id,
                batch_id,
            ),

            LineageError::ProvenanceDeltaMismatch { expected, actual } => {
                ExError::new(ExErrorKind::ProvenanceDeltaMismatch)
                    .with_op("subtract")
                    .with_message(format!("expected {} new entry, found {}", expected, actual))
            }

            LineageError::SharedProvenanceMutation => {
                ExError::new(ExErrorKind::SharedProvenanceMutation)
                    .with_op("push")
                    .with_message("Provenance is shared; clone before mutating")
            }

            LineageError::RecordNotFound { record_id } => ExError::new(ExErrorKind::NotFound)
                .with_message(format!("Record {} not found", record_id)),

            LineageError::InvalidInput { reason } => {
                ExError::new(ExErrorKind::InvalidInput).with_message(reason)
            }

            LineageError::FlushFailure {
                pending,
                reason,
                batch_id,
            } => with_location(
                ExError::new(ExErrorKind::FlushFailure)
                    .with_op("flush")
                    .with_pending_rows(pending)
                    .with_message(reason),
                None,
                batch_id,
            ),

            LineageError::Serialization { message } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }
        }
    }
}

fn with_location(
    mut err: ExError,
    transform_id: Option<TransformId>,
    batch_id: Option<BatchId>,
) -> ExError {
    if let Some(transform_id) = transform_id {
        err = err.with_transform_id(transform_id);
    }
    if let Some(batch_id) = batch_id {
        err = err.with_batch_id(batch_id);
    }
    err
}

/// Conversion from ExError back to the core error enum
///
/// Used where a store-level failure crosses into core code (sinks invoked
/// from `apply`). Kinds without a domain variant keep their message.
impl From<ExError> for LineageError {
    fn from(err: ExError) -> Self {
        match err.kind() {
            ExErrorKind::FlushFailure | ExErrorKind::Io | ExErrorKind::Persistence => {
                let reason = match err.source_error() {
                    Some(cause) => cause.to_string(),
                    None => err.message().to_string(),
                };
                LineageError::FlushFailure {
                    pending: err.pending_rows().unwrap_or(0),
                    reason,
                    batch_id: err.batch_id(),
                }
            }
            ExErrorKind::CorruptProvenance | ExErrorKind::ChecksumMismatch => {
                LineageError::CorruptProvenance {
                    reason: err.to_string(),
                    transform_id: err.transform_id(),
                    batch_id: err.batch_id(),
                }
            }
            ExErrorKind::Serialization => LineageError::Serialization {
                message: err.to_string(),
            },
            _ => LineageError::InvalidInput {
                reason: err.to_string(),
            },
        }
    }
}

/// Conversion from serde_json::Error to LineageError
impl From<serde_json::Error> for LineageError {
    fn from(err: serde_json::Error) -> Self {
        LineageError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Conversion from serde_json::Error to ExError
impl From<serde_json::Error> for ExError {
    fn from(err: serde_json::Error) -> Self {
        ExError::new(ExErrorKind::Serialization).with_message(err.to_string())
    }
}
