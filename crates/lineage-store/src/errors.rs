//! Error handling for lineage-store
//!
//! Wraps lineage-core ExError with store-specific helpers

use lineage_core::errors::{ExError, ExErrorKind};

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> ExError {
    ExError::new(ExErrorKind::ChecksumMismatch)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ))
}

/// Wrap the cause of a failed flush; the buffer is still intact
pub fn flush_failure(pending: usize, cause: ExError) -> ExError {
    ExError::new(ExErrorKind::FlushFailure)
        .with_op("flush")
        .with_pending_rows(pending)
        .with_message("buffered rows retained for retry")
        .with_source(cause)
}

/// A persisted row that cannot be decoded
pub fn corrupt_row(file: &str, line: usize, reason: impl std::fmt::Display) -> ExError {
    ExError::new(ExErrorKind::CorruptProvenance)
        .with_op("load")
        .with_record_index(line)
        .with_message(format!("{} row {}: {}", file, line, reason))
}

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}

/// Create a configuration error
pub fn config_error(reason: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::InvalidInput)
        .with_op("store_config")
        .with_message(reason)
}
