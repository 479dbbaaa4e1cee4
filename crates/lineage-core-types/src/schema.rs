//! Canonical schema constants for structured logging and events
//!
//! These constants keep field names consistent across logging and error reporting.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Entity identifiers
pub const FIELD_BATCH_ID: &str = "batch_id";
pub const FIELD_RECORD_ID: &str = "record_id";
pub const FIELD_RECORD_INDEX: &str = "record_index";
pub const FIELD_TRANSFORM_ID: &str = "transform_id";
pub const FIELD_RUN_NAME: &str = "run_name";

// Collection sizes
pub const FIELD_BATCH_LEN: &str = "batch_len";
pub const FIELD_ROWS: &str = "rows";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
