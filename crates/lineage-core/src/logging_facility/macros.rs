//! Canonical logging macros
//!
//! Every bracketed operation emits a `start` event and then exactly one of
//! `end` or `end_error`. Callers need `tracing` in scope as a dependency.

/// Log the start of an operation
///
/// ```
/// # use lineage_core::log_op_start;
/// log_op_start!("apply");
/// log_op_start!("apply", batch_len = 2usize);
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr $(, $($field:tt)+)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::lineage_core_types::schema::EVENT_START,
            $($($field)+)?
        );
    };
}

/// Log the successful end of an operation
///
/// ```
/// # use lineage_core::log_op_end;
/// log_op_end!("flush", duration_ms = 3);
/// log_op_end!("replay_all", duration_ms = 3, records = 2usize);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr $(, $($field:tt)+)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::lineage_core_types::schema::EVENT_END,
            duration_ms = $duration,
            $($($field)+)?
        );
    };
}

/// Log an operation error
///
/// The error is converted into `ExError` for its kind and stable code. The
/// batch and transform ids it carries, if any, become `batch_id` and
/// `transform_id` fields so a failing replay points at the persisted row.
///
/// ```
/// # use lineage_core::{log_op_error, errors::LineageError};
/// let err = LineageError::SharedProvenanceMutation;
/// log_op_error!("push", err, duration_ms = 0);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)+)?) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::lineage_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?ex_err.kind(),
            err_code = ex_err.code(),
            batch_id = ?ex_err.batch_id().map(|b| b.get()),
            transform_id = ?ex_err.transform_id().map(|t| t.get()),
            $($($field)+)?
        );
    }};
}
