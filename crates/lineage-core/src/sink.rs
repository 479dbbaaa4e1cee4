//! Destination for provenance emitted by `apply` and batch sessions
//!
//! Stores implement [`ProvenanceSink`]; the core only ever sees this trait,
//! so a store handle is opened once by the driver and passed in explicitly.

use crate::descriptor::TransformationDescriptor;
use crate::errors::{ExError, Result};
use crate::label::Label;
use crate::record::LineageRecord;

/// Token granularity recorded alongside audit diffs
pub const DIFF_GRANULARITY: &str = "word";

pub trait ProvenanceSink {
    /// Record one `(input, output)` pair produced by a single apply step
    ///
    /// # Errors
    ///
    /// Implementation defined; a failed auto-flush leaves rows buffered.
    fn log(&mut self, input: &LineageRecord, output: &LineageRecord) -> std::result::Result<(), ExError>;

    /// Record a raw input that opens a replayable batch
    ///
    /// # Errors
    ///
    /// Implementation defined.
    fn log_original(&mut self, text: &str, target: Option<&Label>) -> std::result::Result<(), ExError>;

    /// Record the ordered transformations that produced the next logged original's final text
    ///
    /// # Errors
    ///
    /// Implementation defined.
    fn log_transform_prov(
        &mut self,
        entries: &[TransformationDescriptor],
    ) -> std::result::Result<(), ExError>;

    /// Write buffered rows; `force` ignores the size threshold and closes the batch
    ///
    /// # Errors
    ///
    /// A failed flush keeps every buffered row so it can be retried.
    fn flush(&mut self, force: bool) -> std::result::Result<(), ExError>;
}

/// Everything an audit row needs from one `(input, output)` pair
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedStep {
    pub input_text: String,
    pub input_target: Option<Label>,
    pub output_text: String,
    pub output_target: Option<Label>,
    pub descriptor: TransformationDescriptor,
    pub diff_tags: Vec<String>,
}

impl AppliedStep {
    /// # Errors
    ///
    /// `ProvenanceDeltaMismatch` unless `output` has exactly one more
    /// transformation entry than `input`; `Serialization` if that entry does
    /// not decode.
    pub fn from_pair(input: &LineageRecord, output: &LineageRecord) -> Result<Self> {
        let delta = output
            .transformation_provenance()
            .single_delta(input.transformation_provenance())?;
        let diff_tags = output
            .feature_provenance()
            .subtract(input.feature_provenance())
            .tags();

        Ok(Self {
            input_text: input.text().text().to_string(),
            input_target: input.target().cloned(),
            output_text: output.text().text().to_string(),
            output_target: output.target().cloned(),
            descriptor: delta.payload.parse()?,
            diff_tags,
        })
    }
}
