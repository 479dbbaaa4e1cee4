//! Lineage Core - provenance model for text transformation pipelines
//!
//! This crate provides:
//! - A lossless word tokenizer and a deterministic token diff engine
//! - Set-valued transformation and feature provenance with explicit sharing
//! - An arena of lineage records linked by id
//! - `apply`, which runs a batch transformation and derives child records
//! - Batch sessions that log originals and histories to a provenance sink
//! - Structured error and logging facilities shared by the other crates

pub use lineage_core_types;

pub mod analysis;
pub mod apply;
pub mod descriptor;
pub mod diff;
pub mod errors;
pub mod label;
pub mod logging_facility;
pub mod provenance;
pub mod record;
pub mod rng;
pub mod session;
pub mod sink;
pub mod text;
pub mod transform;

// Re-export commonly used types
pub use apply::apply;
pub use descriptor::{CanonicalDescriptor, TransformationDescriptor};
pub use errors::{ExError, ExErrorKind, LineageError, Result};
pub use label::Label;
pub use provenance::{FeatureProvenance, Provenance, TransformationProvenance};
pub use record::{LineageRecord, RecordArena, RecordState, TraceStep};
pub use rng::{RngHandle, RngState, TransformRng};
pub use session::BatchSession;
pub use sink::{AppliedStep, ProvenanceSink};
pub use text::{TextUnit, Tokenizer, WordTokenizer};
pub use transform::{Batch, FnTransformation, Invocation, TransformIdentity, Transformation};
