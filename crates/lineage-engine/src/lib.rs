//! Lineage Engine - Replay orchestration
//!
//! Rebuilds transformation outputs purely from persisted provenance: a
//! [`TransformRegistry`] turns stored identities back into live
//! transformations and the [`ReplayEngine`] folds every persisted batch
//! through them.
//!
//! ## Logging Ownership
//!
//! The engine owns lifecycle logging for replay (`replay_all`,
//! `replay_into`); lower layers only emit `debug!` details.

pub mod registry;
pub mod replay;

pub use registry::{TransformFactory, TransformRegistry};
pub use replay::ReplayEngine;
