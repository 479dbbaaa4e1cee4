//! Migration framework
//!
//! Provides:
//! - Migration runner with checksums verified on every open
//! - Idempotent application
//! - Embedded SQL migrations

mod checksums;
mod embedded;
mod runner;

pub use runner::apply_migrations;
