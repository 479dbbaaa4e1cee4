//! Store configuration
//!
//! Deserialized from TOML or built in code. Only `[backend]` is required.

use crate::errors::{config_error, io_error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_flush_after() -> usize {
    100
}

fn default_true() -> bool {
    true
}

fn default_records_file() -> String {
    "records.csv".to_string()
}

fn default_transforms_file() -> String {
    "transforms.csv".to_string()
}

fn default_applications_file() -> String {
    "applications.csv".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Buffered rows that trigger an automatic flush
    #[serde(default = "default_flush_after")]
    pub flush_after_n_items: usize,

    /// Write an audit row for every `(input, output)` pair
    #[serde(default = "default_true")]
    pub record_applications: bool,

    /// Run label for the relational backend; a UUIDv7 when absent
    #[serde(default)]
    pub run_name: Option<String>,

    pub backend: BackendConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    FlatFile {
        dir: PathBuf,
        #[serde(default = "default_records_file")]
        records_file: String,
        #[serde(default = "default_transforms_file")]
        transforms_file: String,
        #[serde(default = "default_applications_file")]
        applications_file: String,
    },
    Sqlite {
        path: PathBuf,
    },
}

impl StoreConfig {
    /// Flat-file store in `dir` with default file names
    pub fn flat_file(dir: impl Into<PathBuf>) -> Self {
        Self::with_backend(BackendConfig::FlatFile {
            dir: dir.into(),
            records_file: default_records_file(),
            transforms_file: default_transforms_file(),
            applications_file: default_applications_file(),
        })
    }

    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self::with_backend(BackendConfig::Sqlite { path: path.into() })
    }

    fn with_backend(backend: BackendConfig) -> Self {
        Self {
            flush_after_n_items: default_flush_after(),
            record_applications: true,
            run_name: None,
            backend,
        }
    }

    pub fn flush_after(mut self, n: usize) -> Self {
        self.flush_after_n_items = n;
        self
    }

    pub fn record_applications(mut self, enabled: bool) -> Self {
        self.record_applications = enabled;
        self
    }

    pub fn run_name(mut self, name: impl Into<String>) -> Self {
        self.run_name = Some(name.into());
        self
    }

    /// # Errors
    ///
    /// `InvalidInput` for malformed TOML or a zero flush threshold.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: StoreConfig = toml::from_str(content)
            .map_err(|e| config_error(format!("Failed to parse store config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// `Io` if the file cannot be read, otherwise as [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| io_error("read_store_config", e))?;
        Self::from_toml_str(&content)
    }

    /// # Errors
    ///
    /// `InvalidInput` if `flush_after_n_items` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.flush_after_n_items == 0 {
            return Err(config_error("flush_after_n_items must be at least 1"));
        }
        Ok(())
    }
}
