//! All-or-nothing appends across several files
//!
//! Each file's length is recorded before it is appended to. If any append
//! fails, every file touched so far is truncated back to its recorded length.

use crate::errors::{io_error, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append `content` to each path in order, rolling all of them back on failure
pub fn append_all(writes: &[(&Path, &str)]) -> Result<()> {
    let mut touched: Vec<(PathBuf, u64)> = Vec::new();
    for (path, content) in writes {
        if content.is_empty() {
            continue;
        }
        let result = current_len(path).and_then(|len| {
            touched.push((path.to_path_buf(), len));
            append(path, content)
        });
        if let Err(err) = result {
            rollback(&touched);
            return Err(err);
        }
    }
    Ok(())
}

fn current_len(path: &Path) -> Result<u64> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(io_error("stat_flat_file", e)),
    }
}

fn append(path: &Path, content: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_error("open_flat_file", e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| io_error("append_flat_file", e))?;
    file.sync_data().map_err(|e| io_error("sync_flat_file", e))
}

fn rollback(touched: &[(PathBuf, u64)]) {
    for (path, len) in touched.iter().rev() {
        let truncated = OpenOptions::new()
            .write(true)
            .open(path)
            .and_then(|file| file.set_len(*len));
        if let Err(err) = truncated {
            tracing::error!(
                component = module_path!(),
                path = %path.display(),
                error = %err,
                "could not roll back partial append"
            );
        }
    }
}
