//! Append-only history of readings.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a new line, creating the file if needed.
    ///
    /// Each record is preceded by a newline, so a freshly created file starts
    /// with one empty line. Existing content is never rewritten.
    pub fn append(&self, record: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;

        file.write_all(format!("\n{record}").as_bytes())
            .and_then(|_| file.sync_data())
            .with_context(|| format!("failed to append to {}", self.path.display()))
    }
}
