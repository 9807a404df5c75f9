//! Batch file reader: one JSON entry per line.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::entry::HistoricalEntry;

/// Loads a durable batch file produced by an upstream stage.
///
/// A missing file or an unparseable line is a configuration error and
/// fatal for the stage; per-record tolerance applies only to *absent
/// optional fields*, not to broken JSON.
pub struct BatchReader {
    path: PathBuf,
}

impl BatchReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<HistoricalEntry>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("cannot read batch file {}", self.path.display()))?;

        let mut entries = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: HistoricalEntry = serde_json::from_str(line).with_context(|| {
                format!("{}:{}: malformed entry", self.path.display(), lineno + 1)
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }
}
