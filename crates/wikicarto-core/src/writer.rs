//! Writer contract shared by the JSONL batch writer and the relational
//! writer, plus the line-delimited implementation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::entry::HistoricalEntry;

/// Durable sink for the entries a stage accepts.
///
/// `flush()` must tolerate an empty pending set; the stage template calls
/// it once at end-of-run whenever `needs_flush()` reports pending data.
pub trait EntryWriter {
    fn add(&mut self, entry: HistoricalEntry) -> Result<()>;
    fn needs_flush(&self) -> bool;
    fn flush(&mut self) -> Result<()>;
}

/// Buffering writer that flushes line-delimited JSON batch files.
///
/// Unbounded mode writes a single `{stem}.json` at end-of-run; bounded
/// mode flushes eagerly every `batch_size` entries into numbered
/// `{stem}_batch_{seq:03}.json` files.
pub struct JsonBatchWriter {
    out_dir: PathBuf,
    stem: String,
    run_id: String,
    batch_size: Option<usize>,
    buffer: Vec<HistoricalEntry>,
    seq: u32,
}

impl JsonBatchWriter {
    /// Single-batch writer: everything lands in one `{stem}.json`.
    pub fn single(out_dir: impl Into<PathBuf>, stem: &str, run_id: &str) -> Result<Self> {
        Self::create(out_dir.into(), stem, run_id, None)
    }

    /// Bounded writer: eager flush every `batch_size` entries.
    pub fn bounded(
        out_dir: impl Into<PathBuf>,
        stem: &str,
        run_id: &str,
        batch_size: usize,
    ) -> Result<Self> {
        Self::create(out_dir.into(), stem, run_id, Some(batch_size.max(1)))
    }

    fn create(
        out_dir: PathBuf,
        stem: &str,
        run_id: &str,
        batch_size: Option<usize>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&out_dir)
            .with_context(|| format!("cannot create output dir {}", out_dir.display()))?;
        Ok(Self {
            out_dir,
            stem: stem.to_string(),
            run_id: run_id.to_string(),
            batch_size,
            buffer: Vec::new(),
            seq: 1,
        })
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    fn next_file_name(&self) -> String {
        match self.batch_size {
            None => format!("{}.json", self.stem),
            Some(_) => format!("{}_batch_{:03}.json", self.stem, self.seq),
        }
    }

    /// Write the run's completion marker into the output directory.
    ///
    /// Called once by the owning stage after the final flush; presence-only
    /// semantics, so the file is empty.
    pub fn emit_stop_marker(&self) -> Result<PathBuf> {
        let path = self.out_dir.join(crate::queue::stop_marker_name(&self.run_id));
        std::fs::write(&path, "")
            .with_context(|| format!("cannot write completion marker {}", path.display()))?;
        log::info!("completion marker written: {}", path.display());
        Ok(path)
    }
}

impl EntryWriter for JsonBatchWriter {
    fn add(&mut self, entry: HistoricalEntry) -> Result<()> {
        self.buffer.push(entry);
        if let Some(size) = self.batch_size {
            if self.buffer.len() >= size {
                self.flush()?;
            }
        }
        Ok(())
    }

    fn needs_flush(&self) -> bool {
        !self.buffer.is_empty()
    }

    fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let path = self.out_dir.join(self.next_file_name());
        let mut lines = String::new();
        for entry in &self.buffer {
            lines.push_str(&serde_json::to_string(entry)?);
            lines.push('\n');
        }
        std::fs::write(&path, lines)
            .with_context(|| format!("cannot write batch file {}", path.display()))?;

        log::info!(
            "batch {} saved with {} entries ({})",
            self.seq,
            self.buffer.len(),
            path.display()
        );
        self.buffer.clear();
        if self.batch_size.is_some() {
            self.seq += 1;
        }
        Ok(())
    }
}
