//! Per-stage batch processing template.
//!
//! [`run_stage`] owns the fixed orchestration — load, tag, process
//! (single-record or grouped), finalize, flush — while concrete stages
//! implement only the extension points they need and are composed with
//! their own reader/writer instances.

use std::time::{Duration, Instant};

use anyhow::Result;

use crate::entry::{HistoricalEntry, ProcessTag};
use crate::progress::fmt_num;
use crate::writer::EntryWriter;

/// Identity and mode of one stage execution.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub run_id: String,
    pub stage: u32,
    /// 1 = single-record mode; anything larger enables grouped mode.
    pub group_size: usize,
}

impl StageContext {
    pub fn new(run_id: &str, stage: u32) -> Self {
        Self {
            run_id: run_id.to_string(),
            stage,
            group_size: 1,
        }
    }

    pub fn with_group_size(mut self, group_size: usize) -> Self {
        self.group_size = group_size.max(1);
        self
    }
}

/// Outcome of processing one entry.
pub enum Verdict {
    Keep(HistoricalEntry),
    /// Rejected entry, kept visible on the report for diagnostics.
    Discard(HistoricalEntry),
}

/// Routing surface handed to `process_group`: accepted entries go to the
/// stage's writer, rejected ones to the discard list.
pub struct StageOutput<'a> {
    writer: &'a mut dyn EntryWriter,
    written: usize,
    discarded: Vec<HistoricalEntry>,
}

impl<'a> StageOutput<'a> {
    pub fn new(writer: &'a mut dyn EntryWriter) -> Self {
        Self {
            writer,
            written: 0,
            discarded: Vec::new(),
        }
    }

    pub fn keep(&mut self, entry: HistoricalEntry) -> Result<()> {
        self.writer.add(entry)?;
        self.written += 1;
        Ok(())
    }

    pub fn discard(&mut self, entry: HistoricalEntry) {
        self.discarded.push(entry);
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn discarded(&self) -> &[HistoricalEntry] {
        &self.discarded
    }

    fn into_parts(self) -> (usize, Vec<HistoricalEntry>) {
        (self.written, self.discarded)
    }
}

/// Extension points specialized by each pipeline stage.
pub trait BatchStage {
    fn context(&self) -> &StageContext;

    /// Produce the entries this run will process. Failure here is a
    /// configuration error and fatal for the stage.
    fn load_entries(&mut self) -> Result<Vec<HistoricalEntry>>;

    /// Single-record transform; the default passes the entry through.
    fn process_entry(&mut self, entry: HistoricalEntry) -> Result<Verdict> {
        Ok(Verdict::Keep(entry))
    }

    /// Grouped transform; the default routes each member through
    /// `process_entry` exactly as single-record mode would.
    fn process_group(
        &mut self,
        group: Vec<HistoricalEntry>,
        out: &mut StageOutput<'_>,
    ) -> Result<()> {
        for entry in group {
            match self.process_entry(entry)? {
                Verdict::Keep(e) => out.keep(e)?,
                Verdict::Discard(e) => out.discard(e),
            }
        }
        Ok(())
    }

    /// Optional end-of-run hook, invoked before the final flush.
    fn finalize(&mut self, _out: &mut StageOutput<'_>) -> Result<()> {
        Ok(())
    }
}

/// Operational summary of one stage execution.
#[derive(Debug)]
pub struct StageReport {
    pub loaded: usize,
    pub written: usize,
    pub discarded: Vec<HistoricalEntry>,
    pub elapsed: Duration,
}

/// Run a stage to completion against the given writer.
///
/// Order is fixed: load → tag → process → finalize → flush-if-pending.
pub fn run_stage(stage: &mut dyn BatchStage, writer: &mut dyn EntryWriter) -> Result<StageReport> {
    let started = Instant::now();

    let mut entries = stage.load_entries()?;
    let ctx = stage.context().clone();
    for entry in &mut entries {
        entry.tag = ProcessTag::new(&ctx.run_id, ctx.stage);
    }
    let loaded = entries.len();

    let mut out = StageOutput::new(writer);
    if ctx.group_size <= 1 {
        for entry in entries {
            match stage.process_entry(entry)? {
                Verdict::Keep(e) => out.keep(e)?,
                Verdict::Discard(e) => out.discard(e),
            }
        }
    } else {
        let mut group = Vec::with_capacity(ctx.group_size);
        for entry in entries {
            group.push(entry);
            if group.len() >= ctx.group_size {
                let full = std::mem::take(&mut group);
                stage.process_group(full, &mut out)?;
            }
        }
        if !group.is_empty() {
            stage.process_group(group, &mut out)?;
        }
    }

    stage.finalize(&mut out)?;
    let (written, discarded) = out.into_parts();

    if writer.needs_flush() {
        writer.flush()?;
    }

    let elapsed = started.elapsed();
    log::info!(
        "stage {}: {} entries processed in {:.2}s ({} written, {} discarded)",
        ctx.stage,
        fmt_num(loaded),
        elapsed.as_secs_f64(),
        fmt_num(written),
        fmt_num(discarded.len())
    );

    Ok(StageReport {
        loaded,
        written,
        discarded,
        elapsed,
    })
}
