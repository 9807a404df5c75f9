//! Filesystem directory queue between stages.
//!
//! Each stage polls its input directory for batch files, processes them in
//! sequence order, archives consumed files under `Done/`, and relays the
//! run's completion marker to the next stage's directory once it appears.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Per-stage directory names under the data root, index 0 = stage 1.
pub const STAGE_DIRS: [&str; 5] = [
    "step1_backlinks",
    "step2_qid",
    "step3_coord",
    "step4_semantics",
    "step5_types",
];

/// Archive subfolder for consumed batch files.
pub const ARCHIVE_DIR: &str = "Done";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Directory owned by a stage's output (stage in 1..=5).
pub fn stage_dir(root: &Path, stage: u32) -> PathBuf {
    let idx = stage.clamp(1, STAGE_DIRS.len() as u32) as usize - 1;
    root.join(STAGE_DIRS[idx])
}

/// Completion marker filename for a run.
pub fn stop_marker_name(run_id: &str) -> String {
    format!("{run_id}_STOP")
}

/// Extract the numeric sequence from a batch filename
/// (`{run}_StepN_batch_007.json` → 7).
///
/// A `.json` file without a parseable sequence is a configuration error,
/// never silently skipped.
pub fn batch_sequence(file_name: &str) -> Result<u32> {
    let rest = file_name
        .split("_batch_")
        .nth(1)
        .with_context(|| format!("batch file without sequence number: {file_name}"))?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits
        .parse()
        .with_context(|| format!("unparseable batch sequence in {file_name}"))
}

/// Derive a downstream output file stem from an input batch file by
/// substituting the stage marker (`Step2` → `Step3`), preserving the
/// sequence suffix across stages.
pub fn advance_stage_stem(input: &Path, from: u32, to: u32) -> Result<String> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("batch file without a stem: {}", input.display()))?;
    let from_marker = format!("Step{from}");
    if !stem.contains(&from_marker) {
        bail!("expected {from_marker} in batch filename {stem}");
    }
    Ok(stem.replace(&from_marker, &format!("Step{to}")))
}

/// Result of a single poll pass.
#[derive(Debug, PartialEq, Eq)]
pub enum Poll {
    /// Handled and archived this many batch files; marker not seen yet.
    Processed(usize),
    /// Nothing new this pass.
    Idle,
    /// Completion marker seen (and relayed downstream when applicable).
    Finished,
}

/// Polling listener for one stage's input directory.
///
/// Exactly one listener should exist per stage per run; the protocol does
/// not arbitrate concurrent listeners on the same directory.
pub struct DirectoryListener {
    dir: PathBuf,
    next_dir: Option<PathBuf>,
    run_id: String,
    poll_interval: Duration,
}

impl DirectoryListener {
    pub fn new(dir: impl Into<PathBuf>, next_dir: Option<PathBuf>, run_id: &str) -> Self {
        Self {
            dir: dir.into(),
            next_dir,
            run_id: run_id.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Poll until the run's completion marker has been consumed.
    ///
    /// `handle` processes one batch file; an error from it (or any archive
    /// failure) aborts the listener — per-record failures are absorbed
    /// inside the stages, so anything surfacing here is unrecoverable.
    pub fn run(&self, mut handle: impl FnMut(&Path) -> Result<()>) -> Result<()> {
        log::info!("listening on {}", self.dir.display());
        loop {
            match self.poll_once(&mut handle)? {
                Poll::Finished => return Ok(()),
                Poll::Processed(_) | Poll::Idle => std::thread::sleep(self.poll_interval),
            }
        }
    }

    /// One watch/handle/archive/propagate pass, separated from the sleep
    /// loop so the protocol is testable.
    pub fn poll_once(&self, handle: &mut impl FnMut(&Path) -> Result<()>) -> Result<Poll> {
        let mut names: Vec<String> = Vec::new();
        let listing = std::fs::read_dir(&self.dir)
            .with_context(|| format!("cannot scan input dir {}", self.dir.display()))?;
        for dirent in listing {
            let dirent = dirent?;
            if dirent.file_type()?.is_file() {
                names.push(dirent.file_name().to_string_lossy().into_owned());
            }
        }

        let mut batches: Vec<(u32, &str)> = Vec::new();
        for name in names.iter().filter(|n| n.ends_with(".json")) {
            batches.push((batch_sequence(name)?, name));
        }
        batches.sort_by_key(|(seq, _)| *seq);

        let processed = batches.len();
        for (_, name) in batches {
            let path = self.dir.join(name);
            log::info!("new batch file detected: {}", path.display());
            handle(&path)?;
            self.archive(&path)?;
        }

        if names.iter().any(|n| *n == stop_marker_name(&self.run_id)) {
            self.propagate_marker()?;
            return Ok(Poll::Finished);
        }

        Ok(if processed > 0 {
            Poll::Processed(processed)
        } else {
            Poll::Idle
        })
    }

    /// Move a consumed batch file under `Done/`, replacing any prior
    /// archive of the same name so crash-restart reprocessing converges.
    fn archive(&self, path: &Path) -> Result<()> {
        let done = self.dir.join(ARCHIVE_DIR);
        std::fs::create_dir_all(&done)
            .with_context(|| format!("cannot create archive dir {}", done.display()))?;
        let file_name = path
            .file_name()
            .with_context(|| format!("cannot archive {}", path.display()))?;
        let dest = done.join(file_name);
        if dest.exists() {
            std::fs::remove_file(&dest)?;
        }
        std::fs::rename(path, &dest)
            .with_context(|| format!("cannot archive {}", path.display()))?;
        log::info!("archived {} -> {}", path.display(), dest.display());
        Ok(())
    }

    /// Relay the completion marker to the next stage's input directory,
    /// or retain it when this is the final stage.
    fn propagate_marker(&self) -> Result<()> {
        let marker = self.dir.join(stop_marker_name(&self.run_id));
        match &self.next_dir {
            Some(next) => {
                std::fs::create_dir_all(next)
                    .with_context(|| format!("cannot create next stage dir {}", next.display()))?;
                let dest = next.join(stop_marker_name(&self.run_id));
                if dest.exists() {
                    std::fs::remove_file(&dest)?;
                }
                std::fs::rename(&marker, &dest)
                    .with_context(|| format!("cannot relay marker {}", marker.display()))?;
                log::info!("completion marker relayed to {}", next.display());
            }
            None => log::info!("final stage complete, marker retained in {}", self.dir.display()),
        }
        Ok(())
    }
}
