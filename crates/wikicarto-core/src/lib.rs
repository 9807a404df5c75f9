//! WikiCarto Core - Batch-processing framework for the WikiCarto pipeline
//!
//! This crate provides the stage-independent machinery: the domain record
//! model, durable batch readers/writers, the resilient API client, the
//! batch-stage template, and the directory-queue protocol that hands work
//! from one stage process to the next.

pub mod client;
pub mod entry;
pub mod lambert;
pub mod logging;
pub mod progress;
pub mod queue;
pub mod reader;
pub mod stage;
pub mod writer;

// Re-exports for convenience
pub use client::{ApiError, ClientConfig, WikiClient};
pub use entry::{HistoricalEntry, ProcessTag};
pub use logging::init_logging;
pub use progress::{fmt_num, ProgressContext, SharedProgress};
pub use queue::{stage_dir, stop_marker_name, DirectoryListener, Poll};
pub use reader::BatchReader;
pub use stage::{run_stage, BatchStage, StageContext, StageOutput, StageReport, Verdict};
pub use writer::{EntryWriter, JsonBatchWriter};
