//! Integration tests for the directory-queue handoff between two stages.

use std::path::Path;

use wikicarto_core::queue::{advance_stage_stem, ARCHIVE_DIR};
use wikicarto_core::{
    BatchReader, DirectoryListener, EntryWriter, HistoricalEntry, JsonBatchWriter, Poll,
};

fn seed_entry(n: usize) -> HistoricalEntry {
    HistoricalEntry::new(
        format!("Abbaye {n}"),
        format!("https://fr.wikipedia.org/wiki/Abbaye_{n}"),
    )
}

/// Stage 1 writes bounded batches + marker; the stage-2 listener drains
/// them in order, rewrites each into the next directory, and relays the
/// marker.
#[test]
fn two_stage_handoff() {
    let root = tempfile::tempdir().unwrap();
    let step1 = root.path().join("step1_backlinks");
    let step2 = root.path().join("step2_qid");

    // producer side: 5 entries, batch size 2 → 3 files, then the marker
    let mut writer = JsonBatchWriter::bounded(&step1, "JD01_Step1", "JD01", 2).unwrap();
    for n in 0..5 {
        writer.add(seed_entry(n)).unwrap();
    }
    if writer.needs_flush() {
        writer.flush().unwrap();
    }
    writer.emit_stop_marker().unwrap();

    // consumer side: enrich each file into step2 under the advanced name
    let listener = DirectoryListener::new(&step1, Some(step2.clone()), "JD01");
    let step2_for_handler = step2.clone();
    let mut handled = Vec::new();
    let mut handle = |path: &Path| {
        let entries = BatchReader::new(path).load()?;
        let stem = advance_stage_stem(path, 1, 2)?;
        let mut out = JsonBatchWriter::single(&step2_for_handler, &stem, "JD01")?;
        for mut entry in entries {
            entry.external_id = Some("Q0".into());
            out.add(entry)?;
        }
        out.flush()?;
        handled.push(stem);
        Ok(())
    };

    let poll = listener.poll_once(&mut handle).unwrap();
    assert_eq!(poll, Poll::Finished);
    assert_eq!(
        handled,
        vec![
            "JD01_Step2_batch_001",
            "JD01_Step2_batch_002",
            "JD01_Step2_batch_003"
        ]
    );

    // consumed inputs are archived, not deleted
    let archived = std::fs::read_dir(step1.join(ARCHIVE_DIR)).unwrap().count();
    assert_eq!(archived, 3);

    // marker moved downstream exactly once
    assert!(!step1.join("JD01_STOP").exists());
    assert!(step2.join("JD01_STOP").exists());

    // downstream batch files are valid input for the next reader
    let entries = BatchReader::new(step2.join("JD01_Step2_batch_001.json"))
        .load()
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.external_id.is_some()));
}

/// A restarted listener reprocesses a file still present in its input
/// directory; archiving replaces the prior archive without error.
#[test]
fn crash_restart_reprocesses_pending_file() {
    let root = tempfile::tempdir().unwrap();
    let step1 = root.path().join("step1_backlinks");

    let mut writer = JsonBatchWriter::bounded(&step1, "JD01_Step1", "JD01", 2).unwrap();
    writer.add(seed_entry(0)).unwrap();
    writer.add(seed_entry(1)).unwrap();

    let listener = DirectoryListener::new(&step1, None, "JD01");
    let mut passes = 0;
    listener
        .poll_once(&mut |_: &Path| {
            passes += 1;
            Ok(())
        })
        .unwrap();

    // simulate a crash that left the flushed file unarchived: restore it
    std::fs::copy(
        step1.join(ARCHIVE_DIR).join("JD01_Step1_batch_001.json"),
        step1.join("JD01_Step1_batch_001.json"),
    )
    .unwrap();

    listener
        .poll_once(&mut |_: &Path| {
            passes += 1;
            Ok(())
        })
        .unwrap();

    assert_eq!(passes, 2);
    assert!(step1
        .join(ARCHIVE_DIR)
        .join("JD01_Step1_batch_001.json")
        .exists());
}
