//! Stage 5: persist accepted entries into the SQLite store.
//!
//! The stage itself performs no record transformation; it maintains the
//! lookup tables (`SourceBacklink`, `P31Classification`) around the
//! relational writer's insert-or-ignore.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use serde_json::Value;

use wikicarto_core::{BatchReader, BatchStage, HistoricalEntry, StageContext, Verdict, WikiClient};
use wikicarto_store::Store;

use crate::Endpoints;

pub const STAGE: u32 = 5;

pub struct IngestStage {
    ctx: StageContext,
    client: WikiClient,
    endpoints: Endpoints,
    reader: BatchReader,
    store: Store,
    known_p31: HashSet<String>,
}

impl IngestStage {
    pub fn new(
        run_id: &str,
        input: &Path,
        db_path: &Path,
        client: WikiClient,
        endpoints: Endpoints,
    ) -> Result<Self> {
        Ok(Self {
            ctx: StageContext::new(run_id, STAGE),
            client,
            endpoints,
            reader: BatchReader::new(input),
            store: Store::open(db_path)?,
            known_p31: HashSet::new(),
        })
    }

    /// French label of a Wikidata entity, from its entity-data dump.
    fn fetch_label(&self, qid: &str) -> Option<String> {
        let url = format!("{}/{qid}.json", self.endpoints.wikidata_entity_data);
        let data = self.client.get_json(&url, &[])?;
        let label = data
            .pointer(&format!("/entities/{qid}/labels/fr/value"))
            .and_then(Value::as_str)
            .map(String::from);
        if label.is_none() {
            log::warn!("no French label for {qid}");
        }
        label
    }
}

impl BatchStage for IngestStage {
    fn context(&self) -> &StageContext {
        &self.ctx
    }

    fn load_entries(&mut self) -> Result<Vec<HistoricalEntry>> {
        let entries = self.reader.load()?;
        log::info!(
            "{} entries loaded from {}",
            entries.len(),
            self.reader.path().display()
        );

        self.known_p31 = self.store.known_p31()?;
        let fresh = entries
            .iter()
            .filter_map(|e| e.instance_of.as_deref())
            .filter(|p31| !self.known_p31.contains(*p31))
            .collect::<HashSet<_>>()
            .len();
        log::info!("{fresh} new P31 classification(s) to register");

        Ok(entries)
    }

    fn process_entry(&mut self, entry: HistoricalEntry) -> Result<Verdict> {
        if let Some(hub) = &entry.source_backlink {
            self.store.ensure_source_backlink(hub, &entry.url)?;
        }

        match entry.instance_of.as_deref() {
            Some(p31) if p31.starts_with('Q') => {
                if !self.known_p31.contains(p31) {
                    let label = self.fetch_label(p31);
                    self.store.insert_p31(p31, label.as_deref())?;
                    self.known_p31.insert(p31.to_string());
                }
            }
            other => {
                // the entry is still inserted, only the classification is skipped
                log::warn!(
                    "missing or invalid P31 for {}: {:?}",
                    entry.external_id.as_deref().unwrap_or("?"),
                    other
                );
            }
        }

        Ok(Verdict::Keep(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wikicarto_core::run_stage;
    use wikicarto_store::SqliteWriter;

    fn write_stage4_file(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("JD01_Step4_batch_001.json");
        let mut f = std::fs::File::create(&path).unwrap();
        let mut cluny = HistoricalEntry::new(
            "Abbaye de Cluny",
            "https://fr.wikipedia.org/wiki/Abbaye_de_Cluny",
        );
        cluny.external_id = Some("Q1423290".into());
        cluny.source_backlink = Some("Ordre de Cluny".into());
        cluny.instance_of = Some("Q160742".into());
        cluny.lat = Some(46.43);
        cluny.lon = Some(4.66);
        cluny.language_count = Some(35);
        cluny.project_coordinates();
        cluny.compute_notoriety();
        writeln!(f, "{}", serde_json::to_string(&cluny).unwrap()).unwrap();

        let mut no_p31 = HistoricalEntry::new("Sans type", "https://x");
        no_p31.external_id = Some("Q777".into());
        no_p31.source_backlink = Some("Ordre de Cluny".into());
        writeln!(f, "{}", serde_json::to_string(&no_p31).unwrap()).unwrap();
        path
    }

    /// Full stage-5 run against a temp database. The P31 label fetch hits
    /// no network because the classification is pre-registered.
    #[test]
    fn ingest_run_inserts_entries_and_lookup_rows() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_stage4_file(dir.path());
        let db = dir.path().join("WikiCarto.db");

        {
            let store = Store::open(&db).unwrap();
            store.insert_p31("Q160742", Some("abbaye")).unwrap();
        }

        let mut stage = IngestStage::new(
            "JD01",
            &input,
            &db,
            WikiClient::default(),
            Endpoints::default(),
        )
        .unwrap();
        let mut writer = SqliteWriter::new(&db);
        let report = run_stage(&mut stage, &mut writer).unwrap();

        assert_eq!(report.loaded, 2);
        assert_eq!(report.written, 2);
        assert!(report.discarded.is_empty());

        let store = Store::open(&db).unwrap();
        let entries: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM EntreeHistorique", [], |r| r.get(0))
            .unwrap();
        assert_eq!(entries, 2);

        let hubs: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM SourceBacklink", [], |r| r.get(0))
            .unwrap();
        assert_eq!(hubs, 1);

        assert_eq!(store.known_p31().unwrap().len(), 1);
    }

    /// Re-running the stage over the same batch file (crash-restart before
    /// archiving) must not duplicate rows.
    #[test]
    fn ingest_rerun_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_stage4_file(dir.path());
        let db = dir.path().join("WikiCarto.db");

        {
            let store = Store::open(&db).unwrap();
            store.insert_p31("Q160742", Some("abbaye")).unwrap();
        }

        for _ in 0..2 {
            let mut stage = IngestStage::new(
                "JD01",
                &input,
                &db,
                WikiClient::default(),
                Endpoints::default(),
            )
            .unwrap();
            let mut writer = SqliteWriter::new(&db);
            run_stage(&mut stage, &mut writer).unwrap();
        }

        let store = Store::open(&db).unwrap();
        let entries: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM EntreeHistorique", [], |r| r.get(0))
            .unwrap();
        assert_eq!(entries, 2);
        let hubs: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM SourceBacklink", [], |r| r.get(0))
            .unwrap();
        assert_eq!(hubs, 1);
    }
}
