//! Stage 2: resolve Wikidata QIDs from page titles.
//!
//! One `prop=pageprops` request covers a whole group of titles; entries
//! whose title resolves to no QID are unusable downstream and go to the
//! discard list.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde_json::Value;

use wikicarto_core::{
    BatchReader, BatchStage, HistoricalEntry, StageContext, StageOutput, WikiClient,
};

use crate::Endpoints;

pub const STAGE: u32 = 2;
pub const GROUP_SIZE: usize = 20;

pub struct QidStage {
    ctx: StageContext,
    client: WikiClient,
    endpoints: Endpoints,
    reader: BatchReader,
    pause: Duration,
}

impl QidStage {
    pub fn new(
        run_id: &str,
        input: &Path,
        client: WikiClient,
        endpoints: Endpoints,
        pause: Duration,
    ) -> Self {
        Self {
            ctx: StageContext::new(run_id, STAGE).with_group_size(GROUP_SIZE),
            client,
            endpoints,
            reader: BatchReader::new(input),
            pause,
        }
    }

    /// Batch title → QID lookup via the pageprops API.
    fn resolve_qids(&self, titles: &[&str]) -> HashMap<String, String> {
        if titles.is_empty() {
            return HashMap::new();
        }
        let joined = titles.join("|");
        let Some(data) = self.client.get_json(
            &self.endpoints.wikipedia_api,
            &[
                ("action", "query"),
                ("prop", "pageprops"),
                ("format", "json"),
                ("titles", joined.as_str()),
            ],
        ) else {
            log::warn!("QID lookup failed for a group of {} title(s)", titles.len());
            return HashMap::new();
        };
        parse_qid_response(&data)
    }
}

/// Extract `{title: qid}` from a pageprops response.
pub(crate) fn parse_qid_response(data: &Value) -> HashMap<String, String> {
    let mut resolved = HashMap::new();
    let Some(pages) = data.pointer("/query/pages").and_then(Value::as_object) else {
        return resolved;
    };
    for page in pages.values() {
        let title = page.get("title").and_then(Value::as_str);
        let qid = page
            .pointer("/pageprops/wikibase_item")
            .and_then(Value::as_str);
        if let (Some(title), Some(qid)) = (title, qid) {
            resolved.insert(title.to_string(), qid.to_string());
        }
    }
    resolved
}

/// Stamp resolved QIDs onto a group; unresolved entries are discarded.
pub fn assign_qids(
    group: Vec<HistoricalEntry>,
    resolved: &HashMap<String, String>,
    out: &mut StageOutput<'_>,
) -> Result<()> {
    for mut entry in group {
        match resolved.get(&entry.title) {
            Some(qid) => {
                entry.external_id = Some(qid.clone());
                out.keep(entry)?;
            }
            None => {
                log::warn!("no QID resolved for «{}»", entry.title);
                out.discard(entry);
            }
        }
    }
    Ok(())
}

impl BatchStage for QidStage {
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
        Ok(entries)
    }

    fn process_group(
        &mut self,
        group: Vec<HistoricalEntry>,
        out: &mut StageOutput<'_>,
    ) -> Result<()> {
        let titles: Vec<&str> = group.iter().map(|e| e.title.as_str()).collect();
        std::thread::sleep(self.pause);
        let resolved = self.resolve_qids(&titles);
        assign_qids(group, &resolved, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wikicarto_core::EntryWriter;

    struct CollectWriter(Vec<HistoricalEntry>);

    impl EntryWriter for CollectWriter {
        fn add(&mut self, entry: HistoricalEntry) -> Result<()> {
            self.0.push(entry);
            Ok(())
        }
        fn needs_flush(&self) -> bool {
            false
        }
        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn parse_qid_response_maps_titles() {
        let data = json!({"query": {"pages": {
            "123": {"title": "Orléans", "pageprops": {"wikibase_item": "Q6548"}},
            "456": {"title": "Page obscure"},
            "-1": {"title": "Page absente", "missing": ""},
        }}});

        let resolved = parse_qid_response(&data);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved["Orléans"], "Q6548");
    }

    #[test]
    fn parse_qid_response_tolerates_empty_envelope() {
        assert!(parse_qid_response(&json!({})).is_empty());
    }

    #[test]
    fn unresolved_entries_are_discarded_resolved_are_written() {
        // 3 entries, one unresolved: 2 written, 1 discarded
        let group = vec![
            HistoricalEntry::new("Orléans", "https://x/1"),
            HistoricalEntry::new("Page obscure", "https://x/2"),
            HistoricalEntry::new("Chinon", "https://x/3"),
        ];
        let resolved: HashMap<String, String> = [
            ("Orléans".to_string(), "Q6548".to_string()),
            ("Chinon".to_string(), "Q212420".to_string()),
        ]
        .into();

        let mut writer = CollectWriter(Vec::new());
        let mut out = StageOutput::new(&mut writer);
        assign_qids(group, &resolved, &mut out).unwrap();

        assert_eq!(out.written(), 2);
        assert_eq!(out.discarded().len(), 1);
        assert_eq!(out.discarded()[0].title, "Page obscure");
        drop(out);
        assert!(writer.0.iter().all(|e| e.external_id.is_some()));
    }
}
