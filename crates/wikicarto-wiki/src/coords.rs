//! Stage 3: coordinates, classification and audience from Wikidata.
//!
//! One `wbgetentities` request covers a whole group of QIDs. Entries with
//! no coordinate claim, or geolocated outside the target region, are
//! discarded record by record — one bad entry never takes its group down.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde_json::Value;

use wikicarto_core::{
    BatchReader, BatchStage, HistoricalEntry, StageContext, StageOutput, WikiClient,
};

use crate::Endpoints;

pub const STAGE: u32 = 3;
pub const GROUP_SIZE: usize = 20;

/// Facts extracted from one Wikidata entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityFacts {
    pub lat: f64,
    pub lon: f64,
    pub instance_of: Option<String>,
    pub language_count: u32,
}

pub struct CoordStage {
    ctx: StageContext,
    client: WikiClient,
    endpoints: Endpoints,
    reader: BatchReader,
    pause: Duration,
}

impl CoordStage {
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

    /// Batch entity lookup: claims (P625 coordinates, P31 type) and
    /// sitelinks for the audience count.
    fn entity_facts(&self, qids: &[&str]) -> HashMap<String, EntityFacts> {
        if qids.is_empty() {
            return HashMap::new();
        }
        let ids = qids.join("|");
        let Some(data) = self.client.get_json(
            &self.endpoints.wikidata_api,
            &[
                ("action", "wbgetentities"),
                ("format", "json"),
                ("ids", ids.as_str()),
                ("props", "claims|sitelinks"),
            ],
        ) else {
            log::warn!("entity lookup failed for a group of {} QID(s)", qids.len());
            return HashMap::new();
        };
        parse_entities_response(&data)
    }
}

/// Extract per-entity facts from a `wbgetentities` response. Entities
/// without a coordinate claim are omitted.
pub(crate) fn parse_entities_response(data: &Value) -> HashMap<String, EntityFacts> {
    let mut facts = HashMap::new();
    let Some(entities) = data.get("entities").and_then(Value::as_object) else {
        log::warn!("entity response without an entities envelope");
        return facts;
    };

    for (qid, entity) in entities {
        let coord = entity.pointer("/claims/P625/0/mainsnak/datavalue/value");
        let (Some(lat), Some(lon)) = (
            coord.and_then(|c| c.get("latitude")).and_then(Value::as_f64),
            coord.and_then(|c| c.get("longitude")).and_then(Value::as_f64),
        ) else {
            continue;
        };

        let instance_of = entity
            .pointer("/claims/P31/0/mainsnak/datavalue/value/id")
            .and_then(Value::as_str)
            .map(String::from);
        let language_count = entity
            .get("sitelinks")
            .and_then(Value::as_object)
            .map_or(0, |links| links.len() as u32);

        facts.insert(
            qid.clone(),
            EntityFacts {
                lat,
                lon,
                instance_of,
                language_count,
            },
        );
    }
    facts
}

/// Apply entity facts to a group: out-of-region or fact-less entries are
/// skipped individually, survivors get projection and notoriety derived.
pub fn enrich_group(
    group: Vec<HistoricalEntry>,
    facts: &HashMap<String, EntityFacts>,
    out: &mut StageOutput<'_>,
) -> Result<()> {
    for mut entry in group {
        let known = entry
            .external_id
            .as_deref()
            .and_then(|qid| facts.get(qid))
            .cloned();
        let Some(info) = known else {
            log::warn!("no geodata for «{}», skipped", entry.title);
            out.discard(entry);
            continue;
        };

        entry.lat = Some(info.lat);
        entry.lon = Some(info.lon);
        entry.instance_of = info.instance_of;
        entry.language_count = Some(info.language_count);

        if !entry.in_target_region() {
            log::warn!("«{}» is geolocated out of region, skipped", entry.title);
            out.discard(entry);
            continue;
        }

        entry.project_coordinates();
        entry.compute_notoriety();
        out.keep(entry)?;
    }
    Ok(())
}

impl BatchStage for CoordStage {
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
        let qids: Vec<&str> = group
            .iter()
            .filter_map(|e| e.external_id.as_deref())
            .collect();
        std::thread::sleep(self.pause);
        let facts = self.entity_facts(&qids);
        enrich_group(group, &facts, out)
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

    fn entry_with_qid(title: &str, qid: &str) -> HistoricalEntry {
        let mut entry = HistoricalEntry::new(title, format!("https://x/{title}"));
        entry.external_id = Some(qid.to_string());
        entry
    }

    fn facts(lat: f64, lon: f64, language_count: u32) -> EntityFacts {
        EntityFacts {
            lat,
            lon,
            instance_of: Some("Q16970".into()),
            language_count,
        }
    }

    #[test]
    fn parse_entities_extracts_coordinates_type_and_sitelinks() {
        let data = json!({"entities": {
            "Q6548": {
                "claims": {
                    "P625": [{"mainsnak": {"datavalue": {"value":
                        {"latitude": 47.9, "longitude": 1.9}}}}],
                    "P31": [{"mainsnak": {"datavalue": {"value": {"id": "Q484170"}}}}]
                },
                "sitelinks": {"frwiki": {}, "enwiki": {}, "dewiki": {}}
            },
            "Q999": {"claims": {}, "sitelinks": {}}
        }});

        let facts = parse_entities_response(&data);
        assert_eq!(facts.len(), 1);
        let f = &facts["Q6548"];
        assert_eq!(f.lat, 47.9);
        assert_eq!(f.instance_of.as_deref(), Some("Q484170"));
        assert_eq!(f.language_count, 3);
    }

    #[test]
    fn in_region_entry_is_enriched_and_written() {
        // lat 48, lon 2, 40 sitelinks: notoriety 8, projected coordinates set
        let group = vec![entry_with_qid("Orléans", "Q6548")];
        let facts: HashMap<String, EntityFacts> =
            [("Q6548".to_string(), facts(48.0, 2.0, 40))].into();

        let mut writer = CollectWriter(Vec::new());
        let mut out = StageOutput::new(&mut writer);
        enrich_group(group, &facts, &mut out).unwrap();
        assert_eq!(out.written(), 1);
        assert!(out.discarded().is_empty());
        drop(out);

        let written = &writer.0[0];
        assert_eq!(written.notoriety, Some(8));
        assert!(written.projected_x.is_some() && written.projected_y.is_some());
        assert_eq!(written.language_count, Some(40));
        assert_eq!(written.instance_of.as_deref(), Some("Q16970"));
    }

    #[test]
    fn out_of_region_entry_does_not_discard_the_rest_of_its_group() {
        let group = vec![
            entry_with_qid("New York", "Q60"),
            entry_with_qid("Orléans", "Q6548"),
            entry_with_qid("Chinon", "Q212420"),
        ];
        let facts: HashMap<String, EntityFacts> = [
            ("Q60".to_string(), facts(40.7, -74.0, 200)),
            ("Q6548".to_string(), facts(47.9, 1.9, 40)),
            ("Q212420".to_string(), facts(47.16, 0.24, 20)),
        ]
        .into();

        let mut writer = CollectWriter(Vec::new());
        let mut out = StageOutput::new(&mut writer);
        enrich_group(group, &facts, &mut out).unwrap();

        assert_eq!(out.written(), 2);
        assert_eq!(out.discarded().len(), 1);
        assert_eq!(out.discarded()[0].title, "New York");
        drop(out);
        let titles: Vec<&str> = writer.0.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Orléans", "Chinon"]);
    }

    #[test]
    fn entry_without_facts_is_skipped() {
        let group = vec![
            entry_with_qid("Sans géodonnées", "Q1"),
            entry_with_qid("Orléans", "Q6548"),
        ];
        let facts: HashMap<String, EntityFacts> =
            [("Q6548".to_string(), facts(47.9, 1.9, 10))].into();

        let mut writer = CollectWriter(Vec::new());
        let mut out = StageOutput::new(&mut writer);
        enrich_group(group, &facts, &mut out).unwrap();
        assert_eq!(out.written(), 1);
        assert_eq!(out.discarded().len(), 1);
    }

    #[test]
    fn entry_without_qid_is_skipped() {
        let group = vec![HistoricalEntry::new("Sans QID", "https://x")];
        let facts = HashMap::new();

        let mut writer = CollectWriter(Vec::new());
        let mut out = StageOutput::new(&mut writer);
        enrich_group(group, &facts, &mut out).unwrap();
        assert_eq!(out.written(), 0);
        assert_eq!(out.discarded().len(), 1);
    }
}
