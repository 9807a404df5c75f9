//! Stage 4: textual summary and short description from the REST API.
//!
//! Missing summary or description is tolerated; the entry is written
//! either way.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde_json::Value;

use wikicarto_core::{BatchReader, BatchStage, HistoricalEntry, StageContext, Verdict, WikiClient};

use crate::Endpoints;

pub const STAGE: u32 = 4;
pub const GROUP_SIZE: usize = 20;

pub struct SummaryStage {
    ctx: StageContext,
    client: WikiClient,
    endpoints: Endpoints,
    reader: BatchReader,
    pause: Duration,
}

impl SummaryStage {
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

    fn fetch_summary(&self, title: &str) -> (Option<String>, Option<String>) {
        let url = format!(
            "{}/page/summary/{}",
            self.endpoints.wikipedia_rest,
            urlencoding::encode(&title.replace(' ', "_"))
        );
        match self.client.get_json(&url, &[]) {
            Some(data) => parse_summary_response(&data),
            None => {
                log::warn!("no summary payload for «{title}»");
                (None, None)
            }
        }
    }
}

pub(crate) fn parse_summary_response(data: &Value) -> (Option<String>, Option<String>) {
    let summary = data.get("extract").and_then(Value::as_str).map(String::from);
    let description = data
        .get("description")
        .and_then(Value::as_str)
        .map(String::from);
    (summary, description)
}

impl BatchStage for SummaryStage {
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

    fn process_entry(&mut self, mut entry: HistoricalEntry) -> Result<Verdict> {
        std::thread::sleep(self.pause);
        let (summary, description) = self.fetch_summary(&entry.title);
        if let Some(summary) = summary {
            entry.summary = Some(summary);
        }
        if let Some(description) = description {
            entry.description = Some(description);
        }
        Ok(Verdict::Keep(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summary_and_description_extracted() {
        let data = json!({
            "extract": "Orléans est une commune française...",
            "description": "commune française du Loiret"
        });
        let (summary, description) = parse_summary_response(&data);
        assert!(summary.unwrap().starts_with("Orléans"));
        assert_eq!(description.as_deref(), Some("commune française du Loiret"));
    }

    #[test]
    fn partial_payload_is_tolerated() {
        let (summary, description) = parse_summary_response(&json!({"extract": "texte"}));
        assert!(summary.is_some());
        assert!(description.is_none());

        let (summary, description) = parse_summary_response(&json!({}));
        assert!(summary.is_none());
        assert!(description.is_none());
    }
}
