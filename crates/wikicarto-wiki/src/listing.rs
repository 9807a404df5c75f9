//! Stage 0: diagnostic listing of hub pages and their section tables.
//!
//! Not part of the durable pipeline; used to pick section index ranges for
//! the hub table before launching a run.

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use serde_json::Value;

use wikicarto_core::WikiClient;

use crate::{Endpoints, HubConfig};

/// Section headings that never carry editorial outbound links.
const SKIPPED_HEADINGS: [&str; 5] = [
    "voir aussi",
    "liens externes",
    "bibliographie",
    "notes et références",
    "sources",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionInfo {
    /// Section index as returned by the parse API (may be "T-1" for
    /// transcluded sections, so it stays a string).
    pub index: String,
    pub heading: String,
}

/// Content sections of a page, with boilerplate headings filtered out.
pub fn useful_sections(
    client: &WikiClient,
    endpoints: &Endpoints,
    title: &str,
) -> Vec<SectionInfo> {
    let data = client.get_json(
        &endpoints.wikipedia_api,
        &[
            ("action", "parse"),
            ("page", title),
            ("format", "json"),
            ("prop", "sections"),
        ],
    );
    let Some(data) = data else {
        return Vec::new();
    };
    filter_sections(&data)
}

pub(crate) fn filter_sections(data: &Value) -> Vec<SectionInfo> {
    let Some(sections) = data.pointer("/parse/sections").and_then(Value::as_array) else {
        return Vec::new();
    };

    sections
        .iter()
        .filter_map(|section| {
            let heading = section.get("line")?.as_str()?.trim().to_string();
            let index = match section.get("index")? {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            if SKIPPED_HEADINGS.contains(&heading.to_lowercase().as_str()) {
                None
            } else {
                Some(SectionInfo { index, heading })
            }
        })
        .collect()
}

/// Print one section table per hub page.
pub fn print_hub_sections(client: &WikiClient, endpoints: &Endpoints, hubs: &HubConfig) {
    for title in hubs.titles() {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Index").fg(Color::Cyan),
                Cell::new(format!("Sections de {title}")).fg(Color::Cyan),
            ]);

        for section in useful_sections(client, endpoints, title) {
            table.add_row(vec![section.index, section.heading]);
        }
        eprintln!("\n{table}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_keeps_content_sections_only() {
        let data = json!({"parse": {"sections": [
            {"index": "1", "line": "Biographie"},
            {"index": "2", "line": "Voir aussi"},
            {"index": "3", "line": "Notes et références"},
            {"index": "4", "line": "Procès"},
        ]}});

        let sections = filter_sections(&data);
        assert_eq!(
            sections,
            vec![
                SectionInfo { index: "1".into(), heading: "Biographie".into() },
                SectionInfo { index: "4".into(), heading: "Procès".into() },
            ]
        );
    }

    #[test]
    fn filter_tolerates_missing_envelope() {
        assert!(filter_sections(&json!({})).is_empty());
        assert!(filter_sections(&json!({"parse": {}})).is_empty());
    }
}
