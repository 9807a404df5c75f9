//! Stage 1: seed discovery through hub-page backlinks.
//!
//! Enumerates every page linking to the primary hub, scores each against
//! the hubs' own outbound links (cross-reference level 0/1/2), and keeps
//! cross-referenced pages only when their article body carries a real link
//! back to the primary hub.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::Result;
use serde_json::Value;

use wikicarto_core::{BatchStage, HistoricalEntry, StageContext, Verdict, WikiClient};

use crate::html;
use crate::sections::SectionRange;
use crate::{Endpoints, HubConfig};

pub const STAGE: u32 = 1;

/// Stage-1 output is high volume; bound the writer so downstream stages
/// can start draining while extraction is still running.
pub const BATCH_SIZE: usize = 200;

/// Page size of the backlinks API.
const BACKLINK_PAGE_LIMIT: usize = 500;

pub struct DiscoverStage {
    ctx: StageContext,
    client: WikiClient,
    endpoints: Endpoints,
    hubs: HubConfig,
    pause: Duration,
    max_entries: Option<usize>,
    checked: usize,
    rejected: usize,
}

impl DiscoverStage {
    pub fn new(
        run_id: &str,
        client: WikiClient,
        endpoints: Endpoints,
        hubs: HubConfig,
        pause: Duration,
        max_entries: Option<usize>,
    ) -> Self {
        Self {
            ctx: StageContext::new(run_id, STAGE),
            client,
            endpoints,
            hubs,
            pause,
            max_entries,
            checked: 0,
            rejected: 0,
        }
    }

    /// All pages linking to `title`, paginated through `blcontinue`.
    fn backlinks(&self, title: &str) -> Vec<(String, String)> {
        let limit = self.max_entries.unwrap_or(usize::MAX);
        let mut pages = Vec::new();
        let mut blcontinue: Option<String> = None;

        loop {
            let page_limit = BACKLINK_PAGE_LIMIT
                .min(limit - pages.len())
                .to_string();
            let mut params = vec![
                ("action", "query"),
                ("list", "backlinks"),
                ("bltitle", title),
                ("format", "json"),
                ("bllimit", page_limit.as_str()),
            ];
            if let Some(cont) = blcontinue.as_deref() {
                params.push(("blcontinue", cont));
            }

            let Some(data) = self.client.get_json(&self.endpoints.wikipedia_api, &params) else {
                break;
            };

            if let Some(links) = data.pointer("/query/backlinks").and_then(Value::as_array) {
                for link in links {
                    if let Some(page_title) = link.get("title").and_then(Value::as_str) {
                        pages.push((
                            page_title.to_string(),
                            self.endpoints.page_url(page_title),
                        ));
                    }
                }
            }

            if pages.len() >= limit {
                pages.truncate(limit);
                break;
            }
            blcontinue = data
                .pointer("/continue/blcontinue")
                .and_then(Value::as_str)
                .map(String::from);
            if blcontinue.is_none() {
                break;
            }
            std::thread::sleep(self.pause);
        }
        pages
    }

    /// Numeric section indices of a page within the configured window.
    fn section_indices(&self, title: &str, range: SectionRange) -> Vec<u32> {
        let Some(data) = self.client.get_json(
            &self.endpoints.wikipedia_api,
            &[
                ("action", "parse"),
                ("page", title),
                ("format", "json"),
                ("prop", "sections"),
            ],
        ) else {
            return Vec::new();
        };

        let Some(sections) = data.pointer("/parse/sections").and_then(Value::as_array) else {
            return Vec::new();
        };
        sections
            .iter()
            .filter_map(|s| s.get("index")?.as_str()?.parse::<u32>().ok())
            .filter(|idx| range.contains(*idx))
            .collect()
    }

    /// Rendered HTML of one section.
    fn section_html(&self, title: &str, index: u32) -> Option<String> {
        let index = index.to_string();
        let data = self.client.get_json(
            &self.endpoints.wikipedia_api,
            &[
                ("action", "parse"),
                ("page", title),
                ("format", "json"),
                ("prop", "text"),
                ("section", index.as_str()),
            ],
        )?;
        data.pointer("/parse/text/*")
            .and_then(Value::as_str)
            .map(String::from)
    }

    /// Titles a hub links out to within its section window.
    fn outbound_titles(&self, title: &str) -> BTreeSet<String> {
        let range = self.hubs.range(title);
        let mut titles = BTreeSet::new();
        for index in self.section_indices(title, range) {
            if let Some(fragment) = self.section_html(title, index) {
                for href in html::wiki_links(&fragment) {
                    let linked = html::link_title(&href);
                    if !linked.is_empty() {
                        titles.insert(linked);
                    }
                }
            }
            std::thread::sleep(self.pause);
        }
        titles
    }

    /// Whether the article body of `title` really links to the primary hub.
    fn article_links_to_hub(&self, title: &str) -> bool {
        let Some(data) = self.client.get_json(
            &self.endpoints.wikipedia_api,
            &[
                ("action", "parse"),
                ("page", title),
                ("format", "json"),
                ("prop", "text"),
            ],
        ) else {
            return false;
        };
        let Some(body) = data.pointer("/parse/text/*").and_then(Value::as_str) else {
            log::warn!("page «{title}» has no rendered content");
            return false;
        };
        html::contains_body_link(body, self.hubs.primary())
    }
}

impl BatchStage for DiscoverStage {
    fn context(&self) -> &StageContext {
        &self.ctx
    }

    fn load_entries(&mut self) -> Result<Vec<HistoricalEntry>> {
        let primary = self.hubs.primary().to_string();

        let backlinks = self.backlinks(&primary);
        log::info!(
            "«{}» is referenced by {} page(s)",
            primary,
            backlinks.len()
        );

        let level2 = self.outbound_titles(&primary);
        let mut level1 = BTreeSet::new();
        let secondaries: Vec<String> = self.hubs.secondaries().map(String::from).collect();
        for hub in &secondaries {
            level1.extend(self.outbound_titles(hub));
        }
        log::info!(
            "{} outbound link(s) collected from {} hub page(s)",
            level2.len() + level1.len(),
            secondaries.len() + 1
        );

        let entries: Vec<HistoricalEntry> = backlinks
            .into_iter()
            .map(|(title, url)| {
                let level = if level2.contains(&title) {
                    2
                } else if level1.contains(&title) {
                    1
                } else {
                    0
                };
                let mut entry = HistoricalEntry::new(title, url);
                entry.source_backlink = Some(primary.clone());
                entry.cross_reference = Some(level);
                entry
            })
            .collect();

        let cross_referenced = entries
            .iter()
            .filter(|e| e.cross_reference.unwrap_or(0) > 0)
            .count();
        log::info!(
            "{cross_referenced} page(s) cross-referenced out of {} backlinks",
            entries.len()
        );
        Ok(entries)
    }

    fn process_entry(&mut self, entry: HistoricalEntry) -> Result<Verdict> {
        if entry.cross_reference.unwrap_or(0) == 0 {
            return Ok(Verdict::Keep(entry));
        }

        self.checked += 1;
        std::thread::sleep(self.pause);
        let linked = self.article_links_to_hub(&entry.title);
        if !linked {
            self.rejected += 1;
            log::warn!(
                "«{}» rejected: no editorial link to {}",
                entry.title,
                self.hubs.primary()
            );
        }
        if self.checked % 10 == 0 {
            log::info!(
                "{} page(s) rejected out of {} checked",
                self.rejected,
                self.checked
            );
        }

        if linked {
            Ok(Verdict::Keep(entry))
        } else {
            Ok(Verdict::Discard(entry))
        }
    }
}
