//! Per-run hub configuration: page titles and optional section ranges.
//!
//! Loaded from `input/{runId}.csv` with columns `titre,index_min,index_max`.
//! The first row is the primary hub whose backlinks seed discovery; the
//! remaining rows are secondary hubs contributing level-1 cross-references.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Inclusive section-index window restricting outbound-link extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectionRange {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

impl SectionRange {
    pub fn contains(&self, index: u32) -> bool {
        self.min.is_none_or(|min| index >= min) && self.max.is_none_or(|max| index <= max)
    }
}

#[derive(Debug, Deserialize)]
struct HubRow {
    titre: String,
    #[serde(default)]
    index_min: Option<String>,
    #[serde(default)]
    index_max: Option<String>,
}

fn parse_bound(raw: &Option<String>) -> Option<u32> {
    raw.as_deref().and_then(|s| s.trim().parse().ok())
}

/// Ordered hub table for one run.
#[derive(Debug, Clone)]
pub struct HubConfig {
    hubs: Vec<(String, SectionRange)>,
}

impl HubConfig {
    pub fn from_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("cannot read hub table {}", path.display()))?;

        let mut hubs = Vec::new();
        for row in reader.deserialize() {
            let row: HubRow =
                row.with_context(|| format!("malformed hub table {}", path.display()))?;
            let title = urlencoding::decode(row.titre.trim())
                .map(|t| t.into_owned())
                .unwrap_or_else(|_| row.titre.trim().to_string());
            hubs.push((
                title,
                SectionRange {
                    min: parse_bound(&row.index_min),
                    max: parse_bound(&row.index_max),
                },
            ));
        }

        if hubs.is_empty() {
            bail!("hub table {} is empty or invalid", path.display());
        }
        Ok(Self { hubs })
    }

    #[cfg(test)]
    pub(crate) fn from_hubs(hubs: Vec<(String, SectionRange)>) -> Self {
        Self { hubs }
    }

    /// The hub whose backlinks seed the run.
    pub fn primary(&self) -> &str {
        &self.hubs[0].0
    }

    /// Secondary hubs contributing level-1 cross-references.
    pub fn secondaries(&self) -> impl Iterator<Item = &str> {
        self.hubs.iter().skip(1).map(|(title, _)| title.as_str())
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.hubs.iter().map(|(title, _)| title.as_str())
    }

    /// Section window configured for a hub; unrestricted when unknown.
    pub fn range(&self, title: &str) -> SectionRange {
        self.hubs
            .iter()
            .find(|(t, _)| t == title)
            .map(|(_, range)| *range)
            .unwrap_or_default()
    }
}
