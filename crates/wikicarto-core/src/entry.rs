//! Domain records carried through every pipeline stage.
//!
//! Entries are serialized sparsely (absent fields omitted) so that batch
//! files stay readable and downstream stages tolerate partially enriched
//! records.

use serde::{Deserialize, Serialize};

use crate::lambert;

/// Inclusive latitude bounds of the target region.
pub const REGION_LAT: (f64, f64) = (40.0, 51.0);
/// Inclusive longitude bounds of the target region.
pub const REGION_LON: (f64, f64) = (-6.0, 11.0);

/// Provenance tag stamped on a record each time it enters a stage.
///
/// The tag is replaced wholesale at stage entry, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessTag {
    #[serde(default)]
    pub run_id: String,
    #[serde(default)]
    pub stage: u32,
    /// Reserved for a per-record retry policy; currently never incremented.
    #[serde(skip)]
    pub retry: u32,
}

impl ProcessTag {
    pub fn new(run_id: &str, stage: u32) -> Self {
        Self {
            run_id: run_id.to_string(),
            stage,
            retry: 0,
        }
    }
}

impl Default for ProcessTag {
    fn default() -> Self {
        Self::new("", 0)
    }
}

/// One candidate historical/geographic subject derived from a Wikipedia page.
///
/// Created at stage 1, enriched in place by stages 2-4, consumed by stage 5.
/// `title` and `url` are always present; everything else fills in as the
/// entry moves down the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalEntry {
    pub title: String,
    pub url: String,
    /// Wikidata QID, resolved at stage 2.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Hub page this entry was discovered from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_backlink: Option<String>,
    /// Cross-reference level 0/1/2, assigned at stage 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_reference: Option<u8>,
    #[serde(default)]
    pub tag: ProcessTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Wikidata P31 (instance-of) claim, resolved at stage 3.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_of: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projected_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projected_y: Option<f64>,
    /// Cross-wiki sitelink count, a coarse audience signal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notoriety: Option<u8>,
}

impl HistoricalEntry {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            external_id: None,
            source_backlink: None,
            cross_reference: None,
            tag: ProcessTag::default(),
            summary: None,
            description: None,
            instance_of: None,
            lat: None,
            lon: None,
            projected_x: None,
            projected_y: None,
            language_count: None,
            notoriety: None,
        }
    }

    /// Derive projected planar coordinates from `lat`/`lon`.
    ///
    /// Sets both projected fields or neither; no-op when either geographic
    /// coordinate is absent.
    pub fn project_coordinates(&mut self) {
        if let (Some(lat), Some(lon)) = (self.lat, self.lon) {
            let (x, y) = lambert::project(lat, lon);
            self.projected_x = Some(x);
            self.projected_y = Some(y);
        }
    }

    /// Map the sitelink count onto the 1/3/5/8/10 notoriety scale.
    pub fn compute_notoriety(&mut self) {
        self.notoriety = match self.language_count {
            None => None,
            Some(n) if n >= 50 => Some(10),
            Some(n) if n >= 30 => Some(8),
            Some(n) if n >= 15 => Some(5),
            Some(n) if n >= 5 => Some(3),
            Some(_) => Some(1),
        };
    }

    /// Whether the entry is geolocated inside the target region.
    ///
    /// False (not an error) when either coordinate is absent.
    pub fn in_target_region(&self) -> bool {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => {
                (REGION_LAT.0..=REGION_LAT.1).contains(&lat)
                    && (REGION_LON.0..=REGION_LON.1).contains(&lon)
            }
            _ => false,
        }
    }
}
