//! WikiCarto Wiki - Stage specializations against Wikipedia and Wikidata
//!
//! Each stage plugs its load/transform logic into the core batch-stage
//! template; this crate owns nothing about coordination, only the
//! domain-specific enrichment each stage performs.

pub mod coords;
pub mod discover;
pub mod html;
pub mod ingest;
pub mod listing;
pub mod qid;
pub mod sections;
pub mod summary;

pub use coords::CoordStage;
pub use discover::DiscoverStage;
pub use ingest::IngestStage;
pub use qid::QidStage;
pub use sections::HubConfig;
pub use summary::SummaryStage;

/// Upstream endpoints used by the stages.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// MediaWiki action API of the source wiki.
    pub wikipedia_api: String,
    /// REST v1 base of the source wiki (page summaries).
    pub wikipedia_rest: String,
    /// Article base used to build entry URLs.
    pub wikipedia_pages: String,
    /// Wikidata action API (wbgetentities).
    pub wikidata_api: String,
    /// Wikidata entity-data base (per-entity JSON dumps).
    pub wikidata_entity_data: String,
    /// Wikidata SPARQL endpoint for the heavier aggregation queries.
    pub wikidata_sparql: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            wikipedia_api: "https://fr.wikipedia.org/w/api.php".to_string(),
            wikipedia_rest: "https://fr.wikipedia.org/api/rest_v1".to_string(),
            wikipedia_pages: "https://fr.wikipedia.org/wiki".to_string(),
            wikidata_api: "https://www.wikidata.org/w/api.php".to_string(),
            wikidata_entity_data: "https://www.wikidata.org/wiki/Special:EntityData".to_string(),
            wikidata_sparql: "https://query.wikidata.org/sparql".to_string(),
        }
    }
}

impl Endpoints {
    /// Canonical article URL for a page title.
    pub fn page_url(&self, title: &str) -> String {
        format!("{}/{}", self.wikipedia_pages, title.replace(' ', "_"))
    }
}
