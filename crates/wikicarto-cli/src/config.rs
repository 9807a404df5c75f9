//! Configuration loading from TOML files

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global configuration for wikicarto
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub database: DatabaseConfig,
    pub wikipedia: WikipediaConfig,
    pub wikidata: WikidataConfig,
    pub http: HttpConfig,
    pub listener: ListenerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Root of the per-stage queue directories.
    pub root: PathBuf,
    /// Directory holding the per-run hub tables (`{runId}.csv`).
    pub input: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            input: PathBuf::from("input"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("WikiCarto.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WikipediaConfig {
    pub api_url: String,
    pub rest_url: String,
    pub pages_url: String,
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            api_url: "https://fr.wikipedia.org/w/api.php".to_string(),
            rest_url: "https://fr.wikipedia.org/api/rest_v1".to_string(),
            pages_url: "https://fr.wikipedia.org/wiki".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WikidataConfig {
    pub api_url: String,
    pub entity_data_url: String,
    pub sparql_url: String,
}

impl Default for WikidataConfig {
    fn default() -> Self {
        Self {
            api_url: "https://www.wikidata.org/w/api.php".to_string(),
            entity_data_url: "https://www.wikidata.org/wiki/Special:EntityData".to_string(),
            sparql_url: "https://query.wikidata.org/sparql".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Latency in seconds above which a call is logged as slow.
    pub slow_call_secs: f64,
    /// Retry slots for SPARQL calls.
    pub sparql_max_retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            slow_call_secs: 1.0,
            sparql_max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Seconds between directory polls.
    pub poll_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self { poll_secs: 5 }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./wikicarto.toml (current directory)
    /// 2. ~/.config/wikicarto/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("wikicarto.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "wikicarto") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.data.root, PathBuf::from("data"));
        assert_eq!(config.database.path, PathBuf::from("WikiCarto.db"));
        assert_eq!(config.http.timeout_secs, 10);
        assert_eq!(config.listener.poll_secs, 5);
        assert!(config.wikipedia.api_url.starts_with("https://"));
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[data]
root = "/srv/wikicarto/data"

[database]
path = "/srv/wikicarto/WikiCarto.db"

[http]
timeout_secs = 20
sparql_max_retries = 5

[listener]
poll_secs = 2
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.data.root, PathBuf::from("/srv/wikicarto/data"));
        assert_eq!(config.data.input, PathBuf::from("input"));
        assert_eq!(config.http.timeout_secs, 20);
        assert_eq!(config.http.sparql_max_retries, 5);
        assert_eq!(config.listener.poll_secs, 2);
    }

    #[test]
    fn from_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wikicarto.toml");
        std::fs::write(&path, "[database]\npath = \"test.db\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.database.path, PathBuf::from("test.db"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::from_file(&dir.path().join("nope.toml")).is_err());
    }
}
