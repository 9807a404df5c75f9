//! Lookup-table access for the ingestion stage.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::schema::SCHEMA;

/// Connection to the WikiCarto SQLite store, with the lookup-table
/// maintenance used by the ingestion stage.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (and create if absent) the store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::warn!(
                "database {} does not exist yet, it will be created",
                path.display()
            );
        }
        let conn = Connection::open(path)
            .with_context(|| format!("cannot open database {}", path.display()))?;
        conn.execute_batch(SCHEMA)
            .with_context(|| format!("cannot initialize schema in {}", path.display()))?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// All P31 identifiers already classified.
    pub fn known_p31(&self) -> Result<HashSet<String>> {
        let mut stmt = self.conn.prepare("SELECT p31 FROM P31Classification")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut known = HashSet::new();
        for row in rows {
            known.insert(row?);
        }
        Ok(known)
    }

    /// Insert a classification row for a newly seen P31 identifier.
    /// Re-inserting a known identifier is a no-op.
    pub fn insert_p31(&self, p31: &str, label: Option<&str>) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO P31Classification (p31, label, statut)
                 VALUES (?1, ?2, 'non_defini')",
                params![p31, label],
            )
            .with_context(|| format!("cannot insert P31 classification {p31}"))?;
        Ok(())
    }

    /// Ensure a hub page has its `SourceBacklink` row, created with the
    /// default colour and visible flag on first sight.
    pub fn ensure_source_backlink(&self, name: &str, url: &str) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO SourceBacklink (source_backlink, url, couleur, visible)
                 VALUES (?1, ?2, '(0,0,0)', 1)",
                params![name, url],
            )
            .with_context(|| format!("cannot insert source backlink {name}"))?;
        if changed > 0 {
            log::info!("source backlink registered: {name}");
        }
        Ok(())
    }

    /// Review status of a classification, if present. Diagnostic helper.
    pub fn p31_status(&self, p31: &str) -> Result<Option<String>> {
        let status = self
            .conn
            .query_row(
                "SELECT statut FROM P31Classification WHERE p31 = ?1",
                params![p31],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(status)
    }
}
