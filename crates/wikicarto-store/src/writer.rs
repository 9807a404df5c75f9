//! Relational writer: immediate insert-or-ignore with run provenance.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection};

use wikicarto_core::{EntryWriter, HistoricalEntry};

use crate::schema::SCHEMA;

/// Writer that persists accepted entries into the SQLite store.
///
/// The connection opens lazily on first use. The first `add` creates the
/// run's `HistoriqueInsertion` provenance row and caches its id; every
/// `add` performs an insert-or-ignore keyed on `qid`. `flush` updates the
/// provenance entry count and closes the connection; `needs_flush` is
/// always true so the stage template runs that finalization exactly once.
pub struct SqliteWriter {
    db_path: PathBuf,
    conn: Option<Connection>,
    batch_id: Option<i64>,
    inserts: usize,
}

impl SqliteWriter {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            conn: None,
            batch_id: None,
            inserts: 0,
        }
    }

    fn open_if_needed(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        if !self.db_path.exists() {
            log::warn!(
                "database {} does not exist yet, it will be created",
                self.db_path.display()
            );
        }
        let conn = Connection::open(&self.db_path)
            .with_context(|| format!("cannot open database {}", self.db_path.display()))?;
        conn.execute_batch(SCHEMA)
            .with_context(|| format!("cannot initialize schema in {}", self.db_path.display()))?;
        self.conn = Some(conn);
        Ok(())
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| anyhow!("sqlite connection not open"))
    }
}

impl EntryWriter for SqliteWriter {
    fn add(&mut self, entry: HistoricalEntry) -> Result<()> {
        self.open_if_needed()?;

        if self.batch_id.is_none() {
            let id = {
                let conn = self.conn()?;
                conn.execute(
                    "INSERT INTO HistoriqueInsertion (source_backlink, date_insertion)
                     VALUES (?1, ?2)",
                    params![
                        entry.source_backlink,
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
                    ],
                )
                .context("cannot create provenance row")?;
                conn.last_insert_rowid()
            };
            self.batch_id = Some(id);
        }

        let batch_id = self.batch_id;
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO EntreeHistorique (
                qid, titre, lat, lon, lambert_x, lambert_y, p31, summary,
                description, source_backlink, url, crossReference, batch_id,
                nbLangues, notoriete
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                entry.external_id,
                entry.title,
                entry.lat,
                entry.lon,
                entry.projected_x,
                entry.projected_y,
                entry.instance_of,
                entry.summary,
                entry.description,
                entry.source_backlink,
                entry.url,
                entry.cross_reference,
                batch_id,
                entry.language_count,
                entry.notoriety,
            ],
        )
        .with_context(|| format!("cannot insert entry «{}»", entry.title))?;

        self.inserts += 1;
        Ok(())
    }

    fn needs_flush(&self) -> bool {
        true
    }

    fn flush(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };

        if let Some(batch_id) = self.batch_id {
            if let Err(e) = conn.execute(
                "UPDATE HistoriqueInsertion SET nb_entrees = ?1 WHERE id = ?2",
                params![self.inserts as i64, batch_id],
            ) {
                log::error!("cannot finalize provenance row {batch_id}: {e}");
            }
        }

        match conn.close() {
            Ok(()) => log::info!("{} entries inserted, store closed", self.inserts),
            Err((_, e)) => log::error!("cannot close store: {e}"),
        }
        Ok(())
    }
}
