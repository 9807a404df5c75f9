//! SQLite schema for the WikiCarto store.
//!
//! `EntreeHistorique` is unique on `qid` so re-insertion of an already
//! accepted entry is a no-op (insert-or-ignore), which keeps crash-restart
//! reprocessing of a batch file idempotent.

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS HistoriqueInsertion (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_backlink TEXT,
    date_insertion TEXT NOT NULL,
    nb_entrees INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS EntreeHistorique (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    qid TEXT UNIQUE,
    titre TEXT NOT NULL,
    lat REAL,
    lon REAL,
    lambert_x REAL,
    lambert_y REAL,
    p31 TEXT,
    summary TEXT,
    description TEXT,
    source_backlink TEXT,
    url TEXT NOT NULL,
    crossReference INTEGER,
    batch_id INTEGER REFERENCES HistoriqueInsertion(id),
    nbLangues INTEGER,
    notoriete INTEGER
);

CREATE TABLE IF NOT EXISTS SourceBacklink (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_backlink TEXT NOT NULL UNIQUE,
    url TEXT,
    couleur TEXT NOT NULL DEFAULT '(0,0,0)',
    visible INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS P31Classification (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    p31 TEXT NOT NULL UNIQUE,
    label TEXT,
    statut TEXT NOT NULL DEFAULT 'non_defini'
);
"#;
