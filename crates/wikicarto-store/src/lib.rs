//! WikiCarto Store - SQLite persistence for accepted pipeline entries
//!
//! Provides the relational schema, the [`SqliteWriter`] implementation of
//! the core writer contract, and the lookup-table helpers used by the
//! ingestion stage.

pub mod schema;
pub mod store;
pub mod writer;

pub use schema::SCHEMA;
pub use store::Store;
pub use writer::SqliteWriter;
