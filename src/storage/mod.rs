//! Storage layer for the knowledge graph.
//!
//! - **Traits**: the [`KnowledgeStore`] contract every backend implements
//! - **Knowledge**: `SQLite` and in-memory stores
//! - **Sqlite**: connection, schema and row mapping shared by the `SQLite` store

// Allow significant_drop_tightening - dropping database connections slightly early
// provides no meaningful benefit.
#![allow(clippy::significant_drop_tightening)]
// Allow needless_pass_by_value for Copy id types passed to trait methods.
#![allow(clippy::needless_pass_by_value)]

pub mod knowledge;
pub mod sqlite;
pub mod traits;

pub use knowledge::{InMemoryKnowledgeStore, SqliteKnowledgeStore};
pub use traits::KnowledgeStore;
