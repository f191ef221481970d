//! Knowledge store implementations.
//!
//! | Store | Persistence | Use |
//! |-------|-------------|-----|
//! | [`SqliteKnowledgeStore`] | File or in-memory `SQLite` | CLI and HTTP server |
//! | [`InMemoryKnowledgeStore`] | None | Tests and demos |

mod memory;
mod sqlite;
mod writer;

pub use memory::InMemoryKnowledgeStore;
pub use sqlite::SqliteKnowledgeStore;
pub use writer::{GraphWriter, write_bundle};
