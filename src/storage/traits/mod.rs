//! Storage backend traits.

mod knowledge;

pub use knowledge::KnowledgeStore;
