//! # Matgraph
//!
//! A materials knowledge graph for formulation work.
//!
//! Matgraph records how raw materials are combined into intermediates, how
//! intermediates and raw materials are combined into formulas, and how each
//! formula performed in lab tests. The resulting four-tier graph can be
//! walked in both directions:
//!
//! ```text
//! RawMaterial ──▶ Intermediate ──▶ Formula ──▶ Performance
//!      └──────────────────────────────▲
//! ```
//!
//! ## Features
//!
//! - Point CRUD for every tier with field validation
//! - Weighted, ordered composition links
//! - Forward (usage chain) and reverse (material trace) traversal
//! - Visualization payloads and raw-material-to-performance path enumeration
//! - Threshold-based formula recommendation and performance statistics
//! - Atomic bundle import/export in JSON or YAML
//! - `SQLite` and in-memory storage backends behind one trait
//! - REST API (feature `http`) and CLI
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use matgraph::{CatalogService, GraphQueryService, SqliteKnowledgeStore};
//!
//! let store = Arc::new(SqliteKnowledgeStore::new("matgraph.db")?);
//! let catalog = CatalogService::new(Arc::clone(&store));
//! let graph = GraphQueryService::new(store);
//!
//! let chain = graph.usage_chain(raw_material_id)?;
//! println!("{} formulas use it", chain.formulas.len());
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
#[cfg(feature = "http")]
pub mod http;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::MatgraphConfig;
pub use models::{
    Formula, FormulaId, Intermediate, IntermediateId, Performance, PerformanceId, RawMaterial,
    RawMaterialId,
};
pub use services::{BundleService, CatalogService, GraphQueryService, RecommendationService};
pub use storage::{InMemoryKnowledgeStore, KnowledgeStore, SqliteKnowledgeStore};

/// Error type for matgraph operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When | HTTP |
/// |---------|-------------|------|
/// | `InvalidInput` | Malformed request bodies, unknown enum values, bad bundle files | 400 |
/// | `Validation` | A single field fails validation (empty code, bad CAS number) | 400 |
/// | `NotFound` | An id or code does not resolve to a stored entity | 404 |
/// | `Conflict` | Duplicate `code`, duplicate ingredient pair | 400 |
/// | `OperationFailed` | `SQLite` or filesystem failures | 500 |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A single field failed validation.
    #[error("invalid {field}: {reason}")]
    Validation {
        /// Name of the offending field.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The referenced entity does not exist.
    ///
    /// Raised when:
    /// - A get, update or delete targets an unknown id
    /// - A composition link names a missing parent or child
    /// - A bundle references a code that is neither in the bundle nor the store
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind (`raw_material`, `formula`, ...).
        kind: &'static str,
        /// The id or code that was looked up.
        id: String,
    },

    /// A uniqueness constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` database operations fail
    /// - Filesystem I/O errors occur
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Builds a [`Error::NotFound`] for the given entity kind and key.
    pub fn not_found(kind: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Builds a [`Error::Validation`] for a field.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for matgraph operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Current time truncated to whole seconds, the resolution rows are stored at.
#[must_use]
pub fn current_timestamp() -> chrono::DateTime<chrono::Utc> {
    let now = chrono::Utc::now();
    chrono::DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("test error".to_string());
        assert_eq!(err.to_string(), "invalid input: test error");

        let err = Error::OperationFailed {
            operation: "test".to_string(),
            cause: "failed".to_string(),
        };
        assert_eq!(err.to_string(), "operation 'test' failed: failed");

        let err = Error::not_found("formula", 42);
        assert_eq!(err.to_string(), "formula not found: 42");

        let err = Error::validation("code", "must not be empty");
        assert_eq!(err.to_string(), "invalid code: must not be empty");

        let err = Error::Conflict("code RM-001 already exists".to_string());
        assert_eq!(err.to_string(), "conflict: code RM-001 already exists");
    }
}
