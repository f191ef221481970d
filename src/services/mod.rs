//! Business logic services.
//!
//! Services orchestrate a [`KnowledgeStore`](crate::storage::KnowledgeStore)
//! and provide high-level operations. Each holds an `Arc` to the store, so
//! any number of services can share one store.

mod bundle;
mod catalog;
mod graph;
mod recommend;

pub use bundle::{BundleFormat, BundleService};
pub use catalog::CatalogService;
pub use graph::GraphQueryService;
pub use recommend::RecommendationService;
