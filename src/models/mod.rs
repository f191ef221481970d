//! Domain types for the materials knowledge graph.
//!
//! Each tier has three shapes:
//!
//! | Shape | Purpose |
//! |-------|---------|
//! | Entity (`RawMaterial`) | A stored row with id and timestamps |
//! | Draft (`RawMaterialDraft`) | Field values for create, validated before storage |
//! | Patch (`RawMaterialPatch`) | Partial update applied on top of a draft |
//!
//! Composition rows ([`Ingredient`], [`FormulaComponent`]) link the tiers.

use serde::{Deserialize, Deserializer};

/// Copies every `Some` field of a patch onto a draft.
macro_rules! patch_fields {
    ($patch:ident, $draft:ident, { $($field:ident),+ $(,)? }) => {
        $(
            if let Some(value) = $patch.$field {
                $draft.$field = value;
            }
        )+
    };
}

mod bundle;
mod choices;
mod formula;
pub mod graph;
mod ids;
mod intermediate;
mod material;
mod performance;
mod properties;
mod query;
pub(crate) mod validation;

pub use bundle::{
    BundleComponent, BundleIngredient, ComponentKind, FormulaEntry, GraphBundle, ImportSummary,
    IntermediateEntry,
};
pub use choices::{ApplicationType, FormulaStatus, IntermediateType, MaterialType, TestMethod};
pub use formula::{Component, ComponentDraft, Formula, FormulaComponent, FormulaDraft, FormulaPatch};
pub use graph::{
    Category, GraphCounts, GraphEdge, GraphNode, GraphView, MaterialPath, MaterialTrace,
    NodeData, PathSearch, Tier, UsageChain,
};
pub use ids::{
    ComponentId, FormulaId, IngredientId, IntermediateId, PerformanceId, RawMaterialId,
};
pub use intermediate::{
    Ingredient, IngredientDraft, Intermediate, IntermediateDraft, IntermediatePatch,
};
pub use material::{RawMaterial, RawMaterialDraft, RawMaterialPatch};
pub use performance::{Performance, PerformanceDraft, PerformancePatch, RATING_MAX, RATING_MIN};
pub use properties::{PropertyMap, PropertyValue};
pub use query::{
    ComponentEntry, CompositionEntry, FormulaFilter, IngredientEntry, IntermediateFilter,
    PerformanceFilter, PerformanceStatistics, RawMaterialFilter, Recommendation,
    RecommendCriteria,
};

/// Deserializes a present field into `Some(value)`, keeping `Some(None)` for
/// an explicit `null`. Paired with `#[serde(default)]` so an absent field
/// stays `None`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
