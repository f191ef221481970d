//! Knowledge store trait for the four-tier materials graph.
//!
//! # Available Implementations
//!
//! | Backend | Use Case | Notes |
//! |---------|----------|-------|
//! | `SqliteKnowledgeStore` | Default; embedded | Foreign keys enforce cascades and uniqueness |
//! | `InMemoryKnowledgeStore` | Testing | Cascades enforced in code |
//!
//! # Error Modes and Guarantees
//!
//! All backends return `Result<T>` with errors propagated via [`crate::Error`].
//!
//! | Condition | Error |
//! |-----------|-------|
//! | Duplicate `code` in a tier | [`Error::Conflict`](crate::Error::Conflict) |
//! | Duplicate `(intermediate, raw_material)` ingredient | [`Error::Conflict`](crate::Error::Conflict) |
//! | Link to a missing row | [`Error::NotFound`](crate::Error::NotFound) |
//! | Backend failure | [`Error::OperationFailed`](crate::Error::OperationFailed) |
//!
//! Point lookups return `Ok(None)` for unknown ids; deciding whether that is
//! an error is left to the service layer. Updates and deletes report whether
//! a row was touched.
//!
//! ## Ordering
//!
//! | Operation | Order |
//! |-----------|-------|
//! | `list_*` | id ascending |
//! | `ingredients_of`, `components_of` | `addition_order`, then id |
//! | `all_ingredients`, `ingredients_using` | intermediate id, then row id |
//! | `all_components`, `components_using` | formula id, then row id |
//! | `performances_for` | id ascending |
//!
//! ## Cascades
//!
//! | Deleted | Also removed |
//! |---------|--------------|
//! | Raw material | Its ingredient rows and direct formula components |
//! | Intermediate | Its ingredient rows and formula components referencing it |
//! | Formula | Its components and performance records |

use crate::Result;
use crate::models::{
    Component, ComponentDraft, ComponentId, Formula, FormulaComponent, FormulaDraft,
    FormulaFilter, FormulaId, GraphBundle, GraphCounts, ImportSummary, Ingredient,
    IngredientDraft, IngredientId, Intermediate, IntermediateDraft, IntermediateFilter,
    IntermediateId, Performance, PerformanceDraft, PerformanceFilter, PerformanceId, RawMaterial,
    RawMaterialDraft, RawMaterialFilter, RawMaterialId,
};

/// Trait for knowledge graph storage backends.
///
/// # Implementor Notes
///
/// - Methods use `&self` to enable sharing via `Arc<dyn KnowledgeStore>`
/// - Use interior mutability (e.g., `Mutex<Connection>`, `RwLock`) for mutable state
/// - Drafts arrive validated; backends only enforce referential and uniqueness rules
/// - `import_bundle` must be atomic: on error no row of the bundle may remain
pub trait KnowledgeStore: Send + Sync {
    // ========================================================================
    // Raw Materials
    // ========================================================================

    /// Inserts a raw material and returns the stored row.
    fn insert_raw_material(&self, draft: &RawMaterialDraft) -> Result<RawMaterial>;

    /// Gets a raw material by id.
    fn get_raw_material(&self, id: RawMaterialId) -> Result<Option<RawMaterial>>;

    /// Gets a raw material by code.
    fn find_raw_material(&self, code: &str) -> Result<Option<RawMaterial>>;

    /// Rewrites every field of a raw material. Returns `None` if it does not exist.
    fn update_raw_material(
        &self,
        id: RawMaterialId,
        draft: &RawMaterialDraft,
    ) -> Result<Option<RawMaterial>>;

    /// Deletes a raw material and its links. Returns `false` if it did not exist.
    fn delete_raw_material(&self, id: RawMaterialId) -> Result<bool>;

    /// Lists raw materials matching the filter.
    fn list_raw_materials(&self, filter: &RawMaterialFilter) -> Result<Vec<RawMaterial>>;

    // ========================================================================
    // Intermediates
    // ========================================================================

    /// Inserts an intermediate and returns the stored row.
    fn insert_intermediate(&self, draft: &IntermediateDraft) -> Result<Intermediate>;

    /// Gets an intermediate by id.
    fn get_intermediate(&self, id: IntermediateId) -> Result<Option<Intermediate>>;

    /// Gets an intermediate by code.
    fn find_intermediate(&self, code: &str) -> Result<Option<Intermediate>>;

    /// Rewrites every field of an intermediate.
    fn update_intermediate(
        &self,
        id: IntermediateId,
        draft: &IntermediateDraft,
    ) -> Result<Option<Intermediate>>;

    /// Deletes an intermediate and its links.
    fn delete_intermediate(&self, id: IntermediateId) -> Result<bool>;

    /// Lists intermediates matching the filter.
    fn list_intermediates(&self, filter: &IntermediateFilter) -> Result<Vec<Intermediate>>;

    // ========================================================================
    // Formulas
    // ========================================================================

    /// Inserts a formula and returns the stored row.
    fn insert_formula(&self, draft: &FormulaDraft) -> Result<Formula>;

    /// Gets a formula by id.
    fn get_formula(&self, id: FormulaId) -> Result<Option<Formula>>;

    /// Gets a formula by code.
    fn find_formula(&self, code: &str) -> Result<Option<Formula>>;

    /// Rewrites every field of a formula.
    fn update_formula(&self, id: FormulaId, draft: &FormulaDraft) -> Result<Option<Formula>>;

    /// Deletes a formula, its components and its performance records.
    fn delete_formula(&self, id: FormulaId) -> Result<bool>;

    /// Lists formulas matching the filter.
    fn list_formulas(&self, filter: &FormulaFilter) -> Result<Vec<Formula>>;

    // ========================================================================
    // Performance Records
    // ========================================================================

    /// Records a test of a formula.
    fn insert_performance(
        &self,
        formula: FormulaId,
        draft: &PerformanceDraft,
    ) -> Result<Performance>;

    /// Gets a test record by id.
    fn get_performance(&self, id: PerformanceId) -> Result<Option<Performance>>;

    /// Rewrites every field of a test record except its formula.
    fn update_performance(
        &self,
        id: PerformanceId,
        draft: &PerformanceDraft,
    ) -> Result<Option<Performance>>;

    /// Deletes a test record.
    fn delete_performance(&self, id: PerformanceId) -> Result<bool>;

    /// Lists test records matching the filter.
    fn list_performances(&self, filter: &PerformanceFilter) -> Result<Vec<Performance>>;

    /// Lists the test records of any of the given formulas.
    fn performances_for(&self, formulas: &[FormulaId]) -> Result<Vec<Performance>>;

    // ========================================================================
    // Composition Links
    // ========================================================================

    /// Adds a raw material to an intermediate.
    fn insert_ingredient(
        &self,
        intermediate: IntermediateId,
        draft: &IngredientDraft,
    ) -> Result<Ingredient>;

    /// Removes an ingredient row.
    fn delete_ingredient(&self, id: IngredientId) -> Result<bool>;

    /// Lists the ingredients of one intermediate.
    fn ingredients_of(&self, intermediate: IntermediateId) -> Result<Vec<Ingredient>>;

    /// Lists the ingredient rows that use a raw material.
    fn ingredients_using(&self, raw_material: RawMaterialId) -> Result<Vec<Ingredient>>;

    /// Lists every ingredient row.
    fn all_ingredients(&self) -> Result<Vec<Ingredient>>;

    /// Adds a component to a formula.
    fn insert_component(
        &self,
        formula: FormulaId,
        draft: &ComponentDraft,
    ) -> Result<FormulaComponent>;

    /// Removes a formula component row.
    fn delete_component(&self, id: ComponentId) -> Result<bool>;

    /// Lists the components of one formula.
    fn components_of(&self, formula: FormulaId) -> Result<Vec<FormulaComponent>>;

    /// Lists the component rows that reference the given child.
    fn components_using(&self, component: Component) -> Result<Vec<FormulaComponent>>;

    /// Lists every formula component row.
    fn all_components(&self) -> Result<Vec<FormulaComponent>>;

    // ========================================================================
    // Bulk Operations
    // ========================================================================

    /// Imports a validated bundle atomically.
    ///
    /// Codes resolve against rows created earlier in the bundle and rows
    /// already stored.
    fn import_bundle(&self, bundle: &GraphBundle) -> Result<ImportSummary>;

    /// Returns entity counts per tier.
    fn counts(&self) -> Result<GraphCounts>;

    /// Removes every row.
    fn clear(&self) -> Result<()>;
}
