//! Catalog service for entity and composition management.
//!
//! Wraps a [`KnowledgeStore`] with validation, not-found reporting and
//! patch handling for all four tiers plus the composition links between them.
//!
//! # Example
//!
//! ```rust,ignore
//! use matgraph::models::{IngredientDraft, IntermediateDraft, IntermediateType, MaterialType, RawMaterialDraft};
//! use matgraph::{CatalogService, InMemoryKnowledgeStore};
//! use std::sync::Arc;
//!
//! let catalog = CatalogService::new(Arc::new(InMemoryKnowledgeStore::new()));
//! let oil = catalog.create_raw_material(&RawMaterialDraft::new("RM-001", "Silicone oil", MaterialType::Polymer))?;
//! let base = catalog.create_intermediate(&IntermediateDraft::new("INT-001", "Base", IntermediateType::Prepolymer))?;
//! catalog.add_ingredient(base.id, &IngredientDraft::new(oil.id, 85.0))?;
//! ```

use crate::models::{
    Component, ComponentDraft, ComponentEntry, ComponentId, CompositionEntry, Formula,
    FormulaComponent, FormulaDraft, FormulaFilter, FormulaId, FormulaPatch, Ingredient,
    IngredientDraft, IngredientEntry, IngredientId, Intermediate, IntermediateDraft,
    IntermediateFilter, IntermediateId, IntermediatePatch, Performance, PerformanceDraft,
    PerformanceFilter, PerformanceId, PerformancePatch, RawMaterial, RawMaterialDraft,
    RawMaterialFilter, RawMaterialId, RawMaterialPatch,
};
use crate::storage::traits::KnowledgeStore;
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::instrument;

fn record_created(tier: &'static str) {
    metrics::counter!("matgraph_entities_created_total", "tier" => tier).increment(1);
}

fn record_deleted(tier: &'static str) {
    metrics::counter!("matgraph_entities_deleted_total", "tier" => tier).increment(1);
}

/// Entity CRUD and composition links.
///
/// # Thread Safety
///
/// The service is thread-safe when the underlying store is thread-safe, which
/// every [`KnowledgeStore`] is.
pub struct CatalogService<S: KnowledgeStore + ?Sized> {
    store: Arc<S>,
}

impl<S: KnowledgeStore + ?Sized> Clone for CatalogService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: KnowledgeStore + ?Sized> CatalogService<S> {
    /// Creates a catalog service over a shared store.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    // =========================================================================
    // Raw Materials
    // =========================================================================

    /// Creates a raw material.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for invalid fields and [`Error::Conflict`]
    /// when the code is taken.
    #[instrument(skip(self, draft), fields(operation = "create_raw_material", code = %draft.code))]
    pub fn create_raw_material(&self, draft: &RawMaterialDraft) -> Result<RawMaterial> {
        draft.validate()?;
        let created = self.store.insert_raw_material(draft)?;
        record_created("raw_material");
        tracing::debug!(id = %created.id, "Created raw material");
        Ok(created)
    }

    /// Gets a raw material by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the id is unknown.
    pub fn get_raw_material(&self, id: RawMaterialId) -> Result<RawMaterial> {
        self.store
            .get_raw_material(id)?
            .ok_or_else(|| Error::not_found("raw_material", id))
    }

    /// Applies a partial update to a raw material.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`], [`Error::Validation`] or
    /// [`Error::Conflict`].
    #[instrument(skip(self, patch), fields(operation = "update_raw_material", raw_material_id = %id))]
    pub fn update_raw_material(
        &self,
        id: RawMaterialId,
        patch: RawMaterialPatch,
    ) -> Result<RawMaterial> {
        let mut draft = RawMaterialDraft::from(&self.get_raw_material(id)?);
        patch.apply_to(&mut draft);
        draft.validate()?;
        self.store
            .update_raw_material(id, &draft)?
            .ok_or_else(|| Error::not_found("raw_material", id))
    }

    /// Deletes a raw material and every composition row that references it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the id is unknown.
    #[instrument(skip(self), fields(operation = "delete_raw_material", raw_material_id = %id))]
    pub fn delete_raw_material(&self, id: RawMaterialId) -> Result<()> {
        if !self.store.delete_raw_material(id)? {
            return Err(Error::not_found("raw_material", id));
        }
        record_deleted("raw_material");
        Ok(())
    }

    /// Lists raw materials matching `filter`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub fn list_raw_materials(&self, filter: &RawMaterialFilter) -> Result<Vec<RawMaterial>> {
        self.store.list_raw_materials(filter)
    }

    // =========================================================================
    // Intermediates
    // =========================================================================

    /// Creates an intermediate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] or [`Error::Conflict`].
    #[instrument(skip(self, draft), fields(operation = "create_intermediate", code = %draft.code))]
    pub fn create_intermediate(&self, draft: &IntermediateDraft) -> Result<Intermediate> {
        draft.validate()?;
        let created = self.store.insert_intermediate(draft)?;
        record_created("intermediate");
        tracing::debug!(id = %created.id, "Created intermediate");
        Ok(created)
    }

    /// Gets an intermediate by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the id is unknown.
    pub fn get_intermediate(&self, id: IntermediateId) -> Result<Intermediate> {
        self.store
            .get_intermediate(id)?
            .ok_or_else(|| Error::not_found("intermediate", id))
    }

    /// Applies a partial update to an intermediate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`], [`Error::Validation`] or
    /// [`Error::Conflict`].
    #[instrument(skip(self, patch), fields(operation = "update_intermediate", intermediate_id = %id))]
    pub fn update_intermediate(
        &self,
        id: IntermediateId,
        patch: IntermediatePatch,
    ) -> Result<Intermediate> {
        let mut draft = IntermediateDraft::from(&self.get_intermediate(id)?);
        patch.apply_to(&mut draft);
        draft.validate()?;
        self.store
            .update_intermediate(id, &draft)?
            .ok_or_else(|| Error::not_found("intermediate", id))
    }

    /// Deletes an intermediate, its ingredients and the formula components
    /// that reference it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the id is unknown.
    #[instrument(skip(self), fields(operation = "delete_intermediate", intermediate_id = %id))]
    pub fn delete_intermediate(&self, id: IntermediateId) -> Result<()> {
        if !self.store.delete_intermediate(id)? {
            return Err(Error::not_found("intermediate", id));
        }
        record_deleted("intermediate");
        Ok(())
    }

    /// Lists intermediates matching `filter`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub fn list_intermediates(&self, filter: &IntermediateFilter) -> Result<Vec<Intermediate>> {
        self.store.list_intermediates(filter)
    }

    // =========================================================================
    // Formulas
    // =========================================================================

    /// Creates a formula.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] or [`Error::Conflict`].
    #[instrument(skip(self, draft), fields(operation = "create_formula", code = %draft.code))]
    pub fn create_formula(&self, draft: &FormulaDraft) -> Result<Formula> {
        draft.validate()?;
        let created = self.store.insert_formula(draft)?;
        record_created("formula");
        tracing::debug!(id = %created.id, "Created formula");
        Ok(created)
    }

    /// Gets a formula by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the id is unknown.
    pub fn get_formula(&self, id: FormulaId) -> Result<Formula> {
        self.store
            .get_formula(id)?
            .ok_or_else(|| Error::not_found("formula", id))
    }

    /// Applies a partial update to a formula.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`], [`Error::Validation`] or
    /// [`Error::Conflict`].
    #[instrument(skip(self, patch), fields(operation = "update_formula", formula_id = %id))]
    pub fn update_formula(&self, id: FormulaId, patch: FormulaPatch) -> Result<Formula> {
        let mut draft = FormulaDraft::from(&self.get_formula(id)?);
        patch.apply_to(&mut draft);
        draft.validate()?;
        self.store
            .update_formula(id, &draft)?
            .ok_or_else(|| Error::not_found("formula", id))
    }

    /// Deletes a formula with its components and test records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the id is unknown.
    #[instrument(skip(self), fields(operation = "delete_formula", formula_id = %id))]
    pub fn delete_formula(&self, id: FormulaId) -> Result<()> {
        if !self.store.delete_formula(id)? {
            return Err(Error::not_found("formula", id));
        }
        record_deleted("formula");
        Ok(())
    }

    /// Lists formulas matching `filter`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub fn list_formulas(&self, filter: &FormulaFilter) -> Result<Vec<Formula>> {
        self.store.list_formulas(filter)
    }

    // =========================================================================
    // Performance Records
    // =========================================================================

    /// Records a test result for a formula.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the formula does not exist and
    /// [`Error::Validation`] for invalid fields.
    #[instrument(skip(self, draft), fields(operation = "create_performance", formula_id = %formula))]
    pub fn create_performance(
        &self,
        formula: FormulaId,
        draft: &PerformanceDraft,
    ) -> Result<Performance> {
        draft.validate()?;
        self.get_formula(formula)?;
        let created = self.store.insert_performance(formula, draft)?;
        record_created("performance");
        Ok(created)
    }

    /// Gets a test record by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the id is unknown.
    pub fn get_performance(&self, id: PerformanceId) -> Result<Performance> {
        self.store
            .get_performance(id)?
            .ok_or_else(|| Error::not_found("performance", id))
    }

    /// Applies a partial update to a test record. The owning formula never
    /// changes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] or [`Error::Validation`].
    #[instrument(skip(self, patch), fields(operation = "update_performance", performance_id = %id))]
    pub fn update_performance(
        &self,
        id: PerformanceId,
        patch: PerformancePatch,
    ) -> Result<Performance> {
        let mut draft = PerformanceDraft::from(&self.get_performance(id)?);
        patch.apply_to(&mut draft);
        draft.validate()?;
        self.store
            .update_performance(id, &draft)?
            .ok_or_else(|| Error::not_found("performance", id))
    }

    /// Deletes a test record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the id is unknown.
    pub fn delete_performance(&self, id: PerformanceId) -> Result<()> {
        if !self.store.delete_performance(id)? {
            return Err(Error::not_found("performance", id));
        }
        record_deleted("performance");
        Ok(())
    }

    /// Lists test records matching `filter`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub fn list_performances(&self, filter: &PerformanceFilter) -> Result<Vec<Performance>> {
        self.store.list_performances(filter)
    }

    // =========================================================================
    // Composition Links
    // =========================================================================

    /// Adds a raw material to an intermediate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if either side is missing and
    /// [`Error::Conflict`] if the raw material is already an ingredient.
    #[instrument(
        skip(self, draft),
        fields(operation = "add_ingredient", intermediate_id = %intermediate, raw_material_id = %draft.raw_material)
    )]
    pub fn add_ingredient(
        &self,
        intermediate: IntermediateId,
        draft: &IngredientDraft,
    ) -> Result<Ingredient> {
        draft.validate()?;
        self.get_intermediate(intermediate)?;
        self.get_raw_material(draft.raw_material)?;
        let created = self.store.insert_ingredient(intermediate, draft)?;
        record_created("ingredient");
        Ok(created)
    }

    /// Adds an intermediate or raw material to a formula.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the formula or the child is missing.
    #[instrument(
        skip(self, draft),
        fields(operation = "add_component", formula_id = %formula, component_type = draft.component.kind())
    )]
    pub fn add_component(
        &self,
        formula: FormulaId,
        draft: &ComponentDraft,
    ) -> Result<FormulaComponent> {
        draft.validate()?;
        self.get_formula(formula)?;
        match draft.component {
            Component::Intermediate { intermediate } => {
                self.get_intermediate(intermediate)?;
            },
            Component::RawMaterial { raw_material } => {
                self.get_raw_material(raw_material)?;
            },
        }
        let created = self.store.insert_component(formula, draft)?;
        record_created("component");
        Ok(created)
    }

    /// Removes an ingredient row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the id is unknown.
    pub fn remove_ingredient(&self, id: IngredientId) -> Result<()> {
        if !self.store.delete_ingredient(id)? {
            return Err(Error::not_found("ingredient", id));
        }
        record_deleted("ingredient");
        Ok(())
    }

    /// Removes a formula component row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the id is unknown.
    pub fn remove_component(&self, id: ComponentId) -> Result<()> {
        if !self.store.delete_component(id)? {
            return Err(Error::not_found("component", id));
        }
        record_deleted("component");
        Ok(())
    }

    /// Ingredients of an intermediate in addition order, with raw material
    /// codes and names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the intermediate does not exist.
    pub fn ingredients(&self, intermediate: IntermediateId) -> Result<Vec<IngredientEntry>> {
        self.get_intermediate(intermediate)?;
        self.store
            .ingredients_of(intermediate)?
            .into_iter()
            .map(|row| {
                let (component_code, component_name) = self
                    .store
                    .get_raw_material(row.raw_material)?
                    .map(|m| (m.code, m.name))
                    .unwrap_or_default();
                Ok(CompositionEntry {
                    row,
                    component_code,
                    component_name,
                })
            })
            .collect()
    }

    /// Components of a formula in addition order, with child codes and names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the formula does not exist.
    pub fn components(&self, formula: FormulaId) -> Result<Vec<ComponentEntry>> {
        self.get_formula(formula)?;
        self.store
            .components_of(formula)?
            .into_iter()
            .map(|row| {
                let (component_code, component_name) = match row.component {
                    Component::Intermediate { intermediate } => self
                        .store
                        .get_intermediate(intermediate)?
                        .map(|i| (i.code, i.name)),
                    Component::RawMaterial { raw_material } => self
                        .store
                        .get_raw_material(raw_material)?
                        .map(|m| (m.code, m.name)),
                }
                .unwrap_or_default();
                Ok(CompositionEntry {
                    row,
                    component_code,
                    component_name,
                })
            })
            .collect()
    }

    /// Intermediates that contain a raw material, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the raw material does not exist.
    pub fn intermediates_using(&self, raw_material: RawMaterialId) -> Result<Vec<Intermediate>> {
        self.get_raw_material(raw_material)?;
        let ids: BTreeSet<IntermediateId> = self
            .store
            .ingredients_using(raw_material)?
            .into_iter()
            .map(|i| i.intermediate)
            .collect();
        load_all(ids, |id| self.store.get_intermediate(id))
    }

    /// Formulas that use an intermediate, distinct and ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the intermediate does not exist.
    pub fn formulas_using(&self, intermediate: IntermediateId) -> Result<Vec<Formula>> {
        self.get_intermediate(intermediate)?;
        let ids: BTreeSet<FormulaId> = self
            .store
            .components_using(Component::from(intermediate))?
            .into_iter()
            .map(|c| c.formula)
            .collect();
        load_all(ids, |id| self.store.get_formula(id))
    }

    /// Test records of a formula, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the formula does not exist.
    pub fn performances_of(&self, formula: FormulaId) -> Result<Vec<Performance>> {
        self.get_formula(formula)?;
        self.store.list_performances(&PerformanceFilter {
            formula: Some(formula),
            ..PerformanceFilter::default()
        })
    }
}

/// Loads entities for `ids` in iteration order, skipping ids that vanished.
pub(crate) fn load_all<I, T>(
    ids: impl IntoIterator<Item = I>,
    get: impl Fn(I) -> Result<Option<T>>,
) -> Result<Vec<T>> {
    let mut loaded = Vec::new();
    for id in ids {
        if let Some(entity) = get(id)? {
            loaded.push(entity);
        }
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use crate::InMemoryKnowledgeStore;
    use crate::models::{ApplicationType, IntermediateType, MaterialType};
    use chrono::NaiveDate;

    fn create_service() -> CatalogService<InMemoryKnowledgeStore> {
        CatalogService::new(Arc::new(InMemoryKnowledgeStore::new()))
    }

    fn raw(service: &CatalogService<InMemoryKnowledgeStore>, code: &str) -> RawMaterial {
        service
            .create_raw_material(&RawMaterialDraft::new(code, format!("Material {code}"), MaterialType::Polymer))
            .unwrap()
    }

    #[test]
    fn test_create_rejects_invalid_draft() {
        let service = create_service();
        let err = service
            .create_raw_material(&RawMaterialDraft::new("  ", "Nameless", MaterialType::Other))
            .unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "code"));
        assert!(service.list_raw_materials(&RawMaterialFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let service = create_service();
        let err = service.get_formula(FormulaId::new(7)).unwrap_err();
        assert_eq!(err.to_string(), "formula not found: 7");
    }

    #[test]
    fn test_patch_clears_nullable_field() {
        let service = create_service();
        let mut draft = RawMaterialDraft::new("RM-001", "Oil", MaterialType::Polymer);
        draft.density = Some(0.97);
        let created = service.create_raw_material(&draft).unwrap();

        let patch: RawMaterialPatch =
            serde_json::from_str(r#"{"density": null, "supplier": "Wacker"}"#).unwrap();
        let updated = service.update_raw_material(created.id, patch).unwrap();
        assert_eq!(updated.density, None);
        assert_eq!(updated.supplier, "Wacker");
        assert_eq!(updated.name, "Oil");
    }

    #[test]
    fn test_update_to_taken_code_conflicts() {
        let service = create_service();
        raw(&service, "RM-001");
        let second = raw(&service, "RM-002");
        let patch: RawMaterialPatch = serde_json::from_str(r#"{"code": "RM-001"}"#).unwrap();
        let err = service.update_raw_material(second.id, patch).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_performance_requires_formula() {
        let service = create_service();
        let date = NaiveDate::from_ymd_opt(2024, 10, 1).unwrap();
        let err = service
            .create_performance(FormulaId::new(1), &PerformanceDraft::new("B1", date))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "formula", .. }));
    }

    #[test]
    fn test_add_component_checks_child() {
        let service = create_service();
        let formula = service
            .create_formula(&FormulaDraft::new("F-001", "Sealant", ApplicationType::Sealant))
            .unwrap();
        let err = service
            .add_component(formula.id, &ComponentDraft::new(IntermediateId::new(3), 10.0))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "intermediate", .. }));

        let err = service
            .add_component(formula.id, &ComponentDraft::new(RawMaterialId::new(3), -1.0))
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_ingredients_are_ordered_and_decorated() {
        let service = create_service();
        let a = raw(&service, "RM-A");
        let b = raw(&service, "RM-B");
        let int = service
            .create_intermediate(&IntermediateDraft::new("INT-1", "Mix", IntermediateType::Mixture))
            .unwrap();
        service.add_ingredient(int.id, &IngredientDraft::new(a.id, 40.0).with_order(2)).unwrap();
        service.add_ingredient(int.id, &IngredientDraft::new(b.id, 60.0).with_order(1)).unwrap();

        let entries = service.ingredients(int.id).unwrap();
        let codes: Vec<&str> = entries.iter().map(|e| e.component_code.as_str()).collect();
        assert_eq!(codes, ["RM-B", "RM-A"]);
        assert_eq!(entries[0].component_name, "Material RM-B");

        let err = service
            .add_ingredient(int.id, &IngredientDraft::new(a.id, 1.0))
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_formulas_using_is_distinct() {
        let service = create_service();
        let int = service
            .create_intermediate(&IntermediateDraft::new("INT-1", "Base", IntermediateType::Prepolymer))
            .unwrap();
        let formula = service
            .create_formula(&FormulaDraft::new("F-1", "Sealant", ApplicationType::Sealant))
            .unwrap();
        service.add_component(formula.id, &ComponentDraft::new(int.id, 50.0)).unwrap();
        service.add_component(formula.id, &ComponentDraft::new(int.id, 10.0)).unwrap();

        let formulas = service.formulas_using(int.id).unwrap();
        assert_eq!(formulas.len(), 1);
        assert_eq!(service.components(formula.id).unwrap().len(), 2);
    }

    #[test]
    fn test_remove_missing_link_is_not_found() {
        let service = create_service();
        assert!(matches!(
            service.remove_ingredient(IngredientId::new(1)),
            Err(Error::NotFound { kind: "ingredient", .. })
        ));
        assert!(matches!(
            service.remove_component(ComponentId::new(1)),
            Err(Error::NotFound { kind: "component", .. })
        ));
    }
}
