//! In-memory knowledge store for testing.
//!
//! Provides a fast, non-persistent implementation of [`KnowledgeStore`] for
//! use in unit tests and development scenarios. Mirrors the `SQLite` store's
//! constraints: unique codes, unique (intermediate, raw material) pairs,
//! existing references and cascading deletes.

use super::writer::{GraphWriter, write_bundle};
use crate::models::{
    Component, ComponentDraft, ComponentId, Formula, FormulaComponent, FormulaDraft,
    FormulaFilter, FormulaId, GraphBundle, GraphCounts, ImportSummary, Ingredient,
    IngredientDraft, IngredientId, Intermediate, IntermediateDraft, IntermediateFilter,
    IntermediateId, Performance, PerformanceDraft, PerformanceFilter, PerformanceId, RawMaterial,
    RawMaterialDraft, RawMaterialFilter, RawMaterialId,
};
use crate::storage::traits::KnowledgeStore;
use crate::{Error, Result, current_timestamp};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory knowledge store.
///
/// Uses `RwLock` for thread-safe access with reader-writer semantics.
/// Data is not persisted between runs.
#[derive(Debug, Default)]
pub struct InMemoryKnowledgeStore {
    state: RwLock<MemoryState>,
}

impl InMemoryKnowledgeStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self, operation: &'static str) -> Result<RwLockReadGuard<'_, MemoryState>> {
        self.state.read().map_err(|_| lock_poisoned(operation))
    }

    fn write(&self, operation: &'static str) -> Result<RwLockWriteGuard<'_, MemoryState>> {
        self.state.write().map_err(|_| lock_poisoned(operation))
    }
}

fn lock_poisoned(operation: &'static str) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: "Lock poisoned".to_string(),
    }
}

/// Last id handed out per table. Ids are never reused, even after `clear`.
#[derive(Debug, Clone, Copy, Default)]
struct Sequences {
    raw_material: i64,
    intermediate: i64,
    formula: i64,
    performance: i64,
    ingredient: i64,
    component: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    raw_materials: BTreeMap<RawMaterialId, RawMaterial>,
    intermediates: BTreeMap<IntermediateId, Intermediate>,
    formulas: BTreeMap<FormulaId, Formula>,
    performances: BTreeMap<PerformanceId, Performance>,
    ingredients: BTreeMap<IngredientId, Ingredient>,
    components: BTreeMap<ComponentId, FormulaComponent>,
    sequences: Sequences,
}

fn ensure_code_free<'a>(
    mut codes: impl Iterator<Item = (i64, &'a str)>,
    code: &str,
    except: Option<i64>,
    table: &str,
) -> Result<()> {
    if codes.any(|(id, existing)| existing == code && Some(id) != except) {
        return Err(Error::Conflict(format!("code already exists in {table}")));
    }
    Ok(())
}

impl MemoryState {
    fn check_raw_material_code(&self, code: &str, except: Option<RawMaterialId>) -> Result<()> {
        ensure_code_free(
            self.raw_materials.values().map(|m| (m.id.get(), m.code.as_str())),
            code,
            except.map(RawMaterialId::get),
            "raw_material",
        )
    }

    fn check_intermediate_code(&self, code: &str, except: Option<IntermediateId>) -> Result<()> {
        ensure_code_free(
            self.intermediates.values().map(|i| (i.id.get(), i.code.as_str())),
            code,
            except.map(IntermediateId::get),
            "intermediate",
        )
    }

    fn check_formula_code(&self, code: &str, except: Option<FormulaId>) -> Result<()> {
        ensure_code_free(
            self.formulas.values().map(|f| (f.id.get(), f.code.as_str())),
            code,
            except.map(FormulaId::get),
            "formula",
        )
    }

    fn component_exists(&self, component: Component) -> bool {
        match component {
            Component::Intermediate { intermediate } => {
                self.intermediates.contains_key(&intermediate)
            },
            Component::RawMaterial { raw_material } => {
                self.raw_materials.contains_key(&raw_material)
            },
        }
    }
}

fn raw_material_row(
    id: RawMaterialId,
    d: &RawMaterialDraft,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> RawMaterial {
    RawMaterial {
        id,
        code: d.code.clone(),
        name: d.name.clone(),
        chemical_name: d.chemical_name.clone(),
        cas_number: d.cas_number.clone(),
        material_type: d.material_type,
        molecular_formula: d.molecular_formula.clone(),
        molecular_weight: d.molecular_weight,
        density: d.density,
        viscosity: d.viscosity,
        supplier: d.supplier.clone(),
        unit_price: d.unit_price,
        properties: d.properties.clone(),
        description: d.description.clone(),
        created_by: d.created_by.clone(),
        created_at,
        updated_at,
    }
}

fn intermediate_row(
    id: IntermediateId,
    d: &IntermediateDraft,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> Intermediate {
    Intermediate {
        id,
        code: d.code.clone(),
        name: d.name.clone(),
        intermediate_type: d.intermediate_type,
        preparation_method: d.preparation_method.clone(),
        reaction_conditions: d.reaction_conditions.clone(),
        viscosity: d.viscosity,
        solid_content: d.solid_content,
        properties: d.properties.clone(),
        description: d.description.clone(),
        created_by: d.created_by.clone(),
        created_at,
        updated_at,
    }
}

fn formula_row(
    id: FormulaId,
    d: &FormulaDraft,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> Formula {
    Formula {
        id,
        code: d.code.clone(),
        name: d.name.clone(),
        version: d.version.clone(),
        status: d.status,
        application_type: d.application_type,
        mixing_temperature: d.mixing_temperature,
        mixing_time: d.mixing_time,
        curing_temperature: d.curing_temperature,
        curing_time: d.curing_time,
        process_description: d.process_description.clone(),
        precautions: d.precautions.clone(),
        properties: d.properties.clone(),
        description: d.description.clone(),
        created_by: d.created_by.clone(),
        created_at,
        updated_at,
    }
}

fn performance_row(
    id: PerformanceId,
    formula: FormulaId,
    d: &PerformanceDraft,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> Performance {
    Performance {
        id,
        formula,
        test_batch: d.test_batch.clone(),
        test_date: d.test_date,
        test_method: d.test_method,
        test_conditions: d.test_conditions.clone(),
        tensile_strength: d.tensile_strength,
        elongation_at_break: d.elongation_at_break,
        tear_strength: d.tear_strength,
        hardness: d.hardness,
        adhesion_strength: d.adhesion_strength,
        weather_resistance: d.weather_resistance.clone(),
        water_resistance: d.water_resistance.clone(),
        heat_resistance_temp: d.heat_resistance_temp,
        cold_resistance_temp: d.cold_resistance_temp,
        viscosity: d.viscosity,
        density: d.density,
        tack_free_time: d.tack_free_time,
        full_cure_time: d.full_cure_time,
        additional_properties: d.additional_properties.clone(),
        overall_rating: d.overall_rating,
        notes: d.notes.clone(),
        tested_by: d.tested_by.clone(),
        created_at,
        updated_at,
    }
}

impl GraphWriter for MemoryState {
    fn insert_raw_material(&mut self, draft: &RawMaterialDraft) -> Result<RawMaterial> {
        self.check_raw_material_code(&draft.code, None)?;
        let id = RawMaterialId::new(next(&mut self.sequences.raw_material));
        let now = current_timestamp();
        let row = raw_material_row(id, draft, now, now);
        self.raw_materials.insert(id, row.clone());
        Ok(row)
    }

    fn insert_intermediate(&mut self, draft: &IntermediateDraft) -> Result<Intermediate> {
        self.check_intermediate_code(&draft.code, None)?;
        let id = IntermediateId::new(next(&mut self.sequences.intermediate));
        let now = current_timestamp();
        let row = intermediate_row(id, draft, now, now);
        self.intermediates.insert(id, row.clone());
        Ok(row)
    }

    fn insert_formula(&mut self, draft: &FormulaDraft) -> Result<Formula> {
        self.check_formula_code(&draft.code, None)?;
        let id = FormulaId::new(next(&mut self.sequences.formula));
        let now = current_timestamp();
        let row = formula_row(id, draft, now, now);
        self.formulas.insert(id, row.clone());
        Ok(row)
    }

    fn insert_performance(
        &mut self,
        formula: FormulaId,
        draft: &PerformanceDraft,
    ) -> Result<Performance> {
        if !self.formulas.contains_key(&formula) {
            return Err(Error::not_found("formula", formula));
        }
        let id = PerformanceId::new(next(&mut self.sequences.performance));
        let now = current_timestamp();
        let row = performance_row(id, formula, draft, now, now);
        self.performances.insert(id, row.clone());
        Ok(row)
    }

    fn insert_ingredient(
        &mut self,
        intermediate: IntermediateId,
        draft: &IngredientDraft,
    ) -> Result<Ingredient> {
        if !self.intermediates.contains_key(&intermediate) {
            return Err(Error::not_found("intermediate", intermediate));
        }
        if !self.raw_materials.contains_key(&draft.raw_material) {
            return Err(Error::not_found("raw_material", draft.raw_material));
        }
        if self
            .ingredients
            .values()
            .any(|i| i.intermediate == intermediate && i.raw_material == draft.raw_material)
        {
            return Err(Error::Conflict(
                "raw material is already an ingredient of this intermediate".to_string(),
            ));
        }
        let row = Ingredient {
            id: IngredientId::new(next(&mut self.sequences.ingredient)),
            intermediate,
            raw_material: draft.raw_material,
            weight_ratio: draft.weight_ratio,
            addition_order: draft.addition_order,
            addition_temperature: draft.addition_temperature,
            notes: draft.notes.clone(),
        };
        self.ingredients.insert(row.id, row.clone());
        Ok(row)
    }

    fn insert_component(
        &mut self,
        formula: FormulaId,
        draft: &ComponentDraft,
    ) -> Result<FormulaComponent> {
        if !self.formulas.contains_key(&formula) {
            return Err(Error::not_found("formula", formula));
        }
        if !self.component_exists(draft.component) {
            return Err(draft.component.not_found());
        }
        let row = FormulaComponent {
            id: ComponentId::new(next(&mut self.sequences.component)),
            formula,
            component: draft.component,
            weight_ratio: draft.weight_ratio,
            addition_order: draft.addition_order,
            notes: draft.notes.clone(),
        };
        self.components.insert(row.id, row.clone());
        Ok(row)
    }

    fn raw_material_id(&mut self, code: &str) -> Result<Option<RawMaterialId>> {
        Ok(self
            .raw_materials
            .values()
            .find(|m| m.code == code)
            .map(|m| m.id))
    }

    fn intermediate_id(&mut self, code: &str) -> Result<Option<IntermediateId>> {
        Ok(self
            .intermediates
            .values()
            .find(|i| i.code == code)
            .map(|i| i.id))
    }
}

impl KnowledgeStore for InMemoryKnowledgeStore {
    // ========================================================================
    // Raw Materials
    // ========================================================================

    fn insert_raw_material(&self, draft: &RawMaterialDraft) -> Result<RawMaterial> {
        self.write("insert_raw_material")?.insert_raw_material(draft)
    }

    fn get_raw_material(&self, id: RawMaterialId) -> Result<Option<RawMaterial>> {
        Ok(self.read("get_raw_material")?.raw_materials.get(&id).cloned())
    }

    fn find_raw_material(&self, code: &str) -> Result<Option<RawMaterial>> {
        let state = self.read("find_raw_material")?;
        Ok(state.raw_materials.values().find(|m| m.code == code).cloned())
    }

    fn update_raw_material(
        &self,
        id: RawMaterialId,
        draft: &RawMaterialDraft,
    ) -> Result<Option<RawMaterial>> {
        let mut state = self.write("update_raw_material")?;
        let Some(created_at) = state.raw_materials.get(&id).map(|m| m.created_at) else {
            return Ok(None);
        };
        state.check_raw_material_code(&draft.code, Some(id))?;
        let row = raw_material_row(id, draft, created_at, current_timestamp());
        state.raw_materials.insert(id, row.clone());
        Ok(Some(row))
    }

    fn delete_raw_material(&self, id: RawMaterialId) -> Result<bool> {
        let mut state = self.write("delete_raw_material")?;
        if state.raw_materials.remove(&id).is_none() {
            return Ok(false);
        }
        state.ingredients.retain(|_, i| i.raw_material != id);
        state
            .components
            .retain(|_, c| c.component.raw_material() != Some(id));
        Ok(true)
    }

    fn list_raw_materials(&self, filter: &RawMaterialFilter) -> Result<Vec<RawMaterial>> {
        let state = self.read("list_raw_materials")?;
        Ok(state
            .raw_materials
            .values()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect())
    }

    // ========================================================================
    // Intermediates
    // ========================================================================

    fn insert_intermediate(&self, draft: &IntermediateDraft) -> Result<Intermediate> {
        self.write("insert_intermediate")?.insert_intermediate(draft)
    }

    fn get_intermediate(&self, id: IntermediateId) -> Result<Option<Intermediate>> {
        Ok(self.read("get_intermediate")?.intermediates.get(&id).cloned())
    }

    fn find_intermediate(&self, code: &str) -> Result<Option<Intermediate>> {
        let state = self.read("find_intermediate")?;
        Ok(state.intermediates.values().find(|i| i.code == code).cloned())
    }

    fn update_intermediate(
        &self,
        id: IntermediateId,
        draft: &IntermediateDraft,
    ) -> Result<Option<Intermediate>> {
        let mut state = self.write("update_intermediate")?;
        let Some(created_at) = state.intermediates.get(&id).map(|i| i.created_at) else {
            return Ok(None);
        };
        state.check_intermediate_code(&draft.code, Some(id))?;
        let row = intermediate_row(id, draft, created_at, current_timestamp());
        state.intermediates.insert(id, row.clone());
        Ok(Some(row))
    }

    fn delete_intermediate(&self, id: IntermediateId) -> Result<bool> {
        let mut state = self.write("delete_intermediate")?;
        if state.intermediates.remove(&id).is_none() {
            return Ok(false);
        }
        state.ingredients.retain(|_, i| i.intermediate != id);
        state
            .components
            .retain(|_, c| c.component.intermediate() != Some(id));
        Ok(true)
    }

    fn list_intermediates(&self, filter: &IntermediateFilter) -> Result<Vec<Intermediate>> {
        let state = self.read("list_intermediates")?;
        Ok(state
            .intermediates
            .values()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect())
    }

    // ========================================================================
    // Formulas
    // ========================================================================

    fn insert_formula(&self, draft: &FormulaDraft) -> Result<Formula> {
        self.write("insert_formula")?.insert_formula(draft)
    }

    fn get_formula(&self, id: FormulaId) -> Result<Option<Formula>> {
        Ok(self.read("get_formula")?.formulas.get(&id).cloned())
    }

    fn find_formula(&self, code: &str) -> Result<Option<Formula>> {
        let state = self.read("find_formula")?;
        Ok(state.formulas.values().find(|f| f.code == code).cloned())
    }

    fn update_formula(&self, id: FormulaId, draft: &FormulaDraft) -> Result<Option<Formula>> {
        let mut state = self.write("update_formula")?;
        let Some(created_at) = state.formulas.get(&id).map(|f| f.created_at) else {
            return Ok(None);
        };
        state.check_formula_code(&draft.code, Some(id))?;
        let row = formula_row(id, draft, created_at, current_timestamp());
        state.formulas.insert(id, row.clone());
        Ok(Some(row))
    }

    fn delete_formula(&self, id: FormulaId) -> Result<bool> {
        let mut state = self.write("delete_formula")?;
        if state.formulas.remove(&id).is_none() {
            return Ok(false);
        }
        state.components.retain(|_, c| c.formula != id);
        state.performances.retain(|_, p| p.formula != id);
        Ok(true)
    }

    fn list_formulas(&self, filter: &FormulaFilter) -> Result<Vec<Formula>> {
        let state = self.read("list_formulas")?;
        Ok(state
            .formulas
            .values()
            .filter(|f| filter.matches(f))
            .cloned()
            .collect())
    }

    // ========================================================================
    // Performance Records
    // ========================================================================

    fn insert_performance(
        &self,
        formula: FormulaId,
        draft: &PerformanceDraft,
    ) -> Result<Performance> {
        self.write("insert_performance")?
            .insert_performance(formula, draft)
    }

    fn get_performance(&self, id: PerformanceId) -> Result<Option<Performance>> {
        Ok(self.read("get_performance")?.performances.get(&id).cloned())
    }

    fn update_performance(
        &self,
        id: PerformanceId,
        draft: &PerformanceDraft,
    ) -> Result<Option<Performance>> {
        let mut state = self.write("update_performance")?;
        let Some((formula, created_at)) = state
            .performances
            .get(&id)
            .map(|p| (p.formula, p.created_at))
        else {
            return Ok(None);
        };
        let row = performance_row(id, formula, draft, created_at, current_timestamp());
        state.performances.insert(id, row.clone());
        Ok(Some(row))
    }

    fn delete_performance(&self, id: PerformanceId) -> Result<bool> {
        Ok(self
            .write("delete_performance")?
            .performances
            .remove(&id)
            .is_some())
    }

    fn list_performances(&self, filter: &PerformanceFilter) -> Result<Vec<Performance>> {
        let state = self.read("list_performances")?;
        Ok(state
            .performances
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    fn performances_for(&self, formulas: &[FormulaId]) -> Result<Vec<Performance>> {
        let wanted: HashSet<FormulaId> = formulas.iter().copied().collect();
        let state = self.read("performances_for")?;
        Ok(state
            .performances
            .values()
            .filter(|p| wanted.contains(&p.formula))
            .cloned()
            .collect())
    }

    // ========================================================================
    // Composition Links
    // ========================================================================

    fn insert_ingredient(
        &self,
        intermediate: IntermediateId,
        draft: &IngredientDraft,
    ) -> Result<Ingredient> {
        self.write("insert_ingredient")?
            .insert_ingredient(intermediate, draft)
    }

    fn delete_ingredient(&self, id: IngredientId) -> Result<bool> {
        Ok(self
            .write("delete_ingredient")?
            .ingredients
            .remove(&id)
            .is_some())
    }

    fn ingredients_of(&self, intermediate: IntermediateId) -> Result<Vec<Ingredient>> {
        let state = self.read("ingredients_of")?;
        let mut rows: Vec<Ingredient> = state
            .ingredients
            .values()
            .filter(|i| i.intermediate == intermediate)
            .cloned()
            .collect();
        rows.sort_by_key(|i| (i.addition_order, i.id));
        Ok(rows)
    }

    fn ingredients_using(&self, raw_material: RawMaterialId) -> Result<Vec<Ingredient>> {
        let state = self.read("ingredients_using")?;
        let mut rows: Vec<Ingredient> = state
            .ingredients
            .values()
            .filter(|i| i.raw_material == raw_material)
            .cloned()
            .collect();
        rows.sort_by_key(|i| (i.intermediate, i.id));
        Ok(rows)
    }

    fn all_ingredients(&self) -> Result<Vec<Ingredient>> {
        let state = self.read("all_ingredients")?;
        let mut rows: Vec<Ingredient> = state.ingredients.values().cloned().collect();
        rows.sort_by_key(|i| (i.intermediate, i.id));
        Ok(rows)
    }

    fn insert_component(
        &self,
        formula: FormulaId,
        draft: &ComponentDraft,
    ) -> Result<FormulaComponent> {
        self.write("insert_component")?
            .insert_component(formula, draft)
    }

    fn delete_component(&self, id: ComponentId) -> Result<bool> {
        Ok(self
            .write("delete_component")?
            .components
            .remove(&id)
            .is_some())
    }

    fn components_of(&self, formula: FormulaId) -> Result<Vec<FormulaComponent>> {
        let state = self.read("components_of")?;
        let mut rows: Vec<FormulaComponent> = state
            .components
            .values()
            .filter(|c| c.formula == formula)
            .cloned()
            .collect();
        rows.sort_by_key(|c| (c.addition_order, c.id));
        Ok(rows)
    }

    fn components_using(&self, component: Component) -> Result<Vec<FormulaComponent>> {
        let state = self.read("components_using")?;
        let mut rows: Vec<FormulaComponent> = state
            .components
            .values()
            .filter(|c| c.component == component)
            .cloned()
            .collect();
        rows.sort_by_key(|c| (c.formula, c.id));
        Ok(rows)
    }

    fn all_components(&self) -> Result<Vec<FormulaComponent>> {
        let state = self.read("all_components")?;
        let mut rows: Vec<FormulaComponent> = state.components.values().cloned().collect();
        rows.sort_by_key(|c| (c.formula, c.id));
        Ok(rows)
    }

    // ========================================================================
    // Bulk Operations
    // ========================================================================

    fn import_bundle(&self, bundle: &GraphBundle) -> Result<ImportSummary> {
        let mut state = self.write("import_bundle")?;

        // Stage on a copy so a failure leaves the store untouched
        let mut staged = state.clone();
        let summary = write_bundle(&mut staged, bundle)?;
        *state = staged;
        Ok(summary)
    }

    fn counts(&self) -> Result<GraphCounts> {
        let state = self.read("counts")?;
        Ok(GraphCounts {
            raw_materials_count: state.raw_materials.len(),
            intermediates_count: state.intermediates.len(),
            formulas_count: state.formulas.len(),
            performances_count: state.performances.len(),
        })
    }

    fn clear(&self) -> Result<()> {
        let mut state = self.write("clear")?;
        *state = MemoryState {
            sequences: state.sequences,
            ..MemoryState::default()
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use crate::models::{ApplicationType, IntermediateType, MaterialType};

    fn seeded() -> (InMemoryKnowledgeStore, RawMaterial, Intermediate, Formula) {
        let store = InMemoryKnowledgeStore::new();
        let rm = store
            .insert_raw_material(&RawMaterialDraft::new("RM-001", "Silicone oil", MaterialType::Polymer))
            .unwrap();
        let int = store
            .insert_intermediate(&IntermediateDraft::new("INT-001", "Base", IntermediateType::Prepolymer))
            .unwrap();
        let formula = store
            .insert_formula(&FormulaDraft::new("F-001", "Sealant", ApplicationType::Sealant))
            .unwrap();
        (store, rm, int, formula)
    }

    #[test]
    fn test_ids_are_sequential_and_not_reused() {
        let (store, rm, _, _) = seeded();
        assert_eq!(rm.id.get(), 1);
        store.clear().unwrap();
        let again = store
            .insert_raw_material(&RawMaterialDraft::new("RM-001", "Silicone oil", MaterialType::Polymer))
            .unwrap();
        assert_eq!(again.id.get(), 2);
    }

    #[test]
    fn test_update_keeps_created_at_and_checks_codes() {
        let (store, rm, _, _) = seeded();
        let other = store
            .insert_raw_material(&RawMaterialDraft::new("RM-002", "Crosslinker", MaterialType::Additive))
            .unwrap();

        let mut draft = RawMaterialDraft::from(&other);
        draft.code = rm.code.clone();
        let err = store.update_raw_material(other.id, &draft).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        let mut draft = RawMaterialDraft::from(&rm);
        draft.name = "Hydroxyl silicone oil".to_string();
        let updated = store.update_raw_material(rm.id, &draft).unwrap().unwrap();
        assert_eq!(updated.created_at, rm.created_at);
        assert_eq!(updated.code, "RM-001");
    }

    #[test]
    fn test_missing_references_are_rejected() {
        let (store, rm, int, formula) = seeded();
        let err = store
            .insert_ingredient(IntermediateId::new(99), &IngredientDraft::new(rm.id, 1.0))
            .unwrap_err();
        assert_eq!(err.to_string(), "intermediate not found: 99");

        let err = store
            .insert_ingredient(int.id, &IngredientDraft::new(RawMaterialId::new(98), 1.0))
            .unwrap_err();
        assert_eq!(err.to_string(), "raw_material not found: 98");

        let err = store
            .insert_component(formula.id, &ComponentDraft::new(IntermediateId::new(99), 1.0))
            .unwrap_err();
        assert_eq!(err.to_string(), "intermediate not found: 99");

        store.insert_ingredient(int.id, &IngredientDraft::new(rm.id, 1.0)).unwrap();
        let err = store
            .insert_ingredient(int.id, &IngredientDraft::new(rm.id, 2.0))
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_delete_intermediate_cascades() {
        let (store, rm, int, formula) = seeded();
        store.insert_ingredient(int.id, &IngredientDraft::new(rm.id, 100.0)).unwrap();
        store.insert_component(formula.id, &ComponentDraft::new(int.id, 90.0)).unwrap();
        store.insert_component(formula.id, &ComponentDraft::new(rm.id, 10.0)).unwrap();

        assert!(store.delete_intermediate(int.id).unwrap());
        assert!(store.all_ingredients().unwrap().is_empty());
        let remaining = store.components_of(formula.id).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].component, Component::from(rm.id));
        assert!(!store.delete_intermediate(int.id).unwrap());
    }

    #[test]
    fn test_failed_import_leaves_state_untouched() {
        let (store, _, _, _) = seeded();
        let before = store.counts().unwrap();
        let bundle: GraphBundle = serde_json::from_value(serde_json::json!({
            "raw_materials": [{"code": "RM-900", "name": "Extra", "material_type": "other"}],
            "intermediates": [{
                "code": "INT-900", "name": "Broken", "intermediate_type": "other",
                "composition": [{"raw_material": "RM-404", "weight_ratio": 1.0}]
            }]
        }))
        .unwrap();

        let err = store.import_bundle(&bundle).unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "raw_material", .. }));
        assert_eq!(store.counts().unwrap(), before);
        assert!(store.find_raw_material("RM-900").unwrap().is_none());
    }
}
