//! Row-level write operations shared by single inserts and bundle imports.
//!
//! Each backend implements [`GraphWriter`] once over its transactional unit
//! (an open `SQLite` connection or transaction, or the in-memory state
//! snapshot). Store methods and [`write_bundle`] then share the same code
//! path, so a bundle enforces exactly the rules a single insert does.

use crate::models::{
    BundleComponent, Component, ComponentDraft, ComponentKind, Formula, FormulaComponent,
    FormulaDraft, FormulaId, GraphBundle, ImportSummary, Ingredient, IngredientDraft,
    Intermediate, IntermediateDraft, IntermediateId, Performance, PerformanceDraft, RawMaterial,
    RawMaterialDraft, RawMaterialId,
};
use crate::{Error, Result};

/// Insert operations over one unit of work.
pub trait GraphWriter {
    /// Inserts a raw material.
    fn insert_raw_material(&mut self, draft: &RawMaterialDraft) -> Result<RawMaterial>;

    /// Inserts an intermediate.
    fn insert_intermediate(&mut self, draft: &IntermediateDraft) -> Result<Intermediate>;

    /// Inserts a formula.
    fn insert_formula(&mut self, draft: &FormulaDraft) -> Result<Formula>;

    /// Inserts a test record for an existing formula.
    fn insert_performance(
        &mut self,
        formula: FormulaId,
        draft: &PerformanceDraft,
    ) -> Result<Performance>;

    /// Links a raw material into an intermediate.
    fn insert_ingredient(
        &mut self,
        intermediate: IntermediateId,
        draft: &IngredientDraft,
    ) -> Result<Ingredient>;

    /// Links an intermediate or raw material into a formula.
    fn insert_component(
        &mut self,
        formula: FormulaId,
        draft: &ComponentDraft,
    ) -> Result<FormulaComponent>;

    /// Resolves a raw material code.
    fn raw_material_id(&mut self, code: &str) -> Result<Option<RawMaterialId>>;

    /// Resolves an intermediate code.
    fn intermediate_id(&mut self, code: &str) -> Result<Option<IntermediateId>>;
}

/// Writes every row of a bundle through `writer`, tier by tier.
///
/// Stops at the first error; the caller is responsible for discarding the
/// unit of work in that case.
pub fn write_bundle<W: GraphWriter + ?Sized>(
    writer: &mut W,
    bundle: &GraphBundle,
) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for draft in &bundle.raw_materials {
        writer.insert_raw_material(draft)?;
        summary.raw_materials += 1;
    }

    for entry in &bundle.intermediates {
        let intermediate = writer.insert_intermediate(&entry.intermediate)?;
        summary.intermediates += 1;

        for ingredient in &entry.composition {
            let raw_material = writer
                .raw_material_id(&ingredient.raw_material)?
                .ok_or_else(|| Error::not_found("raw_material", &ingredient.raw_material))?;
            let draft = IngredientDraft {
                raw_material,
                weight_ratio: ingredient.weight_ratio,
                addition_order: ingredient.addition_order,
                addition_temperature: ingredient.addition_temperature,
                notes: ingredient.notes.clone(),
            };
            writer.insert_ingredient(intermediate.id, &draft)?;
            summary.ingredients += 1;
        }
    }

    for entry in &bundle.formulas {
        let formula = writer.insert_formula(&entry.formula)?;
        summary.formulas += 1;

        for component in &entry.composition {
            let draft = ComponentDraft {
                component: resolve_component(writer, component)?,
                weight_ratio: component.weight_ratio,
                addition_order: component.addition_order,
                notes: component.notes.clone(),
            };
            writer.insert_component(formula.id, &draft)?;
            summary.components += 1;
        }

        for performance in &entry.performances {
            writer.insert_performance(formula.id, performance)?;
            summary.performances += 1;
        }
    }

    Ok(summary)
}

fn resolve_component<W: GraphWriter + ?Sized>(
    writer: &mut W,
    component: &BundleComponent,
) -> Result<Component> {
    let code = component.code.as_str();
    match component.component_type {
        ComponentKind::Intermediate => writer
            .intermediate_id(code)?
            .map(Component::from)
            .ok_or_else(|| Error::not_found("intermediate", code)),
        ComponentKind::RawMaterial => writer
            .raw_material_id(code)?
            .map(Component::from)
            .ok_or_else(|| Error::not_found("raw_material", code)),
    }
}
