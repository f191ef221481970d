//! Self-contained graph documents for bulk import and export.
//!
//! Bundles reference entities by `code` rather than id, so a bundle exported
//! from one store can be imported into another.
//!
//! ```yaml
//! raw_materials:
//!   - { code: RM-001, name: Hydroxyl silicone oil, material_type: polymer }
//! intermediates:
//!   - code: INT-001
//!     name: Silane-terminated prepolymer
//!     intermediate_type: prepolymer
//!     composition:
//!       - { raw_material: RM-001, weight_ratio: 85.0 }
//! formulas:
//!   - code: F-2024-001
//!     name: General purpose sealant
//!     application_type: sealant
//!     composition:
//!       - { component_type: intermediate, code: INT-001, weight_ratio: 45.0 }
//!     performances:
//!       - { test_batch: B20241001, test_date: 2024-10-01, tensile_strength: 1.2 }
//! ```

use crate::Result;
use crate::models::intermediate::default_addition_order;
use crate::models::validation;
use crate::models::{FormulaDraft, IntermediateDraft, PerformanceDraft, RawMaterialDraft};
use serde::{Deserialize, Serialize};

/// A sub-graph keyed by entity code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphBundle {
    /// Raw materials to create.
    pub raw_materials: Vec<RawMaterialDraft>,
    /// Intermediates to create, with their ingredients.
    pub intermediates: Vec<IntermediateEntry>,
    /// Formulas to create, with components and test records.
    pub formulas: Vec<FormulaEntry>,
}

impl GraphBundle {
    /// Validates every draft in the bundle.
    ///
    /// Code references are resolved later, inside the import transaction.
    pub fn validate(&self) -> Result<()> {
        for draft in &self.raw_materials {
            draft.validate()?;
        }
        for entry in &self.intermediates {
            entry.intermediate.validate()?;
            for ingredient in &entry.composition {
                validation::required_text("raw_material", &ingredient.raw_material, 50)?;
                validation::weight_ratio(ingredient.weight_ratio)?;
                validation::finite("addition_temperature", ingredient.addition_temperature)?;
            }
        }
        for entry in &self.formulas {
            entry.formula.validate()?;
            for component in &entry.composition {
                validation::required_text("code", &component.code, 50)?;
                validation::weight_ratio(component.weight_ratio)?;
            }
            for performance in &entry.performances {
                performance.validate()?;
            }
        }
        Ok(())
    }

    /// Returns `true` if the bundle contains nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw_materials.is_empty() && self.intermediates.is_empty() && self.formulas.is_empty()
    }
}

/// An intermediate plus its ingredients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntermediateEntry {
    /// The intermediate's fields.
    #[serde(flatten)]
    pub intermediate: IntermediateDraft,
    /// Raw materials it is made of.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub composition: Vec<BundleIngredient>,
}

/// An ingredient referencing its raw material by code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleIngredient {
    /// Code of the raw material.
    pub raw_material: String,
    /// Share by weight, in percent.
    pub weight_ratio: f64,
    /// Position in the addition sequence.
    #[serde(default = "default_addition_order")]
    pub addition_order: i32,
    /// Temperature at addition, °C.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addition_temperature: Option<f64>,
    /// Handling notes.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

/// A formula plus its components and test records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaEntry {
    /// The formula's fields.
    #[serde(flatten)]
    pub formula: FormulaDraft,
    /// What it is made of.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub composition: Vec<BundleComponent>,
    /// Test records.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub performances: Vec<PerformanceDraft>,
}

/// Which tier a [`BundleComponent`] code refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    /// An intermediate code.
    Intermediate,
    /// A raw material code.
    RawMaterial,
}

/// A formula component referencing its child by code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleComponent {
    /// Tier of the child.
    pub component_type: ComponentKind,
    /// Code of the child.
    pub code: String,
    /// Share by weight, in percent.
    pub weight_ratio: f64,
    /// Position in the addition sequence.
    #[serde(default = "default_addition_order")]
    pub addition_order: i32,
    /// Handling notes.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

/// Rows created by one import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Raw materials created.
    pub raw_materials: usize,
    /// Intermediates created.
    pub intermediates: usize,
    /// Ingredient rows created.
    pub ingredients: usize,
    /// Formulas created.
    pub formulas: usize,
    /// Formula component rows created.
    pub components: usize,
    /// Performance records created.
    pub performances: usize,
}

impl ImportSummary {
    /// Total rows created.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.raw_materials
            + self.intermediates
            + self.ingredients
            + self.formulas
            + self.components
            + self.performances
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use crate::models::{ApplicationType, IntermediateType};

    const SAMPLE: &str = r"
raw_materials:
  - { code: RM-001, name: Hydroxyl silicone oil, material_type: polymer, cas_number: 70131-67-8 }
intermediates:
  - code: INT-001
    name: Prepolymer A
    intermediate_type: prepolymer
    reaction_conditions: { temperature: 80-90 C, time: 2-3h }
    composition:
      - { raw_material: RM-001, weight_ratio: 85 }
formulas:
  - code: F-1
    name: Sealant
    application_type: sealant
    composition:
      - { component_type: intermediate, code: INT-001, weight_ratio: 95.0 }
    performances:
      - { test_batch: B1, test_date: 2024-10-01, tensile_strength: 1.2, overall_rating: 4 }
";

    #[test]
    fn test_parse_yaml_bundle() {
        let bundle: GraphBundle = serde_yaml_ng::from_str(SAMPLE).unwrap();
        assert_eq!(bundle.raw_materials.len(), 1);
        let intermediate = &bundle.intermediates[0];
        assert_eq!(intermediate.intermediate.intermediate_type, IntermediateType::Prepolymer);
        assert_eq!(intermediate.composition[0].weight_ratio, 85.0);
        assert_eq!(intermediate.composition[0].addition_order, 1);
        let formula = &bundle.formulas[0];
        assert_eq!(formula.formula.application_type, ApplicationType::Sealant);
        assert_eq!(formula.formula.version, "1.0");
        assert_eq!(formula.composition[0].component_type, ComponentKind::Intermediate);
        assert_eq!(formula.performances[0].overall_rating, Some(4));
        assert!(bundle.validate().is_ok());
    }

    #[test]
    fn test_validate_catches_nested_errors() {
        let mut bundle: GraphBundle = serde_yaml_ng::from_str(SAMPLE).unwrap();
        bundle.formulas[0].performances[0].overall_rating = Some(9);
        assert!(bundle.validate().is_err());
    }

    #[test]
    fn test_empty_bundle() {
        let bundle: GraphBundle = serde_json::from_str("{}").unwrap();
        assert!(bundle.is_empty());
        assert_eq!(ImportSummary::default().total(), 0);
    }
}
