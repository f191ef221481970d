//! Intermediates (second tier) and their raw-material ingredients.

use crate::Result;
use crate::models::validation::{self, CODE_MAX_LEN, NAME_MAX_LEN};
use crate::models::{
    IngredientId, IntermediateId, IntermediateType, PropertyMap, RawMaterialId, double_option,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A pre-processed material made from raw materials, e.g. a silane-terminated
/// prepolymer or a filler masterbatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intermediate {
    /// Surrogate id.
    pub id: IntermediateId,
    /// Unique business code, e.g. `INT-001`.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Classification.
    pub intermediate_type: IntermediateType,
    /// How it is prepared.
    pub preparation_method: String,
    /// Reaction parameters (temperature, time, catalyst).
    pub reaction_conditions: PropertyMap,
    /// Viscosity in Pa·s.
    pub viscosity: Option<f64>,
    /// Solid content in percent.
    pub solid_content: Option<f64>,
    /// Free-form attributes.
    pub properties: PropertyMap,
    /// Notes.
    pub description: String,
    /// Author, if recorded.
    pub created_by: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Field values for creating or rewriting an intermediate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntermediateDraft {
    /// Unique business code.
    #[serde(default)]
    pub code: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Classification.
    pub intermediate_type: IntermediateType,
    /// How it is prepared.
    #[serde(default)]
    pub preparation_method: String,
    /// Reaction parameters.
    #[serde(default)]
    pub reaction_conditions: PropertyMap,
    /// Viscosity in Pa·s.
    #[serde(default)]
    pub viscosity: Option<f64>,
    /// Solid content in percent.
    #[serde(default)]
    pub solid_content: Option<f64>,
    /// Free-form attributes.
    #[serde(default)]
    pub properties: PropertyMap,
    /// Notes.
    #[serde(default)]
    pub description: String,
    /// Author.
    #[serde(default)]
    pub created_by: Option<String>,
}

impl IntermediateDraft {
    /// Creates a draft with the required fields set.
    #[must_use]
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        intermediate_type: IntermediateType,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            intermediate_type,
            ..Self::default()
        }
    }

    /// Validates every field.
    pub fn validate(&self) -> Result<()> {
        validation::required_text("code", &self.code, CODE_MAX_LEN)?;
        validation::required_text("name", &self.name, NAME_MAX_LEN)?;
        validation::finite("viscosity", self.viscosity)?;
        validation::finite("solid_content", self.solid_content)?;
        validation::properties("reaction_conditions", &self.reaction_conditions)?;
        validation::properties("properties", &self.properties)
    }
}

impl From<&Intermediate> for IntermediateDraft {
    fn from(i: &Intermediate) -> Self {
        Self {
            code: i.code.clone(),
            name: i.name.clone(),
            intermediate_type: i.intermediate_type,
            preparation_method: i.preparation_method.clone(),
            reaction_conditions: i.reaction_conditions.clone(),
            viscosity: i.viscosity,
            solid_content: i.solid_content,
            properties: i.properties.clone(),
            description: i.description.clone(),
            created_by: i.created_by.clone(),
        }
    }
}

/// Partial update of an intermediate. Fields mirror [`IntermediateDraft`].
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntermediatePatch {
    pub code: Option<String>,
    pub name: Option<String>,
    pub intermediate_type: Option<IntermediateType>,
    pub preparation_method: Option<String>,
    pub reaction_conditions: Option<PropertyMap>,
    #[serde(default, deserialize_with = "double_option")]
    pub viscosity: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub solid_content: Option<Option<f64>>,
    pub properties: Option<PropertyMap>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub created_by: Option<Option<String>>,
}

impl IntermediatePatch {
    /// Applies the patch on top of a draft.
    pub fn apply_to(self, draft: &mut IntermediateDraft) {
        patch_fields!(self, draft, {
            code, name, intermediate_type, preparation_method, reaction_conditions,
            viscosity, solid_content, properties, description, created_by,
        });
    }
}

/// One raw material inside an intermediate.
///
/// The `(intermediate, raw_material)` pair is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    /// Row id.
    pub id: IngredientId,
    /// The intermediate being composed.
    pub intermediate: IntermediateId,
    /// The raw material added.
    pub raw_material: RawMaterialId,
    /// Share by weight, in percent.
    pub weight_ratio: f64,
    /// Position in the addition sequence.
    pub addition_order: i32,
    /// Temperature at addition, °C.
    pub addition_temperature: Option<f64>,
    /// Handling notes.
    pub notes: String,
}

/// Request to add a raw material to an intermediate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientDraft {
    /// The raw material to add.
    pub raw_material: RawMaterialId,
    /// Share by weight, in percent.
    pub weight_ratio: f64,
    /// Position in the addition sequence.
    #[serde(default = "default_addition_order")]
    pub addition_order: i32,
    /// Temperature at addition, °C.
    #[serde(default)]
    pub addition_temperature: Option<f64>,
    /// Handling notes.
    #[serde(default)]
    pub notes: String,
}

impl IngredientDraft {
    /// Creates a draft with the default addition order.
    #[must_use]
    pub const fn new(raw_material: RawMaterialId, weight_ratio: f64) -> Self {
        Self {
            raw_material,
            weight_ratio,
            addition_order: 1,
            addition_temperature: None,
            notes: String::new(),
        }
    }

    /// Sets the addition order.
    #[must_use]
    pub const fn with_order(mut self, addition_order: i32) -> Self {
        self.addition_order = addition_order;
        self
    }

    /// Validates the numeric fields.
    pub fn validate(&self) -> Result<()> {
        validation::weight_ratio(self.weight_ratio)?;
        validation::finite("addition_temperature", self.addition_temperature)
    }
}

pub(crate) const fn default_addition_order() -> i32 {
    1
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_ingredient_defaults_from_json() {
        let draft: IngredientDraft =
            serde_json::from_str(r#"{"raw_material": 4, "weight_ratio": 28.0}"#).unwrap();
        assert_eq!(draft.raw_material, RawMaterialId::new(4));
        assert_eq!(draft.addition_order, 1);
        assert!(draft.addition_temperature.is_none());
        assert!(draft.notes.is_empty());
    }

    #[test]
    fn test_ingredient_rejects_negative_ratio() {
        let draft = IngredientDraft::new(RawMaterialId::new(1), -5.0);
        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_ratios_above_one_hundred_are_allowed() {
        let draft = IngredientDraft::new(RawMaterialId::new(1), 140.0);
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_patch_clears_viscosity() {
        let mut draft = IntermediateDraft::new("INT-001", "Prepolymer A", IntermediateType::Prepolymer);
        draft.viscosity = Some(8000.0);
        let patch: IntermediatePatch = serde_json::from_str(r#"{"viscosity": null}"#).unwrap();
        patch.apply_to(&mut draft);
        assert_eq!(draft.viscosity, None);
        assert_eq!(draft.code, "INT-001");
    }
}
