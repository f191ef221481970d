//! Raw materials: the first tier of the graph.

use crate::Result;
use crate::models::validation::{self, CODE_MAX_LEN, NAME_MAX_LEN};
use crate::models::{MaterialType, PropertyMap, RawMaterialId, double_option};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A purchasable base material such as a silicone oil or a filler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMaterial {
    /// Surrogate id.
    pub id: RawMaterialId,
    /// Unique business code, e.g. `RM-001`.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Systematic chemical name.
    pub chemical_name: String,
    /// CAS registry number, empty when unknown.
    pub cas_number: String,
    /// Classification.
    pub material_type: MaterialType,
    /// Molecular formula.
    pub molecular_formula: String,
    /// Molecular weight in g/mol.
    pub molecular_weight: Option<f64>,
    /// Density in g/cm³.
    pub density: Option<f64>,
    /// Viscosity in Pa·s.
    pub viscosity: Option<f64>,
    /// Supplier name.
    pub supplier: String,
    /// Unit price.
    pub unit_price: Option<f64>,
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

/// Field values for creating or rewriting a raw material.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMaterialDraft {
    /// Unique business code.
    #[serde(default)]
    pub code: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Systematic chemical name.
    #[serde(default)]
    pub chemical_name: String,
    /// CAS registry number.
    #[serde(default)]
    pub cas_number: String,
    /// Classification.
    pub material_type: MaterialType,
    /// Molecular formula.
    #[serde(default)]
    pub molecular_formula: String,
    /// Molecular weight in g/mol.
    #[serde(default)]
    pub molecular_weight: Option<f64>,
    /// Density in g/cm³.
    #[serde(default)]
    pub density: Option<f64>,
    /// Viscosity in Pa·s.
    #[serde(default)]
    pub viscosity: Option<f64>,
    /// Supplier name.
    #[serde(default)]
    pub supplier: String,
    /// Unit price.
    #[serde(default)]
    pub unit_price: Option<f64>,
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

impl RawMaterialDraft {
    /// Creates a draft with the required fields set.
    #[must_use]
    pub fn new(code: impl Into<String>, name: impl Into<String>, material_type: MaterialType) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            material_type,
            ..Self::default()
        }
    }

    /// Validates every field.
    pub fn validate(&self) -> Result<()> {
        validation::required_text("code", &self.code, CODE_MAX_LEN)?;
        validation::required_text("name", &self.name, NAME_MAX_LEN)?;
        validation::bounded_text("chemical_name", &self.chemical_name, 300)?;
        validation::bounded_text("cas_number", &self.cas_number, 50)?;
        validation::cas_number(&self.cas_number)?;
        validation::bounded_text("molecular_formula", &self.molecular_formula, 200)?;
        validation::bounded_text("supplier", &self.supplier, 200)?;
        validation::finite("molecular_weight", self.molecular_weight)?;
        validation::finite("density", self.density)?;
        validation::finite("viscosity", self.viscosity)?;
        validation::finite("unit_price", self.unit_price)?;
        validation::properties("properties", &self.properties)
    }
}

impl From<&RawMaterial> for RawMaterialDraft {
    fn from(m: &RawMaterial) -> Self {
        Self {
            code: m.code.clone(),
            name: m.name.clone(),
            chemical_name: m.chemical_name.clone(),
            cas_number: m.cas_number.clone(),
            material_type: m.material_type,
            molecular_formula: m.molecular_formula.clone(),
            molecular_weight: m.molecular_weight,
            density: m.density,
            viscosity: m.viscosity,
            supplier: m.supplier.clone(),
            unit_price: m.unit_price,
            properties: m.properties.clone(),
            description: m.description.clone(),
            created_by: m.created_by.clone(),
        }
    }
}

/// Partial update of a raw material.
///
/// Fields mirror [`RawMaterialDraft`]. Absent fields are left alone; for
/// nullable fields an explicit `null` clears the stored value.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawMaterialPatch {
    pub code: Option<String>,
    pub name: Option<String>,
    pub chemical_name: Option<String>,
    pub cas_number: Option<String>,
    pub material_type: Option<MaterialType>,
    pub molecular_formula: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub molecular_weight: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub density: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub viscosity: Option<Option<f64>>,
    pub supplier: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub unit_price: Option<Option<f64>>,
    pub properties: Option<PropertyMap>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub created_by: Option<Option<String>>,
}

impl RawMaterialPatch {
    /// Applies the patch on top of a draft.
    pub fn apply_to(self, draft: &mut RawMaterialDraft) {
        patch_fields!(self, draft, {
            code, name, chemical_name, cas_number, material_type, molecular_formula,
            molecular_weight, density, viscosity, supplier, unit_price, properties,
            description, created_by,
        });
    }
}
