//! Formulas (third tier) and their components.

use crate::{Error, Result};
use crate::models::intermediate::default_addition_order;
use crate::models::validation::{self, CODE_MAX_LEN, NAME_MAX_LEN};
use crate::models::{
    ApplicationType, ComponentId, FormulaId, FormulaStatus, IntermediateId, PropertyMap,
    RawMaterialId, double_option,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recipe combining intermediates and raw materials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    /// Surrogate id.
    pub id: FormulaId,
    /// Unique business code, e.g. `F-2024-001`.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Free-form version label.
    pub version: String,
    /// Lifecycle status.
    pub status: FormulaStatus,
    /// Intended application.
    pub application_type: ApplicationType,
    /// Mixing temperature, °C.
    pub mixing_temperature: Option<f64>,
    /// Mixing time, minutes.
    pub mixing_time: Option<f64>,
    /// Curing temperature, °C.
    pub curing_temperature: Option<f64>,
    /// Curing time, hours.
    pub curing_time: Option<f64>,
    /// Step-by-step process.
    pub process_description: String,
    /// Handling precautions.
    pub precautions: String,
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

/// Field values for creating or rewriting a formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaDraft {
    /// Unique business code.
    #[serde(default)]
    pub code: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Version label, `1.0` unless given.
    #[serde(default = "default_version")]
    pub version: String,
    /// Lifecycle status, `draft` unless given.
    #[serde(default)]
    pub status: FormulaStatus,
    /// Intended application.
    pub application_type: ApplicationType,
    /// Mixing temperature, °C.
    #[serde(default)]
    pub mixing_temperature: Option<f64>,
    /// Mixing time, minutes.
    #[serde(default)]
    pub mixing_time: Option<f64>,
    /// Curing temperature, °C.
    #[serde(default)]
    pub curing_temperature: Option<f64>,
    /// Curing time, hours.
    #[serde(default)]
    pub curing_time: Option<f64>,
    /// Step-by-step process.
    #[serde(default)]
    pub process_description: String,
    /// Handling precautions.
    #[serde(default)]
    pub precautions: String,
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

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for FormulaDraft {
    fn default() -> Self {
        Self {
            code: String::new(),
            name: String::new(),
            version: default_version(),
            status: FormulaStatus::default(),
            application_type: ApplicationType::default(),
            mixing_temperature: None,
            mixing_time: None,
            curing_temperature: None,
            curing_time: None,
            process_description: String::new(),
            precautions: String::new(),
            properties: PropertyMap::new(),
            description: String::new(),
            created_by: None,
        }
    }
}

impl FormulaDraft {
    /// Creates a draft with the required fields set.
    #[must_use]
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        application_type: ApplicationType,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            application_type,
            ..Self::default()
        }
    }

    /// Sets the status.
    #[must_use]
    pub const fn with_status(mut self, status: FormulaStatus) -> Self {
        self.status = status;
        self
    }

    /// Validates every field.
    pub fn validate(&self) -> Result<()> {
        validation::required_text("code", &self.code, CODE_MAX_LEN)?;
        validation::required_text("name", &self.name, NAME_MAX_LEN)?;
        validation::bounded_text("version", &self.version, 20)?;
        validation::finite("mixing_temperature", self.mixing_temperature)?;
        validation::finite("mixing_time", self.mixing_time)?;
        validation::finite("curing_temperature", self.curing_temperature)?;
        validation::finite("curing_time", self.curing_time)?;
        validation::properties("properties", &self.properties)
    }
}

impl From<&Formula> for FormulaDraft {
    fn from(f: &Formula) -> Self {
        Self {
            code: f.code.clone(),
            name: f.name.clone(),
            version: f.version.clone(),
            status: f.status,
            application_type: f.application_type,
            mixing_temperature: f.mixing_temperature,
            mixing_time: f.mixing_time,
            curing_temperature: f.curing_temperature,
            curing_time: f.curing_time,
            process_description: f.process_description.clone(),
            precautions: f.precautions.clone(),
            properties: f.properties.clone(),
            description: f.description.clone(),
            created_by: f.created_by.clone(),
        }
    }
}

/// Partial update of a formula. Fields mirror [`FormulaDraft`].
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormulaPatch {
    pub code: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub status: Option<FormulaStatus>,
    pub application_type: Option<ApplicationType>,
    #[serde(default, deserialize_with = "double_option")]
    pub mixing_temperature: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub mixing_time: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub curing_temperature: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub curing_time: Option<Option<f64>>,
    pub process_description: Option<String>,
    pub precautions: Option<String>,
    pub properties: Option<PropertyMap>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub created_by: Option<Option<String>>,
}

impl FormulaPatch {
    /// Applies the patch on top of a draft.
    pub fn apply_to(self, draft: &mut FormulaDraft) {
        patch_fields!(self, draft, {
            code, name, version, status, application_type, mixing_temperature,
            mixing_time, curing_temperature, curing_time, process_description,
            precautions, properties, description, created_by,
        });
    }
}

/// The child side of a formula component: exactly one intermediate or one
/// raw material.
///
/// Serialized with a `component_type` tag:
/// `{"component_type": "intermediate", "intermediate": 3}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "component_type", rename_all = "snake_case")]
pub enum Component {
    /// An intermediate.
    Intermediate {
        /// The referenced intermediate.
        intermediate: IntermediateId,
    },
    /// A raw material added directly.
    RawMaterial {
        /// The referenced raw material.
        raw_material: RawMaterialId,
    },
}

impl Component {
    /// Returns the `component_type` wire value.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Intermediate { .. } => "intermediate",
            Self::RawMaterial { .. } => "raw_material",
        }
    }

    /// Returns the intermediate id if this is an intermediate component.
    #[must_use]
    pub const fn intermediate(&self) -> Option<IntermediateId> {
        match self {
            Self::Intermediate { intermediate } => Some(*intermediate),
            Self::RawMaterial { .. } => None,
        }
    }

    /// Returns the raw material id if this is a direct raw material component.
    #[must_use]
    pub const fn raw_material(&self) -> Option<RawMaterialId> {
        match self {
            Self::RawMaterial { raw_material } => Some(*raw_material),
            Self::Intermediate { .. } => None,
        }
    }

    /// The not-found error for the referenced row.
    #[must_use]
    pub fn not_found(&self) -> Error {
        match self {
            Self::Intermediate { intermediate } => Error::not_found("intermediate", intermediate),
            Self::RawMaterial { raw_material } => Error::not_found("raw_material", raw_material),
        }
    }
}

impl From<IntermediateId> for Component {
    fn from(intermediate: IntermediateId) -> Self {
        Self::Intermediate { intermediate }
    }
}

impl From<RawMaterialId> for Component {
    fn from(raw_material: RawMaterialId) -> Self {
        Self::RawMaterial { raw_material }
    }
}

/// One component row of a formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaComponent {
    /// Row id.
    pub id: ComponentId,
    /// The formula being composed.
    pub formula: FormulaId,
    /// What is added.
    #[serde(flatten)]
    pub component: Component,
    /// Share by weight, in percent.
    pub weight_ratio: f64,
    /// Position in the addition sequence.
    pub addition_order: i32,
    /// Handling notes.
    pub notes: String,
}

/// Request to add a component to a formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDraft {
    /// What to add.
    #[serde(flatten)]
    pub component: Component,
    /// Share by weight, in percent.
    pub weight_ratio: f64,
    /// Position in the addition sequence.
    #[serde(default = "default_addition_order")]
    pub addition_order: i32,
    /// Handling notes.
    #[serde(default)]
    pub notes: String,
}

impl ComponentDraft {
    /// Creates a draft with the default addition order.
    #[must_use]
    pub fn new(component: impl Into<Component>, weight_ratio: f64) -> Self {
        Self {
            component: component.into(),
            weight_ratio,
            addition_order: 1,
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
        validation::weight_ratio(self.weight_ratio)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_component_draft_from_tagged_json() {
        let draft: ComponentDraft = serde_json::from_str(
            r#"{"component_type": "intermediate", "intermediate": 2, "weight_ratio": 50.0}"#,
        )
        .unwrap();
        assert_eq!(draft.component, Component::from(IntermediateId::new(2)));
        assert_eq!(draft.addition_order, 1);

        let draft: ComponentDraft = serde_json::from_str(
            r#"{"component_type": "raw_material", "raw_material": 6, "weight_ratio": 5.0, "addition_order": 3}"#,
        )
        .unwrap();
        assert_eq!(draft.component.raw_material(), Some(RawMaterialId::new(6)));
        assert_eq!(draft.addition_order, 3);
    }

    #[test]
    fn test_component_requires_matching_reference() {
        let result: std::result::Result<ComponentDraft, _> = serde_json::from_str(
            r#"{"component_type": "intermediate", "raw_material": 6, "weight_ratio": 5.0}"#,
        );
        assert!(result.is_err());

        let result: std::result::Result<ComponentDraft, _> =
            serde_json::from_str(r#"{"intermediate": 2, "weight_ratio": 5.0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_component_serializes_flat() {
        let row = FormulaComponent {
            id: ComponentId::new(1),
            formula: FormulaId::new(9),
            component: Component::from(RawMaterialId::new(6)),
            weight_ratio: 5.0,
            addition_order: 3,
            notes: String::new(),
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["component_type"], "raw_material");
        assert_eq!(value["raw_material"], 6);
        assert!(value.get("intermediate").is_none());
    }

    #[test]
    fn test_draft_defaults() {
        let draft = FormulaDraft::new("F-1", "Sealant", ApplicationType::Sealant);
        assert_eq!(draft.version, "1.0");
        assert_eq!(draft.status, FormulaStatus::Draft);
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_draft_json_requires_application_type() {
        let err = serde_json::from_str::<FormulaDraft>(r#"{"code": "F-1", "name": "Sealant"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("application_type"));

        let draft: FormulaDraft = serde_json::from_str(
            r#"{"code": "F-1", "name": "Sealant", "application_type": "sealant"}"#,
        )
        .unwrap();
        assert_eq!(draft.version, "1.0");
        assert_eq!(draft.status, FormulaStatus::Draft);
    }
}
