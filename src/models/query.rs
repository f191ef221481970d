//! Filters, recommendation criteria and aggregate results.

use crate::models::{
    ApplicationType, Formula, FormulaComponent, FormulaId, FormulaStatus, Ingredient,
    Intermediate, IntermediateType, MaterialType, Performance, RawMaterial, TestMethod,
};
use serde::{Deserialize, Serialize};

/// Case-insensitive substring match.
fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// List filter for raw materials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawMaterialFilter {
    /// Exact material type.
    pub material_type: Option<MaterialType>,
    /// Substring of name, code, chemical name or CAS number.
    pub search: Option<String>,
    /// Substring of the supplier.
    pub supplier: Option<String>,
}

impl RawMaterialFilter {
    /// Returns `true` if the raw material passes every set criterion.
    #[must_use]
    pub fn matches(&self, m: &RawMaterial) -> bool {
        if self.material_type.is_some_and(|t| t != m.material_type) {
            return false;
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty())
            && ![&m.name, &m.code, &m.chemical_name, &m.cas_number]
                .iter()
                .any(|field| contains_ci(field, search))
        {
            return false;
        }
        self.supplier
            .as_deref()
            .filter(|s| !s.is_empty())
            .is_none_or(|s| contains_ci(&m.supplier, s))
    }
}

/// List filter for intermediates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntermediateFilter {
    /// Exact intermediate type.
    pub intermediate_type: Option<IntermediateType>,
    /// Substring of name or code.
    pub search: Option<String>,
}

impl IntermediateFilter {
    /// Returns `true` if the intermediate passes every set criterion.
    #[must_use]
    pub fn matches(&self, i: &Intermediate) -> bool {
        if self.intermediate_type.is_some_and(|t| t != i.intermediate_type) {
            return false;
        }
        self.search
            .as_deref()
            .filter(|s| !s.is_empty())
            .is_none_or(|s| contains_ci(&i.name, s) || contains_ci(&i.code, s))
    }
}

/// List filter for formulas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormulaFilter {
    /// Exact status.
    pub status: Option<FormulaStatus>,
    /// Exact application type.
    pub application_type: Option<ApplicationType>,
    /// Substring of name or code.
    pub search: Option<String>,
}

impl FormulaFilter {
    /// Returns `true` if the formula passes every set criterion.
    #[must_use]
    pub fn matches(&self, f: &Formula) -> bool {
        if self.status.is_some_and(|s| s != f.status) {
            return false;
        }
        if self.application_type.is_some_and(|a| a != f.application_type) {
            return false;
        }
        self.search
            .as_deref()
            .filter(|s| !s.is_empty())
            .is_none_or(|s| contains_ci(&f.name, s) || contains_ci(&f.code, s))
    }
}

/// List filter for performance records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceFilter {
    /// Owning formula.
    pub formula: Option<FormulaId>,
    /// Exact test method.
    pub test_method: Option<TestMethod>,
    /// Minimum overall rating; unrated records never pass.
    pub rating_min: Option<u8>,
}

impl PerformanceFilter {
    /// Returns `true` if the record passes every set criterion.
    #[must_use]
    pub fn matches(&self, p: &Performance) -> bool {
        if self.formula.is_some_and(|f| f != p.formula) {
            return false;
        }
        if self.test_method.is_some_and(|m| m != p.test_method) {
            return false;
        }
        self.rating_min
            .is_none_or(|min| p.overall_rating.is_some_and(|r| r >= min))
    }
}

/// Thresholds for [`RecommendationService::recommend`](crate::RecommendationService::recommend).
///
/// Each threshold is checked independently: different test records of the
/// same formula may satisfy different thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendCriteria {
    /// Some record must reach at least this tensile strength.
    pub tensile_strength_min: Option<f64>,
    /// Some record must reach at least this elongation at break.
    pub elongation_min: Option<f64>,
    /// Some record must stay at or below this hardness.
    pub hardness_max: Option<f64>,
    /// Restrict to one application type.
    pub application_type: Option<ApplicationType>,
}

impl RecommendCriteria {
    /// Returns `true` if the formula's test records satisfy every threshold.
    #[must_use]
    pub fn satisfied_by(&self, performances: &[Performance]) -> bool {
        any_record(performances, self.tensile_strength_min, |p| p.tensile_strength, |v, t| v >= t)
            && any_record(performances, self.elongation_min, |p| p.elongation_at_break, |v, t| {
                v >= t
            })
            && any_record(performances, self.hardness_max, |p| p.hardness, |v, t| v <= t)
    }
}

/// `true` when no threshold is set, or some record's measurement passes it.
///
/// A zero threshold counts as unset.
fn any_record(
    records: &[Performance],
    threshold: Option<f64>,
    measurement: impl Fn(&Performance) -> Option<f64>,
    passes: impl Fn(f64, f64) -> bool,
) -> bool {
    threshold.filter(|t| *t != 0.0).is_none_or(|t| {
        records
            .iter()
            .filter_map(measurement)
            .any(|v| passes(v, t))
    })
}

/// Recommended formulas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Number of formulas.
    pub count: usize,
    /// Matching validated formulas, ordered by id.
    pub formulas: Vec<Formula>,
}

impl From<Vec<Formula>> for Recommendation {
    fn from(formulas: Vec<Formula>) -> Self {
        Self {
            count: formulas.len(),
            formulas,
        }
    }
}

/// Aggregates over performance records.
///
/// Averages and extremes skip missing values and are `None` when no value
/// exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStatistics {
    /// Mean tensile strength.
    pub avg_tensile_strength: Option<f64>,
    /// Highest tensile strength.
    pub max_tensile_strength: Option<f64>,
    /// Lowest tensile strength.
    pub min_tensile_strength: Option<f64>,
    /// Mean elongation at break.
    pub avg_elongation: Option<f64>,
    /// Mean hardness.
    pub avg_hardness: Option<f64>,
    /// Mean overall rating.
    pub avg_rating: Option<f64>,
    /// Number of records.
    pub total_tests: usize,
}

impl PerformanceStatistics {
    /// Aggregates the given records.
    #[must_use]
    pub fn from_records(records: &[Performance]) -> Self {
        let tensile: Vec<f64> = records.iter().filter_map(|p| p.tensile_strength).collect();
        let elongation: Vec<f64> = records.iter().filter_map(|p| p.elongation_at_break).collect();
        let hardness: Vec<f64> = records.iter().filter_map(|p| p.hardness).collect();
        let ratings: Vec<f64> = records
            .iter()
            .filter_map(|p| p.overall_rating.map(f64::from))
            .collect();

        Self {
            avg_tensile_strength: mean(&tensile),
            max_tensile_strength: tensile.iter().copied().reduce(f64::max),
            min_tensile_strength: tensile.iter().copied().reduce(f64::min),
            avg_elongation: mean(&elongation),
            avg_hardness: mean(&hardness),
            avg_rating: mean(&ratings),
            total_tests: records.len(),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// A composition row decorated with the child's code and name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositionEntry<T> {
    /// The stored row.
    #[serde(flatten)]
    pub row: T,
    /// Code of the child entity.
    pub component_code: String,
    /// Name of the child entity.
    pub component_name: String,
}

/// An intermediate's ingredient with raw material code and name.
pub type IngredientEntry = CompositionEntry<Ingredient>;
/// A formula component with the child's code and name.
pub type ComponentEntry = CompositionEntry<FormulaComponent>;
