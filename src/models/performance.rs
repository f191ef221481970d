//! Performance test records (fourth tier).

use crate::models::validation;
use crate::models::{FormulaId, PerformanceId, PropertyMap, TestMethod, double_option};
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lowest allowed `overall_rating`.
pub const RATING_MIN: u8 = 1;
/// Highest allowed `overall_rating`.
pub const RATING_MAX: u8 = 5;

/// One lab test of one formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    /// Surrogate id.
    pub id: PerformanceId,
    /// The tested formula.
    pub formula: FormulaId,
    /// Batch label, e.g. `B20241001`.
    pub test_batch: String,
    /// Day of the test.
    pub test_date: NaiveDate,
    /// Standard followed.
    pub test_method: TestMethod,
    /// Ambient conditions.
    pub test_conditions: PropertyMap,
    /// Tensile strength, MPa.
    pub tensile_strength: Option<f64>,
    /// Elongation at break, percent.
    pub elongation_at_break: Option<f64>,
    /// Tear strength, N/mm.
    pub tear_strength: Option<f64>,
    /// Shore A hardness.
    pub hardness: Option<f64>,
    /// Adhesion strength, MPa.
    pub adhesion_strength: Option<f64>,
    /// Qualitative weathering result.
    pub weather_resistance: String,
    /// Qualitative water resistance result.
    pub water_resistance: String,
    /// Upper service temperature, °C.
    pub heat_resistance_temp: Option<f64>,
    /// Lower service temperature, °C.
    pub cold_resistance_temp: Option<f64>,
    /// Viscosity, Pa·s.
    pub viscosity: Option<f64>,
    /// Density, g/cm³.
    pub density: Option<f64>,
    /// Tack-free time, hours.
    pub tack_free_time: Option<f64>,
    /// Full cure time, hours.
    pub full_cure_time: Option<f64>,
    /// Other measurements.
    pub additional_properties: PropertyMap,
    /// Overall rating from 1 to 5.
    pub overall_rating: Option<u8>,
    /// Notes.
    pub notes: String,
    /// Tester, if recorded.
    pub tested_by: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Field values for recording or rewriting a test.
///
/// The formula is passed separately to
/// [`CatalogService::create_performance`](crate::CatalogService::create_performance).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceDraft {
    /// Batch label.
    pub test_batch: String,
    /// Day of the test.
    pub test_date: NaiveDate,
    /// Standard followed.
    #[serde(default)]
    pub test_method: TestMethod,
    /// Ambient conditions.
    #[serde(default)]
    pub test_conditions: PropertyMap,
    /// Tensile strength, MPa.
    #[serde(default)]
    pub tensile_strength: Option<f64>,
    /// Elongation at break, percent.
    #[serde(default)]
    pub elongation_at_break: Option<f64>,
    /// Tear strength, N/mm.
    #[serde(default)]
    pub tear_strength: Option<f64>,
    /// Shore A hardness.
    #[serde(default)]
    pub hardness: Option<f64>,
    /// Adhesion strength, MPa.
    #[serde(default)]
    pub adhesion_strength: Option<f64>,
    /// Qualitative weathering result.
    #[serde(default)]
    pub weather_resistance: String,
    /// Qualitative water resistance result.
    #[serde(default)]
    pub water_resistance: String,
    /// Upper service temperature, °C.
    #[serde(default)]
    pub heat_resistance_temp: Option<f64>,
    /// Lower service temperature, °C.
    #[serde(default)]
    pub cold_resistance_temp: Option<f64>,
    /// Viscosity, Pa·s.
    #[serde(default)]
    pub viscosity: Option<f64>,
    /// Density, g/cm³.
    #[serde(default)]
    pub density: Option<f64>,
    /// Tack-free time, hours.
    #[serde(default)]
    pub tack_free_time: Option<f64>,
    /// Full cure time, hours.
    #[serde(default)]
    pub full_cure_time: Option<f64>,
    /// Other measurements.
    #[serde(default)]
    pub additional_properties: PropertyMap,
    /// Overall rating from 1 to 5.
    #[serde(default)]
    pub overall_rating: Option<u8>,
    /// Notes.
    #[serde(default)]
    pub notes: String,
    /// Tester.
    #[serde(default)]
    pub tested_by: Option<String>,
}

impl PerformanceDraft {
    /// Creates a draft with only the batch and date set.
    #[must_use]
    pub fn new(test_batch: impl Into<String>, test_date: NaiveDate) -> Self {
        Self {
            test_batch: test_batch.into(),
            test_date,
            test_method: TestMethod::default(),
            test_conditions: PropertyMap::new(),
            tensile_strength: None,
            elongation_at_break: None,
            tear_strength: None,
            hardness: None,
            adhesion_strength: None,
            weather_resistance: String::new(),
            water_resistance: String::new(),
            heat_resistance_temp: None,
            cold_resistance_temp: None,
            viscosity: None,
            density: None,
            tack_free_time: None,
            full_cure_time: None,
            additional_properties: PropertyMap::new(),
            overall_rating: None,
            notes: String::new(),
            tested_by: None,
        }
    }

    /// Sets the three headline mechanical measurements.
    #[must_use]
    pub const fn with_mechanics(
        mut self,
        tensile_strength: Option<f64>,
        elongation_at_break: Option<f64>,
        hardness: Option<f64>,
    ) -> Self {
        self.tensile_strength = tensile_strength;
        self.elongation_at_break = elongation_at_break;
        self.hardness = hardness;
        self
    }

    /// Sets the overall rating.
    #[must_use]
    pub const fn with_rating(mut self, rating: u8) -> Self {
        self.overall_rating = Some(rating);
        self
    }

    /// Validates every field.
    pub fn validate(&self) -> Result<()> {
        validation::required_text("test_batch", &self.test_batch, 50)?;
        validation::bounded_text("weather_resistance", &self.weather_resistance, 100)?;
        validation::bounded_text("water_resistance", &self.water_resistance, 100)?;
        for (field, value) in [
            ("tensile_strength", self.tensile_strength),
            ("elongation_at_break", self.elongation_at_break),
            ("tear_strength", self.tear_strength),
            ("hardness", self.hardness),
            ("adhesion_strength", self.adhesion_strength),
            ("heat_resistance_temp", self.heat_resistance_temp),
            ("cold_resistance_temp", self.cold_resistance_temp),
            ("viscosity", self.viscosity),
            ("density", self.density),
            ("tack_free_time", self.tack_free_time),
            ("full_cure_time", self.full_cure_time),
        ] {
            validation::finite(field, value)?;
        }
        if let Some(rating) = self.overall_rating
            && !(RATING_MIN..=RATING_MAX).contains(&rating)
        {
            return Err(Error::validation(
                "overall_rating",
                format!("must be between {RATING_MIN} and {RATING_MAX}"),
            ));
        }
        validation::properties("test_conditions", &self.test_conditions)?;
        validation::properties("additional_properties", &self.additional_properties)
    }
}

impl From<&Performance> for PerformanceDraft {
    fn from(p: &Performance) -> Self {
        Self {
            test_batch: p.test_batch.clone(),
            test_date: p.test_date,
            test_method: p.test_method,
            test_conditions: p.test_conditions.clone(),
            tensile_strength: p.tensile_strength,
            elongation_at_break: p.elongation_at_break,
            tear_strength: p.tear_strength,
            hardness: p.hardness,
            adhesion_strength: p.adhesion_strength,
            weather_resistance: p.weather_resistance.clone(),
            water_resistance: p.water_resistance.clone(),
            heat_resistance_temp: p.heat_resistance_temp,
            cold_resistance_temp: p.cold_resistance_temp,
            viscosity: p.viscosity,
            density: p.density,
            tack_free_time: p.tack_free_time,
            full_cure_time: p.full_cure_time,
            additional_properties: p.additional_properties.clone(),
            overall_rating: p.overall_rating,
            notes: p.notes.clone(),
            tested_by: p.tested_by.clone(),
        }
    }
}

/// Partial update of a test record. Fields mirror [`PerformanceDraft`].
///
/// The owning formula cannot be changed.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PerformancePatch {
    pub test_batch: Option<String>,
    pub test_date: Option<NaiveDate>,
    pub test_method: Option<TestMethod>,
    pub test_conditions: Option<PropertyMap>,
    #[serde(default, deserialize_with = "double_option")]
    pub tensile_strength: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub elongation_at_break: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub tear_strength: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub hardness: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub adhesion_strength: Option<Option<f64>>,
    pub weather_resistance: Option<String>,
    pub water_resistance: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub heat_resistance_temp: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub cold_resistance_temp: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub viscosity: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub density: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub tack_free_time: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub full_cure_time: Option<Option<f64>>,
    pub additional_properties: Option<PropertyMap>,
    #[serde(default, deserialize_with = "double_option")]
    pub overall_rating: Option<Option<u8>>,
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub tested_by: Option<Option<String>>,
}

impl PerformancePatch {
    /// Applies the patch on top of a draft.
    pub fn apply_to(self, draft: &mut PerformanceDraft) {
        patch_fields!(self, draft, {
            test_batch, test_date, test_method, test_conditions, tensile_strength,
            elongation_at_break, tear_strength, hardness, adhesion_strength,
            weather_resistance, water_resistance, heat_resistance_temp,
            cold_resistance_temp, viscosity, density, tack_free_time, full_cure_time,
            additional_properties, overall_rating, notes, tested_by,
        });
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use test_case::test_case;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 1).unwrap()
    }

    #[test_case(0, false)]
    #[test_case(1, true)]
    #[test_case(5, true)]
    #[test_case(6, false)]
    fn test_rating_bounds(rating: u8, valid: bool) {
        let draft = PerformanceDraft::new("B1", date()).with_rating(rating);
        assert_eq!(draft.validate().is_ok(), valid);
    }

    #[test]
    fn test_nan_measurement_rejected() {
        let draft = PerformanceDraft::new("B1", date()).with_mechanics(Some(f64::NAN), None, None);
        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_draft_from_minimal_json() {
        let draft: PerformanceDraft =
            serde_json::from_str(r#"{"test_batch": "B20241001", "test_date": "2024-10-01"}"#)
                .unwrap();
        assert_eq!(draft.test_date, date());
        assert_eq!(draft.test_method, TestMethod::Internal);
        assert!(draft.overall_rating.is_none());
    }

    #[test]
    fn test_draft_requires_date() {
        let result: std::result::Result<PerformanceDraft, _> =
            serde_json::from_str(r#"{"test_batch": "B1"}"#);
        assert!(result.is_err());
    }
}
