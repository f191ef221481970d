//! Formula recommendation and test statistics.

use crate::models::{
    Formula, FormulaFilter, FormulaId, FormulaStatus, Performance, PerformanceFilter,
    PerformanceStatistics, Recommendation, RecommendCriteria,
};
use crate::storage::traits::KnowledgeStore;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

/// Recommends validated formulas by measured performance.
pub struct RecommendationService<S: KnowledgeStore + ?Sized> {
    store: Arc<S>,
}

impl<S: KnowledgeStore + ?Sized> Clone for RecommendationService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: KnowledgeStore + ?Sized> RecommendationService<S> {
    /// Creates a recommendation service over a shared store.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Validated formulas whose test records meet every given threshold.
    ///
    /// Thresholds are checked independently, so one record may satisfy the
    /// tensile minimum while another satisfies the hardness maximum. A
    /// formula without records only matches when no threshold is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    #[instrument(skip(self), fields(operation = "recommend"))]
    pub fn recommend(&self, criteria: &RecommendCriteria) -> Result<Recommendation> {
        let candidates = self.store.list_formulas(&FormulaFilter {
            status: Some(FormulaStatus::Validated),
            application_type: criteria.application_type,
            search: None,
        })?;

        let ids: Vec<FormulaId> = candidates.iter().map(|f| f.id).collect();
        let mut by_formula: HashMap<FormulaId, Vec<Performance>> = HashMap::new();
        for performance in self.store.performances_for(&ids)? {
            by_formula
                .entry(performance.formula)
                .or_default()
                .push(performance);
        }

        let formulas: Vec<Formula> = candidates
            .into_iter()
            .filter(|f| {
                criteria.satisfied_by(by_formula.get(&f.id).map_or(&[][..], Vec::as_slice))
            })
            .collect();

        metrics::counter!("matgraph_recommendations_total").increment(1);
        tracing::debug!(matches = formulas.len(), "Recommendation computed");
        Ok(Recommendation::from(formulas))
    }

    /// Aggregates test records, optionally scoped to one formula.
    ///
    /// An unknown formula id yields empty statistics rather than an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub fn statistics(&self, formula: Option<FormulaId>) -> Result<PerformanceStatistics> {
        let records = self.store.list_performances(&PerformanceFilter {
            formula,
            ..PerformanceFilter::default()
        })?;
        Ok(PerformanceStatistics::from_records(&records))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use crate::InMemoryKnowledgeStore;
    use crate::models::{ApplicationType, FormulaDraft, PerformanceDraft};
    use chrono::NaiveDate;

    fn formula(
        store: &InMemoryKnowledgeStore,
        code: &str,
        status: FormulaStatus,
        application_type: ApplicationType,
    ) -> Formula {
        store
            .insert_formula(&FormulaDraft::new(code, code, application_type).with_status(status))
            .unwrap()
    }

    fn test_record(
        store: &InMemoryKnowledgeStore,
        formula: FormulaId,
        tensile: Option<f64>,
        hardness: Option<f64>,
    ) {
        let mut draft = PerformanceDraft::new("B", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        draft.tensile_strength = tensile;
        draft.hardness = hardness;
        store.insert_performance(formula, &draft).unwrap();
    }

    #[test]
    fn test_only_validated_formulas_are_recommended() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let validated = formula(&store, "F-1", FormulaStatus::Validated, ApplicationType::Sealant);
        let production = formula(&store, "F-2", FormulaStatus::Production, ApplicationType::Sealant);
        test_record(&store, validated.id, Some(1.5), None);
        test_record(&store, production.id, Some(2.0), None);

        let service = RecommendationService::new(store);
        let result = service
            .recommend(&RecommendCriteria {
                tensile_strength_min: Some(1.0),
                ..RecommendCriteria::default()
            })
            .unwrap();
        assert_eq!(result.count, 1);
        assert_eq!(result.formulas[0].id, validated.id);
    }

    #[test]
    fn test_thresholds_may_be_met_by_different_records() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let f = formula(&store, "F-1", FormulaStatus::Validated, ApplicationType::Sealant);
        test_record(&store, f.id, Some(2.0), Some(50.0));
        test_record(&store, f.id, Some(0.5), Some(20.0));

        let service = RecommendationService::new(store);
        let criteria = RecommendCriteria {
            tensile_strength_min: Some(1.5),
            hardness_max: Some(25.0),
            ..RecommendCriteria::default()
        };
        assert_eq!(service.recommend(&criteria).unwrap().count, 1);
    }

    #[test]
    fn test_null_measurements_never_satisfy() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let f = formula(&store, "F-1", FormulaStatus::Validated, ApplicationType::Coating);
        test_record(&store, f.id, None, None);

        let service = RecommendationService::new(store);
        let criteria = RecommendCriteria {
            hardness_max: Some(100.0),
            ..RecommendCriteria::default()
        };
        assert_eq!(service.recommend(&criteria).unwrap().count, 0);

        // No thresholds: every validated formula of the type qualifies.
        let criteria = RecommendCriteria {
            application_type: Some(ApplicationType::Coating),
            ..RecommendCriteria::default()
        };
        assert_eq!(service.recommend(&criteria).unwrap().count, 1);
    }

    #[test]
    fn test_statistics_scope() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let f = formula(&store, "F-1", FormulaStatus::Draft, ApplicationType::Sealant);
        test_record(&store, f.id, Some(1.0), None);
        test_record(&store, f.id, Some(3.0), None);
        test_record(&store, f.id, None, None);

        let service = RecommendationService::new(store);
        let stats = service.statistics(Some(f.id)).unwrap();
        assert_eq!(stats.total_tests, 3);
        assert_eq!(stats.avg_tensile_strength, Some(2.0));
        assert_eq!(stats.max_tensile_strength, Some(3.0));
        assert_eq!(stats.avg_hardness, None);

        let unknown = service.statistics(Some(FormulaId::new(404))).unwrap();
        assert_eq!(unknown, PerformanceStatistics::default());
    }
}
