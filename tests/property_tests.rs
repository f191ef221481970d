//! Property-based tests for the knowledge graph model.
//!
//! Uses proptest to verify invariants across random inputs:
//! - CAS numbers with a correct check digit validate, all others do not
//! - Negative weight ratios never validate
//! - Statistics stay within the observed range
//! - `full_graph` edge count equals the composition and test row counts
//! - Recommendation thresholds are satisfied by some record

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::NaiveDate;
use matgraph::models::{
    ApplicationType, ComponentDraft, FormulaDraft, FormulaStatus, IngredientDraft,
    IntermediateDraft, IntermediateType, MaterialType, Performance, PerformanceDraft,
    PerformanceStatistics, RawMaterialDraft, RawMaterialId, RecommendCriteria,
};
use matgraph::{CatalogService, GraphQueryService, InMemoryKnowledgeStore, KnowledgeStore};
use proptest::prelude::*;
use std::sync::Arc;

fn cas_check_digit(body: &str) -> u32 {
    body.chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .zip(1..)
        .map(|(digit, weight)| digit * weight)
        .sum::<u32>()
        % 10
}

fn draft_with_cas(cas: &str) -> RawMaterialDraft {
    let mut draft = RawMaterialDraft::new("RM-001", "Material", MaterialType::Other);
    draft.cas_number = cas.to_string();
    draft
}

/// Stores one test record per value and returns them.
fn records(tensile: &[Option<f64>]) -> Vec<Performance> {
    let store = InMemoryKnowledgeStore::new();
    let formula = store
        .insert_formula(&FormulaDraft::new("F-1", "Formula", ApplicationType::Sealant))
        .unwrap();
    tensile
        .iter()
        .map(|value| {
            let mut draft =
                PerformanceDraft::new("B", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
            draft.tensile_strength = *value;
            store.insert_performance(formula.id, &draft).unwrap()
        })
        .collect()
}

// ============================================================================
// Validation
// ============================================================================

proptest! {
    /// Property: a CAS number with the computed check digit validates.
    #[test]
    fn prop_cas_with_correct_check_digit_is_valid(
        head in "[1-9][0-9]{1,6}",
        middle in "[0-9]{2}",
    ) {
        let check = cas_check_digit(&format!("{head}{middle}"));
        let cas = format!("{head}-{middle}-{check}");
        prop_assert!(draft_with_cas(&cas).validate().is_ok(), "{} rejected", cas);
    }

    /// Property: any other check digit is rejected on the `cas_number` field.
    #[test]
    fn prop_cas_with_wrong_check_digit_is_invalid(
        head in "[1-9][0-9]{1,6}",
        middle in "[0-9]{2}",
        offset in 1u32..10,
    ) {
        let check = (cas_check_digit(&format!("{head}{middle}")) + offset) % 10;
        let cas = format!("{head}-{middle}-{check}");
        let result = draft_with_cas(&cas).validate();
        let rejected_on_cas_field =
            matches!(result, Err(matgraph::Error::Validation { ref field, .. }) if field == "cas_number");
        prop_assert!(rejected_on_cas_field);
    }

    /// Property: negative weight ratios never validate.
    #[test]
    fn prop_negative_weight_ratio_is_invalid(ratio in -1.0e6f64..-1.0e-9) {
        let draft = IngredientDraft::new(RawMaterialId::new(1), ratio);
        prop_assert!(draft.validate().is_err());
    }

    /// Property: non-negative finite weight ratios validate.
    #[test]
    fn prop_non_negative_weight_ratio_is_valid(ratio in 0.0f64..1.0e6) {
        let draft = IngredientDraft::new(RawMaterialId::new(1), ratio);
        prop_assert!(draft.validate().is_ok());
    }
}

// ============================================================================
// Aggregation
// ============================================================================

proptest! {
    /// Property: statistics ignore missing values and stay within range.
    #[test]
    fn prop_statistics_within_observed_range(
        values in prop::collection::vec(prop::option::of(0.0f64..100.0), 0..20),
    ) {
        let records = records(&values);
        let stats = PerformanceStatistics::from_records(&records);
        let present: Vec<f64> = values.iter().flatten().copied().collect();

        prop_assert_eq!(stats.total_tests, values.len());
        if present.is_empty() {
            prop_assert_eq!(stats.avg_tensile_strength, None);
            prop_assert_eq!(stats.max_tensile_strength, None);
        } else {
            let min = stats.min_tensile_strength.unwrap();
            let max = stats.max_tensile_strength.unwrap();
            let avg = stats.avg_tensile_strength.unwrap();
            prop_assert!(min <= avg + 1e-9 && avg <= max + 1e-9);
            prop_assert!(present.iter().all(|v| (min..=max).contains(v)));
        }
    }

    /// Property: a criterion with only a tensile minimum matches exactly when
    /// some record reaches it.
    #[test]
    fn prop_tensile_threshold_needs_some_record(
        values in prop::collection::vec(prop::option::of(0.0f64..5.0), 0..8),
        threshold in 0.0f64..5.0,
    ) {
        let records = records(&values);
        let criteria = RecommendCriteria {
            tensile_strength_min: Some(threshold),
            ..RecommendCriteria::default()
        };
        let expected = values.iter().flatten().any(|v| *v >= threshold);
        prop_assert_eq!(criteria.satisfied_by(&records), expected);
    }
}

// ============================================================================
// Graph Assembly
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: `full_graph` draws one edge per ingredient row, per
    /// intermediate component row and per test record.
    #[test]
    fn prop_full_graph_edge_count(
        ingredient_masks in prop::collection::vec(1u8..8, 1..4),
        component_mask in 0u8..16,
        direct_raw in any::<bool>(),
        tests in 0usize..4,
    ) {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let catalog = CatalogService::new(Arc::clone(&store));

        let materials: Vec<_> = (0..3)
            .map(|i| {
                catalog
                    .create_raw_material(&RawMaterialDraft::new(
                        format!("RM-{i}"),
                        format!("Material {i}"),
                        MaterialType::Filler,
                    ))
                    .unwrap()
            })
            .collect();

        let mut ingredient_rows = 0;
        let mut intermediates = Vec::new();
        for (i, mask) in ingredient_masks.iter().enumerate() {
            let intermediate = catalog
                .create_intermediate(&IntermediateDraft::new(
                    format!("INT-{i}"),
                    format!("Intermediate {i}"),
                    IntermediateType::Mixture,
                ))
                .unwrap();
            for (bit, material) in materials.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    catalog
                        .add_ingredient(intermediate.id, &IngredientDraft::new(material.id, 10.0))
                        .unwrap();
                    ingredient_rows += 1;
                }
            }
            intermediates.push(intermediate);
        }

        let formula = catalog
            .create_formula(
                &FormulaDraft::new("F-1", "Formula", ApplicationType::Adhesive)
                    .with_status(FormulaStatus::Testing),
            )
            .unwrap();
        let mut component_rows = 0;
        for (bit, intermediate) in intermediates.iter().enumerate() {
            if component_mask & (1 << bit) != 0 {
                catalog
                    .add_component(formula.id, &ComponentDraft::new(intermediate.id, 20.0))
                    .unwrap();
                component_rows += 1;
            }
        }
        if direct_raw {
            catalog
                .add_component(formula.id, &ComponentDraft::new(materials[0].id, 5.0))
                .unwrap();
        }
        for t in 0..tests {
            catalog
                .create_performance(
                    formula.id,
                    &PerformanceDraft::new(
                        format!("B{t}"),
                        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                    ),
                )
                .unwrap();
        }

        let view = GraphQueryService::new(Arc::clone(&store)).full_graph().unwrap();
        prop_assert_eq!(view.edges.len(), ingredient_rows + component_rows + tests);
        prop_assert_eq!(view.nodes.len(), store.counts().unwrap().total());
    }
}
