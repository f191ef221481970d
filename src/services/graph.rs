//! Graph query service.
//!
//! Read-only traversals over the four tiers:
//!
//! ```text
//! RawMaterial ──ingredient──▶ Intermediate ──component──▶ Formula ──tested by──▶ Performance
//!      └──────────────────────component (direct)─────────────▲
//! ```
//!
//! Traversals walk the live composition rows, so results always reflect the
//! current store contents.

use super::catalog::load_all;
use crate::models::graph::{rating_label, weight_label};
use crate::models::{
    Category, Component, Formula, FormulaFilter, FormulaId, GraphCounts, GraphEdge, GraphNode,
    GraphView, Intermediate, IntermediateFilter, IntermediateId, MaterialPath, MaterialTrace,
    NodeData, PathSearch, Performance, PerformanceFilter, RawMaterial, RawMaterialFilter,
    RawMaterialId, Tier, UsageChain,
};
use crate::storage::traits::KnowledgeStore;
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// High-level service for graph traversal.
pub struct GraphQueryService<S: KnowledgeStore + ?Sized> {
    store: Arc<S>,
}

impl<S: KnowledgeStore + ?Sized> Clone for GraphQueryService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: KnowledgeStore + ?Sized> GraphQueryService<S> {
    /// Creates a graph query service over a shared store.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    fn raw_material(&self, id: RawMaterialId) -> Result<RawMaterial> {
        self.store
            .get_raw_material(id)?
            .ok_or_else(|| Error::not_found("raw_material", id))
    }

    /// Formula ids that use `intermediate` as a component, distinct.
    fn formula_ids_using(&self, intermediate: IntermediateId) -> Result<BTreeSet<FormulaId>> {
        Ok(self
            .store
            .components_using(Component::from(intermediate))?
            .into_iter()
            .map(|c| c.formula)
            .collect())
    }

    /// Everything downstream of a raw material: the intermediates that
    /// contain it, the formulas using those intermediates and their test
    /// records.
    ///
    /// Formulas that use the raw material only as a direct component are not
    /// part of the chain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the raw material does not exist.
    #[instrument(skip(self), fields(operation = "usage_chain", raw_material_id = %raw_material))]
    pub fn usage_chain(&self, raw_material: RawMaterialId) -> Result<UsageChain> {
        let raw_material = self.raw_material(raw_material)?;

        let intermediate_ids: BTreeSet<IntermediateId> = self
            .store
            .ingredients_using(raw_material.id)?
            .into_iter()
            .map(|i| i.intermediate)
            .collect();

        let mut formula_ids = BTreeSet::new();
        for &intermediate in &intermediate_ids {
            formula_ids.extend(self.formula_ids_using(intermediate)?);
        }

        let formula_ids: Vec<FormulaId> = formula_ids.into_iter().collect();
        let performances = self.store.performances_for(&formula_ids)?;

        Ok(UsageChain {
            intermediates: load_all(intermediate_ids, |id| self.store.get_intermediate(id))?,
            formulas: load_all(formula_ids, |id| self.store.get_formula(id))?,
            performances,
            raw_material,
        })
    }

    /// Every raw material that goes into a formula, directly or through its
    /// intermediates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the formula does not exist.
    #[instrument(skip(self), fields(operation = "trace_materials", formula_id = %formula))]
    pub fn trace_materials(&self, formula: FormulaId) -> Result<MaterialTrace> {
        let formula = self
            .store
            .get_formula(formula)?
            .ok_or_else(|| Error::not_found("formula", formula))?;

        let mut intermediate_ids = BTreeSet::new();
        let mut raw_material_ids = BTreeSet::new();
        for component in self.store.components_of(formula.id)? {
            match component.component {
                Component::Intermediate { intermediate } => {
                    intermediate_ids.insert(intermediate);
                },
                Component::RawMaterial { raw_material } => {
                    raw_material_ids.insert(raw_material);
                },
            }
        }
        for &intermediate in &intermediate_ids {
            raw_material_ids.extend(
                self.store
                    .ingredients_of(intermediate)?
                    .into_iter()
                    .map(|i| i.raw_material),
            );
        }

        Ok(MaterialTrace {
            intermediates: load_all(intermediate_ids, |id| self.store.get_intermediate(id))?,
            raw_materials: load_all(raw_material_ids, |id| self.store.get_raw_material(id))?,
            formula,
        })
    }

    /// The whole graph as nodes and edges for visualization.
    ///
    /// Edges follow composition rows: raw material to intermediate for every
    /// ingredient, intermediate to formula for every intermediate component,
    /// formula to performance for every test record. Direct raw material
    /// components are not drawn.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    #[instrument(skip(self), fields(operation = "full_graph"))]
    pub fn full_graph(&self) -> Result<GraphView> {
        let start = Instant::now();

        let raw_materials = self.store.list_raw_materials(&RawMaterialFilter::default())?;
        let intermediates = self.store.list_intermediates(&IntermediateFilter::default())?;
        let formulas = self.store.list_formulas(&FormulaFilter::default())?;
        let performances = self.store.list_performances(&PerformanceFilter::default())?;

        let stats = GraphCounts {
            raw_materials_count: raw_materials.len(),
            intermediates_count: intermediates.len(),
            formulas_count: formulas.len(),
            performances_count: performances.len(),
        };

        let mut nodes = Vec::with_capacity(stats.total());
        nodes.extend(raw_materials.iter().map(raw_material_node));
        nodes.extend(intermediates.iter().map(intermediate_node));
        nodes.extend(formulas.iter().map(formula_node));
        nodes.extend(performances.iter().map(performance_node));

        let mut edges: Vec<GraphEdge> = self
            .store
            .all_ingredients()?
            .into_iter()
            .map(|row| GraphEdge {
                source: Tier::RawMaterial.node_id(row.raw_material.get()),
                target: Tier::Intermediate.node_id(row.intermediate.get()),
                value: row.weight_ratio,
                label: weight_label(row.weight_ratio),
            })
            .collect();
        edges.extend(self.store.all_components()?.into_iter().filter_map(|row| {
            row.component.intermediate().map(|intermediate| GraphEdge {
                source: Tier::Intermediate.node_id(intermediate.get()),
                target: Tier::Formula.node_id(row.formula.get()),
                value: row.weight_ratio,
                label: weight_label(row.weight_ratio),
            })
        }));
        edges.extend(performances.iter().map(|p| GraphEdge {
            source: Tier::Formula.node_id(p.formula.get()),
            target: Tier::Performance.node_id(p.id.get()),
            value: f64::from(p.overall_rating.unwrap_or(3)),
            label: rating_label(p.overall_rating),
        }));

        let categories = Tier::all()
            .iter()
            .map(|tier| Category {
                name: tier.label().to_string(),
            })
            .collect();

        metrics::histogram!("matgraph_full_graph_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        tracing::debug!(nodes = nodes.len(), edges = edges.len(), "Assembled full graph");

        Ok(GraphView {
            nodes,
            edges,
            categories,
            stats,
        })
    }

    /// Enumerates raw material → intermediate → formula → performance paths.
    ///
    /// `target_performance` is accepted for forward compatibility and does
    /// not narrow the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the raw material does not exist.
    #[instrument(skip(self, target_performance), fields(operation = "search_path", raw_material_id = %raw_material))]
    pub fn search_path(
        &self,
        raw_material: RawMaterialId,
        target_performance: Option<&serde_json::Value>,
    ) -> Result<PathSearch> {
        if let Some(target) = target_performance {
            tracing::debug!(%target, "Ignoring target_performance");
        }
        let raw_material = self.raw_material(raw_material)?;

        let mut paths = Vec::new();
        for ingredient in self.store.ingredients_using(raw_material.id)? {
            let Some(intermediate) = self.store.get_intermediate(ingredient.intermediate)? else {
                continue;
            };
            for formula_id in self.formula_ids_using(intermediate.id)? {
                let Some(formula) = self.store.get_formula(formula_id)? else {
                    continue;
                };
                let performances = self.store.performances_for(&[formula_id])?;
                paths.extend(performances.into_iter().map(|performance| MaterialPath {
                    raw_material: raw_material.clone(),
                    intermediate: intermediate.clone(),
                    formula: formula.clone(),
                    performance,
                }));
            }
        }

        Ok(PathSearch::from(paths))
    }
}

fn node(tier: Tier, id: i64, name: String, data: NodeData) -> GraphNode {
    GraphNode {
        id: tier.node_id(id),
        name,
        tier,
        category: tier.category(),
        symbol_size: tier.symbol_size(),
        data,
    }
}

fn raw_material_node(m: &RawMaterial) -> GraphNode {
    node(
        Tier::RawMaterial,
        m.id.get(),
        m.name.clone(),
        NodeData::RawMaterial {
            code: m.code.clone(),
            material_type: m.material_type.label().to_string(),
            supplier: m.supplier.clone(),
        },
    )
}

fn intermediate_node(i: &Intermediate) -> GraphNode {
    node(
        Tier::Intermediate,
        i.id.get(),
        i.name.clone(),
        NodeData::Intermediate {
            code: i.code.clone(),
            intermediate_type: i.intermediate_type.label().to_string(),
        },
    )
}

fn formula_node(f: &Formula) -> GraphNode {
    node(
        Tier::Formula,
        f.id.get(),
        f.name.clone(),
        NodeData::Formula {
            code: f.code.clone(),
            version: f.version.clone(),
            status: f.status.label().to_string(),
            application_type: f.application_type.label().to_string(),
        },
    )
}

fn performance_node(p: &Performance) -> GraphNode {
    node(
        Tier::Performance,
        p.id.get(),
        format!("Performance-{}", p.test_batch),
        NodeData::Performance {
            test_date: p.test_date,
            tensile_strength: p.tensile_strength,
            elongation: p.elongation_at_break,
            hardness: p.hardness,
            rating: p.overall_rating,
        },
    )
}
