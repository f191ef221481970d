//! Result types of the graph queries.
//!
//! [`GraphView`] is shaped for force-directed chart libraries: nodes carry a
//! `category` index into `categories` and a `symbolSize`, edges carry a
//! numeric `value` and a display `label`.

use crate::models::{Formula, Intermediate, Performance, RawMaterial};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four levels of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// First tier.
    RawMaterial,
    /// Second tier.
    Intermediate,
    /// Third tier.
    Formula,
    /// Fourth tier.
    Performance,
}

impl Tier {
    /// Returns all tiers in graph order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::RawMaterial,
            Self::Intermediate,
            Self::Formula,
            Self::Performance,
        ]
    }

    /// Returns the tier name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RawMaterial => "raw_material",
            Self::Intermediate => "intermediate",
            Self::Formula => "formula",
            Self::Performance => "performance",
        }
    }

    /// Returns the prefix of node ids of this tier.
    #[must_use]
    pub const fn node_prefix(&self) -> &'static str {
        match self {
            Self::RawMaterial => "rm",
            Self::Intermediate => "int",
            Self::Formula => "formula",
            Self::Performance => "perf",
        }
    }

    /// Returns the index into [`GraphView::categories`].
    #[must_use]
    pub const fn category(&self) -> u8 {
        match self {
            Self::RawMaterial => 0,
            Self::Intermediate => 1,
            Self::Formula => 2,
            Self::Performance => 3,
        }
    }

    /// Returns the rendered node size.
    #[must_use]
    pub const fn symbol_size(&self) -> u32 {
        match self {
            Self::RawMaterial => 30,
            Self::Intermediate => 40,
            Self::Formula => 50,
            Self::Performance => 35,
        }
    }

    /// Returns the legend label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::RawMaterial => "Raw Material",
            Self::Intermediate => "Intermediate",
            Self::Formula => "Formula",
            Self::Performance => "Performance",
        }
    }

    /// Builds the node id for a row of this tier, e.g. `rm_7`.
    #[must_use]
    pub fn node_id(&self, id: i64) -> String {
        format!("{}_{id}", self.node_prefix())
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything downstream of one raw material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageChain {
    /// The starting raw material.
    pub raw_material: RawMaterial,
    /// Intermediates containing it.
    pub intermediates: Vec<Intermediate>,
    /// Formulas containing any of those intermediates.
    pub formulas: Vec<Formula>,
    /// Test records of those formulas.
    pub performances: Vec<Performance>,
}

/// Everything upstream of one formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialTrace {
    /// The starting formula.
    pub formula: Formula,
    /// Intermediates it contains.
    pub intermediates: Vec<Intermediate>,
    /// Raw materials it contains, directly or through an intermediate.
    pub raw_materials: Vec<RawMaterial>,
}

/// One raw material → intermediate → formula → performance chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialPath {
    /// First hop.
    pub raw_material: RawMaterial,
    /// Second hop.
    pub intermediate: Intermediate,
    /// Third hop.
    pub formula: Formula,
    /// Final hop.
    pub performance: Performance,
}

/// Result of a path search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSearch {
    /// Number of paths.
    pub count: usize,
    /// The paths, in traversal order.
    pub paths: Vec<MaterialPath>,
}

impl From<Vec<MaterialPath>> for PathSearch {
    fn from(paths: Vec<MaterialPath>) -> Self {
        Self {
            count: paths.len(),
            paths,
        }
    }
}

/// Tier-specific node attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeData {
    /// Raw material summary.
    RawMaterial {
        /// Business code.
        code: String,
        /// Material type label.
        material_type: String,
        /// Supplier.
        supplier: String,
    },
    /// Formula summary.
    Formula {
        /// Business code.
        code: String,
        /// Version label.
        version: String,
        /// Status label.
        status: String,
        /// Application type label.
        application_type: String,
    },
    /// Intermediate summary.
    Intermediate {
        /// Business code.
        code: String,
        /// Intermediate type label.
        intermediate_type: String,
    },
    /// Headline test results.
    Performance {
        /// Day of the test.
        test_date: NaiveDate,
        /// Tensile strength, MPa.
        tensile_strength: Option<f64>,
        /// Elongation at break, percent.
        elongation: Option<f64>,
        /// Shore A hardness.
        hardness: Option<f64>,
        /// Overall rating.
        rating: Option<u8>,
    },
}

/// A node of the visualization graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Tier-prefixed id, e.g. `int_3`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Tier.
    #[serde(rename = "type")]
    pub tier: Tier,
    /// Index into the category list.
    pub category: u8,
    /// Rendered size.
    #[serde(rename = "symbolSize")]
    pub symbol_size: u32,
    /// Tier-specific attributes.
    pub data: NodeData,
}

/// A directed edge of the visualization graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Source node id.
    pub source: String,
    /// Target node id.
    pub target: String,
    /// Weight ratio, or rating for performance edges.
    pub value: f64,
    /// Display label.
    pub label: String,
}

/// A legend entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Legend label.
    pub name: String,
}

/// Entity counts per tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphCounts {
    /// Raw materials.
    pub raw_materials_count: usize,
    /// Intermediates.
    pub intermediates_count: usize,
    /// Formulas.
    pub formulas_count: usize,
    /// Performance records.
    pub performances_count: usize,
}

impl GraphCounts {
    /// Sum over all tiers.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.raw_materials_count
            + self.intermediates_count
            + self.formulas_count
            + self.performances_count
    }
}

/// The whole graph in visualization form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphView {
    /// All nodes, tier by tier.
    pub nodes: Vec<GraphNode>,
    /// All edges, tier by tier.
    pub edges: Vec<GraphEdge>,
    /// Legend, indexed by [`GraphNode::category`].
    pub categories: Vec<Category>,
    /// Entity counts.
    pub stats: GraphCounts,
}

/// Formats a composition weight for an edge label.
///
/// Whole numbers keep one decimal place (`85.0%`) so labels read the same
/// for `85` and `85.0`.
#[must_use]
pub fn weight_label(weight_ratio: f64) -> String {
    if weight_ratio.fract() == 0.0 && weight_ratio.abs() < 1e15 {
        format!("{weight_ratio:.1}%")
    } else {
        format!("{weight_ratio}%")
    }
}

/// Formats a performance rating for an edge label.
#[must_use]
pub fn rating_label(rating: Option<u8>) -> String {
    rating.map_or_else(|| "Rating N/A".to_string(), |r| format!("Rating {r}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_tier_constants() {
        let sizes: Vec<u32> = Tier::all().iter().map(Tier::symbol_size).collect();
        assert_eq!(sizes, vec![30, 40, 50, 35]);
        let categories: Vec<u8> = Tier::all().iter().map(Tier::category).collect();
        assert_eq!(categories, vec![0, 1, 2, 3]);
        assert_eq!(Tier::Intermediate.node_id(3), "int_3");
        assert_eq!(Tier::Performance.node_id(12), "perf_12");
    }

    #[test_case(85.0, "85.0%")]
    #[test_case(2.5, "2.5%")]
    #[test_case(0.0, "0.0%")]
    fn test_weight_label(weight: f64, expected: &str) {
        assert_eq!(weight_label(weight), expected);
    }

    #[test]
    fn test_rating_label() {
        assert_eq!(rating_label(Some(4)), "Rating 4");
        assert_eq!(rating_label(None), "Rating N/A");
    }

    #[test]
    fn test_node_serializes_chart_field_names() {
        let node = GraphNode {
            id: "rm_1".to_string(),
            name: "Silicone oil".to_string(),
            tier: Tier::RawMaterial,
            category: 0,
            symbol_size: 30,
            data: NodeData::RawMaterial {
                code: "RM-001".to_string(),
                material_type: "Polymer".to_string(),
                supplier: String::new(),
            },
        };
        let value = serde_json::to_value(&node).unwrap_or_default();
        assert_eq!(value["type"], "raw_material");
        assert_eq!(value["symbolSize"], 30);
        assert_eq!(value["data"]["code"], "RM-001");
    }
}
