//! Bulk import and export of graph bundles.
//!
//! A [`GraphBundle`] names entities by code, so the same document can seed
//! an empty store, move a sub-graph between databases or back up a store.

use crate::models::{
    BundleComponent, BundleIngredient, Component, ComponentKind, FormulaDraft, FormulaEntry,
    FormulaFilter, GraphBundle, ImportSummary, IntermediateDraft, IntermediateEntry,
    IntermediateFilter, IntermediateId, PerformanceDraft, PerformanceFilter, RawMaterialDraft,
    RawMaterialFilter, RawMaterialId,
};
use crate::storage::traits::KnowledgeStore;
use crate::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Sealant demo dataset: six raw materials, two intermediates, two formulas.
const DEMO_BUNDLE: &str = include_str!("../../data/demo_bundle.yaml");

/// Serialization format of a bundle document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BundleFormat {
    /// JSON.
    Json,
    /// YAML.
    Yaml,
}

impl BundleFormat {
    /// Guesses the format from a file extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    /// Parses a bundle document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the document is malformed.
    pub fn parse(self, content: &str) -> Result<GraphBundle> {
        match self {
            Self::Json => serde_json::from_str(content)
                .map_err(|e| Error::InvalidInput(format!("bundle JSON: {e}"))),
            Self::Yaml => serde_yaml_ng::from_str(content)
                .map_err(|e| Error::InvalidInput(format!("bundle YAML: {e}"))),
        }
    }

    /// Renders a bundle document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if serialization fails.
    pub fn render(self, bundle: &GraphBundle) -> Result<String> {
        let rendered = match self {
            Self::Json => serde_json::to_string_pretty(bundle).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml_ng::to_string(bundle).map_err(|e| e.to_string()),
        };
        rendered.map_err(|cause| Error::OperationFailed {
            operation: "render_bundle".to_string(),
            cause,
        })
    }
}

impl fmt::Display for BundleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Yaml => write!(f, "yaml"),
        }
    }
}

impl FromStr for BundleFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(Error::InvalidInput(format!("unknown bundle format: {other}"))),
        }
    }
}

fn resolve_format(path: &Path, format: Option<BundleFormat>) -> Result<BundleFormat> {
    format.or_else(|| BundleFormat::from_path(path)).ok_or_else(|| {
        Error::InvalidInput(format!(
            "cannot infer bundle format of {}; pass a format explicitly",
            path.display()
        ))
    })
}

/// Imports and exports whole sub-graphs.
pub struct BundleService<S: KnowledgeStore + ?Sized> {
    store: Arc<S>,
}

impl<S: KnowledgeStore + ?Sized> Clone for BundleService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: KnowledgeStore + ?Sized> BundleService<S> {
    /// Creates a bundle service over a shared store.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Imports a bundle atomically.
    ///
    /// Every draft is validated first; then all rows are written in one unit
    /// of work. Any failure leaves the store unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for invalid drafts, [`Error::NotFound`]
    /// for unresolved codes and [`Error::Conflict`] for duplicates.
    #[instrument(skip(self, bundle), fields(operation = "bundle.import"))]
    pub fn import(&self, bundle: &GraphBundle) -> Result<ImportSummary> {
        let start = Instant::now();
        let result = bundle
            .validate()
            .and_then(|()| self.store.import_bundle(bundle));

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!("matgraph_bundle_imports_total", "status" => status).increment(1);
        metrics::histogram!("matgraph_bundle_import_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);

        if let Ok(summary) = &result {
            tracing::info!(
                raw_materials = summary.raw_materials,
                intermediates = summary.intermediates,
                formulas = summary.formulas,
                performances = summary.performances,
                "Imported bundle"
            );
        }
        result
    }

    /// Parses and imports a bundle document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for malformed documents, otherwise as
    /// [`Self::import`].
    pub fn import_str(&self, content: &str, format: BundleFormat) -> Result<ImportSummary> {
        self.import(&format.parse(content)?)
    }

    /// Reads and imports a bundle file. The format defaults to the file
    /// extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the file cannot be read,
    /// otherwise as [`Self::import_str`].
    pub fn import_path(&self, path: &Path, format: Option<BundleFormat>) -> Result<ImportSummary> {
        let format = resolve_format(path, format)?;
        let content = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_bundle".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        self.import_str(&content, format)
    }

    /// Exports the whole store as a bundle.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    #[instrument(skip(self), fields(operation = "bundle.export"))]
    pub fn export(&self) -> Result<GraphBundle> {
        let raw_materials = self.store.list_raw_materials(&RawMaterialFilter::default())?;
        let intermediates = self.store.list_intermediates(&IntermediateFilter::default())?;

        let raw_codes: HashMap<RawMaterialId, String> = raw_materials
            .iter()
            .map(|m| (m.id, m.code.clone()))
            .collect();
        let intermediate_codes: HashMap<IntermediateId, String> = intermediates
            .iter()
            .map(|i| (i.id, i.code.clone()))
            .collect();

        let mut intermediate_entries = Vec::with_capacity(intermediates.len());
        for intermediate in &intermediates {
            let composition = self
                .store
                .ingredients_of(intermediate.id)?
                .into_iter()
                .filter_map(|row| {
                    raw_codes.get(&row.raw_material).map(|code| BundleIngredient {
                        raw_material: code.clone(),
                        weight_ratio: row.weight_ratio,
                        addition_order: row.addition_order,
                        addition_temperature: row.addition_temperature,
                        notes: row.notes,
                    })
                })
                .collect();
            intermediate_entries.push(IntermediateEntry {
                intermediate: IntermediateDraft::from(intermediate),
                composition,
            });
        }

        let mut formula_entries = Vec::new();
        for formula in self.store.list_formulas(&FormulaFilter::default())? {
            let composition = self
                .store
                .components_of(formula.id)?
                .into_iter()
                .filter_map(|row| {
                    let (component_type, code) = match row.component {
                        Component::Intermediate { intermediate } => {
                            (ComponentKind::Intermediate, intermediate_codes.get(&intermediate)?)
                        },
                        Component::RawMaterial { raw_material } => {
                            (ComponentKind::RawMaterial, raw_codes.get(&raw_material)?)
                        },
                    };
                    Some(BundleComponent {
                        component_type,
                        code: code.clone(),
                        weight_ratio: row.weight_ratio,
                        addition_order: row.addition_order,
                        notes: row.notes,
                    })
                })
                .collect();
            let performances = self
                .store
                .list_performances(&PerformanceFilter {
                    formula: Some(formula.id),
                    ..PerformanceFilter::default()
                })?
                .iter()
                .map(PerformanceDraft::from)
                .collect();
            formula_entries.push(FormulaEntry {
                formula: FormulaDraft::from(&formula),
                composition,
                performances,
            });
        }

        Ok(GraphBundle {
            raw_materials: raw_materials.iter().map(RawMaterialDraft::from).collect(),
            intermediates: intermediate_entries,
            formulas: formula_entries,
        })
    }

    /// Exports the store into a file. The format defaults to the file
    /// extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the file cannot be written.
    pub fn export_path(&self, path: &Path, format: Option<BundleFormat>) -> Result<GraphBundle> {
        let format = resolve_format(path, format)?;
        let bundle = self.export()?;
        std::fs::write(path, format.render(&bundle)?).map_err(|e| Error::OperationFailed {
            operation: "write_bundle".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Ok(bundle)
    }

    /// Imports the built-in sealant demo dataset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if any demo code already exists.
    pub fn seed_demo(&self) -> Result<ImportSummary> {
        self.import_str(DEMO_BUNDLE, BundleFormat::Yaml)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use crate::InMemoryKnowledgeStore;
    use test_case::test_case;

    #[test_case("graph.json", Some(BundleFormat::Json))]
    #[test_case("graph.YAML", Some(BundleFormat::Yaml))]
    #[test_case("graph.yml", Some(BundleFormat::Yaml))]
    #[test_case("graph.csv", None)]
    #[test_case("graph", None)]
    fn test_format_from_path(path: &str, expected: Option<BundleFormat>) {
        assert_eq!(BundleFormat::from_path(Path::new(path)), expected);
    }

    #[test]
    fn test_seed_demo_counts() {
        let service = BundleService::new(Arc::new(InMemoryKnowledgeStore::new()));
        let summary = service.seed_demo().unwrap();
        assert_eq!(summary.raw_materials, 6);
        assert_eq!(summary.intermediates, 2);
        assert_eq!(summary.ingredients, 6);
        assert_eq!(summary.formulas, 2);
        assert_eq!(summary.components, 6);
        assert_eq!(summary.performances, 3);

        // Codes are unique, so seeding twice conflicts and changes nothing.
        let err = service.seed_demo().unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_export_reimports_into_empty_store() {
        let source = BundleService::new(Arc::new(InMemoryKnowledgeStore::new()));
        let seeded = source.seed_demo().unwrap();

        let exported = source.export().unwrap();
        let json = BundleFormat::Json.render(&exported).unwrap();

        let target = BundleService::new(Arc::new(InMemoryKnowledgeStore::new()));
        let summary = target.import_str(&json, BundleFormat::Json).unwrap();
        assert_eq!(summary, seeded);
        assert_eq!(target.export().unwrap(), exported);
    }

    #[test]
    fn test_invalid_draft_rejected_before_writing() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let service = BundleService::new(Arc::clone(&store));
        let yaml = "
raw_materials:
  - { code: RM-1, name: Oil, material_type: polymer }
  - { code: RM-2, name: Bad, material_type: filler, cas_number: 123-45-6 }
";
        let err = service.import_str(yaml, BundleFormat::Yaml).unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "cas_number"));
        assert_eq!(store.counts().unwrap().raw_materials_count, 0);
    }

    #[test]
    fn test_malformed_document_is_invalid_input() {
        let service = BundleService::new(Arc::new(InMemoryKnowledgeStore::new()));
        let err = service.import_str("{not json", BundleFormat::Json).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_path_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.yaml");
        let source = BundleService::new(Arc::new(InMemoryKnowledgeStore::new()));
        source.seed_demo().unwrap();
        source.export_path(&path, None).unwrap();

        let target = BundleService::new(Arc::new(InMemoryKnowledgeStore::new()));
        let summary = target.import_path(&path, None).unwrap();
        assert_eq!(summary.total(), 25);

        let err = target
            .import_path(&dir.path().join("demo.txt"), None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
