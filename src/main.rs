//! Binary entry point for matgraph.
//!
//! This binary provides the CLI and the REST server for the materials
//! knowledge graph.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use matgraph::config::MatgraphConfig;
use matgraph::models::{ApplicationType, FormulaId, RawMaterialId, RecommendCriteria};
use matgraph::observability::{self, ObservabilityConfig};
use matgraph::services::BundleFormat;
use matgraph::{
    BundleService, GraphQueryService, KnowledgeStore, RecommendationService, SqliteKnowledgeStore,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// Matgraph - a knowledge graph of raw materials, intermediates, formulas
/// and their measured performance.
#[derive(Parser)]
#[command(name = "matgraph")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the `SQLite` database (overrides configuration).
    #[arg(short, long, global = true, env = "MATGRAPH_DATABASE")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the REST API server.
    Serve {
        /// Interface to bind.
        #[arg(long)]
        host: Option<String>,

        /// Port to bind.
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show entity counts and the database location.
    Status,

    /// Print the full graph visualization payload.
    Graph,

    /// Show intermediates, formulas and tests downstream of a raw material.
    UsageChain {
        /// Raw material id.
        id: i64,
    },

    /// Show the materials a formula is made of.
    Trace {
        /// Formula id.
        formula_id: i64,
    },

    /// List raw material to performance paths.
    Paths {
        /// Raw material id.
        raw_material_id: i64,

        /// Target performance as JSON (accepted but not yet used for ranking).
        #[arg(long)]
        target: Option<String>,
    },

    /// Recommend validated formulas meeting performance thresholds.
    Recommend {
        /// Minimum tensile strength (MPa).
        #[arg(long)]
        tensile_min: Option<f64>,

        /// Minimum elongation at break (%).
        #[arg(long)]
        elongation_min: Option<f64>,

        /// Maximum hardness (Shore A).
        #[arg(long)]
        hardness_max: Option<f64>,

        /// Application type: sealant, adhesive, coating, composite or other.
        #[arg(long)]
        application: Option<String>,
    },

    /// Aggregate performance test statistics.
    Stats {
        /// Restrict to one formula.
        #[arg(long)]
        formula: Option<i64>,
    },

    /// Import a bundle file (JSON or YAML).
    Import {
        /// Bundle path.
        path: PathBuf,

        /// Format: json or yaml (default: from the file extension).
        #[arg(short, long)]
        format: Option<BundleFormat>,
    },

    /// Export the whole graph to a bundle file.
    Export {
        /// Bundle path.
        path: PathBuf,

        /// Format: json or yaml (default: from the file extension).
        #[arg(short, long)]
        format: Option<BundleFormat>,
    },

    /// Load the silicone sealant demo graph.
    SeedDemo,

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "matgraph", &mut std::io::stdout());
        return ExitCode::SUCCESS;
    }

    let mut config = match MatgraphConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };
    if let Some(database) = &cli.database {
        config.database_path.clone_from(database);
    }

    let expose_metrics = matches!(cli.command, Commands::Serve { .. });
    let _observability = match observability::init(ObservabilityConfig::from_config(
        &config,
        cli.verbose,
        expose_metrics,
    )) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
async fn run_command(command: Commands, mut config: MatgraphConfig) -> anyhow::Result<()> {
    if let Commands::Serve { host, port } = &command {
        if let Some(host) = host {
            config.server.host.clone_from(host);
        }
        if let Some(port) = port {
            config.server.port = *port;
        }
    }

    let store = open_store(&config.database_path)?;

    match command {
        Commands::Serve { .. } => cmd_serve(store, &config).await,
        Commands::Status => cmd_status(store.as_ref(), &config.database_path),
        Commands::Graph => print_json(&GraphQueryService::new(store).full_graph()?),
        Commands::UsageChain { id } => {
            print_json(&GraphQueryService::new(store).usage_chain(RawMaterialId::new(id))?)
        },
        Commands::Trace { formula_id } => {
            print_json(&GraphQueryService::new(store).trace_materials(FormulaId::new(formula_id))?)
        },
        Commands::Paths {
            raw_material_id,
            target,
        } => cmd_paths(store, raw_material_id, target),
        Commands::Recommend {
            tensile_min,
            elongation_min,
            hardness_max,
            application,
        } => {
            let application_type = application
                .as_deref()
                .map(str::parse::<ApplicationType>)
                .transpose()?;
            let criteria = RecommendCriteria {
                tensile_strength_min: tensile_min,
                elongation_min,
                hardness_max,
                application_type,
            };
            print_json(&RecommendationService::new(store).recommend(&criteria)?)
        },
        Commands::Stats { formula } => {
            print_json(&RecommendationService::new(store).statistics(formula.map(FormulaId::new))?)
        },
        Commands::Import { path, format } => {
            let summary = BundleService::new(store)
                .import_path(&path, format)
                .with_context(|| format!("importing {}", path.display()))?;
            print_json(&summary)
        },
        Commands::Export { path, format } => {
            let bundle = BundleService::new(store)
                .export_path(&path, format)
                .with_context(|| format!("exporting to {}", path.display()))?;
            println!(
                "Exported {} raw materials, {} intermediates, {} formulas to {}",
                bundle.raw_materials.len(),
                bundle.intermediates.len(),
                bundle.formulas.len(),
                path.display()
            );
            Ok(())
        },
        Commands::SeedDemo => {
            let summary = BundleService::new(store)
                .seed_demo()
                .context("seeding demo data")?;
            print_json(&summary)
        },
        Commands::Completions { .. } => Ok(()),
    }
}

/// Opens the `SQLite` store, creating the parent directory if needed.
fn open_store(path: &Path) -> anyhow::Result<Arc<dyn KnowledgeStore>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let store = SqliteKnowledgeStore::new(path)
        .with_context(|| format!("opening database {}", path.display()))?;
    Ok(Arc::new(store))
}

#[cfg(feature = "http")]
async fn cmd_serve(store: Arc<dyn KnowledgeStore>, config: &MatgraphConfig) -> anyhow::Result<()> {
    matgraph::http::serve(store, &config.server).await?;
    Ok(())
}

#[cfg(not(feature = "http"))]
#[allow(clippy::unused_async)]
async fn cmd_serve(_store: Arc<dyn KnowledgeStore>, _config: &MatgraphConfig) -> anyhow::Result<()> {
    anyhow::bail!("matgraph was built without the `http` feature")
}

fn cmd_status(store: &dyn KnowledgeStore, database: &Path) -> anyhow::Result<()> {
    let counts = store.counts()?;
    println!("Database: {}", database.display());
    println!("Raw materials: {}", counts.raw_materials_count);
    println!("Intermediates: {}", counts.intermediates_count);
    println!("Formulas:      {}", counts.formulas_count);
    println!("Performances:  {}", counts.performances_count);
    Ok(())
}

fn cmd_paths(
    store: Arc<dyn KnowledgeStore>,
    raw_material_id: i64,
    target: Option<String>,
) -> anyhow::Result<()> {
    let target = target
        .as_deref()
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .context("--target must be valid JSON")?;
    let paths = GraphQueryService::new(store)
        .search_path(RawMaterialId::new(raw_material_id), target.as_ref())?;
    print_json(&paths)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
