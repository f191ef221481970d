//! REST API over the knowledge graph.
//!
//! All routes live under `/api/kg`; `/health` is the liveness probe. Bodies
//! are JSON. Failures return `{"error": ..., "field"?: ...}` with status 400
//! (invalid input, validation, conflict), 404 (unknown id) or 500.

mod error;
mod extract;
mod handlers;

pub use error::ApiError;

use crate::config::ServerConfig;
use crate::services::{BundleService, CatalogService, GraphQueryService, RecommendationService};
use crate::storage::KnowledgeStore;
use crate::{Error, Result};
use axum::Router;
use axum::http::{HeaderValue, header};
use axum::routing::{delete, get, post};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppState {
    catalog: CatalogService<dyn KnowledgeStore>,
    graph: GraphQueryService<dyn KnowledgeStore>,
    recommend: RecommendationService<dyn KnowledgeStore>,
    bundles: BundleService<dyn KnowledgeStore>,
}

impl AppState {
    /// Builds the services over one shared store.
    #[must_use]
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            catalog: CatalogService::new(Arc::clone(&store)),
            graph: GraphQueryService::new(Arc::clone(&store)),
            recommend: RecommendationService::new(Arc::clone(&store)),
            bundles: BundleService::new(store),
        }
    }
}

/// Builds the API router with tracing, CORS and security headers.
///
/// An empty `cors_origins` allows any origin.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if an origin is not a valid header value.
pub fn router(store: Arc<dyn KnowledgeStore>, cors_origins: &[String]) -> Result<Router> {
    let api = Router::new()
        .route(
            "/raw-materials",
            get(handlers::list_raw_materials).post(handlers::create_raw_material),
        )
        .route(
            "/raw-materials/{id}",
            get(handlers::get_raw_material)
                .patch(handlers::update_raw_material)
                .delete(handlers::delete_raw_material),
        )
        .route(
            "/raw-materials/{id}/intermediates",
            get(handlers::intermediates_using),
        )
        .route("/raw-materials/{id}/usage-chain", get(handlers::usage_chain))
        .route(
            "/intermediates",
            get(handlers::list_intermediates).post(handlers::create_intermediate),
        )
        .route(
            "/intermediates/{id}",
            get(handlers::get_intermediate)
                .patch(handlers::update_intermediate)
                .delete(handlers::delete_intermediate),
        )
        .route(
            "/intermediates/{id}/composition",
            get(handlers::intermediate_composition).post(handlers::add_ingredient),
        )
        .route("/intermediates/{id}/formulas", get(handlers::formulas_using))
        .route(
            "/intermediate-compositions/{id}",
            delete(handlers::remove_ingredient),
        )
        .route(
            "/formulas",
            get(handlers::list_formulas).post(handlers::create_formula),
        )
        .route("/formulas/recommend", post(handlers::recommend))
        .route(
            "/formulas/{id}",
            get(handlers::get_formula)
                .patch(handlers::update_formula)
                .delete(handlers::delete_formula),
        )
        .route(
            "/formulas/{id}/composition",
            get(handlers::formula_composition).post(handlers::add_component),
        )
        .route(
            "/formulas/{id}/performances",
            get(handlers::formula_performances),
        )
        .route(
            "/formulas/{id}/trace-materials",
            get(handlers::trace_materials),
        )
        .route("/formula-compositions/{id}", delete(handlers::remove_component))
        .route(
            "/performances",
            get(handlers::list_performances).post(handlers::create_performance),
        )
        .route(
            "/performances/statistics",
            get(handlers::performance_statistics),
        )
        .route(
            "/performances/{id}",
            get(handlers::get_performance)
                .patch(handlers::update_performance)
                .delete(handlers::delete_performance),
        )
        .route("/graph/full", get(handlers::full_graph))
        .route("/graph/search-path", post(handlers::search_path))
        .route(
            "/bundles",
            get(handlers::export_bundle).post(handlers::import_bundle),
        );

    let app = Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/kg", api)
        .with_state(AppState::new(store))
        // Security headers (OWASP recommendations)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(cors_layer(cors_origins)?)
        .layer(TraceLayer::new_for_http());

    Ok(app)
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    if origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|_| Error::InvalidInput(format!("invalid CORS origin '{origin}'")))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any))
}

/// Serves the API until the process receives Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(store: Arc<dyn KnowledgeStore>, config: &ServerConfig) -> Result<()> {
    let app = router(store, &config.cors_origins)?;
    let addr = format!("{}:{}", config.host, config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::OperationFailed {
            operation: "bind".to_string(),
            cause: format!("{addr}: {e}"),
        })?;
    tracing::info!(%addr, "Serving knowledge graph API");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::OperationFailed {
            operation: "serve".to_string(),
            cause: e.to_string(),
        })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
