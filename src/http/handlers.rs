//! Request handlers.
//!
//! The services are synchronous, so every store call runs on tokio's
//! blocking thread pool through [`run_blocking`].

use super::AppState;
use super::error::ApiError;
use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::Error;
use crate::models::{
    ComponentDraft, ComponentEntry, ComponentId, Formula, FormulaComponent, FormulaDraft,
    FormulaFilter, FormulaId, FormulaPatch, GraphBundle, GraphView, ImportSummary, Ingredient,
    IngredientDraft, IngredientEntry, IngredientId, Intermediate, IntermediateDraft,
    IntermediateFilter, IntermediateId, IntermediatePatch, MaterialTrace, PathSearch, Performance,
    PerformanceDraft, PerformanceFilter, PerformanceId, PerformancePatch, PerformanceStatistics,
    RawMaterial, RawMaterialDraft, RawMaterialFilter, RawMaterialId, RawMaterialPatch,
    Recommendation, RecommendCriteria, UsageChain,
};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

type ApiResult<T> = std::result::Result<T, ApiError>;

/// `201 Created` with the new entity.
type Created<T> = (StatusCode, Json<T>);

fn created<T>(value: T) -> Created<T> {
    (StatusCode::CREATED, Json(value))
}

/// Runs a synchronous service call on the blocking thread pool.
async fn run_blocking<F, T>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> crate::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::OperationFailed {
            operation: "blocking_task".to_string(),
            cause: e.to_string(),
        })?
        .map_err(ApiError::from)
}

/// Liveness probe.
#[allow(clippy::unused_async)]
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

// ============================================================================
// Raw Materials
// ============================================================================

pub async fn list_raw_materials(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<RawMaterialFilter>,
) -> ApiResult<Json<Vec<RawMaterial>>> {
    Ok(Json(run_blocking(move || state.catalog.list_raw_materials(&filter)).await?))
}

pub async fn create_raw_material(
    State(state): State<AppState>,
    ApiJson(draft): ApiJson<RawMaterialDraft>,
) -> ApiResult<Created<RawMaterial>> {
    Ok(created(run_blocking(move || state.catalog.create_raw_material(&draft)).await?))
}

pub async fn get_raw_material(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<RawMaterialId>,
) -> ApiResult<Json<RawMaterial>> {
    Ok(Json(run_blocking(move || state.catalog.get_raw_material(id)).await?))
}

pub async fn update_raw_material(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<RawMaterialId>,
    ApiJson(patch): ApiJson<RawMaterialPatch>,
) -> ApiResult<Json<RawMaterial>> {
    Ok(Json(run_blocking(move || state.catalog.update_raw_material(id, patch)).await?))
}

pub async fn delete_raw_material(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<RawMaterialId>,
) -> ApiResult<StatusCode> {
    run_blocking(move || state.catalog.delete_raw_material(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn intermediates_using(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<RawMaterialId>,
) -> ApiResult<Json<Vec<Intermediate>>> {
    Ok(Json(run_blocking(move || state.catalog.intermediates_using(id)).await?))
}

pub async fn usage_chain(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<RawMaterialId>,
) -> ApiResult<Json<UsageChain>> {
    Ok(Json(run_blocking(move || state.graph.usage_chain(id)).await?))
}

// ============================================================================
// Intermediates
// ============================================================================

pub async fn list_intermediates(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<IntermediateFilter>,
) -> ApiResult<Json<Vec<Intermediate>>> {
    Ok(Json(run_blocking(move || state.catalog.list_intermediates(&filter)).await?))
}

pub async fn create_intermediate(
    State(state): State<AppState>,
    ApiJson(draft): ApiJson<IntermediateDraft>,
) -> ApiResult<Created<Intermediate>> {
    Ok(created(run_blocking(move || state.catalog.create_intermediate(&draft)).await?))
}

pub async fn get_intermediate(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<IntermediateId>,
) -> ApiResult<Json<Intermediate>> {
    Ok(Json(run_blocking(move || state.catalog.get_intermediate(id)).await?))
}

pub async fn update_intermediate(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<IntermediateId>,
    ApiJson(patch): ApiJson<IntermediatePatch>,
) -> ApiResult<Json<Intermediate>> {
    Ok(Json(run_blocking(move || state.catalog.update_intermediate(id, patch)).await?))
}

pub async fn delete_intermediate(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<IntermediateId>,
) -> ApiResult<StatusCode> {
    run_blocking(move || state.catalog.delete_intermediate(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn intermediate_composition(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<IntermediateId>,
) -> ApiResult<Json<Vec<IngredientEntry>>> {
    Ok(Json(run_blocking(move || state.catalog.ingredients(id)).await?))
}

pub async fn add_ingredient(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<IntermediateId>,
    ApiJson(draft): ApiJson<IngredientDraft>,
) -> ApiResult<Created<Ingredient>> {
    Ok(created(run_blocking(move || state.catalog.add_ingredient(id, &draft)).await?))
}

pub async fn formulas_using(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<IntermediateId>,
) -> ApiResult<Json<Vec<Formula>>> {
    Ok(Json(run_blocking(move || state.catalog.formulas_using(id)).await?))
}

pub async fn remove_ingredient(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<IngredientId>,
) -> ApiResult<StatusCode> {
    run_blocking(move || state.catalog.remove_ingredient(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Formulas
// ============================================================================

pub async fn list_formulas(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<FormulaFilter>,
) -> ApiResult<Json<Vec<Formula>>> {
    Ok(Json(run_blocking(move || state.catalog.list_formulas(&filter)).await?))
}

pub async fn create_formula(
    State(state): State<AppState>,
    ApiJson(draft): ApiJson<FormulaDraft>,
) -> ApiResult<Created<Formula>> {
    Ok(created(run_blocking(move || state.catalog.create_formula(&draft)).await?))
}

pub async fn get_formula(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<FormulaId>,
) -> ApiResult<Json<Formula>> {
    Ok(Json(run_blocking(move || state.catalog.get_formula(id)).await?))
}

pub async fn update_formula(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<FormulaId>,
    ApiJson(patch): ApiJson<FormulaPatch>,
) -> ApiResult<Json<Formula>> {
    Ok(Json(run_blocking(move || state.catalog.update_formula(id, patch)).await?))
}

pub async fn delete_formula(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<FormulaId>,
) -> ApiResult<StatusCode> {
    run_blocking(move || state.catalog.delete_formula(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn formula_composition(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<FormulaId>,
) -> ApiResult<Json<Vec<ComponentEntry>>> {
    Ok(Json(run_blocking(move || state.catalog.components(id)).await?))
}

pub async fn add_component(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<FormulaId>,
    ApiJson(draft): ApiJson<ComponentDraft>,
) -> ApiResult<Created<FormulaComponent>> {
    Ok(created(run_blocking(move || state.catalog.add_component(id, &draft)).await?))
}

pub async fn formula_performances(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<FormulaId>,
) -> ApiResult<Json<Vec<Performance>>> {
    Ok(Json(run_blocking(move || state.catalog.performances_of(id)).await?))
}

pub async fn trace_materials(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<FormulaId>,
) -> ApiResult<Json<MaterialTrace>> {
    Ok(Json(run_blocking(move || state.graph.trace_materials(id)).await?))
}

pub async fn recommend(
    State(state): State<AppState>,
    ApiJson(criteria): ApiJson<RecommendCriteria>,
) -> ApiResult<Json<Recommendation>> {
    Ok(Json(run_blocking(move || state.recommend.recommend(&criteria)).await?))
}

pub async fn remove_component(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ComponentId>,
) -> ApiResult<StatusCode> {
    run_blocking(move || state.catalog.remove_component(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Performance Records
// ============================================================================

/// Body of `POST /api/kg/performances`.
#[derive(Debug, Deserialize)]
pub struct NewPerformance {
    formula: FormulaId,
    #[serde(flatten)]
    draft: PerformanceDraft,
}

/// Query of `GET /api/kg/performances/statistics`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatisticsQuery {
    formula: Option<FormulaId>,
}

pub async fn list_performances(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<PerformanceFilter>,
) -> ApiResult<Json<Vec<Performance>>> {
    Ok(Json(run_blocking(move || state.catalog.list_performances(&filter)).await?))
}

pub async fn create_performance(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewPerformance>,
) -> ApiResult<Created<Performance>> {
    let performance =
        run_blocking(move || state.catalog.create_performance(body.formula, &body.draft)).await?;
    Ok(created(performance))
}

pub async fn get_performance(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<PerformanceId>,
) -> ApiResult<Json<Performance>> {
    Ok(Json(run_blocking(move || state.catalog.get_performance(id)).await?))
}

pub async fn update_performance(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<PerformanceId>,
    ApiJson(patch): ApiJson<PerformancePatch>,
) -> ApiResult<Json<Performance>> {
    Ok(Json(run_blocking(move || state.catalog.update_performance(id, patch)).await?))
}

pub async fn delete_performance(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<PerformanceId>,
) -> ApiResult<StatusCode> {
    run_blocking(move || state.catalog.delete_performance(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn performance_statistics(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<StatisticsQuery>,
) -> ApiResult<Json<PerformanceStatistics>> {
    Ok(Json(run_blocking(move || state.recommend.statistics(query.formula)).await?))
}

// ============================================================================
// Graph Views
// ============================================================================

/// Body of `POST /api/kg/graph/search-path`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchPathRequest {
    raw_material_id: Option<RawMaterialId>,
    target_performance: Option<Value>,
}

pub async fn full_graph(State(state): State<AppState>) -> ApiResult<Json<GraphView>> {
    Ok(Json(run_blocking(move || state.graph.full_graph()).await?))
}

pub async fn search_path(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SearchPathRequest>,
) -> ApiResult<Json<PathSearch>> {
    let raw_material = request
        .raw_material_id
        .ok_or_else(|| Error::validation("raw_material_id", "is required"))?;
    Ok(Json(
        run_blocking(move || {
            state
                .graph
                .search_path(raw_material, request.target_performance.as_ref())
        })
        .await?,
    ))
}

// ============================================================================
// Bundles
// ============================================================================

pub async fn import_bundle(
    State(state): State<AppState>,
    ApiJson(bundle): ApiJson<GraphBundle>,
) -> ApiResult<Created<ImportSummary>> {
    Ok(created(run_blocking(move || state.bundles.import(&bundle)).await?))
}

pub async fn export_bundle(State(state): State<AppState>) -> ApiResult<Json<GraphBundle>> {
    Ok(Json(run_blocking(move || state.bundles.export()).await?))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use std::thread;

    #[tokio::test(flavor = "current_thread")]
    async fn test_run_blocking_leaves_runtime_thread() {
        let runtime_thread = thread::current().id();
        let worker = run_blocking(|| Ok(thread::current().id())).await.unwrap();
        assert_ne!(worker, runtime_thread);
    }

    #[tokio::test]
    async fn test_run_blocking_passes_service_errors_through() {
        let err = run_blocking::<_, ()>(|| Err(Error::not_found("formula", 3)))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_run_blocking_panic_is_internal_error() {
        let err = run_blocking::<_, ()>(|| panic!("store exploded")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(matches!(err.0, Error::OperationFailed { ref operation, .. } if operation == "blocking_task"));
    }
}
