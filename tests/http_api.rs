//! REST API tests.
//!
//! Drives the axum router in-process with `tower::ServiceExt::oneshot`.

#![cfg(feature = "http")]
// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use matgraph::{BundleService, InMemoryKnowledgeStore, KnowledgeStore, SqliteKnowledgeStore};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Router {
    let store: Arc<dyn KnowledgeStore> = Arc::new(InMemoryKnowledgeStore::new());
    matgraph::http::router(store, &[]).unwrap()
}

fn seeded_app() -> Router {
    let store: Arc<dyn KnowledgeStore> = Arc::new(InMemoryKnowledgeStore::new());
    BundleService::new(Arc::clone(&store)).seed_demo().unwrap();
    matgraph::http::router(store, &[]).unwrap()
}

/// Sends a request and returns the status and parsed JSON body
/// (`Value::Null` for empty bodies).
async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        },
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(&app(), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_security_headers() {
    let response = app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let headers = response.headers();
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
}

#[tokio::test]
async fn test_raw_material_crud() {
    let app = app();
    let (status, created) = send(
        &app,
        Method::POST,
        "/api/kg/raw-materials",
        Some(json!({
            "code": "RM-001",
            "name": "Hydroxyl silicone oil",
            "material_type": "polymer",
            "cas_number": "70131-67-8",
            "properties": { "grade": "A", "viscosity_class": 5000 }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["properties"]["viscosity_class"], 5000);

    let uri = format!("/api/kg/raw-materials/{id}");
    let (status, patched) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(json!({ "supplier": "Dongyue Chemical" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["supplier"], "Dongyue Chemical");
    assert_eq!(patched["code"], "RM-001");

    let (status, listed) = send(
        &app,
        Method::GET,
        "/api/kg/raw-materials?material_type=polymer&search=silicone",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_duplicate_code_is_bad_request() {
    let app = app();
    let body = json!({ "code": "RM-001", "name": "Oil", "material_type": "polymer" });
    let (status, _) = send(&app, Method::POST, "/api/kg/raw-materials", Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, error) = send(&app, Method::POST, "/api/kg/raw-materials", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error["error"].as_str().unwrap().contains("already exists"));
}

#[tokio::test]
async fn test_validation_error_names_field() {
    let (status, body) = send(
        &app(),
        Method::POST,
        "/api/kg/raw-materials",
        Some(json!({ "code": "RM-001", "name": "Oil", "material_type": "polymer", "cas_number": "123-45-6" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "cas_number");
}

#[tokio::test]
async fn test_malformed_bodies_are_bad_request() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/kg/raw-materials",
        Some(json!({ "code": "RM-001", "name": "Oil", "material_type": "plasma" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, Method::GET, "/api/kg/formulas/not-a-number", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_without_type_is_bad_request() {
    let app = app();
    for (uri, field) in [
        ("/api/kg/raw-materials", "material_type"),
        ("/api/kg/intermediates", "intermediate_type"),
        ("/api/kg/formulas", "application_type"),
    ] {
        let (status, body) =
            send(&app, Method::POST, uri, Some(json!({ "code": "X-001", "name": "Untyped" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body["error"].as_str().unwrap().contains(field), "{uri}: {body}");
    }

    let (_, listed) = send(&app, Method::GET, "/api/kg/raw-materials", None).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_search_path_requires_raw_material_id() {
    let app = seeded_app();
    let (status, body) = send(&app, Method::POST, "/api/kg/graph/search-path", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "raw_material_id");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/kg/graph/search-path",
        Some(json!({ "raw_material_id": 404 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/kg/graph/search-path",
        Some(json!({ "raw_material_id": 1, "target_performance": { "tensile_strength": 9.9 } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 6);
}

#[tokio::test]
async fn test_composition_endpoints() {
    let app = app();
    let (_, rm) = send(
        &app,
        Method::POST,
        "/api/kg/raw-materials",
        Some(json!({ "code": "RM-001", "name": "Oil", "material_type": "polymer" })),
    )
    .await;
    let (_, intermediate) = send(
        &app,
        Method::POST,
        "/api/kg/intermediates",
        Some(json!({ "code": "INT-001", "name": "Prepolymer", "intermediate_type": "prepolymer" })),
    )
    .await;
    let (_, formula) = send(
        &app,
        Method::POST,
        "/api/kg/formulas",
        Some(json!({ "code": "F-001", "name": "Sealant", "application_type": "sealant" })),
    )
    .await;
    let int_id = intermediate["id"].as_i64().unwrap();
    let formula_id = formula["id"].as_i64().unwrap();

    let (status, ingredient) = send(
        &app,
        Method::POST,
        &format!("/api/kg/intermediates/{int_id}/composition"),
        Some(json!({ "raw_material": rm["id"], "weight_ratio": 85.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/kg/formulas/{formula_id}/composition"),
        Some(json!({ "component_type": "intermediate", "intermediate": int_id, "weight_ratio": 45.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, components) = send(
        &app,
        Method::GET,
        &format!("/api/kg/formulas/{formula_id}/composition"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(components[0]["component_code"], "INT-001");

    let (status, formulas) = send(
        &app,
        Method::GET,
        &format!("/api/kg/intermediates/{int_id}/formulas"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(formulas[0]["code"], "F-001");

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/kg/intermediate-compositions/{}", ingredient["id"]),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/kg/intermediate-compositions/{}", ingredient["id"]),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_performance_endpoints() {
    let app = seeded_app();
    let (status, created) = send(
        &app,
        Method::POST,
        "/api/kg/performances",
        Some(json!({
            "formula": 1,
            "test_batch": "B20241101",
            "test_date": "2024-11-01",
            "tensile_strength": 1.4,
            "overall_rating": 4
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["formula"], 1);

    let (status, stats) = send(&app, Method::GET, "/api/kg/performances/statistics?formula=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_tests"], 3);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/kg/performances",
        Some(json!({ "formula": 404, "test_batch": "B", "test_date": "2024-11-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/kg/performances",
        Some(json!({ "formula": 1, "test_batch": "B", "test_date": "2024-11-01", "overall_rating": 9 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_graph_views() {
    let app = seeded_app();

    let (status, graph) = send(&app, Method::GET, "/api/kg/graph/full", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(graph["stats"]["raw_materials_count"], 6);
    assert_eq!(graph["categories"].as_array().unwrap().len(), 4);
    // 6 ingredients + 4 intermediate components + 3 tests
    assert_eq!(graph["edges"].as_array().unwrap().len(), 13);
    assert!(graph["nodes"][0].get("symbolSize").is_some());

    let (status, chain) = send(&app, Method::GET, "/api/kg/raw-materials/3/usage-chain", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(chain["intermediates"].as_array().unwrap().len(), 1);

    let (status, trace) = send(&app, Method::GET, "/api/kg/formulas/1/trace-materials", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trace["raw_materials"].as_array().unwrap().len(), 6);

    let (status, recommended) = send(
        &app,
        Method::POST,
        "/api/kg/formulas/recommend",
        Some(json!({ "tensile_strength_min": 1.5, "application_type": "sealant" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(recommended["count"], 1);
}

#[tokio::test]
async fn test_bundle_round_trip() {
    let source = seeded_app();
    let (status, bundle) = send(&source, Method::GET, "/api/kg/bundles", None).await;
    assert_eq!(status, StatusCode::OK);

    let target = app();
    let (status, summary) = send(&target, Method::POST, "/api/kg/bundles", Some(bundle.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(summary["raw_materials"], 6);

    let (status, _) = send(&target, Method::POST, "/api/kg/bundles", Some(bundle)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_requests_on_sqlite() {
    let store: Arc<dyn KnowledgeStore> = Arc::new(SqliteKnowledgeStore::in_memory().unwrap());
    let app = matgraph::http::router(store, &[]).unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for n in 0..16 {
        let app = app.clone();
        tasks.spawn(async move {
            let body = json!({ "code": format!("RM-{n:03}"), "name": "Oil", "material_type": "polymer" });
            send(&app, Method::POST, "/api/kg/raw-materials", Some(body)).await.0
        });
    }
    while let Some(status) = tasks.join_next().await {
        assert_eq!(status.unwrap(), StatusCode::CREATED);
    }

    let (_, listed) = send(&app, Method::GET, "/api/kg/raw-materials", None).await;
    assert_eq!(listed.as_array().unwrap().len(), 16);
}
