//! Integration tests for the operational HTTP surface.

use std::sync::{Arc, OnceLock};

use application::CreateCategoryInput;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use messaging::InMemoryBroker;
use metrics_exporter_prometheus::PrometheusHandle;
use persistence::InMemoryDatabase;
use server::{AppState, Backend, Config, InMemoryCatalogRuntime};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> axum::Router {
    server::create_app(
        Arc::new(AppState {
            backend: Backend::InMemory,
        }),
        get_metrics_handle(),
    )
}

async fn body_string(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["backend"], "in-memory");
}

#[tokio::test]
async fn test_metrics_endpoint_renders_use_case_counters() {
    let app = setup();

    let broker = InMemoryBroker::new();
    application::declare_catalog_topology(&broker, messaging::DELAYED_EXCHANGE).unwrap();
    let runtime = InMemoryCatalogRuntime::in_memory(
        InMemoryDatabase::new(),
        Arc::new(broker),
        &Config::default(),
    );
    runtime
        .create_category
        .execute(CreateCategoryInput {
            name: "Movie".to_string(),
            description: None,
            is_active: true,
        })
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("uow_commits_total"));
    assert!(body.contains("broker_messages_published_total"));
    assert!(body.contains("application_run_duration_seconds"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/categories")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
