//! Process wiring for the admin catalog.
//!
//! Builds the catalog runtime on the configured backend, runs the
//! integration event consumer, and serves health and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod runtime;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::{Config, LogFormat};
pub use error::ServerError;
pub use runtime::{Backend, CatalogRuntime, InMemoryCatalogRuntime, PgCatalogRuntime};

/// Shared state of the HTTP routes.
#[derive(Debug, Clone)]
pub struct AppState {
    pub backend: Backend,
}

/// Creates the Axum router with the operational routes.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
