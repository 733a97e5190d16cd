//! Server entry point.

use std::sync::Arc;

use application::declare_catalog_topology;
use messaging::{BrokerTransport, InMemoryBroker, IntegrationEventConsumer};
use persistence::{InMemoryDatabase, PgCatalogUnitOfWork};
use server::{AppState, Backend, Config, InMemoryCatalogRuntime, LogFormat, PgCatalogRuntime, ServerError};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!(%error, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Wires the catalog on the configured backend and returns its consumer.
///
/// The transport is the process-local [`InMemoryBroker`], so only events
/// published inside this process reach the consumer. It stands in for an
/// external broker client, which plugs in as another `BrokerTransport`; the
/// use cases are not served over HTTP yet and are dropped here.
async fn build_consumer(
    config: &Config,
    transport: Arc<dyn BrokerTransport>,
) -> Result<(Backend, IntegrationEventConsumer), ServerError> {
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
            PgCatalogUnitOfWork::run_migrations(&pool).await?;
            let runtime = PgCatalogRuntime::postgres(pool, transport, config);
            Ok((Backend::Postgres, runtime.category_deleted_consumer))
        }
        None => {
            let runtime = InMemoryCatalogRuntime::in_memory(InMemoryDatabase::new(), transport, config);
            Ok((Backend::InMemory, runtime.category_deleted_consumer))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let config = Config::from_env();

    // 1. Initialize tracing
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Declare broker topology and wire the catalog on the configured backend.
    // Process-local broker until an external transport is configured.
    let broker = InMemoryBroker::new();
    declare_catalog_topology(&broker, &config.delayed_exchange)?;
    let (backend, consumer) = build_consumer(&config, Arc::new(broker)).await?;
    tracing::info!(backend = backend.as_str(), "catalog runtime ready");

    // 4. Run the integration event consumer in the background
    let consumer_task = tokio::spawn(async move {
        if let Err(error) = consumer.run().await {
            tracing::error!(%error, queue = consumer.queue(), "consumer stopped");
        }
    });

    // 5. Build the application
    let app = server::create_app(Arc::new(AppState { backend }), metrics_handle);

    // 6. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    consumer_task.abort();
    tracing::info!("server shut down gracefully");
    Ok(())
}
