//! Box office storefront HTTP server.

use anyhow::Context;
use axum::{Router, routing::get};
use boxoffice_core::environment::{Clock, SystemClock};
use boxoffice_core::store::{EventStore, TicketStore};
use boxoffice_postgres::PostgresStore;
use boxoffice_runtime::metrics::MetricsServer;
use boxoffice_runtime::retry::RetryPolicy;
use boxoffice_testing::InMemoryStore;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use ticketing::config::{Config, StorageBackend};
use ticketing::seed::seed_demo_events;
use ticketing::server::{AppState, build_router};
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ticketing=info,boxoffice_runtime=info,boxoffice_postgres=info,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting box office storefront");

    let config = Config::from_env()?;
    info!(
        backend = ?config.storage.backend,
        addr = %config.server_addr(),
        public_base_url = %config.storefront.public_base_url,
        "Configuration loaded"
    );

    let metrics_handle = start_metrics(&config).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let retry = RetryPolicy::builder()
        .max_retries(config.issuance.max_retries)
        .initial_delay(config.issuance.retry_initial_delay())
        .build();

    let (events, tickets, database): (Arc<dyn EventStore>, Arc<dyn TicketStore>, Option<PostgresStore>) =
        match config.storage.backend {
            StorageBackend::Memory => {
                warn!("Using the in-memory store; data is lost on restart");
                let store = Arc::new(InMemoryStore::new());
                let events: Arc<dyn EventStore> = store.clone();
                let tickets: Arc<dyn TicketStore> = store;
                (events, tickets, None)
            }
            StorageBackend::Postgres => {
                let store = PostgresStore::with_max_connections(
                    &config.storage.database_url,
                    config.storage.max_connections,
                )
                .await
                .context("connecting to PostgreSQL")?;
                store.migrate().await?;
                let shared = Arc::new(store.clone());
                let events: Arc<dyn EventStore> = shared.clone();
                let tickets: Arc<dyn TicketStore> = shared;
                (events, tickets, Some(store))
            }
        };

    if config.storefront.seed_demo_events {
        seed_demo_events(events.as_ref(), clock.now()).await?;
    }

    let mut state = AppState::new(events, tickets, clock, config.storefront.clone(), retry);
    if let Some(database) = database {
        state = state.with_database(database);
    }

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.server_addr())
        .await
        .with_context(|| format!("binding {}", config.server_addr()))?;
    info!(address = %config.server_addr(), "Server listening");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(());
        })
        .into_future();
    let drain_timeout = Duration::from_secs(config.server.shutdown_timeout);

    tokio::select! {
        result = server => result?,
        () = async move {
            if shutdown_rx.await.is_ok() {
                tokio::time::sleep(drain_timeout).await;
            } else {
                std::future::pending::<()>().await;
            }
        } => warn!(timeout_secs = config.server.shutdown_timeout, "Connections still open after shutdown timeout"),
    }

    if let Some(handle) = metrics_handle {
        handle.abort();
    }
    info!("Server stopped");
    Ok(())
}

/// Install the Prometheus recorder and serve `/metrics` on its own port.
async fn start_metrics(config: &Config) -> anyhow::Result<Option<tokio::task::JoinHandle<()>>> {
    let addr = config
        .metrics_addr()
        .parse()
        .with_context(|| format!("invalid metrics address {}", config.metrics_addr()))?;
    let mut server = MetricsServer::new(addr);
    server.start()?;

    let Some(handle) = server.handle().cloned() else {
        return Ok(None);
    };

    let router = Router::new().route("/metrics", get(move || async move { handle.render() }));
    let listener = tokio::net::TcpListener::bind(server.addr())
        .await
        .with_context(|| format!("binding metrics endpoint {}", server.addr()))?;
    info!(addr = %server.addr(), "Metrics endpoint listening");

    Ok(Some(tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router).await {
            warn!(error = %err, "Metrics endpoint stopped");
        }
    })))
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal, shutting down gracefully..."),
        () = terminate => info!("Received SIGTERM signal, shutting down gracefully..."),
    }
}
