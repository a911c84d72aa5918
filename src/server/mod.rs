//! HTTP surface and server lifecycle

pub mod handlers;
pub mod response;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServiceConfig;
use crate::correlation::{RequestCorrelator, ResultStore};
use crate::engine::{BrowserEngine, EngineLifecycleManager};
use crate::page_handler::PageHandler;
use crate::service::ScrapeService;
use crate::utils::constants::RESULT_SWEEP_INTERVAL_SECS;

/// State shared by all route handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ScrapeService>,
}

/// Fully wired service: registry, store, engine loop and the scrape API
pub struct App {
    pub correlator: Arc<RequestCorrelator>,
    pub store: Arc<ResultStore>,
    pub lifecycle: Arc<EngineLifecycleManager>,
    pub service: Arc<ScrapeService>,
}

impl App {
    /// Wire every component around `engine`; nothing starts running yet
    pub fn new(engine: Arc<dyn BrowserEngine>, config: &ServiceConfig) -> Self {
        let correlator = Arc::new(RequestCorrelator::new());
        let store = Arc::new(ResultStore::new());
        let handler = Arc::new(PageHandler::new(
            Arc::clone(&engine),
            Arc::clone(&correlator),
            Arc::clone(&store),
        ));
        let lifecycle = EngineLifecycleManager::new(engine, handler, config.loop_options());
        let service = Arc::new(ScrapeService::new(
            Arc::clone(&correlator),
            Arc::clone(&store),
            Arc::clone(&lifecycle),
            config.service_timeouts(),
        ));

        Self {
            correlator,
            store,
            lifecycle,
            service,
        }
    }

    #[must_use]
    pub fn router(&self) -> Router {
        router(AppState {
            service: Arc::clone(&self.service),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/scrape", post(handlers::scrape))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl+C/SIGTERM, then stop the engine loop and the browser
pub async fn run_server(config: ServiceConfig, engine: Arc<dyn BrowserEngine>) -> Result<()> {
    let app = App::new(engine, &config);

    let cancel = CancellationToken::new();
    let sweeper = Arc::clone(&app.store).start_sweep_task(
        config.result_ttl(),
        Duration::from_secs(RESULT_SWEEP_INTERVAL_SECS),
        cancel.clone(),
    );

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Listening on http://{}", address);

    axum::serve(listener, app.router())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("HTTP server stopped, shutting down engine");
    cancel.cancel();
    if let Err(e) = sweeper.await {
        warn!("Result sweep task ended abnormally: {}", e);
    }
    app.lifecycle.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => warn!("Received Ctrl+C signal"),
        () = terminate => warn!("Received SIGTERM signal"),
    }
}
