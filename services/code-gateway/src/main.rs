//! Code Gateway
//!
//! Single-binary Rust service that:
//! 1. Accepts `GET /?query=...` with a plain-text prompt
//! 2. Sends it to Gemini with a fixed code-only instruction
//! 3. Rotates across configured API keys when a key hits its quota
//! 4. Returns the first fenced code block of the reply as `{"code": "..."}`

mod config;
mod error;
mod factory;
mod gateway;
mod journal;
mod metrics;
mod normalize;
mod orchestrator;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gemini_client::{GeminiProvider, SYSTEM_ACKNOWLEDGMENT, SYSTEM_INSTRUCTION};
use key_pool::KeyPool;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::{Config, KEYS_VAR, LEGACY_KEY_VAR};
use crate::factory::SessionFactory;
use crate::gateway::{GatewayState, PromptParams};
use crate::journal::Journal;
use crate::metrics::ServiceMetrics;
use crate::orchestrator::Orchestrator;

/// How long in-flight requests may run after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    gateway: GatewayState,
    prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
///
/// Applies a concurrency limit layer based on `max_connections` and a
/// permissive CORS layer so browser front-ends can call the gateway directly.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/", get(prompt_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting code-gateway");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    match &config_path {
        Some(path) => info!(path = %path.display(), "loading configuration"),
        None => info!("no config file, using defaults and environment"),
    }

    let mut config = Config::load(config_path.as_deref()).context("failed to load config")?;

    info!(
        listen_addr = %config.listen_addr(),
        model = %config.gemini.model,
        base_url = %config.gemini.base_url,
        keys = config.api_keys.len(),
        "configuration loaded"
    );

    // A missing journal file degrades to console-only records
    let (journal, _journal_guard) = match &config.log.file {
        Some(path) => match Journal::with_file(path) {
            Ok((journal, guard)) => (journal, Some(guard)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "journal file unavailable, logging to console only");
                (Journal::console_only(), None)
            }
        },
        None => (Journal::console_only(), None),
    };

    // An empty pool is an operator error, but the server still starts so
    // every request gets a clear configuration error instead of a refused
    // connection.
    let pool = match KeyPool::new(std::mem::take(&mut config.api_keys)) {
        Ok(pool) => Some(Arc::new(pool)),
        Err(e) => {
            error!(error = %e, "set {KEYS_VAR} (or {LEGACY_KEY_VAR}); all requests will fail");
            None
        }
    };

    let provider = GeminiProvider::new(
        reqwest::Client::new(),
        config.gemini.base_url.clone(),
        config.gemini.model.clone(),
        Duration::from_secs(config.gemini.timeout_secs),
    );
    let factory = SessionFactory::new(
        pool,
        Arc::new(provider),
        SYSTEM_INSTRUCTION,
        SYSTEM_ACKNOWLEDGMENT,
    );
    let orchestrator = Orchestrator::new(
        factory,
        journal.clone(),
        config.retry.attempts_per_key,
        Duration::from_millis(config.retry.overload_backoff_ms),
    );

    let service_metrics = ServiceMetrics::new();
    let in_flight = service_metrics.in_flight.clone();

    let app_state = AppState {
        gateway: GatewayState {
            orchestrator: Arc::new(orchestrator),
            journal: journal.clone(),
            metrics: service_metrics,
        },
        prometheus: prometheus_handle,
    };

    let app = build_router(app_state, config.server.max_connections);

    let listen_addr = config.listen_addr();
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;

    info!(addr = %listen_addr, "accepting requests");
    journal.info(
        "startup",
        serde_json::json!({ "addr": listen_addr.to_string(), "model": config.gemini.model }),
    );

    // Graceful shutdown: stop accepting on SIGTERM/SIGINT, then give in-flight
    // requests DRAIN_TIMEOUT to finish. The timer starts at signal receipt.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            let remaining = in_flight.load(Ordering::Relaxed);
            warn!(
                remaining,
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Prompt endpoint, `GET /?query=...`.
///
/// A malformed query string is treated the same as a missing `query`.
async fn prompt_handler(
    State(state): State<AppState>,
    params: Result<Query<PromptParams>, QueryRejection>,
) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    let query = params.ok().and_then(|Query(p)| p.query);
    gateway::handle_prompt(&state.gateway, query, request_id).await
}

/// Health endpoint: 200 when API keys are configured, 503 when every request
/// would fail with a configuration error.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let gateway = &state.gateway;
    let factory = gateway.orchestrator.factory();
    let keys = factory.pool_size();
    let uptime = gateway.metrics.started_at.elapsed().as_secs();
    let requests = gateway.metrics.requests_total.load(Ordering::Relaxed);
    let errors = gateway.metrics.errors_total.load(Ordering::Relaxed);

    let (status_code, status) = if keys > 0 {
        (axum::http::StatusCode::OK, "healthy")
    } else {
        (axum::http::StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status_code,
        axum::Json(serde_json::json!({
            "status": status,
            "provider": factory.provider_id(),
            "keys_configured": keys,
            "max_attempts": gateway.orchestrator.max_attempts(),
            "uptime_seconds": uptime,
            "requests_served": requests,
            "errors_total": errors,
        })),
    )
}

/// Prometheus metrics in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
