//! Router assembly and the HTTP listener.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::auth::{require_bearer, AuthConfig};
use super::handlers;
use super::AppState;
use crate::{AppError, Result};

/// Build the application router.
///
/// Webhooks and `/health` are open; sweep triggers and the queue API
/// require the bearer token.
pub fn router(state: Arc<AppState>) -> Router {
    let auth = AuthConfig {
        bearer_token: state.config.api_token.clone(),
    };

    let protected = Router::new()
        .route("/cron/automations", post(handlers::run_automations))
        .route("/cron/queue", post(handlers::run_queue))
        .route("/api/queue", post(handlers::enqueue))
        .route("/api/queue/{id}/retry", post(handlers::retry))
        .route_layer(middleware::from_fn_with_state(auth, require_bearer));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/webhook/whatsapp", post(handlers::message_webhook))
        .route("/webhook/whatsapp/status", post(handlers::status_webhook))
        .merge(protected)
        .with_state(state)
}

/// Bind `config.http_port` on all interfaces and serve until `ct` fires.
///
/// # Errors
///
/// Returns `AppError::Config` if the port cannot be bound or the server
/// fails.
pub async fn serve(state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let bind = SocketAddr::from(([0, 0, 0, 0], state.config.http_port));
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind HTTP on {bind}: {err}")))?;
    serve_on(listener, state, ct).await
}

/// Serve on an already-bound listener until `ct` fires.
///
/// # Errors
///
/// Returns `AppError::Config` if the server fails.
pub async fn serve_on(
    listener: TcpListener,
    state: Arc<AppState>,
    ct: CancellationToken,
) -> Result<()> {
    let local = listener
        .local_addr()
        .map_err(|err| AppError::Io(format!("listener address: {err}")))?;
    info!(%local, "starting HTTP server");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Config(format!("HTTP server error: {err}")))?;

    info!("HTTP server shut down");
    Ok(())
}
