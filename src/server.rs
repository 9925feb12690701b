//! Verifying echo server
//!
//! Implements:
//! - POST {webhook_path} - verify the Talk signature and echo the payload
//!
//! Requests are independent: nothing is kept between them, and random
//! values are not remembered (replayed requests verify again).

use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::client::truncate;
use crate::config::ProbeConfig;
use crate::error::WebhookError;
use crate::signing::{verify_webhook_request, RANDOM_HEADER, SIGNATURE_HEADER};
use crate::types::{BotSecret, EchoResponse};

const LOG_LIMIT: usize = 200;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub secret: Arc<BotSecret>,
}

impl AppState {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            secret: Arc::new(config.secret.clone()),
        }
    }
}

/// Single-route router for the webhook path.
pub fn router(state: AppState, webhook_path: &str) -> Router {
    Router::new()
        .route(webhook_path, post(webhook_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle one webhook delivery.
///
/// 1. Read the random value and signature headers (missing means empty)
/// 2. Verify the HMAC over `random ++ body`, else 401
/// 3. Parse the body as JSON, else 500 with the parser message
/// 4. Echo the payload inside `{status, text, received_payload}`
pub async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<EchoResponse>, WebhookError> {
    let talk_headers = [RANDOM_HEADER, SIGNATURE_HEADER].map(|name| {
        let value = headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        (name, value)
    });

    info!(
        random = talk_headers[0].1,
        signature = talk_headers[1].1,
        body = %truncate(&String::from_utf8_lossy(&body), LOG_LIMIT),
        "Webhook received"
    );

    verify_webhook_request(talk_headers, &body, &state.secret).map_err(|e| {
        warn!(error = %e, "Rejecting webhook");
        WebhookError::from(e)
    })?;

    info!("Signature validated");

    let payload: serde_json::Value = serde_json::from_slice(&body).map_err(|e| {
        error!(error = %e, "Failed to parse webhook payload");
        WebhookError::ParseError(e.to_string())
    })?;

    info!(
        event_type = payload.get("type").and_then(|t| t.as_str()).unwrap_or("<none>"),
        "Event parsed"
    );

    let response = EchoResponse::ok(payload);
    if let Ok(echo) = serde_json::to_string(&response) {
        info!(response = %truncate(&echo, LOG_LIMIT), "Echoing payload");
    }

    Ok(Json(response))
}

/// Bind the configured host and port.
pub async fn bind(config: &ProbeConfig) -> std::io::Result<TcpListener> {
    TcpListener::bind(config.bind_addr()).await
}

/// Serve the webhook route on `listener` until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    config: &ProbeConfig,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(AppState::new(config), &config.webhook_path);

    if let Ok(addr) = listener.local_addr() {
        info!(
            address = %addr,
            path = %config.webhook_path,
            "Test server listening, press Ctrl-C to exit"
        );
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server shut down gracefully");
    Ok(())
}

/// Graceful shutdown signal handler
///
/// Waits for Ctrl-C or SIGTERM. If a handler cannot be installed that
/// branch never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl-C, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
