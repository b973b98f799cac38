//! Gateway HTTP server (single port): LINE webhook plus health probes.

use crate::channels::{verify_signature, WebhookBody, SIGNATURE_HEADER};
use crate::config::Settings;
use crate::gateway::context::AppContext;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Routes for a built context. Exposed so callers can serve it on their own listener.
pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/health", get(health_text))
        .route("/callback", post(line_callback))
        .with_state(ctx)
}

/// Run the gateway server; binds to settings.bind:settings.port.
pub async fn run_gateway(settings: Settings) -> Result<()> {
    let bind_addr = format!("{}:{}", settings.bind, settings.port);
    log::info!(
        "events log: {}, search log: {}",
        settings.events_log.display(),
        settings.search_log.display()
    );
    let ctx = Arc::new(AppContext::from_settings(settings)?);
    let app = router(ctx);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Completes on SIGINT or SIGTERM. A signal that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// POST /callback: verify X-Line-Signature, log the body, run every event, then answer.
async fn line_callback(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let request_id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    if !verify_signature(&body, &ctx.settings.channel_secret, signature) {
        log::warn!("[{}] rejected webhook: invalid signature", request_id);
        return (StatusCode::BAD_REQUEST, "Invalid signature");
    }

    let parsed: Option<Value> = serde_json::from_slice(&body).ok();
    match parsed {
        Some(ref doc) => ctx.events_log.append_json(doc).await,
        None => {
            ctx.events_log
                .append_raw(&String::from_utf8_lossy(&body))
                .await
        }
    }

    let Some(doc) = parsed else {
        log::warn!("[{}] webhook body is not JSON; nothing to do", request_id);
        return (StatusCode::OK, "OK");
    };
    let webhook: WebhookBody = match serde_json::from_value(doc) {
        Ok(w) => w,
        Err(e) => {
            log::warn!("[{}] unexpected webhook shape: {}", request_id, e);
            return (StatusCode::OK, "OK");
        }
    };
    log::info!("[{}] webhook with {} event(s)", request_id, webhook.events.len());

    for event in webhook.events {
        match ctx.handlers.get(&event.typ) {
            Some(handler) => handler(ctx.clone(), event, request_id.clone()).await,
            None => log::debug!("[{}] no handler for {} event", request_id, event.typ),
        }
    }
    (StatusCode::OK, "OK")
}

/// GET /health: plain-text liveness probe.
async fn health_text() -> &'static str {
    "ok"
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    Json(json!({
        "runtime": "running",
        "port": ctx.settings.port,
    }))
}
