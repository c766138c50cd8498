/// HTTP front door for the webhook pipeline.
///
/// One route per concern: the Telegram webhook receiver, its CORS preflight,
/// and a health probe. The webhook always answers HTTP 200 with the reply
/// envelope — soft failures included — so the transport can deliver the text;
/// only a body that is not JSON at all produces a 500.
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::Value;
use subtle::ConstantTimeEq;
use tracing::{error, info, warn};

use crate::pipeline::MessagePipeline;
use crate::reply;

/// Max webhook payload size: 1 MB.
const WEBHOOK_MAX_BODY: usize = 1_048_576;

/// Telegram echoes the `secret_token` given to `setWebhook` in this header.
const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<MessagePipeline>,
    webhook_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn new(pipeline: Arc<MessagePipeline>, webhook_secret: Option<String>) -> Self {
        Self {
            pipeline,
            webhook_secret: webhook_secret.map(Into::into),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/webhook/telegram",
            post(webhook_handler).options(preflight_handler),
        )
        .route("/api/health", get(health_handler))
        .with_state(state)
}

/// POST /webhook/telegram — run one update through the pipeline.
async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = &state.webhook_secret {
        let provided = headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !secret_matches(secret, provided) {
            warn!("webhook request with missing or wrong secret token");
            return StatusCode::FORBIDDEN.into_response();
        }
    }

    if body.len() > WEBHOOK_MAX_BODY {
        warn!("webhook payload too large ({} bytes)", body.len());
        return StatusCode::PAYLOAD_TOO_LARGE.into_response();
    }

    let update: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            error!("webhook body is not JSON: {}", e);
            return with_cors(
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    axum::Json(serde_json::json!({
                        "error": format!("Invalid request body: {}", e)
                    })),
                )
                    .into_response(),
            );
        }
    };

    let outcome = state.pipeline.handle_update(update).await;
    let envelope = reply::render(&outcome);
    with_cors((StatusCode::OK, axum::Json(envelope)).into_response())
}

/// OPTIONS /webhook/telegram — empty success for CORS preflight.
async fn preflight_handler() -> Response {
    with_cors(StatusCode::NO_CONTENT.into_response())
}

/// GET /api/health — health check endpoint.
async fn health_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION
    }))
}

fn secret_matches(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        header::HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        header::HeaderValue::from_static("content-type, x-telegram-bot-api-secret-token"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        header::HeaderValue::from_static("POST, OPTIONS"),
    );
    response
}

/// Start the HTTP server. Returns the join handle of the serving task.
pub async fn start(host: &str, port: u16, state: AppState) -> Result<tokio::task::JoinHandle<()>> {
    let app = build_router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("webhook gateway listening on {}", addr);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("gateway server error: {}", e);
        }
    });

    Ok(handle)
}
