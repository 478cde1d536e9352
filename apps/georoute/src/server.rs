use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use georoute_pipeline::Pipeline;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

const TRACE_FAILED: &str = "Traceroute failed";

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(pipeline: Pipeline, shutdown: CancellationToken) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            shutdown,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TraceRequest {
    #[serde(default)]
    domain: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    version: &'static str,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/trace", post(trace))
        .route("/api/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves until `shutdown` fires; in-flight traces are cancelled with it.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let shutdown = state.shutdown.clone();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn trace(State(state): State<AppState>, body: Bytes) -> Response {
    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(err) => {
            tracing::debug!(error = %err, "rejecting trace request");
            return error_response(StatusCode::BAD_REQUEST, format!("invalid request body: {err}"));
        }
    };

    // Dropping the handler (client gone) cancels the trace and its prober.
    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    match state.pipeline.trace(request.domain.as_deref(), cancel).await {
        Ok(outcome) => Json(outcome.route).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "trace request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, TRACE_FAILED.to_string())
        }
    }
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn parse_request(body: &[u8]) -> Result<TraceRequest, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(TraceRequest::default());
    }
    serde_json::from_slice(body)
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorBody { error })).into_response()
}
