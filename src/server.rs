//! HTTP surface: `POST /parse` and `GET /health`.
//!
//! Every failure is answered as `{"error": "..."}`. A panic inside a
//! handler is caught and reported the same way with status 500; it never
//! takes the process down.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::booking::{BookingPipeline, ParseOutcome, PipelineError};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// The booking pipeline.
    pub pipeline: Arc<BookingPipeline>,
}

/// Body of `POST /parse`.
#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    /// Free-text booking request.
    pub query: Option<String>,
}

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable description.
    pub error: String,
}

/// An error response with its status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Build an error response.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = match &err {
            PipelineError::MissingQuery => StatusCode::BAD_REQUEST,
            PipelineError::MalformedModelOutput(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::Completer(_) => StatusCode::BAD_GATEWAY,
            PipelineError::CompleterTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        };
        Self::new(status, err.to_string())
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/parse", post(parse_query))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

async fn parse_query(
    State(state): State<AppState>,
    body: Result<Json<ParseRequest>, JsonRejection>,
) -> Result<Json<ParseOutcome>, ApiError> {
    let Json(request) =
        body.map_err(|rejection| ApiError::new(StatusCode::BAD_REQUEST, rejection.body_text()))?;
    let query = request.query.unwrap_or_default();
    let outcome = state.pipeline.parse(&query).await?;
    Ok(Json(outcome))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "model": state.pipeline.model_id(),
    }))
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_owned()
    } else {
        "unknown error".to_owned()
    };
    error!(error = %detail, "request handler panicked");
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, detail).into_response()
}

/// Bind and serve until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {addr}: {e}"))?;
    info!(%addr, model = %state.pipeline.model_id(), "straylight listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("server error: {e}"))?;

    info!("straylight stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
}
