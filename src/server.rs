//! HTTP daemon hosting the suggestion pipeline.
//!
//! Three routes: `POST /suggest` runs the pipeline, `GET /health` reports
//! liveness plus the active provider, `GET /stats` returns the audit log
//! statistics verbatim. Errors use a `{"detail": ...}` body, which is what
//! the CLI parses back.

use crate::audit::AuditStats;
use crate::config::Config;
use crate::pipeline::{SuggestError, SuggestionPipeline, SuggestionRequest, SuggestionResponse};
use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

pub type AppState = Arc<SuggestionPipeline>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub provider: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/suggest", post(suggest))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .with_state(state)
}

async fn suggest(
    State(pipeline): State<AppState>,
    Json(request): Json<SuggestionRequest>,
) -> Result<Json<SuggestionResponse>, (StatusCode, Json<ErrorBody>)> {
    match pipeline.suggest(&request).await {
        Ok(response) => Ok(Json(response)),
        Err(err) => {
            let status = match &err {
                SuggestError::EmptyGoal => StatusCode::BAD_REQUEST,
                SuggestError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            warn!(goal = %request.goal, "Suggestion failed: {err}");
            Err((
                status,
                Json(ErrorBody {
                    detail: err.to_string(),
                }),
            ))
        }
    }
}

async fn health(State(pipeline): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        provider: pipeline.provider_name().to_string(),
    })
}

async fn stats(State(pipeline): State<AppState>) -> Json<AuditStats> {
    Json(pipeline.audit().stats())
}

/// Run the daemon in the foreground until interrupted.
pub async fn serve(config: &Config) -> Result<()> {
    let pipeline = Arc::new(SuggestionPipeline::from_config(config)?);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        "Daemon listening on {addr} with provider '{}'",
        config.provider
    );
    axum::serve(listener, router(pipeline)).await?;
    Ok(())
}
