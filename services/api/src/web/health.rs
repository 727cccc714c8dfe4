//! services/api/src/web/health.rs
//!
//! Liveness and readiness endpoints.

use crate::web::state::AppState;
use axum::{extract::State, response::Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    success: bool,
    message: String,
    version: String,
    timestamp: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct ServiceStatus {
    api: String,
    /// `configured` or `not configured`.
    gemini: String,
}

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    success: bool,
    status: String,
    services: ServiceStatus,
    environment: String,
    timestamp: DateTime<Utc>,
}

/// Liveness check.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "The API is running", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        message: "HealthLens API is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

/// Readiness check, reporting whether the Gemini credential is configured.
#[utoipa::path(
    get,
    path = "/health/status",
    responses((status = 200, description = "Service status", body = StatusResponse))
)]
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let gemini = if state.config.gemini_api_key.is_some() {
        "configured"
    } else {
        "not configured"
    };

    Json(StatusResponse {
        success: true,
        status: "healthy".to_string(),
        services: ServiceStatus {
            api: "operational".to_string(),
            gemini: gemini.to_string(),
        },
        environment: state.config.environment.clone(),
        timestamp: Utc::now(),
    })
}
