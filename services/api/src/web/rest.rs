//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the analysis endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::health::{self, HealthResponse, ServiceStatus, StatusResponse};
use crate::web::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
};
use healthlens_core::domain::{
    AnalysisData, AnalysisRequest, AnalysisResult, AnalysisType, HealthProfile, HealthScore,
    Severity, UnknownAnalysisType, Warning,
};
use healthlens_core::AnalysisError;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info_span, warn, Instrument};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        analyze_handler,
        medication_handler,
        food_handler,
        interactions_handler,
        allergens_handler,
        health::health_handler,
        health::status_handler,
    ),
    components(
        schemas(
            AnalyzeRequestBody,
            AnalysisResult,
            AnalysisData,
            HealthScore,
            Warning,
            Severity,
            HealthProfile,
            HealthResponse,
            StatusResponse,
            ServiceStatus
        )
    ),
    tags(
        (name = "HealthLens API", description = "Image analysis of medication labels, food packaging and menus.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Payload Structs
//=========================================================================================

/// The body accepted by every analysis endpoint. Fields are optional here so
/// missing values can be answered with the error envelope.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequestBody {
    /// Base64 image, with or without a `data:image/...;base64,` prefix.
    pub image_base64: Option<String>,
    /// One of `medication`, `food`, `interaction`, `allergen`. Ignored by the
    /// type-specific endpoints.
    pub analysis_type: Option<String>,
    pub user_profile: Option<HealthProfile>,
    pub additional_context: Option<String>,
}

type AnalysisReply = (StatusCode, Json<AnalysisResult>);

fn reply_error(status: StatusCode, message: impl Into<String>) -> AnalysisReply {
    (status, Json(AnalysisResult::failure(message)))
}

/// Bodies over the size limit keep their 413; every other bad body is a 400.
fn reply_rejection(rejection: JsonRejection) -> AnalysisReply {
    let status = match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::BAD_REQUEST,
    };
    reply_error(status, rejection.body_text())
}

fn status_for(err: &AnalysisError) -> StatusCode {
    match err {
        AnalysisError::Validation(_) => StatusCode::BAD_REQUEST,
        AnalysisError::Configuration(_) | AnalysisError::Upstream(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Analyze an image with an explicit analysis type.
#[utoipa::path(
    post,
    path = "/analysis/analyze",
    request_body = AnalyzeRequestBody,
    responses(
        (status = 200, description = "Analysis completed", body = AnalysisResult),
        (status = 400, description = "Missing image or invalid analysis type", body = AnalysisResult),
        (status = 413, description = "Request body exceeds the size limit", body = AnalysisResult),
        (status = 500, description = "Configuration or upstream model failure", body = AnalysisResult)
    )
)]
pub async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeRequestBody>, JsonRejection>,
) -> AnalysisReply {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => return reply_rejection(rejection),
    };

    let analysis_type = match body.analysis_type.as_deref() {
        Some(tag) => tag.parse::<AnalysisType>(),
        None => Err(UnknownAnalysisType(String::new())),
    };
    // The image is checked before the type, matching the order clients expect.
    if missing_image(&body) {
        return reply_error(StatusCode::BAD_REQUEST, "Image data is required");
    }
    match analysis_type {
        Ok(analysis_type) => run_analysis(&state, body, analysis_type).await,
        Err(e) => reply_error(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

/// Analyze a medication label.
#[utoipa::path(
    post,
    path = "/analysis/medication",
    request_body = AnalyzeRequestBody,
    responses((status = 200, description = "Analysis completed", body = AnalysisResult))
)]
pub async fn medication_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeRequestBody>, JsonRejection>,
) -> AnalysisReply {
    fixed_type_analysis(&state, payload, AnalysisType::Medication).await
}

/// Analyze a food label or menu item.
#[utoipa::path(
    post,
    path = "/analysis/food",
    request_body = AnalyzeRequestBody,
    responses((status = 200, description = "Analysis completed", body = AnalysisResult))
)]
pub async fn food_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeRequestBody>, JsonRejection>,
) -> AnalysisReply {
    fixed_type_analysis(&state, payload, AnalysisType::Food).await
}

/// Check the pictured medication against the user's current medications.
#[utoipa::path(
    post,
    path = "/analysis/interactions",
    request_body = AnalyzeRequestBody,
    responses((status = 200, description = "Analysis completed", body = AnalysisResult))
)]
pub async fn interactions_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeRequestBody>, JsonRejection>,
) -> AnalysisReply {
    fixed_type_analysis(&state, payload, AnalysisType::Interaction).await
}

/// Scan the pictured product for the user's allergens.
#[utoipa::path(
    post,
    path = "/analysis/allergens",
    request_body = AnalyzeRequestBody,
    responses((status = 200, description = "Analysis completed", body = AnalysisResult))
)]
pub async fn allergens_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeRequestBody>, JsonRejection>,
) -> AnalysisReply {
    fixed_type_analysis(&state, payload, AnalysisType::Allergen).await
}

//=========================================================================================
// Shared Helpers
//=========================================================================================

fn missing_image(body: &AnalyzeRequestBody) -> bool {
    body.image_base64
        .as_deref()
        .map_or(true, |image| image.trim().is_empty())
}

async fn fixed_type_analysis(
    state: &AppState,
    payload: Result<Json<AnalyzeRequestBody>, JsonRejection>,
    analysis_type: AnalysisType,
) -> AnalysisReply {
    match payload {
        Ok(Json(body)) if missing_image(&body) => {
            reply_error(StatusCode::BAD_REQUEST, "Image data is required")
        }
        Ok(Json(body)) => run_analysis(state, body, analysis_type).await,
        Err(rejection) => reply_rejection(rejection),
    }
}

async fn run_analysis(
    state: &AppState,
    body: AnalyzeRequestBody,
    analysis_type: AnalysisType,
) -> AnalysisReply {
    let request = AnalysisRequest::new(body.image_base64.unwrap_or_default(), analysis_type)
        .with_profile(body.user_profile)
        .with_context(body.additional_context);

    let span = info_span!("analysis", request_id = %Uuid::new_v4(), %analysis_type);
    match state.analysis.try_analyze(request).instrument(span).await {
        Ok(data) => (StatusCode::OK, Json(AnalysisResult::success(data))),
        Err(e) => {
            warn!(%analysis_type, "Analysis request failed: {}", e);
            reply_error(status_for(&e), e.to_string())
        }
    }
}
