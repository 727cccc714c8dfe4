//! crates/healthlens_core/src/analysis.rs
//!
//! The analysis orchestrator: validates a request, builds the prompt, makes
//! exactly one call to the vision model and shapes the reply into the
//! outward envelope.

use crate::domain::{
    AnalysisData, AnalysisRequest, AnalysisResult, HealthProfile, HealthScore, Severity,
    UnknownAnalysisType, Warning,
};
use crate::parser::parse_model_response;
use crate::ports::{PortError, VisionModelService};
use crate::prompt::build_analysis_prompt;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Images are always sent to the model as JPEG.
pub const IMAGE_MIME_TYPE: &str = "image/jpeg";

/// Errors an analysis can end with. Degraded parses are not errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    /// The request itself is unusable; the model was not called.
    #[error("{0}")]
    Validation(String),
    /// The model credential is missing or was rejected.
    #[error("{0}")]
    Configuration(String),
    /// The model call failed (network, timeout, quota, bad reply).
    #[error("{0}")]
    Upstream(String),
}

impl From<PortError> for AnalysisError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Configuration(msg) => AnalysisError::Configuration(msg),
            other => AnalysisError::Upstream(other.to_string()),
        }
    }
}

impl From<UnknownAnalysisType> for AnalysisError {
    fn from(err: UnknownAnalysisType) -> Self {
        AnalysisError::Validation(err.to_string())
    }
}

/// Removes a `data:<mime>;base64,` prefix if one is present.
pub fn strip_data_url_prefix(image: &str) -> &str {
    match image.split_once("base64,") {
        Some((_, data)) => data,
        None => image,
    }
}

//=========================================================================================
// The Orchestrator
//=========================================================================================

/// Stateless per request; cheap to clone and share between handlers.
#[derive(Clone)]
pub struct AnalysisService {
    model: Arc<dyn VisionModelService>,
}

impl AnalysisService {
    pub fn new(model: Arc<dyn VisionModelService>) -> Self {
        Self { model }
    }

    /// Runs one analysis and returns the envelope. Never fails; errors are
    /// folded into `{success: false, error}`.
    pub async fn analyze(&self, request: AnalysisRequest) -> AnalysisResult {
        match self.try_analyze(request).await {
            Ok(data) => AnalysisResult::success(data),
            Err(e) => AnalysisResult::failure(e.to_string()),
        }
    }

    /// Runs one analysis, keeping the error class so callers can pick a status code.
    pub async fn try_analyze(&self, request: AnalysisRequest) -> Result<AnalysisData, AnalysisError> {
        let image = validate_image(&request.image_base64)?;
        let profile = request.user_profile.as_ref().map(HealthProfile::normalized);
        let prompt = build_analysis_prompt(
            request.analysis_type,
            profile.as_ref(),
            request.additional_context.as_deref(),
        );

        let raw = self
            .model
            .generate_from_image(&prompt, &image, IMAGE_MIME_TYPE)
            .await
            .map_err(|e| {
                error!(analysis_type = %request.analysis_type, "Vision model call failed: {}", e);
                AnalysisError::from(e)
            })?;

        let parsed = parse_model_response(&raw);
        if parsed.is_degraded() {
            warn!(
                analysis_type = %request.analysis_type,
                "Model response was not a JSON object; returning degraded record."
            );
        } else {
            info!(analysis_type = %request.analysis_type, "Analysis completed.");
        }

        Ok(shape_analysis_data(parsed.into_record()))
    }
}

/// Accepts padded and unpadded payloads alike.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Returns the payload with line breaks and other ASCII whitespace removed.
fn validate_image(image_base64: &str) -> Result<String, AnalysisError> {
    let data: String = strip_data_url_prefix(image_base64)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if data.is_empty() {
        return Err(AnalysisError::Validation("Image data is required".to_string()));
    }
    LENIENT_BASE64
        .decode(&data)
        .map_err(|e| AnalysisError::Validation(format!("Image data is not valid base64: {e}")))?;
    Ok(data)
}

/// Maps a decoded record into the envelope payload, defaulting absent fields.
fn shape_analysis_data(record: Map<String, Value>) -> AnalysisData {
    let quick_summary = record
        .get("quickSummary")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let health_score = record.get("healthScore").and_then(HealthScore::from_value);

    let warnings = record
        .get("warnings")
        .or_else(|| record.get("personalizedAlerts"))
        .and_then(Value::as_array)
        .map(|alerts| alerts.iter().filter_map(warning_from_value).collect())
        .unwrap_or_default();

    let recommendations = record
        .get("recommendations")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    // The whole record is kept so `productInfo`, `disclaimer` and any nested
    // `detailedAnalysis` all reach the client.
    let detailed_analysis = Value::Object(record);

    AnalysisData {
        quick_summary,
        detailed_analysis,
        health_score,
        warnings,
        recommendations,
    }
}

fn warning_from_value(value: &Value) -> Option<Warning> {
    let alert = value.as_object()?;
    let text = |key: &str| alert.get(key).and_then(Value::as_str);
    Some(Warning {
        severity: text("severity").map(Severity::from).unwrap_or_default(),
        category: text("category").unwrap_or("General").to_string(),
        message: text("message").unwrap_or_default().to_string(),
    })
}
