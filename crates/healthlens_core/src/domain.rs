//! crates/healthlens_core/src/domain.rs
//!
//! Defines the core data structures exchanged between the client, the API
//! service and the external vision model. Field names serialize in camelCase
//! because the browser and CLI clients speak that dialect on the wire.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Product name recorded in history when the model did not identify one.
pub const UNKNOWN_PRODUCT: &str = "Unknown Product";

//=========================================================================================
// Analysis Type
//=========================================================================================

/// The kind of analysis the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    Medication,
    Food,
    Interaction,
    Allergen,
}

impl AnalysisType {
    pub const ALL: [AnalysisType; 4] = [
        AnalysisType::Medication,
        AnalysisType::Food,
        AnalysisType::Interaction,
        AnalysisType::Allergen,
    ];

    /// The lowercase wire tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Medication => "medication",
            AnalysisType::Food => "food",
            AnalysisType::Interaction => "interaction",
            AnalysisType::Allergen => "allergen",
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name one of the four analysis types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Valid analysis type is required (medication, food, interaction, allergen)")]
pub struct UnknownAnalysisType(pub String);

impl FromStr for AnalysisType {
    type Err = UnknownAnalysisType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        AnalysisType::ALL
            .into_iter()
            .find(|t| t.as_str() == tag)
            .ok_or_else(|| UnknownAnalysisType(s.to_string()))
    }
}

//=========================================================================================
// Health Profile
//=========================================================================================

/// The user-supplied health profile used to personalize the analysis.
/// Every field is optional; absent and empty values are treated the same.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct HealthProfile {
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub age: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub current_medications: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allergies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dietary_restrictions: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_pregnant: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_breastfeeding: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_notes: Option<String>,
}

impl HealthProfile {
    /// Returns a copy with list entries trimmed, blank entries dropped and
    /// blank free-text fields cleared.
    pub fn normalized(&self) -> Self {
        Self {
            age: trimmed(self.age.as_deref()),
            conditions: clean_list(&self.conditions),
            current_medications: clean_list(&self.current_medications),
            allergies: clean_list(&self.allergies),
            dietary_restrictions: clean_list(&self.dietary_restrictions),
            is_pregnant: self.is_pregnant,
            is_breastfeeding: self.is_breastfeeding,
            additional_notes: trimmed(self.additional_notes.as_deref()),
        }
    }

    /// True when no field would contribute a line to the prompt.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn clean_list(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_false(value: &bool) -> bool {
    !*value
}

// Browser forms send the age as text, but hand-written profiles often use a number.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

//=========================================================================================
// Analysis Request
//=========================================================================================

/// A single analysis request, consumed once by the `AnalysisService`.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Base64 image payload, optionally carrying a `data:...;base64,` prefix.
    pub image_base64: String,
    pub analysis_type: AnalysisType,
    pub user_profile: Option<HealthProfile>,
    pub additional_context: Option<String>,
}

impl AnalysisRequest {
    pub fn new(image_base64: impl Into<String>, analysis_type: AnalysisType) -> Self {
        Self {
            image_base64: image_base64.into(),
            analysis_type,
            user_profile: None,
            additional_context: None,
        }
    }

    pub fn with_profile(mut self, profile: Option<HealthProfile>) -> Self {
        self.user_profile = profile;
        self
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.additional_context = context;
        self
    }
}

//=========================================================================================
// Analysis Result (outward envelope)
//=========================================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Severity {
    Critical,
    Moderate,
    #[default]
    Info,
}

// Unknown severities from the model are downgraded to `Info` rather than rejected.
impl From<String> for Severity {
    fn from(value: String) -> Self {
        Severity::from(value.as_str())
    }
}

impl From<&str> for Severity {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "moderate" => Severity::Moderate,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Critical => "critical",
            Severity::Moderate => "moderate",
            Severity::Info => "info",
        })
    }
}

/// A single warning surfaced to the user, in the order the model returned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Warning {
    pub severity: Severity,
    pub category: String,
    pub message: String,
}

/// Sub-scores on a 0–10 scale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct HealthScore {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nutritional_value: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredient_quality: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall: Option<u8>,
}

impl HealthScore {
    /// Reads a score object produced by the model. Numbers are rounded and
    /// clamped into 0–10, anything else is ignored. Returns `None` when no
    /// sub-score is usable.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let read = |key: &str| {
            obj.get(key)
                .and_then(Value::as_f64)
                .map(|n| n.round().clamp(0.0, 10.0) as u8)
        };
        let score = Self {
            nutritional_value: read("nutritionalValue"),
            ingredient_quality: read("ingredientQuality"),
            processing_level: read("processingLevel"),
            overall: read("overall"),
        };
        (score != Self::default()).then_some(score)
    }
}

/// The payload of a successful analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct AnalysisData {
    #[serde(default)]
    pub quick_summary: String,
    /// The full record decoded from the model, kept opaque.
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub detailed_analysis: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_score: Option<HealthScore>,
    #[serde(default)]
    pub warnings: Vec<Warning>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl AnalysisData {
    /// The product name the model identified, if any.
    ///
    /// Looks in `productInfo.name` first and then in the nested
    /// `detailedAnalysis.productInfo.name` layout some prompts produce.
    pub fn product_name(&self) -> Option<&str> {
        let top = &self.detailed_analysis;
        [
            top.pointer("/productInfo/name"),
            top.pointer("/detailedAnalysis/productInfo/name"),
        ]
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|name| !name.is_empty())
    }
}

/// The outward `{success, data|error}` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AnalysisResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<AnalysisData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResult {
    pub fn success(data: AnalysisData) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

//=========================================================================================
// History
//=========================================================================================

/// One persisted entry of the client-local analysis history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: String,
    /// Creation time in epoch milliseconds.
    pub timestamp: i64,
    pub analysis_type: String,
    pub result: AnalysisResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_thumbnail: Option<String>,
    #[serde(default = "unknown_product")]
    pub product_name: String,
}

fn unknown_product() -> String {
    UNKNOWN_PRODUCT.to_string()
}
