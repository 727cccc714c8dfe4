pub mod health;
pub mod rest;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, DATE},
        HeaderName, Method,
    },
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use health::{health_handler, status_handler};
pub use rest::{
    allergens_handler, analyze_handler, food_handler, interactions_handler, medication_handler,
};
pub use state::AppState;

/// Any origin may call the API; preflight requests are answered by the CORS layer.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::OPTIONS,
            Method::PATCH,
            Method::DELETE,
            Method::POST,
            Method::PUT,
        ])
        .allow_headers([
            HeaderName::from_static("x-csrf-token"),
            HeaderName::from_static("x-requested-with"),
            ACCEPT,
            HeaderName::from_static("accept-version"),
            CONTENT_LENGTH,
            HeaderName::from_static("content-md5"),
            CONTENT_TYPE,
            DATE,
            HeaderName::from_static("x-api-version"),
        ])
}

/// Builds the API router: analysis and health routes, body limit, tracing and CORS.
pub fn router(app_state: Arc<AppState>) -> Router {
    let max_body_bytes = app_state.config.max_body_bytes;

    let analysis_routes = Router::new()
        .route("/analysis/analyze", post(analyze_handler))
        .route("/analysis/medication", post(medication_handler))
        .route("/analysis/food", post(food_handler))
        .route("/analysis/interactions", post(interactions_handler))
        .route("/analysis/allergens", post(allergens_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes));

    let health_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/health/status", get(status_handler));

    Router::new()
        .merge(analysis_routes)
        .merge(health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use healthlens_core::{AnalysisService, PortError, PortResult, VisionModelService};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tower::ServiceExt;

    const JPEG_B64: &str = "/9j/4AAQSkZJRgABAQAAAQABAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8U";

    struct StubModel {
        reply: PortResult<String>,
        calls: AtomicUsize,
        last_prompt: Mutex<String>,
    }

    impl StubModel {
        fn replying(reply: PortResult<String>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
                last_prompt: Mutex::new(String::new()),
            })
        }
    }

    #[async_trait]
    impl VisionModelService for StubModel {
        async fn generate_from_image(&self, prompt: &str, _: &str, _: &str) -> PortResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = prompt.to_string();
            self.reply.clone()
        }
    }

    fn app_with(model: Arc<StubModel>, api_key: Option<&str>) -> Router {
        let mut config = Config::from_lookup(|_| None).unwrap();
        config.gemini_api_key = api_key.map(str::to_string);
        app_with_config(model, config)
    }

    fn app_with_config(model: Arc<StubModel>, config: Config) -> Router {
        router(Arc::new(AppState {
            config: Arc::new(config),
            analysis: AnalysisService::new(model),
        }))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_running() {
        let app = app_with(StubModel::replying(Ok("{}".into())), Some("key"));
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["message"], json!("HealthLens API is running"));
    }

    #[tokio::test]
    async fn status_reports_credential_presence() {
        for (key, expected) in [(Some("key"), "configured"), (None, "not configured")] {
            let app = app_with(StubModel::replying(Ok("{}".into())), key);
            let req = Request::builder().uri("/health/status").body(Body::empty()).unwrap();

            let body = read_json(app.oneshot(req).await.unwrap()).await;

            assert_eq!(body["services"]["gemini"], json!(expected));
            assert_eq!(body["services"]["api"], json!("operational"));
            assert_eq!(body["environment"], json!("development"));
        }
    }

    #[tokio::test]
    async fn missing_image_is_rejected_before_model_call() {
        let model = StubModel::replying(Ok("{}".into()));
        let app = app_with(model.clone(), Some("key"));

        let response = app
            .oneshot(post_json("/analysis/analyze", json!({ "imageBase64": "", "analysisType": "food" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert_eq!(body, json!({ "success": false, "error": "Image data is required" }));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_analysis_type_is_rejected() {
        let model = StubModel::replying(Ok("{}".into()));
        let app = app_with(model.clone(), Some("key"));

        let response = app
            .oneshot(post_json("/analysis/analyze", json!({ "imageBase64": JPEG_B64, "analysisType": "vitamin" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("Valid analysis type is required"));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_json_gets_error_envelope() {
        let app = app_with(StubModel::replying(Ok("{}".into())), Some("key"));
        let req = Request::builder()
            .method("POST")
            .uri("/analysis/analyze")
            .header("Content-Type", "application/json")
            .body(Body::from("{ not json"))
            .unwrap();

        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert_eq!(body["success"], json!(false));
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn oversized_body_is_413_envelope() {
        let model = StubModel::replying(Ok("{}".into()));
        let config = Config::from_lookup(|name| match name {
            "GEMINI_API_KEY" => Some("key".to_string()),
            "MAX_BODY_BYTES" => Some("256".to_string()),
            _ => None,
        })
        .unwrap();
        let app = app_with_config(model.clone(), config);
        let image = "A".repeat(1024);

        let response = app
            .oneshot(post_json("/analysis/analyze", json!({ "imageBase64": image, "analysisType": "food" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = read_json(response).await;
        assert_eq!(body["success"], json!(false));
        assert!(body["error"].is_string());
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn allergen_analysis_end_to_end() {
        let reply = "```json\n{\"quickSummary\":\"Contains peanut.\",\"keyComponents\":{\"allergens\":[\"peanut\"]}}\n```";
        let model = StubModel::replying(Ok(reply.into()));
        let app = app_with(model.clone(), Some("key"));

        let response = app
            .oneshot(post_json(
                "/analysis/analyze",
                json!({
                    "imageBase64": format!("data:image/jpeg;base64,{JPEG_B64}"),
                    "analysisType": "allergen",
                    "userProfile": { "allergies": ["peanut"] }
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["success"], json!(true));
        assert!(body.get("error").is_none());
        assert_eq!(body["data"]["quickSummary"], json!("Contains peanut."));
        assert!(body["data"]["detailedAnalysis"]["keyComponents"]["allergens"]
            .as_array()
            .unwrap()
            .contains(&json!("peanut")));
        assert_eq!(body["data"]["warnings"], json!([]));
        assert_eq!(body["data"]["recommendations"], json!([]));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn upstream_failure_is_500_envelope() {
        let model = StubModel::replying(Err(PortError::Unexpected("quota exceeded".into())));
        let app = app_with(model, Some("key"));

        let response = app
            .oneshot(post_json("/analysis/food", json!({ "imageBase64": JPEG_B64 })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert_eq!(body["success"], json!(false));
        assert!(body.get("data").is_none());
        assert!(body["error"].as_str().unwrap().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn convenience_route_fixes_analysis_type() {
        let model = StubModel::replying(Ok("{\"quickSummary\":\"ok\"}".into()));
        let app = app_with(model.clone(), Some("key"));

        let response = app
            .oneshot(post_json(
                "/analysis/interactions",
                json!({ "imageBase64": JPEG_B64, "analysisType": "food" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let prompt = model.last_prompt.lock().unwrap().clone();
        assert!(prompt.contains("## Current Analysis Type: INTERACTION"));
    }

    #[tokio::test]
    async fn cors_preflight_is_answered() {
        let app = app_with(StubModel::replying(Ok("{}".into())), Some("key"));
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/analysis/analyze")
            .header("Origin", "http://localhost:5173")
            .header("Access-Control-Request-Method", "POST")
            .header("Access-Control-Request-Headers", "content-type")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }
}
