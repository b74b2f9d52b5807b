// structured-gateway-rs/src/lib.rs
// Router, handlers and shared state for the structured gateway

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::State,
    http::{header::HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use structured_output::StructuredSession;

pub mod page;
pub mod service_config;
pub mod validation;

use validation::{
    parse_json_body, payload_limit_config, sanitize_json_object, validate_content_type,
    validate_run_request, ApiValidationError,
};

static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

/// Run request body (JSON)
#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub prompt: String,
    #[serde(default)]
    pub model_path: Option<String>,
}

/// Run response body: the formatted result or `Error: ...` text
#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub output: String,
}

#[derive(Debug, Serialize)]
pub struct TraceResponse {
    pub trace: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub service_name: String,
    pub backend: String,
    pub uptime_seconds: u64,
    pub status: String,
}

/// Web front for one structured-output session
pub struct StructuredGateway {
    session: StructuredSession,
    default_model: String,
    backend_name: &'static str,
    /// One run at a time, so "show trace" always matches the last finished run
    run_lock: Mutex<()>,
}

impl StructuredGateway {
    pub fn new(session: StructuredSession, default_model: impl Into<String>) -> Self {
        let backend_name = session.backend_name();
        Lazy::force(&START_TIME);
        Self {
            session,
            default_model: default_model.into(),
            backend_name,
            run_lock: Mutex::new(()),
        }
    }

    /// Create the Axum router with all routes and middleware
    pub fn create_router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/", get(Self::root_handler))
            .route("/health", get(Self::health_handler))
            .route("/api/v1/run", post(Self::run_handler))
            .route("/api/v1/trace", get(Self::trace_handler))
            .layer(payload_limit_config())
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
            .with_state(self)
    }

    async fn root_handler(State(state): State<Arc<Self>>) -> Html<String> {
        Html(page::render_index(&state.default_model))
    }

    async fn health_handler(State(state): State<Arc<Self>>) -> impl IntoResponse {
        Json(HealthResponse {
            healthy: true,
            service_name: "structured-gateway".to_string(),
            backend: state.backend_name.to_string(),
            uptime_seconds: START_TIME.elapsed().as_secs(),
            status: "SERVING".to_string(),
        })
    }

    async fn run_handler(
        State(state): State<Arc<Self>>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response {
        let request = match Self::parse_run_request(&headers, &body) {
            Ok(request) => request,
            Err(err) => {
                log::warn!("Rejected run request: {}", err);
                return err.to_response().into_response();
            }
        };

        let model = request
            .model_path
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| state.default_model.clone());

        log::info!(
            "Run request: model={}, prompt_chars={}",
            model,
            request.prompt.chars().count()
        );

        let _guard = state.run_lock.lock().await;
        let output = state.session.run(&request.prompt, &model).await;

        (StatusCode::OK, Json(RunResponse { output })).into_response()
    }

    async fn trace_handler(State(state): State<Arc<Self>>) -> Json<TraceResponse> {
        let _guard = state.run_lock.lock().await;
        Json(TraceResponse {
            trace: state.session.show_trace().await,
        })
    }

    fn parse_run_request(headers: &HeaderMap, body: &[u8]) -> Result<RunRequest, ApiValidationError> {
        validate_content_type(headers, "application/json")?;
        let mut json_value = parse_json_body(body)?;
        validate_run_request(&json_value)?;
        sanitize_json_object(&mut json_value);

        serde_json::from_value(json_value)
            .map_err(|e| ApiValidationError::InvalidFormat(format!("Invalid run request: {}", e)))
    }
}
