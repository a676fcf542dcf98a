//! REST API Server for the property advisor
//!
//! Exposes the conversational turn as a server-sent-event stream, plus a
//! direct calculation endpoint that bypasses the dialogue.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::agent::Orchestrator;
use crate::error::OrchestrationError;
use crate::memory::SessionStore;
use crate::models::{TurnEvent, TurnRequest};
use crate::tools::{FailureKind, ToolDispatcher, ToolKind, ToolResult};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CalculationRequest {
    #[serde(alias = "calculationKind")]
    pub kind: String,
    #[serde(default)]
    pub inputs: Value,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
    pub sessions: Arc<dyn SessionStore>,
    pub dispatcher: ToolDispatcher,
}

fn status_for(error: &OrchestrationError) -> StatusCode {
    match error {
        OrchestrationError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        e if e.is_provider_failure() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn to_sse(event: TurnEvent) -> Event {
    match event {
        TurnEvent::Fragment { text, tool_used } => {
            let mut payload = serde_json::json!({ "text": text });
            if let Some(tool) = tool_used {
                payload["toolUsed"] = Value::String(tool);
            }
            Event::default().event("fragment").data(payload.to_string())
        }
        TurnEvent::Done => Event::default().event("done").data("[DONE]"),
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health(State(state): State<ApiState>) -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "sessions": state.sessions.len().await,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<TurnRequest>,
) -> Response {
    info!(
        session_key = %req.session_key,
        scenario = %req.scenario,
        "Received chat turn"
    );

    match state.orchestrator.handle_turn(req).await {
        Ok(turn) => {
            let events = turn.map(|event| Ok::<Event, Infallible>(to_sse(event)));
            Sse::new(events)
                .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
                .into_response()
        }
        Err(e) => {
            warn!(error = %e, "Chat turn rejected");
            (status_for(&e), Json(ApiResponse::error(e.to_string()))).into_response()
        }
    }
}

/// =============================
/// Direct Calculation Endpoint
/// =============================

async fn calculate_handler(
    State(state): State<ApiState>,
    Json(req): Json<CalculationRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let Some(kind) = ToolKind::from_calculation_kind(&req.kind) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(format!(
                "unknown calculation kind '{}'",
                req.kind
            ))),
        );
    };

    info!(tool = kind.name(), "Direct calculation");

    match state.dispatcher.run(kind, &req.inputs) {
        ToolResult::Success(data) => (StatusCode::OK, Json(ApiResponse::success(data))),
        ToolResult::Failure(failure) => {
            let status = match failure.kind {
                FailureKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            };
            (status, Json(ApiResponse::error(failure.error)))
        }
    }
}

/// =============================
/// Session Teardown
/// =============================

async fn delete_session(
    State(state): State<ApiState>,
    Path(session_key): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    if state.sessions.remove(&session_key).await {
        (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "sessionKey": session_key,
                "removed": true,
            }))),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!(
                "session '{}' not found",
                session_key
            ))),
        )
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = ApiState {
        sessions: orchestrator.sessions().clone(),
        orchestrator,
        dispatcher: ToolDispatcher::new(),
    };

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat_handler))
        .route("/api/calculate", post(calculate_handler))
        .route("/api/sessions/:session_key", delete(delete_session))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<Orchestrator>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamingConfig;
    use crate::memory::{ContextManager, InMemorySessionStore};
    use crate::provider::{ChatCompletion, ScriptedProvider, ScriptedReply};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;

    fn router_with(provider: ScriptedProvider) -> Router {
        let orchestrator = Orchestrator::new(
            Arc::new(provider),
            Arc::new(InMemorySessionStore::default()),
            ToolDispatcher::new(),
            ContextManager::new(),
            StreamingConfig {
                chunk_chars: 64,
                chunk_delay: Duration::ZERO,
            },
        );
        create_router(Arc::new(orchestrator))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            status_for(&OrchestrationError::InvalidRequest("empty".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&OrchestrationError::ProviderUnavailable("down".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&OrchestrationError::ProviderResponse("no choices".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&OrchestrationError::Config("PORT".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_calculate_mortgage() {
        let router = router_with(ScriptedProvider::new(Vec::new()));
        let response = router
            .oneshot(post_json(
                "/api/calculate",
                serde_json::json!({
                    "kind": "mortgage",
                    "inputs": { "propertyPrice": 1_200_000, "downPayment": 100_000 }
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: ApiResponse = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(body.success);
        let data = body.data.unwrap();
        assert_eq!(data["downPayment"], 240_000.0);
        assert_eq!(data["loanAmount"], 960_000.0);
    }

    #[tokio::test]
    async fn test_calculate_reports_missing_fields() {
        let router = router_with(ScriptedProvider::new(Vec::new()));
        let response = router
            .oneshot(post_json(
                "/api/calculate",
                serde_json::json!({ "kind": "buyVsRent", "inputs": { "propertyPrice": 900_000 } }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ApiResponse = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(!body.success);
        assert!(body.error.unwrap().contains("monthlyRent"));
    }

    #[tokio::test]
    async fn test_calculate_unknown_kind() {
        let router = router_with(ScriptedProvider::new(Vec::new()));
        let response = router
            .oneshot(post_json(
                "/api/calculate",
                serde_json::json!({ "kind": "stocks", "inputs": {} }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_streams_fragments_and_done() {
        let router = router_with(ScriptedProvider::new([ScriptedReply::Completion(
            ChatCompletion::text("Happy to help."),
        )]));

        let response = router
            .oneshot(post_json(
                "/api/chat",
                serde_json::json!({
                    "sessionKey": "abc",
                    "scenario": "buy-vs-rent",
                    "message": "hello"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/event-stream"));

        let body = body_string(response).await;
        assert!(body.contains("event: fragment"));
        assert!(body.contains(r#"{"text":"Happy to help."}"#));
        assert!(body.trim_end().ends_with("data: [DONE]"));
    }

    #[tokio::test]
    async fn test_chat_rejections_use_distinct_statuses() {
        let router = router_with(ScriptedProvider::new(Vec::new()));
        let response = router
            .oneshot(post_json(
                "/api/chat",
                serde_json::json!({ "sessionKey": "abc", "scenario": "gold", "message": "hi" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let router = router_with(ScriptedProvider::unconfigured());
        let response = router
            .oneshot(post_json(
                "/api/chat",
                serde_json::json!({ "sessionKey": "abc", "scenario": "buy-vs-rent", "message": "hi" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: ApiResponse = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(!body.success);
    }

    #[tokio::test]
    async fn test_delete_session_and_health() {
        let router = router_with(ScriptedProvider::new([ScriptedReply::Completion(
            ChatCompletion::text("Hi!"),
        )]));

        let response = router
            .clone()
            .oneshot(post_json(
                "/api/chat",
                serde_json::json!({ "sessionKey": "abc", "scenario": "affordability", "message": "hi" }),
            ))
            .await
            .unwrap();
        body_string(response).await;

        let health = router
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let health: Value = serde_json::from_str(&body_string(health).await).unwrap();
        assert_eq!(health["sessions"], 1);

        let removed = router
            .clone()
            .oneshot(
                Request::delete("/api/sessions/abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(removed.status(), StatusCode::OK);

        let missing = router
            .oneshot(
                Request::delete("/api/sessions/abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
