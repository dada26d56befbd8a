//! REST API for the collaboration engine
//!
//! Thin adapter: validates the request, feeds recent transcript turns in as
//! context, runs `process_user_query` and records the exchange.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::engine::CollaborationEngine;
use crate::memory::{session_key, TranscriptEntry, TranscriptRole, TranscriptStore};
use crate::models::QueryRequest;

/// Earlier turns handed to the specialists as context.
const PRIOR_TURN_LIMIT: usize = 6;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct QueryBody {
    #[serde(alias = "phone_number")]
    pub user_identifier: Option<String>,
    pub query: String,
    pub session_id: Option<String>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
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
    pub engine: Arc<CollaborationEngine>,
    pub transcripts: Arc<dyn TranscriptStore>,
}

/// =============================
/// Health & Roster
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn list_agents(State(state): State<ApiState>) -> Json<ApiResponse> {
    Json(ApiResponse::success(serde_json::json!({
        "agents": state.engine.agent_roster(),
    })))
}

/// =============================
/// Query Endpoint
/// =============================

async fn run_query(
    State(state): State<ApiState>,
    Json(body): Json<QueryBody>,
) -> (StatusCode, Json<ApiResponse>) {
    let query = body.query.trim().to_string();
    if query.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Query must not be empty".into())),
        );
    }

    let user_identifier = body
        .user_identifier
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());
    let Some(user_identifier) = user_identifier else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(
                "user_identifier or phone_number is required".into(),
            )),
        );
    };

    let session_id = body
        .session_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());

    let prior_turns = match session_id.as_deref() {
        Some(id) => match state
            .transcripts
            .load_recent(session_key(id), PRIOR_TURN_LIMIT)
            .await
        {
            Ok(entries) => entries.iter().map(TranscriptEntry::as_turn).collect(),
            Err(e) => {
                warn!(error = %e, "Failed to load transcript, continuing without context");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    info!(
        session_id = ?session_id,
        prior_turns = prior_turns.len(),
        "Received collaboration query"
    );

    let request = QueryRequest {
        user_identifier,
        query: query.clone(),
        session_id,
        prior_turns,
    };
    let response = state.engine.process_user_query(request).await;

    if !response.success {
        let message = response
            .error
            .clone()
            .unwrap_or_else(|| "Collaboration failed".to_string());
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(message)),
        );
    }

    let key = session_key(&response.session_id);
    for entry in [
        TranscriptEntry::new(TranscriptRole::User, query),
        TranscriptEntry::new(TranscriptRole::Agent, response.final_recommendation.clone()),
    ] {
        if let Err(e) = state.transcripts.append(key, entry).await {
            warn!(error = %e, session_id = %response.session_id, "Failed to record transcript");
        }
    }

    (StatusCode::OK, Json(ApiResponse::success(response)))
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/agents", get(list_agents))
        .route("/api/query", post(run_query))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
