//! HTTP transport — axum router, request DTOs and error mapping.
//!
//! | Method | Path                 | Notes                                   |
//! |--------|----------------------|-----------------------------------------|
//! | GET    | `/api/opening-turn`  | `?vendor=<id>`                          |
//! | POST   | `/api/advance-turn`  | commits progress if `x-account-id` set  |
//! | GET    | `/api/leaderboard`   | top 20 by total reward                  |
//! | GET    | `/api/progress`      | requires `x-account-id`                 |
//! | POST   | `/api/accounts`      | registers a display name                |
//! | GET    | `/health`            | credential count, fallback-only flag    |
//!
//! The `x-account-id` header stands in for an authentication layer.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::error;

use tianguis_core::leaderboard::LeaderboardEntry;
use tianguis_core::types::{AccountId, Message, ProgressRecord};

use crate::orchestrator::{
    OpeningTurn, OrchestratorError, PlayerTurn, SessionOrchestrator, TurnReply,
};
use crate::session::SessionError;

/// Header carrying the caller's account id.
pub const ACCOUNT_HEADER: &str = "x-account-id";

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The orchestrator every route delegates to.
    pub orchestrator: Arc<SessionOrchestrator>,
}

impl AppState {
    /// Wrap an orchestrator.
    #[must_use]
    pub fn new(orchestrator: SessionOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/opening-turn", get(opening_turn))
        .route("/api/advance-turn", post(advance_turn))
        .route("/api/leaderboard", get(leaderboard))
        .route("/api/progress", get(progress))
        .route("/api/accounts", post(register))
        .route("/health", get(health))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Query of `GET /api/opening-turn`.
#[derive(Debug, Deserialize)]
pub struct OpeningTurnQuery {
    /// Vendor id.
    pub vendor: Option<String>,
}

/// Body of `POST /api/advance-turn`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceTurnRequest {
    /// Vendor id.
    pub vendor_id: String,
    /// Conversation so far.
    pub history: Vec<Message>,
    /// This round's player message.
    pub player_message: String,
    /// 1-based round being played.
    pub round_index: u32,
    /// Round target from the opening turn.
    pub round_target: u32,
}

/// Body of `POST /api/accounts`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Requested display name.
    pub username: Option<String>,
}

/// Response of `POST /api/accounts`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    /// New account id; send it back as `x-account-id`.
    pub account_id: AccountId,
    /// Registered display name.
    pub username: String,
}

/// Response of `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"` when the server answers.
    pub status: String,
    /// Number of generation credentials loaded.
    pub credentials: usize,
    /// Whether every reply comes from fallback tables.
    pub fallback_only: bool,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn opening_turn(
    State(state): State<AppState>,
    query: Result<Query<OpeningTurnQuery>, QueryRejection>,
) -> Result<Json<OpeningTurn>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let vendor = query
        .vendor
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("vendor is required".into()))?;
    Ok(Json(state.orchestrator.opening_turn(&vendor)?))
}

async fn advance_turn(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<AdvanceTurnRequest>, JsonRejection>,
) -> Result<Json<TurnReply>, ApiError> {
    let account = account_from_headers(&headers)?;
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let turn = PlayerTurn {
        vendor_id: body.vendor_id,
        history: body.history.into(),
        player_message: body.player_message,
        round_index: body.round_index,
        round_target: body.round_target,
    };
    Ok(Json(state.orchestrator.player_turn(account, turn).await?))
}

async fn leaderboard(State(state): State<AppState>) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    Ok(Json(state.orchestrator.leaderboard().await?))
}

async fn progress(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ProgressRecord>, ApiError> {
    let account = account_from_headers(&headers)?
        .ok_or_else(|| ApiError::Unauthorized(format!("{ACCOUNT_HEADER} header is required")))?;
    Ok(Json(state.orchestrator.progress(account).await?))
}

async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let username = body.username.unwrap_or_default();
    let profile = state.orchestrator.register(&username).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            account_id: profile.account_id,
            username: profile.display_name.unwrap_or_default(),
        }),
    ))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let generator = state.orchestrator.generator();
    Json(HealthResponse {
        status: "ok".into(),
        credentials: generator.pool().len(),
        fallback_only: generator.is_fallback_only(),
    })
}

fn account_from_headers(headers: &HeaderMap) -> Result<Option<AccountId>, ApiError> {
    let Some(value) = headers.get(ACCOUNT_HEADER) else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|_| ApiError::BadRequest(format!("{ACCOUNT_HEADER} is not valid text")))?;
    raw.parse()
        .map(Some)
        .map_err(|_| ApiError::BadRequest(format!("{ACCOUNT_HEADER} is not a valid account id")))
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// 400: rejected input.
    BadRequest(String),
    /// 401: missing account context.
    Unauthorized(String),
    /// 500: detail is logged, never returned.
    Internal(String),
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::UnknownVendor(id) => Self::BadRequest(format!("unknown vendor: {id}")),
            OrchestratorError::Validation(msg)
            | OrchestratorError::Session(SessionError::Validation(msg)) => Self::BadRequest(msg),
            err @ OrchestratorError::Session(SessionError::InvalidState { .. }) => {
                Self::BadRequest(err.to_string())
            }
            OrchestratorError::Storage(err) => Self::Internal(err.to_string()),
            OrchestratorError::Join(err) => Self::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::Internal(detail) => {
                error!(error = %detail, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: message,
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}
