//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the session REST endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use coaching_core::domain::{ChatMessage, Scenario, Session};
use coaching_core::ports::PortError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_session_handler,
        list_sessions_handler,
        get_session_handler,
        complete_session_handler,
        crate::web::chat::chat_handler,
        crate::web::chat::chat_stream_handler,
    ),
    components(
        schemas(
            CreateSessionRequest,
            SessionResponse,
            SessionDetailResponse,
            MessageResponse,
            ErrorBody,
            crate::web::chat::ChatTurnRequest,
            crate::web::chat::ChatTurnResponse,
        )
    ),
    tags(
        (name = "Coaching API", description = "API endpoints for GROW coaching conversations.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The payload for creating a coaching session.
#[derive(Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    /// One of `work_problem` or `career_development`.
    pub scenario: String,
}

/// One coaching session as returned by the API.
#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub scenario: String,
    pub status: String,
    pub current_phase: String,
    pub message_count: i32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i32>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        SessionResponse {
            id: session.id,
            user_id: session.user_id,
            scenario: session.scenario.as_str().to_string(),
            status: session.status.as_str().to_string(),
            current_phase: session.current_phase.as_str().to_string(),
            message_count: session.message_count,
            started_at: session.started_at,
            ended_at: session.ended_at,
            duration_seconds: session.duration_seconds,
        }
    }
}

/// One message of a session as returned by the API.
#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: Uuid,
    pub role: String,
    pub content: String,
    pub phase: String,
    pub created_at: DateTime<Utc>,
}

impl From<ChatMessage> for MessageResponse {
    fn from(message: ChatMessage) -> Self {
        MessageResponse {
            id: message.id,
            role: message.role.as_str().to_string(),
            content: message.content,
            phase: message.phase.as_str().to_string(),
            created_at: message.created_at,
        }
    }
}

/// A session together with its full ordered message history.
#[derive(Serialize, ToSchema)]
pub struct SessionDetailResponse {
    #[serde(flatten)]
    pub session: SessionResponse,
    pub messages: Vec<MessageResponse>,
}

/// The error payload returned by every handler.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

/// Maps a core port error to the HTTP response the caller sees.
pub fn port_error_response(e: PortError) -> (StatusCode, Json<ErrorBody>) {
    let status = match &e {
        PortError::Validation(_) => StatusCode::BAD_REQUEST,
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Upstream(_) => StatusCode::BAD_GATEWAY,
        PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("request failed: {e}");
    }
    (
        status,
        Json(ErrorBody {
            error: e.to_string(),
        }),
    )
}

/// Extracts the calling user's id from the `x-user-id` header. Real
/// authentication lives upstream of this service.
pub fn require_user_id(headers: &HeaderMap) -> Result<Uuid, (StatusCode, Json<ErrorBody>)> {
    let user_id_str = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: "x-user-id header is required".to_string(),
                }),
            )
        })?;

    Uuid::parse_str(user_id_str).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "Invalid x-user-id format".to_string(),
            }),
        )
    })
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Create a new coaching session for a scenario.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created successfully", body = SessionResponse),
        (status = 400, description = "Bad request (e.g., missing header or unknown scenario)", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn create_session_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let user_id = require_user_id(&headers)?;

    let scenario = Scenario::from_str(&payload.scenario).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: format!("Unknown scenario '{}'", payload.scenario),
            }),
        )
    })?;

    let session = app_state
        .store
        .create_session(user_id, scenario)
        .await
        .map_err(port_error_response)?;

    Ok((StatusCode::CREATED, Json(SessionResponse::from(session))))
}

/// List the calling user's sessions, most recent first.
#[utoipa::path(
    get,
    path = "/sessions",
    responses(
        (status = 200, description = "Sessions for the calling user", body = [SessionResponse]),
        (status = 400, description = "Missing or invalid x-user-id header", body = ErrorBody)
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn list_sessions_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let user_id = require_user_id(&headers)?;

    let sessions = app_state
        .store
        .list_sessions_by_user(user_id)
        .await
        .map_err(port_error_response)?;

    let body: Vec<SessionResponse> = sessions.into_iter().map(SessionResponse::from).collect();
    Ok(Json(body))
}

/// Fetch one session with its full ordered message history.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    responses(
        (status = 200, description = "The session and its messages", body = SessionDetailResponse),
        (status = 404, description = "Session not found", body = ErrorBody)
    ),
    params(
        ("id" = Uuid, Path, description = "The session id.")
    )
)]
pub async fn get_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let session = app_state
        .store
        .get_session(session_id)
        .await
        .map_err(port_error_response)?;
    let messages = app_state
        .store
        .get_messages(session_id)
        .await
        .map_err(port_error_response)?;

    Ok(Json(SessionDetailResponse {
        session: SessionResponse::from(session),
        messages: messages.into_iter().map(MessageResponse::from).collect(),
    }))
}

/// Explicitly end a session, recording its end time and duration.
#[utoipa::path(
    post,
    path = "/sessions/{id}/complete",
    responses(
        (status = 200, description = "The completed session", body = SessionResponse),
        (status = 404, description = "Session not found", body = ErrorBody)
    ),
    params(
        ("id" = Uuid, Path, description = "The session id.")
    )
)]
pub async fn complete_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let session = app_state
        .store
        .complete_session(session_id)
        .await
        .map_err(port_error_response)?;

    Ok(Json(SessionResponse::from(session)))
}
