//! services/api/src/web/chat.rs
//!
//! The coaching-turn handlers: one batch endpoint returning the complete
//! reply, and one streaming endpoint relaying reply fragments to the client
//! as server-sent events.

use crate::web::rest::{port_error_response, ErrorBody};
use crate::web::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Json},
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

/// How many decoded fragments may queue up between the driver and a slow
/// SSE client before the relay applies backpressure.
const FRAGMENT_CHANNEL_CAPACITY: usize = 32;

/// The payload for one coaching turn.
#[derive(Deserialize, ToSchema)]
pub struct ChatTurnRequest {
    pub session_id: Uuid,
    pub message: String,
}

/// The result of a completed batch turn.
#[derive(Serialize, ToSchema)]
pub struct ChatTurnResponse {
    /// The assistant's full reply.
    pub message: String,
    /// The session phase after this turn (possibly advanced).
    pub phase: String,
}

/// Run one coaching turn in batch mode.
#[utoipa::path(
    post,
    path = "/coaching/chat",
    request_body = ChatTurnRequest,
    responses(
        (status = 200, description = "The assistant's reply and the resulting phase", body = ChatTurnResponse),
        (status = 400, description = "Missing session id or message text", body = ErrorBody),
        (status = 404, description = "Session not found", body = ErrorBody),
        (status = 502, description = "The language-model service failed", body = ErrorBody)
    )
)]
pub async fn chat_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<ChatTurnRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let outcome = app_state
        .driver
        .handle_turn(payload.session_id, &payload.message)
        .await
        .map_err(port_error_response)?;

    Ok(Json(ChatTurnResponse {
        message: outcome.reply,
        phase: outcome.phase.as_str().to_string(),
    }))
}

/// Run one coaching turn in streaming mode.
///
/// Reply fragments are relayed as unnamed SSE `data` events as they are
/// decoded. When the turn finishes, a final `phase` event carries the
/// (possibly advanced) session phase; a failed turn emits an `error` event
/// instead. The turn itself runs on a detached task, so a client that
/// disconnects mid-stream never prevents the reply from being persisted.
#[utoipa::path(
    post,
    path = "/coaching/chat/stream",
    request_body = ChatTurnRequest,
    responses(
        (status = 200, description = "An SSE stream of reply fragments followed by a `phase` event")
    )
)]
pub async fn chat_stream_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<ChatTurnRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (fragment_tx, mut fragment_rx) = mpsc::channel::<String>(FRAGMENT_CHANNEL_CAPACITY);

    let driver = app_state.driver.clone();
    let turn = tokio::spawn(async move {
        driver
            .handle_turn_streaming(payload.session_id, &payload.message, fragment_tx)
            .await
    });

    let stream = async_stream::stream! {
        while let Some(fragment) = fragment_rx.recv().await {
            yield Ok(Event::default().data(fragment));
        }

        match turn.await {
            Ok(Ok(outcome)) => {
                yield Ok(Event::default().event("phase").data(outcome.phase.as_str()));
            }
            Ok(Err(e)) => {
                yield Ok(Event::default().event("error").data(e.to_string()));
            }
            Err(e) => {
                error!("streaming turn task failed: {e}");
                yield Ok(Event::default().event("error").data("internal error"));
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
