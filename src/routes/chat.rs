use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::chat::{ChatLog, ChatMessage, PostMessageRequest},
    error::AppError,
    services::chat_service,
    state::SharedState,
};

/// Routes reading and appending to room chats.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/chat", post(post_message))
        .route("/chat/{room_id}", get(get_chat))
}

/// Ordered chat log of a room.
#[utoipa::path(
    get,
    path = "/chat/{room_id}",
    tag = "chat",
    params(("room_id" = String, Path, description = "Identifier of the room")),
    responses(
        (status = 200, description = "Chat log", body = ChatLog),
        (status = 404, description = "Room not found")
    )
)]
pub async fn get_chat(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Json<ChatLog>, AppError> {
    Ok(Json(chat_service::get_chat(&state, &room_id).await?))
}

/// Post a message to a room chat.
#[utoipa::path(
    post,
    path = "/chat",
    tag = "chat",
    request_body = PostMessageRequest,
    responses(
        (status = 200, description = "Message appended", body = ChatMessage),
        (status = 400, description = "Blank or oversized message"),
        (status = 404, description = "Room or player not found")
    )
)]
pub async fn post_message(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<PostMessageRequest>>,
) -> Result<Json<ChatMessage>, AppError> {
    Ok(Json(chat_service::post_message(&state, payload).await?))
}
