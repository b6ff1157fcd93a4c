use axum::{
    Router,
    extract::{Path, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{
    error::AppError,
    services::{room_service, websocket_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/ws/{room_id}/{player_id}",
    tag = "players",
    params(
        ("room_id" = String, Path, description = "Identifier of the room"),
        ("player_id" = String, Path, description = "Identifier of the player")
    ),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 404, description = "Room or player not found")
    )
)]
/// Upgrade the HTTP connection into a player WebSocket session.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Path((room_id, player_id)): Path<(String, String)>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    room_service::get_player(&state, &room_id, &player_id).await?;

    let shared_state = state.clone();
    Ok(ws.on_upgrade(move |socket| {
        websocket_service::handle_socket(shared_state, room_id, player_id, socket)
    }))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws/{room_id}/{player_id}", get(ws_handler))
}
