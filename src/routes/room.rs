use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::room::{
        CreateRoomResponse, JoinRoomRequest, JoinRoomResponse, PlayerReadyRequest, PlayerSafe,
        RoomSafe,
    },
    error::AppError,
    services::room_service,
    state::SharedState,
};

/// Header carrying the credential returned when joining a room.
pub const PLAYER_TOKEN_HEADER: &str = "x-player-token";

/// Routes handling room lifecycle and lobby operations.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/join", post(join_room))
        .route("/rooms/ready", post(set_ready))
        .route("/rooms/{room_id}", get(get_room))
        .route("/rooms/{room_id}/me", get(whoami))
        .route("/rooms/{room_id}/players/{player_id}", get(get_player))
}

/// Create an empty room waiting for players.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    responses(
        (status = 200, description = "Room created", body = CreateRoomResponse),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
) -> Result<Json<CreateRoomResponse>, AppError> {
    Ok(Json(room_service::create_room(&state).await?))
}

/// Join a waiting room. The response carries the player's private credential.
#[utoipa::path(
    post,
    path = "/rooms/join",
    tag = "rooms",
    request_body = JoinRoomRequest,
    responses(
        (status = 200, description = "Player joined", body = JoinRoomResponse),
        (status = 400, description = "Invalid or duplicate name"),
        (status = 404, description = "Room not found"),
        (status = 409, description = "Room full or already playing")
    )
)]
pub async fn join_room(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<JoinRoomRequest>>,
) -> Result<Json<JoinRoomResponse>, AppError> {
    Ok(Json(room_service::join_room(&state, payload).await?))
}

/// Toggle the ready flag of a player.
#[utoipa::path(
    post,
    path = "/rooms/ready",
    tag = "rooms",
    request_body = PlayerReadyRequest,
    responses(
        (status = 200, description = "Ready flag updated", body = PlayerSafe),
        (status = 404, description = "Room or player not found"),
        (status = 409, description = "Game already started")
    )
)]
pub async fn set_ready(
    State(state): State<SharedState>,
    Json(payload): Json<PlayerReadyRequest>,
) -> Result<Json<PlayerSafe>, AppError> {
    Ok(Json(room_service::set_ready(&state, payload).await?))
}

/// Safe projection of a room.
#[utoipa::path(
    get,
    path = "/rooms/{room_id}",
    tag = "rooms",
    params(("room_id" = String, Path, description = "Identifier of the room")),
    responses(
        (status = 200, description = "Room", body = RoomSafe),
        (status = 404, description = "Room not found")
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomSafe>, AppError> {
    Ok(Json(room_service::get_room(&state, &room_id).await?))
}

/// Safe projection of one player.
#[utoipa::path(
    get,
    path = "/rooms/{room_id}/players/{player_id}",
    tag = "rooms",
    params(
        ("room_id" = String, Path, description = "Identifier of the room"),
        ("player_id" = String, Path, description = "Identifier of the player")
    ),
    responses(
        (status = 200, description = "Player", body = PlayerSafe),
        (status = 404, description = "Room or player not found")
    )
)]
pub async fn get_player(
    State(state): State<SharedState>,
    Path((room_id, player_id)): Path<(String, String)>,
) -> Result<Json<PlayerSafe>, AppError> {
    Ok(Json(
        room_service::get_player(&state, &room_id, &player_id).await?,
    ))
}

/// Resolve the player owning the credential sent in `x-player-token`.
#[utoipa::path(
    get,
    path = "/rooms/{room_id}/me",
    tag = "rooms",
    params(
        ("room_id" = String, Path, description = "Identifier of the room"),
        ("x-player-token" = String, Header, description = "Credential returned when joining")
    ),
    responses(
        (status = 200, description = "Player owning the credential", body = PlayerSafe),
        (status = 401, description = "Missing or unknown credential"),
        (status = 404, description = "Room not found")
    )
)]
pub async fn whoami(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<PlayerSafe>, AppError> {
    let Some(credential) = headers
        .get(PLAYER_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        return Err(AppError::Unauthorized("missing player token".into()));
    };
    Ok(Json(
        room_service::whoami(&state, &room_id, credential).await?,
    ))
}
