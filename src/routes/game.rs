use axum::{Json, Router, extract::State, routing::post};
use axum_valid::Valid;

use crate::{
    dto::{
        game::{GuessRequest, GuessResponse, PickSongRequest, SongChoice, StartGameRequest},
        room::RoomSafe,
    },
    error::AppError,
    services::game_service,
    state::SharedState,
};

/// Routes driving a running game.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/game/start", post(start_game))
        .route("/game/pick", post(pick_song))
        .route("/game/guess", post(guess))
}

/// Start the game once every player is ready.
#[utoipa::path(
    post,
    path = "/game/start",
    tag = "game",
    request_body = StartGameRequest,
    responses(
        (status = 200, description = "Game started", body = RoomSafe),
        (status = 404, description = "Room not found"),
        (status = 409, description = "Players not ready or game already started")
    )
)]
pub async fn start_game(
    State(state): State<SharedState>,
    Json(payload): Json<StartGameRequest>,
) -> Result<Json<RoomSafe>, AppError> {
    Ok(Json(game_service::start_game(&state, payload).await?))
}

/// Pick one of the songs offered to the current singer.
#[utoipa::path(
    post,
    path = "/game/pick",
    tag = "game",
    request_body = PickSongRequest,
    responses(
        (status = 200, description = "Song picked", body = SongChoice),
        (status = 400, description = "Song was not offered"),
        (status = 409, description = "Not the singer or not in the pick phase")
    )
)]
pub async fn pick_song(
    State(state): State<SharedState>,
    Json(payload): Json<PickSongRequest>,
) -> Result<Json<SongChoice>, AppError> {
    Ok(Json(game_service::pick_song(&state, payload).await?))
}

/// Guess the song of the current turn.
#[utoipa::path(
    post,
    path = "/game/guess",
    tag = "game",
    request_body = GuessRequest,
    responses(
        (status = 200, description = "Guess evaluated", body = GuessResponse),
        (status = 404, description = "Room or player not found"),
        (status = 409, description = "Not in the guess phase")
    )
)]
pub async fn guess(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<GuessRequest>>,
) -> Result<Json<GuessResponse>, AppError> {
    Ok(Json(game_service::guess(&state, payload).await?))
}
