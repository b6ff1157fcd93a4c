use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Karavan Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::room::create_room,
        crate::routes::room::join_room,
        crate::routes::room::set_ready,
        crate::routes::room::get_room,
        crate::routes::room::get_player,
        crate::routes::room::whoami,
        crate::routes::game::start_game,
        crate::routes::game::pick_song,
        crate::routes::game::guess,
        crate::routes::chat::get_chat,
        crate::routes::chat::post_message,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::room::RoomSafe,
            crate::dto::room::PlayerSafe,
            crate::dto::room::GameSafe,
            crate::dto::room::GameStatusDto,
            crate::dto::room::RoomStateDto,
            crate::dto::game::SongChoice,
            crate::dto::chat::ChatMessage,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ErrorEvent,
            crate::dto::events::PhaseName,
            crate::dto::events::PlayerReadyEvent,
            crate::dto::events::AllPlayersReadyEvent,
            crate::dto::events::GameStartEvent,
            crate::dto::events::PhaseChangeEvent,
            crate::dto::events::PickSongEvent,
            crate::dto::events::TimerEvent,
            crate::dto::events::NoSongChosenEvent,
            crate::dto::events::TurnEndedPrematurelyEvent,
            crate::dto::events::SingerSongDataEvent,
            crate::dto::events::CorrectGuessEvent,
            crate::dto::events::SongRevealEvent,
            crate::dto::events::TurnChangeEvent,
            crate::dto::events::RoundChangeEvent,
            crate::dto::events::ScoreLine,
            crate::dto::events::GameEndEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Room creation, lobby and player lookups"),
        (name = "game", description = "Start, pick and guess operations of a running game"),
        (name = "chat", description = "Room chat"),
        (name = "players", description = "WebSocket sessions of players"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<_> = doc.paths.paths.keys().cloned().collect();
        for expected in [
            "/healthcheck",
            "/rooms",
            "/rooms/join",
            "/rooms/ready",
            "/rooms/{room_id}",
            "/rooms/{room_id}/me",
            "/rooms/{room_id}/players/{player_id}",
            "/game/start",
            "/game/pick",
            "/game/guess",
            "/chat",
            "/chat/{room_id}",
            "/ws/{room_id}/{player_id}",
        ] {
            assert!(paths.iter().any(|path| path == expected), "missing {expected}");
        }
    }
}
