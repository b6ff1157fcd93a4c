use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::GameStatusKind,
    dto::{format_system_time, validation::validate_player_name},
    state::game::{Game, GameStatus, Player, Room, RoomLifecycle},
};

/// Player view safe to broadcast: built field by field, it has no room for the credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PlayerSafe {
    pub id: String,
    pub name: String,
    pub ready: bool,
    pub connected: bool,
    pub score: i32,
}

impl From<&Player> for PlayerSafe {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id.clone(),
            name: player.name.clone(),
            ready: player.ready,
            connected: player.connected,
            score: player.score,
        }
    }
}

/// Coarse lifecycle exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoomStateDto {
    Waiting,
    Playing,
    Finished,
}

impl From<RoomLifecycle> for RoomStateDto {
    fn from(value: RoomLifecycle) -> Self {
        match value {
            RoomLifecycle::Waiting => Self::Waiting,
            RoomLifecycle::Playing => Self::Playing,
            RoomLifecycle::Finished => Self::Finished,
        }
    }
}

/// Tagged game status (`type` plus optional `detail`).
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct GameStatusDto {
    #[serde(rename = "type")]
    #[schema(value_type = String)]
    pub kind: GameStatusKind,
    #[schema(value_type = Object)]
    pub detail: Option<Value>,
}

impl From<&GameStatus> for GameStatusDto {
    fn from(status: &GameStatus) -> Self {
        Self {
            kind: status.kind(),
            detail: status.detail(),
        }
    }
}

/// Public view of a running game. Songs stay hidden so guessers cannot peek.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameSafe {
    pub status: GameStatusDto,
    pub num_rounds: usize,
    pub turn_duration_secs: u32,
    pub pick_duration_secs: u32,
    pub current_round: usize,
    pub current_turn: usize,
    /// Singer order shared by every round.
    pub turn_order: Vec<String>,
}

impl From<&Game> for GameSafe {
    fn from(game: &Game) -> Self {
        Self {
            status: (&game.status).into(),
            num_rounds: game.settings.num_rounds,
            turn_duration_secs: game.settings.turn_duration_secs,
            pick_duration_secs: game.settings.pick_duration_secs,
            current_round: game.current_round,
            current_turn: game.current_turn,
            turn_order: game.turn_order(),
        }
    }
}

/// Room view safe to broadcast.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomSafe {
    pub room_id: String,
    pub owner: Option<String>,
    pub state: RoomStateDto,
    pub players: Vec<PlayerSafe>,
    pub game: Option<GameSafe>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Room> for RoomSafe {
    fn from(room: &Room) -> Self {
        Self {
            room_id: room.id.clone(),
            owner: room.owner.clone(),
            state: room.lifecycle.into(),
            players: room.players.iter().map(PlayerSafe::from).collect(),
            game: room.game.as_ref().map(GameSafe::from),
            created_at: format_system_time(room.created_at),
            updated_at: format_system_time(room.updated_at),
        }
    }
}

/// Response of `POST /rooms`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateRoomResponse {
    pub room_id: String,
}

/// Payload used to join a room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRoomRequest {
    pub room_id: String,
    #[validate(custom(function = "validate_player_name"))]
    pub player_name: String,
}

/// Response of a successful join: the only place the credential is ever returned.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinRoomResponse {
    pub player: PlayerSafe,
    pub cookie: String,
}

/// Payload used to toggle a player's ready flag.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PlayerReadyRequest {
    pub room_id: String,
    pub player_id: String,
    pub ready: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_projection_never_carries_the_credential() {
        let player = Player::new("ana".into());
        let credential = player.credential().to_string();

        let mut room = Room::new();
        room.players.push(player.clone());

        let player_json = serde_json::to_string(&PlayerSafe::from(&player)).unwrap();
        let room_json = serde_json::to_string(&RoomSafe::from(&room)).unwrap();
        for json in [player_json, room_json] {
            assert!(!json.contains(&credential));
            assert!(!json.contains("cookie"));
            assert!(!json.contains("credential"));
        }
    }

    #[test]
    fn join_request_rejects_blank_names() {
        let request = JoinRoomRequest {
            room_id: "r1".into(),
            player_name: "  ".into(),
        };
        assert!(request.validate().is_err());
    }
}
