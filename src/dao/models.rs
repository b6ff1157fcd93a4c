use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::SystemTime;

/// Aggregate room record persisted by the storage layer (players and game included).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomEntity {
    /// Stable identifier for the room.
    pub room_id: String,
    /// Identifier of the player allowed to start the game.
    #[serde(default)]
    pub owner: Option<String>,
    /// Players that joined the room, in join order.
    #[serde(default)]
    pub players: Vec<PlayerEntity>,
    /// Game data, present once the owner started a game.
    #[serde(default)]
    pub game: Option<GameEntity>,
    /// Coarse lifecycle of the room.
    pub room_state: RoomStateEntity,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// Last time the room record was rewritten.
    pub updated_at: SystemTime,
}

/// Coarse lifecycle of a persisted room.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoomStateEntity {
    /// Players are joining and readying up.
    Waiting,
    /// A game is running.
    Playing,
    /// The game reached its last turn.
    Finished,
}

/// Player record, including the private reconnection credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Stable identifier for the player.
    pub id: String,
    /// Display name, unique within a room.
    pub name: String,
    /// Whether the player declared themselves ready.
    #[serde(default)]
    pub ready: bool,
    /// Whether a socket is currently attached for this player.
    #[serde(default = "default_connected")]
    pub connected: bool,
    /// Private credential returned once at join time.
    pub cookie: String,
    /// Accumulated score.
    #[serde(default)]
    pub score: i32,
}

fn default_connected() -> bool {
    true
}

/// Game record nested inside the room record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameEntity {
    /// Tagged status of the game.
    pub status: GameStatusEntity,
    /// Settings captured when the game started.
    pub settings: GameSettingsEntity,
    /// Index of the round being played.
    pub current_round: usize,
    /// Index of the turn being played inside the current round.
    pub current_turn: usize,
    /// Full turn grid (`num_rounds` rows of one turn per player).
    pub rounds: Vec<Vec<TurnEntity>>,
}

/// Discriminant of a game status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameStatusKind {
    /// Game started, between phases.
    PlayingRound,
    /// The current singer picks a song.
    PickingSong,
    /// Other players guess the current song.
    GuessingSong,
    /// Every turn has been played.
    Finished,
}

/// Tagged game status (type plus optional detail payload).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameStatusEntity {
    /// Status discriminant.
    #[serde(rename = "type")]
    pub kind: GameStatusKind,
    /// Optional detail attached to the status.
    #[serde(default)]
    pub detail: Option<Value>,
}

/// Game settings captured at start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameSettingsEntity {
    /// Number of rounds to play.
    pub num_rounds: usize,
    /// Seconds allowed to guess a song.
    pub turn_duration_secs: u32,
    /// Seconds allowed to pick a song.
    pub pick_duration_secs: u32,
}

/// One player's turn inside a round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TurnEntity {
    /// Identifier of the singer for this turn.
    pub player_id: String,
    /// Song fixed for this turn, once picked.
    #[serde(default)]
    pub song: Option<SongEntity>,
    /// Songs offered to the singer.
    #[serde(default)]
    pub song_choices: Vec<SongEntity>,
    /// Players who guessed the song.
    #[serde(default)]
    pub guessers: Vec<String>,
}

/// Song metadata stored within a turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SongEntity {
    /// Catalog identifier.
    pub id: u32,
    /// Song title.
    pub title: String,
    /// Performing artist.
    pub artist: String,
    /// Lyrics fetched once the song was fixed.
    #[serde(default)]
    pub lyrics: Option<String>,
}

/// Chat log record stored next to the room record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatEntity {
    /// Identifier of the owning room.
    pub room_id: String,
    /// Messages in posting order.
    #[serde(default)]
    pub messages: Vec<MessageEntity>,
}

/// Single chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageEntity {
    /// Display name of the sender.
    pub sender: String,
    /// Message body.
    pub content: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

/// Storage key of the room record for `room_id`.
pub fn room_key(room_id: &str) -> String {
    format!("{room_id}:room")
}

/// Storage key of the chat record for `room_id`.
pub fn chat_key(room_id: &str) -> String {
    format!("{room_id}:chat")
}
