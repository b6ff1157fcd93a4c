use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{dto::validation::validate_not_blank, state::game::Song};

/// Payload used by the owner to start the game.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StartGameRequest {
    pub room_id: String,
}

/// Payload used by the singer to pick one of the offered songs.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PickSongRequest {
    pub room_id: String,
    pub player_id: String,
    pub song_id: u32,
}

/// Payload used by a player to guess the current song.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct GuessRequest {
    pub room_id: String,
    pub player_id: String,
    #[validate(
        length(max = 200),
        custom(function = "validate_not_blank")
    )]
    pub guess: String,
}

/// Whether a guess matched the current song.
#[derive(Debug, Serialize, ToSchema)]
pub struct GuessResponse {
    pub correct: bool,
}

/// Song as offered to players: catalog metadata only, never the lyrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SongChoice {
    pub id: u32,
    pub title: String,
    pub artist: String,
}

impl From<&Song> for SongChoice {
    fn from(song: &Song) -> Self {
        Self {
            id: song.id,
            title: song.title.clone(),
            artist: song.artist.clone(),
        }
    }
}
