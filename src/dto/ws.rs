use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Frames accepted from player WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Toggle the ready flag.
    Ready { ready: bool },
    /// Pick one of the offered songs.
    PickSong { song_id: u32 },
    /// Guess the current song.
    Guess { guess: String },
    /// Post a chat message.
    Chat { content: String },
}

impl ClientMessage {
    /// Parse a text frame.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Rejection sent back to the socket whose frame could not be applied.
pub struct ErrorEvent {
    pub message: String,
}
