use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::{ChatEntity, MessageEntity},
    dto::validation::validate_not_blank,
};

/// Single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ChatMessage {
    /// Display name of the sender.
    pub sender: String,
    pub content: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

impl From<MessageEntity> for ChatMessage {
    fn from(value: MessageEntity) -> Self {
        Self {
            sender: value.sender,
            content: value.content,
            timestamp: value.timestamp,
        }
    }
}

/// Ordered chat log of a room.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChatLog {
    pub room_id: String,
    pub messages: Vec<ChatMessage>,
}

impl From<ChatEntity> for ChatLog {
    fn from(value: ChatEntity) -> Self {
        Self {
            room_id: value.room_id,
            messages: value.messages.into_iter().map(Into::into).collect(),
        }
    }
}

/// Payload used to post a chat message.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PostMessageRequest {
    pub room_id: String,
    pub player_id: String,
    #[validate(
        length(max = 500),
        custom(function = "validate_not_blank")
    )]
    pub content: String,
}
