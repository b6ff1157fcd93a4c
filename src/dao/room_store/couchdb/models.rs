use serde::{Deserialize, Serialize};

use crate::dao::models::{ChatEntity, RoomEntity, chat_key, room_key};

/// CouchDB document wrapping a whole record under `data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchDocument<T> {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub data: T,
}

/// Minimal projection used to read the current revision of a document.
#[derive(Debug, Deserialize)]
pub struct RevisionOnly {
    #[serde(rename = "_rev")]
    pub rev: Option<String>,
}

pub type CouchRoomDocument = CouchDocument<RoomEntity>;
pub type CouchChatDocument = CouchDocument<ChatEntity>;

impl From<RoomEntity> for CouchRoomDocument {
    fn from(room: RoomEntity) -> Self {
        Self {
            id: room_key(&room.room_id),
            rev: None,
            data: room,
        }
    }
}

impl From<ChatEntity> for CouchChatDocument {
    fn from(chat: ChatEntity) -> Self {
        Self {
            id: chat_key(&chat.room_id),
            rev: None,
            data: chat,
        }
    }
}
