use mongodb::bson::{Document, doc};
use serde::{Deserialize, Serialize};

use crate::dao::models::{ChatEntity, RoomEntity};

/// MongoDB document wrapping a whole record under `data`, keyed by its storage key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoDocument<T> {
    #[serde(rename = "_id")]
    pub id: String,
    pub data: T,
}

pub type MongoRoomDocument = MongoDocument<RoomEntity>;
pub type MongoChatDocument = MongoDocument<ChatEntity>;

pub fn doc_id(key: &str) -> Document {
    doc! {"_id": key}
}
