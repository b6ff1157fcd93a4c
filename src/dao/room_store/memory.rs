//! Process-local room store keeping every record as a serialised JSON blob.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde::{Serialize, de::DeserializeOwned};

use crate::dao::{
    models::{ChatEntity, RoomEntity, chat_key, room_key},
    room_store::RoomStore,
    storage::{StorageError, StorageResult},
};

/// In-memory key-value store with the same whole-record semantics as the remote backends.
#[derive(Clone, Default)]
pub struct MemoryRoomStore {
    records: Arc<DashMap<String, String>>,
}

impl MemoryRoomStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        let Some(raw) = self.records.get(key).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::corrupted(key, source))
    }

    fn put<T: Serialize>(&self, key: String, value: &T) -> StorageResult<()> {
        let raw =
            serde_json::to_string(value).map_err(|source| StorageError::corrupted(&key, source))?;
        self.records.insert(key, raw);
        Ok(())
    }
}

impl RoomStore for MemoryRoomStore {
    fn load_room(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let result = self.get(&room_key(room_id));
        Box::pin(async move { result })
    }

    fn save_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.put(room_key(&room.room_id), &room);
        Box::pin(async move { result })
    }

    fn load_chat(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Option<ChatEntity>>> {
        let result = self.get(&chat_key(room_id));
        Box::pin(async move { result })
    }

    fn save_chat(&self, chat: ChatEntity) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.put(chat_key(&chat.room_id), &chat);
        Box::pin(async move { result })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
