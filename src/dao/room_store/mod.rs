#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{ChatEntity, RoomEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// Abstraction over the persistence layer holding room and chat records.
///
/// Records are read and replaced as whole values; there is no field-level update.
pub trait RoomStore: Send + Sync {
    fn load_room(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    fn save_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn load_chat(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Option<ChatEntity>>>;
    fn save_chat(&self, chat: ChatEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
