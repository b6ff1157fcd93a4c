use std::sync::Arc;

use futures::future::BoxFuture;
use mongodb::{Client, Collection, Database, bson::doc};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoChatDocument, MongoDocument, MongoRoomDocument, doc_id},
};
use crate::dao::{
    models::{ChatEntity, RoomEntity, chat_key, room_key},
    room_store::RoomStore,
    storage::StorageResult,
};

const ROOM_COLLECTION_NAME: &str = "rooms";
const CHAT_COLLECTION_NAME: &str = "chats";

/// Room store persisting records in MongoDB collections.
#[derive(Clone)]
pub struct MongoRoomStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoRoomStore {
    /// Establish a connection to MongoDB.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        Ok(Self { inner })
    }

    async fn collection<T>(&self, name: &str) -> Collection<MongoDocument<T>>
    where
        T: Send + Sync,
    {
        let guard = self.inner.state.read().await;
        guard.database.collection::<MongoDocument<T>>(name)
    }

    async fn find<T>(&self, collection: &str, key: String) -> MongoResult<Option<T>>
    where
        T: DeserializeOwned + Unpin + Send + Sync,
    {
        let collection = self.collection::<T>(collection).await;
        let document = collection
            .find_one(doc_id(&key))
            .await
            .map_err(|source| MongoDaoError::Load { key, source })?;
        Ok(document.map(|doc| doc.data))
    }

    async fn replace<T>(&self, collection: &str, document: MongoDocument<T>) -> MongoResult<()>
    where
        T: Serialize + Send + Sync,
    {
        let collection = self.collection::<T>(collection).await;
        collection
            .replace_one(doc_id(&document.id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Save {
                key: document.id.clone(),
                source,
            })?;
        Ok(())
    }
}

impl RoomStore for MongoRoomStore {
    fn load_room(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        let key = room_key(room_id);
        Box::pin(async move {
            store
                .find::<RoomEntity>(ROOM_COLLECTION_NAME, key)
                .await
                .map_err(Into::into)
        })
    }

    fn save_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let document = MongoRoomDocument {
                id: room_key(&room.room_id),
                data: room,
            };
            store
                .replace(ROOM_COLLECTION_NAME, document)
                .await
                .map_err(Into::into)
        })
    }

    fn load_chat(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Option<ChatEntity>>> {
        let store = self.clone();
        let key = chat_key(room_id);
        Box::pin(async move {
            store
                .find::<ChatEntity>(CHAT_COLLECTION_NAME, key)
                .await
                .map_err(Into::into)
        })
    }

    fn save_chat(&self, chat: ChatEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let document = MongoChatDocument {
                id: chat_key(&chat.room_id),
                data: chat,
            };
            store
                .replace(CHAT_COLLECTION_NAME, document)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
