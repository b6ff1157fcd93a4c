pub mod game;
pub mod registry;
pub mod state_machine;
pub mod timer;

use std::{sync::Arc, time::SystemTime};

use dashmap::DashMap;
use tokio::{
    sync::{Mutex, OwnedMutexGuard, RwLock, watch},
    task::JoinHandle,
};
use tracing::debug;

use crate::{
    config::AppConfig,
    dao::{models::ChatEntity, room_store::RoomStore},
    error::ServiceError,
    services::song_service::{LyricsClient, SongCatalog},
};

use self::{game::Room, registry::ConnectionRegistry, timer::PhaseSignals};

pub type SharedState = Arc<AppState>;

/// Central application state storing sockets, room gates and the storage handle.
pub struct AppState {
    config: AppConfig,
    room_store: RwLock<Option<Arc<dyn RoomStore>>>,
    degraded: watch::Sender<bool>,
    connections: ConnectionRegistry,
    phase_signals: PhaseSignals,
    room_gates: DashMap<String, Arc<Mutex<()>>>,
    sessions: DashMap<String, JoinHandle<()>>,
    catalog: SongCatalog,
    lyrics: Option<LyricsClient>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let catalog = SongCatalog::new(config.songs().to_vec());
        let lyrics = config.lyrics_api_url().and_then(LyricsClient::new);
        Arc::new(Self {
            config,
            room_store: RwLock::new(None),
            degraded: degraded_tx,
            connections: ConnectionRegistry::new(),
            phase_signals: PhaseSignals::new(),
            room_gates: DashMap::new(),
            sessions: DashMap::new(),
            catalog,
            lyrics,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Sockets attached to each room.
    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// Cancellation signals of the running phases.
    pub fn phase_signals(&self) -> &PhaseSignals {
        &self.phase_signals
    }

    /// Songs offered to the singers.
    pub fn catalog(&self) -> &SongCatalog {
        &self.catalog
    }

    /// Lyrics client, `None` when lyrics retrieval is disabled.
    pub fn lyrics(&self) -> Option<&LyricsClient> {
        self.lyrics.as_ref()
    }

    /// Obtain a handle to the current room store, if one is installed.
    pub async fn room_store(&self) -> Option<Arc<dyn RoomStore>> {
        let guard = self.room_store.read().await;
        guard.as_ref().cloned()
    }

    /// Room store or [`ServiceError::Degraded`] while none is reachable.
    pub async fn require_room_store(&self) -> Result<Arc<dyn RoomStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.room_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new room store implementation and leave degraded mode.
    pub async fn set_room_store(&self, store: Arc<dyn RoomStore>) {
        {
            let mut guard = self.room_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Acquire the gate serialising every read-modify-write of `room_id`.
    async fn lock_room(&self, room_id: &str) -> RoomGate<'_> {
        let gate = self
            .room_gates
            .entry(room_id.to_string())
            .or_default()
            .clone();
        RoomGate {
            guard: Some(gate.lock_owned().await),
            gates: &self.room_gates,
            room_id: room_id.to_string(),
        }
    }

    /// Load a room, failing with [`ServiceError::NotFound`] when it does not exist.
    pub async fn load_room(&self, room_id: &str) -> Result<Room, ServiceError> {
        let store = self.require_room_store().await?;
        store
            .load_room(room_id)
            .await?
            .map(Room::from)
            .ok_or_else(|| ServiceError::NotFound(format!("room `{room_id}` not found")))
    }

    /// Persist a room, refreshing its `updated_at` timestamp.
    pub async fn save_room(&self, mut room: Room) -> Result<Room, ServiceError> {
        let store = self.require_room_store().await?;
        room.updated_at = SystemTime::now();
        store.save_room(room.clone().into()).await?;
        Ok(room)
    }

    /// Load, mutate and save a room while holding its gate.
    ///
    /// Nothing is written when `mutate` fails. Returns the saved room with the closure's value.
    pub async fn with_room_mut<T, F>(
        &self,
        room_id: &str,
        mutate: F,
    ) -> Result<(Room, T), ServiceError>
    where
        F: FnOnce(&mut Room) -> Result<T, ServiceError>,
    {
        let _gate = self.lock_room(room_id).await;
        let mut room = self.load_room(room_id).await?;
        let value = mutate(&mut room)?;
        let room = self.save_room(room).await?;
        Ok((room, value))
    }

    /// Load, mutate and save the chat log of a room while holding the room gate.
    pub async fn with_chat_mut<T, F>(&self, room_id: &str, mutate: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut ChatEntity) -> T,
    {
        let _gate = self.lock_room(room_id).await;
        let store = self.require_room_store().await?;
        let mut chat = store
            .load_chat(room_id)
            .await?
            .unwrap_or_else(|| ChatEntity {
                room_id: room_id.to_string(),
                messages: Vec::new(),
            });
        let value = mutate(&mut chat);
        store.save_chat(chat).await?;
        Ok(value)
    }

    /// Track the phase loop task of a room.
    pub fn register_session(&self, room_id: &str, handle: JoinHandle<()>) {
        if let Some(previous) = self.sessions.insert(room_id.to_string(), handle) {
            previous.abort();
        }
    }

    /// Whether a phase loop is running for `room_id`.
    pub fn has_session(&self, room_id: &str) -> bool {
        self.sessions
            .get(room_id)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Release the per-room resources held for a finished phase loop.
    pub fn finish_session(&self, room_id: &str) {
        self.sessions.remove(room_id);
        self.phase_signals.release(room_id);
        release_gate(&self.room_gates, room_id);
        debug!(room_id, "released phase loop resources");
    }
}

/// Held gate of one room; the map entry goes away with the last user.
struct RoomGate<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    gates: &'a DashMap<String, Arc<Mutex<()>>>,
    room_id: String,
}

impl Drop for RoomGate<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        release_gate(self.gates, &self.room_id);
    }
}

/// Forget the gate of `room_id` when nobody else holds or waits on it.
fn release_gate(gates: &DashMap<String, Arc<Mutex<()>>>, room_id: &str) {
    gates.remove_if(room_id, |_, gate| Arc::strong_count(gate) == 1);
}
