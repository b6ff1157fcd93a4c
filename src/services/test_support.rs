//! Helpers shared by the service tests.

use std::sync::Arc;

use axum::extract::ws::Message;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{
    config::{AppConfig, GameConfig},
    dao::room_store::{RoomStore, memory::MemoryRoomStore},
    dto::room::{JoinRoomRequest, JoinRoomResponse, PlayerReadyRequest},
    services::room_service,
    state::{AppState, SharedState, game::Song},
};

/// Application state backed by the in-memory store, lyrics disabled.
pub async fn test_state(game: GameConfig) -> SharedState {
    test_state_on(game, Arc::new(MemoryRoomStore::new())).await
}

/// Application state backed by `store`, lyrics disabled.
pub async fn test_state_on(game: GameConfig, store: Arc<dyn RoomStore>) -> SharedState {
    let songs = vec![
        Song::new(1, "Bohemian Rhapsody".into(), "Queen".into()),
        Song::new(2, "Imagine".into(), "John Lennon".into()),
        Song::new(3, "Hey Jude".into(), "The Beatles".into()),
        Song::new(4, "Africa".into(), "Toto".into()),
    ];
    let state = AppState::new(AppConfig::new(game, None, songs));
    state.set_room_store(store).await;
    state
}

/// Join `room_id` as `name`, panicking on failure.
pub async fn join(state: &SharedState, room_id: &str, name: &str) -> JoinRoomResponse {
    room_service::join_room(
        state,
        JoinRoomRequest {
            room_id: room_id.into(),
            player_name: name.into(),
        },
    )
    .await
    .unwrap()
}

/// Mark a player ready, panicking on failure.
pub async fn ready(state: &SharedState, room_id: &str, player_id: &str) {
    room_service::set_ready(
        state,
        PlayerReadyRequest {
            room_id: room_id.into(),
            player_id: player_id.into(),
            ready: true,
        },
    )
    .await
    .unwrap();
}

/// Attach a fake socket for `player_id`.
pub fn attach(state: &SharedState, room_id: &str, player_id: &str) -> mpsc::UnboundedReceiver<Message> {
    let (tx, rx) = mpsc::unbounded_channel();
    state.connections().register(room_id, player_id, tx);
    rx
}

/// Every event already queued on a fake socket.
pub fn drain_events(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Value> {
    let mut out = Vec::new();
    while let Ok(message) = rx.try_recv() {
        if let Message::Text(text) = message {
            out.push(serde_json::from_str(text.as_str()).unwrap());
        }
    }
    out
}

/// Wait for the next event on a fake socket.
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<Message>) -> Value {
    loop {
        match rx.recv().await {
            Some(Message::Text(text)) => return serde_json::from_str(text.as_str()).unwrap(),
            Some(_) => continue,
            None => panic!("socket channel closed"),
        }
    }
}
