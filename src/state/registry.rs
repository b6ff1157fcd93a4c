//! Registry of the player sockets attached to each room.

use std::fmt::Debug;

use axum::extract::ws::Message;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Wire envelope wrapping every event pushed to a socket.
#[derive(Debug, Serialize)]
pub struct Envelope<'a, T: ?Sized> {
    /// Event name.
    #[serde(rename = "type")]
    pub kind: &'a str,
    /// Event payload.
    pub content: &'a T,
}

#[derive(Clone)]
/// Handle used to push messages to one attached socket.
pub struct PlayerConnection {
    /// Identifier of this socket, distinct per attach.
    pub id: Uuid,
    /// Player the socket belongs to.
    pub player_id: String,
    /// Queue drained by the socket's writer task.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// In-process mapping from room identifier to its attached sockets.
#[derive(Default)]
pub struct ConnectionRegistry {
    rooms: DashMap<String, Vec<PlayerConnection>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a socket to a room, creating the room entry when absent.
    pub fn register(
        &self,
        room_id: &str,
        player_id: &str,
        tx: mpsc::UnboundedSender<Message>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.rooms
            .entry(room_id.to_string())
            .or_default()
            .push(PlayerConnection {
                id,
                player_id: player_id.to_string(),
                tx,
            });
        debug!(room_id, player_id, connection_id = %id, "socket registered");
        id
    }

    /// Detach a socket. Unknown rooms or connections are ignored.
    ///
    /// Returns whether a connection was actually removed.
    pub fn unregister(&self, room_id: &str, connection_id: Uuid) -> bool {
        let removed = match self.rooms.get_mut(room_id) {
            Some(mut connections) => {
                let before = connections.len();
                connections.retain(|connection| connection.id != connection_id);
                before != connections.len()
            }
            None => false,
        };
        self.rooms
            .remove_if(room_id, |_, connections| connections.is_empty());
        removed
    }

    /// Whether `player_id` has at least one socket attached to `room_id`.
    pub fn is_connected(&self, room_id: &str, player_id: &str) -> bool {
        self.rooms.get(room_id).is_some_and(|connections| {
            connections
                .iter()
                .any(|connection| connection.player_id == player_id)
        })
    }

    /// Send an event to every socket of a room.
    ///
    /// Returns `false` when the room has no socket attached or no socket accepted the event.
    pub fn broadcast<T>(&self, room_id: &str, kind: &str, content: &T) -> bool
    where
        T: ?Sized + Serialize + Debug,
    {
        let Some(message) = encode(kind, content) else {
            return false;
        };
        let Some(connections) = self.rooms.get(room_id) else {
            debug!(room_id, event = kind, "broadcast to a room without sockets");
            return false;
        };

        deliver(room_id, kind, &message, connections.iter()) > 0
    }

    /// Send an event to the sockets of a single player.
    ///
    /// Returns `false` when the player has no socket attached to the room.
    pub fn unicast<T>(&self, room_id: &str, player_id: &str, kind: &str, content: &T) -> bool
    where
        T: ?Sized + Serialize + Debug,
    {
        let Some(message) = encode(kind, content) else {
            return false;
        };
        let Some(connections) = self.rooms.get(room_id) else {
            debug!(room_id, player_id, event = kind, "unicast to a room without sockets");
            return false;
        };

        let targets = connections
            .iter()
            .filter(|connection| connection.player_id == player_id);
        let delivered = deliver(room_id, kind, &message, targets);
        if delivered == 0 {
            debug!(room_id, player_id, event = kind, "unicast target is not connected");
        }
        delivered > 0
    }
}

/// Serialise an event once so every recipient receives the same frame.
fn encode<T>(kind: &str, content: &T) -> Option<Message>
where
    T: ?Sized + Serialize + Debug,
{
    match serde_json::to_string(&Envelope { kind, content }) {
        Ok(payload) => Some(Message::Text(payload.into())),
        Err(err) => {
            warn!(event = kind, error = %err, "failed to serialize event `{content:?}`");
            None
        }
    }
}

/// Push `message` to each connection, isolating failures. Returns the delivery count.
fn deliver<'a>(
    room_id: &str,
    kind: &str,
    message: &Message,
    connections: impl Iterator<Item = &'a PlayerConnection>,
) -> usize {
    let mut delivered = 0;
    for connection in connections {
        if connection.tx.send(message.clone()).is_ok() {
            delivered += 1;
        } else {
            warn!(
                room_id,
                player_id = %connection.player_id,
                event = kind,
                "socket writer closed; event dropped"
            );
        }
    }
    delivered
}
