/// Room chat log and message posting.
pub mod chat_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Start, pick and guess operations of a running game.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Events pushed to the sockets of a room.
pub mod room_events;
/// Room creation, joining and lobby readiness.
pub mod room_service;
/// Per-room phase loop advancing rounds and turns.
pub mod scheduler;
/// Song catalog and lyrics lookups.
pub mod song_service;
/// Room store connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;

#[cfg(test)]
pub(crate) mod test_support;
