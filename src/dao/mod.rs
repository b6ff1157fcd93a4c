/// Persisted record definitions for rooms and chats.
pub mod models;
/// Room state storage backends.
pub mod room_store;
/// Storage abstraction layer shared by every backend.
pub mod storage;
