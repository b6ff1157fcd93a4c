use tracing::debug;
use validator::Validate;

use crate::{
    dao::models::MessageEntity,
    dto::{
        chat::{ChatLog, ChatMessage, PostMessageRequest},
        now_rfc3339,
    },
    error::ServiceError,
    services::{room_events, room_service::player_not_found},
    state::SharedState,
};

/// Ordered chat log of a room.
pub async fn get_chat(state: &SharedState, room_id: &str) -> Result<ChatLog, ServiceError> {
    // Resolving the room first turns an unknown id into a 404 instead of an empty log.
    state.load_room(room_id).await?;
    let store = state.require_room_store().await?;
    let log = store
        .load_chat(room_id)
        .await?
        .map(ChatLog::from)
        .unwrap_or_else(|| ChatLog {
            room_id: room_id.to_string(),
            messages: Vec::new(),
        });
    Ok(log)
}

/// Append a message from a player to the room chat and broadcast it.
pub async fn post_message(
    state: &SharedState,
    request: PostMessageRequest,
) -> Result<ChatMessage, ServiceError> {
    request.validate()?;
    let PostMessageRequest {
        room_id,
        player_id,
        content,
    } = request;

    let room = state.load_room(&room_id).await?;
    let sender = room
        .player(&player_id)
        .map(|player| player.name.clone())
        .ok_or_else(|| player_not_found(&room_id, &player_id))?;

    append(state, &room_id, sender, content).await
}

/// Append a message on behalf of `sender` and broadcast it as `new_message`.
pub(crate) async fn append(
    state: &SharedState,
    room_id: &str,
    sender: String,
    content: String,
) -> Result<ChatMessage, ServiceError> {
    let entity = MessageEntity {
        sender,
        content: content.trim().to_string(),
        timestamp: now_rfc3339(),
    };
    let message = ChatMessage::from(entity.clone());

    let total = state
        .with_chat_mut(room_id, |chat| {
            chat.messages.push(entity);
            chat.messages.len()
        })
        .await?;

    debug!(room_id, sender = %message.sender, total, "chat message appended");
    room_events::broadcast_new_message(state, room_id, &message);
    Ok(message)
}
