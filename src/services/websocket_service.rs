use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    dto::{
        chat::PostMessageRequest,
        game::{GuessRequest, PickSongRequest},
        room::PlayerReadyRequest,
        ws::{ClientMessage, ErrorEvent},
    },
    error::ServiceError,
    services::{chat_service, game_service, room_events::EVENT_ERROR, room_service},
    state::{
        SharedState,
        registry::Envelope,
        state_machine::{SessionState, TurnPhase},
    },
};

/// Handle the full lifecycle of one player socket.
///
/// The room and player are resolved by the route before the upgrade.
pub async fn handle_socket(state: SharedState, room_id: String, player_id: String, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps broadcasts flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection_id = state
        .connections()
        .register(&room_id, &player_id, outbound_tx.clone());
    info!(room_id = %room_id, player_id = %player_id, "player socket connected");
    if let Err(err) = room_service::set_connected(&state, &room_id, &player_id, true).await {
        warn!(room_id = %room_id, player_id = %player_id, error = %err, "failed to mark player connected");
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientMessage::from_json_str(&text) {
                Ok(frame) => {
                    debug!(room_id = %room_id, player_id = %player_id, ?frame, "player frame");
                    if let Err(err) = handle_frame(&state, &room_id, &player_id, frame).await {
                        warn!(room_id = %room_id, player_id = %player_id, error = %err, "player frame rejected");
                        send_error(&outbound_tx, &err);
                    }
                }
                Err(err) => {
                    warn!(room_id = %room_id, player_id = %player_id, error = %err, "ignoring malformed frame");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                debug!(room_id = %room_id, player_id = %player_id, "player closed the socket");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(room_id = %room_id, player_id = %player_id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.connections().unregister(&room_id, connection_id);
    if let Err(err) = room_service::set_connected(&state, &room_id, &player_id, false).await {
        warn!(room_id = %room_id, player_id = %player_id, error = %err, "failed to mark player disconnected");
    }
    info!(room_id = %room_id, player_id = %player_id, "player socket disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Apply one inbound frame on behalf of `player_id`.
pub(crate) async fn handle_frame(
    state: &SharedState,
    room_id: &str,
    player_id: &str,
    frame: ClientMessage,
) -> Result<(), ServiceError> {
    match frame {
        ClientMessage::Ready { ready } => {
            let request = PlayerReadyRequest {
                room_id: room_id.to_string(),
                player_id: player_id.to_string(),
                ready,
            };
            room_service::set_ready(state, request).await.map(drop)
        }
        ClientMessage::PickSong { song_id } => {
            let request = PickSongRequest {
                room_id: room_id.to_string(),
                player_id: player_id.to_string(),
                song_id,
            };
            game_service::pick_song(state, request).await.map(drop)
        }
        ClientMessage::Guess { guess } => {
            let room = state.load_room(room_id).await?;
            if SessionState::of(&room) != SessionState::Playing(TurnPhase::GuessSong) {
                // Outside the guess phase a guess is just talk.
                return post_chat(state, room_id, player_id, guess).await;
            }
            let request = GuessRequest {
                room_id: room_id.to_string(),
                player_id: player_id.to_string(),
                guess,
            };
            game_service::guess(state, request).await.map(drop)
        }
        ClientMessage::Chat { content } => post_chat(state, room_id, player_id, content).await,
    }
}

async fn post_chat(
    state: &SharedState,
    room_id: &str,
    player_id: &str,
    content: String,
) -> Result<(), ServiceError> {
    let request = PostMessageRequest {
        room_id: room_id.to_string(),
        player_id: player_id.to_string(),
        content,
    };
    chat_service::post_message(state, request).await.map(drop)
}

fn send_error(tx: &mpsc::UnboundedSender<Message>, err: &ServiceError) {
    let event = ErrorEvent {
        message: err.to_string(),
    };
    let envelope = Envelope {
        kind: EVENT_ERROR,
        content: &event,
    };
    match serde_json::to_string(&envelope) {
        Ok(payload) => {
            let _ = tx.send(Message::Text(payload.into()));
        }
        Err(err) => warn!(error = %err, "failed to serialize error event"),
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
