use tracing::{debug, info};
use validator::Validate;

use crate::{
    dao::models::ChatEntity,
    dto::room::{
        CreateRoomResponse, JoinRoomRequest, JoinRoomResponse, PlayerReadyRequest, PlayerSafe,
        RoomSafe,
    },
    error::ServiceError,
    services::room_events,
    state::{
        SharedState,
        game::{Player, Room, RoomLifecycle},
    },
};

/// Create an empty room and its empty chat log.
pub async fn create_room(state: &SharedState) -> Result<CreateRoomResponse, ServiceError> {
    let store = state.require_room_store().await?;
    let room = Room::new();
    let room_id = room.id.clone();

    store.save_room(room.into()).await?;
    store
        .save_chat(ChatEntity {
            room_id: room_id.clone(),
            messages: Vec::new(),
        })
        .await?;

    info!(room_id = %room_id, "room created");
    Ok(CreateRoomResponse { room_id })
}

/// Add a player to a waiting room. The first player becomes the owner.
pub async fn join_room(
    state: &SharedState,
    request: JoinRoomRequest,
) -> Result<JoinRoomResponse, ServiceError> {
    request.validate()?;
    let max_players = state.config().game().max_players;
    let name = request.player_name.trim().to_string();

    let (room, player) = state
        .with_room_mut(&request.room_id, |room| {
            if room.lifecycle != RoomLifecycle::Waiting {
                return Err(ServiceError::InvalidState(format!(
                    "room `{}` is no longer accepting players",
                    room.id
                )));
            }
            if room
                .players
                .iter()
                .any(|player| player.name.eq_ignore_ascii_case(&name))
            {
                return Err(ServiceError::InvalidInput(format!(
                    "name `{name}` is already taken in room `{}`",
                    room.id
                )));
            }
            if room.players.len() >= max_players {
                return Err(ServiceError::InvalidState(format!(
                    "room `{}` is full ({max_players} players)",
                    room.id
                )));
            }

            let player = Player::new(name.clone());
            if room.owner.is_none() {
                room.owner = Some(player.id.clone());
            }
            room.players.push(player.clone());
            Ok(player)
        })
        .await?;

    info!(room_id = %room.id, player_id = %player.id, name = %player.name, "player joined");
    room_events::broadcast_room_state(state, &room);
    room_events::broadcast_readiness(state, &room);

    Ok(JoinRoomResponse {
        player: PlayerSafe::from(&player),
        cookie: player.credential().to_string(),
    })
}

/// Toggle a player's ready flag and broadcast the recomputed lobby state.
pub async fn set_ready(
    state: &SharedState,
    request: PlayerReadyRequest,
) -> Result<PlayerSafe, ServiceError> {
    let PlayerReadyRequest {
        room_id,
        player_id,
        ready,
    } = request;

    let (room, player) = state
        .with_room_mut(&room_id, |room| {
            if room.lifecycle != RoomLifecycle::Waiting {
                return Err(ServiceError::InvalidState(
                    "ready flags are frozen once the game started".into(),
                ));
            }
            let player = room
                .player_mut(&player_id)
                .ok_or_else(|| player_not_found(&room_id, &player_id))?;
            player.ready = ready;
            Ok(player.clone())
        })
        .await?;

    debug!(room_id = %room.id, player_id = %player.id, ready, "ready flag updated");
    room_events::broadcast_player_ready(state, &room.id, &player);
    room_events::broadcast_readiness(state, &room);
    room_events::broadcast_room_state(state, &room);

    Ok(PlayerSafe::from(&player))
}

/// Safe projection of a room.
pub async fn get_room(state: &SharedState, room_id: &str) -> Result<RoomSafe, ServiceError> {
    let room = state.load_room(room_id).await?;
    Ok(RoomSafe::from(&room))
}

/// Safe projection of one player.
pub async fn get_player(
    state: &SharedState,
    room_id: &str,
    player_id: &str,
) -> Result<PlayerSafe, ServiceError> {
    let room = state.load_room(room_id).await?;
    room.player(player_id)
        .map(PlayerSafe::from)
        .ok_or_else(|| player_not_found(room_id, player_id))
}

/// Resolve the player owning `credential` without ever echoing the credential back.
pub async fn whoami(
    state: &SharedState,
    room_id: &str,
    credential: &str,
) -> Result<PlayerSafe, ServiceError> {
    let room = state.load_room(room_id).await?;
    room.player_by_credential(credential)
        .map(PlayerSafe::from)
        .ok_or_else(|| ServiceError::Unauthorized("unknown player token".into()))
}

/// Record whether a player has a socket attached and broadcast the room state.
///
/// A player with another socket still attached stays connected.
pub async fn set_connected(
    state: &SharedState,
    room_id: &str,
    player_id: &str,
    connected: bool,
) -> Result<(), ServiceError> {
    let (room, (connected, changed)) = state
        .with_room_mut(room_id, |room| {
            // Checked under the gate so a socket attaching meanwhile is seen.
            let connected = connected || state.connections().is_connected(room_id, player_id);
            let player = room
                .player_mut(player_id)
                .ok_or_else(|| player_not_found(room_id, player_id))?;
            let changed = player.connected != connected;
            player.connected = connected;
            Ok((connected, changed))
        })
        .await?;

    debug!(room_id, player_id, connected, changed, "connection flag updated");
    room_events::broadcast_room_state(state, &room);
    Ok(())
}

pub(crate) fn player_not_found(room_id: &str, player_id: &str) -> ServiceError {
    ServiceError::NotFound(format!(
        "player `{player_id}` not found in room `{room_id}`"
    ))
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        config::{AppConfig, GameConfig},
        services::test_support::{drain_events, join, test_state},
        state::AppState,
    };

    #[tokio::test]
    async fn first_player_becomes_owner() {
        let state = test_state(GameConfig::default()).await;
        let room_id = create_room(&state).await.unwrap().room_id;

        let ana = join(&state, &room_id, "ana").await;
        let bob = join(&state, &room_id, "bob").await;

        let room = get_room(&state, &room_id).await.unwrap();
        assert_eq!(room.owner, Some(ana.player.id.clone()));
        assert_eq!(room.players.len(), 2);
        assert!(room.players.iter().all(|p| !p.ready && p.connected));
        assert_ne!(ana.cookie, bob.cookie);
    }

    #[tokio::test]
    async fn join_preconditions_are_enforced() {
        let state = test_state(GameConfig {
            max_players: 1,
            ..GameConfig::default()
        })
        .await;
        let room_id = create_room(&state).await.unwrap().room_id;
        join(&state, &room_id, "ana").await;

        let missing = join_room(
            &state,
            JoinRoomRequest {
                room_id: "nope".into(),
                player_name: "bob".into(),
            },
        )
        .await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));

        let duplicate = join_room(
            &state,
            JoinRoomRequest {
                room_id: room_id.clone(),
                player_name: "ANA".into(),
            },
        )
        .await;
        assert!(matches!(duplicate, Err(ServiceError::InvalidInput(_))));

        let full = join_room(
            &state,
            JoinRoomRequest {
                room_id: room_id.clone(),
                player_name: "bob".into(),
            },
        )
        .await;
        assert!(matches!(full, Err(ServiceError::InvalidState(_))));

        let room = get_room(&state, &room_id).await.unwrap();
        assert_eq!(room.players.len(), 1);
    }

    #[tokio::test]
    async fn readiness_broadcast_lists_outstanding_players() {
        let state = test_state(GameConfig::default()).await;
        let room_id = create_room(&state).await.unwrap().room_id;
        let ana = join(&state, &room_id, "ana").await;
        let bob = join(&state, &room_id, "bob").await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        state.connections().register(&room_id, &ana.player.id, tx);

        set_ready(
            &state,
            PlayerReadyRequest {
                room_id: room_id.clone(),
                player_id: ana.player.id.clone(),
                ready: true,
            },
        )
        .await
        .unwrap();

        let received = drain_events(&mut rx);
        let kinds: Vec<_> = received.iter().map(|e| e["type"].clone()).collect();
        assert_eq!(kinds, vec!["player_ready", "waiting_for_players", "room_state"]);
        assert_eq!(received[1]["content"], serde_json::json!([bob.player.id]));

        set_ready(
            &state,
            PlayerReadyRequest {
                room_id: room_id.clone(),
                player_id: bob.player.id.clone(),
                ready: true,
            },
        )
        .await
        .unwrap();
        let received = drain_events(&mut rx);
        assert_eq!(received[1]["type"], "all_players_ready");
        assert_eq!(received[1]["content"]["owner"], ana.player.id.as_str());
    }

    #[tokio::test]
    async fn whoami_resolves_the_credential() {
        let state = test_state(GameConfig::default()).await;
        let room_id = create_room(&state).await.unwrap().room_id;
        let ana = join(&state, &room_id, "ana").await;

        let me = whoami(&state, &room_id, &ana.cookie).await.unwrap();
        assert_eq!(me, ana.player);

        let stranger = whoami(&state, &room_id, "forged").await;
        assert!(matches!(stranger, Err(ServiceError::Unauthorized(_))));

        let lookup = get_player(&state, &room_id, &ana.player.id).await.unwrap();
        assert_eq!(lookup.name, "ana");
    }

    #[tokio::test]
    async fn degraded_mode_rejects_calls() {
        let state = AppState::new(AppConfig::default());
        assert!(matches!(
            create_room(&state).await,
            Err(ServiceError::Degraded)
        ));
    }
    #[tokio::test]
    async fn disconnect_keeps_players_with_another_socket_connected() {
        let state = test_state(GameConfig::default()).await;
        let room_id = create_room(&state).await.unwrap().room_id;
        let ana = join(&state, &room_id, "ana").await;

        let (old_tx, _old_rx) = mpsc::unbounded_channel();
        let old = state.connections().register(&room_id, &ana.player.id, old_tx);
        let (new_tx, _new_rx) = mpsc::unbounded_channel();
        let new = state.connections().register(&room_id, &ana.player.id, new_tx);

        // The old socket goes away while the new one is attached.
        state.connections().unregister(&room_id, old);
        set_connected(&state, &room_id, &ana.player.id, false)
            .await
            .unwrap();
        let player = get_player(&state, &room_id, &ana.player.id).await.unwrap();
        assert!(player.connected);

        state.connections().unregister(&room_id, new);
        set_connected(&state, &room_id, &ana.player.id, false)
            .await
            .unwrap();
        let player = get_player(&state, &room_id, &ana.player.id).await.unwrap();
        assert!(!player.connected);
    }
}
