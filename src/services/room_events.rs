use std::fmt::Debug;

use serde::Serialize;

use crate::{
    dto::{
        chat::ChatMessage,
        events::{
            AllPlayersReadyEvent, CorrectGuessEvent, GameEndEvent, GameStartEvent,
            NoSongChosenEvent, PhaseChangeEvent, PickSongEvent, PlayerReadyEvent,
            RoundChangeEvent, SingerSongDataEvent, SongRevealEvent, TimerEvent,
            TurnChangeEvent, TurnEndedPrematurelyEvent,
        },
        room::RoomSafe,
    },
    state::{
        SharedState,
        game::{Player, Room},
        state_machine::SessionState,
    },
};

pub const EVENT_ROOM_STATE: &str = "room_state";
pub const EVENT_PLAYER_READY: &str = "player_ready";
pub const EVENT_WAITING_FOR_PLAYERS: &str = "waiting_for_players";
pub const EVENT_ALL_PLAYERS_READY: &str = "all_players_ready";
pub const EVENT_GAME_START: &str = "game_start";
pub const EVENT_PHASE_CHANGE: &str = "phase_change";
pub const EVENT_PICK_SONG: &str = "pick_song";
pub const EVENT_TIMER: &str = "timer";
pub const EVENT_ROUND_CHANGE: &str = "round_change";
pub const EVENT_TURN_CHANGE: &str = "turn_change";
pub const EVENT_NO_SONG_CHOSEN: &str = "no_song_chosen";
pub const EVENT_TURN_ENDED_PREMATURELY: &str = "turn_ended_prematurely";
pub const EVENT_SINGER_SONG_DATA: &str = "singer_song_data";
pub const EVENT_NEW_MESSAGE: &str = "new_message";
pub const EVENT_SONG_REVEAL: &str = "song_reveal";
pub const EVENT_CORRECT_GUESS: &str = "correct_guess";
pub const EVENT_GAME_END: &str = "game_end";
pub const EVENT_ERROR: &str = "error";

/// Broadcast the safe projection of a room to all of its sockets.
pub fn broadcast_room_state(state: &SharedState, room: &Room) {
    send_room_event(state, &room.id, EVENT_ROOM_STATE, &RoomSafe::from(room));
}

/// Broadcast that a player toggled their ready flag.
pub fn broadcast_player_ready(state: &SharedState, room_id: &str, player: &Player) {
    let payload = PlayerReadyEvent {
        player_id: player.id.clone(),
        player_name: player.name.clone(),
        ready: player.ready,
    };
    send_room_event(state, room_id, EVENT_PLAYER_READY, &payload);
}

/// Broadcast whether the lobby is fully ready or which players are outstanding.
pub fn broadcast_readiness(state: &SharedState, room: &Room) {
    match SessionState::of(room) {
        SessionState::WaitingOwner => {
            let payload = AllPlayersReadyEvent {
                owner: room.owner.clone(),
            };
            send_room_event(state, &room.id, EVENT_ALL_PLAYERS_READY, &payload);
        }
        SessionState::WaitingPlayers { outstanding } => {
            send_room_event(state, &room.id, EVENT_WAITING_FOR_PLAYERS, &outstanding);
        }
        SessionState::Playing(_) | SessionState::Finished => {}
    }
}

/// Broadcast the fixed turn order when a game starts.
pub fn broadcast_game_start(state: &SharedState, room_id: &str, payload: GameStartEvent) {
    send_room_event(state, room_id, EVENT_GAME_START, &payload);
}

/// Broadcast the start of a turn phase.
pub fn broadcast_phase_change(state: &SharedState, room_id: &str, payload: PhaseChangeEvent) {
    send_room_event(state, room_id, EVENT_PHASE_CHANGE, &payload);
}

/// Send the song choices to the singer only.
pub fn send_pick_song(state: &SharedState, room_id: &str, singer: &str, payload: PickSongEvent) {
    send_player_event(state, room_id, singer, EVENT_PICK_SONG, &payload);
}

/// Broadcast one countdown tick.
pub fn broadcast_timer(state: &SharedState, room_id: &str, payload: &TimerEvent) {
    send_room_event(state, room_id, EVENT_TIMER, payload);
}

/// Broadcast that the pick countdown elapsed without a pick.
pub fn broadcast_no_song_chosen(state: &SharedState, room_id: &str, payload: NoSongChosenEvent) {
    send_room_event(state, room_id, EVENT_NO_SONG_CHOSEN, &payload);
}

/// Broadcast that a correct guess ended the guess phase early.
pub fn broadcast_turn_ended_prematurely(
    state: &SharedState,
    room_id: &str,
    payload: TurnEndedPrematurelyEvent,
) {
    send_room_event(state, room_id, EVENT_TURN_ENDED_PREMATURELY, &payload);
}

/// Send the song and its lyrics to the singer only.
pub fn send_singer_song_data(
    state: &SharedState,
    room_id: &str,
    singer: &str,
    payload: SingerSongDataEvent,
) {
    send_player_event(state, room_id, singer, EVENT_SINGER_SONG_DATA, &payload);
}

/// Broadcast that a player found the song.
pub fn broadcast_correct_guess(state: &SharedState, room_id: &str, payload: CorrectGuessEvent) {
    send_room_event(state, room_id, EVENT_CORRECT_GUESS, &payload);
}

/// Broadcast the song of a turn once guessing is over.
pub fn broadcast_song_reveal(state: &SharedState, room_id: &str, payload: SongRevealEvent) {
    send_room_event(state, room_id, EVENT_SONG_REVEAL, &payload);
}

/// Broadcast the next singer.
pub fn broadcast_turn_change(state: &SharedState, room_id: &str, payload: TurnChangeEvent) {
    send_room_event(state, room_id, EVENT_TURN_CHANGE, &payload);
}

/// Broadcast the start of a new round.
pub fn broadcast_round_change(state: &SharedState, room_id: &str, payload: RoundChangeEvent) {
    send_room_event(state, room_id, EVENT_ROUND_CHANGE, &payload);
}

/// Broadcast the final scoreboard.
pub fn broadcast_game_end(state: &SharedState, room_id: &str, payload: GameEndEvent) {
    send_room_event(state, room_id, EVENT_GAME_END, &payload);
}

/// Broadcast a new chat message.
pub fn broadcast_new_message(state: &SharedState, room_id: &str, message: &ChatMessage) {
    send_room_event(state, room_id, EVENT_NEW_MESSAGE, message);
}

fn send_room_event<T>(state: &SharedState, room_id: &str, event: &str, payload: &T)
where
    T: ?Sized + Serialize + Debug,
{
    // Delivery failures are logged by the registry and never interrupt the caller.
    let _ = state.connections().broadcast(room_id, event, payload);
}

fn send_player_event<T>(state: &SharedState, room_id: &str, player_id: &str, event: &str, payload: &T)
where
    T: ?Sized + Serialize + Debug,
{
    let _ = state
        .connections()
        .unicast(room_id, player_id, event, payload);
}
