//! Per-room phase loop walking the rounds grid fixed when the game started.
//!
//! Every turn runs a pick phase, hands the song to the singer and runs a guess
//! phase. Failures are logged and never abort the loop, so a game always plays
//! its `rounds x turns` grid and then finishes.

use std::time::Duration;

use rand::seq::IndexedRandom;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::{
    dto::{
        events::{
            GameEndEvent, NoSongChosenEvent, PhaseChangeEvent, PhaseName, PickSongEvent,
            RoundChangeEvent, SingerSongDataEvent, SongRevealEvent, TimerEvent, TurnChangeEvent,
            TurnEndedPrematurelyEvent,
        },
        game::SongChoice,
    },
    error::ServiceError,
    services::{game_service::outside_grid, room_events},
    state::{
        SharedState,
        game::{Game, GameStatus, Room, RoomLifecycle, TurnPosition},
        state_machine::{SessionEvent, SessionState},
        timer::{CountdownOutcome, PhaseSignal, run_countdown},
    },
};

/// Upper bound on one lyrics lookup; the singer gets the song without lyrics past it.
const LYRICS_TIMEOUT: Duration = Duration::from_secs(5);

/// Spawn the phase loop of `room_id` and track its handle.
pub fn launch(state: SharedState, room_id: String, rounds: usize, turns: usize) {
    let handle = tokio::spawn(run_game(state.clone(), room_id.clone(), rounds, turns));
    state.register_session(&room_id, handle);
}

async fn run_game(state: SharedState, room_id: String, rounds: usize, turns: usize) {
    info!(room_id = %room_id, rounds, turns, "phase loop started");

    for round in 0..rounds {
        for turn in 0..turns {
            let position = TurnPosition { round, turn };
            play_turn(&state, &room_id, position).await;
            if let Err(err) = advance(&state, &room_id, position, rounds, turns).await {
                error!(room_id = %room_id, round, turn, error = %err, "failed to advance the game");
            }
        }
    }

    state.finish_session(&room_id);
    info!(room_id = %room_id, "phase loop finished");
}

async fn play_turn(state: &SharedState, room_id: &str, position: TurnPosition) {
    let TurnPosition { round, turn } = position;

    if let Err(err) = run_pick_phase(state, room_id, position).await {
        error!(room_id, round, turn, error = %err, "pick phase failed");
    }
    if let Err(err) = deliver_song(state, room_id, position).await {
        error!(room_id, round, turn, error = %err, "failed to hand the song to the singer");
    }
    if let Err(err) = run_guess_phase(state, room_id, position).await {
        error!(room_id, round, turn, error = %err, "guess phase failed");
    }
}

async fn run_pick_phase(
    state: &SharedState,
    room_id: &str,
    position: TurnPosition,
) -> Result<(), ServiceError> {
    let signal = state.phase_signals().signal(room_id);
    signal.reset();

    let choices = state.catalog().choices(state.config().game().song_choices);
    let offered: Vec<SongChoice> = choices.iter().map(SongChoice::from).collect();

    let (room, (singer, duration_secs)) = state
        .with_room_mut(room_id, |room| {
            let phase = PhaseName::PickSong.turn_phase();
            SessionState::of(room).transition(SessionEvent::PhaseStarted(phase))?;
            let game = playing_game(room)?;
            game.current_round = position.round;
            game.current_turn = position.turn;

            let turn = game.turn_mut(position).ok_or_else(|| outside_grid(position))?;
            turn.song_choices = choices;
            let singer = turn.player_id.clone();
            game.status = GameStatus::PickingSong {
                singer: singer.clone(),
            };
            Ok((singer, game.settings.pick_duration_secs))
        })
        .await?;

    debug!(
        room_id,
        round = position.round,
        turn = position.turn,
        singer = %singer,
        "pick phase started"
    );
    room_events::broadcast_phase_change(
        state,
        room_id,
        PhaseChangeEvent {
            phase: PhaseName::PickSong,
            round: position.round,
            turn: position.turn,
            singer: singer.clone(),
            duration_secs,
        },
    );
    room_events::broadcast_room_state(state, &room);
    room_events::send_pick_song(
        state,
        room_id,
        &singer,
        PickSongEvent {
            round: position.round,
            turn: position.turn,
            choices: offered,
        },
    );

    match countdown(state, room_id, &signal, position, PhaseName::PickSong, duration_secs).await {
        CountdownOutcome::Cancelled { remaining } => {
            debug!(
                room_id,
                round = position.round,
                turn = position.turn,
                remaining,
                "song picked before the deadline"
            );
        }
        CountdownOutcome::Elapsed => {
            assign_fallback_song(state, room_id, position).await?;
        }
    }
    Ok(())
}

/// Announce `no_song_chosen` and assign a song to a turn still without one.
///
/// Returns `false` when a pick won the race; nothing is announced then.
async fn assign_fallback_song(
    state: &SharedState,
    room_id: &str,
    position: TurnPosition,
) -> Result<bool, ServiceError> {
    let from_catalog = state.catalog().random();

    let (_, assigned) = state
        .with_room_mut(room_id, |room| {
            let turn = playing_game(room)?
                .turn_mut(position)
                .ok_or_else(|| outside_grid(position))?;
            if turn.song.is_some() {
                return Ok(false);
            }
            // Picks wait on the gate, so none can land between the event and the fallback.
            room_events::broadcast_no_song_chosen(
                state,
                room_id,
                NoSongChosenEvent {
                    round: position.round,
                    turn: position.turn,
                    singer: turn.player_id.clone(),
                },
            );
            turn.song = turn
                .song_choices
                .choose(&mut rand::rng())
                .cloned()
                .or(from_catalog);
            Ok(true)
        })
        .await?;

    if assigned {
        debug!(room_id, round = position.round, turn = position.turn, "fallback song assigned");
    } else {
        debug!(room_id, round = position.round, turn = position.turn, "late pick kept");
    }
    Ok(assigned)
}

/// Fetch the lyrics of the song fixed for `position`, persist them and send both to the singer.
async fn deliver_song(
    state: &SharedState,
    room_id: &str,
    position: TurnPosition,
) -> Result<(), ServiceError> {
    let room = state.load_room(room_id).await?;
    let turn = room
        .game
        .as_ref()
        .and_then(|game| game.turn(position))
        .ok_or_else(|| outside_grid(position))?;
    let Some(song) = turn.song.clone() else {
        warn!(
            room_id,
            round = position.round,
            turn = position.turn,
            "no song to sing this turn"
        );
        return Ok(());
    };
    let singer = turn.player_id.clone();

    let lyrics = match (&song.lyrics, state.lyrics()) {
        (Some(lyrics), _) => Some(lyrics.clone()),
        (None, Some(client)) => {
            match timeout(LYRICS_TIMEOUT, client.fetch(&song.artist, &song.title)).await {
                Ok(Ok(lyrics)) => lyrics,
                Ok(Err(err)) => {
                    warn!(room_id, song_id = song.id, error = %err, "lyrics lookup failed");
                    None
                }
                Err(_) => {
                    warn!(room_id, song_id = song.id, "lyrics lookup timed out");
                    None
                }
            }
        }
        (None, None) => None,
    };

    if song.lyrics.is_none() && lyrics.is_some() {
        let fetched = lyrics.clone();
        state
            .with_room_mut(room_id, |room| {
                let stored = playing_game(room)?
                    .turn_mut(position)
                    .and_then(|turn| turn.song.as_mut())
                    .filter(|stored| stored.id == song.id);
                if let Some(stored) = stored {
                    stored.lyrics = fetched;
                }
                Ok(())
            })
            .await?;
    }

    room_events::send_singer_song_data(
        state,
        room_id,
        &singer,
        SingerSongDataEvent {
            round: position.round,
            turn: position.turn,
            song: SongChoice::from(&song),
            lyrics,
        },
    );
    Ok(())
}

async fn run_guess_phase(
    state: &SharedState,
    room_id: &str,
    position: TurnPosition,
) -> Result<(), ServiceError> {
    let signal = state.phase_signals().signal(room_id);
    signal.reset();

    let (room, (singer, duration_secs)) = state
        .with_room_mut(room_id, |room| {
            let phase = PhaseName::GuessSong.turn_phase();
            SessionState::of(room).transition(SessionEvent::PhaseStarted(phase))?;
            let game = playing_game(room)?;
            let singer = game
                .turn(position)
                .map(|turn| turn.player_id.clone())
                .ok_or_else(|| outside_grid(position))?;
            game.status = GameStatus::GuessingSong {
                singer: singer.clone(),
            };
            Ok((singer, game.settings.turn_duration_secs))
        })
        .await?;

    debug!(
        room_id,
        round = position.round,
        turn = position.turn,
        singer = %singer,
        "guess phase started"
    );
    room_events::broadcast_phase_change(
        state,
        room_id,
        PhaseChangeEvent {
            phase: PhaseName::GuessSong,
            round: position.round,
            turn: position.turn,
            singer,
            duration_secs,
        },
    );
    room_events::broadcast_room_state(state, &room);

    let outcome =
        countdown(state, room_id, &signal, position, PhaseName::GuessSong, duration_secs).await;
    if let CountdownOutcome::Cancelled { remaining } = outcome {
        debug!(
            room_id,
            round = position.round,
            turn = position.turn,
            remaining,
            "guess phase ended early"
        );
        room_events::broadcast_turn_ended_prematurely(
            state,
            room_id,
            TurnEndedPrematurelyEvent {
                round: position.round,
                turn: position.turn,
                remaining,
            },
        );
    }

    reveal_song(state, room_id, position).await
}

async fn reveal_song(
    state: &SharedState,
    room_id: &str,
    position: TurnPosition,
) -> Result<(), ServiceError> {
    let room = state.load_room(room_id).await?;
    let turn = room
        .game
        .as_ref()
        .and_then(|game| game.turn(position))
        .ok_or_else(|| outside_grid(position))?;

    room_events::broadcast_song_reveal(
        state,
        room_id,
        SongRevealEvent {
            round: position.round,
            turn: position.turn,
            song: turn.song.as_ref().map(SongChoice::from),
            guessers: turn.guessers.clone(),
        },
    );
    Ok(())
}

/// Move the indices past `position`: next turn, next round, or end of game.
async fn advance(
    state: &SharedState,
    room_id: &str,
    position: TurnPosition,
    rounds: usize,
    turns: usize,
) -> Result<(), ServiceError> {
    let next_turn = position.turn + 1;
    let next_round = position.round + 1;

    if next_turn < turns {
        let (room, singer) = state
            .with_room_mut(room_id, |room| {
                let game = playing_game(room)?;
                game.current_round = position.round;
                game.current_turn = next_turn;
                game.status = GameStatus::PlayingRound;
                game.current()
                    .map(|turn| turn.player_id.clone())
                    .ok_or_else(|| outside_grid(game.position()))
            })
            .await?;

        debug!(room_id, round = position.round, turn = next_turn, "turn advanced");
        room_events::broadcast_turn_change(
            state,
            room_id,
            TurnChangeEvent {
                round: position.round,
                turn: next_turn,
                singer,
            },
        );
        room_events::broadcast_room_state(state, &room);
    } else if next_round < rounds {
        let (room, _) = state
            .with_room_mut(room_id, |room| {
                let game = playing_game(room)?;
                game.current_round = next_round;
                game.current_turn = 0;
                game.status = GameStatus::PlayingRound;
                Ok(())
            })
            .await?;

        debug!(room_id, round = next_round, "round advanced");
        room_events::broadcast_round_change(state, room_id, RoundChangeEvent { round: next_round });
        room_events::broadcast_room_state(state, &room);
    } else {
        let (room, scores) = state
            .with_room_mut(room_id, |room| {
                SessionState::of(room).transition(SessionEvent::Complete)?;
                let scores = room.scoreboard();
                playing_game(room)?.status = GameStatus::Finished {
                    scores: scores.clone(),
                };
                room.lifecycle = RoomLifecycle::Finished;
                Ok(scores)
            })
            .await?;

        info!(room_id, "game finished");
        room_events::broadcast_game_end(
            state,
            room_id,
            GameEndEvent {
                scores: scores.into_iter().map(Into::into).collect(),
            },
        );
        room_events::broadcast_room_state(state, &room);
    }
    Ok(())
}

async fn countdown(
    state: &SharedState,
    room_id: &str,
    signal: &PhaseSignal,
    position: TurnPosition,
    phase: PhaseName,
    seconds: u32,
) -> CountdownOutcome {
    let tick = state.config().game().tick_interval;
    run_countdown(signal, seconds, tick, |remaining| {
        room_events::broadcast_timer(
            state,
            room_id,
            &TimerEvent {
                round: position.round,
                turn: position.turn,
                remaining,
                phase,
            },
        );
    })
    .await
}

fn playing_game(room: &mut Room) -> Result<&mut Game, ServiceError> {
    let room_id = room.id.clone();
    room.game
        .as_mut()
        .ok_or_else(|| ServiceError::InvalidState(format!("no game running in room `{room_id}`")))
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use axum::extract::ws::Message;
    use futures::future::BoxFuture;
    use serde_json::Value;
    use tokio::{sync::mpsc, time::sleep};

    use super::*;
    use crate::{
        config::GameConfig,
        dao::{
            models::{ChatEntity, RoomEntity},
            room_store::{RoomStore, memory::MemoryRoomStore},
            storage::{StorageError, StorageResult},
        },
        dto::game::{GuessRequest, PickSongRequest, StartGameRequest},
        services::{
            game_service, room_service,
            test_support::{attach, drain_events, join, next_event, ready, test_state_on},
        },
    };

    /// Memory store rejecting the next `failures` room saves.
    #[derive(Default)]
    struct FailingSaves {
        inner: MemoryRoomStore,
        failures: AtomicUsize,
    }

    impl RoomStore for FailingSaves {
        fn load_room(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
            self.inner.load_room(room_id)
        }

        fn save_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
            let rejected = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if rejected {
                return Box::pin(async {
                    Err(StorageError::unavailable(
                        "save rejected".into(),
                        std::io::Error::other("disk full"),
                    ))
                });
            }
            self.inner.save_room(room)
        }

        fn load_chat(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Option<ChatEntity>>> {
            self.inner.load_chat(room_id)
        }

        fn save_chat(&self, chat: ChatEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_chat(chat)
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.try_reconnect()
        }
    }

    async fn started_room(game: GameConfig, names: &[&str]) -> (SharedState, String, Vec<String>) {
        started_room_on(Arc::new(MemoryRoomStore::new()), game, names).await
    }

    async fn started_room_on(
        store: Arc<dyn RoomStore>,
        game: GameConfig,
        names: &[&str],
    ) -> (SharedState, String, Vec<String>) {
        let state = test_state_on(game, store).await;
        let room_id = room_service::create_room(&state).await.unwrap().room_id;
        let mut ids = Vec::new();
        for name in names {
            let joined = join(&state, &room_id, name).await;
            ready(&state, &room_id, &joined.player.id).await;
            ids.push(joined.player.id);
        }
        (state, room_id, ids)
    }

    async fn start(state: &SharedState, room_id: &str) {
        game_service::start_game(
            state,
            StartGameRequest {
                room_id: room_id.to_string(),
            },
        )
        .await
        .unwrap();
    }

    async fn wait_for_end(state: &SharedState, room_id: &str) {
        while state.has_session(room_id) {
            sleep(Duration::from_secs(1)).await;
        }
    }

    async fn wait_for_guess_tick(rx: &mut mpsc::UnboundedReceiver<Message>, remaining: u64) {
        loop {
            let event = next_event(rx).await;
            if event["type"] == "timer"
                && event["content"]["phase"] == "guess_song"
                && event["content"]["remaining"] == remaining
            {
                return;
            }
        }
    }

    fn count_by_type(events: &[Value]) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for event in events {
            let kind = event["type"].as_str().unwrap_or_default().to_string();
            *counts.entry(kind).or_insert(0) += 1;
        }
        counts
    }

    #[tokio::test(start_paused = true)]
    async fn unattended_game_plays_every_turn_then_finishes() {
        let (state, room_id, ids) = started_room(
            GameConfig {
                num_rounds: 2,
                pick_duration_secs: 3,
                turn_duration_secs: 10,
                ..GameConfig::default()
            },
            &["ana", "bob"],
        )
        .await;
        let mut rx = attach(&state, &room_id, &ids[0]);

        start(&state, &room_id).await;
        wait_for_end(&state, &room_id).await;

        let events = drain_events(&mut rx);
        let counts = count_by_type(&events);
        // 4 turns x (pick 3..=0 + guess 10..=0)
        assert_eq!(counts["timer"], 4 * (4 + 11));
        assert_eq!(counts["phase_change"], 8);
        assert_eq!(counts["no_song_chosen"], 4);
        assert_eq!(counts["song_reveal"], 4);
        assert_eq!(counts["turn_change"], 2);
        assert_eq!(counts["round_change"], 1);
        assert_eq!(counts["game_end"], 1);
        // ana sings once per round and is the only one to see her choices
        assert_eq!(counts["pick_song"], 2);
        assert_eq!(counts["singer_song_data"], 2);
        assert!(!counts.contains_key("turn_ended_prematurely"));

        let pick_ticks: Vec<u64> = events
            .iter()
            .filter(|e| e["type"] == "timer" && e["content"]["phase"] == "pick_song")
            .take(4)
            .map(|e| e["content"]["remaining"].as_u64().unwrap())
            .collect();
        assert_eq!(pick_ticks, vec![3, 2, 1, 0]);

        let room = state.load_room(&room_id).await.unwrap();
        assert_eq!(room.lifecycle, RoomLifecycle::Finished);
        let game = room.game.unwrap();
        assert!(matches!(game.status, GameStatus::Finished { .. }));
        assert!(game.current_round < 2 && game.current_turn < 2);
        for row in game.rounds() {
            for turn in row {
                let song = turn.song.as_ref().expect("fallback song assigned");
                assert!(turn.song_choices.contains(song));
            }
        }
        assert!(!state.has_session(&room_id));
    }

    #[tokio::test(start_paused = true)]
    async fn indices_stay_inside_the_grid_at_every_turn_change() {
        let (state, room_id, ids) = started_room(
            GameConfig {
                num_rounds: 2,
                pick_duration_secs: 1,
                turn_duration_secs: 1,
                ..GameConfig::default()
            },
            &["ana", "bob", "cleo"],
        )
        .await;
        let mut rx = attach(&state, &room_id, &ids[0]);

        start(&state, &room_id).await;
        let mut positions = Vec::new();
        loop {
            let event = next_event(&mut rx).await;
            match event["type"].as_str() {
                Some("phase_change") if event["content"]["phase"] == "pick_song" => {
                    let content = &event["content"];
                    positions.push((
                        content["round"].as_u64().unwrap(),
                        content["turn"].as_u64().unwrap(),
                    ));
                }
                Some("game_end") => break,
                _ => {}
            }
        }

        assert_eq!(
            positions,
            vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn correct_guess_ends_the_guess_phase_early() {
        let (state, room_id, ids) = started_room(
            GameConfig {
                num_rounds: 1,
                pick_duration_secs: 2,
                turn_duration_secs: 10,
                ..GameConfig::default()
            },
            &["ana", "bob"],
        )
        .await;
        let mut rx = attach(&state, &room_id, &ids[0]);
        start(&state, &room_id).await;

        // Wait for the second tick (10, 9) of the first guess phase.
        loop {
            let event = next_event(&mut rx).await;
            if event["type"] == "timer"
                && event["content"]["phase"] == "guess_song"
                && event["content"]["remaining"] == 9
            {
                break;
            }
        }

        let room = state.load_room(&room_id).await.unwrap();
        let turn = room.game.as_ref().unwrap().current().unwrap().clone();
        let singer = turn.player_id.clone();
        let guesser = ids.iter().find(|id| **id != singer).unwrap().clone();
        let title = turn.song.as_ref().unwrap().title.to_uppercase();

        let response = game_service::guess(
            &state,
            GuessRequest {
                room_id: room_id.clone(),
                player_id: guesser.clone(),
                guess: format!("{title}!"),
            },
        )
        .await
        .unwrap();
        assert!(response.correct);

        let mut after = Vec::new();
        loop {
            let event = next_event(&mut rx).await;
            let done = event["type"] == "song_reveal";
            after.push(event);
            if done {
                break;
            }
        }
        let kinds: Vec<_> = after
            .iter()
            .map(|e| e["type"].as_str().unwrap().to_string())
            .collect();
        assert!(kinds.contains(&"correct_guess".to_string()));
        assert!(!kinds.contains(&"timer".to_string()));
        let ended = after
            .iter()
            .find(|e| e["type"] == "turn_ended_prematurely")
            .unwrap();
        assert_eq!(ended["content"]["remaining"], 9);
        let reveal = after.last().unwrap();
        assert_eq!(reveal["content"]["guessers"], serde_json::json!([guesser]));

        let room = state.load_room(&room_id).await.unwrap();
        assert_eq!(room.player(&guesser).unwrap().score, game_service::GUESSER_POINTS);
        assert_eq!(room.player(&singer).unwrap().score, game_service::SINGER_POINTS);

        let again = game_service::guess(
            &state,
            GuessRequest {
                room_id: room_id.clone(),
                player_id: guesser,
                guess: title,
            },
        )
        .await;
        assert!(again.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn pick_cancels_the_pick_countdown_and_skips_the_fallback() {
        let (state, room_id, ids) = started_room(
            GameConfig {
                num_rounds: 1,
                pick_duration_secs: 10,
                turn_duration_secs: 2,
                ..GameConfig::default()
            },
            &["ana"],
        )
        .await;
        let mut rx = attach(&state, &room_id, &ids[0]);
        start(&state, &room_id).await;

        let choices = loop {
            let event = next_event(&mut rx).await;
            if event["type"] == "pick_song" {
                break event["content"]["choices"].clone();
            }
        };
        let song_id = choices[0]["id"].as_u64().unwrap() as u32;

        game_service::pick_song(
            &state,
            PickSongRequest {
                room_id: room_id.clone(),
                player_id: ids[0].clone(),
                song_id,
            },
        )
        .await
        .unwrap();

        wait_for_end(&state, &room_id).await;
        let events = drain_events(&mut rx);
        let counts = count_by_type(&events);
        assert!(!counts.contains_key("no_song_chosen"));
        let pick_ticks = events
            .iter()
            .filter(|e| e["type"] == "timer" && e["content"]["phase"] == "pick_song")
            .count();
        assert!(pick_ticks <= 1, "pick countdown kept ticking: {pick_ticks}");

        let song_data = events
            .iter()
            .find(|e| e["type"] == "singer_song_data")
            .unwrap();
        assert_eq!(song_data["content"]["song"]["id"], song_id);

        let room = state.load_room(&room_id).await.unwrap();
        let game = room.game.unwrap();
        let turn = game.turn(TurnPosition { round: 0, turn: 0 }).unwrap();
        assert_eq!(turn.song.as_ref().unwrap().id, song_id);
    }
    #[tokio::test(start_paused = true)]
    async fn game_without_sockets_still_finishes() {
        let (state, room_id, _) = started_room(
            GameConfig {
                num_rounds: 1,
                pick_duration_secs: 1,
                turn_duration_secs: 2,
                ..GameConfig::default()
            },
            &["ana", "bob"],
        )
        .await;

        start(&state, &room_id).await;
        timeout(Duration::from_secs(120), wait_for_end(&state, &room_id))
            .await
            .expect("phase loop ended");

        let room = state.load_room(&room_id).await.unwrap();
        assert_eq!(room.lifecycle, RoomLifecycle::Finished);
        assert!(matches!(room.game.unwrap().status, GameStatus::Finished { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_save_skips_one_step_and_the_game_goes_on() {
        let store = Arc::new(FailingSaves::default());
        let (state, room_id, ids) = started_room_on(
            store.clone(),
            GameConfig {
                num_rounds: 1,
                pick_duration_secs: 1,
                turn_duration_secs: 3,
                ..GameConfig::default()
            },
            &["ana", "bob"],
        )
        .await;
        let mut rx = attach(&state, &room_id, &ids[0]);
        start(&state, &room_id).await;

        // The next room save is the turn change after the first reveal.
        wait_for_guess_tick(&mut rx, 2).await;
        store.failures.store(1, Ordering::SeqCst);

        timeout(Duration::from_secs(120), wait_for_end(&state, &room_id))
            .await
            .expect("phase loop ended");

        let counts = count_by_type(&drain_events(&mut rx));
        assert!(!counts.contains_key("turn_change"));
        assert_eq!(counts["song_reveal"], 2);
        assert_eq!(counts["game_end"], 1);

        let room = state.load_room(&room_id).await.unwrap();
        assert_eq!(room.lifecycle, RoomLifecycle::Finished);
        let game = room.game.unwrap();
        assert!(matches!(game.status, GameStatus::Finished { .. }));
        assert_eq!((game.current_round, game.current_turn), (0, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn store_outage_mid_game_ends_the_loop() {
        let (state, room_id, ids) = started_room(
            GameConfig {
                num_rounds: 2,
                pick_duration_secs: 3,
                turn_duration_secs: 10,
                ..GameConfig::default()
            },
            &["ana", "bob"],
        )
        .await;
        let mut rx = attach(&state, &room_id, &ids[0]);
        start(&state, &room_id).await;

        wait_for_guess_tick(&mut rx, 9).await;
        state.update_degraded(true);

        timeout(Duration::from_secs(120), wait_for_end(&state, &room_id))
            .await
            .expect("phase loop ended");
        assert!(!state.has_session(&room_id));

        // The running countdown completes; every later step fails and is skipped.
        let counts = count_by_type(&drain_events(&mut rx));
        assert_eq!(counts["timer"], 9);
        assert!(!counts.contains_key("song_reveal"));
        assert!(!counts.contains_key("game_end"));

        state.update_degraded(false);
        let room = state.load_room(&room_id).await.unwrap();
        assert_eq!(room.lifecycle, RoomLifecycle::Playing);
        let err = game_service::start_game(
            &state,
            StartGameRequest {
                room_id: room_id.clone(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }
    #[tokio::test(start_paused = true)]
    async fn no_song_chosen_is_announced_before_the_fallback_is_stored() {
        let store = Arc::new(FailingSaves::default());
        let (state, room_id, ids) = started_room_on(
            store.clone(),
            GameConfig {
                num_rounds: 1,
                pick_duration_secs: 1,
                turn_duration_secs: 2,
                ..GameConfig::default()
            },
            &["ana", "bob"],
        )
        .await;
        let mut rx = attach(&state, &room_id, &ids[0]);
        start(&state, &room_id).await;

        loop {
            let event = next_event(&mut rx).await;
            if event["type"] == "timer"
                && event["content"]["phase"] == "pick_song"
                && event["content"]["remaining"] == 0
            {
                break;
            }
        }
        // Losing the fallback write must not swallow the announcement.
        store.failures.store(1, Ordering::SeqCst);

        let mut kinds = Vec::new();
        loop {
            let event = next_event(&mut rx).await;
            let kind = event["type"].as_str().unwrap().to_string();
            if kind == "phase_change" {
                break;
            }
            kinds.push(kind);
        }
        assert_eq!(kinds, vec!["no_song_chosen"]);

        let room = state.load_room(&room_id).await.unwrap();
        let first = room
            .game
            .as_ref()
            .unwrap()
            .turn(TurnPosition { round: 0, turn: 0 })
            .unwrap();
        assert!(first.song.is_none());
    }
}
