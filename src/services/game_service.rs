use tracing::{debug, info};
use validator::Validate;

use crate::{
    dto::{
        events::{CorrectGuessEvent, GameStartEvent},
        game::{GuessRequest, GuessResponse, PickSongRequest, SongChoice, StartGameRequest},
        room::RoomSafe,
    },
    error::ServiceError,
    services::{chat_service, room_events, room_service::player_not_found, scheduler},
    state::{
        SharedState,
        game::{Game, GameStatus, Room, RoomLifecycle, TurnPosition},
        state_machine::{SessionEvent, SessionState},
    },
};

/// Points earned by a player who finds the song.
pub const GUESSER_POINTS: i32 = 2;
/// Points earned by the singer each time somebody finds their song.
pub const SINGER_POINTS: i32 = 1;

/// Start the game of a fully ready room and launch its phase loop.
///
/// Rooms already playing or finished are rejected: a game is never restarted.
pub async fn start_game(
    state: &SharedState,
    request: StartGameRequest,
) -> Result<RoomSafe, ServiceError> {
    let room_id = request.room_id;
    if state.has_session(&room_id) {
        return Err(ServiceError::InvalidState(format!(
            "a game is already running in room `{room_id}`"
        )));
    }

    let settings = state.config().game().settings();
    let (room, game) = state
        .with_room_mut(&room_id, |room| {
            SessionState::of(room).transition(SessionEvent::Start)?;

            let player_ids = room.players.iter().map(|player| player.id.clone()).collect();
            let game = Game::shuffled(player_ids, settings);
            room.game = Some(game.clone());
            room.lifecycle = RoomLifecycle::Playing;
            Ok(game)
        })
        .await?;

    info!(
        room_id = %room.id,
        rounds = game.num_rounds(),
        players = game.turns_per_round(),
        "game started"
    );
    room_events::broadcast_game_start(
        state,
        &room.id,
        GameStartEvent {
            num_rounds: game.num_rounds(),
            turn_order: game.turn_order(),
        },
    );
    room_events::broadcast_room_state(state, &room);

    scheduler::launch(
        state.clone(),
        room.id.clone(),
        game.num_rounds(),
        game.turns_per_round(),
    );

    Ok(RoomSafe::from(&room))
}

/// Fix the song of the current turn from the singer's choices and end the pick phase.
pub async fn pick_song(
    state: &SharedState,
    request: PickSongRequest,
) -> Result<SongChoice, ServiceError> {
    let PickSongRequest {
        room_id,
        player_id,
        song_id,
    } = request;

    let (_, (position, song)) = state
        .with_room_mut(&room_id, |room| {
            let game = room.game.as_mut().ok_or_else(|| no_game(&room_id))?;
            match &game.status {
                GameStatus::PickingSong { singer } if *singer == player_id => {}
                GameStatus::PickingSong { .. } => {
                    return Err(ServiceError::InvalidState(
                        "only the current singer can pick a song".into(),
                    ));
                }
                _ => {
                    return Err(ServiceError::InvalidState(
                        "songs can only be picked during the pick phase".into(),
                    ));
                }
            }

            let position = game.position();
            let turn = game
                .current_mut()
                .ok_or_else(|| outside_grid(position))?;
            if turn.song.is_some() {
                return Err(ServiceError::InvalidState(
                    "a song was already picked for this turn".into(),
                ));
            }
            let song = turn
                .song_choices
                .iter()
                .find(|song| song.id == song_id)
                .cloned()
                .ok_or_else(|| {
                    ServiceError::InvalidInput(format!("song `{song_id}` was not offered"))
                })?;
            turn.song = Some(song.clone());
            Ok((position, song))
        })
        .await?;

    info!(
        room_id = %room_id,
        player_id = %player_id,
        round = position.round,
        turn = position.turn,
        song_id,
        "song picked"
    );
    state.phase_signals().cancel(&room_id);
    Ok(SongChoice::from(&song))
}

enum GuessOutcome {
    Found {
        position: TurnPosition,
    },
    Missed {
        player_name: String,
    },
}

/// Check a guess against the song of the current turn.
///
/// The first correct guess scores for the guesser and the singer and ends the
/// guess phase. Wrong guesses are posted to the chat under the guesser's name.
pub async fn guess(
    state: &SharedState,
    request: GuessRequest,
) -> Result<GuessResponse, ServiceError> {
    request.validate()?;
    let GuessRequest {
        room_id,
        player_id,
        guess,
    } = request;

    let (room, outcome) = state
        .with_room_mut(&room_id, |room| {
            let player_name = room
                .player(&player_id)
                .map(|player| player.name.clone())
                .ok_or_else(|| player_not_found(&room_id, &player_id))?;
            let game = room.game.as_mut().ok_or_else(|| no_game(&room_id))?;
            let GameStatus::GuessingSong { singer } = &game.status else {
                return Err(ServiceError::InvalidState(
                    "guesses are only accepted during the guess phase".into(),
                ));
            };
            let singer = singer.clone();
            if singer == player_id {
                return Err(ServiceError::InvalidState(
                    "the singer cannot guess their own song".into(),
                ));
            }

            let position = game.position();
            let turn = game
                .current_mut()
                .ok_or_else(|| outside_grid(position))?;
            if turn.guessers.contains(&player_id) {
                return Err(ServiceError::InvalidState(
                    "song already found this turn".into(),
                ));
            }
            let correct = turn
                .song
                .as_ref()
                .is_some_and(|song| titles_match(&song.title, &guess));
            if !correct {
                return Ok(GuessOutcome::Missed { player_name });
            }

            turn.guessers.push(player_id.clone());
            award(room, &player_id, GUESSER_POINTS);
            award(room, &singer, SINGER_POINTS);
            Ok(GuessOutcome::Found { position })
        })
        .await?;

    match outcome {
        GuessOutcome::Found { position } => {
            info!(
                room_id = %room_id,
                player_id = %player_id,
                round = position.round,
                turn = position.turn,
                "song found"
            );
            room_events::broadcast_correct_guess(
                state,
                &room_id,
                CorrectGuessEvent {
                    round: position.round,
                    turn: position.turn,
                    player_id,
                },
            );
            room_events::broadcast_room_state(state, &room);
            state.phase_signals().cancel(&room_id);
            Ok(GuessResponse { correct: true })
        }
        GuessOutcome::Missed { player_name } => {
            debug!(room_id = %room_id, player_id = %player_id, "wrong guess");
            chat_service::append(state, &room_id, player_name, guess).await?;
            Ok(GuessResponse { correct: false })
        }
    }
}

fn award(room: &mut Room, player_id: &str, points: i32) {
    if let Some(player) = room.player_mut(player_id) {
        player.score += points;
    }
}

/// Lower-cased alphanumeric characters only.
fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn titles_match(title: &str, guess: &str) -> bool {
    let title = normalize(title);
    !title.is_empty() && title == normalize(guess)
}

fn no_game(room_id: &str) -> ServiceError {
    ServiceError::InvalidState(format!("no game running in room `{room_id}`"))
}

pub(crate) fn outside_grid(position: TurnPosition) -> ServiceError {
    ServiceError::InvalidState(format!(
        "turn {} of round {} is outside the game grid",
        position.turn, position.round
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::GameConfig,
        services::{
            room_service,
            test_support::{attach, join, next_event, ready, test_state},
        },
    };

    fn quick_game() -> GameConfig {
        GameConfig {
            num_rounds: 1,
            pick_duration_secs: 3,
            turn_duration_secs: 5,
            ..GameConfig::default()
        }
    }

    #[test]
    fn titles_match_ignores_case_and_punctuation() {
        assert!(titles_match("Hey Jude", "hey jude"));
        assert!(titles_match("Bohemian Rhapsody", "  bohemian-RHAPSODY!"));
        assert!(!titles_match("Hey Jude", "hey"));
        assert!(!titles_match("!!!", "?"));
    }

    #[tokio::test(start_paused = true)]
    async fn start_requires_every_player_ready_and_happens_once() {
        let state = test_state(quick_game()).await;
        let room_id = room_service::create_room(&state).await.unwrap().room_id;
        let ana = join(&state, &room_id, "ana").await;
        let bob = join(&state, &room_id, "bob").await;
        ready(&state, &room_id, &ana.player.id).await;

        let early = start_game(&state, StartGameRequest { room_id: room_id.clone() }).await;
        assert!(matches!(early, Err(ServiceError::InvalidState(_))));
        let room = room_service::get_room(&state, &room_id).await.unwrap();
        assert!(room.game.is_none());

        ready(&state, &room_id, &bob.player.id).await;
        let started = start_game(&state, StartGameRequest { room_id: room_id.clone() })
            .await
            .unwrap();
        let game = started.game.unwrap();
        assert_eq!(game.turn_order.len(), 2);

        let again = start_game(&state, StartGameRequest { room_id: room_id.clone() }).await;
        assert!(matches!(again, Err(ServiceError::InvalidState(_))));

        let missing = start_game(&state, StartGameRequest { room_id: "nope".into() }).await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn pick_is_reserved_to_the_singer_and_the_offered_songs() {
        let state = test_state(quick_game()).await;
        let room_id = room_service::create_room(&state).await.unwrap().room_id;
        let ana = join(&state, &room_id, "ana").await;
        let bob = join(&state, &room_id, "bob").await;
        ready(&state, &room_id, &ana.player.id).await;
        ready(&state, &room_id, &bob.player.id).await;
        let mut rx = attach(&state, &room_id, &ana.player.id);

        start_game(&state, StartGameRequest { room_id: room_id.clone() })
            .await
            .unwrap();

        let pick = |player_id: &str, song_id: u32| PickSongRequest {
            room_id: room_id.clone(),
            player_id: player_id.to_string(),
            song_id,
        };
        let too_early = pick_song(&state, pick(ana.player.id.as_str(), 1)).await;
        assert!(matches!(too_early, Err(ServiceError::InvalidState(_))));

        let singer = loop {
            let event = next_event(&mut rx).await;
            if event["type"] == "phase_change" {
                break event["content"]["singer"].as_str().unwrap().to_string();
            }
        };
        let other = if singer == ana.player.id { &bob.player.id } else { &ana.player.id };

        let room = state.load_room(&room_id).await.unwrap();
        let turn = room.game.as_ref().unwrap().current().unwrap().clone();
        let offered = turn.song_choices[0].id;
        let not_offered = (1..=4)
            .find(|id| turn.song_choices.iter().all(|song| song.id != *id))
            .unwrap();

        let intruder = pick_song(&state, pick(other.as_str(), offered)).await;
        assert!(matches!(intruder, Err(ServiceError::InvalidState(_))));

        let unknown = pick_song(&state, pick(singer.as_str(), not_offered)).await;
        assert!(matches!(unknown, Err(ServiceError::InvalidInput(_))));

        let chosen = pick_song(&state, pick(singer.as_str(), offered)).await.unwrap();
        assert_eq!(chosen.id, offered);

        let twice = pick_song(&state, pick(singer.as_str(), offered)).await;
        assert!(matches!(twice, Err(ServiceError::InvalidState(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_guesses_go_to_the_chat() {
        let state = test_state(quick_game()).await;
        let room_id = room_service::create_room(&state).await.unwrap().room_id;
        let ana = join(&state, &room_id, "ana").await;
        let bob = join(&state, &room_id, "bob").await;
        ready(&state, &room_id, &ana.player.id).await;
        ready(&state, &room_id, &bob.player.id).await;
        let mut rx = attach(&state, &room_id, &ana.player.id);

        start_game(&state, StartGameRequest { room_id: room_id.clone() })
            .await
            .unwrap();

        let singer = loop {
            let event = next_event(&mut rx).await;
            if event["type"] == "phase_change" && event["content"]["phase"] == "guess_song" {
                break event["content"]["singer"].as_str().unwrap().to_string();
            }
        };
        let guesser = if singer == ana.player.id { &bob.player.id } else { &ana.player.id };
        let guesser_name = if singer == ana.player.id { "bob" } else { "ana" };

        let request = |player_id: &str, guess: &str| GuessRequest {
            room_id: room_id.clone(),
            player_id: player_id.to_string(),
            guess: guess.to_string(),
        };

        let own_song = guess(&state, request(singer.as_str(), "anything")).await;
        assert!(matches!(own_song, Err(ServiceError::InvalidState(_))));

        let response = guess(&state, request(guesser.as_str(), "definitely not a title"))
            .await
            .unwrap();
        assert!(!response.correct);

        let chat = chat_service::get_chat(&state, &room_id).await.unwrap();
        assert_eq!(chat.messages.len(), 1);
        assert_eq!(chat.messages[0].sender, guesser_name);
        assert_eq!(chat.messages[0].content, "definitely not a title");

        let room = state.load_room(&room_id).await.unwrap();
        assert!(room.players.iter().all(|player| player.score == 0));
    }
}
