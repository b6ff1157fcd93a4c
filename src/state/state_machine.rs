use thiserror::Error;

use crate::state::game::{GameStatus, Room, RoomLifecycle};

/// High-level states a room goes through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Some players are not ready yet.
    WaitingPlayers {
        /// Identifiers of the players that are not ready.
        outstanding: Vec<String>,
    },
    /// Every player is ready; the owner must start the game.
    WaitingOwner,
    /// A game is running and is in one of the turn phases.
    Playing(TurnPhase),
    /// Every turn has been played.
    Finished,
}

/// Fine-grained phase while a game is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// The game has started but no phase has begun yet (or the loop is between turns).
    Starting,
    /// The current singer picks a song.
    PickSong,
    /// The other players guess the current song.
    GuessSong,
}

/// Events that can be applied to the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The owner starts the game.
    Start,
    /// The phase loop enters a new phase.
    PhaseStarted(TurnPhase),
    /// The last turn of the last round has been played.
    Complete,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The state the room was in when the invalid event was received.
    pub from: SessionState,
    /// The event that cannot be applied from this state.
    pub event: SessionEvent,
}

impl SessionState {
    /// Derive the state of a persisted room.
    ///
    /// Lobby states come from the ready flags, playing phases from the game status.
    pub fn of(room: &Room) -> Self {
        match room.lifecycle {
            RoomLifecycle::Finished => Self::Finished,
            RoomLifecycle::Playing => {
                let phase = match room.game.as_ref().map(|game| &game.status) {
                    Some(GameStatus::PickingSong { .. }) => TurnPhase::PickSong,
                    Some(GameStatus::GuessingSong { .. }) => TurnPhase::GuessSong,
                    Some(GameStatus::Finished { .. }) => return Self::Finished,
                    _ => TurnPhase::Starting,
                };
                Self::Playing(phase)
            }
            RoomLifecycle::Waiting if room.all_ready() => Self::WaitingOwner,
            RoomLifecycle::Waiting => Self::WaitingPlayers {
                outstanding: room.outstanding_players(),
            },
        }
    }

    /// Compute the state reached by applying `event`, if the transition is valid.
    pub fn transition(&self, event: SessionEvent) -> Result<SessionState, InvalidTransition> {
        let next = match (self, event) {
            (Self::WaitingOwner, SessionEvent::Start) => Self::Playing(TurnPhase::Starting),
            (Self::Playing(_), SessionEvent::PhaseStarted(TurnPhase::PickSong)) => {
                Self::Playing(TurnPhase::PickSong)
            }
            (
                Self::Playing(TurnPhase::PickSong),
                SessionEvent::PhaseStarted(TurnPhase::GuessSong),
            ) => Self::Playing(TurnPhase::GuessSong),
            (Self::Playing(_), SessionEvent::Complete) => Self::Finished,
            (from, event) => {
                return Err(InvalidTransition {
                    from: from.clone(),
                    event,
                });
            }
        };

        Ok(next)
    }
}
