//! Payloads of the events pushed to player sockets.

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::game::SongChoice,
    state::{game::FinalScore, state_machine::TurnPhase},
};

/// Phase name as sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PhaseName {
    PickSong,
    GuessSong,
}

impl PhaseName {
    /// Matching state machine phase.
    pub fn turn_phase(self) -> TurnPhase {
        match self {
            PhaseName::PickSong => TurnPhase::PickSong,
            PhaseName::GuessSong => TurnPhase::GuessSong,
        }
    }
}

/// `player_ready`: a player toggled their ready flag.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerReadyEvent {
    pub player_id: String,
    pub player_name: String,
    pub ready: bool,
}

/// `all_players_ready`: the owner may now start.
#[derive(Debug, Serialize, ToSchema)]
pub struct AllPlayersReadyEvent {
    pub owner: Option<String>,
}

/// `game_start`: the turn order has been fixed.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameStartEvent {
    pub num_rounds: usize,
    pub turn_order: Vec<String>,
}

/// `phase_change`: a phase of the current turn begins.
#[derive(Debug, Serialize, ToSchema)]
pub struct PhaseChangeEvent {
    pub phase: PhaseName,
    pub round: usize,
    pub turn: usize,
    pub singer: String,
    pub duration_secs: u32,
}

/// `pick_song`: choices offered to the singer only.
#[derive(Debug, Serialize, ToSchema)]
pub struct PickSongEvent {
    pub round: usize,
    pub turn: usize,
    pub choices: Vec<SongChoice>,
}

/// `timer`: one countdown tick.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TimerEvent {
    pub round: usize,
    pub turn: usize,
    pub remaining: u32,
    pub phase: PhaseName,
}

/// `no_song_chosen`: the pick countdown elapsed and a song was assigned.
#[derive(Debug, Serialize, ToSchema)]
pub struct NoSongChosenEvent {
    pub round: usize,
    pub turn: usize,
    pub singer: String,
}

/// `turn_ended_prematurely`: a correct guess stopped the guess countdown.
#[derive(Debug, Serialize, ToSchema)]
pub struct TurnEndedPrematurelyEvent {
    pub round: usize,
    pub turn: usize,
    pub remaining: u32,
}

/// `singer_song_data`: the song to sing, sent to the singer only.
#[derive(Debug, Serialize, ToSchema)]
pub struct SingerSongDataEvent {
    pub round: usize,
    pub turn: usize,
    pub song: SongChoice,
    pub lyrics: Option<String>,
}

/// `correct_guess`: a player found the song.
#[derive(Debug, Serialize, ToSchema)]
pub struct CorrectGuessEvent {
    pub round: usize,
    pub turn: usize,
    pub player_id: String,
}

/// `song_reveal`: the song of the turn, once guessing is over.
#[derive(Debug, Serialize, ToSchema)]
pub struct SongRevealEvent {
    pub round: usize,
    pub turn: usize,
    pub song: Option<SongChoice>,
    pub guessers: Vec<String>,
}

/// `turn_change`: the next singer is up.
#[derive(Debug, Serialize, ToSchema)]
pub struct TurnChangeEvent {
    pub round: usize,
    pub turn: usize,
    pub singer: String,
}

/// `round_change`: a new round begins.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundChangeEvent {
    pub round: usize,
}

/// Line of the final scoreboard.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScoreLine {
    pub player_id: String,
    pub name: String,
    pub score: i32,
}

impl From<FinalScore> for ScoreLine {
    fn from(value: FinalScore) -> Self {
        Self {
            player_id: value.player_id,
            name: value.name,
            score: value.score,
        }
    }
}

/// `game_end`: final scoreboard, best score first.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameEndEvent {
    pub scores: Vec<ScoreLine>,
}
