use std::time::SystemTime;

use rand::{Rng, distr::Alphanumeric, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::dao::models::{
    GameEntity, GameSettingsEntity, GameStatusEntity, GameStatusKind, PlayerEntity, RoomEntity,
    RoomStateEntity, SongEntity, TurnEntity,
};

/// Length of the private reconnection credential handed out at join time.
const CREDENTIAL_LEN: usize = 32;

/// Runtime representation of a room and everything it aggregates.
#[derive(Debug, Clone)]
pub struct Room {
    /// Stable identifier for the room.
    pub id: String,
    /// Player allowed to start the game (the first one to join).
    pub owner: Option<String>,
    /// Players in join order.
    pub players: Vec<Player>,
    /// Game data, present once the owner started a game.
    pub game: Option<Game>,
    /// Coarse lifecycle of the room.
    pub lifecycle: RoomLifecycle,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// Last time the room record was rewritten.
    pub updated_at: SystemTime,
}

/// Coarse lifecycle of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomLifecycle {
    /// Players are joining and readying up.
    Waiting,
    /// A game is running.
    Playing,
    /// The game reached its last turn.
    Finished,
}

/// Player tracked inside a room.
///
/// The reconnection credential is private: the only way to read it is
/// [`Player::credential`], which is called once when answering a join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Stable identifier for the player.
    pub id: String,
    /// Display name, unique within a room.
    pub name: String,
    /// Whether the player declared themselves ready.
    pub ready: bool,
    /// Whether a socket is currently attached for this player.
    pub connected: bool,
    /// Accumulated score.
    pub score: i32,
    credential: String,
}

/// Game state nested inside a room.
#[derive(Debug, Clone, PartialEq)]
pub struct Game {
    /// Current status of the game.
    pub status: GameStatus,
    /// Settings captured when the game started.
    pub settings: GameSettings,
    /// Index of the round being played.
    pub current_round: usize,
    /// Index of the turn being played inside the current round.
    pub current_turn: usize,
    rounds: Vec<Vec<Turn>>,
}

/// Settings frozen into a game at start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSettings {
    /// Number of rounds to play.
    pub num_rounds: usize,
    /// Seconds allowed to guess a song.
    pub turn_duration_secs: u32,
    /// Seconds allowed to pick a song.
    pub pick_duration_secs: u32,
}

/// Status of a game, with the detail each status carries.
#[derive(Debug, Clone, PartialEq)]
pub enum GameStatus {
    /// Game started, between phases.
    PlayingRound,
    /// The singer picks a song.
    PickingSong {
        /// Identifier of the current singer.
        singer: String,
    },
    /// The other players guess the song.
    GuessingSong {
        /// Identifier of the current singer.
        singer: String,
    },
    /// Every turn has been played.
    Finished {
        /// Final scoreboard, best score first.
        scores: Vec<FinalScore>,
    },
}

/// Line of the final scoreboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalScore {
    /// Identifier of the player.
    pub player_id: String,
    /// Display name of the player.
    pub name: String,
    /// Score at the end of the game.
    pub score: i32,
}

/// One player's turn inside a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// Identifier of the singer for this turn.
    pub player_id: String,
    /// Song fixed for this turn, once picked.
    pub song: Option<Song>,
    /// Songs offered to the singer.
    pub song_choices: Vec<Song>,
    /// Players who guessed the song.
    pub guessers: Vec<String>,
}

/// Song metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    /// Catalog identifier.
    pub id: u32,
    /// Song title.
    pub title: String,
    /// Performing artist.
    pub artist: String,
    /// Lyrics fetched once the song was fixed.
    pub lyrics: Option<String>,
}

/// Coordinates of a turn in the rounds grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnPosition {
    /// Round index.
    pub round: usize,
    /// Turn index inside the round.
    pub turn: usize,
}

impl Room {
    /// Fresh empty room waiting for players.
    pub fn new() -> Self {
        let now = SystemTime::now();
        Self {
            id: Uuid::new_v4().to_string(),
            owner: None,
            players: Vec::new(),
            game: None,
            lifecycle: RoomLifecycle::Waiting,
            created_at: now,
            updated_at: now,
        }
    }

    /// Look a player up by identifier.
    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|player| player.id == player_id)
    }

    /// Mutable variant of [`Room::player`].
    pub fn player_mut(&mut self, player_id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|player| player.id == player_id)
    }

    /// Resolve the player owning a reconnection credential.
    pub fn player_by_credential(&self, credential: &str) -> Option<&Player> {
        self.players
            .iter()
            .find(|player| player.credential == credential)
    }

    /// Identifiers of the players that are not ready, in join order.
    pub fn outstanding_players(&self) -> Vec<String> {
        self.players
            .iter()
            .filter(|player| !player.ready)
            .map(|player| player.id.clone())
            .collect()
    }

    /// Whether the room has at least one player and all of them are ready.
    pub fn all_ready(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(|player| player.ready)
    }

    /// Final scoreboard ordered by descending score (join order breaks ties).
    pub fn scoreboard(&self) -> Vec<FinalScore> {
        let mut scores: Vec<FinalScore> = self
            .players
            .iter()
            .map(|player| FinalScore {
                player_id: player.id.clone(),
                name: player.name.clone(),
                score: player.score,
            })
            .collect();
        scores.sort_by(|a, b| b.score.cmp(&a.score));
        scores
    }
}

impl Default for Room {
    fn default() -> Self {
        Self::new()
    }
}

impl Player {
    /// New player with a fresh identifier and credential.
    pub fn new(name: String) -> Self {
        let credential = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(CREDENTIAL_LEN)
            .map(char::from)
            .collect();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            ready: false,
            connected: true,
            score: 0,
            credential,
        }
    }

    /// Private reconnection credential.
    pub fn credential(&self) -> &str {
        &self.credential
    }
}

impl Game {
    /// Build a game whose every round follows `order`.
    pub fn with_turn_order(order: Vec<String>, settings: GameSettings) -> Self {
        let row: Vec<Turn> = order.into_iter().map(Turn::new).collect();
        let rounds = vec![row; settings.num_rounds];
        Self {
            status: GameStatus::PlayingRound,
            settings,
            current_round: 0,
            current_turn: 0,
            rounds,
        }
    }

    /// Build a game with a single uniformly shuffled turn order reused by every round.
    pub fn shuffled(mut player_ids: Vec<String>, settings: GameSettings) -> Self {
        player_ids.shuffle(&mut rand::rng());
        Self::with_turn_order(player_ids, settings)
    }

    /// Number of rounds in the grid.
    pub fn num_rounds(&self) -> usize {
        self.rounds.len()
    }

    /// Number of turns per round.
    pub fn turns_per_round(&self) -> usize {
        self.rounds.first().map(Vec::len).unwrap_or(0)
    }

    /// Singer order shared by every round.
    pub fn turn_order(&self) -> Vec<String> {
        self.rounds
            .first()
            .map(|row| row.iter().map(|turn| turn.player_id.clone()).collect())
            .unwrap_or_default()
    }

    /// Full grid, read-only.
    pub fn rounds(&self) -> &[Vec<Turn>] {
        &self.rounds
    }

    /// Position currently pointed at by the round/turn indices.
    pub fn position(&self) -> TurnPosition {
        TurnPosition {
            round: self.current_round,
            turn: self.current_turn,
        }
    }

    /// Turn at `position`, if inside the grid.
    pub fn turn(&self, position: TurnPosition) -> Option<&Turn> {
        self.rounds.get(position.round)?.get(position.turn)
    }

    /// Mutable variant of [`Game::turn`]. The grid shape itself cannot change.
    pub fn turn_mut(&mut self, position: TurnPosition) -> Option<&mut Turn> {
        self.rounds.get_mut(position.round)?.get_mut(position.turn)
    }

    /// Turn currently pointed at by the round/turn indices.
    pub fn current(&self) -> Option<&Turn> {
        self.turn(self.position())
    }

    /// Mutable variant of [`Game::current`].
    pub fn current_mut(&mut self) -> Option<&mut Turn> {
        self.turn_mut(self.position())
    }
}

impl Turn {
    fn new(player_id: String) -> Self {
        Self {
            player_id,
            song: None,
            song_choices: Vec::new(),
            guessers: Vec::new(),
        }
    }
}

impl Song {
    /// Catalog song without lyrics.
    pub fn new(id: u32, title: String, artist: String) -> Self {
        Self {
            id,
            title,
            artist,
            lyrics: None,
        }
    }
}

impl From<RoomStateEntity> for RoomLifecycle {
    fn from(value: RoomStateEntity) -> Self {
        match value {
            RoomStateEntity::Waiting => Self::Waiting,
            RoomStateEntity::Playing => Self::Playing,
            RoomStateEntity::Finished => Self::Finished,
        }
    }
}

impl From<RoomLifecycle> for RoomStateEntity {
    fn from(value: RoomLifecycle) -> Self {
        match value {
            RoomLifecycle::Waiting => Self::Waiting,
            RoomLifecycle::Playing => Self::Playing,
            RoomLifecycle::Finished => Self::Finished,
        }
    }
}

impl From<PlayerEntity> for Player {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            ready: value.ready,
            connected: value.connected,
            score: value.score,
            credential: value.cookie,
        }
    }
}

impl From<Player> for PlayerEntity {
    fn from(value: Player) -> Self {
        Self {
            id: value.id,
            name: value.name,
            ready: value.ready,
            connected: value.connected,
            cookie: value.credential,
            score: value.score,
        }
    }
}

impl From<SongEntity> for Song {
    fn from(value: SongEntity) -> Self {
        Self {
            id: value.id,
            title: value.title,
            artist: value.artist,
            lyrics: value.lyrics,
        }
    }
}

impl From<Song> for SongEntity {
    fn from(value: Song) -> Self {
        Self {
            id: value.id,
            title: value.title,
            artist: value.artist,
            lyrics: value.lyrics,
        }
    }
}

impl From<TurnEntity> for Turn {
    fn from(value: TurnEntity) -> Self {
        Self {
            player_id: value.player_id,
            song: value.song.map(Into::into),
            song_choices: value.song_choices.into_iter().map(Into::into).collect(),
            guessers: value.guessers,
        }
    }
}

impl From<Turn> for TurnEntity {
    fn from(value: Turn) -> Self {
        Self {
            player_id: value.player_id,
            song: value.song.map(Into::into),
            song_choices: value.song_choices.into_iter().map(Into::into).collect(),
            guessers: value.guessers,
        }
    }
}

impl From<GameSettingsEntity> for GameSettings {
    fn from(value: GameSettingsEntity) -> Self {
        Self {
            num_rounds: value.num_rounds,
            turn_duration_secs: value.turn_duration_secs,
            pick_duration_secs: value.pick_duration_secs,
        }
    }
}

impl From<GameSettings> for GameSettingsEntity {
    fn from(value: GameSettings) -> Self {
        Self {
            num_rounds: value.num_rounds,
            turn_duration_secs: value.turn_duration_secs,
            pick_duration_secs: value.pick_duration_secs,
        }
    }
}

impl GameStatus {
    /// Persisted discriminant of this status.
    pub fn kind(&self) -> GameStatusKind {
        match self {
            Self::PlayingRound => GameStatusKind::PlayingRound,
            Self::PickingSong { .. } => GameStatusKind::PickingSong,
            Self::GuessingSong { .. } => GameStatusKind::GuessingSong,
            Self::Finished { .. } => GameStatusKind::Finished,
        }
    }

    /// Detail payload attached to the status, as sent to clients.
    pub fn detail(&self) -> Option<Value> {
        match self {
            Self::PickingSong { singer } | Self::GuessingSong { singer } => {
                Some(Value::from(singer.clone()))
            }
            Self::Finished { scores } => serde_json::to_value(scores).ok(),
            Self::PlayingRound => None,
        }
    }
}

impl From<GameStatusEntity> for GameStatus {
    fn from(value: GameStatusEntity) -> Self {
        let detail = value.detail.unwrap_or(Value::Null);
        let singer = || detail.as_str().unwrap_or_default().to_string();
        match value.kind {
            GameStatusKind::PlayingRound => Self::PlayingRound,
            GameStatusKind::PickingSong => Self::PickingSong { singer: singer() },
            GameStatusKind::GuessingSong => Self::GuessingSong { singer: singer() },
            GameStatusKind::Finished => Self::Finished {
                scores: serde_json::from_value(detail.clone()).unwrap_or_default(),
            },
        }
    }
}

impl From<GameStatus> for GameStatusEntity {
    fn from(value: GameStatus) -> Self {
        Self {
            kind: value.kind(),
            detail: value.detail(),
        }
    }
}

impl From<GameEntity> for Game {
    fn from(value: GameEntity) -> Self {
        Self {
            status: value.status.into(),
            settings: value.settings.into(),
            current_round: value.current_round,
            current_turn: value.current_turn,
            rounds: value
                .rounds
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }
}

impl From<Game> for GameEntity {
    fn from(value: Game) -> Self {
        Self {
            status: value.status.into(),
            settings: value.settings.into(),
            current_round: value.current_round,
            current_turn: value.current_turn,
            rounds: value
                .rounds
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }
}

impl From<RoomEntity> for Room {
    fn from(value: RoomEntity) -> Self {
        Self {
            id: value.room_id,
            owner: value.owner,
            players: value.players.into_iter().map(Into::into).collect(),
            game: value.game.map(Into::into),
            lifecycle: value.room_state.into(),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<Room> for RoomEntity {
    fn from(value: Room) -> Self {
        Self {
            room_id: value.id,
            owner: value.owner,
            players: value.players.into_iter().map(Into::into).collect(),
            game: value.game.map(Into::into),
            room_state: value.lifecycle.into(),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(num_rounds: usize) -> GameSettings {
        GameSettings {
            num_rounds,
            turn_duration_secs: 10,
            pick_duration_secs: 3,
        }
    }

    #[test]
    fn shuffled_grid_repeats_one_order_per_round() {
        let ids = vec!["A".to_string(), "B".to_string()];
        let game = Game::shuffled(ids.clone(), settings(2));

        assert_eq!(game.num_rounds(), 2);
        assert_eq!(game.turns_per_round(), 2);

        let order = game.turn_order();
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(sorted, ids);
        for row in game.rounds() {
            let singers: Vec<_> = row.iter().map(|turn| turn.player_id.clone()).collect();
            assert_eq!(singers, order);
            assert!(row.iter().all(|turn| turn.song.is_none()
                && turn.song_choices.is_empty()
                && turn.guessers.is_empty()));
        }
    }

    #[test]
    fn turn_lookup_outside_grid_is_none() {
        let game = Game::with_turn_order(vec!["A".into()], settings(1));
        assert!(game.turn(TurnPosition { round: 0, turn: 0 }).is_some());
        assert!(game.turn(TurnPosition { round: 1, turn: 0 }).is_none());
        assert!(game.turn(TurnPosition { round: 0, turn: 1 }).is_none());
    }

    #[test]
    fn credential_survives_entity_conversion() {
        let player = Player::new("ana".into());
        let credential = player.credential().to_string();
        assert_eq!(credential.len(), CREDENTIAL_LEN);

        let entity = PlayerEntity::from(player.clone());
        assert_eq!(entity.cookie, credential);
        assert_eq!(Player::from(entity), player);
    }

    #[test]
    fn status_detail_round_trips_through_entity() {
        let status = GameStatus::PickingSong {
            singer: "p2".into(),
        };
        let entity = GameStatusEntity::from(status.clone());
        assert_eq!(entity.kind, GameStatusKind::PickingSong);
        assert_eq!(entity.detail, Some(serde_json::json!("p2")));
        assert_eq!(GameStatus::from(entity), status);
    }

    #[test]
    fn scoreboard_is_sorted_by_score() {
        let mut room = Room::new();
        let mut ana = Player::new("ana".into());
        ana.score = 1;
        let mut bob = Player::new("bob".into());
        bob.score = 4;
        room.players = vec![ana, bob];

        let names: Vec<_> = room.scoreboard().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["bob", "ana"]);
    }

    #[test]
    fn outstanding_players_lists_unready_ids() {
        let mut room = Room::new();
        let mut ana = Player::new("ana".into());
        ana.ready = true;
        let bob = Player::new("bob".into());
        let bob_id = bob.id.clone();
        room.players = vec![ana, bob];

        assert_eq!(room.outstanding_players(), vec![bob_id]);
        assert!(!room.all_ready());
    }
}
