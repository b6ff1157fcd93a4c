//! Application-level configuration loading: game tuning, lyrics endpoint and song catalog.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::game::{GameSettings, Song};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "KARAVAN_BACK_CONFIG_PATH";
/// Public lyrics API queried as `{url}/{artist}/{title}`.
const DEFAULT_LYRICS_API_URL: &str = "https://api.lyrics.ovh/v1";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    game: GameConfig,
    lyrics_api_url: Option<String>,
    songs: Vec<Song>,
}

/// Tuning knobs for rooms and the phase loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    /// Rounds played per game.
    pub num_rounds: usize,
    /// Seconds allowed to guess the song of a turn.
    pub turn_duration_secs: u32,
    /// Seconds allowed to the singer to pick a song.
    pub pick_duration_secs: u32,
    /// Number of songs offered to the singer.
    pub song_choices: usize,
    /// Maximum number of players per room.
    pub max_players: usize,
    /// Wall-clock length of one countdown tick.
    pub tick_interval: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            num_rounds: 3,
            turn_duration_secs: 60,
            pick_duration_secs: 15,
            song_choices: 3,
            max_players: 5,
            tick_interval: Duration::from_secs(1),
        }
    }
}

impl GameConfig {
    /// Settings frozen into a game when it starts.
    pub fn settings(&self) -> GameSettings {
        GameSettings {
            num_rounds: self.num_rounds,
            turn_duration_secs: self.turn_duration_secs,
            pick_duration_secs: self.pick_duration_secs,
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        songs = app_config.songs.len(),
                        rounds = app_config.game.num_rounds,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Build a configuration from explicit parts.
    pub fn new(game: GameConfig, lyrics_api_url: Option<String>, songs: Vec<Song>) -> Self {
        Self {
            game,
            lyrics_api_url,
            songs,
        }
    }

    /// Game tuning.
    pub fn game(&self) -> &GameConfig {
        &self.game
    }

    /// Base URL of the lyrics API, `None` when lyrics retrieval is disabled.
    pub fn lyrics_api_url(&self) -> Option<&str> {
        self.lyrics_api_url.as_deref()
    }

    /// Songs the singers can pick from.
    pub fn songs(&self) -> &[Song] {
        &self.songs
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            game: GameConfig::default(),
            lyrics_api_url: Some(DEFAULT_LYRICS_API_URL.to_string()),
            songs: default_songs(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    game: RawGameConfig,
    lyrics_api_url: Option<String>,
    songs: Option<Vec<RawSong>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawGameConfig {
    num_rounds: Option<usize>,
    turn_duration_secs: Option<u32>,
    pick_duration_secs: Option<u32>,
    song_choices: Option<usize>,
    max_players: Option<usize>,
    tick_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
/// JSON representation of a single catalog entry inside the configuration file.
struct RawSong {
    id: u32,
    title: String,
    artist: String,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = GameConfig::default();
        let raw = value.game;
        let game = GameConfig {
            num_rounds: raw.num_rounds.unwrap_or(defaults.num_rounds).max(1),
            turn_duration_secs: raw.turn_duration_secs.unwrap_or(defaults.turn_duration_secs),
            pick_duration_secs: raw.pick_duration_secs.unwrap_or(defaults.pick_duration_secs),
            song_choices: raw.song_choices.unwrap_or(defaults.song_choices).max(1),
            max_players: raw.max_players.unwrap_or(defaults.max_players).max(1),
            tick_interval: raw
                .tick_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.tick_interval),
        };

        // An explicit empty string switches lyrics retrieval off.
        let lyrics_api_url = match value.lyrics_api_url {
            Some(url) if url.trim().is_empty() => None,
            Some(url) => Some(url),
            None => Some(DEFAULT_LYRICS_API_URL.to_string()),
        };

        let songs = match value.songs {
            Some(songs) if !songs.is_empty() => songs.into_iter().map(Into::into).collect(),
            _ => default_songs(),
        };

        Self {
            game,
            lyrics_api_url,
            songs,
        }
    }
}

impl From<RawSong> for Song {
    fn from(value: RawSong) -> Self {
        Song::new(value.id, value.title, value.artist)
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in catalog shipped with the binary.
fn default_songs() -> Vec<Song> {
    [
        (1, "Bohemian Rhapsody", "Queen"),
        (2, "Imagine", "John Lennon"),
        (3, "Hey Jude", "The Beatles"),
        (4, "Like a Rolling Stone", "Bob Dylan"),
        (5, "Billie Jean", "Michael Jackson"),
        (6, "Smells Like Teen Spirit", "Nirvana"),
        (7, "Respect", "Aretha Franklin"),
        (8, "Dancing Queen", "ABBA"),
        (9, "Wonderwall", "Oasis"),
        (10, "Rolling in the Deep", "Adele"),
        (11, "Africa", "Toto"),
        (12, "La Vie en rose", "Edith Piaf"),
    ]
    .into_iter()
    .map(|(id, title, artist)| Song::new(id, title.to_string(), artist.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let raw: RawConfig =
            serde_json::from_str(r#"{ "game": { "num_rounds": 2, "tick_interval_ms": 10 } }"#)
                .unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.game().num_rounds, 2);
        assert_eq!(config.game().tick_interval, Duration::from_millis(10));
        assert_eq!(config.game().turn_duration_secs, 60);
        assert_eq!(config.lyrics_api_url(), Some(DEFAULT_LYRICS_API_URL));
        assert_eq!(config.songs().len(), default_songs().len());
    }

    #[test]
    fn empty_lyrics_url_disables_lyrics() {
        let raw: RawConfig = serde_json::from_str(r#"{ "lyrics_api_url": "  " }"#).unwrap();
        assert_eq!(AppConfig::from(raw).lyrics_api_url(), None);
    }

    #[test]
    fn custom_catalog_replaces_built_in_songs() {
        let raw: RawConfig = serde_json::from_str(
            r#"{ "songs": [ { "id": 7, "title": "Song", "artist": "Band" } ] }"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.songs().len(), 1);
        assert_eq!(config.songs()[0].title, "Song");
    }

    #[test]
    fn zero_rounds_is_clamped() {
        let raw: RawConfig = serde_json::from_str(r#"{ "game": { "num_rounds": 0 } }"#).unwrap();
        assert_eq!(AppConfig::from(raw).game().num_rounds, 1);
    }
}
