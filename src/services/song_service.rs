use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::state::game::Song;

/// In-memory catalog the singers pick from.
#[derive(Debug, Clone)]
pub struct SongCatalog {
    songs: Vec<Song>,
}

impl SongCatalog {
    /// Wrap the configured songs.
    pub fn new(songs: Vec<Song>) -> Self {
        Self { songs }
    }

    /// Up to `count` distinct songs in random order.
    pub fn choices(&self, count: usize) -> Vec<Song> {
        use rand::seq::IndexedRandom;

        self.songs
            .choose_multiple(&mut rand::rng(), count)
            .cloned()
            .collect()
    }

    /// One random song, `None` for an empty catalog.
    pub fn random(&self) -> Option<Song> {
        use rand::seq::IndexedRandom;

        self.songs.choose(&mut rand::rng()).cloned()
    }

    /// Number of songs in the catalog.
    pub fn len(&self) -> usize {
        self.songs.len()
    }

    /// Whether the catalog holds no song.
    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }
}

/// Errors raised while fetching lyrics.
#[derive(Debug, Error)]
pub enum LyricsError {
    /// The configured base URL cannot be extended with path segments.
    #[error("lyrics base url `{0}` cannot hold path segments")]
    InvalidBaseUrl(String),
    /// Transport or decoding failure.
    #[error("lyrics request failed")]
    Request(#[from] reqwest::Error),
    /// Unexpected HTTP status.
    #[error("lyrics API answered with status {0}")]
    Status(StatusCode),
}

#[derive(Debug, Deserialize)]
struct LyricsBody {
    lyrics: Option<String>,
}

/// Thin client of a `{base}/{artist}/{title}` lyrics API.
#[derive(Debug, Clone)]
pub struct LyricsClient {
    http: Client,
    base_url: Url,
}

impl LyricsClient {
    /// Build a client for `base_url`. Returns `None` for an unparsable URL.
    pub fn new(base_url: &str) -> Option<Self> {
        match Url::parse(base_url.trim_end_matches('/')) {
            Ok(base_url) => Some(Self {
                http: Client::new(),
                base_url,
            }),
            Err(err) => {
                warn!(url = base_url, error = %err, "invalid lyrics API url; lyrics disabled");
                None
            }
        }
    }

    /// Fetch the lyrics of a song. `Ok(None)` when the API does not know the song.
    pub async fn fetch(&self, artist: &str, title: &str) -> Result<Option<String>, LyricsError> {
        let url = self.song_url(artist, title)?;
        debug!(%url, "fetching lyrics");

        let response = self.http.get(url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = response.json::<LyricsBody>().await?;
                Ok(body.lyrics.filter(|lyrics| !lyrics.trim().is_empty()))
            }
            other => Err(LyricsError::Status(other)),
        }
    }

    fn song_url(&self, artist: &str, title: &str) -> Result<Url, LyricsError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| LyricsError::InvalidBaseUrl(self.base_url.to_string()))?
            .push(artist)
            .push(title);
        Ok(url)
    }
}
