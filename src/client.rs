//! Client for the remote lyrics-metadata service.
//!
//! All calls are blocking and bearer-token authenticated. Transient failures
//! (5xx, timeouts, connection errors) are retried according to a
//! [`RetryPolicy`]; client errors surface immediately.

use reqwest::blocking::Client;
use rustc_hash::FxHashSet;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{CatalogError, Result};
use crate::normalize::name_key;
use crate::payloads::{
    ArtistResponse, Envelope, RawArtistProfile, RawSong, RawSongDetail, SearchHit,
    SearchResponse, SongResponse, SongsPage,
};
use crate::retry::RetryPolicy;

pub const DEFAULT_API_BASE: &str = "https://api.genius.com";

/// Largest page size the service accepts for song listings.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Operations the ingestion flow needs from the remote service.
///
/// [`RemoteCatalogClient`] is the production implementation; tests drive the
/// ingestion flow through in-memory implementations.
pub trait CatalogApi {
    /// Resolve a free-form artist name to an artist id.
    fn resolve_artist_id(&self, name_query: &str) -> Result<i64>;

    fn fetch_artist_profile(&self, artist_id: i64) -> Result<RawArtistProfile>;

    /// Every song whose primary artist is `artist_id`, across all pages.
    fn fetch_artist_songs(&self, artist_id: i64, page_size: u32) -> Result<Vec<RawSong>>;

    fn fetch_song_detail(&self, song_id: i64) -> Result<RawSongDetail>;
}

pub struct RemoteCatalogClient {
    client: Client,
    base_url: String,
    token: String,
    retry: RetryPolicy,
}

impl RemoteCatalogClient {
    pub fn new(
        base_url: &str,
        token: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            retry,
        })
    }

    /// GET `path` and decode the `response` member of the envelope,
    /// retrying transient failures.
    fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        with_retries(&self.retry, path, || self.get_once(path, query))
    }

    fn get_once<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("text_format", "plain")])
            .query(query)
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(CatalogError::remote(status.as_u16(), &body));
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)?;
        Ok(envelope.response)
    }

    fn fetch_songs_page(&self, artist_id: i64, page_size: u32, page: u32) -> Result<SongsPage> {
        self.get_json(
            &format!("/artists/{}/songs", artist_id),
            &[
                ("per_page", page_size.to_string()),
                ("page", page.to_string()),
                ("sort", "popularity".to_string()),
                ("include_features", "false".to_string()),
            ],
        )
    }
}

impl CatalogApi for RemoteCatalogClient {
    fn resolve_artist_id(&self, name_query: &str) -> Result<i64> {
        let search: SearchResponse =
            self.get_json("/search", &[("q", name_query.to_string())])?;
        pick_artist_id(name_query, &search.hits)
    }

    fn fetch_artist_profile(&self, artist_id: i64) -> Result<RawArtistProfile> {
        let response: ArtistResponse =
            self.get_json(&format!("/artists/{}", artist_id), &[])?;
        Ok(response.artist)
    }

    fn fetch_artist_songs(&self, artist_id: i64, page_size: u32) -> Result<Vec<RawSong>> {
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        collect_artist_songs(artist_id, |page| {
            self.fetch_songs_page(artist_id, page_size, page)
        })
    }

    fn fetch_song_detail(&self, song_id: i64) -> Result<RawSongDetail> {
        let response: SongResponse = self.get_json(&format!("/songs/{}", song_id), &[])?;
        Ok(response.song)
    }
}

/// Call `attempt` until it succeeds or fails with an error `policy` won't
/// retry, sleeping the policy's backoff in between.
pub fn with_retries<T, F>(policy: &RetryPolicy, label: &str, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut retry_count = 0;
    loop {
        match attempt() {
            Ok(value) => return Ok(value),
            Err(e) if policy.should_retry(&e, retry_count) => {
                let backoff = policy.backoff(retry_count);
                warn!(
                    "GET {} failed ({}), retrying in {:?} ({}/{})",
                    label,
                    e,
                    backoff,
                    retry_count + 1,
                    policy.max_retries
                );
                std::thread::sleep(backoff);
                retry_count += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Pick the artist id for `name_query` among search hits.
///
/// Prefers the first hit whose primary-artist name matches the query
/// case- and whitespace-insensitively; otherwise falls back to the top hit.
pub fn pick_artist_id(name_query: &str, hits: &[SearchHit]) -> Result<i64> {
    let wanted = name_key(name_query);

    let exact = hits.iter().find_map(|hit| {
        let artist = &hit.result.primary_artist;
        match (&artist.name, artist.id) {
            (Some(name), Some(id)) if name_key(name) == wanted => Some(id),
            _ => None,
        }
    });
    if let Some(id) = exact {
        return Ok(id);
    }

    // Fall back to the first hit that carries an id
    hits.iter()
        .find_map(|hit| hit.result.primary_artist.id)
        .ok_or_else(|| CatalogError::NotFound {
            query: name_query.to_string(),
        })
}

/// Follow the `next_page` cursor from page 1 until it is falsy.
///
/// Keeps only songs whose primary artist is `artist_id` (search-backed
/// listings can include loosely matched songs) and drops repeated
/// `song_id`s, first occurrence winning. A cursor pointing back at an
/// already fetched page also ends the walk.
pub fn collect_artist_songs<F>(artist_id: i64, mut fetch_page: F) -> Result<Vec<RawSong>>
where
    F: FnMut(u32) -> Result<SongsPage>,
{
    let mut songs = Vec::new();
    let mut seen_songs = FxHashSet::default();
    let mut seen_pages = FxHashSet::default();
    let mut next = Some(1u32);

    while let Some(page_number) = next {
        if !seen_pages.insert(page_number) {
            warn!(
                "Pagination for artist {} revisited page {}, stopping",
                artist_id, page_number
            );
            break;
        }

        let page = fetch_page(page_number)?;
        next = page.next_page_number();

        let before = songs.len();
        let fetched = page.songs.len();
        songs.extend(page.songs.into_iter().filter(|song| {
            song.primary_artist_id() == Some(artist_id) && seen_songs.insert(song.id)
        }));
        debug!(
            "Artist {} page {}: kept {}/{} songs",
            artist_id,
            page_number,
            songs.len() - before,
            fetched
        );
    }

    Ok(songs)
}
