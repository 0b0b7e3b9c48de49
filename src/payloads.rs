//! Typed shapes of the remote service's JSON payloads.
//!
//! Every response is wrapped in a `{"response": {...}}` envelope. Fields the
//! normalizer defaults are `Option`s here; nested values that end up in a
//! nested column are kept as raw [`Value`]s.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub response: T,
}

// ============================================================================
// Search
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
pub struct SearchHit {
    pub result: SearchResult,
}

#[derive(Debug, Deserialize)]
pub struct SearchResult {
    pub primary_artist: ArtistRef,
}

/// Minimal artist reference used in search hits and credit lists.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtistRef {
    pub id: Option<i64>,
    pub name: Option<String>,
}

// ============================================================================
// Artist profile
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ArtistResponse {
    pub artist: RawArtistProfile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawArtistProfile {
    pub id: i64,
    pub name: String,
    /// Rich-text object; with `text_format=plain` it is `{"plain": "..."}`.
    pub description: Option<Value>,
    pub alternate_names: Option<Vec<String>>,
    pub header_image_url: Option<String>,
    pub image_url: Option<String>,
    pub social_links: Option<Value>,
    pub followers_count: Option<Value>,
}

// ============================================================================
// Song listing
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SongsPage {
    #[serde(default)]
    pub songs: Vec<RawSong>,
    pub next_page: Option<Value>,
}

impl SongsPage {
    /// The next page to request, or `None` when the cursor is absent, null,
    /// zero, or otherwise falsy.
    pub fn next_page_number(&self) -> Option<u32> {
        match self.next_page.as_ref()? {
            Value::Number(n) => n.as_u64().filter(|&p| p > 0).map(|p| p as u32),
            Value::String(s) => s.trim().parse::<u32>().ok().filter(|&p| p > 0),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSong {
    pub id: i64,
    pub title: Option<String>,
    pub api_path: Option<String>,
    pub artist_names: Option<String>,
    pub full_title: Option<String>,
    pub header_image_thumbnail_url: Option<String>,
    pub header_image_url: Option<String>,
    pub primary_artist_names: Option<String>,
    pub relationships_index_url: Option<String>,
    pub release_date_components: Option<Value>,
    pub song_art_image_thumbnail_url: Option<String>,
    pub song_art_image_url: Option<String>,
    pub stats: Option<Value>,
    pub url: Option<String>,
    pub featured_artists: Option<Value>,
    pub primary_artist: Option<Value>,
}

impl RawSong {
    pub fn primary_artist_id(&self) -> Option<i64> {
        self.primary_artist.as_ref()?.get("id")?.as_i64()
    }
}

// ============================================================================
// Song detail
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SongResponse {
    pub song: RawSongDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSongDetail {
    pub id: i64,
    pub title: Option<String>,
    pub description: Option<Value>,
    pub primary_artist_names: Option<String>,
    pub language: Option<String>,
    pub recording_location: Option<String>,
    pub release_date_components: Option<Value>,
    pub stats: Option<Value>,
    pub song_art_primary_color: Option<String>,
    pub song_art_secondary_color: Option<String>,
    pub album: Option<RawAlbum>,
    /// Credit lists stay optional: a payload without them is a failed song,
    /// while an empty list is simply "no credits".
    pub custom_performances: Option<Vec<CustomPerformance>>,
    pub writer_artists: Option<Vec<ArtistRef>>,
    pub producer_artists: Option<Vec<ArtistRef>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAlbum {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub cover_art_url: Option<String>,
}

/// A labelled group of credited artists, e.g. "Mixing Engineer".
#[derive(Debug, Clone, Deserialize)]
pub struct CustomPerformance {
    pub label: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(next: Value) -> SongsPage {
        serde_json::from_value(json!({"songs": [], "next_page": next})).unwrap()
    }

    #[test]
    fn test_next_page_cursor() {
        assert_eq!(page(json!(2)).next_page_number(), Some(2));
        assert_eq!(page(json!("3")).next_page_number(), Some(3));
        assert_eq!(page(json!(0)).next_page_number(), None);
        assert_eq!(page(json!(null)).next_page_number(), None);
        assert_eq!(page(json!("")).next_page_number(), None);
        assert_eq!(page(json!(false)).next_page_number(), None);
    }

    #[test]
    fn test_missing_next_page_terminates() {
        let page: SongsPage = serde_json::from_value(json!({"songs": []})).unwrap();
        assert_eq!(page.next_page_number(), None);
    }

    #[test]
    fn test_song_detail_without_credit_lists() {
        let detail: RawSongDetail = serde_json::from_value(json!({"id": 7})).unwrap();
        assert!(detail.custom_performances.is_none());
        assert!(detail.album.is_none());
    }

    #[test]
    fn test_primary_artist_id() {
        let song: RawSong = serde_json::from_value(json!({
            "id": 1,
            "primary_artist": {"id": 42, "name": "Someone"}
        }))
        .unwrap();
        assert_eq!(song.primary_artist_id(), Some(42));
    }
}
