//! Normalization of remote payloads into flat catalog rows.
//!
//! All defaulting lives here: missing album data becomes the `"None"`
//! sentinel, missing or negative counts become 0, and a release date is only
//! produced when year, month and day are all present and form a valid date.
//! Nothing in this module returns an error for a partial payload except
//! [`normalize_contributors`], which treats absent credit lists as a failed
//! song.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{CatalogError, Result};
use crate::models::{
    ArtistRecord, ContributorCredit, NestedField, SongDetailRecord, SongRecord, NO_ALBUM,
    PRODUCER_ROLE, WRITER_ROLE,
};
use crate::payloads::{ArtistRef, RawArtistProfile, RawSong, RawSongDetail};

/// Regex to collapse runs of whitespace into a single space
pub static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

// ============================================================================
// FIELD HELPERS
// ============================================================================

/// Comparison key for artist names: case-insensitive, whitespace-insensitive.
/// e.g., "  The   Weeknd " → "the weeknd"
pub fn name_key(name: &str) -> String {
    MULTI_SPACE.replace_all(name.trim(), " ").to_lowercase()
}

/// Extract plain text from a rich-text field.
/// Accepts `{"plain": "..."}` or a bare string; anything else is empty.
pub fn plain_text(field: Option<&Value>) -> String {
    match field {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(map)) => map
            .get("plain")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

/// Coerce a count-like value to a nonnegative integer (0 when absent or unparseable).
pub fn coerce_count(value: Option<&Value>) -> i64 {
    let raw = match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    raw.unwrap_or(0).max(0)
}

/// Read a date component; fractional or non-numeric values are treated as missing.
fn date_component(components: &Value, key: &str) -> Option<i64> {
    match components.get(key)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Compose a calendar date from `{year, month, day}` sub-fields.
/// Any missing or out-of-range component yields `None`.
pub fn compose_release_date(components: Option<&Value>) -> Option<NaiveDate> {
    let components = components?;
    let year = date_component(components, "year")?;
    let month = date_component(components, "month")?;
    let day = date_component(components, "day")?;
    NaiveDate::from_ymd_opt(
        i32::try_from(year).ok()?,
        u32::try_from(month).ok()?,
        u32::try_from(day).ok()?,
    )
}

/// Read `(hot, pageviews)` from a stats object. `pageviews` defaults to 0.
pub fn read_stats(stats: Option<&Value>) -> (bool, i64) {
    let hot = stats
        .and_then(|s| s.get("hot"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let pageviews = coerce_count(stats.and_then(|s| s.get("pageviews")));
    (hot, pageviews)
}

fn social_links(field: Option<&Value>) -> BTreeMap<String, String> {
    let Some(Value::Object(map)) = field else {
        return BTreeMap::new();
    };
    map.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let text = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), text)
        })
        .collect()
}

// ============================================================================
// ARTISTS
// ============================================================================

/// Normalize an artist profile into one row.
pub fn normalize_artist(raw: &RawArtistProfile) -> ArtistRecord {
    let mut seen = FxHashSet::default();
    let alternate_names = raw
        .alternate_names
        .iter()
        .flatten()
        .filter(|n| seen.insert(n.as_str()))
        .cloned()
        .collect();

    ArtistRecord {
        artist_id: raw.id,
        name: raw.name.clone(),
        description: plain_text(raw.description.as_ref()),
        alternate_names,
        header_image_url: raw.header_image_url.clone(),
        image_url: raw.image_url.clone(),
        social_links: social_links(raw.social_links.as_ref()),
        followers_count: coerce_count(raw.followers_count.as_ref()),
    }
}

/// Drop rows whose `artist_id` already appeared earlier in the batch.
pub fn dedup_artists(rows: Vec<ArtistRecord>) -> Vec<ArtistRecord> {
    let mut seen = FxHashSet::default();
    rows.into_iter().filter(|r| seen.insert(r.artist_id)).collect()
}

// ============================================================================
// SONGS
// ============================================================================

/// Normalize a song listing for `artist_id`.
/// An empty listing is valid and yields no rows.
pub fn normalize_song_list(raw_songs: Vec<RawSong>, artist_id: i64) -> Vec<SongRecord> {
    raw_songs
        .into_iter()
        .map(|song| normalize_song(song, artist_id))
        .collect()
}

fn normalize_song(song: RawSong, artist_id: i64) -> SongRecord {
    let release_date = compose_release_date(song.release_date_components.as_ref());
    let (hot, pageviews) = read_stats(song.stats.as_ref());
    let title = song.title.unwrap_or_default();
    let full_title = song.full_title.unwrap_or_else(|| title.clone());

    SongRecord {
        song_id: song.id,
        title,
        api_path: song.api_path,
        artist_names: song.artist_names,
        artist_id,
        full_title,
        header_image_thumbnail_url: song.header_image_thumbnail_url,
        header_image_url: song.header_image_url,
        primary_artist_names: song.primary_artist_names,
        relationships_index_url: song.relationships_index_url,
        release_date_components: NestedField::from_value(song.release_date_components),
        release_date,
        song_art_image_thumbnail_url: song.song_art_image_thumbnail_url,
        song_art_image_url: song.song_art_image_url,
        stats: NestedField::from_value(song.stats),
        hot,
        pageviews,
        url: song.url,
        featured_artists: NestedField::from_value(song.featured_artists),
        primary_artist: NestedField::from_value(song.primary_artist),
    }
}

/// Normalize a song-detail payload.
///
/// `resolve_artist_id` maps the primary artist names back to an id. With the
/// remote client this is a second search round-trip per song; callers that
/// already know the id can pass a closure returning it.
pub fn normalize_song_detail<F>(
    raw: &RawSongDetail,
    resolve_artist_id: F,
) -> Result<SongDetailRecord>
where
    F: FnOnce(&str) -> Result<i64>,
{
    let primary_artist_names = raw.primary_artist_names.clone().ok_or_else(|| {
        CatalogError::Decode(format!("song {} has no primary_artist_names", raw.id))
    })?;
    let primary_artist_id = resolve_artist_id(&primary_artist_names)?;
    let (hot, pageviews) = read_stats(raw.stats.as_ref());

    let (album_id, album_title, album_cover_art_url) = match &raw.album {
        Some(album) => (
            album
                .id
                .map(|id| id.to_string())
                .unwrap_or_else(|| NO_ALBUM.to_string()),
            album.name.clone().unwrap_or_else(|| NO_ALBUM.to_string()),
            album
                .cover_art_url
                .clone()
                .unwrap_or_else(|| NO_ALBUM.to_string()),
        ),
        None => (
            NO_ALBUM.to_string(),
            NO_ALBUM.to_string(),
            NO_ALBUM.to_string(),
        ),
    };

    Ok(SongDetailRecord {
        song_id: raw.id,
        title: raw.title.clone().unwrap_or_default(),
        description: plain_text(raw.description.as_ref()),
        primary_artist_id,
        primary_artist_names,
        language: raw.language.clone(),
        recording_location: raw.recording_location.clone(),
        release_date: compose_release_date(raw.release_date_components.as_ref()),
        hot,
        pageviews,
        song_art_primary_color: raw.song_art_primary_color.clone(),
        song_art_secondary_color: raw.song_art_secondary_color.clone(),
        album_id,
        album_title,
        album_cover_art_url,
    })
}

// ============================================================================
// CONTRIBUTORS
// ============================================================================

fn credit(song_id: i64, artist: &ArtistRef, role: &str) -> ContributorCredit {
    ContributorCredit {
        song_id,
        artist_id: artist.id,
        artist_name: artist.name.clone().unwrap_or_default(),
        role: role.to_string(),
    }
}

/// Build the credit rows of one song.
///
/// Rows are, in order: one per (label, artist) pair across the custom
/// performances, one "Writer" row per writer, one "Producer" row per
/// producer. Every row is stamped with `song_id`. A payload missing any of
/// the three lists is an error; empty lists are fine.
pub fn normalize_contributors(raw: &RawSongDetail, song_id: i64) -> Result<Vec<ContributorCredit>> {
    let missing = |field: &str| CatalogError::Decode(format!("song {} has no {}", raw.id, field));
    let performances = raw
        .custom_performances
        .as_ref()
        .ok_or_else(|| missing("custom_performances"))?;
    let writers = raw
        .writer_artists
        .as_ref()
        .ok_or_else(|| missing("writer_artists"))?;
    let producers = raw
        .producer_artists
        .as_ref()
        .ok_or_else(|| missing("producer_artists"))?;

    let performance_rows = performances.iter().flat_map(|perf| {
        perf.artists
            .iter()
            .map(move |artist| credit(song_id, artist, &perf.label))
    });
    let writer_rows = writers.iter().map(|a| credit(song_id, a, WRITER_ROLE));
    let producer_rows = producers.iter().map(|a| credit(song_id, a, PRODUCER_ROLE));

    Ok(performance_rows.chain(writer_rows).chain(producer_rows).collect())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_song(value: Value) -> RawSong {
        serde_json::from_value(value).unwrap()
    }

    fn raw_detail(value: Value) -> RawSongDetail {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_name_key() {
        assert_eq!(name_key("  The   Weeknd "), "the weeknd");
        assert_eq!(name_key("KENDRICK LAMAR"), name_key("kendrick lamar"));
    }

    #[test]
    fn test_compose_release_date() {
        assert_eq!(
            compose_release_date(Some(&json!({"year": 2020, "month": 6, "day": 15}))),
            NaiveDate::from_ymd_opt(2020, 6, 15)
        );
        assert_eq!(
            compose_release_date(Some(&json!({"year": 2020, "month": null, "day": 5}))),
            None
        );
        assert_eq!(compose_release_date(Some(&json!({"year": 2020}))), None);
        assert_eq!(
            compose_release_date(Some(&json!({"year": 2020, "month": 13, "day": 1}))),
            None
        );
        assert_eq!(
            compose_release_date(Some(&json!({"year": 2021, "month": 2, "day": 29}))),
            None
        );
        assert_eq!(compose_release_date(None), None);
    }

    #[test]
    fn test_read_stats_defaults_pageviews() {
        assert_eq!(read_stats(Some(&json!({"hot": true, "pageviews": 100}))), (true, 100));
        assert_eq!(read_stats(Some(&json!({"hot": false}))), (false, 0));
        assert_eq!(read_stats(None), (false, 0));
        assert_eq!(read_stats(Some(&json!({"pageviews": -5}))), (false, 0));
    }

    #[test]
    fn test_coerce_count() {
        assert_eq!(coerce_count(Some(&json!(12))), 12);
        assert_eq!(coerce_count(Some(&json!(12.7))), 12);
        assert_eq!(coerce_count(Some(&json!("34"))), 34);
        assert_eq!(coerce_count(Some(&json!(-3))), 0);
        assert_eq!(coerce_count(Some(&json!(null))), 0);
        assert_eq!(coerce_count(None), 0);
    }

    #[test]
    fn test_normalize_artist() {
        let raw: RawArtistProfile = serde_json::from_value(json!({
            "id": 1,
            "name": "Artist",
            "description": {"plain": "Bio text"},
            "alternate_names": ["A", "A", "Art"],
            "social_links": {"twitter": "artist", "facebook": null},
            "followers_count": -10
        }))
        .unwrap();

        let record = normalize_artist(&raw);
        assert_eq!(record.artist_id, 1);
        assert_eq!(record.description, "Bio text");
        assert_eq!(record.alternate_names, vec!["A", "Art"]);
        assert_eq!(record.social_links.len(), 1);
        assert_eq!(record.followers_count, 0);
    }

    #[test]
    fn test_dedup_artists() {
        let raw: RawArtistProfile =
            serde_json::from_value(json!({"id": 5, "name": "X"})).unwrap();
        let rows = vec![normalize_artist(&raw), normalize_artist(&raw)];
        assert_eq!(dedup_artists(rows).len(), 1);
    }

    #[test]
    fn test_normalize_song_list() {
        let songs = vec![
            raw_song(json!({
                "id": 11,
                "title": "First",
                "full_title": "First by Artist",
                "release_date_components": {"year": 2020, "month": 6, "day": 15},
                "stats": {"hot": true, "pageviews": 100}
            })),
            raw_song(json!({
                "id": 12,
                "title": "Second",
                "release_date_components": {"year": 2020, "month": null, "day": 5},
                "stats": {"hot": false}
            })),
        ];

        let rows = normalize_song_list(songs, 1);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.artist_id == 1));
        assert_eq!(rows[0].release_date, NaiveDate::from_ymd_opt(2020, 6, 15));
        assert_eq!(rows[1].release_date, None);
        assert_eq!(
            rows.iter().map(|r| r.pageviews).collect::<Vec<_>>(),
            vec![100, 0]
        );
        assert_eq!(rows[1].full_title, "Second");
        assert!(rows[0].stats.is_structured());
    }

    #[test]
    fn test_normalize_empty_song_list() {
        assert!(normalize_song_list(Vec::new(), 1).is_empty());
    }

    #[test]
    fn test_normalize_contributors_counts() {
        let detail = raw_detail(json!({
            "id": 99,
            "custom_performances": [
                {
                    "label": "Mixing Engineer",
                    "artists": [{"id": 1, "name": "A"}, {"id": 2, "name": "B"}]
                },
                {"label": "Featuring", "artists": [{"id": 3, "name": "C"}]},
                {"label": "Empty", "artists": []}
            ],
            "writer_artists": [{"id": 4, "name": "D"}, {"id": 5, "name": "E"}],
            "producer_artists": [{"id": 6, "name": "F"}]
        }));

        let rows = normalize_contributors(&detail, 99).unwrap();
        // K = 3 performance artists, W = 2, P = 1
        assert_eq!(rows.len(), 6);
        assert!(rows.iter().all(|r| r.song_id == 99));
        assert_eq!(rows[0].role, "Mixing Engineer");
        assert_eq!(rows[3].role, WRITER_ROLE);
        assert_eq!(rows[4].role, WRITER_ROLE);
        assert_eq!(rows[5].role, PRODUCER_ROLE);
        assert_eq!(rows[5].artist_id, Some(6));
    }

    #[test]
    fn test_normalize_contributors_empty_lists() {
        let detail = raw_detail(json!({
            "id": 1,
            "custom_performances": [],
            "writer_artists": [],
            "producer_artists": []
        }));
        assert!(normalize_contributors(&detail, 1).unwrap().is_empty());
    }

    #[test]
    fn test_normalize_contributors_missing_field_fails() {
        let detail = raw_detail(json!({"id": 1, "custom_performances": []}));
        assert!(matches!(
            normalize_contributors(&detail, 1),
            Err(CatalogError::Decode(_))
        ));
    }

    #[test]
    fn test_normalize_song_detail_without_album() {
        let detail = raw_detail(json!({
            "id": 5,
            "title": "Song",
            "description": {"plain": "About"},
            "primary_artist_names": "Artist",
            "stats": {"hot": false},
            "album": null
        }));

        let record = normalize_song_detail(&detail, |name| {
            assert_eq!(name, "Artist");
            Ok(77)
        })
        .unwrap();

        assert_eq!(record.primary_artist_id, 77);
        assert_eq!(record.pageviews, 0);
        assert_eq!(record.description, "About");
        assert_eq!(record.album_id, NO_ALBUM);
        assert_eq!(record.album_title, NO_ALBUM);
        assert_eq!(record.album_cover_art_url, NO_ALBUM);
    }

    #[test]
    fn test_normalize_song_detail_with_album() {
        let detail = raw_detail(json!({
            "id": 5,
            "primary_artist_names": "Artist",
            "album": {"id": 300, "name": "Record", "cover_art_url": "http://img"}
        }));

        let record = normalize_song_detail(&detail, |_| Ok(1)).unwrap();
        assert_eq!(record.album_id, "300");
        assert_eq!(record.album_title, "Record");
        assert_eq!(record.album_cover_art_url, "http://img");
    }

    #[test]
    fn test_normalize_song_detail_propagates_lookup_failure() {
        let detail = raw_detail(json!({"id": 5, "primary_artist_names": "Ghost"}));
        let result = normalize_song_detail(&detail, |q| {
            Err(CatalogError::NotFound {
                query: q.to_string(),
            })
        });
        assert!(matches!(result, Err(CatalogError::NotFound { .. })));
    }
}
