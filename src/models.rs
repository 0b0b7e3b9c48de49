//! Core data models for the catalog.
//!
//! This module contains the flat row types stored in the three catalog
//! tables, the table identifiers, and the representation of columns that
//! carry nested JSON.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Role label forced on every writer credit.
pub const WRITER_ROLE: &str = "Writer";

/// Role label forced on every producer credit.
pub const PRODUCER_ROLE: &str = "Producer";

/// Sentinel stored in album columns when a song has no album.
pub const NO_ALBUM: &str = "None";

// ============================================================================
// Tables
// ============================================================================

/// The three persisted catalog tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Artists,
    Songs,
    ContributorCredits,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::Artists, Table::Songs, Table::ContributorCredits];

    /// SQL table name in the snapshot database.
    pub fn name(self) -> &'static str {
        match self {
            Table::Artists => "artists",
            Table::Songs => "songs",
            Table::ContributorCredits => "contributor_credits",
        }
    }

    /// File name of the semicolon-delimited export.
    pub fn export_file_name(self) -> String {
        format!("{}.csv", self.name())
    }
}

// ============================================================================
// Nested Columns
// ============================================================================

/// A column whose source value is a nested JSON structure.
///
/// Freshly normalized rows hold the structure itself; rows loaded from the
/// snapshot hold its JSON text. [`NestedField::flatten`] brings both to the
/// textual form so a merged table has one representation per column.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum NestedField {
    Structured(Value),
    Text(String),
    #[default]
    Null,
}

impl NestedField {
    pub fn from_value(value: Option<Value>) -> Self {
        match value {
            None | Some(Value::Null) => NestedField::Null,
            Some(v) => NestedField::Structured(v),
        }
    }

    /// Objects and arrays become JSON text, text stays as is, and any other
    /// scalar becomes null.
    pub fn flatten(self) -> Self {
        match self {
            NestedField::Structured(v @ (Value::Object(_) | Value::Array(_))) => {
                NestedField::Text(v.to_string())
            }
            NestedField::Structured(_) => NestedField::Null,
            other => other,
        }
    }

    /// Textual form, or `None` when the field is null or still structured.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            NestedField::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, NestedField::Structured(_))
    }
}

// ============================================================================
// Rows
// ============================================================================

/// One row of the `artists` table, keyed by `artist_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistRecord {
    pub artist_id: i64,
    pub name: String,
    pub description: String,
    pub alternate_names: Vec<String>,
    pub header_image_url: Option<String>,
    pub image_url: Option<String>,
    pub social_links: BTreeMap<String, String>,
    pub followers_count: i64,
}

/// One row of the `songs` table, keyed by `song_id`.
///
/// Append-only: rows are never updated after their first merge.
#[derive(Debug, Clone, PartialEq)]
pub struct SongRecord {
    pub song_id: i64,
    pub title: String,
    pub api_path: Option<String>,
    pub artist_names: Option<String>,
    pub artist_id: i64,
    pub full_title: String,
    pub header_image_thumbnail_url: Option<String>,
    pub header_image_url: Option<String>,
    pub primary_artist_names: Option<String>,
    pub relationships_index_url: Option<String>,
    pub release_date_components: NestedField,
    pub release_date: Option<NaiveDate>,
    pub song_art_image_thumbnail_url: Option<String>,
    pub song_art_image_url: Option<String>,
    pub stats: NestedField,
    pub hot: bool,
    pub pageviews: i64,
    pub url: Option<String>,
    pub featured_artists: NestedField,
    pub primary_artist: NestedField,
}

impl SongRecord {
    /// Flatten every nested column to its textual form.
    pub fn flatten_nested(mut self) -> Self {
        self.release_date_components = self.release_date_components.flatten();
        self.stats = self.stats.flatten();
        self.featured_artists = self.featured_artists.flatten();
        self.primary_artist = self.primary_artist.flatten();
        self
    }
}

/// Song superset built from the song-detail payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SongDetailRecord {
    pub song_id: i64,
    pub title: String,
    pub description: String,
    pub primary_artist_id: i64,
    pub primary_artist_names: String,
    pub language: Option<String>,
    pub recording_location: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub hot: bool,
    pub pageviews: i64,
    pub song_art_primary_color: Option<String>,
    pub song_art_secondary_color: Option<String>,
    pub album_id: String,
    pub album_title: String,
    pub album_cover_art_url: String,
}

/// One role attribution of one person to one song.
///
/// Equality covers every column; the contributor pass uses it to drop exact
/// duplicate rows before merging.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ContributorCredit {
    pub song_id: i64,
    pub artist_id: Option<i64>,
    pub artist_name: String,
    pub role: String,
}
