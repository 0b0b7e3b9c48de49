//! Snapshot schema and row mapping for the three catalog tables.

use chrono::NaiveDate;
use rusqlite::types::{Type, Value};
use rusqlite::Row;
use std::collections::BTreeMap;

use crate::models::{ArtistRecord, ContributorCredit, NestedField, SongRecord, Table};

pub const SNAPSHOT_FILE_NAME: &str = "catalog.sqlite3";

pub const CREATE_TABLES: &str = "
    CREATE TABLE IF NOT EXISTS artists (
        artist_id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL,
        alternate_names TEXT NOT NULL,
        header_image_url TEXT,
        image_url TEXT,
        social_links TEXT NOT NULL,
        followers_count INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS songs (
        song_id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        api_path TEXT,
        artist_names TEXT,
        artist_id INTEGER NOT NULL,
        full_title TEXT NOT NULL,
        header_image_thumbnail_url TEXT,
        header_image_url TEXT,
        primary_artist_names TEXT,
        relationships_index_url TEXT,
        release_date_components TEXT,
        release_date TEXT,
        song_art_image_thumbnail_url TEXT,
        song_art_image_url TEXT,
        stats TEXT,
        hot INTEGER NOT NULL DEFAULT 0,
        pageviews INTEGER NOT NULL DEFAULT 0,
        url TEXT,
        featured_artists TEXT,
        primary_artist TEXT
    );

    CREATE TABLE IF NOT EXISTS contributor_credits (
        song_id INTEGER NOT NULL,
        artist_id INTEGER,
        artist_name TEXT NOT NULL,
        role TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_songs_artist ON songs(artist_id);
    CREATE INDEX IF NOT EXISTS idx_credits_song ON contributor_credits(song_id);
";

/// A row type stored in one snapshot table and one delimited export.
///
/// `COLUMNS` fixes the column order for SQL, for
/// [`TableRow::to_sql_values`] and for [`TableRow::export_fields`].
pub trait TableRow: Sized {
    const TABLE: Table;
    const COLUMNS: &'static [&'static str];

    fn from_sql_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    fn to_sql_values(&self) -> Vec<Value>;

    fn export_fields(&self) -> Vec<String>;
}

pub fn select_sql<R: TableRow>() -> String {
    format!(
        "SELECT {} FROM {} ORDER BY rowid",
        R::COLUMNS.join(", "),
        R::TABLE.name()
    )
}

pub fn insert_sql<R: TableRow>() -> String {
    let placeholders: Vec<String> = (1..=R::COLUMNS.len()).map(|i| format!("?{}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        R::TABLE.name(),
        R::COLUMNS.join(", "),
        placeholders.join(", ")
    )
}

// ============================================================================
// Conversion helpers
// ============================================================================

fn text(value: &Option<String>) -> Value {
    value.clone().map(Value::Text).unwrap_or(Value::Null)
}

fn nested(field: &NestedField) -> Value {
    match field {
        NestedField::Text(s) => Value::Text(s.clone()),
        NestedField::Structured(v) => Value::Text(v.to_string()),
        NestedField::Null => Value::Null,
    }
}

fn nested_from(value: Option<String>) -> NestedField {
    value.map(NestedField::Text).unwrap_or_default()
}

fn export_nested(field: &NestedField) -> String {
    match nested(field) {
        Value::Text(s) => s,
        _ => String::new(),
    }
}

fn date_text(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn parse_date(idx: usize, value: Option<String>) -> rusqlite::Result<Option<NaiveDate>> {
    value
        .map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn parse_json<T: serde::de::DeserializeOwned>(idx: usize, value: String) -> rusqlite::Result<T> {
    serde_json::from_str(&value).map_err(|e| conversion_error(idx, e))
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

// ============================================================================
// Row impls
// ============================================================================

impl TableRow for ArtistRecord {
    const TABLE: Table = Table::Artists;
    const COLUMNS: &'static [&'static str] = &[
        "artist_id",
        "name",
        "description",
        "alternate_names",
        "header_image_url",
        "image_url",
        "social_links",
        "followers_count",
    ];

    fn from_sql_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let alternate_names: Vec<String> = parse_json(3, row.get(3)?)?;
        let social_links: BTreeMap<String, String> = parse_json(6, row.get(6)?)?;
        Ok(ArtistRecord {
            artist_id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            alternate_names,
            header_image_url: row.get(4)?,
            image_url: row.get(5)?,
            social_links,
            followers_count: row.get(7)?,
        })
    }

    fn to_sql_values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.artist_id),
            Value::Text(self.name.clone()),
            Value::Text(self.description.clone()),
            Value::Text(to_json(&self.alternate_names)),
            text(&self.header_image_url),
            text(&self.image_url),
            Value::Text(to_json(&self.social_links)),
            Value::Integer(self.followers_count),
        ]
    }

    fn export_fields(&self) -> Vec<String> {
        vec![
            self.artist_id.to_string(),
            self.name.clone(),
            self.description.clone(),
            to_json(&self.alternate_names),
            self.header_image_url.clone().unwrap_or_default(),
            self.image_url.clone().unwrap_or_default(),
            to_json(&self.social_links),
            self.followers_count.to_string(),
        ]
    }
}

impl TableRow for SongRecord {
    const TABLE: Table = Table::Songs;
    const COLUMNS: &'static [&'static str] = &[
        "song_id",
        "title",
        "api_path",
        "artist_names",
        "artist_id",
        "full_title",
        "header_image_thumbnail_url",
        "header_image_url",
        "primary_artist_names",
        "relationships_index_url",
        "release_date_components",
        "release_date",
        "song_art_image_thumbnail_url",
        "song_art_image_url",
        "stats",
        "hot",
        "pageviews",
        "url",
        "featured_artists",
        "primary_artist",
    ];

    fn from_sql_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(SongRecord {
            song_id: row.get(0)?,
            title: row.get(1)?,
            api_path: row.get(2)?,
            artist_names: row.get(3)?,
            artist_id: row.get(4)?,
            full_title: row.get(5)?,
            header_image_thumbnail_url: row.get(6)?,
            header_image_url: row.get(7)?,
            primary_artist_names: row.get(8)?,
            relationships_index_url: row.get(9)?,
            release_date_components: nested_from(row.get(10)?),
            release_date: parse_date(11, row.get(11)?)?,
            song_art_image_thumbnail_url: row.get(12)?,
            song_art_image_url: row.get(13)?,
            stats: nested_from(row.get(14)?),
            hot: row.get(15)?,
            pageviews: row.get(16)?,
            url: row.get(17)?,
            featured_artists: nested_from(row.get(18)?),
            primary_artist: nested_from(row.get(19)?),
        })
    }

    fn to_sql_values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.song_id),
            Value::Text(self.title.clone()),
            text(&self.api_path),
            text(&self.artist_names),
            Value::Integer(self.artist_id),
            Value::Text(self.full_title.clone()),
            text(&self.header_image_thumbnail_url),
            text(&self.header_image_url),
            text(&self.primary_artist_names),
            text(&self.relationships_index_url),
            nested(&self.release_date_components),
            text(&date_text(self.release_date)),
            text(&self.song_art_image_thumbnail_url),
            text(&self.song_art_image_url),
            nested(&self.stats),
            Value::Integer(i64::from(self.hot)),
            Value::Integer(self.pageviews),
            text(&self.url),
            nested(&self.featured_artists),
            nested(&self.primary_artist),
        ]
    }

    fn export_fields(&self) -> Vec<String> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        vec![
            self.song_id.to_string(),
            self.title.clone(),
            opt(&self.api_path),
            opt(&self.artist_names),
            self.artist_id.to_string(),
            self.full_title.clone(),
            opt(&self.header_image_thumbnail_url),
            opt(&self.header_image_url),
            opt(&self.primary_artist_names),
            opt(&self.relationships_index_url),
            export_nested(&self.release_date_components),
            date_text(self.release_date).unwrap_or_default(),
            opt(&self.song_art_image_thumbnail_url),
            opt(&self.song_art_image_url),
            export_nested(&self.stats),
            self.hot.to_string(),
            self.pageviews.to_string(),
            opt(&self.url),
            export_nested(&self.featured_artists),
            export_nested(&self.primary_artist),
        ]
    }
}

impl TableRow for ContributorCredit {
    const TABLE: Table = Table::ContributorCredits;
    const COLUMNS: &'static [&'static str] = &["song_id", "artist_id", "artist_name", "role"];

    fn from_sql_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ContributorCredit {
            song_id: row.get(0)?,
            artist_id: row.get(1)?,
            artist_name: row.get(2)?,
            role: row.get(3)?,
        })
    }

    fn to_sql_values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.song_id),
            self.artist_id.map(Value::Integer).unwrap_or(Value::Null),
            Value::Text(self.artist_name.clone()),
            Value::Text(self.role.clone()),
        ]
    }

    fn export_fields(&self) -> Vec<String> {
        vec![
            self.song_id.to_string(),
            self.artist_id.map(|id| id.to_string()).unwrap_or_default(),
            self.artist_name.clone(),
            self.role.clone(),
        ]
    }
}
