//! Incremental, deduplicating store for the catalog tables.
//!
//! Each table is persisted twice: in the SQLite snapshot (`catalog.sqlite3`,
//! the source of truth on reload) and as a semicolon-delimited export. A
//! merge always loads the current snapshot first; a load failure aborts the
//! merge. The store takes no locks, so callers must make sure only one
//! ingest-and-merge sequence runs against a data directory at a time.

mod export;
mod merge;
mod schema;

pub use export::{escape_field, write_delimited, DELIMITER};
pub use merge::{
    dedup_credits, merge_artist_rows, merge_contributor_rows, merge_song_rows, Merged,
};
pub use schema::{TableRow, SNAPSHOT_FILE_NAME};

use rusqlite::{params_from_iter, Connection};
use rustc_hash::FxHashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{ArtistRecord, ContributorCredit, SongRecord, Table};
use crate::safety::validate_export_path;

const WRITE_BATCH_SIZE: usize = 10_000;

/// One fully materialized table.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Artists(Vec<ArtistRecord>),
    Songs(Vec<SongRecord>),
    ContributorCredits(Vec<ContributorCredit>),
}

impl Snapshot {
    pub fn table(&self) -> Table {
        match self {
            Snapshot::Artists(_) => Table::Artists,
            Snapshot::Songs(_) => Table::Songs,
            Snapshot::ContributorCredits(_) => Table::ContributorCredits,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Snapshot::Artists(rows) => rows.len(),
            Snapshot::Songs(rows) => rows.len(),
            Snapshot::ContributorCredits(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// All three tables, as read by the graph builder and the report queries.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub artists: Vec<ArtistRecord>,
    pub songs: Vec<SongRecord>,
    pub credits: Vec<ContributorCredit>,
}

pub struct IncrementalStore {
    conn: Connection,
    data_dir: PathBuf,
    export_overrides: FxHashMap<Table, PathBuf>,
}

impl IncrementalStore {
    /// Open (or create) the catalog in `data_dir`.
    /// A fresh catalog has three empty tables.
    pub fn open(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)?;
        let conn = Connection::open(data_dir.join(SNAPSHOT_FILE_NAME))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        conn.execute_batch(schema::CREATE_TABLES)?;

        Ok(Self {
            conn,
            data_dir: data_dir.to_path_buf(),
            export_overrides: FxHashMap::default(),
        })
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE_NAME)
    }

    /// Where `table`'s export is written: an override if one was set,
    /// `<data_dir>/<table>.csv` otherwise.
    pub fn export_path(&self, table: Table) -> PathBuf {
        match self.export_overrides.get(&table) {
            Some(path) => path.clone(),
            None => self.data_dir.join(table.export_file_name()),
        }
    }

    /// Write `table`'s export to `path` instead of the data directory.
    /// The path is checked here, before anything is written to it.
    pub fn set_export_path(&mut self, table: Table, path: PathBuf) -> Result<()> {
        validate_export_path(&path, table.name(), &self.snapshot_path())?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.export_overrides.insert(table, path);
        Ok(())
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Load every row of `R`'s table in insertion order.
    pub fn load<R: TableRow>(&self) -> Result<Vec<R>> {
        let mut stmt = self.conn.prepare(&schema::select_sql::<R>())?;
        let rows = stmt
            .query_map([], |row| R::from_sql_row(row))?
            .collect::<rusqlite::Result<Vec<R>>>()?;
        debug!("Loaded {} rows from {}", rows.len(), R::TABLE.name());
        Ok(rows)
    }

    pub fn load_snapshot(&self, table: Table) -> Result<Snapshot> {
        Ok(match table {
            Table::Artists => Snapshot::Artists(self.load()?),
            Table::Songs => Snapshot::Songs(self.load()?),
            Table::ContributorCredits => Snapshot::ContributorCredits(self.load()?),
        })
    }

    pub fn load_catalog(&self) -> Result<Catalog> {
        Ok(Catalog {
            artists: self.load()?,
            songs: self.load()?,
            credits: self.load()?,
        })
    }

    // ========================================================================
    // Persisting
    // ========================================================================

    /// Replace `R`'s table with `rows` in the snapshot, then rewrite its export.
    ///
    /// The snapshot is replaced in one transaction. The export is written
    /// afterwards; a crash in between leaves the export stale.
    pub fn persist<R: TableRow>(&mut self, rows: &[R]) -> Result<()> {
        let table = R::TABLE;
        let export_path = self.export_path(table);

        let tx = self.conn.transaction()?;
        tx.execute(&format!("DELETE FROM {}", table.name()), [])?;
        {
            let mut stmt = tx.prepare_cached(&schema::insert_sql::<R>())?;
            for chunk in rows.chunks(WRITE_BATCH_SIZE) {
                for row in chunk {
                    stmt.execute(params_from_iter(row.to_sql_values()))?;
                }
                debug!("Wrote {} rows to {}", chunk.len(), table.name());
            }
        }
        tx.commit()?;

        write_delimited(&export_path, rows)?;
        info!("Persisted {} rows to {}", rows.len(), table.name());
        Ok(())
    }

    fn merge_with<R, F>(&mut self, incoming: Vec<R>, merge: F) -> Result<Merged<R>>
    where
        R: TableRow,
        F: FnOnce(Vec<R>, Vec<R>) -> Merged<R>,
    {
        let existing = self.load::<R>()?;
        let merged = merge(existing, incoming);
        if merged.is_noop() {
            info!("No new rows for {}", R::TABLE.name());
        } else {
            self.persist(&merged.rows)?;
        }
        Ok(merged)
    }

    // ========================================================================
    // Merging
    // ========================================================================

    /// Append artists unless any of their ids already exists.
    pub fn merge_artists(&mut self, incoming: Vec<ArtistRecord>) -> Result<Merged<ArtistRecord>> {
        self.merge_with(incoming, merge_artist_rows)
    }

    /// Append songs with unseen `song_id`s.
    pub fn merge_songs(&mut self, incoming: Vec<SongRecord>) -> Result<Merged<SongRecord>> {
        self.merge_with(incoming, merge_song_rows)
    }

    /// Append credits for songs that have no credits yet.
    pub fn merge_contributors(
        &mut self,
        incoming: Vec<ContributorCredit>,
    ) -> Result<Merged<ContributorCredit>> {
        self.merge_with(incoming, merge_contributor_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NestedField;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn artist(id: i64) -> ArtistRecord {
        let mut social_links = BTreeMap::new();
        social_links.insert("twitter".to_string(), "handle".to_string());
        ArtistRecord {
            artist_id: id,
            name: format!("Artist {id}"),
            description: "Bio; with delimiter".to_string(),
            alternate_names: vec!["Alias".to_string()],
            header_image_url: Some("http://header".to_string()),
            image_url: None,
            social_links,
            followers_count: 12,
        }
    }

    fn song(id: i64, pageviews: i64) -> SongRecord {
        SongRecord {
            song_id: id,
            title: format!("Song {id}"),
            api_path: Some(format!("/songs/{id}")),
            artist_names: Some("Artist 1".to_string()),
            artist_id: 1,
            full_title: format!("Song {id} by Artist 1"),
            header_image_thumbnail_url: None,
            header_image_url: None,
            primary_artist_names: Some("Artist 1".to_string()),
            relationships_index_url: None,
            release_date_components: NestedField::Structured(
                json!({"year": 2020, "month": 6, "day": 15}),
            ),
            release_date: NaiveDate::from_ymd_opt(2020, 6, 15),
            song_art_image_thumbnail_url: None,
            song_art_image_url: None,
            stats: NestedField::Structured(json!({"hot": true, "pageviews": pageviews})),
            hot: true,
            pageviews,
            url: None,
            featured_artists: NestedField::Structured(json!([])),
            primary_artist: NestedField::Structured(json!({"id": 1})),
        }
    }

    fn credit(song_id: i64, name: &str) -> ContributorCredit {
        ContributorCredit {
            song_id,
            artist_id: Some(5),
            artist_name: name.to_string(),
            role: "Writer".to_string(),
        }
    }

    #[test]
    fn test_fresh_store_loads_empty_tables() {
        let dir = tempfile::tempdir().unwrap();
        let store = IncrementalStore::open(dir.path()).unwrap();
        for table in Table::ALL {
            let snapshot = store.load_snapshot(table).unwrap();
            assert_eq!(snapshot.table(), table);
            assert!(snapshot.is_empty());
        }
    }

    #[test]
    fn test_artist_roundtrip_and_guard() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = IncrementalStore::open(dir.path()).unwrap();

        let merged = store.merge_artists(vec![artist(1)]).unwrap();
        assert_eq!(merged.added, 1);

        let loaded: Vec<ArtistRecord> = store.load().unwrap();
        assert_eq!(loaded, vec![artist(1)]);

        let again = store.merge_artists(vec![artist(1)]).unwrap();
        assert!(again.is_noop());
        assert_eq!(store.load::<ArtistRecord>().unwrap().len(), 1);
    }

    #[test]
    fn test_songs_persisted_flat_and_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = IncrementalStore::open(dir.path()).unwrap();

        store.merge_songs(vec![song(1, 100), song(2, 0)]).unwrap();
        let merged = store.merge_songs(vec![song(2, 0), song(3, 7)]).unwrap();
        assert_eq!(merged.added, 1);

        let loaded: Vec<SongRecord> = store.load().unwrap();
        assert_eq!(
            loaded.iter().map(|s| s.song_id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(
            loaded.iter().map(|s| s.pageviews).collect::<Vec<_>>(),
            vec![100, 0, 7]
        );
        assert_eq!(loaded[0].release_date, NaiveDate::from_ymd_opt(2020, 6, 15));
        assert!(loaded[0].stats.as_text().is_some());
        assert_eq!(loaded, merged.rows);
    }

    #[test]
    fn test_contributors_merge_and_export() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = IncrementalStore::open(dir.path()).unwrap();

        store
            .merge_contributors(vec![credit(1, "A"), credit(1, "B")])
            .unwrap();
        let merged = store
            .merge_contributors(vec![credit(1, "C"), credit(2, "D")])
            .unwrap();
        assert_eq!(merged.added, 1);

        let export = fs::read_to_string(store.export_path(Table::ContributorCredits)).unwrap();
        // header + 3 rows
        assert_eq!(export.lines().count(), 4);
        assert_eq!(store.load::<ContributorCredit>().unwrap().len(), 3);
    }

    #[test]
    fn test_export_matches_snapshot_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = IncrementalStore::open(dir.path()).unwrap();
        store.merge_artists(vec![artist(1), artist(2)]).unwrap();

        let export = fs::read_to_string(store.export_path(Table::Artists)).unwrap();
        let lines: Vec<&str> = export.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("artist_id;name;description"));
        assert!(lines[1].contains("\"Bio; with delimiter\""));
    }

    #[test]
    fn test_export_override_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let exports = tempfile::tempdir().unwrap();
        let mut store = IncrementalStore::open(dir.path()).unwrap();
        let target = exports.path().join("artists_2024.csv");
        store.set_export_path(Table::Artists, target.clone()).unwrap();

        store.merge_artists(vec![artist(1)]).unwrap();
        assert_eq!(store.export_path(Table::Artists), target);
        assert_eq!(fs::read_to_string(&target).unwrap().lines().count(), 2);
        assert!(!dir.path().join("artists.csv").exists());
    }

    #[test]
    fn test_bad_export_override_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = IncrementalStore::open(dir.path()).unwrap();
        let snapshot = store.snapshot_path();

        assert!(store.set_export_path(Table::Songs, snapshot).is_err());
        assert!(store
            .set_export_path(Table::Songs, dir.path().join("artists.csv"))
            .is_err());
        assert!(store
            .set_export_path(Table::Songs, dir.path().join("songs.txt"))
            .is_err());
        assert_eq!(store.export_path(Table::Songs), dir.path().join("songs.csv"));
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = IncrementalStore::open(dir.path()).unwrap();
            store.merge_artists(vec![artist(1)]).unwrap();
        }
        let store = IncrementalStore::open(dir.path()).unwrap();
        let catalog = store.load_catalog().unwrap();
        assert_eq!(catalog.artists.len(), 1);
        assert!(catalog.songs.is_empty());
        assert!(catalog.credits.is_empty());
    }

    #[test]
    fn test_corrupt_row_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = IncrementalStore::open(dir.path()).unwrap();
        store
            .conn
            .execute(
                "INSERT INTO artists (artist_id, name, description, alternate_names,
                     social_links, followers_count)
                 VALUES (1, 'X', '', 'not json', '{}', 0)",
                [],
            )
            .unwrap();
        assert!(store.load::<ArtistRecord>().is_err());
        assert!(store.load_snapshot(Table::Artists).is_err());
    }
}
