//! Artist ingestion: resolve, fetch, normalize, merge, then credit songs.
//!
//! Everything runs sequentially on the calling thread. The contributor pass
//! makes one remote call per song with a pause after each one, and checks a
//! cancellation flag before every song so an interrupted pass still merges
//! what it gathered.

use anyhow::{Context, Result};
use rustc_hash::FxHashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::client::{CatalogApi, MAX_PAGE_SIZE};
use crate::models::{ArtistRecord, ContributorCredit, SongDetailRecord};
use crate::normalize::{
    dedup_artists, normalize_artist, normalize_contributors, normalize_song_detail,
    normalize_song_list,
};
use crate::payloads::{RawArtistProfile, RawSong};
use crate::progress::{create_progress_bar, create_spinner, format_duration, log_progress};
use crate::queries::find_local_artist;
use crate::store::{dedup_credits, IncrementalStore};

const PROGRESS_LOG_INTERVAL: u64 = 25;

/// Pause after each per-song call of the contributor pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub on_success: Duration,
    pub on_failure: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            on_success: Duration::from_millis(700),
            on_failure: Duration::from_millis(300),
        }
    }
}

impl Pacing {
    pub fn none() -> Self {
        Self {
            on_success: Duration::ZERO,
            on_failure: Duration::ZERO,
        }
    }

    fn pause(&self, succeeded: bool) {
        let delay = if succeeded {
            self.on_success
        } else {
            self.on_failure
        };
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub page_size: u32,
    pub fetch_contributors: bool,
    pub pacing: Pacing,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            fetch_contributors: true,
            pacing: Pacing::default(),
        }
    }
}

/// Aggregate result of one contributor pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContributorPassReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// The cancellation flag stopped the pass before every song was tried.
    pub interrupted: bool,
    /// Rows gathered after full-row dedup.
    pub rows_gathered: usize,
    pub rows_added: usize,
    /// Distinct non-empty contributor names among the gathered rows.
    pub unique_collaborators: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub artist_id: i64,
    pub artist_name: String,
    pub artists_added: usize,
    pub songs_fetched: usize,
    pub songs_added: usize,
    pub contributors: Option<ContributorPassReport>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The artist was already in the catalog; nothing was fetched.
    AlreadyPresent { artist_id: i64, name: String },
    /// Cancelled before the artist and songs were merged; nothing was stored.
    Interrupted { artist_id: i64 },
    Ingested(IngestReport),
}

fn already_present(artist: &ArtistRecord) -> IngestOutcome {
    IngestOutcome::AlreadyPresent {
        artist_id: artist.artist_id,
        name: artist.name.clone(),
    }
}

fn fetch_artist(
    api: &dyn CatalogApi,
    artist_id: i64,
    page_size: u32,
) -> Result<(RawArtistProfile, Vec<RawSong>)> {
    let profile = api
        .fetch_artist_profile(artist_id)
        .with_context(|| format!("Failed to fetch profile for artist {}", artist_id))?;
    let songs = api
        .fetch_artist_songs(artist_id, page_size)
        .with_context(|| format!("Failed to fetch songs for artist {}", artist_id))?;
    Ok((profile, songs))
}

/// Ingest one artist by name.
///
/// A stored artist with the same name (case-insensitive) short-circuits
/// before any network call. Otherwise the name is resolved remotely, and a
/// resolved id that is already stored also short-circuits.
///
/// `cancel` is checked after resolving and again after fetching. A set flag
/// at either point returns [`IngestOutcome::Interrupted`] without merging, so
/// the next run starts over instead of finding a credit-less artist.
pub fn ingest_artist(
    api: &dyn CatalogApi,
    store: &mut IncrementalStore,
    name: &str,
    options: &IngestOptions,
    cancel: &AtomicBool,
) -> Result<IngestOutcome> {
    let artists: Vec<ArtistRecord> = store.load().context("Failed to load artists table")?;
    if let Some(artist) = find_local_artist(&artists, name) {
        info!("'{}' is already in the catalog (id {})", name, artist.artist_id);
        return Ok(already_present(artist));
    }

    let artist_id = api.resolve_artist_id(name)?;
    if let Some(artist) = artists.iter().find(|a| a.artist_id == artist_id) {
        info!("'{}' resolved to stored artist {}", name, artist_id);
        return Ok(already_present(artist));
    }
    info!("Resolved '{}' to artist {}", name, artist_id);
    if cancel.load(Ordering::Relaxed) {
        warn!("Interrupted before fetching artist {}", artist_id);
        return Ok(IngestOutcome::Interrupted { artist_id });
    }

    let spinner = create_spinner(&format!("Fetching artist {} and songs", artist_id));
    let fetched = fetch_artist(api, artist_id, options.page_size);
    spinner.finish_and_clear();
    let (profile, raw_songs) = fetched?;
    if cancel.load(Ordering::Relaxed) {
        warn!("Interrupted before merging artist {}, nothing stored", artist_id);
        return Ok(IngestOutcome::Interrupted { artist_id });
    }

    let artist_rows = dedup_artists(vec![normalize_artist(&profile)]);
    let artist_name = profile.name.clone();
    let songs = normalize_song_list(raw_songs, artist_id);
    let song_ids: Vec<i64> = songs.iter().map(|s| s.song_id).collect();
    info!("Fetched {} songs for {}", songs.len(), artist_name);

    let merged_artists = store
        .merge_artists(artist_rows)
        .context("Failed to merge artists")?;
    let merged_songs = store.merge_songs(songs).context("Failed to merge songs")?;

    let contributors = if options.fetch_contributors {
        Some(
            run_contributor_pass(api, store, &song_ids, &options.pacing, cancel)
                .context("Contributor pass failed")?,
        )
    } else {
        None
    };

    Ok(IngestOutcome::Ingested(IngestReport {
        artist_id,
        artist_name,
        artists_added: merged_artists.added,
        songs_fetched: song_ids.len(),
        songs_added: merged_songs.added,
        contributors,
    }))
}

/// Fetch credits for each song, then merge everything gathered.
///
/// A failing song is logged and counted; the pass moves on after the
/// failure pause. Only store errors abort the pass.
pub fn run_contributor_pass(
    api: &dyn CatalogApi,
    store: &mut IncrementalStore,
    song_ids: &[i64],
    pacing: &Pacing,
    cancel: &AtomicBool,
) -> crate::error::Result<ContributorPassReport> {
    let start = Instant::now();
    let total = song_ids.len() as u64;
    let pb = create_progress_bar(total, "Fetching credits");

    let mut report = ContributorPassReport::default();
    let mut gathered: Vec<ContributorCredit> = Vec::new();

    for (idx, &song_id) in song_ids.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            warn!(
                "Contributor pass interrupted after {}/{} songs",
                report.attempted, total
            );
            report.interrupted = true;
            break;
        }

        report.attempted += 1;
        let result = api
            .fetch_song_detail(song_id)
            .and_then(|detail| normalize_contributors(&detail, song_id));

        match result {
            Ok(rows) => {
                debug!("Song {}: {} credits", song_id, rows.len());
                report.succeeded += 1;
                gathered.extend(rows);
                pacing.pause(true);
            }
            Err(e) => {
                warn!("Song {}: failed to fetch credits: {}", song_id, e);
                report.failed += 1;
                pacing.pause(false);
            }
        }

        pb.inc(1);
        log_progress("credits", idx as u64 + 1, total, PROGRESS_LOG_INTERVAL);
    }
    pb.finish_and_clear();

    let gathered = dedup_credits(gathered);
    report.rows_gathered = gathered.len();
    report.unique_collaborators = gathered
        .iter()
        .map(|c| c.artist_name.as_str())
        .filter(|name| !name.is_empty())
        .collect::<FxHashSet<_>>()
        .len();

    if !gathered.is_empty() {
        report.rows_added = store.merge_contributors(gathered)?.added;
    }

    info!(
        "Credits: {}/{} songs ok, {} rows added, {} collaborators in {}",
        report.succeeded,
        report.attempted,
        report.rows_added,
        report.unique_collaborators,
        format_duration(start.elapsed())
    );
    Ok(report)
}

/// Fetch and normalize one song's detail, resolving its primary artist by
/// name through `api`.
pub fn describe_song(api: &dyn CatalogApi, song_id: i64) -> crate::error::Result<SongDetailRecord> {
    let detail = api.fetch_song_detail(song_id)?;
    normalize_song_detail(&detail, |names| api.resolve_artist_id(names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CatalogError, Result as CatalogResult};
    use crate::models::SongRecord;
    use crate::normalize::name_key;
    use crate::payloads::RawSongDetail;
    use rustc_hash::FxHashMap;
    use serde_json::{json, Value};
    use std::cell::Cell;

    /// In-memory service with one artist.
    struct FakeApi {
        artist_id: i64,
        artist_name: String,
        songs: Vec<Value>,
        details: FxHashMap<i64, Value>,
        resolve_calls: Cell<usize>,
        detail_calls: Cell<usize>,
        cancel_after: Option<(usize, &'static AtomicBool)>,
    }

    impl FakeApi {
        fn new(songs: Vec<Value>) -> Self {
            Self {
                artist_id: 1,
                artist_name: "Test Artist".to_string(),
                songs,
                details: FxHashMap::default(),
                resolve_calls: Cell::new(0),
                detail_calls: Cell::new(0),
                cancel_after: None,
            }
        }
    }

    impl CatalogApi for FakeApi {
        fn resolve_artist_id(&self, name_query: &str) -> CatalogResult<i64> {
            self.resolve_calls.set(self.resolve_calls.get() + 1);
            if name_key(name_query) == name_key(&self.artist_name) {
                Ok(self.artist_id)
            } else {
                Err(CatalogError::NotFound {
                    query: name_query.to_string(),
                })
            }
        }

        fn fetch_artist_profile(&self, artist_id: i64) -> CatalogResult<RawArtistProfile> {
            Ok(serde_json::from_value(json!({
                "id": artist_id,
                "name": self.artist_name,
                "description": {"plain": "A test artist."},
                "alternate_names": [],
                "followers_count": 3,
            }))?)
        }

        fn fetch_artist_songs(
            &self,
            _artist_id: i64,
            _page_size: u32,
        ) -> CatalogResult<Vec<RawSong>> {
            Ok(serde_json::from_value(Value::Array(self.songs.clone()))?)
        }

        fn fetch_song_detail(&self, song_id: i64) -> CatalogResult<RawSongDetail> {
            let calls = self.detail_calls.get() + 1;
            self.detail_calls.set(calls);
            if let Some((after, flag)) = self.cancel_after {
                if calls >= after {
                    flag.store(true, Ordering::Relaxed);
                }
            }
            match self.details.get(&song_id) {
                Some(detail) => Ok(serde_json::from_value(detail.clone())?),
                None => Err(CatalogError::remote(404, "not found")),
            }
        }
    }

    fn raw_song(id: i64, stats: Value) -> Value {
        json!({
            "id": id,
            "title": format!("Song {id}"),
            "primary_artist": {"id": 1, "name": "Test Artist"},
            "primary_artist_names": "Test Artist",
            "release_date_components": {"year": 2020, "month": 1, "day": 2},
            "stats": stats,
        })
    }

    fn detail_with_three_credits(id: i64) -> Value {
        json!({
            "id": id,
            "title": format!("Song {id}"),
            "primary_artist_names": "Test Artist",
            "custom_performances": [
                {"label": "Mixing Engineer", "artists": [{"id": 20, "name": "Mix"}]}
            ],
            "writer_artists": [{"id": 21, "name": "Pen"}],
            "producer_artists": [{"id": 22, "name": "Beat"}],
        })
    }

    fn no_pacing() -> IngestOptions {
        IngestOptions {
            pacing: Pacing::none(),
            ..Default::default()
        }
    }

    #[test]
    fn test_ingest_then_reingest_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = IncrementalStore::open(dir.path()).unwrap();
        let api = FakeApi::new(vec![
            raw_song(101, json!({"hot": true, "pageviews": 100})),
            raw_song(102, json!({"hot": false})),
        ]);
        let cancel = AtomicBool::new(false);
        let options = IngestOptions {
            fetch_contributors: false,
            ..no_pacing()
        };

        let outcome = ingest_artist(&api, &mut store, "Test Artist", &options, &cancel).unwrap();
        let IngestOutcome::Ingested(report) = outcome else {
            panic!("expected a fresh ingest");
        };
        assert_eq!(report.artists_added, 1);
        assert_eq!(report.songs_added, 2);
        assert!(report.contributors.is_none());

        let songs: Vec<SongRecord> = store.load().unwrap();
        assert_eq!(songs.iter().map(|s| s.pageviews).collect::<Vec<_>>(), vec![100, 0]);

        let again = ingest_artist(&api, &mut store, "test artist", &options, &cancel).unwrap();
        assert_eq!(
            again,
            IngestOutcome::AlreadyPresent {
                artist_id: 1,
                name: "Test Artist".to_string()
            }
        );
        assert_eq!(api.resolve_calls.get(), 1);
        assert_eq!(store.load::<ArtistRecord>().unwrap().len(), 1);
        assert_eq!(store.load::<SongRecord>().unwrap().len(), 2);
    }

    #[test]
    fn test_contributor_pass_skips_failed_song() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = IncrementalStore::open(dir.path()).unwrap();
        let mut api = FakeApi::new(vec![raw_song(1, json!({})), raw_song(2, json!({}))]);
        api.details.insert(2, detail_with_three_credits(2));
        let cancel = AtomicBool::new(false);

        let outcome =
            ingest_artist(&api, &mut store, "Test Artist", &no_pacing(), &cancel).unwrap();
        let IngestOutcome::Ingested(report) = outcome else {
            panic!("expected a fresh ingest");
        };
        let pass = report.contributors.unwrap();
        assert_eq!(pass.attempted, 2);
        assert_eq!(pass.failed, 1);
        assert_eq!(pass.succeeded, 1);
        assert_eq!(pass.rows_added, 3);
        assert_eq!(pass.unique_collaborators, 3);
        assert!(!pass.interrupted);

        let credits: Vec<ContributorCredit> = store.load().unwrap();
        assert_eq!(credits.len(), 3);
        assert!(credits.iter().all(|c| c.song_id == 2));
        assert_eq!(credits[0].role, "Mixing Engineer");
        assert_eq!(credits[1].role, "Writer");
        assert_eq!(credits[2].role, "Producer");
    }

    #[test]
    fn test_payload_without_credit_lists_counts_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = IncrementalStore::open(dir.path()).unwrap();
        let mut api = FakeApi::new(Vec::new());
        api.details.insert(5, json!({"id": 5, "title": "Bare"}));
        let cancel = AtomicBool::new(false);

        let report =
            run_contributor_pass(&api, &mut store, &[5], &Pacing::none(), &cancel).unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.rows_added, 0);
        assert!(store.load::<ContributorCredit>().unwrap().is_empty());
    }

    #[test]
    fn test_cancelled_pass_merges_partial_rows() {
        static CANCEL: AtomicBool = AtomicBool::new(false);
        let dir = tempfile::tempdir().unwrap();
        let mut store = IncrementalStore::open(dir.path()).unwrap();
        let mut api = FakeApi::new(Vec::new());
        for id in 1..=3 {
            api.details.insert(id, detail_with_three_credits(id));
        }
        api.cancel_after = Some((1, &CANCEL));

        let report =
            run_contributor_pass(&api, &mut store, &[1, 2, 3], &Pacing::none(), &CANCEL).unwrap();
        assert!(report.interrupted);
        assert_eq!(report.attempted, 1);
        assert_eq!(report.rows_added, 3);
        assert_eq!(api.detail_calls.get(), 1);
        assert_eq!(store.load::<ContributorCredit>().unwrap().len(), 3);
    }

    #[test]
    fn test_duplicate_rows_dropped_before_merge() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = IncrementalStore::open(dir.path()).unwrap();
        let mut api = FakeApi::new(Vec::new());
        api.details.insert(
            7,
            json!({
                "id": 7,
                "custom_performances": [],
                "writer_artists": [{"id": 1, "name": "Pen"}, {"id": 1, "name": "Pen"}],
                "producer_artists": [],
            }),
        );
        let cancel = AtomicBool::new(false);

        let report =
            run_contributor_pass(&api, &mut store, &[7], &Pacing::none(), &cancel).unwrap();
        assert_eq!(report.rows_gathered, 1);
        assert_eq!(report.unique_collaborators, 1);
    }

    #[test]
    fn test_nameless_credit_not_counted_as_collaborator() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = IncrementalStore::open(dir.path()).unwrap();
        let mut api = FakeApi::new(Vec::new());
        api.details.insert(
            8,
            json!({
                "id": 8,
                "custom_performances": [],
                "writer_artists": [{"id": 5, "name": "Pen"}, {"id": 6}],
                "producer_artists": [],
            }),
        );
        let cancel = AtomicBool::new(false);

        let report =
            run_contributor_pass(&api, &mut store, &[8], &Pacing::none(), &cancel).unwrap();
        assert_eq!(report.rows_gathered, 2);
        assert_eq!(report.unique_collaborators, 1);
    }

    #[test]
    fn test_cancel_before_ingest_stores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = IncrementalStore::open(dir.path()).unwrap();
        let mut api = FakeApi::new(vec![raw_song(3, json!({}))]);
        api.details.insert(3, detail_with_three_credits(3));

        let cancelled = AtomicBool::new(true);
        let outcome =
            ingest_artist(&api, &mut store, "Test Artist", &no_pacing(), &cancelled).unwrap();
        assert_eq!(outcome, IngestOutcome::Interrupted { artist_id: 1 });
        assert_eq!(api.detail_calls.get(), 0);
        assert!(store.load::<ArtistRecord>().unwrap().is_empty());
        assert!(store.load::<SongRecord>().unwrap().is_empty());

        // A later run is not short-circuited and fetches the credits
        let cancel = AtomicBool::new(false);
        let outcome =
            ingest_artist(&api, &mut store, "Test Artist", &no_pacing(), &cancel).unwrap();
        let IngestOutcome::Ingested(report) = outcome else {
            panic!("expected a fresh ingest");
        };
        assert_eq!(report.contributors.unwrap().rows_added, 3);
        assert_eq!(store.load::<ContributorCredit>().unwrap().len(), 3);
    }

    #[test]
    fn test_unknown_artist_propagates_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = IncrementalStore::open(dir.path()).unwrap();
        let api = FakeApi::new(Vec::new());
        let cancel = AtomicBool::new(false);

        let err = ingest_artist(&api, &mut store, "Nobody", &no_pacing(), &cancel).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CatalogError>(),
            Some(CatalogError::NotFound { .. })
        ));
        assert!(store.load::<ArtistRecord>().unwrap().is_empty());
    }

    #[test]
    fn test_describe_song_resolves_primary_artist() {
        let mut api = FakeApi::new(Vec::new());
        api.details.insert(2, detail_with_three_credits(2));

        let record = describe_song(&api, 2).unwrap();
        assert_eq!(record.primary_artist_id, 1);
        assert_eq!(record.album_title, crate::models::NO_ALBUM);
    }
}
