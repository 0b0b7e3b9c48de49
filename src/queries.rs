//! Read-side queries over a loaded catalog.
//!
//! Everything here works on already-loaded rows and never touches storage
//! or the network.

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::models::{ArtistRecord, ContributorCredit, SongRecord};
use crate::normalize::name_key;

/// Minimum Jaro-Winkler similarity for a "did you mean" suggestion.
pub const SUGGESTION_THRESHOLD: f64 = 0.8;

// ============================================================================
// Artists
// ============================================================================

/// Case-insensitive lookup of an artist by name in the artists table.
pub fn find_local_artist<'a>(artists: &'a [ArtistRecord], name: &str) -> Option<&'a ArtistRecord> {
    let key = name_key(name);
    artists.iter().find(|a| name_key(&a.name) == key)
}

/// Stored artist names similar to `query`, best match first.
pub fn suggest_artists(artists: &[ArtistRecord], query: &str, limit: usize) -> Vec<String> {
    let key = name_key(query);
    let mut scored: Vec<(f64, &str)> = artists
        .iter()
        .map(|a| (strsim::jaro_winkler(&key, &name_key(&a.name)), a.name.as_str()))
        .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored
        .into_iter()
        .take(limit)
        .map(|(_, name)| name.to_string())
        .collect()
}

// ============================================================================
// Songs
// ============================================================================

pub fn songs_for_artist(songs: &[SongRecord], artist_id: i64) -> Vec<&SongRecord> {
    songs.iter().filter(|s| s.artist_id == artist_id).collect()
}

/// The `n` most viewed songs, ties in table order.
pub fn top_songs<'a>(songs: &[&'a SongRecord], n: usize) -> Vec<&'a SongRecord> {
    let mut ranked = songs.to_vec();
    ranked.sort_by(|a, b| b.pageviews.cmp(&a.pageviews));
    ranked.truncate(n);
    ranked
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SongOrder {
    ReleaseDate,
    Pageviews,
    Title,
}

/// Sort songs by `order`. Songs without a release date always sort last.
pub fn sort_songs(songs: &mut [&SongRecord], order: SongOrder, ascending: bool) {
    let directed = |o: Ordering| if ascending { o } else { o.reverse() };
    songs.sort_by(|a, b| match order {
        SongOrder::ReleaseDate => match (a.release_date, b.release_date) {
            (Some(x), Some(y)) => directed(x.cmp(&y)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        SongOrder::Pageviews => directed(a.pageviews.cmp(&b.pageviews)),
        SongOrder::Title => directed(a.title.cmp(&b.title)),
    });
}

// ============================================================================
// Credits
// ============================================================================

/// Credits attached to any of `songs`.
pub fn credits_for_songs<'a>(
    songs: &[&SongRecord],
    credits: &'a [ContributorCredit],
) -> Vec<&'a ContributorCredit> {
    let ids: FxHashSet<i64> = songs.iter().map(|s| s.song_id).collect();
    credits.iter().filter(|c| ids.contains(&c.song_id)).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleSummary {
    pub role: String,
    pub contributors: usize,
    pub songs: usize,
}

/// Distinct contributors and songs per role, most contributors first.
pub fn role_breakdown(credits: &[&ContributorCredit]) -> Vec<RoleSummary> {
    let mut by_role: BTreeMap<&str, (BTreeSet<&str>, BTreeSet<i64>)> = BTreeMap::new();
    for credit in credits {
        let entry = by_role.entry(credit.role.as_str()).or_default();
        entry.0.insert(credit.artist_name.as_str());
        entry.1.insert(credit.song_id);
    }

    let mut summary: Vec<RoleSummary> = by_role
        .into_iter()
        .map(|(role, (names, songs))| RoleSummary {
            role: role.to_string(),
            contributors: names.len(),
            songs: songs.len(),
        })
        .collect();
    summary.sort_by(|a, b| b.contributors.cmp(&a.contributors));
    summary
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollaboratorSummary {
    pub name: String,
    pub songs_together: usize,
    pub roles: Vec<String>,
}

/// Distinct songs and sorted roles per collaborator, most songs first.
pub fn frequent_collaborators(credits: &[&ContributorCredit]) -> Vec<CollaboratorSummary> {
    let mut by_name: BTreeMap<&str, (BTreeSet<i64>, BTreeSet<&str>)> = BTreeMap::new();
    for credit in credits {
        let entry = by_name.entry(credit.artist_name.as_str()).or_default();
        entry.0.insert(credit.song_id);
        entry.1.insert(credit.role.as_str());
    }

    let mut summary: Vec<CollaboratorSummary> = by_name
        .into_iter()
        .map(|(name, (songs, roles))| CollaboratorSummary {
            name: name.to_string(),
            songs_together: songs.len(),
            roles: roles.into_iter().map(str::to_string).collect(),
        })
        .collect();
    summary.sort_by(|a, b| b.songs_together.cmp(&a.songs_together));
    summary
}

/// Optional filters for [`credit_view`]. Text filters are case-insensitive
/// substring matches; an empty role list keeps every role.
#[derive(Debug, Clone, Default)]
pub struct CreditFilter {
    pub title: Option<String>,
    pub contributor: Option<String>,
    pub roles: Vec<String>,
}

impl CreditFilter {
    fn matches(&self, title: &str, credit: &ContributorCredit) -> bool {
        let contains = |haystack: &str, needle: &Option<String>| match needle {
            Some(n) if !n.is_empty() => haystack.to_lowercase().contains(&n.to_lowercase()),
            _ => true,
        };
        contains(title, &self.title)
            && contains(&credit.artist_name, &self.contributor)
            && (self.roles.is_empty() || self.roles.iter().any(|r| *r == credit.role))
    }
}

/// A credit joined with its song's title, release date and pageviews.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreditRow {
    pub song_id: i64,
    pub title: String,
    pub artist_name: String,
    pub role: String,
    pub release_date: Option<NaiveDate>,
    pub pageviews: i64,
}

/// Credits on `songs` joined to song fields, in credit-table order.
pub fn credit_view(
    songs: &[&SongRecord],
    credits: &[ContributorCredit],
    filter: &CreditFilter,
) -> Vec<CreditRow> {
    let by_id: FxHashMap<i64, &SongRecord> = songs.iter().map(|s| (s.song_id, *s)).collect();
    credits
        .iter()
        .filter_map(|c| by_id.get(&c.song_id).map(|s| (*s, c)))
        .filter(|(song, credit)| filter.matches(&song.title, credit))
        .map(|(song, credit)| CreditRow {
            song_id: song.song_id,
            title: song.title.clone(),
            artist_name: credit.artist_name.clone(),
            role: credit.role.clone(),
            release_date: song.release_date,
            pageviews: song.pageviews,
        })
        .collect()
}
