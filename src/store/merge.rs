//! Merge rules applied between a loaded snapshot and an incoming batch.
//!
//! These functions are pure: they never touch storage. Duplicate keys inside
//! an incoming batch are not detected here.

use rustc_hash::FxHashSet;

use crate::models::{ArtistRecord, ContributorCredit, SongRecord};

/// Result of merging a batch into a table.
#[derive(Debug, Clone, PartialEq)]
pub struct Merged<R> {
    /// Number of incoming rows appended; 0 means the merge was a no-op.
    pub added: usize,
    /// The full table after the merge.
    pub rows: Vec<R>,
}

impl<R> Merged<R> {
    pub fn is_noop(&self) -> bool {
        self.added == 0
    }

    fn unchanged(rows: Vec<R>) -> Self {
        Self { added: 0, rows }
    }
}

fn append<R>(mut existing: Vec<R>, new_rows: Vec<R>) -> Merged<R> {
    let added = new_rows.len();
    existing.extend(new_rows);
    Merged {
        added,
        rows: existing,
    }
}

/// Batch-level guard: if any incoming `artist_id` already exists, the whole
/// batch is rejected.
pub fn merge_artist_rows(
    existing: Vec<ArtistRecord>,
    incoming: Vec<ArtistRecord>,
) -> Merged<ArtistRecord> {
    let known: FxHashSet<i64> = existing.iter().map(|a| a.artist_id).collect();
    if incoming.is_empty() || incoming.iter().any(|a| known.contains(&a.artist_id)) {
        return Merged::unchanged(existing);
    }
    append(existing, incoming)
}

/// Append songs whose `song_id` is not in the table yet.
///
/// Nested columns on both sides are flattened first, so the merged table
/// holds one representation per column even when nothing is appended.
pub fn merge_song_rows(existing: Vec<SongRecord>, incoming: Vec<SongRecord>) -> Merged<SongRecord> {
    let existing: Vec<SongRecord> = existing.into_iter().map(SongRecord::flatten_nested).collect();
    let known: FxHashSet<i64> = existing.iter().map(|s| s.song_id).collect();

    let new_rows: Vec<SongRecord> = incoming
        .into_iter()
        .map(SongRecord::flatten_nested)
        .filter(|s| !known.contains(&s.song_id))
        .collect();

    if new_rows.is_empty() {
        return Merged::unchanged(existing);
    }
    append(existing, new_rows)
}

/// Append credits for songs that have no credit rows yet.
///
/// Dedup is per song, not per credit: once a song has any rows, later
/// batches for that song are ignored even if their (name, role) pairs differ.
pub fn merge_contributor_rows(
    existing: Vec<ContributorCredit>,
    incoming: Vec<ContributorCredit>,
) -> Merged<ContributorCredit> {
    let known: FxHashSet<i64> = existing.iter().map(|c| c.song_id).collect();
    let new_rows: Vec<ContributorCredit> = incoming
        .into_iter()
        .filter(|c| !known.contains(&c.song_id))
        .collect();

    if new_rows.is_empty() {
        return Merged::unchanged(existing);
    }
    append(existing, new_rows)
}

/// Drop exact duplicate rows, keeping the first occurrence.
pub fn dedup_credits(rows: Vec<ContributorCredit>) -> Vec<ContributorCredit> {
    let mut seen = FxHashSet::default();
    rows.into_iter().filter(|r| seen.insert(r.clone())).collect()
}
