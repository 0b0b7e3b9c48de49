//! Collaboration graph around one main artist.
//!
//! The graph is derived on demand from the songs and contributor_credits
//! tables and never persisted. Nodes and edges serialize to JSON for the
//! renderer.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::models::{ContributorCredit, SongRecord};

pub const MAIN_NODE_COLOR: &str = "#EAC40A";
pub const MAIN_NODE_SIZE: u32 = 40;
pub const ROLE_GRAPH_MAIN_NODE_SIZE: u32 = 35;
pub const COLLABORATOR_COLOR: &str = "#FF4B4B";
pub const COLLABORATOR_SIZE: u32 = 40;
pub const EDGE_WEIGHT: u32 = 10;

/// Collaborator count shown in the mini graph.
pub const MINI_GRAPH_LIMIT: usize = 15;
/// Collaborator count shown in the full graph.
pub const FULL_GRAPH_LIMIT: usize = 50;

const SONG_PREVIEW_LEN: usize = 5;
const ROLE_LABEL_LIMIT: usize = 3;
const UNKNOWN_TITLE: &str = "Unknown";
const FALLBACK_ROLE: &str = "Featured Artist";

/// Node color for a role label; unlisted roles get the collaborator default.
pub fn role_color(role: &str) -> &'static str {
    match role {
        "Producer" => "#FFD700",
        "Writer" => "#00CED1",
        "Featured Artist" => "#FF69B4",
        "Composer" => "#9370DB",
        "Engineer" => "#32CD32",
        "Publisher" => "#FFA500",
        _ => COLLABORATOR_COLOR,
    }
}

// ============================================================================
// Collaborator index
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollaboratorStats {
    /// Number of credit rows, not distinct songs.
    pub count: usize,
    pub roles: BTreeSet<String>,
    /// Distinct song titles in first-seen order.
    pub songs: Vec<String>,
}

/// Collaborators keyed by name.
pub type CollaboratorIndex = BTreeMap<String, CollaboratorStats>;

fn credits_on_songs<'a>(
    songs: &[SongRecord],
    credits: &'a [ContributorCredit],
) -> impl Iterator<Item = &'a ContributorCredit> {
    let song_ids: FxHashSet<i64> = songs.iter().map(|s| s.song_id).collect();
    credits
        .iter()
        .filter(move |c| song_ids.contains(&c.song_id))
}

/// Aggregate the credits on `songs` by collaborator name.
///
/// Rows naming the main artist or with an empty name are skipped.
pub fn build_collaborator_index(
    main_artist: &str,
    songs: &[SongRecord],
    credits: &[ContributorCredit],
) -> CollaboratorIndex {
    let titles: FxHashMap<i64, &str> = songs
        .iter()
        .map(|s| (s.song_id, s.title.as_str()))
        .collect();

    let mut index = CollaboratorIndex::new();
    for credit in credits_on_songs(songs, credits) {
        let name = credit.artist_name.as_str();
        if name.is_empty() || name == main_artist {
            continue;
        }
        let title = titles
            .get(&credit.song_id)
            .copied()
            .unwrap_or(UNKNOWN_TITLE);

        let stats = index.entry(name.to_string()).or_default();
        stats.count += 1;
        stats.roles.insert(credit.role.clone());
        if !stats.songs.iter().any(|s| s == title) {
            stats.songs.push(title.to_string());
        }
    }
    index
}

// ============================================================================
// Graph
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverDetail {
    /// Name and collaboration count.
    Terse,
    /// Adds sorted roles and a preview of shared songs.
    Detailed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub size: u32,
    pub color: String,
    pub title: String,
}

impl GraphNode {
    fn new(name: &str, size: u32, color: &str, title: String) -> Self {
        Self {
            id: name.to_string(),
            label: name.to_string(),
            size,
            color: color.to_string(),
            title,
        }
    }

    fn main_artist(name: &str, size: u32) -> Self {
        Self::new(name, size, MAIN_NODE_COLOR, format!("{} - Main Artist", name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub weight: u32,
}

/// A star graph: the main artist plus one spoke per collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollaboratorGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl CollaboratorGraph {
    fn with_main(main_artist: &str, size: u32) -> Self {
        Self {
            nodes: vec![GraphNode::main_artist(main_artist, size)],
            edges: Vec::new(),
        }
    }

    fn add_collaborator(&mut self, main_artist: &str, node: GraphNode) {
        self.edges.push(GraphEdge {
            from: main_artist.to_string(),
            to: node.id.clone(),
            weight: EDGE_WEIGHT,
        });
        self.nodes.push(node);
    }

    /// True when the graph holds only the main artist.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn collaborator_count(&self) -> usize {
        self.edges.len()
    }
}

pub fn terse_hover(name: &str, stats: &CollaboratorStats) -> String {
    format!("{}; {} collaboration(s)", name, stats.count)
}

pub fn detailed_hover(name: &str, stats: &CollaboratorStats) -> String {
    let roles = if stats.roles.is_empty() {
        FALLBACK_ROLE.to_string()
    } else {
        stats.roles.iter().cloned().collect::<Vec<_>>().join(", ")
    };

    let shown: Vec<&str> = stats
        .songs
        .iter()
        .take(SONG_PREVIEW_LEN)
        .map(String::as_str)
        .collect();
    let mut preview = format!("• {}", shown.join("• "));
    if stats.songs.len() > SONG_PREVIEW_LEN {
        preview.push_str(&format!(
            "...and {} more",
            stats.songs.len() - SONG_PREVIEW_LEN
        ));
    }

    format!(
        "{}; {} collaboration(s); Roles:{}; Songs:{}",
        name, stats.count, roles, preview
    )
}

/// Build the star graph from an index.
///
/// Collaborators are ranked by descending count; equal counts keep the
/// index's name order. `limit` truncates the ranking; `None` and `Some(0)`
/// both mean no limit.
pub fn build_graph(
    main_artist: &str,
    index: &CollaboratorIndex,
    limit: Option<usize>,
    detail: HoverDetail,
) -> CollaboratorGraph {
    let mut ranked: Vec<(&String, &CollaboratorStats)> = index.iter().collect();
    ranked.sort_by(|a, b| b.1.count.cmp(&a.1.count));
    if let Some(limit) = limit.filter(|&n| n > 0) {
        ranked.truncate(limit);
    }

    let mut graph = CollaboratorGraph::with_main(main_artist, MAIN_NODE_SIZE);
    for (name, stats) in ranked {
        let title = match detail {
            HoverDetail::Terse => terse_hover(name, stats),
            HoverDetail::Detailed => detailed_hover(name, stats),
        };
        let node = GraphNode::new(name, COLLABORATOR_SIZE, COLLABORATOR_COLOR, title);
        graph.add_collaborator(main_artist, node);
    }
    graph
}

/// Mini graph: top collaborators with terse hover text.
pub fn build_mini_graph(
    main_artist: &str,
    songs: &[SongRecord],
    credits: &[ContributorCredit],
) -> CollaboratorGraph {
    let index = build_collaborator_index(main_artist, songs, credits);
    build_graph(main_artist, &index, Some(MINI_GRAPH_LIMIT), HoverDetail::Terse)
}

/// Full graph: up to `max_nodes` collaborators (0 for all) with detailed
/// hover text.
pub fn build_full_graph(
    main_artist: &str,
    songs: &[SongRecord],
    credits: &[ContributorCredit],
    max_nodes: usize,
) -> CollaboratorGraph {
    let index = build_collaborator_index(main_artist, songs, credits);
    build_graph(main_artist, &index, Some(max_nodes), HoverDetail::Detailed)
}

/// Graph restricted to one role (all roles when `role` is `None`), colored
/// by role.
///
/// Each node lists at most three of its sorted roles and takes its color
/// from the first of them.
pub fn build_role_filtered_graph(
    main_artist: &str,
    songs: &[SongRecord],
    credits: &[ContributorCredit],
    role: Option<&str>,
) -> CollaboratorGraph {
    let mut grouped: BTreeMap<&str, (usize, BTreeSet<&str>)> = BTreeMap::new();
    for credit in credits_on_songs(songs, credits) {
        if role.is_some_and(|r| credit.role != r) || credit.artist_name.is_empty() {
            continue;
        }
        let entry = grouped.entry(credit.artist_name.as_str()).or_default();
        entry.0 += 1;
        entry.1.insert(credit.role.as_str());
    }

    let mut graph = CollaboratorGraph::with_main(main_artist, ROLE_GRAPH_MAIN_NODE_SIZE);
    for (name, (count, roles)) in grouped {
        if name == main_artist {
            continue;
        }
        let roles: Vec<&str> = roles.into_iter().take(ROLE_LABEL_LIMIT).collect();
        let color = role_color(roles.first().copied().unwrap_or_default());
        let title = format!("{}Roles: {}{} credits", name, roles.join(", "), count);
        let node = GraphNode::new(name, COLLABORATOR_SIZE, color, title);
        graph.add_collaborator(main_artist, node);
    }
    graph
}
