//! Build the collaboration graph of a stored artist and print it as JSON.
//!
//! Usage: collab-graph "<artist>" [--mode full|mini|role] [--role Writer] [--output graph.json]

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::info;

use catalog_ingest::config::DEFAULT_DATA_DIR;
use catalog_ingest::graph::{
    build_full_graph, build_mini_graph, build_role_filtered_graph, FULL_GRAPH_LIMIT,
};
use catalog_ingest::models::SongRecord;
use catalog_ingest::progress::init_logging;
use catalog_ingest::queries::{find_local_artist, songs_for_artist, suggest_artists};
use catalog_ingest::store::IncrementalStore;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// Up to --limit collaborators with role and song details
    Full,
    /// Top 15 collaborators, counts only
    Mini,
    /// Collaborators colored by role, optionally restricted to --role
    Role,
}

#[derive(Parser)]
#[command(name = "collab-graph")]
#[command(about = "Export an artist's collaboration graph as JSON")]
struct Args {
    /// Artist name as stored in the catalog
    artist: String,

    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    #[arg(long, value_enum, default_value = "full")]
    mode: Mode,

    /// Role label for --mode role (e.g. "Producer")
    #[arg(long)]
    role: Option<String>,

    /// Maximum collaborators for --mode full (0 for all)
    #[arg(long, default_value_t = FULL_GRAPH_LIMIT)]
    limit: usize,

    /// Write JSON here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let store = IncrementalStore::open(&args.data_dir)
        .with_context(|| format!("Failed to open catalog in {:?}", args.data_dir))?;
    let catalog = store.load_catalog().context("Failed to load catalog")?;

    let Some(artist) = find_local_artist(&catalog.artists, &args.artist) else {
        let suggestions = suggest_artists(&catalog.artists, &args.artist, 5);
        if suggestions.is_empty() {
            bail!("'{}' is not in the catalog", args.artist);
        }
        bail!(
            "'{}' is not in the catalog. Did you mean: {}?",
            args.artist,
            suggestions.join(", ")
        );
    };

    let songs: Vec<SongRecord> = songs_for_artist(&catalog.songs, artist.artist_id)
        .into_iter()
        .cloned()
        .collect();
    let main_artist = artist.name.as_str();

    let graph = match args.mode {
        Mode::Full => build_full_graph(main_artist, &songs, &catalog.credits, args.limit),
        Mode::Mini => build_mini_graph(main_artist, &songs, &catalog.credits),
        Mode::Role => {
            build_role_filtered_graph(main_artist, &songs, &catalog.credits, args.role.as_deref())
        }
    };

    if graph.is_empty() {
        info!("No collaborators found for {}", main_artist);
    } else {
        info!(
            "{} collaborators across {} songs",
            graph.collaborator_count(),
            songs.len()
        );
    }

    let json = serde_json::to_string_pretty(&graph)?;
    match args.output {
        Some(path) => {
            std::fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
            info!("Wrote graph to {:?}", path);
        }
        None => println!("{}", json),
    }

    Ok(())
}
