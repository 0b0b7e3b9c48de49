//! Reports over the local catalog: songs, roles, collaborators, credits.
//!
//! Usage: catalog-report <command> "<artist>" [options]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;

use catalog_ingest::client::RemoteCatalogClient;
use catalog_ingest::config::{AppConfig, CliConfig};
use catalog_ingest::ingest::describe_song;
use catalog_ingest::models::{ArtistRecord, SongRecord};
use catalog_ingest::progress::init_logging;
use catalog_ingest::queries::{
    credit_view, credits_for_songs, find_local_artist, frequent_collaborators, role_breakdown,
    songs_for_artist, sort_songs, suggest_artists, top_songs, CreditFilter, SongOrder,
};
use catalog_ingest::store::Catalog;

const TOP_SONGS: usize = 5;

#[derive(Parser)]
#[command(name = "catalog-report")]
#[command(about = "Query the local catalog")]
struct Args {
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// TOML config file; its values override flags
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SortKey {
    Date,
    Pageviews,
    Title,
}

impl From<SortKey> for SongOrder {
    fn from(key: SortKey) -> Self {
        match key {
            SortKey::Date => SongOrder::ReleaseDate,
            SortKey::Pageviews => SongOrder::Pageviews,
            SortKey::Title => SongOrder::Title,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Song, credit and collaborator totals plus the most viewed songs
    Overview { artist: String },
    /// The artist's songs
    Songs {
        artist: String,
        #[arg(long, value_enum, default_value = "date")]
        sort: SortKey,
        #[arg(long)]
        ascending: bool,
    },
    /// Distinct contributors and songs per role
    Roles { artist: String },
    /// Collaborators by number of shared songs
    Collaborators {
        artist: String,
        #[arg(long, default_value_t = 20)]
        top: usize,
    },
    /// Credits joined with song info
    Credits {
        artist: String,
        /// Case-insensitive song title substring
        #[arg(long)]
        song: Option<String>,
        /// Case-insensitive contributor name substring
        #[arg(long)]
        contributor: Option<String>,
        /// Keep only these roles (repeatable)
        #[arg(long = "role")]
        roles: Vec<String>,
    },
    /// Fetch one song's detail from the remote service
    Song {
        song_id: i64,
        #[arg(long, env = "CATALOG_API_TOKEN", hide_env_values = true)]
        token: String,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn lookup<'a>(catalog: &'a Catalog, name: &str) -> Result<&'a ArtistRecord> {
    if let Some(artist) = find_local_artist(&catalog.artists, name) {
        return Ok(artist);
    }
    let suggestions = suggest_artists(&catalog.artists, name, 5);
    if suggestions.is_empty() {
        bail!("'{}' is not in the catalog", name);
    }
    bail!(
        "'{}' is not in the catalog. Did you mean: {}?",
        name,
        suggestions.join(", ")
    )
}

#[derive(Serialize)]
struct Overview<'a> {
    artist: &'a str,
    followers: i64,
    songs: usize,
    credits: usize,
    contributors: usize,
    top_songs: Vec<SongLine<'a>>,
}

#[derive(Serialize)]
struct SongLine<'a> {
    song_id: i64,
    title: &'a str,
    release_date: Option<chrono::NaiveDate>,
    pageviews: i64,
}

impl<'a> From<&'a SongRecord> for SongLine<'a> {
    fn from(song: &'a SongRecord) -> Self {
        Self {
            song_id: song.song_id,
            title: &song.title,
            release_date: song.release_date,
            pageviews: song.pageviews,
        }
    }
}

fn print_songs(songs: &[SongLine]) {
    for song in songs {
        let date = song
            .release_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("  {:<40} {:>10}  {:>12}", song.title, date, song.pageviews);
    }
}

fn open_catalog(config: &AppConfig) -> Result<Catalog> {
    config.open_store()?.load_catalog().context("Failed to load catalog")
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let config = AppConfig::load(
        CliConfig {
            data_dir: args.data_dir,
            ..Default::default()
        },
        args.config.as_deref(),
    )?;

    match &args.command {
        Command::Overview { artist } => {
            let catalog = open_catalog(&config)?;
            let artist = lookup(&catalog, artist)?;
            let songs = songs_for_artist(&catalog.songs, artist.artist_id);
            let credits = credits_for_songs(&songs, &catalog.credits);
            let contributors = frequent_collaborators(&credits).len();
            let overview = Overview {
                artist: &artist.name,
                followers: artist.followers_count,
                songs: songs.len(),
                credits: credits.len(),
                contributors,
                top_songs: top_songs(&songs, TOP_SONGS)
                    .into_iter()
                    .map(SongLine::from)
                    .collect(),
            };
            if args.json {
                return print_json(&overview);
            }
            println!("{:=<60}", "");
            println!("{} ({} followers)", overview.artist, overview.followers);
            println!("  Songs: {}", overview.songs);
            println!("  Credits: {}", overview.credits);
            println!("  Unique contributors: {}", overview.contributors);
            println!("\nTop songs:");
            print_songs(&overview.top_songs);
            println!("{:=<60}", "");
        }
        Command::Songs {
            artist,
            sort,
            ascending,
        } => {
            let catalog = open_catalog(&config)?;
            let artist = lookup(&catalog, artist)?;
            let mut songs = songs_for_artist(&catalog.songs, artist.artist_id);
            sort_songs(&mut songs, (*sort).into(), *ascending);
            let lines: Vec<SongLine> = songs.into_iter().map(SongLine::from).collect();
            if args.json {
                return print_json(&lines);
            }
            println!("{} songs by {}", lines.len(), artist.name);
            print_songs(&lines);
        }
        Command::Roles { artist } => {
            let catalog = open_catalog(&config)?;
            let artist = lookup(&catalog, artist)?;
            let songs = songs_for_artist(&catalog.songs, artist.artist_id);
            let breakdown = role_breakdown(&credits_for_songs(&songs, &catalog.credits));
            if args.json {
                return print_json(&breakdown);
            }
            println!("  {:<30} {:>12} {:>8}", "Role", "Contributors", "Songs");
            for row in &breakdown {
                println!("  {:<30} {:>12} {:>8}", row.role, row.contributors, row.songs);
            }
        }
        Command::Collaborators { artist, top } => {
            let catalog = open_catalog(&config)?;
            let artist = lookup(&catalog, artist)?;
            let songs = songs_for_artist(&catalog.songs, artist.artist_id);
            let mut summary = frequent_collaborators(&credits_for_songs(&songs, &catalog.credits));
            summary.truncate(*top);
            if args.json {
                return print_json(&summary);
            }
            for row in &summary {
                println!(
                    "  {:<30} {:>4}  {}",
                    row.name,
                    row.songs_together,
                    row.roles.join(", ")
                );
            }
        }
        Command::Credits {
            artist,
            song,
            contributor,
            roles,
        } => {
            let catalog = open_catalog(&config)?;
            let artist = lookup(&catalog, artist)?;
            let songs = songs_for_artist(&catalog.songs, artist.artist_id);
            let filter = CreditFilter {
                title: song.clone(),
                contributor: contributor.clone(),
                roles: roles.clone(),
            };
            let rows = credit_view(&songs, &catalog.credits, &filter);
            if args.json {
                return print_json(&rows);
            }
            println!("Found {} credits", rows.len());
            for row in &rows {
                println!("  {:<40} {:<30} {}", row.title, row.artist_name, row.role);
            }
        }
        Command::Song { song_id, token } => {
            let client = RemoteCatalogClient::new(
                &config.api_base_url,
                token,
                config.request_timeout,
                config.retry.clone(),
            )?;
            let record = describe_song(&client, *song_id)
                .with_context(|| format!("Failed to fetch song {}", song_id))?;
            print_json(&record)?;
        }
    }

    Ok(())
}
