use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use catalog_ingest::client::RemoteCatalogClient;
use catalog_ingest::config::{AppConfig, CliConfig};
use catalog_ingest::error::CatalogError;
use catalog_ingest::ingest::{ingest_artist, IngestOptions, IngestOutcome};
use catalog_ingest::models::ArtistRecord;
use catalog_ingest::progress::{format_duration, init_logging, set_log_only};
use catalog_ingest::queries::suggest_artists;

#[derive(Parser)]
#[command(name = "catalog-ingest")]
#[command(about = "Fetch an artist, their songs and song credits into the local catalog")]
struct Args {
    /// Artist name to ingest
    artist: String,

    /// API bearer token
    #[arg(long, env = "CATALOG_API_TOKEN", hide_env_values = true)]
    token: String,

    /// Directory holding the snapshot database and exports
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// TOML config file; its values override flags
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    api_base_url: Option<String>,

    /// Songs per listing page (1-50)
    #[arg(long)]
    page_size: Option<u32>,

    /// Skip the per-song credit pass
    #[arg(long)]
    no_contributors: bool,

    /// Log-only mode: disable progress bars, print periodic status lines
    #[arg(long)]
    log_only: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();
    set_log_only(args.log_only);

    let config = AppConfig::load(
        CliConfig {
            data_dir: args.data_dir,
            api_base_url: args.api_base_url,
            page_size: args.page_size,
        },
        args.config.as_deref(),
    )?;

    // First Ctrl+C asks the ingest to stop at its next checkpoint; a second
    // one exits immediately.
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        ctrlc::set_handler(move || {
            if cancel.swap(true, Ordering::Relaxed) {
                eprintln!("Interrupted again, exiting");
                std::process::exit(130);
            }
            eprintln!("Stopping after the current request (Ctrl+C again to exit now)");
        })
        .context("Failed to install Ctrl+C handler")?;
    }

    let start = Instant::now();
    info!("Opening catalog in {:?}", config.data_dir);
    let mut store = config.open_store()?;

    let client = RemoteCatalogClient::new(
        &config.api_base_url,
        &args.token,
        config.request_timeout,
        config.retry.clone(),
    )
    .context("Failed to build HTTP client")?;

    let options = IngestOptions {
        page_size: config.page_size,
        fetch_contributors: !args.no_contributors,
        pacing: config.pacing,
    };

    let outcome = match ingest_artist(&client, &mut store, &args.artist, &options, &cancel) {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Some(CatalogError::NotFound { .. }) = e.downcast_ref::<CatalogError>() {
                let artists: Vec<ArtistRecord> = store.load().unwrap_or_default();
                let suggestions = suggest_artists(&artists, &args.artist, 5);
                if !suggestions.is_empty() {
                    warn!("Stored artists with similar names: {}", suggestions.join(", "));
                }
            }
            return Err(e);
        }
    };

    println!("\n{:=<60}", "");
    match outcome {
        IngestOutcome::AlreadyPresent { artist_id, name } => {
            println!("{} is already in the catalog (id {})", name, artist_id);
        }
        IngestOutcome::Interrupted { artist_id } => {
            println!("Interrupted before storing artist {}, nothing saved", artist_id);
        }
        IngestOutcome::Ingested(report) => {
            println!("Ingested {} (id {})", report.artist_name, report.artist_id);
            println!("  Artists added: {}", report.artists_added);
            println!(
                "  Songs: {} fetched, {} added",
                report.songs_fetched, report.songs_added
            );
            if let Some(pass) = report.contributors {
                println!(
                    "  Credits: {}/{} songs ok, {} failed, {} rows added",
                    pass.succeeded, pass.attempted, pass.failed, pass.rows_added
                );
                println!("  Collaborators: {}", pass.unique_collaborators);
                if pass.interrupted {
                    println!("  (interrupted, partial credits saved)");
                }
            }
        }
    }
    println!("  Elapsed: {}", format_duration(start.elapsed()));
    println!("{:=<60}", "");

    Ok(())
}
