// src/main.rs
mod config;
mod drive;
mod period;
mod pipeline;
mod screener;
mod utils;

use std::path::PathBuf;

use clap::Parser;

use config::Config;
use drive::DriveClient;
use period::SystemClock;
use pipeline::FetchStorePipeline;
use screener::crawler::Crawler;
use screener::session::ScreenerSession;
use utils::AppError;

/// Scrapes concall transcripts and archives them in Google Drive,
/// organized by fiscal year and quarter. Runs with zero flags; everything
/// below is an optional override of the environment-driven configuration.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Destination Drive folder id (default: DRIVE_FOLDER_ID env var)
    #[arg(long)]
    folder_id: Option<String>,

    /// Path to a service account JSON key (default: GOOGLE_CREDENTIALS_FILE)
    #[arg(long)]
    credentials_file: Option<PathBuf>,

    /// Delay between successive downloads, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Hard cap on transcripts-listing pages
    #[arg(long)]
    max_pages: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging();

    // 2. Parse CLI arguments and assemble the configuration
    let args = Args::parse();
    let cfg = Config::from_env(
        args.folder_id,
        args.credentials_file,
        args.delay_ms,
        args.max_pages,
    )?;
    tracing::info!("Starting transcript archiver (destination: {})", cfg.drive_folder_id);

    // 3. Initialize collaborators: site session and Drive client.
    //    Credential problems abort here, before any scraping starts.
    let session = ScreenerSession::new(&cfg)?;
    let drive = DriveClient::connect(&cfg).await?;

    // 4. Log in to the source site (fatal on failure)
    session.login(&cfg.username, &cfg.password).await?;

    // 5. Crawl the listing for transcript descriptors
    let crawler = Crawler::new(&session, &cfg);
    let descriptors = crawler.crawl().await?;
    tracing::info!("Total transcripts to process: {}", descriptors.len());

    // 6. Fetch and store, sequentially and idempotently
    let clock = SystemClock;
    let fetch_store = FetchStorePipeline::new(&session, &drive, &clock, &cfg);
    let stats = fetch_store.run(&descriptors).await;

    // 7. Final summary
    tracing::info!("Downloaded: {}", stats.downloaded);
    tracing::info!("Skipped (already exists): {}", stats.skipped);
    tracing::info!("Failed: {}", stats.failed);
    tracing::info!("Google Drive folder: {}", cfg.drive_folder_url());

    Ok(())
}
