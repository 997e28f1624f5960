#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]
#![warn(clippy::perf)]
#![warn(clippy::complexity)]
#![warn(clippy::style)]
#![allow(clippy::multiple_crate_versions)]

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result, bail};
use channels::ChannelRegistry;
use clap::Parser;
use crawler::get_films;
use processor::{ProcessOptions, process_videos};
use reqwest::Url;
use storage::Storage;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use util::{init_http_client, spawn_ct_watcher};

pub mod channels;
pub mod crawler;
pub mod download;
pub mod ffmpeg;
pub mod mediathek;
pub mod processor;
pub mod storage;
pub mod subtitles;
pub mod util;

/// Archives subtitled films of the ARD Mediathek along with their subtitles
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON file mapping channel names to portal identifiers
    #[arg(long, env = "MEDIATHEK_CHANNELS", default_value = "channels.json")]
    channels: PathBuf,

    /// Directory the films are archived into
    #[arg(short, long, env = "MEDIATHEK_OUTPUT_DIR")]
    output_dir: PathBuf,

    /// How many days of listings to crawl, counting back from today
    #[arg(short, long, default_value_t = 7, value_parser = clap::value_parser!(u32).range(1..))]
    days: u32,

    /// Portal base URL
    #[arg(long, env = "MEDIATHEK_BASE_URL", default_value = mediathek::DEFAULT_BASE_URL)]
    base_url: Url,

    /// Skip progressive downloads and rebuild videos from HLS segments
    #[arg(long)]
    chunks: bool,

    /// Seconds to pause after each downloaded film
    #[arg(long, default_value_t = 3)]
    break_secs: u64,

    /// Connect timeout for every request, in seconds
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    /// Remux segmented downloads into MP4 (requires ffmpeg)
    #[arg(long)]
    remux: bool,

    /// Only crawl and report the films found
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if args.remux && !ffmpeg::is_installed().await {
        warn!("--remux given but ffmpeg is not installed, segmented downloads stay .ts");
    }

    let client = init_http_client(Duration::from_secs(args.timeout_secs))?;
    let ct = CancellationToken::new();
    spawn_ct_watcher(ct.clone());

    let channels = ChannelRegistry::load(&args.channels).await?;
    if channels.is_empty() {
        warn!("No channels configured in {}", args.channels.display());
    }

    tokio::fs::create_dir_all(&args.output_dir)
        .await
        .with_context(|| format!("Creating output directory {}", args.output_dir.display()))?;
    let storage = Storage::new(&args.output_dir);
    info!("Archiving into {}", storage.root().display());

    let films = get_films(
        &client,
        &args.base_url,
        &channels,
        &storage,
        args.days,
        &ct,
    )
    .await?;

    if films.is_empty() {
        info!("No subtitled films found");
        return Ok(());
    }

    if args.dry_run {
        for film in films.iter() {
            info!(
                "[{}] {} ({}, {}){}",
                film.broadcast_day,
                film.title,
                film.channel,
                film.document_id,
                if film.downloaded { " - downloaded" } else { "" }
            );
        }
        return Ok(());
    }

    let options = ProcessOptions {
        base_url: args.base_url,
        chunks: args.chunks,
        break_duration: Duration::from_secs(args.break_secs),
        remux: args.remux,
    };
    let summary = process_videos(&client, &films, &storage, &options, &ct).await?;
    if !summary.is_clean() {
        bail!(
            "{} of {} films failed, rerun to retry them",
            summary.failed,
            summary.attempted
        );
    }

    info!("All done successfully!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["mediathek-ut", "-o", "/videos"]).unwrap();
        assert_eq!(args.days, 7);
        assert_eq!(args.break_secs, 3);
        assert_eq!(args.base_url.as_str(), "http://www.ardmediathek.de/");
        assert!(!args.chunks);
    }

    #[test]
    fn zero_days_is_rejected() {
        assert!(Args::try_parse_from(["mediathek-ut", "-o", "/videos", "-d", "0"]).is_err());
    }
}
