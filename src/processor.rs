use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::Url;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::{
    crawler::{Film, FilmRegistry},
    download::{download_video, download_video_in_chunks},
    ffmpeg,
    mediathek::{
        api::{get_film_description, get_media_info, get_player_config},
        cdn::{get_master_playlist, get_media_playlist, segment_urls, select_index_variant},
        utils::normalize_stream_url,
    },
    storage::Storage,
    subtitles::download_subtitles,
    util::take_break,
};

#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub base_url: Url,
    /// Skip the progressive download and go straight for the HLS segments
    pub chunks: bool,
    pub break_duration: Duration,
    /// Remux segmented downloads into MP4 with ffmpeg
    pub remux: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub attempted: usize,
    pub succeeded: usize,
    /// No downloadable stream was offered, most likely geo-blocking
    pub unavailable: usize,
    pub failed: usize,
}

impl RunSummary {
    /// Every attempted film was either downloaded or not offered at all
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Downloaded,
    Unavailable,
}

/// Downloads every film of the registry that isn't on disk yet
///
/// # Errors
/// Only errors when the run gets cancelled; per-film failures are logged and counted
pub async fn process_videos(
    client: &reqwest::Client,
    films: &FilmRegistry,
    storage: &Storage,
    options: &ProcessOptions,
    ct: &CancellationToken,
) -> Result<RunSummary> {
    info!("Processing videos...");
    info!("{} urls received", films.len());
    let downloaded = films.downloaded_count();
    let to_download = films.len() - downloaded;
    info!("{downloaded} urls already downloaded");
    info!("Attempting to download {to_download} urls");

    let mut summary = RunSummary::default();
    for (i, film) in films.pending().enumerate() {
        if ct.is_cancelled() {
            bail!("Run cancelled");
        }
        info!("{}/{to_download}", i + 1);
        summary.attempted += 1;

        match process_film(client, film, storage, options, ct).await {
            Ok(Outcome::Downloaded) => summary.succeeded += 1,
            Ok(Outcome::Unavailable) => summary.unavailable += 1,
            Err(e) if ct.is_cancelled() => {
                return Err(e.context(format!("Processing {}", film.url)));
            }
            Err(e) => {
                error!("Unable to process {}: {e:#}", film.url);
                summary.failed += 1;
            }
        }
    }

    info!(
        "Run finished: {} attempted, {} downloaded, {} unavailable, {} failed",
        summary.attempted, summary.succeeded, summary.unavailable, summary.failed
    );
    Ok(summary)
}

#[instrument(skip_all, fields(document_id = %film.document_id, channel = %film.channel))]
async fn process_film(
    client: &reqwest::Client,
    film: &Film,
    storage: &Storage,
    options: &ProcessOptions,
    ct: &CancellationToken,
) -> Result<Outcome> {
    storage
        .ensure_film_dir(&film.channel, &film.document_id)
        .await?;
    info!("Processing video for url {}", film.url);

    let description = get_film_description(client, &film.url)
        .await
        .context("Getting film description")?;

    if !options.chunks
        && download_progressive(client, film, &description, storage, options, ct).await?
    {
        take_break(options.break_duration, ct).await;
        return Ok(Outcome::Downloaded);
    }

    warn!(
        "Unable to download video in one file or chunks set to true. Downloading video in chunks without subtitles"
    );
    download_segmented(client, film, storage, options, ct).await
}

/// Subtitles plus the best progressive stream
///
/// Returns `false` when the progressive stream isn't available
async fn download_progressive(
    client: &reqwest::Client,
    film: &Film,
    description: &str,
    storage: &Storage,
    options: &ProcessOptions,
    ct: &CancellationToken,
) -> Result<bool> {
    let media = match get_media_info(client, &options.base_url, &film.document_id).await {
        Ok(m) => m,
        Err(e) => {
            warn!("Media info unavailable for {}: {e:#}", film.url);
            return Ok(false);
        }
    };

    if media.geoblocked {
        warn!("Geoblocked, may have problems downloading media");
    }

    if let Some(subtitle_url) = media.subtitle_url() {
        info!(
            "Downloading subtitles from {subtitle_url} for url {}",
            film.url
        );
        let subtitles_path = storage.subtitles_path(&film.channel, &film.document_id);
        let res = match normalize_stream_url(subtitle_url) {
            Ok(url) => {
                download_subtitles(client, &url, &subtitles_path, &film.title, description).await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = res {
            warn!("Unable to download subtitles for {}: {e:#}", film.url);
        }
    } else {
        info!("Subtitles unavailable for url {}", film.url);
    }

    let Some((quality, stream)) = media.best_stream() else {
        info!("No progressive stream for url {}", film.url);
        return Ok(false);
    };

    let video_path = storage.video_path(&film.channel, &film.document_id, "mp4");
    let res = match normalize_stream_url(stream) {
        Ok(stream) => {
            info!(
                "Downloading video from {stream} (quality {quality}) for url {}",
                film.url
            );
            download_video(client, &stream, &video_path, ct).await
        }
        Err(e) => Err(e),
    };

    match res {
        Ok(downloaded) => Ok(downloaded),
        Err(e) if ct.is_cancelled() => Err(e),
        Err(e) => {
            warn!("Progressive download failed for {}: {e:#}", film.url);
            Ok(false)
        }
    }
}

/// Rebuilds the video from the HLS segments of the broadcast's index playlist
async fn download_segmented(
    client: &reqwest::Client,
    film: &Film,
    storage: &Storage,
    options: &ProcessOptions,
    ct: &CancellationToken,
) -> Result<Outcome> {
    let config = get_player_config(client, &options.base_url, &film.document_id)
        .await
        .context("Getting player config")?;
    let Some(asset_id) = config.asset_id() else {
        warn!("Player config of {} has no asset id", film.url);
        return Ok(Outcome::Unavailable);
    };
    let master_url = normalize_stream_url(asset_id)?;

    let master = get_master_playlist(client, &master_url).await?;
    let Some(index_url) = select_index_variant(&master, &master_url) else {
        warn!(
            "Unable to download video in chunks (possible that streaming is geo-blocked) for {}",
            film.url
        );
        return Ok(Outcome::Unavailable);
    };

    info!("Downloading video from {index_url} for {}", film.url);
    let media = get_media_playlist(client, &index_url).await?;
    let segments = segment_urls(&media, &index_url);

    let ts_path = storage.video_path(&film.channel, &film.document_id, "ts");
    download_video_in_chunks(client, &segments, &ts_path, ct).await?;

    if options.remux {
        remux(&ts_path, &storage.video_path(&film.channel, &film.document_id, "mp4")).await;
    }

    take_break(options.break_duration, ct).await;
    Ok(Outcome::Downloaded)
}

/// Best effort; a failed remux keeps the `.ts`, which still counts as downloaded
async fn remux(ts_path: &std::path::Path, mp4_path: &std::path::Path) {
    if !ffmpeg::is_installed().await {
        warn!("ffmpeg is not installed, keeping {}", ts_path.display());
        return;
    }

    match ffmpeg::remux_to_mp4(ts_path, mp4_path).await {
        Ok(()) => {
            if let Err(e) = tokio::fs::remove_file(ts_path).await {
                warn!("Unable to remove {}: {e}", ts_path.display());
            }
            info!("Remuxed into {}", mp4_path.display());
        }
        Err(e) => {
            warn!("Unable to remux {}: {e:#}", ts_path.display());
            tokio::fs::remove_file(mp4_path).await.ok();
        }
    }
}
