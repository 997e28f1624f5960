use std::path::Path;

use anyhow::{Context, Result, bail, ensure};
use futures_util::{Stream, StreamExt as _};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Url;
use tokio::{fs::File, io::AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::storage::part_path;

fn bytes_progress_bar(len: Option<u64>) -> ProgressBar {
    let Some(len) = len else {
        return ProgressBar::hidden();
    };
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template(
        "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})",
    ) {
        pb.set_style(style);
    }
    pb
}

fn segments_progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template(
        "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} segments ({eta})",
    ) {
        pb.set_style(style);
    }
    pb
}

/// Downloads a single progressive video file
///
/// Returns `false` if the server refused the request
///
/// # Errors
/// Errors on network failure, filesystem errors or cancellation
#[instrument(skip(client, ct))]
pub async fn download_video(
    client: &reqwest::Client,
    url: &Url,
    path: &Path,
    ct: &CancellationToken,
) -> Result<bool> {
    let res = cancellable(ct, client.get(url.clone()).send())
        .await?
        .context("Requesting video")?;

    if !res.status().is_success() {
        warn!("Unable to download video from {url} (status {})", res.status());
        return Ok(false);
    }

    let len = res.content_length();
    save_stream(res.bytes_stream(), len, path, ct).await?;

    info!("Video successfully downloaded from {url}");
    Ok(true)
}

/// Resolves `fut` unless the token is cancelled first
async fn cancellable<F: Future>(ct: &CancellationToken, fut: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        () = ct.cancelled() => bail!("Download cancelled"),
        out = fut => Ok(out),
    }
}

/// Writes a body stream to the `.part` sibling of `path`, then moves it into place
async fn save_stream<S, T, E>(
    stream: S,
    len: Option<u64>,
    path: &Path,
    ct: &CancellationToken,
) -> Result<()>
where
    S: Stream<Item = Result<T, E>>,
    T: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    let part = part_path(path);
    let result = write_stream(stream, len, &part, ct).await;
    finish_part(result, &part, path).await
}

async fn write_stream<S, T, E>(
    stream: S,
    len: Option<u64>,
    part: &Path,
    ct: &CancellationToken,
) -> Result<()>
where
    S: Stream<Item = Result<T, E>>,
    T: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    let pb = bytes_progress_bar(len);
    let mut file = File::create(part)
        .await
        .with_context(|| format!("Creating {}", part.display()))?;
    let mut stream = std::pin::pin!(stream);

    loop {
        let next = match cancellable(ct, stream.next()).await {
            Ok(next) => next,
            Err(e) => {
                pb.abandon();
                return Err(e);
            }
        };
        let Some(data) = next else {
            break;
        };
        let data = data.context("Downloading video stream")?;
        let data = data.as_ref();
        file.write_all(data).await.context("Writing video data")?;
        pb.inc(data.len() as u64);
    }

    file.flush().await.context("Flushing video file")?;
    pb.finish_and_clear();
    Ok(())
}

/// Fetches every segment in order and concatenates them into one file
///
/// # Errors
/// Errors when any segment fails, on filesystem errors or cancellation
#[instrument(skip(client, segment_urls, ct), fields(segments = segment_urls.len()))]
pub async fn download_video_in_chunks(
    client: &reqwest::Client,
    segment_urls: &[Url],
    path: &Path,
    ct: &CancellationToken,
) -> Result<()> {
    ensure!(!segment_urls.is_empty(), "Playlist has no segments");
    info!("Found {} segments to download!", segment_urls.len());

    let part = part_path(path);
    let result = append_segments(client, segment_urls, &part, ct).await;
    finish_part(result, &part, path).await
}

async fn append_segments(
    client: &reqwest::Client,
    segment_urls: &[Url],
    part: &Path,
    ct: &CancellationToken,
) -> Result<()> {
    let pb = segments_progress_bar(segment_urls.len());
    let mut file = File::create(part)
        .await
        .with_context(|| format!("Creating {}", part.display()))?;

    for url in segment_urls {
        debug!("Processing fragment url {url}");

        let res = cancellable(ct, client.get(url.clone()).send())
            .await
            .inspect_err(|_| pb.abandon())?
            .with_context(|| format!("Fetching segment {url}"))?;
        ensure!(
            res.status().is_success(),
            "Segment {url} answered {}",
            res.status()
        );

        let mut res_stream = res.bytes_stream();
        while let Some(data) = cancellable(ct, res_stream.next())
            .await
            .inspect_err(|_| pb.abandon())?
        {
            let data = data.with_context(|| format!("Downloading segment {url}"))?;
            file.write_all(&data).await.context("Writing segment data")?;
        }
        pb.inc(1);
    }

    file.flush().await.context("Flushing video file")?;
    pb.finish_and_clear();
    Ok(())
}

/// Moves a finished `.part` file into place, or removes it on failure
async fn finish_part(result: Result<()>, part: &Path, path: &Path) -> Result<()> {
    if let Err(e) = result {
        if let Err(rm) = tokio::fs::remove_file(part).await {
            debug!("Unable to remove {}: {rm}", part.display());
        }
        return Err(e);
    }

    tokio::fs::rename(part, path)
        .await
        .with_context(|| format!("Moving {} into place", path.display()))
}
