use anyhow::{Context, Result, anyhow, ensure};
use m3u8_rs::{MasterPlaylist, MediaPlaylist, VariantStream};
use reqwest::Url;
use tracing::{debug, info, instrument};

/// Fetches the broadcast's master .m3u8 file
///
/// # Errors
/// Errors on network failure, non-success status or an unparseable playlist
#[instrument(skip(client))]
pub async fn get_master_playlist(client: &reqwest::Client, url: &Url) -> Result<MasterPlaylist> {
    let res = client
        .get(url.clone())
        .send()
        .await
        .context("Fetching master playlist")?;
    ensure!(
        res.status().is_success(),
        "Master playlist answered {}",
        res.status()
    );
    let body = res.bytes().await.context("Decoding master playlist")?;

    let playlist = m3u8_rs::parse_master_playlist_res(&body)
        .map_err(|_| anyhow!("Unable to parse master playlist {url}"))?;
    info!(
        "Available qualities: {}",
        playlist
            .variants
            .iter()
            .map(|v| v
                .resolution
                .map_or("Unknown resolution".to_string(), |r| r.to_string()))
            .collect::<Vec<String>>()
            .join(", ")
    );

    Ok(playlist)
}

/// Picks the audio+video index playlist to download from a master playlist
///
/// Among `index*av.m3u8` variants the one with the highest bandwidth wins,
/// the first one on ties
#[must_use]
pub fn select_index_variant(master: &MasterPlaylist, master_url: &Url) -> Option<Url> {
    let mut best: Option<(&VariantStream, Url)> = None;

    for variant in master.variants.iter().filter(|v| !v.is_i_frame) {
        let Ok(url) = master_url.join(variant.uri.trim()) else {
            debug!("Skipping invalid variant uri {}", variant.uri);
            continue;
        };
        if !is_index_playlist(&url) {
            continue;
        }
        if best
            .as_ref()
            .is_none_or(|(b, _)| variant.bandwidth > b.bandwidth)
        {
            best = Some((variant, url));
        }
    }

    best.map(|(_, url)| url)
}

fn is_index_playlist(url: &Url) -> bool {
    let url = url.as_str();
    url.starts_with("http") && url.contains("index") && url.contains("av.m3u8")
}

/// Fetches a stream variant media playlist
///
/// # Errors
/// Errors on network failure, non-success status or an unparseable playlist
#[instrument(skip(client))]
pub async fn get_media_playlist(client: &reqwest::Client, url: &Url) -> Result<MediaPlaylist> {
    let res = client
        .get(url.clone())
        .send()
        .await
        .context("Fetching media playlist")?;
    ensure!(
        res.status().is_success(),
        "Media playlist answered {}",
        res.status()
    );
    let body = res.bytes().await.context("Decoding media playlist")?;

    m3u8_rs::parse_media_playlist_res(&body)
        .map_err(|_| anyhow!("Unable to parse media playlist {url}"))
}

/// Resolves the playlist's segment URIs, in playback order
///
/// Only resolved URLs containing `segment` are kept, which drops inserted ads
#[must_use]
pub fn segment_urls(media: &MediaPlaylist, media_url: &Url) -> Vec<Url> {
    media
        .segments
        .iter()
        .filter_map(|s| match media_url.join(s.uri.trim()) {
            Ok(url) => Some(url),
            Err(e) => {
                debug!("Skipping invalid segment uri {} ({e})", s.uri);
                None
            }
        })
        .filter(|url| url.as_str().contains("segment"))
        .collect()
}
