use std::sync::LazyLock;

use anyhow::{Context, Result, ensure};
use reqwest::Url;
use scraper::{Html, Selector};
use tracing::{instrument, warn};

use super::structs::{MediaInfo, PlayerConfig};

static DESCRIPTION_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#".teaser p[itemprop="description"]"#).unwrap());

/// Fetches a film page and returns its description
///
/// A page without a description yields an empty string
///
/// # Errors
/// Errors on network failure or non-success status
#[instrument(skip(client))]
pub async fn get_film_description(client: &reqwest::Client, film_url: &Url) -> Result<String> {
    let res = client
        .get(film_url.clone())
        .send()
        .await
        .context("Fetching film page")?;
    ensure!(
        res.status().is_success(),
        "Film page answered {}",
        res.status()
    );

    let body = res.text().await.context("Decoding film page")?;
    let description = parse_description(&body);
    if description.is_none() {
        warn!("No description found for {film_url}");
    }

    Ok(description.unwrap_or_default())
}

fn parse_description(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&DESCRIPTION_SELECTOR)
        .next()
        .map(|p| p.text().collect::<String>().trim().to_string())
}

/// Fetches the media info (streams, subtitles, geoblocking) of a document
///
/// # Errors
/// Errors on network failure, non-success status or malformed JSON
#[instrument(skip(client, base_url))]
pub async fn get_media_info(
    client: &reqwest::Client,
    base_url: &Url,
    document_id: &str,
) -> Result<MediaInfo> {
    let url = base_url
        .join(&format!("/play/media/{document_id}"))
        .context("Building media info URL")?;

    let res = client
        .get(url)
        .query(&[("devicetype", "pc"), ("features", "")])
        .send()
        .await
        .context("Fetching media info")?;
    ensure!(
        res.status().is_success(),
        "Media info answered {}",
        res.status()
    );

    res.json::<MediaInfo>()
        .await
        .context("Parsing media info")
}

/// Fetches the player config, which points at the HLS master playlist
///
/// # Errors
/// Errors on network failure, non-success status or malformed JSON
#[instrument(skip(client, base_url))]
pub async fn get_player_config(
    client: &reqwest::Client,
    base_url: &Url,
    document_id: &str,
) -> Result<PlayerConfig> {
    let url = base_url
        .join(&format!("/play/config/{document_id}"))
        .context("Building player config URL")?;

    let res = client
        .get(url)
        .query(&[("devicetype", "pc")])
        .send()
        .await
        .context("Fetching player config")?;
    ensure!(
        res.status().is_success(),
        "Player config answered {}",
        res.status()
    );

    res.json::<PlayerConfig>()
        .await
        .context("Parsing player config")
}
