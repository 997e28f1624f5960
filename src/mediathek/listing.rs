use std::sync::LazyLock;

use anyhow::{Context, Result};
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

use super::utils::{FILM_CATEGORY_REGEX, SUBTITLE_MARKER, extract_document_id};

static ITEM_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".entries .teaserbox").unwrap());
static TEASER_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".teaser").unwrap());
static SUBTITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".subtitle").unwrap());
static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".mediaCon .media a").unwrap());
static TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a h4").unwrap());

/// A subtitled broadcast scraped off a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Teaser {
    /// Absolute film page URL
    pub url: Url,
    pub title: String,
    pub document_id: String,
}

impl Teaser {
    /// Listing category, the path segment following `/tv/`
    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.url.path_segments()?.nth(1).filter(|c| !c.is_empty())
    }

    #[must_use]
    pub fn is_film(&self) -> bool {
        self.category()
            .is_some_and(|c| FILM_CATEGORY_REGEX.is_match(c))
    }
}

/// # Errors
/// Error when the base URL cannot be joined
pub fn listing_url(base_url: &Url, channel_id: &str, day: u32) -> Result<Url> {
    let mut url = base_url
        .join("/tv/sendungVerpasst")
        .context("Building listing URL")?;
    url.query_pairs_mut()
        .append_pair("tag", &day.to_string())
        .append_pair("kanal", channel_id);
    Ok(url)
}

/// Fetches a channel's "missed broadcasts" page for a day offset
///
/// Returns `None` when the portal answers with a non-success status
///
/// # Errors
/// Errors on network failure
#[instrument(skip(client, base_url))]
pub async fn fetch_listing(
    client: &reqwest::Client,
    base_url: &Url,
    channel_id: &str,
    day: u32,
) -> Result<Option<String>> {
    let url = listing_url(base_url, channel_id, day)?;
    let res = client
        .get(url)
        .send()
        .await
        .context("Fetching listing page")?;

    if !res.status().is_success() {
        debug!("Listing page answered {}, skipping", res.status());
        return Ok(None);
    }

    let body = res.text().await.context("Decoding listing page")?;
    Ok(Some(body))
}

/// Scrapes every subtitled teaser out of a listing page
#[must_use]
pub fn parse_listing(html: &str, base_url: &Url) -> Vec<Teaser> {
    let document = Html::parse_document(html);

    document
        .select(&ITEM_SELECTOR)
        .flat_map(|item| item.select(&TEASER_SELECTOR))
        .filter(|teaser| has_subtitle_marker(*teaser))
        .filter_map(|teaser| parse_teaser(teaser, base_url))
        .collect()
}

fn has_subtitle_marker(teaser: ElementRef<'_>) -> bool {
    let Some(subtitle) = teaser.select(&SUBTITLE_SELECTOR).next() else {
        return false;
    };
    let text = subtitle.text().collect::<String>();
    text.split('|')
        .nth(1)
        .is_some_and(|part| part.contains(SUBTITLE_MARKER))
}

fn parse_teaser(teaser: ElementRef<'_>, base_url: &Url) -> Option<Teaser> {
    let Some(href) = teaser
        .select(&LINK_SELECTOR)
        .next()
        .and_then(|a| a.value().attr("href"))
    else {
        debug!("Subtitled teaser without media link, skipping");
        return None;
    };

    let url = match base_url.join(href) {
        Ok(url) => url,
        Err(e) => {
            debug!("Teaser link `{href}` is invalid ({e}), skipping");
            return None;
        }
    };

    let Some(title) = teaser.select(&TITLE_SELECTOR).next() else {
        debug!("Teaser {url} has no title, skipping");
        return None;
    };
    let title = title.text().collect::<String>().trim().to_string();

    let Some(document_id) = extract_document_id(&url) else {
        debug!("Teaser {url} has no documentId, skipping");
        return None;
    };

    Some(Teaser {
        url,
        title,
        document_id,
    })
}
