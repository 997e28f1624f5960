use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use reqwest::Url;

pub const DEFAULT_BASE_URL: &str = "http://www.ardmediathek.de";

/// Listing categories that hold films, e.g. `/tv/Filme-im-Ersten/...`
pub static FILM_CATEGORY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)film").unwrap());

/// Marker in the second `|`-separated part of a teaser subtitle
pub const SUBTITLE_MARKER: &str = "UT";

/// Parses a stream URL, assuming `http:` for scheme-less (`//host/...`) URLs
///
/// # Errors
/// Error when the URL is invalid even after adding a scheme
pub fn normalize_stream_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    Url::parse(raw)
        .or_else(|_| Url::parse(&format!("http:{raw}")))
        .with_context(|| format!("Parsing stream URL `{raw}`"))
}

/// Extracts the `documentId` query parameter out of a portal link
#[must_use]
pub fn extract_document_id(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == "documentId")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}
