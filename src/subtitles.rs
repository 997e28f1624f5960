use std::path::Path;

use anyhow::{Context, Result, ensure};
use quick_xml::{Reader, events::Event};
use reqwest::Url;
use tracing::{info, instrument};

const SPAN_TAG: &[u8] = b"tt:span";

/// Collects the text of every `<tt:span>` of a TTML document, one entry per span
///
/// # Errors
/// Errors on malformed XML
pub fn extract_subtitle_lines(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event().context("Reading TTML document")? {
            Event::Start(e) if e.name().as_ref() == SPAN_TAG => depth += 1,
            Event::End(e) if e.name().as_ref() == SPAN_TAG && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    lines.push(std::mem::take(&mut current));
                }
            }
            Event::Empty(e) if e.name().as_ref() == SPAN_TAG && depth == 0 => {
                lines.push(String::new());
            }
            Event::Text(t) if depth > 0 => {
                current.push_str(&t.unescape().context("Unescaping subtitle text")?);
            }
            Event::CData(t) if depth > 0 => {
                current.push_str(&String::from_utf8_lossy(&t));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(lines)
}

/// Subtitle file body: title and description header, then one line per span
#[must_use]
pub fn render_subtitles(title: &str, description: &str, lines: &[String]) -> String {
    let mut out = format!("{title}\n\n{description}\n\n");
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Downloads a TTML subtitle document and stores it as plain text
///
/// # Errors
/// Errors on network failure, malformed XML or when the file can't be written
#[instrument(skip(client, title, description))]
pub async fn download_subtitles(
    client: &reqwest::Client,
    url: &Url,
    path: &Path,
    title: &str,
    description: &str,
) -> Result<()> {
    let res = client
        .get(url.clone())
        .send()
        .await
        .context("Fetching subtitles")?;
    ensure!(
        res.status().is_success(),
        "Subtitles answered {}",
        res.status()
    );
    let body = res.text().await.context("Decoding subtitles")?;

    let lines = extract_subtitle_lines(&body)?;
    tokio::fs::write(path, render_subtitles(title, description, &lines))
        .await
        .with_context(|| format!("Writing subtitles to {}", path.display()))?;

    info!("Subtitles successfully downloaded from {url}");
    Ok(())
}
