use std::collections::BTreeMap;

use anyhow::{Result, bail};
use chrono::{Days, Local, NaiveDate};
use reqwest::Url;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::{
    channels::ChannelRegistry,
    mediathek::{
        Teaser,
        listing::{fetch_listing, parse_listing},
    },
    storage::Storage,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Film {
    pub url: Url,
    pub title: String,
    pub document_id: String,
    pub channel: String,
    /// Day of the listing the film was found on
    pub broadcast_day: NaiveDate,
    pub downloaded: bool,
}

/// Films found during a run, keyed by film page URL
#[derive(Debug, Default)]
pub struct FilmRegistry {
    films: BTreeMap<String, Film>,
}

impl FilmRegistry {
    /// Adds a film; a URL seen before is kept as first found
    pub fn insert(&mut self, film: Film) -> bool {
        let key = film.url.to_string();
        if self.films.contains_key(&key) {
            return false;
        }
        self.films.insert(key, film);
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.films.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.films.is_empty()
    }

    #[must_use]
    pub fn downloaded_count(&self) -> usize {
        self.films.values().filter(|f| f.downloaded).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Film> {
        self.films.values()
    }

    pub fn pending(&self) -> impl Iterator<Item = &Film> {
        self.films.values().filter(|f| !f.downloaded)
    }
}

/// Turns a listing's teasers into films, dropping everything that isn't one
pub async fn collect_films(
    registry: &mut FilmRegistry,
    teasers: Vec<Teaser>,
    channel: &str,
    broadcast_day: NaiveDate,
    storage: &Storage,
) {
    for teaser in teasers {
        if !teaser.is_film() {
            debug!("Skipping non-film {}", teaser.url);
            continue;
        }

        info!("Extracted url {}", teaser.url);
        let downloaded = storage.is_downloaded(channel, &teaser.document_id).await;
        if downloaded {
            info!("Film {} already downloaded", teaser.document_id);
        }

        registry.insert(Film {
            url: teaser.url,
            title: teaser.title,
            document_id: teaser.document_id,
            channel: channel.to_string(),
            broadcast_day,
            downloaded,
        });
    }
}

/// Crawls the last `days` listing pages of every channel for subtitled films
///
/// # Errors
/// Errors on network failure, filesystem errors or cancellation
#[instrument(skip_all, fields(channels = channels.len(), days = days))]
pub async fn get_films(
    client: &reqwest::Client,
    base_url: &Url,
    channels: &ChannelRegistry,
    storage: &Storage,
    days: u32,
    ct: &CancellationToken,
) -> Result<FilmRegistry> {
    info!("Extracting subtitled films...");
    let today = Local::now().date_naive();
    let mut registry = FilmRegistry::default();

    for (channel, entry) in channels.iter() {
        info!("Searching channel {channel}");
        storage.ensure_channel_dir(channel).await?;

        for day in 0..days {
            if ct.is_cancelled() {
                bail!("Crawl cancelled");
            }

            let Some(html) = fetch_listing(client, base_url, &entry.id, day).await? else {
                continue;
            };
            let broadcast_day = today
                .checked_sub_days(Days::new(day.into()))
                .unwrap_or(today);

            let teasers = parse_listing(&html, base_url);
            collect_films(&mut registry, teasers, channel, broadcast_day, storage).await;
        }
    }

    info!("{} films found", registry.len());
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    use super::*;
    use crate::mediathek::listing::tests::LISTING_HTML;

    fn film(url: &str, downloaded: bool) -> Film {
        Film {
            url: Url::parse(url).unwrap(),
            title: "Titel".to_string(),
            document_id: "1".to_string(),
            channel: "ONE".to_string(),
            broadcast_day: NaiveDate::from_ymd_opt(2018, 3, 1).unwrap(),
            downloaded,
        }
    }

    #[test]
    fn registry_is_unique_by_url() {
        let mut registry = FilmRegistry::default();
        assert!(registry.insert(film("http://h/tv/Film/a?documentId=1", false)));
        assert!(!registry.insert(film("http://h/tv/Film/a?documentId=1", true)));
        assert!(registry.insert(film("http://h/tv/Film/b?documentId=2", true)));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.downloaded_count(), 1);
        assert_eq!(registry.pending().count(), 1);
    }

    #[tokio::test]
    async fn crawl_collects_films_and_marks_downloaded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tv/sendungVerpasst"))
            .and(query_param("tag", "0"))
            .and(query_param("kanal", "208"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LISTING_HTML))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tv/sendungVerpasst"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());
        storage.ensure_film_dir("Das Erste", "1001").await.unwrap();
        std::fs::write(storage.video_path("Das Erste", "1001", "mp4"), b"x").unwrap();

        let channels = ChannelRegistry::from_json(r#"{"Das Erste": {"id": "208"}}"#).unwrap();
        let base = Url::parse(&server.uri()).unwrap();
        let films = get_films(
            &reqwest::Client::new(),
            &base,
            &channels,
            &storage,
            3,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        // Only the film teaser survives, the subtitled news teaser does not
        assert_eq!(films.len(), 1);
        let film = films.iter().next().unwrap();
        assert_eq!(film.document_id, "1001");
        assert_eq!(film.title, "Der Fall");
        assert_eq!(film.channel, "Das Erste");
        assert!(film.downloaded);
        assert!(storage.channel_dir("Das Erste").is_dir());
    }
}
