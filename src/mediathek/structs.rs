use serde::Deserialize;

/// Response of `/play/media/{documentId}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaInfo {
    #[serde(rename = "_geoblocked", default)]
    pub geoblocked: bool,
    #[serde(rename = "_subtitleUrl", default)]
    pub subtitle_url: Option<String>,
    #[serde(rename = "_mediaArray", default)]
    pub media_array: Vec<MediaGroup>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaGroup {
    #[serde(rename = "_mediaStreamArray", default)]
    pub streams: Vec<MediaStream>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaStream {
    #[serde(rename = "_quality")]
    pub quality: Quality,
    #[serde(rename = "_stream")]
    pub stream: StreamSource,
}

/// Either a numeric bitrate level or a named one such as `"auto"`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Quality {
    Level(u32),
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StreamSource {
    Single(String),
    Multiple(Vec<String>),
}

impl StreamSource {
    /// Mirrors are listed in order; the last one is used
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Single(url) => Some(url),
            Self::Multiple(urls) => urls.last().map(String::as_str),
        }
    }
}

impl MediaInfo {
    /// Subtitle URL, treating an empty string as unavailable
    #[must_use]
    pub fn subtitle_url(&self) -> Option<&str> {
        self.subtitle_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    /// Picks the stream with the highest numeric quality, skipping named ones
    /// (`"auto"`). The first stream wins on ties.
    ///
    /// Returns `(quality, url)`
    #[must_use]
    pub fn best_stream(&self) -> Option<(u32, &str)> {
        let mut best: Option<(u32, &str)> = None;

        for stream in self.media_array.iter().flat_map(|g| &g.streams) {
            let Quality::Level(level) = stream.quality else {
                continue;
            };
            let Some(url) = stream.stream.url() else {
                continue;
            };
            if best.is_none_or(|(best_level, _)| level > best_level) {
                best = Some((level, url));
            }
        }

        best
    }
}

/// Response of `/play/config/{documentId}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerConfig {
    #[serde(rename = "_pixelConfig", default)]
    pub pixel_config: Vec<PixelConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PixelConfig {
    #[serde(rename = "agfMetaDataSDK")]
    pub agf_metadata: Option<AgfMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgfMetadata {
    /// HLS master playlist of the broadcast
    #[serde(rename = "assetid")]
    pub asset_id: Option<String>,
}

impl PlayerConfig {
    #[must_use]
    pub fn asset_id(&self) -> Option<&str> {
        self.pixel_config
            .first()?
            .agf_metadata
            .as_ref()?
            .asset_id
            .as_deref()
            .filter(|a| !a.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEDIA_JSON: &str = r#"{
        "_type": "video",
        "_isLive": false,
        "_defaultQuality": ["auto", 1, 2, 3],
        "_subtitleUrl": "https://www.ardmediathek.de/subtitle/410000",
        "_mediaArray": [
            {
                "_plugin": 0,
                "_mediaStreamArray": [
                    {"_quality": "auto", "_server": "", "_cdn": "akamai", "_stream": "https://host/master.m3u8"}
                ]
            },
            {
                "_plugin": 1,
                "_mediaStreamArray": [
                    {"_quality": 0, "_stream": "//host/low.mp4"},
                    {"_quality": 3, "_stream": ["//mirror-a/hd.mp4", "//mirror-b/hd.mp4"]},
                    {"_quality": 2, "_stream": "//host/mid.mp4"},
                    {"_quality": 3, "_stream": "//host/hd-duplicate.mp4"}
                ]
            }
        ],
        "_geoblocked": true
    }"#;

    #[test]
    fn picks_highest_numeric_quality() {
        let media: MediaInfo = serde_json::from_str(MEDIA_JSON).unwrap();
        assert!(media.geoblocked);
        assert_eq!(
            media.subtitle_url(),
            Some("https://www.ardmediathek.de/subtitle/410000")
        );
        assert_eq!(media.best_stream(), Some((3, "//mirror-b/hd.mp4")));
    }

    #[test]
    fn auto_only_has_no_best_stream() {
        let media: MediaInfo = serde_json::from_str(
            r#"{"_mediaArray": [{"_mediaStreamArray": [{"_quality": "auto", "_stream": "x.m3u8"}]}]}"#,
        )
        .unwrap();
        assert_eq!(media.best_stream(), None);
        assert!(!media.geoblocked);
    }

    #[test]
    fn empty_subtitle_url_is_unavailable() {
        let media: MediaInfo =
            serde_json::from_str(r#"{"_subtitleUrl": "", "_mediaArray": []}"#).unwrap();
        assert_eq!(media.subtitle_url(), None);

        let media: MediaInfo = serde_json::from_str(r#"{"_subtitleUrl": null}"#).unwrap();
        assert_eq!(media.subtitle_url(), None);
    }

    #[test]
    fn empty_mirror_list_is_skipped() {
        let media: MediaInfo = serde_json::from_str(
            r#"{"_mediaArray": [{"_mediaStreamArray": [
                {"_quality": 4, "_stream": []},
                {"_quality": 1, "_stream": "//host/sd.mp4"}
            ]}]}"#,
        )
        .unwrap();
        assert_eq!(media.best_stream(), Some((1, "//host/sd.mp4")));
    }

    #[test]
    fn asset_id_from_player_config() {
        let config: PlayerConfig = serde_json::from_str(
            r#"{"_pixelConfig": [{"agfMetaDataSDK": {"assetid": "//host/master.m3u8", "type": "content"}}]}"#,
        )
        .unwrap();
        assert_eq!(config.asset_id(), Some("//host/master.m3u8"));

        let config: PlayerConfig = serde_json::from_str(r#"{"_pixelConfig": []}"#).unwrap();
        assert_eq!(config.asset_id(), None);
    }
}
