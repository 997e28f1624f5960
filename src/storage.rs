use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Video extensions that count as a finished download
pub const VIDEO_EXTENSIONS: [&str; 2] = ["mp4", "ts"];

/// On-disk layout: `<root>/<channel>/<document_id>/<document_id>-video.<ext>`
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn channel_dir(&self, channel: &str) -> PathBuf {
        self.root.join(channel)
    }

    #[must_use]
    pub fn film_dir(&self, channel: &str, document_id: &str) -> PathBuf {
        self.channel_dir(channel).join(document_id)
    }

    #[must_use]
    pub fn video_path(&self, channel: &str, document_id: &str, extension: &str) -> PathBuf {
        self.film_dir(channel, document_id)
            .join(format!("{document_id}-video.{extension}"))
    }

    #[must_use]
    pub fn subtitles_path(&self, channel: &str, document_id: &str) -> PathBuf {
        self.film_dir(channel, document_id)
            .join(format!("{document_id}-subtitles.txt"))
    }

    /// A film is done once any of its video files exists
    pub async fn is_downloaded(&self, channel: &str, document_id: &str) -> bool {
        for ext in VIDEO_EXTENSIONS {
            let path = self.video_path(channel, document_id, ext);
            if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
                return true;
            }
        }
        false
    }

    /// # Errors
    /// Errors when the directory cannot be created
    pub async fn ensure_channel_dir(&self, channel: &str) -> Result<PathBuf> {
        let dir = self.channel_dir(channel);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Creating channel directory {}", dir.display()))?;
        Ok(dir)
    }

    /// # Errors
    /// Errors when the directory cannot be created
    pub async fn ensure_film_dir(&self, channel: &str, document_id: &str) -> Result<PathBuf> {
        let dir = self.film_dir(channel, document_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Creating film directory {}", dir.display()))?;
        Ok(dir)
    }
}

/// Sibling path a download is written to before being renamed into place
#[must_use]
pub fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let storage = Storage::new("/videos");
        assert_eq!(
            storage.video_path("ONE", "123", "mp4"),
            PathBuf::from("/videos/ONE/123/123-video.mp4")
        );
        assert_eq!(
            storage.subtitles_path("ONE", "123"),
            PathBuf::from("/videos/ONE/123/123-subtitles.txt")
        );
        assert_eq!(
            part_path(Path::new("/videos/ONE/123/123-video.ts")),
            PathBuf::from("/videos/ONE/123/123-video.ts.part")
        );
    }

    #[tokio::test]
    async fn downloaded_when_any_video_extension_exists() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());

        storage.ensure_film_dir("ONE", "1").await.unwrap();
        storage.ensure_film_dir("ONE", "2").await.unwrap();
        assert!(!storage.is_downloaded("ONE", "1").await);

        std::fs::write(storage.video_path("ONE", "1", "ts"), b"x").unwrap();
        std::fs::write(storage.subtitles_path("ONE", "2"), b"x").unwrap();
        std::fs::write(part_path(&storage.video_path("ONE", "2", "mp4")), b"x").unwrap();

        assert!(storage.is_downloaded("ONE", "1").await);
        assert!(!storage.is_downloaded("ONE", "2").await);
    }

    #[tokio::test]
    async fn ensure_dirs_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());

        let first = storage.ensure_channel_dir("Das Erste").await.unwrap();
        let second = storage.ensure_channel_dir("Das Erste").await.unwrap();
        assert_eq!(first, second);
        assert!(first.is_dir());
    }

    #[tokio::test]
    async fn directory_named_like_a_video_is_not_a_download() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());

        std::fs::create_dir_all(storage.video_path("ONE", "3", "mp4")).unwrap();
        assert!(!storage.is_downloaded("ONE", "3").await);
    }
}
