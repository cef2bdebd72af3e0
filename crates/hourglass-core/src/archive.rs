//! Best-effort drawing archive
//!
//! Submitted drawings and the narrative returned for them are kept for
//! audit. Archiving never influences the puzzle outcome: the service logs
//! and discards any `ArchiveError`.

use crate::error::ArchiveError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

const DATA_URL_PREFIX: &str = "data:image/";
const BASE64_MARKER: &str = ";base64,";

/// A decoded `data:image/<format>;base64,<payload>` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrlImage {
    /// Lower-cased image format (`png`, `jpeg`, ...)
    pub format: String,
    /// Base64 payload, still encoded
    pub payload: String,
}

impl DataUrlImage {
    /// Split a data URL into format and payload
    ///
    /// # Errors
    /// - `ArchiveError::InvalidDataUrl` if `raw` is not an image data URL
    pub fn parse(raw: &str) -> Result<Self, ArchiveError> {
        let (format, payload) = raw
            .trim()
            .strip_prefix(DATA_URL_PREFIX)
            .and_then(|rest| rest.split_once(BASE64_MARKER))
            .ok_or(ArchiveError::InvalidDataUrl)?;
        let well_formed = !format.is_empty()
            && format.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !payload.is_empty();
        if !well_formed {
            return Err(ArchiveError::InvalidDataUrl);
        }
        Ok(Self {
            format: format.to_ascii_lowercase(),
            payload: payload.to_string(),
        })
    }

    /// MIME type for the format; unknown formats fall back to PNG
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        match self.format.as_str() {
            "jpeg" | "jpg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            _ => "image/png",
        }
    }

    /// Decode the payload
    ///
    /// # Errors
    /// - `ArchiveError::Decode` if the payload is not valid base64
    pub fn decode(&self) -> Result<Vec<u8>, ArchiveError> {
        STANDARD
            .decode(self.payload.as_bytes())
            .map_err(|e| ArchiveError::Decode(e.to_string()))
    }
}

/// Where drawings go after classification
#[async_trait]
pub trait DrawingArchive: Send + Sync + Debug {
    /// Persist the drawing and the narrative returned for it
    async fn archive(&self, image_data: &str, response: &str) -> Result<(), ArchiveError>;
}

/// Archive that keeps nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopArchive;

#[async_trait]
impl DrawingArchive for NoopArchive {
    async fn archive(&self, _image_data: &str, _response: &str) -> Result<(), ArchiveError> {
        Ok(())
    }
}

/// Archive writing under `<root>/data/`
///
/// Each submission produces `<stamp>_drawing.<format>` and
/// `<stamp>_response.txt`, where `<stamp>` is `YYYYmmdd-HHMMSS` (UTC).
#[derive(Debug, Clone)]
pub struct FsDrawingArchive {
    root: PathBuf,
}

impl FsDrawingArchive {
    /// Archive rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Archive root
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl DrawingArchive for FsDrawingArchive {
    async fn archive(&self, image_data: &str, response: &str) -> Result<(), ArchiveError> {
        let image = DataUrlImage::parse(image_data)?;
        let bytes = image.decode()?;

        let dir = self.root.join("data");
        tokio::fs::create_dir_all(&dir).await?;

        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let drawing = dir.join(format!("{stamp}_drawing.{}", image.format));
        tokio::fs::write(&drawing, &bytes).await?;
        tokio::fs::write(dir.join(format!("{stamp}_response.txt")), response).await?;

        tracing::debug!(
            path = %drawing.display(),
            content_type = image.content_type(),
            bytes = bytes.len(),
            "archived drawing"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 transparent PNG
    const PIXEL: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

    #[test]
    fn parses_data_url() {
        let image = DataUrlImage::parse(&format!("data:image/PNG;base64,{PIXEL}")).unwrap();
        assert_eq!(image.format, "png");
        assert_eq!(image.content_type(), "image/png");
        assert!(!image.decode().unwrap().is_empty());
    }

    #[test]
    fn content_types() {
        let jpg = DataUrlImage {
            format: "jpg".into(),
            payload: String::new(),
        };
        assert_eq!(jpg.content_type(), "image/jpeg");
        let bmp = DataUrlImage {
            format: "bmp".into(),
            payload: String::new(),
        };
        assert_eq!(bmp.content_type(), "image/png");
    }

    #[test]
    fn rejects_non_data_urls() {
        assert!(matches!(
            DataUrlImage::parse("https://example.com/a.png"),
            Err(ArchiveError::InvalidDataUrl)
        ));
        assert!(DataUrlImage::parse("data:text/plain;base64,AAAA").is_err());
        assert!(DataUrlImage::parse("data:image/svg+xml;base64,AAAA").is_err());
        assert!(DataUrlImage::parse("data:image/png;base64,").is_err());
    }

    #[test]
    fn bad_base64_fails_decode() {
        let image = DataUrlImage::parse("data:image/png;base64,@@@").unwrap();
        assert!(matches!(image.decode(), Err(ArchiveError::Decode(_))));
    }

    #[tokio::test]
    async fn fs_archive_writes_drawing_and_response() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FsDrawingArchive::new(dir.path());
        archive
            .archive(&format!("data:image/png;base64,{PIXEL}"), "Nice car!")
            .await
            .unwrap();

        let mut names: Vec<String> = std::fs::read_dir(dir.path().join("data"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names.len(), 2);
        assert!(names[0].ends_with("_drawing.png"));
        assert!(names[1].ends_with("_response.txt"));
    }

    #[tokio::test]
    async fn noop_archive_accepts_anything() {
        assert!(NoopArchive.archive("garbage", "").await.is_ok());
    }
}
