use std::path::PathBuf;
use tempfile::TempDir;

pub mod cookies;
pub mod local;
pub mod youtube;

use crate::Result;

pub use cookies::{CookieMaterial, CookieProvisioner};
pub use local::{stage_upload, validate_upload, ALLOWED_VIDEO_EXTENSIONS};
pub use youtube::{DownloadProfile, YoutubeDownloader, DEFAULT_PROFILES};

/// Where the video for one request comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    /// A file already received by the caller; the pipeline deletes it when done
    LocalUpload {
        path: PathBuf,
        original_name: String,
    },

    /// A page yt-dlp knows how to download
    RemoteUrl(String),
}

impl VideoSource {
    /// Human-readable label for logs
    pub fn describe(&self) -> String {
        match self {
            VideoSource::LocalUpload { original_name, .. } => format!("upload '{}'", original_name),
            VideoSource::RemoteUrl(url) => format!("url {}", url),
        }
    }

    /// Check if input looks like a URL rather than a file path
    pub fn is_remote(input: &str) -> bool {
        let lower = input.trim().to_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    }
}

/// A local video file ready for audio extraction
#[derive(Debug)]
pub struct AcquiredVideo {
    pub path: PathBuf,

    /// Per-request download directory, removed on drop
    pub scratch: Option<TempDir>,
}

/// Resolves a [`VideoSource`] to a local video file
pub struct VideoAcquirer {
    downloader: YoutubeDownloader,
}

impl VideoAcquirer {
    pub fn new(downloader: YoutubeDownloader) -> Self {
        Self { downloader }
    }

    pub async fn acquire(&self, source: &VideoSource) -> Result<AcquiredVideo> {
        match source {
            VideoSource::LocalUpload { path, original_name } => {
                tracing::debug!("Using uploaded file '{}' at {}", original_name, path.display());
                Ok(AcquiredVideo {
                    path: path.clone(),
                    scratch: None,
                })
            }
            VideoSource::RemoteUrl(url) => self.downloader.download(url).await,
        }
    }
}
