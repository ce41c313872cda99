use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub mod store;

use crate::process::{CommandRunner, CommandSpec, ProcessError};
use crate::utils::{format_file_size, tail_lines};
use crate::{PipelineError, Result};

pub use store::{AudioStore, StoredAudio};

/// Audio track pulled out of a video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// ffmpeg wrapper that strips the video stream and encodes MP3
pub struct AudioExtractor {
    runner: Arc<dyn CommandRunner>,
    ffmpeg: String,
    codec: String,
    quality: u8,
    min_bytes: u64,
    timeout: Option<Duration>,
}

impl AudioExtractor {
    pub fn new(runner: Arc<dyn CommandRunner>, ffmpeg: impl Into<String>) -> Self {
        Self {
            runner,
            ffmpeg: ffmpeg.into(),
            codec: "libmp3lame".to_string(),
            quality: 2,
            min_bytes: 1000,
            timeout: None,
        }
    }

    pub fn with_encoding(mut self, codec: impl Into<String>, quality: u8) -> Self {
        self.codec = codec.into();
        self.quality = quality;
        self
    }

    pub fn with_min_bytes(mut self, min_bytes: u64) -> Self {
        self.min_bytes = min_bytes;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Output location for a given video: `<stem>.mp3` inside `output_dir`
    pub fn audio_path_for(video: &Path, output_dir: &Path) -> PathBuf {
        let stem = video
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .unwrap_or("audio");
        output_dir.join(format!("{}.mp3", stem))
    }

    /// Extract the audio track of `video` into `output_dir`
    pub async fn extract(&self, video: &Path, output_dir: &Path) -> Result<AudioArtifact> {
        let audio_path = Self::audio_path_for(video, output_dir);

        let args = vec![
            "-i".to_string(),
            video.to_string_lossy().into_owned(),
            "-vn".to_string(),
            "-acodec".to_string(),
            self.codec.clone(),
            "-q:a".to_string(),
            self.quality.to_string(),
            audio_path.to_string_lossy().into_owned(),
        ];

        tracing::info!("Extracting audio: {} -> {}", video.display(), audio_path.display());

        let spec = CommandSpec::new(self.ffmpeg.clone(), args).with_timeout(self.timeout);
        let output = self.runner.run(spec).await.map_err(|e| match e {
            ProcessError::NotFound(program) => PipelineError::ToolNotFound(program),
            other => PipelineError::ExtractionFailed(other.to_string()),
        })?;

        if !output.success {
            let detail = tail_lines(&output.diagnostics(), 3);
            tracing::error!(code = ?output.code, "ffmpeg failed: {}", detail);
            return Err(PipelineError::ExtractionFailed(format!("ffmpeg failed: {}", detail)));
        }

        let metadata = tokio::fs::metadata(&audio_path).await.map_err(|e| {
            PipelineError::ExtractionFailed(format!("Audio file not created: {}", e))
        })?;
        let size_bytes = metadata.len();

        if size_bytes < self.min_bytes {
            tracing::warn!(
                "Audio file is very small ({}) - the video may be silent or very short",
                format_file_size(size_bytes)
            );
        }

        tracing::info!("Audio extraction successful: {} ({})", audio_path.display(), format_file_size(size_bytes));

        Ok(AudioArtifact {
            path: audio_path,
            size_bytes,
        })
    }
}
