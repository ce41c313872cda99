//! Video2Blog - turn a video upload or YouTube URL into an SEO blog post
//!
//! This library acquires a local video (upload pass-through or yt-dlp download),
//! extracts its audio with ffmpeg, transcribes it with Deepgram and asks Gemini
//! to write a blog article from the transcript.

pub mod blog;
pub mod cli;
pub mod config;
pub mod extractors;
pub mod media;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod transcribe;
pub mod utils;

pub use blog::{BlogGenerator, BlogLanguage, TextGenerator};
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use extractors::{VideoAcquirer, VideoSource};
pub use media::{AudioArtifact, AudioExtractor, AudioStore};
pub use pipeline::{BlogPost, LanguageDirective, PipelineStage, VideoToBlogPipeline};
pub use transcribe::{AudioLanguage, SpeechToText, TranscriptionClient, TranscriptionResult};

/// Result type used throughout the library
pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// Error types surfaced by the video-to-blog pipeline
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Required tool not found: {0}")]
    ToolNotFound(String),

    #[error("Audio extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Video download failed: {0}")]
    DownloadFailed(String),

    #[error("Authentication required to download this video: {0}")]
    AuthRequired(String),

    #[error("Downloaded video is empty: {0}")]
    EmptyDownload(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Transcript is empty; cannot generate blog")]
    EmptyTranscript,

    #[error("Blog generation failed: {0}")]
    GenerationFailed(String),

    #[error("Network connection problem: {0}")]
    TransientNetwork(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Whether a failed speech-to-text call is worth another attempt.
    ///
    /// Connection resets, refusals and timeouts arrive as `TransientNetwork`;
    /// anything else only qualifies if its message talks about a connection.
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::TransientNetwork(_) => true,
            other => other.to_string().to_lowercase().contains("connection"),
        }
    }
}
