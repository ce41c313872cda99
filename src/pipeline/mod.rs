use anyhow::Context;
use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub mod artifacts;

use crate::blog::{BlogGenerator, GeminiClient};
use crate::config::Config;
use crate::extractors::{CookieProvisioner, VideoAcquirer, VideoSource, YoutubeDownloader};
use crate::media::{AudioExtractor, AudioStore};
use crate::process::TokioCommandRunner;
use crate::transcribe::{AudioLanguage, DeepgramClient, RetryPolicy, TranscriptionClient, UNKNOWN_LANGUAGE};
use crate::Result;

pub use artifacts::TempArtifacts;

/// Blog language used when neither the caller nor detection supplies one
pub const DEFAULT_BLOG_LANGUAGE: &str = "en";

/// Language choices for one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageDirective {
    pub blog_language: Option<String>,
    pub audio_language: AudioLanguage,
}

impl LanguageDirective {
    pub fn new(blog_language: Option<&str>, audio_language: Option<&str>) -> Self {
        Self {
            blog_language: blog_language
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(str::to_lowercase),
            audio_language: AudioLanguage::parse(audio_language),
        }
    }

    /// Explicit choice, else the detected language, else English
    pub fn resolve_blog_language(&self, detected: &str) -> String {
        if let Some(code) = &self.blog_language {
            return code.clone();
        }
        if !detected.is_empty() && detected != UNKNOWN_LANGUAGE {
            return detected.to_string();
        }
        DEFAULT_BLOG_LANGUAGE.to_string()
    }
}

/// Final record handed back to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub transcript: String,
    pub blog: String,
    pub detected_language: String,
    pub blog_language: String,

    /// Public URL of the copy-aside audio, when that copy succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,

    pub generated_at: DateTime<Utc>,
}

/// Request states, in the order they are entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Acquiring,
    Extracting,
    Persisting,
    Transcribing,
    Generating,
    Done,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PipelineStage::Acquiring => "Acquiring video",
            PipelineStage::Extracting => "Extracting audio",
            PipelineStage::Persisting => "Saving audio copy",
            PipelineStage::Transcribing => "Transcribing audio",
            PipelineStage::Generating => "Generating blog",
            PipelineStage::Done => "Done",
        };
        write!(f, "{}", label)
    }
}

/// Video -> audio -> transcript -> blog, one request at a time per call
pub struct VideoToBlogPipeline {
    acquirer: VideoAcquirer,
    extractor: AudioExtractor,
    audio_store: Option<AudioStore>,
    transcriber: TranscriptionClient,
    generator: BlogGenerator,
    scratch_root: PathBuf,
    progress: Option<ProgressBar>,
}

impl VideoToBlogPipeline {
    pub fn new(
        acquirer: VideoAcquirer,
        extractor: AudioExtractor,
        transcriber: TranscriptionClient,
        generator: BlogGenerator,
        scratch_root: PathBuf,
    ) -> Self {
        Self {
            acquirer,
            extractor,
            audio_store: None,
            transcriber,
            generator,
            scratch_root,
            progress: None,
        }
    }

    /// Wire up production clients from configuration
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        config.require_api_keys()?;

        let runner = Arc::new(TokioCommandRunner::new(config.downloader.max_output_bytes));
        let scratch_root = config.scratch_root();

        let downloader = YoutubeDownloader::new(
            runner.clone(),
            config.downloader.binaries.clone(),
            CookieProvisioner::from_config(&config.downloader),
            scratch_root.clone(),
            config.downloader_timeout(),
        );

        let extractor = AudioExtractor::new(runner, config.media.ffmpeg_binary.clone())
            .with_encoding(config.media.audio_codec.clone(), config.media.audio_quality)
            .with_min_bytes(config.media.min_audio_bytes)
            .with_timeout(config.media_timeout());

        let deepgram = DeepgramClient::new(&config.speech).context("Failed to create Deepgram client")?;
        let transcriber = TranscriptionClient::new(Arc::new(deepgram)).with_retry(RetryPolicy {
            max_attempts: config.speech.max_attempts,
            base_delay: Duration::from_millis(config.speech.retry_base_delay_ms),
        });

        let gemini = GeminiClient::new(&config.generation).context("Failed to create Gemini client")?;
        let generator = BlogGenerator::new(Arc::new(gemini), config.generation.model.clone());

        Ok(Self::new(
            VideoAcquirer::new(downloader),
            extractor,
            transcriber,
            generator,
            scratch_root,
        )
        .with_audio_store(AudioStore::new(
            config.app.public_audio_dir.clone(),
            config.app.public_audio_url_prefix.clone(),
        )))
    }

    pub fn with_audio_store(mut self, store: AudioStore) -> Self {
        self.audio_store = Some(store);
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    fn enter(&self, stage: PipelineStage) {
        tracing::info!(stage = ?stage, "{}", stage);
        if let Some(progress) = &self.progress {
            progress.set_message(format!("{}...", stage));
        }
    }

    /// Run every stage for `source`.
    ///
    /// The uploaded or downloaded video, the extracted audio and any scratch
    /// directories are removed before this returns, on success or failure.
    pub async fn process(&self, source: VideoSource, languages: &LanguageDirective) -> Result<BlogPost> {
        tracing::info!("Processing {}", source.describe());

        let mut artifacts = TempArtifacts::default();
        if let VideoSource::LocalUpload { path, .. } = &source {
            artifacts.track_file(path.clone());
        }

        let result = self.run_stages(&source, languages, &mut artifacts).await;

        let removed = artifacts.cleanup();
        tracing::debug!("Cleanup removed {} temporary item(s)", removed);

        match &result {
            Ok(_) => self.enter(PipelineStage::Done),
            Err(e) => tracing::error!("Pipeline failed: {}", e),
        }
        result
    }

    async fn run_stages(
        &self,
        source: &VideoSource,
        languages: &LanguageDirective,
        artifacts: &mut TempArtifacts,
    ) -> Result<BlogPost> {
        self.enter(PipelineStage::Acquiring);
        let video = self.acquirer.acquire(source).await?;
        artifacts.track_file(video.path.clone());
        if let Some(scratch) = video.scratch {
            artifacts.track_dir(scratch);
        }

        self.enter(PipelineStage::Extracting);
        let audio_dir = artifacts.scratch_dir(&self.scratch_root, "audio-")?;
        let audio = self.extractor.extract(&video.path, &audio_dir).await?;
        artifacts.track_file(audio.path.clone());

        self.enter(PipelineStage::Persisting);
        let audio_url = match &self.audio_store {
            Some(store) => match store.persist(&audio).await {
                Ok(stored) => {
                    tracing::info!("Audio saved to: {}", stored.path.display());
                    Some(stored.url)
                }
                Err(e) => {
                    tracing::warn!("Could not save audio: {}", e);
                    None
                }
            },
            None => None,
        };

        self.enter(PipelineStage::Transcribing);
        let transcription = self
            .transcriber
            .transcribe(&audio.path, &languages.audio_language)
            .await;
        // Audio is no longer needed, whatever the outcome
        artifacts.release(&audio.path);
        let transcription = transcription?;

        let blog_language = languages.resolve_blog_language(&transcription.detected_language);
        tracing::info!(
            "Detected: {}, Audio hint: {}, Blog: {}",
            transcription.detected_language,
            languages.audio_language,
            blog_language
        );

        self.enter(PipelineStage::Generating);
        let blog = self
            .generator
            .generate(&transcription.transcript, &blog_language)
            .await?;

        Ok(BlogPost {
            transcript: transcription.transcript,
            blog,
            detected_language: transcription.detected_language,
            blog_language,
            audio_url,
            generated_at: Utc::now(),
        })
    }
}
