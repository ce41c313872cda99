use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub mod deepgram;

use crate::{PipelineError, Result};

pub use deepgram::DeepgramClient;

/// Value reported when auto-detect finds no language tags
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Spoken-language hint supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AudioLanguage {
    #[default]
    Auto,
    Code(String),
}

impl AudioLanguage {
    /// `None`, empty and `"auto"` all mean auto-detect
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => AudioLanguage::Auto,
            Some(code) if code.eq_ignore_ascii_case("auto") => AudioLanguage::Auto,
            Some(code) => AudioLanguage::Code(code.to_lowercase()),
        }
    }
}

impl std::fmt::Display for AudioLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioLanguage::Auto => write!(f, "auto"),
            AudioLanguage::Code(code) => write!(f, "{}", code),
        }
    }
}

/// Language parameter sent to the speech service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechLanguage {
    /// Multi-language mode with per-word tags
    Multi,
    Pinned(String),
}

impl SpeechLanguage {
    pub fn as_query_value(&self) -> &str {
        match self {
            SpeechLanguage::Multi => "multi",
            SpeechLanguage::Pinned(code) => code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub audio: Vec<u8>,
    pub mime_type: String,
    pub language: SpeechLanguage,
}

/// Provider-neutral speech service response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechResponse {
    pub alternatives: Vec<SpeechAlternative>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechAlternative {
    pub transcript: String,
    pub words: Vec<SpeechWord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechWord {
    pub text: String,
    pub language: Option<String>,
}

/// A speech-to-text backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, request: SpeechRequest) -> Result<SpeechResponse>;
}

/// Transcript plus the language it was spoken in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub transcript: String,
    pub detected_language: String,
}

/// Linear backoff: the wait before retry `n` is `base_delay * n`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(2000),
        }
    }
}

/// Per-language word counts in first-seen order
#[derive(Debug, Default)]
pub struct LanguageCounts {
    counts: Vec<(String, usize)>,
}

impl LanguageCounts {
    pub fn from_words(words: &[SpeechWord]) -> Self {
        let mut counts = Self::default();
        for language in words.iter().filter_map(|word| word.language.as_deref()) {
            counts.record(language);
        }
        counts
    }

    pub fn record(&mut self, language: &str) {
        match self.counts.iter_mut().find(|(code, _)| code == language) {
            Some((_, count)) => *count += 1,
            None => self.counts.push((language.to_string(), 1)),
        }
    }

    /// Most frequent language; on a tie the one seen first wins
    pub fn mode(&self) -> Option<&str> {
        let mut best: Option<&(String, usize)> = None;
        for entry in &self.counts {
            if best.map_or(true, |(_, count)| entry.1 > *count) {
                best = Some(entry);
            }
        }
        best.map(|(code, _)| code.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl std::fmt::Display for LanguageCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .counts
            .iter()
            .map(|(code, count)| format!("{}={}", code, count))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Speech-to-text with language handling and transient-failure retries
pub struct TranscriptionClient {
    service: Arc<dyn SpeechToText>,
    retry: RetryPolicy,
}

impl TranscriptionClient {
    pub fn new(service: Arc<dyn SpeechToText>) -> Self {
        Self {
            service,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Transcribe the audio at `audio_path`.
    ///
    /// An explicit hint is pinned and reported back unchanged; `Auto` asks for
    /// multi-language output and takes the most frequent word tag.
    pub async fn transcribe(&self, audio_path: &Path, hint: &AudioLanguage) -> Result<TranscriptionResult> {
        let language = match hint {
            AudioLanguage::Code(code) => {
                tracing::info!("Using user-provided language hint: {}", code);
                SpeechLanguage::Pinned(code.clone())
            }
            AudioLanguage::Auto => {
                tracing::info!("Auto-detecting language from audio");
                SpeechLanguage::Multi
            }
        };

        let audio = tokio::fs::read(audio_path).await?;
        tracing::debug!("Audio file size: {} bytes", audio.len());

        let request = SpeechRequest {
            audio,
            mime_type: "audio/mpeg".to_string(),
            language,
        };

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            tracing::info!(attempt, max_attempts, "Calling speech-to-text service");

            let error = match self.attempt(request.clone()).await {
                Ok(result) => return Ok(result),
                Err(e) => e,
            };

            tracing::warn!(attempt, error = %error, "Transcription attempt failed");

            if attempt >= max_attempts || !error.is_transient() {
                return Err(error);
            }

            let delay = self.retry.delay_for(attempt);
            tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "Retrying after transient failure");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn attempt(&self, request: SpeechRequest) -> Result<TranscriptionResult> {
        let auto_detect = request.language == SpeechLanguage::Multi;
        let pinned = request.language.clone();

        let response = self.service.transcribe(request).await?;

        let top = response.alternatives.into_iter().next().unwrap_or_default();

        let detected_language = match pinned {
            SpeechLanguage::Pinned(code) => code,
            SpeechLanguage::Multi => detect_language(&top.words),
        };

        if auto_detect && !top.words.is_empty() {
            let sample: Vec<String> = top
                .words
                .iter()
                .take(10)
                .map(|w| format!("{}:{}", w.text, w.language.as_deref().unwrap_or("-")))
                .collect();
            tracing::debug!("First words: {}", sample.join(" "));
        }

        let transcript = top.transcript.trim().to_string();
        tracing::info!(
            detected_language = %detected_language,
            "Transcript extracted ({} chars)",
            transcript.chars().count()
        );

        if transcript.is_empty() {
            return Err(PipelineError::TranscriptionFailed(
                "speech service returned no transcript".to_string(),
            ));
        }

        Ok(TranscriptionResult {
            transcript,
            detected_language,
        })
    }
}

/// Mode of the per-word language tags, or `"unknown"` when none are tagged
pub fn detect_language(words: &[SpeechWord]) -> String {
    let counts = LanguageCounts::from_words(words);
    if !counts.is_empty() {
        tracing::info!("Language distribution: {} ({} words)", counts, words.len());
    }
    counts
        .mode()
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn word(text: &str, language: Option<&str>) -> SpeechWord {
        SpeechWord {
            text: text.to_string(),
            language: language.map(str::to_string),
        }
    }

    fn tagged(counts: &[(&str, usize)]) -> Vec<SpeechWord> {
        counts
            .iter()
            .flat_map(|&(lang, n)| (0..n).map(move |i| word(&format!("w{}", i), Some(lang))))
            .collect()
    }

    fn response(transcript: &str, words: Vec<SpeechWord>) -> SpeechResponse {
        SpeechResponse {
            alternatives: vec![SpeechAlternative {
                transcript: transcript.to_string(),
                words,
            }],
        }
    }

    fn audio_file() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.mp3");
        std::fs::write(&path, b"mp3").unwrap();
        (dir, path)
    }

    #[test]
    fn test_audio_language_parse() {
        assert_eq!(AudioLanguage::parse(None), AudioLanguage::Auto);
        assert_eq!(AudioLanguage::parse(Some("AUTO")), AudioLanguage::Auto);
        assert_eq!(AudioLanguage::parse(Some(" ")), AudioLanguage::Auto);
        assert_eq!(AudioLanguage::parse(Some("Hi")), AudioLanguage::Code("hi".into()));
    }

    #[test]
    fn test_detect_language_mode() {
        assert_eq!(detect_language(&tagged(&[("en", 3), ("hi", 7)])), "hi");
    }

    #[test]
    fn test_detect_language_tie_keeps_first_seen() {
        assert_eq!(detect_language(&tagged(&[("te", 2), ("ta", 2)])), "te");

        let interleaved: Vec<SpeechWord> = ["te", "ta", "ta", "te"]
            .iter()
            .map(|&lang| word("w", Some(lang)))
            .collect();
        assert_eq!(detect_language(&interleaved), "te");
    }

    #[test]
    fn test_detect_language_without_tags() {
        let words = vec![word("hello", None), word("world", None)];
        assert_eq!(detect_language(&words), "unknown");
        assert_eq!(detect_language(&[]), "unknown");
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(2000),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
    }

    #[tokio::test]
    async fn test_explicit_hint_is_reported_unchanged() {
        let (_dir, path) = audio_file();

        for hint in ["en", "hi", "te", "ta"] {
            let mut service = MockSpeechToText::new();
            let expected = hint.to_string();
            service
                .expect_transcribe()
                .withf(move |request| request.language == SpeechLanguage::Pinned(expected.clone()))
                .times(1)
                // Tags disagree with the hint; they must be ignored
                .returning(|_| Ok(response("namaste duniya", tagged(&[("fr", 5)]))));

            let client = TranscriptionClient::new(Arc::new(service));
            let result = client
                .transcribe(&path, &AudioLanguage::Code(hint.to_string()))
                .await
                .unwrap();

            assert_eq!(result.detected_language, hint);
            assert_eq!(result.transcript, "namaste duniya");
        }
    }

    #[tokio::test]
    async fn test_auto_mode_uses_multi_and_word_tags() {
        let (_dir, path) = audio_file();
        let mut service = MockSpeechToText::new();
        service
            .expect_transcribe()
            .withf(|request| request.language == SpeechLanguage::Multi)
            .times(1)
            .returning(|_| Ok(response("mixed speech", tagged(&[("en", 3), ("hi", 7)]))));

        let client = TranscriptionClient::new(Arc::new(service));
        let result = client.transcribe(&path, &AudioLanguage::Auto).await.unwrap();
        assert_eq!(result.detected_language, "hi");
    }

    #[tokio::test]
    async fn test_auto_mode_without_tags_is_unknown() {
        let (_dir, path) = audio_file();
        let mut service = MockSpeechToText::new();
        service
            .expect_transcribe()
            .returning(|_| Ok(response("hello", vec![word("hello", None)])));

        let client = TranscriptionClient::new(Arc::new(service));
        let result = client.transcribe(&path, &AudioLanguage::Auto).await.unwrap();
        assert_eq!(result.detected_language, "unknown");
    }

    #[tokio::test]
    async fn test_empty_transcript_fails_without_retry() {
        let (_dir, path) = audio_file();
        let mut service = MockSpeechToText::new();
        service
            .expect_transcribe()
            .times(1)
            .returning(|_| Ok(response("   ", vec![])));

        let client = TranscriptionClient::new(Arc::new(service));
        let err = client.transcribe(&path, &AudioLanguage::Auto).await.unwrap_err();
        assert!(matches!(err, PipelineError::TranscriptionFailed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_reset_is_retried_once_with_linear_delay() {
        let (_dir, path) = audio_file();
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();

        let mut service = MockSpeechToText::new();
        service.expect_transcribe().times(2).returning(move |_| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(PipelineError::TransientNetwork("connection reset by peer".into()))
            } else {
                Ok(response("recovered", vec![]))
            }
        });

        let base_delay = Duration::from_millis(2000);
        let client = TranscriptionClient::new(Arc::new(service)).with_retry(RetryPolicy {
            max_attempts: 3,
            base_delay,
        });

        let started = tokio::time::Instant::now();
        let result = client
            .transcribe(&path, &AudioLanguage::Code("en".into()))
            .await
            .unwrap();
        let waited = started.elapsed();

        assert_eq!(result.transcript, "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // One delay of base * 1, not base * 2 or more
        assert!(waited >= base_delay, "waited {:?}", waited);
        assert!(waited < base_delay * 2, "waited {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted_surfaces_last_error() {
        let (_dir, path) = audio_file();
        let mut service = MockSpeechToText::new();
        service
            .expect_transcribe()
            .times(3)
            .returning(|_| Err(PipelineError::TransientNetwork("connection refused".into())));

        let client = TranscriptionClient::new(Arc::new(service));
        let err = client.transcribe(&path, &AudioLanguage::Auto).await.unwrap_err();
        assert!(matches!(err, PipelineError::TransientNetwork(_)));
    }

    #[tokio::test]
    async fn test_bad_credentials_fail_immediately() {
        let (_dir, path) = audio_file();
        let mut service = MockSpeechToText::new();
        service.expect_transcribe().times(1).returning(|_| {
            Err(PipelineError::TranscriptionFailed("HTTP 401 Unauthorized: invalid credentials".into()))
        });

        let client = TranscriptionClient::new(Arc::new(service));
        let err = client.transcribe(&path, &AudioLanguage::Auto).await.unwrap_err();
        assert!(matches!(err, PipelineError::TranscriptionFailed(_)));
    }
}
