use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::process::DEFAULT_MAX_OUTPUT_BYTES;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Speech-to-text (Deepgram) settings
    pub speech: SpeechConfig,

    /// Generative-text (Gemini) settings
    pub generation: GenerationConfig,

    /// yt-dlp settings
    pub downloader: DownloaderConfig,

    /// ffmpeg settings
    pub media: MediaConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub api_key: Option<String>,

    pub endpoint: String,

    /// Deepgram model name
    pub model: String,

    pub smart_format: bool,

    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Delay before retry n is this value times n
    pub retry_base_delay_ms: u64,

    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub api_key: Option<String>,

    pub endpoint: String,

    /// Gemini model name
    pub model: String,

    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    /// yt-dlp install locations, tried in order
    pub binaries: Vec<String>,

    pub timeout_secs: u64,

    /// Cap on captured stdout/stderr per stream
    pub max_output_bytes: usize,

    /// Existing Netscape cookie file
    pub cookies_file: Option<PathBuf>,

    /// Inline cookie content, raw or base64
    pub cookies: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub ffmpeg_binary: String,

    pub audio_codec: String,

    /// ffmpeg `-q:a` value
    pub audio_quality: u8,

    pub timeout_secs: u64,

    /// Audio smaller than this is logged as suspicious
    pub min_audio_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root for per-request scratch directories
    pub temp_dir: Option<PathBuf>,

    /// Where the copy-aside audio is written
    pub public_audio_dir: PathBuf,

    /// URL prefix the public audio directory is served under
    pub public_audio_url_prefix: String,

    /// Largest accepted video upload
    pub max_upload_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            speech: SpeechConfig::default(),
            generation: GenerationConfig::default(),
            downloader: DownloaderConfig::default(),
            media: MediaConfig::default(),
            app: AppConfig::default(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://api.deepgram.com/v1/listen".to_string(),
            model: "nova-3".to_string(),
            smart_format: true,
            max_attempts: 3,
            retry_base_delay_ms: 2000,
            request_timeout_secs: 300,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash-lite".to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            binaries: vec![
                "yt-dlp".to_string(),
                "/usr/local/bin/yt-dlp".to_string(),
                "/usr/bin/yt-dlp".to_string(),
                "/opt/homebrew/bin/yt-dlp".to_string(),
            ],
            timeout_secs: 300,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            cookies_file: None,
            cookies: None,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_binary: "ffmpeg".to_string(),
            audio_codec: "libmp3lame".to_string(),
            audio_quality: 2,
            timeout_secs: 600,
            min_audio_bytes: 1000,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            public_audio_dir: PathBuf::from("public").join("audio"),
            public_audio_url_prefix: "/audio".to_string(),
            max_upload_bytes: 500 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from file (or defaults), then apply environment overrides
    pub async fn load() -> Result<Self> {
        let mut config = match Self::existing_config_path() {
            Some(config_path) => {
                let content = fs_err::read_to_string(&config_path)
                    .context("Failed to read config file")?;

                serde_yaml::from_str::<Config>(&content)
                    .context("Failed to parse config file")?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<PathBuf> {
        let config_path = Self::default_config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(config_path)
    }

    /// First config file that exists: ./config.yaml, then the user config dir
    fn existing_config_path() -> Option<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Some(local_config);
        }

        Self::default_config_path().ok().filter(|path| path.exists())
    }

    fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("video2blog").join("config.yaml"))
    }

    /// Overlay keys and cookie material from the environment
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(key) = non_empty("DEEPGRAM_API_KEY") {
            self.speech.api_key = Some(key);
        }
        if let Some(key) = non_empty("GEMINI_API_KEY") {
            self.generation.api_key = Some(key);
        }
        if let Some(path) = non_empty("YTDLP_COOKIES_FILE") {
            self.downloader.cookies_file = Some(PathBuf::from(path));
        }
        if let Some(cookies) = non_empty("YTDLP_COOKIES") {
            self.downloader.cookies = Some(cookies);
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.speech.max_attempts == 0 {
            anyhow::bail!("speech.max_attempts must be at least 1");
        }
        if self.downloader.binaries.is_empty() {
            anyhow::bail!("downloader.binaries must list at least one yt-dlp location");
        }
        if self.downloader.timeout_secs == 0 || self.media.timeout_secs == 0 {
            anyhow::bail!("Process timeouts must be positive");
        }
        if self.speech.request_timeout_secs == 0 || self.generation.request_timeout_secs == 0 {
            anyhow::bail!("HTTP request timeouts must be positive");
        }
        if self.downloader.max_output_bytes == 0 || self.app.max_upload_bytes == 0 {
            anyhow::bail!("Size limits must be positive");
        }

        Ok(())
    }

    /// Both service keys are needed before any video is processed
    pub fn require_api_keys(&self) -> crate::Result<()> {
        if self.speech.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(crate::PipelineError::Config(
                "DEEPGRAM_API_KEY is not set".to_string(),
            ));
        }
        if self.generation.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(crate::PipelineError::Config(
                "GEMINI_API_KEY is not set".to_string(),
            ));
        }
        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Deepgram Model: {}", self.speech.model);
        println!("  Deepgram API Key: {}", mask_secret(self.speech.api_key.as_deref()));
        println!("  Transcription Attempts: {}", self.speech.max_attempts);
        println!("  Gemini Model: {}", self.generation.model);
        println!("  Gemini API Key: {}", mask_secret(self.generation.api_key.as_deref()));
        println!("  yt-dlp Locations: {}", self.downloader.binaries.join(", "));
        match (&self.downloader.cookies_file, &self.downloader.cookies) {
            (Some(path), _) => println!("  yt-dlp Cookies: {}", path.display()),
            (None, Some(_)) => println!("  yt-dlp Cookies: inline"),
            (None, None) => println!("  yt-dlp Cookies: none"),
        }
        println!("  ffmpeg: {} ({}, q:a {})", self.media.ffmpeg_binary, self.media.audio_codec, self.media.audio_quality);
        println!("  Scratch Directory: {}", self.scratch_root().display());
        println!("  Public Audio: {} -> {}", self.app.public_audio_dir.display(), self.app.public_audio_url_prefix);
    }

    /// Root directory for per-request scratch space
    pub fn scratch_root(&self) -> PathBuf {
        self.app
            .temp_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("video2blog"))
    }

    /// Where staged uploads are copied before processing
    pub fn upload_dir(&self) -> PathBuf {
        self.scratch_root().join("uploads")
    }

    pub fn downloader_timeout(&self) -> Duration {
        Duration::from_secs(self.downloader.timeout_secs)
    }

    pub fn media_timeout(&self) -> Duration {
        Duration::from_secs(self.media.timeout_secs)
    }
}

fn mask_secret(secret: Option<&str>) -> String {
    match secret {
        Some(value) if value.chars().count() > 4 => {
            let tail: String = value.chars().skip(value.chars().count() - 4).collect();
            format!("****{}", tail)
        }
        Some(_) => "****".to_string(),
        None => "(not set)".to_string(),
    }
}
