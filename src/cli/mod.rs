use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "video2blog",
    about = "Video2Blog - Turn a video or YouTube URL into an SEO blog post",
    version,
    long_about = "Extracts the audio track from an uploaded video or a yt-dlp supported URL, transcribes it with Deepgram and writes a long-form SEO blog article from the transcript with Gemini."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a blog post from a video file or URL
    Generate {
        /// Video file path or URL (YouTube and other yt-dlp supported sites)
        #[arg(value_name = "VIDEO_OR_URL")]
        input: String,

        /// Blog language code (en, hi, te, ta); defaults to the detected language
        #[arg(short, long, value_name = "LANG")]
        language: Option<String>,

        /// Spoken language of the audio, or "auto" to detect it
        #[arg(short, long, value_name = "LANG", default_value = "auto")]
        audio_language: String,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show or initialize configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Write a default configuration file
        #[arg(long)]
        init: bool,
    },

    /// List blog languages with a dedicated template
    Languages,
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Languages, transcript and blog as plain text
    Text,
    /// camelCase JSON record
    Json,
    /// Blog markdown with a metadata header
    Markdown,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}
