use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use video2blog::cli::{Cli, Commands, OutputFormat};
use video2blog::config::Config;
use video2blog::extractors::{stage_upload, validate_upload, VideoSource};
use video2blog::{output, utils, BlogLanguage, LanguageDirective, VideoToBlogPipeline};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let default_filter = if cli.verbose { "video2blog=debug" } else { "video2blog=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load().await?;

    match cli.command {
        Commands::Generate {
            input,
            language,
            audio_language,
            output,
            format,
        } => {
            generate(&config, &input, language, &audio_language, output.as_deref(), &format, cli.quiet).await?;
        }
        Commands::Config { show, init } => {
            if init {
                let path = Config::default().save().await?;
                println!("Default configuration written to: {}", path.display());
            }
            if show || !init {
                config.display();
            }
        }
        Commands::Languages => {
            println!("Blog languages:");
            for language in BlogLanguage::ALL {
                println!("  • {} ({})", language.label(), language.code());
            }
            println!("Other codes fall back to the English template.");
        }
    }

    Ok(())
}

async fn generate(
    config: &Config,
    input: &str,
    language: Option<String>,
    audio_language: &str,
    output_path: Option<&Path>,
    format: &OutputFormat,
    quiet: bool,
) -> Result<()> {
    let remote = input.trim().is_empty() || VideoSource::is_remote(input);

    // Input checks come first so bad requests fail before keys are needed
    let remote_url = if remote {
        Some(utils::validate_and_normalize_url(input)?)
    } else {
        validate_upload(Path::new(input), config.app.max_upload_bytes).await?;
        None
    };

    // Check for required external dependencies (non-fatal)
    let missing_deps = utils::check_dependencies(&config.media.ffmpeg_binary, &config.downloader.binaries).await;
    if !missing_deps.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing_deps {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }

    // Built before staging so a failure here leaves no staged copy behind
    let mut pipeline = VideoToBlogPipeline::from_config(config)?;

    let source = match remote_url {
        Some(url) => VideoSource::RemoteUrl(url),
        None => stage_upload(Path::new(input), &config.upload_dir())
            .await
            .context("Failed to stage uploaded video")?,
    };

    let progress = if quiet {
        None
    } else {
        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .context("Invalid progress template")?,
        );
        progress.enable_steady_tick(Duration::from_millis(120));
        pipeline = pipeline.with_progress(progress.clone());
        Some(progress)
    };

    let languages = LanguageDirective::new(language.as_deref(), Some(audio_language));
    tracing::info!("Starting blog generation for {}", source.describe());

    let result = pipeline.process(source, &languages).await;

    if let Some(progress) = &progress {
        match &result {
            Ok(_) => progress.finish_with_message("Blog generated"),
            Err(_) => progress.abandon_with_message("Failed"),
        }
    }

    let post = result?;

    match output_path {
        Some(path) => {
            output::save_to_file(&post, path, format).await?;
            println!("Blog saved to: {}", path.display());
        }
        None => {
            output::print_to_console(&post, format)?;
        }
    }

    if let Some(url) = &post.audio_url {
        tracing::info!("Audio available at: {}", url);
    }

    Ok(())
}
