use std::path::Path;
use url::Url;

use crate::{PipelineError, Result};

/// Validate a URL and return normalized version
pub fn validate_and_normalize_url(url: &str) -> Result<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::InvalidInput("Video URL required".to_string()));
    }

    let parsed = Url::parse(trimmed)
        .map_err(|_| PipelineError::InvalidInput(format!("Invalid URL format: {}", trimmed)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(PipelineError::InvalidInput(
            "URL must use HTTP or HTTPS protocol".to_string(),
        ));
    }

    Ok(parsed.to_string())
}

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Last `lines` non-empty lines of tool output, for error messages
pub fn tail_lines(text: &str, lines: usize) -> String {
    let kept: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect();
    let start = kept.len().saturating_sub(lines);
    kept[start..].join("\n")
}

/// Lowercased file extension, if any
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Extract domain from URL for display purposes
pub fn extract_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .host_str()
        .map(|host| host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// Check if the current environment has required tools
pub async fn check_dependencies(ffmpeg: &str, yt_dlp_locations: &[String]) -> Vec<String> {
    let mut missing = Vec::new();

    let mut yt_dlp_found = false;
    for location in yt_dlp_locations {
        if check_command_available(location, "--version").await {
            yt_dlp_found = true;
            break;
        }
    }
    if !yt_dlp_found {
        missing.push("yt-dlp - required for YouTube URLs".to_string());
    }

    if !check_command_available(ffmpeg, "-version").await {
        missing.push("ffmpeg - required for audio extraction".to_string());
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str, version_flag: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg(version_flag)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
