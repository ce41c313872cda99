use anyhow::{Context, Result};
use std::path::Path;

use crate::blog::BlogLanguage;
use crate::cli::OutputFormat;
use crate::pipeline::BlogPost;

/// Render a blog post in the requested format
pub fn render(post: &BlogPost, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(format_as_text(post)),
        OutputFormat::Json => format_as_json(post),
        OutputFormat::Markdown => Ok(format_as_markdown(post)),
    }
}

/// Save blog post to file
pub async fn save_to_file(post: &BlogPost, path: &Path, format: &OutputFormat) -> Result<()> {
    let content = render(post, format)?;

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    fs_err::write(path, content)?;
    Ok(())
}

/// Print blog post to console
pub fn print_to_console(post: &BlogPost, format: &OutputFormat) -> Result<()> {
    let content = render(post, format)?;
    println!("{}", content);
    Ok(())
}

fn language_label(code: &str) -> String {
    match BlogLanguage::from_code(code) {
        Some(language) => format!("{} ({})", language.label(), language.code()),
        None => code.to_string(),
    }
}

pub fn format_as_text(post: &BlogPost) -> String {
    let mut out = String::new();
    out.push_str(&format!("Detected language: {}\n", language_label(&post.detected_language)));
    out.push_str(&format!("Blog language: {}\n", language_label(&post.blog_language)));
    if let Some(url) = &post.audio_url {
        out.push_str(&format!("Audio: {}\n", url));
    }

    out.push_str("\n=== Transcript ===\n\n");
    out.push_str(post.transcript.trim());
    out.push_str("\n\n=== Blog ===\n\n");
    out.push_str(post.blog.trim());
    out.push('\n');
    out
}

pub fn format_as_json(post: &BlogPost) -> Result<String> {
    serde_json::to_string_pretty(post).context("Failed to serialize blog post")
}

/// Blog body with a metadata header and the transcript folded away
pub fn format_as_markdown(post: &BlogPost) -> String {
    let mut out = String::from("---\n");
    out.push_str(&format!("detected_language: {}\n", post.detected_language));
    out.push_str(&format!("blog_language: {}\n", post.blog_language));
    if let Some(url) = &post.audio_url {
        out.push_str(&format!("audio_url: {}\n", url));
    }
    out.push_str(&format!("generated_at: {}\n", post.generated_at.to_rfc3339()));
    out.push_str("---\n\n");

    out.push_str(post.blog.trim());
    out.push_str("\n\n<details>\n<summary>Transcript</summary>\n\n");
    out.push_str(post.transcript.trim());
    out.push_str("\n\n</details>\n");
    out
}
