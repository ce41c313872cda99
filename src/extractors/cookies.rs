use base64::{engine::general_purpose, Engine as _};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::config::DownloaderConfig;
use crate::Result;

/// Cookie file handed to yt-dlp via `--cookies`.
///
/// Files synthesized from inline configuration are temporary and removed when
/// the material is dropped; a configured cookie file is never touched.
#[derive(Debug)]
pub struct CookieMaterial {
    path: PathBuf,
    temporary: bool,
}

impl CookieMaterial {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }
}

impl Drop for CookieMaterial {
    fn drop(&mut self) {
        if !self.temporary {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed temporary cookie file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Could not remove cookie file {}: {}", self.path.display(), e),
        }
    }
}

/// Turns downloader cookie configuration into a file yt-dlp can read
#[derive(Debug, Clone, Default)]
pub struct CookieProvisioner {
    cookies_file: Option<PathBuf>,
    inline: Option<String>,
}

impl CookieProvisioner {
    pub fn new(cookies_file: Option<PathBuf>, inline: Option<String>) -> Self {
        Self {
            cookies_file,
            inline: inline.filter(|content| !content.trim().is_empty()),
        }
    }

    pub fn from_config(config: &DownloaderConfig) -> Self {
        Self::new(config.cookies_file.clone(), config.cookies.clone())
    }

    /// Resolve cookie material for one acquisition attempt.
    ///
    /// An explicit file wins over inline content. Inline content is written
    /// into `scratch_dir` under a fresh name.
    pub async fn materialize(&self, scratch_dir: &Path) -> Result<Option<CookieMaterial>> {
        if let Some(path) = &self.cookies_file {
            if tokio::fs::metadata(path).await.is_ok() {
                tracing::debug!("Using cookie file {}", path.display());
                return Ok(Some(CookieMaterial {
                    path: path.clone(),
                    temporary: false,
                }));
            }
            tracing::warn!("Configured cookie file {} does not exist; ignoring", path.display());
        }

        let Some(inline) = &self.inline else {
            return Ok(None);
        };

        let path = scratch_dir.join(format!("cookies-{}.txt", Uuid::new_v4()));
        tokio::fs::write(&path, normalize_cookie_content(inline)).await?;
        tracing::debug!("Wrote inline cookies to {}", path.display());

        Ok(Some(CookieMaterial {
            path,
            temporary: true,
        }))
    }
}

/// Decode base64 cookie content when it is not already Netscape text, then
/// turn escaped `\n` sequences into real newlines.
pub fn normalize_cookie_content(content: &str) -> String {
    let trimmed = content.trim();

    let text = if looks_like_cookie_jar(trimmed) {
        trimmed.to_string()
    } else {
        let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
        general_purpose::STANDARD
            .decode(compact.as_bytes())
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .unwrap_or_else(|| trimmed.to_string())
    };

    let mut normalized = text.replace("\\r\\n", "\n").replace("\\n", "\n").replace("\\t", "\t");
    if !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

fn looks_like_cookie_jar(content: &str) -> bool {
    content.starts_with('#') || content.contains('\t') || content.contains("\\t")
}

#[cfg(test)]
mod tests {
    use super::*;

    const JAR: &str = "# Netscape HTTP Cookie File\n.youtube.com\tTRUE\t/\tTRUE\t0\tSID\tabc\n";

    #[test]
    fn test_raw_content_with_escaped_newlines() {
        let escaped = "# Netscape HTTP Cookie File\\n.youtube.com\\tTRUE\\t/\\tTRUE\\t0\\tSID\\tabc";
        assert_eq!(normalize_cookie_content(escaped), JAR);
    }

    #[test]
    fn test_base64_content_is_decoded() {
        let encoded = general_purpose::STANDARD.encode(JAR);
        assert_eq!(normalize_cookie_content(&encoded), JAR);
    }

    #[tokio::test]
    async fn test_inline_cookies_are_temporary() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = CookieProvisioner::new(None, Some(JAR.to_string()));

        let material = provisioner.materialize(dir.path()).await.unwrap().unwrap();
        let path = material.path().to_path_buf();
        assert!(material.is_temporary());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), JAR);

        drop(material);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_configured_file_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("cookies.txt");
        std::fs::write(&file, JAR).unwrap();

        let provisioner = CookieProvisioner::new(Some(file.clone()), Some("ignored".into()));
        let material = provisioner.materialize(dir.path()).await.unwrap().unwrap();
        assert!(!material.is_temporary());
        assert_eq!(material.path(), file.as_path());

        drop(material);
        assert!(file.exists());
    }

    #[tokio::test]
    async fn test_no_configuration_means_no_cookies() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = CookieProvisioner::new(None, Some("   ".into()));
        assert!(provisioner.materialize(dir.path()).await.unwrap().is_none());
    }
}
