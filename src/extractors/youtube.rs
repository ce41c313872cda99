use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::cookies::CookieProvisioner;
use super::AcquiredVideo;
use crate::process::{CommandOutput, CommandRunner, CommandSpec, ProcessError};
use crate::utils::{extract_domain, format_file_size, tail_lines, validate_and_normalize_url};
use crate::{PipelineError, Result};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Phrases yt-dlp prints when YouTube wants a signed-in session
const AUTH_CHALLENGE_SIGNATURES: &[&str] = &[
    "sign in",
    "use --cookies",
    "cookies are required",
    "cookies are needed",
    "login required",
    "requires login",
    "login to view",
    "log in to",
];

/// One strategy for fetching a remote video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadProfile {
    pub name: &'static str,
    pub format: &'static str,
    pub player_client: &'static str,
    pub extra_args: &'static [&'static str],
}

/// Profiles tried in order until one yields a non-empty file
pub const DEFAULT_PROFILES: &[DownloadProfile] = &[
    DownloadProfile {
        name: "mp4-720p",
        format: "(bv*[ext=mp4][height<=720]+ba[ext=m4a])/best[ext=mp4]/best",
        player_client: "android,web",
        extra_args: &[
            "--user-agent",
            BROWSER_USER_AGENT,
            "--add-header",
            "Referer:https://www.youtube.com",
            "--add-header",
            "Accept-Language:en-US,en;q=0.9",
            "--no-live-from-start",
        ],
    },
    DownloadProfile {
        name: "best-android",
        format: "best",
        player_client: "android",
        extra_args: &[
            "--user-agent",
            BROWSER_USER_AGENT,
            "--add-header",
            "Referer:https://www.youtube.com",
        ],
    },
    DownloadProfile {
        name: "best-ios",
        format: "best",
        player_client: "ios",
        extra_args: &[],
    },
];

impl DownloadProfile {
    /// Full yt-dlp argument list for this profile
    pub fn arguments(&self, url: &str, output: &Path, cookies: Option<&Path>) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-f".into(),
            self.format.into(),
            "--extractor-args".into(),
            format!("youtube:player_client={}", self.player_client),
        ];
        args.extend(self.extra_args.iter().map(|arg| arg.to_string()));

        args.extend(
            [
                "--no-playlist",
                "--no-warnings",
                "--extractor-retries",
                "3",
                "--socket-timeout",
                "30",
                "--no-check-certificates",
                "--geo-bypass",
                "--force-overwrites",
            ]
            .iter()
            .map(|arg| arg.to_string()),
        );

        if let Some(cookies) = cookies {
            args.push("--cookies".into());
            args.push(cookies.to_string_lossy().into_owned());
        }

        args.push("-o".into());
        args.push(output.to_string_lossy().into_owned());
        args.push(url.to_string());
        args
    }
}

/// Whether downloader diagnostics describe an authentication wall
pub fn is_auth_challenge(diagnostics: &str) -> bool {
    let lower = diagnostics.to_lowercase();
    AUTH_CHALLENGE_SIGNATURES
        .iter()
        .any(|signature| lower.contains(signature))
}

/// YouTube (and other yt-dlp supported sites) video downloader
pub struct YoutubeDownloader {
    runner: Arc<dyn CommandRunner>,
    binaries: Vec<String>,
    profiles: Vec<DownloadProfile>,
    cookies: CookieProvisioner,
    scratch_root: PathBuf,
    timeout: Duration,
}

impl YoutubeDownloader {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        binaries: Vec<String>,
        cookies: CookieProvisioner,
        scratch_root: PathBuf,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            binaries,
            profiles: DEFAULT_PROFILES.to_vec(),
            cookies,
            scratch_root,
            timeout,
        }
    }

    pub fn with_profiles(mut self, profiles: Vec<DownloadProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    /// Download `url` into a fresh per-request directory.
    ///
    /// Profiles run strictly one after another. An auth challenge stops the
    /// loop at once; any other failure moves on to the next profile.
    pub async fn download(&self, url: &str) -> Result<AcquiredVideo> {
        let url = validate_and_normalize_url(url)?;

        tokio::fs::create_dir_all(&self.scratch_root).await?;
        let scratch = tempfile::Builder::new()
            .prefix("download-")
            .tempdir_in(&self.scratch_root)?;

        tracing::info!(
            "Downloading video from {}",
            extract_domain(&url).unwrap_or_else(|| url.clone())
        );

        let cookies = self.cookies.materialize(scratch.path()).await?;
        let output = scratch.path().join(format!("{}.mp4", Uuid::new_v4()));

        let result = self
            .try_profiles(&url, &output, cookies.as_ref().map(|c| c.path()))
            .await;

        // Temporary cookie material goes away on every path
        drop(cookies);

        result.map(|()| AcquiredVideo {
            path: output,
            scratch: Some(scratch),
        })
    }

    async fn try_profiles(&self, url: &str, output: &Path, cookies: Option<&Path>) -> Result<()> {
        let mut last_error: Option<PipelineError> = None;

        for (index, profile) in self.profiles.iter().enumerate() {
            tracing::info!(
                profile = profile.name,
                attempt = index + 1,
                total = self.profiles.len(),
                "Trying download profile"
            );

            remove_stale(output).await;
            let args = profile.arguments(url, output, cookies);

            let result = match self.run_with_fallback_binaries(args).await {
                Ok(result) => result,
                Err(PipelineError::ToolNotFound(tool)) => {
                    tracing::warn!(profile = profile.name, "yt-dlp not found at any location: {}", tool);
                    continue;
                }
                Err(e) => {
                    tracing::warn!(profile = profile.name, error = %e, "Download attempt failed");
                    last_error = Some(e);
                    continue;
                }
            };

            if !result.success {
                let diagnostics = result.diagnostics();
                if is_auth_challenge(&diagnostics) {
                    tracing::warn!(profile = profile.name, "Download blocked by authentication challenge");
                    return Err(PipelineError::AuthRequired(format!(
                        "the site requires a signed-in session; configure YTDLP_COOKIES or YTDLP_COOKIES_FILE ({})",
                        tail_lines(&diagnostics, 1)
                    )));
                }

                tracing::warn!(
                    profile = profile.name,
                    code = ?result.code,
                    "yt-dlp exited with failure: {}",
                    tail_lines(&diagnostics, 3)
                );
                last_error = Some(PipelineError::DownloadFailed(format!(
                    "profile {} failed: {}",
                    profile.name,
                    tail_lines(&diagnostics, 3)
                )));
                continue;
            }

            match tokio::fs::metadata(output).await {
                Ok(meta) if meta.len() > 0 => {
                    tracing::info!(
                        profile = profile.name,
                        "Download complete: {} ({})",
                        output.display(),
                        format_file_size(meta.len())
                    );
                    return Ok(());
                }
                Ok(_) => {
                    tracing::warn!(profile = profile.name, "Downloaded file is empty, trying next profile");
                    last_error = Some(PipelineError::EmptyDownload(format!(
                        "profile {} produced a zero-byte file",
                        profile.name
                    )));
                }
                Err(e) => {
                    tracing::warn!(profile = profile.name, "Could not verify downloaded file: {}", e);
                    last_error = Some(PipelineError::DownloadFailed(format!(
                        "profile {} reported success but no file was written",
                        profile.name
                    )));
                }
            }
        }

        remove_stale(output).await;
        Err(last_error.unwrap_or_else(|| {
            PipelineError::ToolNotFound(format!("yt-dlp (searched: {})", self.binaries.join(", ")))
        }))
    }

    /// Run one profile, moving to the next install location only when the
    /// binary is missing.
    async fn run_with_fallback_binaries(&self, args: Vec<String>) -> Result<CommandOutput> {
        for binary in &self.binaries {
            let spec = CommandSpec::new(binary.clone(), args.clone()).with_timeout(Some(self.timeout));

            match self.runner.run(spec).await {
                Ok(output) => return Ok(output),
                Err(ProcessError::NotFound(_)) => {
                    tracing::debug!("yt-dlp not found at {}", binary);
                }
                Err(e @ ProcessError::TimedOut { .. }) => {
                    return Err(PipelineError::DownloadFailed(e.to_string()));
                }
                Err(e @ ProcessError::Io { .. }) => {
                    return Err(PipelineError::DownloadFailed(e.to_string()));
                }
            }
        }

        Err(PipelineError::ToolNotFound(self.binaries.join(", ")))
    }
}

async fn remove_stale(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::debug!("Could not remove stale download {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::MockCommandRunner;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    fn downloader(runner: MockCommandRunner, root: &Path) -> YoutubeDownloader {
        YoutubeDownloader::new(
            Arc::new(runner),
            vec!["yt-dlp".into()],
            CookieProvisioner::default(),
            root.to_path_buf(),
            Duration::from_secs(300),
        )
    }

    fn failed(stderr: &str) -> CommandOutput {
        CommandOutput {
            success: false,
            code: Some(1),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    fn write_output(spec: &CommandSpec, bytes: &[u8]) -> CommandOutput {
        let output = spec.arg_after("-o").expect("output path");
        std::fs::write(output, bytes).unwrap();
        CommandOutput {
            success: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_auth_signatures() {
        assert!(is_auth_challenge(
            "ERROR: [youtube] abc: Sign in to confirm you're not a bot. Use --cookies-from-browser or --cookies"
        ));
        assert!(is_auth_challenge("ERROR: This video requires login"));
        assert!(is_auth_challenge(
            "ERROR: [youtube] abc: Private video. Sign in if you've been granted access to this video"
        ));
        assert!(!is_auth_challenge("ERROR: Requested format is not available"));
    }

    #[test]
    fn test_profile_arguments_share_base_flags() {
        let output = Path::new("/tmp/v.mp4");
        let cookies = Path::new("/tmp/c.txt");
        for profile in DEFAULT_PROFILES {
            let args = profile.arguments(URL, output, Some(cookies));
            for flag in ["--no-playlist", "--extractor-retries", "--socket-timeout", "--no-check-certificates"] {
                assert!(args.iter().any(|a| a == flag), "{} missing {}", profile.name, flag);
            }
            let spec = CommandSpec::new("yt-dlp", args);
            assert_eq!(spec.arg_after("--cookies"), Some("/tmp/c.txt"));
            assert_eq!(spec.arg_after("-f"), Some(profile.format));
            assert_eq!(spec.args.last().map(String::as_str), Some(URL));
        }
    }

    #[tokio::test]
    async fn test_auth_challenge_short_circuits_profiles() {
        let root = tempfile::tempdir().unwrap();
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .times(1)
            .returning(|_| Ok(failed("ERROR: [youtube] x: Sign in to confirm you're not a bot")));

        let result = downloader(runner, root.path()).download(URL).await;

        assert!(matches!(result, Err(PipelineError::AuthRequired(_))));
        // Scratch directory is gone with the failed request
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_private_video_is_auth_required_without_fallback() {
        let root = tempfile::tempdir().unwrap();
        let mut runner = MockCommandRunner::new();
        runner.expect_run().times(1).returning(|_| {
            Ok(failed(
                "ERROR: [youtube] abc: Private video. Sign in if you've been granted access to this video",
            ))
        });

        let result = downloader(runner, root.path()).download(URL).await;
        assert!(matches!(result, Err(PipelineError::AuthRequired(_))));
    }

    #[tokio::test]
    async fn test_empty_output_falls_back_to_next_profile() {
        let root = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();

        let mut runner = MockCommandRunner::new();
        runner.expect_run().times(2).returning(move |spec| {
            let call = seen.fetch_add(1, Ordering::SeqCst);
            match call {
                0 => {
                    assert_eq!(spec.arg_after("-f"), Some(DEFAULT_PROFILES[0].format));
                    Ok(write_output(&spec, b""))
                }
                _ => {
                    assert_eq!(spec.arg_after("-f"), Some(DEFAULT_PROFILES[1].format));
                    Ok(write_output(&spec, b"video-bytes"))
                }
            }
        });

        let video = downloader(runner, root.path()).download(URL).await.unwrap();
        assert_eq!(std::fs::read(&video.path).unwrap(), b"video-bytes");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_all_profiles_failing_surfaces_last_error() {
        let root = tempfile::tempdir().unwrap();
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .times(DEFAULT_PROFILES.len())
            .returning(|_| Ok(failed("ERROR: Requested format is not available")));

        let result = downloader(runner, root.path()).download(URL).await;
        match result {
            Err(PipelineError::DownloadFailed(message)) => assert!(message.contains("best-ios")),
            other => panic!("unexpected result: {:?}", other.map(|v| v.path)),
        }
    }

    #[tokio::test]
    async fn test_missing_binary_tries_next_location_then_reports_tool_not_found() {
        let root = tempfile::tempdir().unwrap();
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .times(2 * DEFAULT_PROFILES.len())
            .returning(|spec| Err(ProcessError::NotFound(spec.program)));

        let downloader = YoutubeDownloader::new(
            Arc::new(runner),
            vec!["yt-dlp".into(), "/usr/local/bin/yt-dlp".into()],
            CookieProvisioner::default(),
            root.path().to_path_buf(),
            Duration::from_secs(300),
        );

        let result = downloader.download(URL).await;
        assert!(matches!(result, Err(PipelineError::ToolNotFound(_))));
    }

    #[tokio::test]
    async fn test_second_location_used_when_first_missing() {
        let root = tempfile::tempdir().unwrap();
        let mut runner = MockCommandRunner::new();
        runner.expect_run().times(2).returning(|spec| {
            if spec.program == "yt-dlp" {
                Err(ProcessError::NotFound(spec.program))
            } else {
                Ok(write_output(&spec, b"ok"))
            }
        });

        let downloader = YoutubeDownloader::new(
            Arc::new(runner),
            vec!["yt-dlp".into(), "/opt/yt-dlp".into()],
            CookieProvisioner::default(),
            root.path().to_path_buf(),
            Duration::from_secs(300),
        );

        let video = downloader.download(URL).await.unwrap();
        assert!(video.path.exists());
    }

    #[tokio::test]
    async fn test_temporary_cookies_removed_after_attempt() {
        let root = tempfile::tempdir().unwrap();
        let cookie_path = Arc::new(std::sync::Mutex::new(None::<PathBuf>));
        let recorded = cookie_path.clone();

        let mut runner = MockCommandRunner::new();
        runner.expect_run().times(1).returning(move |spec| {
            let path = PathBuf::from(spec.arg_after("--cookies").expect("cookies flag"));
            assert!(path.exists());
            *recorded.lock().unwrap() = Some(path);
            Ok(failed("ERROR: login required"))
        });

        let downloader = YoutubeDownloader::new(
            Arc::new(runner),
            vec!["yt-dlp".into()],
            CookieProvisioner::new(None, Some("# Netscape HTTP Cookie File\\n".into())),
            root.path().to_path_buf(),
            Duration::from_secs(300),
        );

        let result = downloader.download(URL).await;
        assert!(matches!(result, Err(PipelineError::AuthRequired(_))));

        let path = cookie_path.lock().unwrap().clone().unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_empty_url_is_invalid_input() {
        let root = tempfile::tempdir().unwrap();
        let runner = MockCommandRunner::new();
        let result = downloader(runner, root.path()).download("  ").await;
        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
    }
}
