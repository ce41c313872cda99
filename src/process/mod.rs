use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Default cap on captured output per stream
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 50 * 1024 * 1024;

/// One invocation of an external tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Value following `flag` in the argument list, if any
    pub fn arg_after(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|index| self.args.get(index + 1))
            .map(String::as_str)
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// stderr followed by stdout, for matching diagnostic phrases
    pub fn diagnostics(&self) -> String {
        match (self.stderr.trim(), self.stdout.trim()) {
            ("", out) => out.to_string(),
            (err, "") => err.to_string(),
            (err, out) => format!("{}\n{}", err, out),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ProcessError {
    #[error("program not found: {0}")]
    NotFound(String),

    #[error("{program} timed out after {}s", timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },

    #[error("failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Runs external tools; the seam every stage uses for ffmpeg and yt-dlp
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, ProcessError>;
}

/// `tokio::process` backed runner with bounded output capture
pub struct TokioCommandRunner {
    max_output_bytes: usize,
}

impl TokioCommandRunner {
    pub fn new(max_output_bytes: usize) -> Self {
        Self { max_output_bytes }
    }

    async fn collect<R>(stream: Option<R>, limit: usize) -> io::Result<String>
    where
        R: AsyncRead + Unpin,
    {
        let Some(stream) = stream else {
            return Ok(String::new());
        };

        let mut buffer = Vec::new();
        let mut limited = stream.take(limit as u64);
        limited.read_to_end(&mut buffer).await?;

        // Keep draining so the child never blocks on a full pipe
        let mut rest = limited.into_inner();
        let discarded = tokio::io::copy(&mut rest, &mut tokio::io::sink()).await?;
        if discarded > 0 {
            tracing::debug!("Discarded {} bytes of process output over the capture limit", discarded);
        }

        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl Default for TokioCommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OUTPUT_BYTES)
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, ProcessError> {
        tracing::debug!("Running: {} {}", spec.program, spec.args.join(" "));

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| match source.kind() {
                io::ErrorKind::NotFound => ProcessError::NotFound(spec.program.clone()),
                _ => ProcessError::Io {
                    program: spec.program.clone(),
                    source,
                },
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let limit = self.max_output_bytes;

        let completion = async {
            tokio::try_join!(
                Self::collect(stdout, limit),
                Self::collect(stderr, limit),
                child.wait(),
            )
        };

        let joined = match spec.timeout {
            Some(timeout) => tokio::time::timeout(timeout, completion)
                .await
                .map_err(|_| ProcessError::TimedOut {
                    program: spec.program.clone(),
                    timeout,
                })?,
            None => completion.await,
        };

        let (stdout, stderr, status) = joined.map_err(|source| ProcessError::Io {
            program: spec.program.clone(),
            source,
        })?;

        Ok(CommandOutput {
            success: status.success(),
            code: status.code(),
            stdout,
            stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_after() {
        let spec = CommandSpec::new(
            "yt-dlp",
            vec!["-f".into(), "best".into(), "-o".into(), "/tmp/out.mp4".into()],
        );
        assert_eq!(spec.arg_after("-o"), Some("/tmp/out.mp4"));
        assert_eq!(spec.arg_after("--cookies"), None);
    }

    #[test]
    fn test_diagnostics_joins_streams() {
        let output = CommandOutput {
            success: false,
            code: Some(1),
            stdout: "partial\n".into(),
            stderr: "ERROR: boom\n".into(),
        };
        assert_eq!(output.diagnostics(), "ERROR: boom\npartial");
    }

    #[tokio::test]
    async fn test_missing_program_is_not_found() {
        let runner = TokioCommandRunner::default();
        let result = runner
            .run(CommandSpec::new("video2blog-definitely-missing-binary", vec![]))
            .await;
        assert!(matches!(result, Err(ProcessError::NotFound(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_is_capped() {
        let runner = TokioCommandRunner::new(4);
        let output = runner
            .run(CommandSpec::new("sh", vec!["-c".into(), "printf 'abcdefgh'".into()]))
            .await
            .unwrap();
        assert!(output.success);
        assert_eq!(output.stdout, "abcd");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_process() {
        let runner = TokioCommandRunner::default();
        let spec = CommandSpec::new("sleep", vec!["5".into()])
            .with_timeout(Some(Duration::from_millis(100)));
        let result = runner.run(spec).await;
        assert!(matches!(result, Err(ProcessError::TimedOut { .. })));
    }
}
