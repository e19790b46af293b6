//! External tool invocation.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{FetchError, FetchResult};

/// Runs one external command to completion.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run the tool with `args`. Non-zero exit is `ProcessFailure`;
    /// a fired `cancel` kills the child and returns `Cancelled`.
    async fn run(&self, args: &[String], cancel: &CancellationToken) -> FetchResult<()>;
}

/// Runs a fixed executable (ffmpeg) as a child process.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    program: PathBuf,
    silent: bool,
}

impl FfmpegRunner {
    /// `silent` discards the child's stdout and stderr instead of forwarding them.
    pub fn new(program: impl Into<PathBuf>, silent: bool) -> Self {
        Self {
            program: program.into(),
            silent,
        }
    }

    /// Use `explicit` if given, otherwise find `ffmpeg` on PATH.
    pub fn locate(explicit: Option<&Path>, silent: bool) -> FetchResult<Self> {
        let program = match explicit {
            Some(p) => p.to_path_buf(),
            None => find_ffmpeg().ok_or_else(|| {
                FetchError::ToolUnavailable(
                    "ffmpeg not found on PATH. Install ffmpeg or set ABOOK_FFMPEG_PATH.".to_string(),
                )
            })?,
        };
        Ok(Self::new(program, silent))
    }
}

/// Find ffmpeg on PATH.
pub fn find_ffmpeg() -> Option<PathBuf> {
    which::which("ffmpeg").ok()
}

#[async_trait]
impl ToolRunner for FfmpegRunner {
    async fn run(&self, args: &[String], cancel: &CancellationToken) -> FetchResult<()> {
        debug!("running {} {}", self.program.display(), args.join(" "));

        let mut command = Command::new(&self.program);
        command.args(args).stdin(Stdio::null()).kill_on_drop(true);
        if self.silent {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        } else {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FetchError::ToolUnavailable(format!("{}: {e}", self.program.display()))
            } else {
                FetchError::Io(e)
            }
        })?;

        tokio::select! {
            status = child.wait() => {
                let status = status?;
                if status.success() {
                    Ok(())
                } else {
                    Err(FetchError::ProcessFailure { code: status.code() })
                }
            }
            _ = cancel.cancelled() => {
                warn!("interrupted; terminating {}", self.program.display());
                if let Err(e) = child.kill().await {
                    warn!("failed to kill child process: {e}");
                }
                Err(FetchError::Cancelled)
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_success() {
        let runner = FfmpegRunner::new("sh", true);
        let cancel = CancellationToken::new();
        runner.run(&args(&["-c", "exit 0"]), &cancel).await.unwrap();
    }

    #[tokio::test]
    async fn test_nonzero_exit_surfaces_code() {
        let runner = FfmpegRunner::new("sh", true);
        let cancel = CancellationToken::new();
        let err = runner
            .run(&args(&["-c", "exit 3"]), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::ProcessFailure { code: Some(3) }));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let runner = FfmpegRunner::new("/nonexistent/ffmpeg-abookfetcher", true);
        let cancel = CancellationToken::new();
        let err = runner.run(&[], &cancel).await.unwrap_err();
        assert!(matches!(err, FetchError::ToolUnavailable(_)));
    }

    #[tokio::test]
    async fn test_cancel_kills_child_promptly() {
        let runner = FfmpegRunner::new("sh", true);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = runner
            .run(&args(&["-c", "sleep 30"]), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
