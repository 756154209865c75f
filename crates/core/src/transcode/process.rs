//! Subprocess execution.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::error::ProcessError;

/// Captured result of one finished subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Trimmed stderr, or a placeholder naming the exit code when stderr is empty.
    pub fn failure_output(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("process exited with code {:?}", self.exit_code)
        } else {
            stderr.to_string()
        }
    }
}

/// Runs external binaries with an argument vector.
///
/// Implementations never go through a shell. Retry policy is the caller's.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, binary: &Path, args: &[OsString]) -> Result<ProcessOutcome, ProcessError>;
}

/// `path` as a command-line operand, byte for byte.
///
/// Relative paths get a `./` prefix, so a leading `-` is not read as an
/// option and a `name:` prefix is not read as a protocol.
pub fn path_arg(path: &Path) -> OsString {
    if path.is_absolute() || path.starts_with(".") {
        path.as_os_str().to_os_string()
    } else {
        Path::new(".").join(path).into_os_string()
    }
}

/// [`ProcessRunner`] backed by `tokio::process`.
///
/// The child is spawned with `kill_on_drop`, so dropping the returned future
/// (task abort, `select!`, timeout) kills the subprocess.
#[derive(Debug, Clone)]
pub struct TokioProcessRunner {
    timeout_secs: u64,
}

impl TokioProcessRunner {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, binary: &Path, args: &[OsString]) -> Result<ProcessOutcome, ProcessError> {
        debug!(binary = %binary.display(), ?args, "Spawning process");

        let mut child = Command::new(binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProcessError::NotFound {
                        binary: binary.to_path_buf(),
                    }
                } else {
                    ProcessError::Io(e)
                }
            })?;

        let mut stdout = child.stdout.take().ok_or_else(|| {
            ProcessError::Io(std::io::Error::other("stdout was not captured"))
        })?;
        let mut stderr = child.stderr.take().ok_or_else(|| {
            ProcessError::Io(std::io::Error::other("stderr was not captured"))
        })?;

        // Both pipes are drained while waiting, a full stderr pipe would stall the encoder.
        let result = timeout(Duration::from_secs(self.timeout_secs), async {
            let mut out = Vec::new();
            let mut err = Vec::new();
            let (_, _, status) = tokio::try_join!(
                stdout.read_to_end(&mut out),
                stderr.read_to_end(&mut err),
                child.wait(),
            )?;
            Ok::<_, std::io::Error>((status, out, err))
        })
        .await;

        match result {
            Ok(Ok((status, out, err))) => {
                let outcome = ProcessOutcome {
                    exit_code: status.code(),
                    stdout: String::from_utf8_lossy(&out).to_string(),
                    stderr: String::from_utf8_lossy(&err).to_string(),
                };
                debug!(
                    binary = %binary.display(),
                    exit_code = ?outcome.exit_code,
                    stderr_bytes = outcome.stderr.len(),
                    "Process finished"
                );
                Ok(outcome)
            }
            Ok(Err(e)) => Err(ProcessError::Io(e)),
            Err(_) => {
                // Kill the process on timeout
                let _ = child.kill().await;
                Err(ProcessError::Timeout {
                    timeout_secs: self.timeout_secs,
                })
            }
        }
    }
}
