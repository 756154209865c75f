//! Mock process runner for testing.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::transcode::{ProcessError, ProcessOutcome, ProcessRunner};

/// A recorded subprocess invocation for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub binary: PathBuf,
    /// Arguments as text, lossily converted.
    pub args: Vec<String>,
    /// Arguments exactly as passed.
    pub raw_args: Vec<OsString>,
}

impl RecordedCall {
    /// Whether any argument contains `pattern`.
    pub fn has_arg(&self, pattern: &str) -> bool {
        self.args.iter().any(|a| a.contains(pattern))
    }

    /// The argument following `flag`.
    pub fn value_after(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Last argument, which is the output path for every ffmpeg command.
    pub fn output_path(&self) -> Option<PathBuf> {
        self.raw_args.last().map(PathBuf::from)
    }
}

#[derive(Debug, Clone)]
enum Failure {
    NotFound,
    Timeout(u64),
}

/// Scripted reply for one invocation.
#[derive(Debug, Clone)]
pub struct MockResponse {
    outcome: ProcessOutcome,
    failure: Option<Failure>,
    output_bytes: Option<Vec<u8>>,
    delay: Option<Duration>,
}

impl MockResponse {
    /// Exit 0 with no output.
    pub fn ok() -> Self {
        Self::ok_stdout("")
    }

    /// Exit 0 with `stdout`.
    pub fn ok_stdout(stdout: &str) -> Self {
        Self {
            outcome: ProcessOutcome {
                exit_code: Some(0),
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
            failure: None,
            output_bytes: None,
            delay: None,
        }
    }

    /// Non-zero exit with `stderr`.
    pub fn exit_with(code: i32, stderr: &str) -> Self {
        Self {
            outcome: ProcessOutcome {
                exit_code: Some(code),
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
            failure: None,
            output_bytes: None,
            delay: None,
        }
    }

    /// The binary does not exist.
    pub fn missing_binary() -> Self {
        Self {
            failure: Some(Failure::NotFound),
            ..Self::ok()
        }
    }

    /// The process timed out.
    pub fn timed_out(timeout_secs: u64) -> Self {
        Self {
            failure: Some(Failure::Timeout(timeout_secs)),
            ..Self::ok()
        }
    }

    /// Write `bytes` to the output path (the last argument) like a real encoder.
    pub fn writing_output(mut self, bytes: &[u8]) -> Self {
        self.output_bytes = Some(bytes.to_vec());
        self
    }

    /// Sleep before replying. Lets tests cancel a run mid-command.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Mock implementation of the ProcessRunner trait.
///
/// Replies are chosen by argument pattern; the most recently registered
/// matching rule wins. Unmatched invocations succeed with empty output.
///
/// # Example
///
/// ```rust,ignore
/// use vidingest_core::testing::{MockProcessRunner, MockResponse};
///
/// let runner = MockProcessRunner::new();
/// runner.on_args_containing("-encoders", MockResponse::ok_stdout(" V....D libx264  H.264\n")).await;
/// runner.on_args_containing("-frames:v", MockResponse::exit_with(1, "seek failed")).await;
///
/// // ... run the pipeline ...
///
/// assert_eq!(runner.calls_matching("-frames:v").await.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockProcessRunner {
    calls: Arc<RwLock<Vec<RecordedCall>>>,
    rules: Arc<RwLock<Vec<(String, MockResponse)>>>,
}

impl MockProcessRunner {
    /// Create a new mock runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `response` to invocations with an argument containing `pattern`.
    pub async fn on_args_containing(&self, pattern: &str, response: MockResponse) {
        self.rules
            .write()
            .await
            .push((pattern.to_string(), response));
    }

    /// Get all recorded calls.
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.read().await.clone()
    }

    /// Recorded calls with an argument containing `pattern`.
    pub async fn calls_matching(&self, pattern: &str) -> Vec<RecordedCall> {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.has_arg(pattern))
            .cloned()
            .collect()
    }

    /// Get the number of invocations.
    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    async fn response_for(&self, args: &[String]) -> MockResponse {
        self.rules
            .read()
            .await
            .iter()
            .rev()
            .find(|(pattern, _)| args.iter().any(|a| a.contains(pattern.as_str())))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(MockResponse::ok)
    }
}

#[async_trait]
impl ProcessRunner for MockProcessRunner {
    async fn run(&self, binary: &Path, args: &[OsString]) -> Result<ProcessOutcome, ProcessError> {
        let text: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        self.calls.write().await.push(RecordedCall {
            binary: binary.to_path_buf(),
            args: text.clone(),
            raw_args: args.to_vec(),
        });

        let response = self.response_for(&text).await;

        if let Some(delay) = response.delay {
            tokio::time::sleep(delay).await;
        }

        match response.failure {
            Some(Failure::NotFound) => {
                return Err(ProcessError::NotFound {
                    binary: binary.to_path_buf(),
                })
            }
            Some(Failure::Timeout(timeout_secs)) => {
                return Err(ProcessError::Timeout { timeout_secs })
            }
            None => {}
        }

        if let (Some(bytes), Some(output)) = (&response.output_bytes, args.last()) {
            tokio::fs::write(Path::new(output), bytes).await?;
        }

        Ok(response.outcome)
    }
}
