//! Command execution abstractions and implementations.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

pub mod direct;

pub use direct::DirectExecutor;

/// Command execution options.
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Maximum command runtime before the process is killed.
    pub timeout: Duration,
    /// Optional working directory.
    pub working_dir: Option<PathBuf>,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            working_dir: None,
        }
    }
}

/// Command execution result.
///
/// A non-zero exit is a result, not an error: the command ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    /// Command line as given.
    pub command: String,
    /// Process exit code (`None` when the process was killed or exit code unavailable).
    pub exit_code: Option<i32>,
    /// Captured stdout text.
    pub stdout: String,
    /// Captured stderr text.
    pub stderr: String,
    /// Whether the command exceeded the timeout.
    pub timed_out: bool,
    /// Wall-clock duration of the execution.
    pub duration: Duration,
}

impl ExecResult {
    /// Returns `true` when the command exited successfully (code 0, no timeout).
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Combined stdout+stderr output, separated by a newline when both are non-empty.
    pub fn output(&self) -> String {
        if self.stdout.is_empty() {
            return self.stderr.clone();
        }
        if self.stderr.is_empty() {
            return self.stdout.clone();
        }
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Errors produced by executor operations.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The process could not be spawned or awaited.
    #[error("failed to run command: {0}")]
    Spawn(#[from] std::io::Error),
    /// The command line was empty.
    #[error("empty command")]
    EmptyCommand,
}

/// Runs shell command lines.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Execute a command line with options and capture output.
    async fn execute(&self, command: &str, opts: ExecOptions) -> Result<ExecResult, ExecutorError>;
}
