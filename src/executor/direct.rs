//! Host shell executor.

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{ExecOptions, ExecResult, Executor, ExecutorError};

/// Runs command lines through `sh -c` on the host.
#[derive(Debug, Clone, Default)]
pub struct DirectExecutor;

impl DirectExecutor {
    /// Create a host executor.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Executor for DirectExecutor {
    async fn execute(&self, command: &str, opts: ExecOptions) -> Result<ExecResult, ExecutorError> {
        if command.trim().is_empty() {
            return Err(ExecutorError::EmptyCommand);
        }

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        if let Some(dir) = &opts.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let started = Instant::now();
        let child = cmd.spawn()?;
        match timeout(opts.timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                let result = ExecResult {
                    command: command.to_owned(),
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    timed_out: false,
                    duration: started.elapsed(),
                };
                debug!(exit_code = ?result.exit_code, "command finished");
                Ok(result)
            }
            Err(_) => {
                warn!(
                    timeout_secs = opts.timeout.as_secs(),
                    "command timed out, process killed"
                );
                Ok(ExecResult {
                    command: command.to_owned(),
                    exit_code: None,
                    stdout: String::new(),
                    stderr: String::new(),
                    timed_out: true,
                    duration: started.elapsed(),
                })
            }
        }
    }
}
