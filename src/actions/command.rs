//! Shell command wrapper.

use std::time::Duration;

use crate::config::CommandConfig;
use crate::executor::{DirectExecutor, ExecOptions, ExecResult, Executor, ExecutorError};
use crate::guard::{GuardRequest, Guarded, Guardian, Validation};

use super::{truncate_chars, ActionType};

/// Limits applied to one guarded command.
#[derive(Debug, Clone)]
pub struct CommandLimits {
    /// Execution options handed to the executor.
    pub options: ExecOptions,
    /// Characters of stdout/stderr kept in audit metadata.
    pub output_limit: usize,
}

impl Default for CommandLimits {
    fn default() -> Self {
        Self::from_config(&CommandConfig::default())
    }
}

impl CommandLimits {
    /// Limits from the `[command]` config section.
    pub fn from_config(config: &CommandConfig) -> Self {
        Self {
            options: ExecOptions {
                timeout: Duration::from_secs(config.timeout_secs),
                working_dir: None,
            },
            output_limit: config.output_limit,
        }
    }
}

/// Run `command` through `sh -c` under the guard with default limits.
///
/// A non-zero exit is not an error: the command ran, and the outcome is
/// the [`ExecResult`]. Validation grades it `fail` instead.
pub async fn wrap_command_exec(
    guardian: &Guardian,
    task_id: &str,
    lane: &str,
    command: &str,
) -> Guarded<ExecResult, ExecutorError> {
    wrap_command_exec_with(
        guardian,
        &DirectExecutor::new(),
        &CommandLimits::default(),
        task_id,
        lane,
        command,
    )
    .await
}

/// Run `command` on `executor` under the guard.
pub async fn wrap_command_exec_with(
    guardian: &Guardian,
    executor: &dyn Executor,
    limits: &CommandLimits,
    task_id: &str,
    lane: &str,
    command: &str,
) -> Guarded<ExecResult, ExecutorError> {
    let action = ActionType::CommandExec;
    let request = GuardRequest::new(
        task_id,
        lane,
        action.as_str(),
        "exit code 0",
        action.confidence_pre(),
    )
    .with_metadata("command", command);

    let output_limit = limits.output_limit;
    guardian
        .exec_with_guard(
            request,
            || executor.execute(command, limits.options.clone()),
            |result: &ExecResult| {
                Ok(Validation::from_check(result.success())
                    .with("returncode", result.exit_code)
                    .with("stdout", truncate_chars(&result.stdout, output_limit))
                    .with("stderr", truncate_chars(&result.stderr, output_limit))
                    .with("timed_out", result.timed_out))
            },
        )
        .await
}
