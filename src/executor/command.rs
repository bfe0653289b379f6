// Shell command execution

use crate::executor::config::ExecutorConfig;
use crate::executor::error::ExecutionError;
use crate::executor::types::ExecutionResult;
use std::process::{ExitStatus, Stdio};
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Runs command strings through the platform shell
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    shell: String,
    shell_arg: String,
}

impl CommandExecutor {
    pub fn new(shell: impl Into<String>, shell_arg: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            shell_arg: shell_arg.into(),
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(config.shell.clone(), config.shell_arg.clone())
    }

    /// Run `command` and report the outcome
    ///
    /// Never fails: invocation faults are folded into a result with
    /// `return_code == -1` and a descriptive `stderr`.
    pub async fn execute(&self, command: &str) -> ExecutionResult {
        match self.try_execute(command).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    command = %preview(command),
                    error = %e,
                    "command execution failed"
                );
                ExecutionResult::failed(e)
            }
        }
    }

    /// Run `command`, keeping invocation faults typed
    pub async fn try_execute(&self, command: &str) -> Result<ExecutionResult, ExecutionError> {
        let start = Instant::now();

        debug!(shell = %self.shell, command = %preview(command), "spawning shell");

        let mut cmd = Command::new(&self.shell);
        cmd.arg(&self.shell_arg);
        shell_command_arg(&mut cmd, command);

        let child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExecutionError::Spawn {
                shell: self.shell.clone(),
                source,
            })?;

        let output = child
            .wait_with_output()
            .await
            .map_err(ExecutionError::Wait)?;

        let stdout = decode_stream(output.stdout, "stdout")?;
        let stderr = decode_stream(output.stderr, "stderr")?;
        let return_code = return_code(output.status);

        info!(
            command = %preview(command),
            duration_ms = start.elapsed().as_millis() as u64,
            return_code = return_code,
            stdout_bytes = stdout.len(),
            stderr_bytes = stderr.len(),
            "command executed"
        );

        Ok(ExecutionResult::completed(stdout, stderr, return_code))
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::from_config(&ExecutorConfig::default())
    }
}

/// Pass the command string to the shell untouched
#[cfg(not(windows))]
fn shell_command_arg(cmd: &mut Command, command: &str) {
    cmd.arg(command);
}

/// cmd.exe parses its own command line, so MSVC argument quoting would mangle quotes
#[cfg(windows)]
fn shell_command_arg(cmd: &mut Command, command: &str) {
    cmd.raw_arg(command);
}

/// Decode captured bytes as UTF-8; an empty stream is an empty string
fn decode_stream(bytes: Vec<u8>, stream: &'static str) -> Result<String, ExecutionError> {
    if bytes.is_empty() {
        return Ok(String::new());
    }
    String::from_utf8(bytes).map_err(|source| ExecutionError::Decode { stream, source })
}

/// Exit code of the child; a signal-terminated child reports the negated signal number
fn return_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }

    crate::executor::types::ERROR_RETURN_CODE
}

fn preview(command: &str) -> String {
    command.chars().take(100).collect()
}
