//! Shell action execution with a bounded timeout
//!
//! Output is captured, never streamed. The call blocks the current thread, so
//! async callers must run it through `spawn_blocking`.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::error::ActionError;

/// Captured result of a successful shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `command_line` through `sh -c`
pub fn run_shell(command_line: &str, limit: Duration) -> Result<ShellOutput, ActionError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let child = shell_command(command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Dropping the child on timeout kills it
        let output = timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| ActionError::ShellTimeout(limit))??;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!(command = command_line, %stdout, %stderr, "shell output");

        if !output.status.success() {
            return Err(ActionError::ShellExit {
                code: output.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok::<_, ActionError>(ShellOutput { stdout, stderr })
    })
}

fn shell_command(command_line: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(command_line);
    command
}
