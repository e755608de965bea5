//! External tool execution.

use std::ffi::OsStr;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

use crate::error::PreviewError;

const MAX_STDERR_CHARS: usize = 2000;

/// Runs `program` to completion, killing it once `timeout` elapses.
///
/// A non-zero exit becomes [`PreviewError::Tool`] with the tail of stderr; a program that
/// cannot be found becomes [`PreviewError::ToolUnavailable`].
#[tracing::instrument(skip(args), fields(process.executable.name = %program))]
pub async fn run_tool<I, S>(program: &str, args: I, timeout: Duration) -> Result<Output, PreviewError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // Dropping the output future on timeout kills the child.
        .kill_on_drop(true);

    let start = std::time::Instant::now();
    let output = match tokio::time::timeout(timeout, command.output()).await {
        Err(_) => {
            tracing::warn!(timeout = ?timeout, "External tool timed out");
            return Err(PreviewError::Timeout {
                tool: program.to_string(),
                timeout,
            });
        }
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PreviewError::ToolUnavailable(program.to_string()));
        }
        Ok(Err(e)) => return Err(PreviewError::Io(e)),
        Ok(Ok(output)) => output,
    };

    tracing::debug!(
        duration_ms = start.elapsed().as_millis() as u64,
        status = ?output.status.code(),
        "External tool finished"
    );

    if !output.status.success() {
        return Err(PreviewError::Tool {
            tool: program.to_string(),
            code: output.status.code(),
            stderr: stderr_tail(&output.stderr),
        });
    }
    Ok(output)
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let count = text.chars().count();
    if count <= MAX_STDERR_CHARS {
        text.to_string()
    } else {
        text.chars().skip(count - MAX_STDERR_CHARS).collect()
    }
}
