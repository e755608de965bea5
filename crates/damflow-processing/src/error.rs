use std::time::Duration;
use thiserror::Error;

/// Preview generation failures. All of them are worth another attempt.
#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("{tool} exited with status {code:?}: {stderr}")]
    Tool {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{0} is not installed or not executable")]
    ToolUnavailable(String),

    #[error("{tool} did not finish within {timeout:?}")]
    Timeout { tool: String, timeout: Duration },

    #[error("Expected output {0} was not produced")]
    MissingOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Preview task panicked or was cancelled: {0}")]
    Join(#[from] tokio::task::JoinError),
}
