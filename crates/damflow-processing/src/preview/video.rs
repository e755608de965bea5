use damflow_core::ToolSettings;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use super::PreviewRequest;
use crate::command::run_tool;
use crate::error::PreviewError;

/// Position of the captured frame as a fraction of the duration.
pub const FRAME_POSITION: f64 = 0.3;
pub const FRAME_WIDTH: u32 = 640;
pub const FRAME_HEIGHT: u32 = 360;

pub fn output_name(base: &str) -> String {
    format!("thumb_{}.jpg", base)
}

/// Captures a single frame at 30% of the duration.
pub async fn generate(
    tools: &ToolSettings,
    request: &PreviewRequest<'_>,
) -> Result<PathBuf, PreviewError> {
    let output = request.output_dir.join(output_name(&request.base()));

    let duration = read_duration(tools, request.input).await?;
    let seek = capture_offset(duration);
    tracing::debug!(duration, seek, "Capturing video frame");

    let scale = format!("scale={}:{}", FRAME_WIDTH, FRAME_HEIGHT);
    let seek = format!("{:.3}", seek);
    run_tool(
        &tools.ffmpeg_path,
        [
            OsStr::new("-y"),
            OsStr::new("-ss"),
            OsStr::new(&seek),
            OsStr::new("-i"),
            request.input.as_os_str(),
            OsStr::new("-frames:v"),
            OsStr::new("1"),
            OsStr::new("-vf"),
            OsStr::new(&scale),
            output.as_os_str(),
        ],
        tools.timeout(),
    )
    .await?;

    Ok(output)
}

/// Container duration in seconds, or `None` when ffprobe reports none (live streams,
/// some raw formats).
async fn read_duration(tools: &ToolSettings, input: &Path) -> Result<Option<f64>, PreviewError> {
    let output = run_tool(
        &tools.ffprobe_path,
        [
            OsStr::new("-v"),
            OsStr::new("error"),
            OsStr::new("-show_entries"),
            OsStr::new("format=duration"),
            OsStr::new("-of"),
            OsStr::new("default=noprint_wrappers=1:nokey=1"),
            input.as_os_str(),
        ],
        tools.timeout(),
    )
    .await?;

    Ok(parse_duration(&String::from_utf8_lossy(&output.stdout)))
}

pub fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .find_map(|line| line.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
}

pub fn capture_offset(duration: Option<f64>) -> f64 {
    duration.map(|d| d * FRAME_POSITION).unwrap_or(0.0)
}
