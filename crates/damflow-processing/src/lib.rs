//! Media processing library
//!
//! Derives preview artifacts for uploaded assets and runs the asset pipeline that turns a
//! queued upload into a persisted asset record.
//!
//! # Modules
//! - `preview` - preview generators (image, video, document, placeholder)
//! - `command` - bounded execution of external tools
//! - `pipeline` - the upload to asset state machine
//! - `maintenance` - cleanup and soft-delete job handlers

pub mod command;
pub mod error;
pub mod maintenance;
pub mod pipeline;
pub mod preview;

pub use error::PreviewError;
pub use maintenance::{run_cleanup, run_soft_delete};
pub use pipeline::{AssetPipeline, PipelineStage};
pub use preview::{PreviewGenerator, PreviewRequest};
