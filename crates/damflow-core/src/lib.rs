//! damflow core library
//!
//! Domain models, error types, configuration and the access-control seams shared by
//! every damflow component.

pub mod access;
pub mod config;
pub mod constants;
pub mod error;
pub mod job_error;
pub mod models;
pub mod progress;
pub mod storage_types;

// Re-export commonly used types
pub use access::{AccessChecker, GroupMembership, GroupPermission, MembershipAccessChecker};
pub use config::{BaseConfig, Config, JobQueueSettings, StorageSettings, ToolSettings};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use job_error::{JobError, JobResultExt};
pub use progress::ProgressReporter;
pub use storage_types::StorageTier;
