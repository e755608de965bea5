//! damflow API library
//!
//! HTTP handlers, the upload service, application state and setup. The binary in
//! `main.rs` wires these together; integration tests build the router directly.

pub mod api_doc;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod services;
pub mod setup;
pub mod state;
pub mod telemetry;

mod job_dispatch;

pub use error::{ErrorResponse, HttpAppError};
pub use state::{AppDependencies, AppState};
