//! Database layer
//!
//! Postgres repositories live in [`db`]; the pipeline, queue and HTTP layer depend on the
//! [`AssetStore`] and [`JobStore`] traits so they can run against in-memory stores in
//! tests (enable the `test-helpers` feature).

pub mod db;
pub mod store;

#[cfg(any(test, feature = "test-helpers"))]
pub mod memory;

pub use db::{AssetRepository, JobRepository, PgGroupMembership, NEW_JOB_CHANNEL};
pub use store::{AssetStore, JobStore};
