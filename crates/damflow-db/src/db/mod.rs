//! Postgres repositories
//!
//! Each repository owns a `PgPool` clone and is cheap to clone itself.

pub mod asset;
pub mod job;
pub mod membership;

pub use asset::AssetRepository;
pub use job::{JobRepository, NEW_JOB_CHANNEL};
pub use membership::PgGroupMembership;
