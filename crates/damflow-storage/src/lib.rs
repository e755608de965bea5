//! damflow storage library
//!
//! Files live on the local filesystem, split into storage tiers:
//!
//! ```text
//! <root>/<tier>/uploads/              originals
//! <root>/<tier>/uploads/thumbnails/   previews
//! ```
//!
//! Database rows store the tier plus a path relative to the tier directory, so a tier
//! can be relocated by changing the root.

pub mod checksum;
pub mod error;
pub mod locator;
pub mod naming;

// Re-export commonly used types
pub use checksum::{ContentDigest, ContentHasher};
pub use damflow_core::StorageTier;
pub use error::{StorageError, StorageResult};
pub use locator::{StorageLocator, TierPaths, THUMBNAILS_DIR, UPLOADS_DIR};
pub use naming::{preview_base, sanitize_filename, split_extension, unique_stored_name};
