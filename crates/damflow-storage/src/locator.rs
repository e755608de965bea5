use std::path::{Component, Path, PathBuf};
use tokio::fs;

use crate::error::{StorageError, StorageResult};
use damflow_core::StorageTier;

/// Originals directory, relative to a tier directory.
pub const UPLOADS_DIR: &str = "uploads";
/// Previews directory, relative to a tier directory.
pub const THUMBNAILS_DIR: &str = "uploads/thumbnails";

/// Concrete directories of one tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierPaths {
    pub tier: StorageTier,
    pub base: PathBuf,
    pub uploads: PathBuf,
    pub thumbnails: PathBuf,
}

/// Resolves storage tiers to directories beneath a storage root.
#[derive(Debug, Clone)]
pub struct StorageLocator {
    root: PathBuf,
    default_tier: StorageTier,
}

impl StorageLocator {
    pub fn new(root: impl Into<PathBuf>, default_tier: StorageTier) -> Self {
        Self {
            root: root.into(),
            default_tier,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn default_tier(&self) -> StorageTier {
        self.default_tier
    }

    pub fn tier_dir(&self, tier: StorageTier) -> PathBuf {
        self.root.join(tier.dir_name())
    }

    pub fn uploads_dir(&self, tier: StorageTier) -> PathBuf {
        self.tier_dir(tier).join(UPLOADS_DIR)
    }

    pub fn thumbnails_dir(&self, tier: StorageTier) -> PathBuf {
        self.tier_dir(tier).join(THUMBNAILS_DIR)
    }

    pub fn paths(&self, tier: StorageTier) -> TierPaths {
        TierPaths {
            tier,
            base: self.tier_dir(tier),
            uploads: self.uploads_dir(tier),
            thumbnails: self.thumbnails_dir(tier),
        }
    }

    /// Creates the tier's upload and thumbnail directories. Safe to call repeatedly and
    /// from concurrent workers.
    pub async fn ensure_directories(&self, tier: StorageTier) -> StorageResult<TierPaths> {
        let paths = self.paths(tier);
        // create_dir_all treats a directory that already exists as success, including one
        // created by a racing caller.
        fs::create_dir_all(&paths.thumbnails).await?;
        tracing::trace!(tier = %tier, path = %paths.base.display(), "Tier directories ready");
        Ok(paths)
    }

    /// The preferred tier, or the configured default. Directories are created before
    /// returning.
    pub async fn select_tier(&self, preferred: Option<StorageTier>) -> StorageResult<TierPaths> {
        let tier = preferred.unwrap_or(self.default_tier);
        self.ensure_directories(tier).await
    }

    /// Strips the tier directory from `full_path`, yielding the `/`-separated form that
    /// gets persisted.
    pub fn relative_path(&self, tier: StorageTier, full_path: &Path) -> StorageResult<String> {
        let base = self.tier_dir(tier);
        let relative = full_path
            .strip_prefix(&base)
            .map_err(|_| StorageError::OutsideTier {
                path: full_path.to_path_buf(),
                tier,
            })?;

        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => {
                    return Err(StorageError::OutsideTier {
                        path: full_path.to_path_buf(),
                        tier,
                    })
                }
            }
        }
        if parts.is_empty() {
            return Err(StorageError::InvalidPath(full_path.display().to_string()));
        }
        Ok(parts.join("/"))
    }

    /// Resolves a persisted relative path. Absolute paths and parent references are
    /// rejected.
    pub fn full_path(&self, tier: StorageTier, relative: &str) -> StorageResult<PathBuf> {
        let candidate = Path::new(relative);
        if relative.is_empty()
            || candidate.is_absolute()
            || candidate
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(StorageError::InvalidPath(relative.to_string()));
        }
        Ok(self.tier_dir(tier).join(candidate))
    }

    /// Whether `path` lies beneath the storage root without escaping it.
    pub fn contains(&self, path: &Path) -> bool {
        match path.strip_prefix(&self.root) {
            Ok(rest) => rest
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir)),
            Err(_) => false,
        }
    }

    /// Recovers the tier of a path beneath the root from its first component.
    pub fn parse_tier(&self, path: &Path) -> Option<StorageTier> {
        let rest = path.strip_prefix(&self.root).ok()?;
        match rest.components().next()? {
            Component::Normal(first) => first.to_str()?.parse().ok(),
            _ => None,
        }
    }

    /// Opens a stored file for streaming, returning it with its length.
    pub async fn open_read(
        &self,
        tier: StorageTier,
        relative: &str,
    ) -> StorageResult<(fs::File, u64)> {
        let path = self.full_path(tier, relative)?;
        let file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(relative.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;
        let len = file.metadata().await?.len();
        Ok((file, len))
    }
}
