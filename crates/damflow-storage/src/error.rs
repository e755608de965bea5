use damflow_core::{AppError, StorageTier};
use std::path::PathBuf;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid relative path: {0}")]
    InvalidPath(String),

    #[error("Path {path} is outside of tier {tier}")]
    OutsideTier { path: PathBuf, tier: StorageTier },

    #[error("Checksum mismatch: expected {expected}, computed {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => AppError::NotFound(format!("File not found: {}", what)),
            StorageError::InvalidPath(path) => {
                AppError::InvalidInput(format!("Invalid path: {}", path))
            }
            StorageError::ChecksumMismatch { expected, actual } => {
                AppError::ChecksumMismatch { expected, actual }
            }
            other @ (StorageError::OutsideTier { .. } | StorageError::Io(_)) => {
                AppError::Storage(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use damflow_core::ErrorMetadata;

    #[test]
    fn test_checksum_mismatch_maps_to_client_error() {
        let err: AppError = StorageError::ChecksumMismatch {
            expected: "aa".to_string(),
            actual: "bb".to_string(),
        }
        .into();
        assert_eq!(err.error_code(), "CHECKSUM_MISMATCH");
        assert_eq!(err.http_status_code(), 400);
    }

    #[test]
    fn test_not_found_and_io_mapping() {
        let err: AppError = StorageError::NotFound("uploads/a.png".to_string()).into();
        assert_eq!(err.http_status_code(), 404);

        let err: AppError =
            StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk")).into();
        assert_eq!(err.error_code(), "STORAGE_ERROR");
    }
}
