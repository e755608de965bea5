//! Upload ingestion
//!
//! Streams every `file` part of a multipart request to the selected tier's `uploads/`
//! directory while hashing it, verifies client checksums, then enqueues one processing
//! job per file:
//!
//! ```text
//! receive (stream + hash) -> authorize group -> verify checksums -> enqueue
//! ```
//!
//! Nothing is enqueued unless every file of the request passed verification. Files that
//! will never be processed are removed before returning the error.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use chrono::Utc;
use damflow_core::models::{AssetJobPayload, JobKind, MediaClass, UploadReceipt, UploadedFile};
use damflow_core::{AppError, StorageTier};
use damflow_storage::{unique_stored_name, ContentDigest, ContentHasher, TierPaths};
use tokio::io::AsyncWriteExt;

use crate::auth::UserContext;
use crate::state::AppState;

const FILE_FIELD: &str = "file";
const CHECKSUM_FIELD: &str = "checksum";
const GROUP_FIELD: &str = "group_id";
const STORAGE_FIELD: &str = "storage";
const KEYWORDS_FIELD: &str = "keywords";
const DESCRIPTION_FIELD: &str = "description";

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// A file written to disk together with the digest computed while writing it.
struct ReceivedFile {
    file: UploadedFile,
    digest: ContentDigest,
}

#[derive(Default)]
struct UploadForm {
    files: Vec<ReceivedFile>,
    /// Client digests, matched to files by position
    checksums: Vec<String>,
    group_id: Option<i64>,
    tier: Option<StorageTier>,
    keywords: Option<String>,
    description: Option<String>,
    fields: BTreeMap<String, String>,
}

pub struct UploadService {
    state: Arc<AppState>,
}

impl UploadService {
    pub fn new(state: &Arc<AppState>) -> Self {
        Self {
            state: state.clone(),
        }
    }

    /// Receives, verifies and enqueues every file of the request.
    #[tracing::instrument(skip(self, user, multipart), fields(user.id = user.user_id))]
    pub async fn upload(
        &self,
        user: &UserContext,
        mut multipart: Multipart,
    ) -> Result<Vec<UploadReceipt>, AppError> {
        let mut form = UploadForm::default();
        if let Err(e) = self.receive(&mut multipart, &mut form).await {
            discard(&form.files).await;
            return Err(e);
        }

        if form.files.is_empty() {
            return Err(AppError::InvalidInput("No file provided".to_string()));
        }

        if let Err(e) = self.authorize(user, &form).await {
            discard(&form.files).await;
            return Err(e);
        }

        if let Err(e) = verify_checksums(&form) {
            tracing::warn!(error = %e, files = form.files.len(), "Rejecting upload");
            discard(&form.files).await;
            return Err(e);
        }

        let tier = form
            .tier
            .unwrap_or_else(|| self.state.locator.default_tier());
        let keywords = form.keywords.take();
        let description = form.description.take();
        let fields = std::mem::take(&mut form.fields);

        let mut receipts = Vec::with_capacity(form.files.len());
        for (index, received) in form.files.iter().enumerate() {
            let file = &received.file;
            let payload = AssetJobPayload {
                file: file.clone(),
                owner_user_id: user.user_id,
                group_id: form.group_id,
                storage_tier: tier,
                keywords: keywords.clone(),
                description: description.clone(),
                fields: fields.clone(),
                uploaded_at: Utc::now(),
            };
            let kind = JobKind::from(MediaClass::classify(&file.mime_type));

            let enqueued = match serde_json::to_value(&payload) {
                Ok(value) => self
                    .state
                    .queue
                    .enqueue_default(kind, value)
                    .await
                    .map_err(AppError::from),
                Err(e) => Err(AppError::Internal(format!(
                    "Failed to encode job payload: {}",
                    e
                ))),
            };

            let job_id = match enqueued {
                Ok(id) => id,
                Err(e) => {
                    // Files already enqueued belong to their jobs now.
                    discard(&form.files[index..]).await;
                    return Err(e);
                }
            };

            tracing::info!(
                job.id = %job_id,
                job.kind = %kind,
                stored_name = %file.stored_name,
                size = file.size,
                tier = %tier,
                "Upload accepted"
            );
            receipts.push(UploadReceipt {
                job_id,
                filename: file.stored_name.clone(),
                original_filename: file.original_name.clone(),
                checksum: received.digest.to_hex(),
            });
        }

        Ok(receipts)
    }

    async fn receive(&self, multipart: &mut Multipart, form: &mut UploadForm) -> Result<(), AppError> {
        let mut paths: Option<TierPaths> = None;

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                FILE_FIELD => {
                    let tier_paths = match &paths {
                        Some(p) => p.clone(),
                        None => {
                            let selected = self.state.locator.select_tier(form.tier).await?;
                            form.tier = Some(selected.tier);
                            paths = Some(selected.clone());
                            selected
                        }
                    };
                    let received = self.store_field(field, &tier_paths).await?;
                    form.files.push(received);
                }
                CHECKSUM_FIELD => {
                    form.checksums.push(read_text(field).await?.trim().to_string());
                }
                GROUP_FIELD => {
                    let value = read_text(field).await?;
                    let value = value.trim();
                    form.group_id = if value.is_empty() {
                        None
                    } else {
                        Some(value.parse().map_err(|_| {
                            AppError::InvalidInput(format!("Invalid group_id '{}'", value))
                        })?)
                    };
                }
                STORAGE_FIELD => {
                    if !form.files.is_empty() {
                        return Err(AppError::InvalidInput(
                            "The storage field must precede the files".to_string(),
                        ));
                    }
                    let value = read_text(field).await?;
                    if !value.trim().is_empty() {
                        form.tier = Some(value.parse().map_err(|_| {
                            AppError::InvalidInput(format!("Unknown storage tier '{}'", value.trim()))
                        })?);
                    }
                }
                KEYWORDS_FIELD => form.keywords = Some(read_text(field).await?),
                DESCRIPTION_FIELD => form.description = Some(read_text(field).await?),
                "" => {
                    tracing::debug!("Skipping unnamed multipart field");
                }
                _ => {
                    let value = read_text(field).await?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(())
    }

    /// Streams one file part to disk. A partially written file is removed on failure.
    async fn store_field(
        &self,
        mut field: Field<'_>,
        paths: &TierPaths,
    ) -> Result<ReceivedFile, AppError> {
        let original_name = field
            .file_name()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("unknown")
            .to_string();
        let mime_type = field
            .content_type()
            .map(normalize_mime_type)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());

        let stored_name = unique_stored_name(&original_name);
        let path: PathBuf = paths.uploads.join(&stored_name);
        let max_size = self.state.max_upload_size_bytes;

        let mut out = tokio::fs::File::create(&path).await?;
        let mut hasher = ContentHasher::new();
        let mut size: u64 = 0;

        let written = async {
            while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                size += chunk.len() as u64;
                if size > max_size {
                    return Err(AppError::PayloadTooLarge(format!(
                        "File exceeds maximum allowed size of {} MB",
                        max_size / 1024 / 1024
                    )));
                }
                hasher.update(&chunk);
                out.write_all(&chunk).await?;
            }
            out.flush().await?;
            Ok::<(), AppError>(())
        }
        .await;
        drop(out);

        if let Err(e) = written {
            if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), error = %remove_err, "Failed to remove partial upload");
            }
            return Err(e);
        }

        let digest = hasher.finalize();
        tracing::debug!(
            stored_name = %stored_name,
            size,
            mime_type = %mime_type,
            "Stored upload"
        );

        Ok(ReceivedFile {
            file: UploadedFile {
                original_name,
                stored_name,
                path,
                mime_type,
                size,
                checksum: digest.to_hex(),
            },
            digest,
        })
    }

    async fn authorize(&self, user: &UserContext, form: &UploadForm) -> Result<(), AppError> {
        let Some(group_id) = form.group_id else {
            return Ok(());
        };
        if self
            .state
            .access
            .can_upload_to_group(group_id, user.user_id)
            .await?
        {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Uploading to group {} requires member or admin standing",
                group_id
            )))
        }
    }
}

/// Every supplied checksum must match its file. Empty entries skip verification.
fn verify_checksums(form: &UploadForm) -> Result<(), AppError> {
    for (received, expected) in form.files.iter().zip(&form.checksums) {
        if expected.is_empty() {
            continue;
        }
        received.digest.verify(expected)?;
    }
    Ok(())
}

async fn discard(files: &[ReceivedFile]) {
    for received in files {
        let path = &received.file.path;
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "Discarded upload"),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to discard upload")
            }
        }
    }
}

async fn read_text(field: Field<'_>) -> Result<String, AppError> {
    field.text().await.map_err(multipart_error)
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::InvalidInput(format!("Failed to read multipart: {}", err.body_text()))
    }
}

/// Strips MIME parameters ("image/jpeg; q=1" -> "image/jpeg").
fn normalize_mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_mime_type() {
        assert_eq!(normalize_mime_type("Image/JPEG; charset=utf-8"), "image/jpeg");
        assert_eq!(normalize_mime_type("video/mp4"), "video/mp4");
        assert_eq!(normalize_mime_type(""), "");
    }

    fn received(data: &[u8]) -> ReceivedFile {
        let digest = ContentHasher::digest_bytes(data);
        ReceivedFile {
            file: UploadedFile {
                original_name: "a.txt".to_string(),
                stored_name: "a-1-1.txt".to_string(),
                path: PathBuf::from("/nonexistent/a-1-1.txt"),
                mime_type: "text/plain".to_string(),
                size: data.len() as u64,
                checksum: digest.to_hex(),
            },
            digest,
        }
    }

    #[test]
    fn test_checksums_match_by_position() {
        let form = UploadForm {
            files: vec![received(b"one"), received(b"two")],
            checksums: vec![
                String::new(),
                ContentHasher::digest_bytes(b"two").to_hex().to_uppercase(),
            ],
            ..Default::default()
        };
        assert!(verify_checksums(&form).is_ok());
    }

    #[test]
    fn test_checksum_mismatch_is_reported() {
        let form = UploadForm {
            files: vec![received(b"one")],
            checksums: vec![ContentHasher::digest_bytes(b"other").to_hex()],
            ..Default::default()
        };
        let err = verify_checksums(&form).unwrap_err();
        assert!(matches!(err, AppError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_files_without_checksums_pass() {
        let form = UploadForm {
            files: vec![received(b"one"), received(b"two")],
            ..Default::default()
        };
        assert!(verify_checksums(&form).is_ok());
    }
}
