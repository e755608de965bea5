use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Returned for every accepted file of an upload request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UploadReceipt {
    pub job_id: Uuid,
    /// Unique stored name
    pub filename: String,
    pub original_filename: String,
    /// SHA-256 computed by the server
    pub checksum: String,
}
