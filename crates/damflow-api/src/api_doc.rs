//! OpenAPI documentation, served at `/api/openapi.json` and browsable at `/docs`.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use damflow_core::models;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "damflow API",
        version = "0.1.0",
        description = "Asset ingestion and processing. Uploads are verified, stored on a storage tier and processed asynchronously into catalogued assets with previews and metadata. Identity is taken from the x-user-id and x-group-ids headers set by the upstream gateway."
    ),
    paths(
        handlers::upload::upload_assets,
        handlers::jobs::get_job_status,
        handlers::files::get_asset_file,
        handlers::assets::list_assets,
        handlers::assets::search_assets,
        handlers::assets::get_asset,
        handlers::assets::delete_assets,
        handlers::metadata::list_metadata_fields,
        handlers::metadata::get_asset_metadata,
        handlers::metadata::save_asset_metadata,
        handlers::health::health_check,
    ),
    components(schemas(
        error::ErrorResponse,
        handlers::upload::UploadResponse,
        handlers::jobs::JobNotFound,
        handlers::assets::DeleteAssetsRequest,
        handlers::assets::DeleteAssetsResponse,
        handlers::metadata::SaveMetadataRequest,
        handlers::health::HealthCheckResponse,
        models::Asset,
        models::AssetStatus,
        models::AssetSearchPage,
        models::Pagination,
        models::AssetMetadataEntry,
        models::MetadataField,
        models::MetadataFieldType,
        models::MetadataValue,
        models::JobStatus,
        models::JobKind,
        models::JobState,
        models::UploadReceipt,
        models::AssetJobResult,
        damflow_core::StorageTier,
    )),
    tags(
        (name = "assets", description = "Upload, listing, download and deletion of assets"),
        (name = "jobs", description = "Processing job status"),
        (name = "metadata", description = "Metadata fields and values"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;
