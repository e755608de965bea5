use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, Response, StatusCode},
    response::IntoResponse,
};
use damflow_core::AppError;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::auth::UserContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::handlers::load_accessible_asset;
use crate::state::AppState;

/// RFC 5987 `attr-char`: everything except these is percent-encoded.
const ATTR_CHAR_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileVariant {
    Original,
    Thumb,
}

impl FileVariant {
    fn parse(raw: Option<&str>) -> Result<Self, AppError> {
        match raw.map(str::trim) {
            None | Some("") | Some("original") => Ok(FileVariant::Original),
            Some("thumb") | Some("thumbnail") => Ok(FileVariant::Thumb),
            Some(other) => Err(AppError::InvalidInput(format!(
                "Unknown file type '{}', expected 'thumb' or 'original'",
                other
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    #[serde(rename = "type")]
    pub variant: Option<String>,
}

/// Streams the original file or its preview.
#[utoipa::path(
    get,
    path = "/assets/file/{id}",
    tag = "assets",
    params(
        ("id" = String, Path, description = "Asset id"),
        ("type" = Option<String>, Query, description = "'original' (default) or 'thumb'"),
        ("x-user-id" = i64, Header, description = "Authenticated user id"),
        ("x-group-ids" = Option<String>, Header, description = "Comma separated group ids")
    ),
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream"),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "Asset or file not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, user), fields(user.id = user.user_id, asset.id = %id))]
pub async fn get_asset_file(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(id): Path<String>,
    Query(query): Query<FileQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let variant = FileVariant::parse(query.variant.as_deref())?;
    let asset = load_accessible_asset(&state, &user, &id).await?;

    let (relative, content_type, filename) = match variant {
        FileVariant::Original => (
            asset.path.clone(),
            asset.file_type.clone(),
            asset.original_filename.clone(),
        ),
        FileVariant::Thumb => {
            let preview = asset
                .thumbnail
                .clone()
                .ok_or_else(|| AppError::NotFound("Asset has no preview".to_string()))?;
            let name = preview
                .rsplit('/')
                .next()
                .unwrap_or(preview.as_str())
                .to_string();
            let content_type = preview_content_type(&preview).to_string();
            (preview, content_type, name)
        }
    };

    let (file, len) = state
        .locator
        .open_read(asset.storage_tier, &relative)
        .await?;

    tracing::debug!(path = %relative, tier = %asset.storage_tier, len, "Streaming asset file");

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, len)
        .header(header::CONTENT_DISPOSITION, content_disposition(&filename))
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

/// Previews are PNG or JPEG rasters, or the SVG placeholder.
fn preview_content_type(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// `inline` disposition carrying an ASCII fallback name and the exact UTF-8 name.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() || c == ' ') && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        utf8_percent_encode(filename, ATTR_CHAR_ENCODE)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_defaults_to_original() {
        assert_eq!(FileVariant::parse(None).unwrap(), FileVariant::Original);
        assert_eq!(FileVariant::parse(Some("")).unwrap(), FileVariant::Original);
        assert_eq!(FileVariant::parse(Some("thumb")).unwrap(), FileVariant::Thumb);
        assert!(FileVariant::parse(Some("large")).is_err());
    }

    #[test]
    fn test_preview_content_type() {
        assert_eq!(preview_content_type("uploads/thumbnails/a-1-2.png"), "image/png");
        assert_eq!(preview_content_type("uploads/thumbnails/a-1-2.JPG"), "image/jpeg");
        assert_eq!(preview_content_type("uploads/thumbnails/a-1-2.svg"), "image/svg+xml");
    }

    #[test]
    fn test_ascii_name_disposition() {
        assert_eq!(
            content_disposition("photo.png"),
            "inline; filename=\"photo.png\"; filename*=UTF-8''photo.png"
        );
    }

    #[test]
    fn test_non_ascii_name_is_encoded() {
        assert_eq!(
            content_disposition("résumé 1.pdf"),
            "inline; filename=\"r_sum_ 1.pdf\"; filename*=UTF-8''r%C3%A9sum%C3%A9%201.pdf"
        );
    }

    #[test]
    fn test_quotes_cannot_break_out_of_the_header() {
        let header = content_disposition("a\"b.txt");
        assert!(header.starts_with("inline; filename=\"a_b.txt\";"));
        assert!(header.ends_with("a%22b.txt"));
    }
}
