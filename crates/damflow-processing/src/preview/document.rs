use damflow_core::ToolSettings;
use damflow_storage::split_extension;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use super::PreviewRequest;
use crate::command::run_tool;
use crate::error::PreviewError;

const OFFICE_MIME_TYPES: &[&str] = &[
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/vnd.oasis.opendocument.text",
    "application/vnd.oasis.opendocument.spreadsheet",
    "application/vnd.oasis.opendocument.presentation",
    "application/rtf",
    "text/rtf",
];

const OFFICE_EXTENSIONS: &[&str] = &[
    "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "odp", "rtf",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Office,
    Other,
}

impl DocumentKind {
    /// By MIME type first, then by the extension of the uploaded name.
    pub fn detect(mime_type: &str, original_name: &str) -> Self {
        let mime = mime_type.trim().to_ascii_lowercase();
        let ext = split_extension(original_name)
            .1
            .trim_start_matches('.')
            .to_ascii_lowercase();

        if mime == "application/pdf" || ext == "pdf" {
            DocumentKind::Pdf
        } else if OFFICE_MIME_TYPES.contains(&mime.as_str())
            || OFFICE_EXTENSIONS.contains(&ext.as_str())
        {
            DocumentKind::Office
        } else {
            DocumentKind::Other
        }
    }
}

pub fn output_name(base: &str) -> String {
    format!("thumb_{}.png", base)
}

/// Rasterizes the first page of a PDF, converting office documents to PDF first.
pub async fn generate(
    tools: &ToolSettings,
    request: &PreviewRequest<'_>,
) -> Result<PathBuf, PreviewError> {
    let kind = DocumentKind::detect(request.mime_type, request.original_name);
    tracing::debug!(kind = ?kind, "Document preview");

    match kind {
        DocumentKind::Office => {
            // soffice names its output after the input stem, inside the scratch dir.
            let scratch = tempfile::tempdir()?;
            run_tool(
                &tools.soffice_path,
                [
                    OsStr::new("--headless"),
                    OsStr::new("--convert-to"),
                    OsStr::new("pdf"),
                    OsStr::new("--outdir"),
                    scratch.path().as_os_str(),
                    request.input.as_os_str(),
                ],
                tools.timeout(),
            )
            .await?;

            let stem = request
                .input
                .file_stem()
                .unwrap_or_else(|| OsStr::new("document"))
                .to_string_lossy();
            let pdf = scratch.path().join(format!("{}.pdf", stem));
            if !tokio::fs::try_exists(&pdf).await.unwrap_or(false) {
                return Err(PreviewError::MissingOutput(pdf.display().to_string()));
            }
            rasterize_first_page(tools, &pdf, request).await
        }
        DocumentKind::Pdf | DocumentKind::Other => {
            rasterize_first_page(tools, request.input, request).await
        }
    }
}

async fn rasterize_first_page(
    tools: &ToolSettings,
    pdf: &Path,
    request: &PreviewRequest<'_>,
) -> Result<PathBuf, PreviewError> {
    let output = request.output_dir.join(output_name(&request.base()));
    // pdftoppm appends the extension to the prefix it is given.
    let prefix = output.with_extension("");

    run_tool(
        &tools.pdftoppm_path,
        [
            OsStr::new("-png"),
            OsStr::new("-singlefile"),
            OsStr::new("-f"),
            OsStr::new("1"),
            OsStr::new("-l"),
            OsStr::new("1"),
            pdf.as_os_str(),
            prefix.as_os_str(),
        ],
        tools.timeout(),
    )
    .await?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_pdf_by_mime_or_extension() {
        assert_eq!(DocumentKind::detect("application/pdf", "x"), DocumentKind::Pdf);
        assert_eq!(
            DocumentKind::detect("application/octet-stream", "Report.PDF"),
            DocumentKind::Pdf
        );
    }

    #[test]
    fn test_detect_office_formats() {
        assert_eq!(
            DocumentKind::detect("application/msword", "letter"),
            DocumentKind::Office
        );
        assert_eq!(
            DocumentKind::detect("application/octet-stream", "slides.pptx"),
            DocumentKind::Office
        );
    }

    #[test]
    fn test_detect_other_documents() {
        assert_eq!(DocumentKind::detect("text/plain", "notes.txt"), DocumentKind::Other);
        assert_eq!(
            DocumentKind::detect("application/zip", "bundle.zip"),
            DocumentKind::Other
        );
    }
}
