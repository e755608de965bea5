//! Preview generators
//!
//! One generator per kind of preview, selected by [`PreviewGenerator::select`]. Every
//! generator writes into the output directory it is given (creating it if needed),
//! leaves the source untouched and names its output after the stored filename, which is
//! already unique.

pub mod document;
pub mod image;
pub mod placeholder;
pub mod video;

use std::path::{Path, PathBuf};

use damflow_core::models::MediaClass;
use damflow_core::ToolSettings;
use damflow_storage::preview_base;

use self::document::DocumentKind;
use crate::error::PreviewError;

/// Inputs shared by all generators.
#[derive(Debug, Clone, Copy)]
pub struct PreviewRequest<'a> {
    /// Stored original
    pub input: &'a Path,
    /// Unique name of the stored original
    pub stored_name: &'a str,
    /// Name the client uploaded the file under
    pub original_name: &'a str,
    pub mime_type: &'a str,
    pub output_dir: &'a Path,
}

impl PreviewRequest<'_> {
    /// Stem shared by every preview of this file.
    pub fn base(&self) -> String {
        preview_base(self.stored_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewGenerator {
    Image,
    Video,
    /// PDF and office documents
    Document,
    /// Any other document
    Placeholder,
}

impl PreviewGenerator {
    pub fn select(mime_type: &str, original_name: &str) -> Self {
        match MediaClass::classify(mime_type) {
            MediaClass::Image => PreviewGenerator::Image,
            MediaClass::Video => PreviewGenerator::Video,
            MediaClass::Document => match DocumentKind::detect(mime_type, original_name) {
                DocumentKind::Pdf | DocumentKind::Office => PreviewGenerator::Document,
                DocumentKind::Other => PreviewGenerator::Placeholder,
            },
        }
    }

    /// Every preview file name a generator may write for `stored_name`.
    pub fn output_names(stored_name: &str) -> Vec<String> {
        let base = preview_base(stored_name);
        let mut names = vec![
            image::output_name(&base),
            video::output_name(&base),
            document::output_name(&base),
            placeholder::output_name(&base),
        ];
        names.sort();
        names.dedup();
        names
    }

    /// Writes the preview and returns its full path.
    #[tracing::instrument(
        skip(self, tools, request),
        fields(generator = ?self, stored_name = %request.stored_name, mime_type = %request.mime_type)
    )]
    pub async fn generate(
        &self,
        tools: &ToolSettings,
        request: &PreviewRequest<'_>,
    ) -> Result<PathBuf, PreviewError> {
        tokio::fs::create_dir_all(request.output_dir).await?;

        let output = match self {
            PreviewGenerator::Image => image::generate(request).await?,
            PreviewGenerator::Video => video::generate(tools, request).await?,
            PreviewGenerator::Document => document::generate(tools, request).await?,
            PreviewGenerator::Placeholder => placeholder::generate(request).await?,
        };

        // Tools that exit cleanly without writing are treated as failures.
        if !tokio::fs::try_exists(&output).await.unwrap_or(false) {
            return Err(PreviewError::MissingOutput(output.display().to_string()));
        }

        tracing::debug!(output = %output.display(), "Preview generated");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_selection() {
        assert_eq!(
            PreviewGenerator::select("image/png", "a.png"),
            PreviewGenerator::Image
        );
        assert_eq!(
            PreviewGenerator::select("video/mp4", "a.mp4"),
            PreviewGenerator::Video
        );
        assert_eq!(
            PreviewGenerator::select("application/pdf", "a.pdf"),
            PreviewGenerator::Document
        );
        assert_eq!(
            PreviewGenerator::select("application/octet-stream", "deck.pptx"),
            PreviewGenerator::Document
        );
        assert_eq!(
            PreviewGenerator::select("application/zip", "bundle.zip"),
            PreviewGenerator::Placeholder
        );
    }

    #[test]
    fn test_output_names_share_one_prefix() {
        assert_eq!(
            PreviewGenerator::output_names("clip-1-2.mp4"),
            vec![
                "thumb_clip-1-2.jpg".to_string(),
                "thumb_clip-1-2.png".to_string(),
                "thumb_clip-1-2.svg".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_document_gets_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("notes-1-2.txt");
        std::fs::write(&input, b"plain text").unwrap();
        let request = PreviewRequest {
            input: &input,
            stored_name: "notes-1-2.txt",
            original_name: "notes.txt",
            mime_type: "text/plain",
            output_dir: dir.path(),
        };

        let generator = PreviewGenerator::select(request.mime_type, request.original_name);
        let output = generator
            .generate(&ToolSettings::default(), &request)
            .await
            .unwrap();
        assert_eq!(output, dir.path().join("thumb_notes-1-2.svg"));
    }

    #[test]
    fn test_request_base_strips_extension() {
        let request = PreviewRequest {
            input: Path::new("/tmp/photo-1-2.png"),
            stored_name: "photo-1-2.png",
            original_name: "photo.png",
            mime_type: "image/png",
            output_dir: Path::new("/tmp/thumbs"),
        };
        assert_eq!(request.base(), "photo-1-2");
    }
}
