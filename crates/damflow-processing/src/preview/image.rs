use image::{DynamicImage, ImageFormat, ImageReader};
use std::path::{Path, PathBuf};

use super::PreviewRequest;
use crate::error::PreviewError;

/// Bounding box of image thumbnails.
pub const THUMBNAIL_MAX_WIDTH: u32 = 300;
pub const THUMBNAIL_MAX_HEIGHT: u32 = 300;

pub fn output_name(base: &str) -> String {
    format!("thumb_{}.png", base)
}

/// Decodes the raster and writes a PNG that fits in the thumbnail box. Decoding runs on
/// the blocking pool.
pub async fn generate(request: &PreviewRequest<'_>) -> Result<PathBuf, PreviewError> {
    let input = request.input.to_path_buf();
    let output = request.output_dir.join(output_name(&request.base()));

    let target = output.clone();
    tokio::task::spawn_blocking(move || render(&input, &target)).await??;
    Ok(output)
}

fn render(input: &Path, output: &Path) -> Result<(), PreviewError> {
    let img = ImageReader::open(input)?.with_guessed_format()?.decode()?;
    fit_within(img, THUMBNAIL_MAX_WIDTH, THUMBNAIL_MAX_HEIGHT).save_with_format(output, ImageFormat::Png)?;
    Ok(())
}

/// Scales down preserving aspect ratio; images already inside the box are kept as is.
pub fn fit_within(img: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    if img.width() <= max_width && img.height() <= max_height {
        img
    } else {
        img.thumbnail(max_width, max_height)
    }
}
