//! Test fixtures

use image::{ImageFormat, Rgb, RgbImage};
use damflow_storage::ContentHasher;
use std::io::Cursor;

/// A small solid-colour PNG.
pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([200, 40, 40]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .expect("Failed to encode PNG");
    out.into_inner()
}

pub fn text_file(contents: &str) -> Vec<u8> {
    contents.as_bytes().to_vec()
}

/// Lowercase hex SHA-256, as a client would send it.
pub fn sha256_hex(data: &[u8]) -> String {
    ContentHasher::digest_bytes(data).to_hex()
}
