//! clients/cli/src/thumbnail.rs
//!
//! Small JPEG previews stored alongside history entries.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::debug;

const THUMBNAIL_DIM: u32 = 160;
const THUMBNAIL_QUALITY: u8 = 70;

/// Returns a `data:image/jpeg;base64,...` preview, or `None` if the bytes are not a
/// decodable image.
pub fn make_thumbnail(image_bytes: &[u8]) -> Option<String> {
    let decoded = match image::load_from_memory(image_bytes) {
        Ok(img) => img,
        Err(e) => {
            debug!("Skipping thumbnail: {}", e);
            return None;
        }
    };
    let resized = decoded.thumbnail(THUMBNAIL_DIM, THUMBNAIL_DIM).to_rgb8();

    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, THUMBNAIL_QUALITY);
    encoder
        .encode_image(&DynamicImage::ImageRgb8(resized))
        .ok()?;
    Some(format!("data:image/jpeg;base64,{}", BASE64.encode(&bytes)))
}
