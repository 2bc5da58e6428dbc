//! JPEG covers for snapshots

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageResult, RgbaImage};

use crate::emulator::Frame;

/// Encode a presented frame as a JPEG at `quality` (1..=100).
///
/// Alpha is dropped. Returns `None` for an empty frame or one whose pixel
/// buffer does not match its size.
pub fn encode_cover(frame: &Frame, quality: u8) -> ImageResult<Option<Vec<u8>>> {
    if frame.width == 0 || frame.height == 0 {
        return Ok(None);
    }
    let Some(rgba) = RgbaImage::from_raw(frame.width, frame.height, frame.rgba.clone()) else {
        return Ok(None);
    };
    let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();

    let mut jpeg = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut jpeg), quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)?;
    Ok(Some(jpeg))
}
