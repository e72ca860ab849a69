//! Image work for the editor: sizing bitmap overlays and rendering stop
//! thumbnails

use crate::Result;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, ImageReader, RgbaImage};
use std::io::Cursor;

/// Thumbnail size used by the tour editor's slide strip
pub const THUMBNAIL_WIDTH: u32 = 96;
pub const THUMBNAIL_HEIGHT: u32 = 45;

/// Pixel size of an encoded image, read from its header
pub fn image_dimensions(data: &[u8]) -> Result<(u32, u32)> {
    let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
    Ok(reader.into_dimensions()?)
}

/// Scales a rendered view down to a PNG thumbnail. The frame is cropped
/// about its center to the thumbnail's aspect ratio first, so nothing is
/// stretched.
pub fn render_thumbnail(frame: &RgbaImage, width: u32, height: u32) -> Result<Vec<u8>> {
    let width = width.max(1);
    let height = height.max(1);
    let (fw, fh) = frame.dimensions();

    let target_aspect = width as f64 / height as f64;
    let (crop_w, crop_h) = if fw as f64 / (fh.max(1) as f64) > target_aspect {
        (((fh as f64) * target_aspect).round() as u32, fh)
    } else {
        (fw, ((fw as f64) / target_aspect).round() as u32)
    };
    let crop_w = crop_w.clamp(1, fw.max(1));
    let crop_h = crop_h.clamp(1, fh.max(1));
    let x = (fw.saturating_sub(crop_w)) / 2;
    let y = (fh.saturating_sub(crop_h)) / 2;

    let cropped = imageops::crop_imm(frame, x, y, crop_w, crop_h).to_image();
    let thumb = imageops::resize(&cropped, width, height, FilterType::Triangle);
    encode_png(thumb)
}

/// Decodes any supported image and renders it as a thumbnail
pub fn thumbnail_from_bytes(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let frame = image::load_from_memory(data)?.to_rgba8();
    render_thumbnail(&frame, width, height)
}

fn encode_png(image: RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    DynamicImage::ImageRgba8(image).write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
    Ok(buffer)
}
