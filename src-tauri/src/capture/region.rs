//! Pure pixel logic: stitching and encoding.
//!
//! This module has zero infrastructure dependencies.
//! It takes pixel data in, returns pixel data out.

use crate::geometry::ScreenBox;
use image::{imageops, DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;

/// Stitch per-monitor captures into one image covering `target`.
///
/// Each source is paired with the virtual-screen box it was captured from.
/// Only the part of each source that intersects `target` is copied; areas of
/// `target` not covered by any source stay transparent.
pub fn compose(target: ScreenBox, sources: &[(ScreenBox, RgbaImage)]) -> RgbaImage {
    let mut canvas = RgbaImage::new(target.width(), target.height());

    for (bounds, pixels) in sources {
        let Some(overlap) = target.intersect(*bounds) else {
            continue;
        };
        let src_x = (overlap.left - bounds.left) as u32;
        let src_y = (overlap.top - bounds.top) as u32;
        let width = overlap.width().min(pixels.width().saturating_sub(src_x));
        let height = overlap.height().min(pixels.height().saturating_sub(src_y));
        if width == 0 || height == 0 {
            continue;
        }

        let piece = imageops::crop_imm(pixels, src_x, src_y, width, height).to_image();
        imageops::replace(
            &mut canvas,
            &piece,
            (overlap.left - target.left) as i64,
            (overlap.top - target.top) as i64,
        );
    }

    canvas
}

/// Like `compose`, but at the sources' native resolution.
///
/// HiDPI captures hold more pixels than their box. The output uses the
/// densest source's pixels per unit; sparser sources are upscaled to match,
/// so nothing is thrown away before the image reaches the vision service.
pub fn compose_native(target: ScreenBox, sources: Vec<(ScreenBox, RgbaImage)>) -> RgbaImage {
    let ratio = sources
        .iter()
        .map(|(bounds, pixels)| pixel_ratio(*bounds, pixels))
        .fold(1.0_f64, f64::max);
    if ratio <= 1.0 {
        return compose(target, &sources);
    }

    let scaled: Vec<(ScreenBox, RgbaImage)> = sources
        .into_iter()
        .map(|(bounds, pixels)| {
            let bounds = bounds.scaled(ratio);
            if pixels.dimensions() == (bounds.width(), bounds.height()) {
                return (bounds, pixels);
            }
            let resized = imageops::resize(
                &pixels,
                bounds.width(),
                bounds.height(),
                imageops::FilterType::Triangle,
            );
            (bounds, resized)
        })
        .collect();
    compose(target.scaled(ratio), &scaled)
}

/// Captured pixels per unit of `bounds`, horizontally.
fn pixel_ratio(bounds: ScreenBox, pixels: &RgbaImage) -> f64 {
    if bounds.width() == 0 {
        return 1.0;
    }
    pixels.width() as f64 / bounds.width() as f64
}

/// Encode RGBA pixels as PNG bytes, in memory.
pub fn encode_png(pixels: &RgbaImage) -> Result<Vec<u8>, EncodeError> {
    if pixels.width() == 0 || pixels.height() == 0 {
        return Err(EncodeError::ZeroDimension);
    }

    let mut png_bytes: Vec<u8> = Vec::new();
    DynamicImage::ImageRgba8(pixels.clone())
        .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(|e| EncodeError::EncodingFailed(e.to_string()))?;

    Ok(png_bytes)
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Image has zero width or height")]
    ZeroDimension,

    #[error("PNG encoding failed: {0}")]
    EncodingFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(w: u32, h: u32, value: u8) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([value, value, value, 255]))
    }

    #[test]
    fn encode_produces_png_magic() {
        let bytes = encode_png(&RgbaImage::new(100, 100)).unwrap();
        assert_eq!(&bytes[..4], &[0x89, 0x50, 0x4E, 0x47]);
    }

    #[test]
    fn encode_zero_dimension_fails() {
        let result = encode_png(&RgbaImage::new(0, 50));
        assert!(matches!(result, Err(EncodeError::ZeroDimension)));
    }

    #[test]
    fn compose_crops_a_single_monitor() {
        let mut screen = solid(200, 100, 0);
        screen.put_pixel(110, 60, Rgba([255, 0, 0, 255]));
        let out = compose(
            ScreenBox::new(100, 50, 150, 80),
            &[(ScreenBox::new(0, 0, 200, 100), screen)],
        );
        assert_eq!(out.dimensions(), (50, 30));
        assert_eq!(out.get_pixel(10, 10), &Rgba([255, 0, 0, 255]));
        assert_eq!(out.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn compose_spans_two_monitors_with_negative_origin() {
        let left = solid(100, 100, 10);
        let right = solid(100, 100, 20);
        let out = compose(
            ScreenBox::new(-50, 0, 50, 100),
            &[
                (ScreenBox::new(-100, 0, 0, 100), left),
                (ScreenBox::new(0, 0, 100, 100), right),
            ],
        );
        assert_eq!(out.dimensions(), (100, 100));
        assert_eq!(out.get_pixel(49, 50)[0], 10);
        assert_eq!(out.get_pixel(50, 50)[0], 20);
    }

    #[test]
    fn compose_leaves_uncovered_area_transparent() {
        let out = compose(
            ScreenBox::new(0, 0, 300, 100),
            &[(ScreenBox::new(0, 0, 100, 100), solid(100, 100, 5))],
        );
        assert_eq!(out.get_pixel(250, 50)[3], 0);
    }

    #[test]
    fn compose_native_keeps_retina_pixels() {
        let mut screen = solid(200, 100, 0);
        screen.put_pixel(20, 20, Rgba([255, 0, 0, 255]));
        let out = compose_native(
            ScreenBox::new(5, 5, 55, 30),
            vec![(ScreenBox::new(0, 0, 100, 50), screen)],
        );
        assert_eq!(out.dimensions(), (100, 50));
        assert_eq!(out.get_pixel(10, 10), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn compose_native_upscales_the_sparser_display() {
        let retina = solid(200, 100, 10);
        let plain = solid(100, 50, 20);
        let out = compose_native(
            ScreenBox::new(0, 0, 200, 50),
            vec![
                (ScreenBox::new(0, 0, 100, 50), retina),
                (ScreenBox::new(100, 0, 200, 50), plain),
            ],
        );
        assert_eq!(out.dimensions(), (400, 100));
        assert_eq!(out.get_pixel(199, 50)[0], 10);
        assert_eq!(out.get_pixel(200, 50)[0], 20);
    }

    #[test]
    fn compose_native_without_hidpi_matches_compose() {
        let out = compose_native(
            ScreenBox::new(10, 10, 40, 30),
            vec![(ScreenBox::new(0, 0, 100, 100), solid(100, 100, 7))],
        );
        assert_eq!(out.dimensions(), (30, 20));
    }
}
