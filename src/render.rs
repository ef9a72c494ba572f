//! Rasterizes icons into fixed-size RGBA buffers and encodes them as PNG.

use std::io::Cursor;

use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, ImageEncoder, RgbaImage};

use crate::error::RenderError;
use crate::icon_extractor::IconImage;

/// Largest accepted target edge, in pixels.
pub const MAX_DIMENSION: u32 = 16_384;

/// A `size × size`, 8-bit-per-channel RGBA buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedBitmap {
    pixels: RgbaImage,
}

impl RenderedBitmap {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }

    /// Raw RGBA bytes, row-major from the top-left corner.
    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    /// Lossless PNG with the strongest compression the encoder offers.
    pub fn encode_png(&self) -> Result<Vec<u8>, RenderError> {
        let mut png_bytes = Cursor::new(Vec::new());
        let encoder =
            PngEncoder::new_with_quality(&mut png_bytes, CompressionType::Best, PngFilterType::Adaptive);
        encoder.write_image(
            self.pixels.as_raw(),
            self.width(),
            self.height(),
            ExtendedColorType::Rgba8,
        )?;
        Ok(png_bytes.into_inner())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BitmapRenderer;

impl BitmapRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Composites `icon` over a transparent `target_size × target_size`
    /// canvas, anchored at the top-left corner, at full opacity.
    ///
    /// The icon is drawn at its logical size, resampled from its native
    /// pixels when they differ. A logical size larger than the canvas is
    /// cropped by it and a smaller one leaves transparent padding on the
    /// right and bottom.
    pub fn render(&self, icon: &IconImage, target_size: u32) -> Result<RenderedBitmap, RenderError> {
        check_dimension(target_size)?;
        let logical_size = icon.logical_size();
        check_dimension(logical_size)?;

        let mut canvas = RgbaImage::new(target_size, target_size);
        if icon.native_dimensions() == (logical_size, logical_size) {
            imageops::overlay(&mut canvas, icon.image(), 0, 0);
        } else {
            let drawn = imageops::resize(icon.image(), logical_size, logical_size, FilterType::Lanczos3);
            imageops::overlay(&mut canvas, &drawn, 0, 0);
        }
        Ok(RenderedBitmap { pixels: canvas })
    }
}

fn check_dimension(size: u32) -> Result<(), RenderError> {
    if size == 0 || size > MAX_DIMENSION {
        return Err(RenderError::InvalidDimensions(size));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const GREEN: Rgba<u8> = Rgba([10, 200, 30, 255]);

    fn solid_icon(width: u32, height: u32, logical_size: u32) -> IconImage {
        IconImage::new(RgbaImage::from_pixel(width, height, GREEN), logical_size)
    }

    #[test]
    fn test_exact_dimensions() {
        let renderer = BitmapRenderer::new();
        let icon = solid_icon(7, 3, 8);
        for size in [1, 2, 16, 33, 512] {
            let bitmap = renderer.render(&icon, size).unwrap();
            assert_eq!((bitmap.width(), bitmap.height()), (size, size));
            assert_eq!(bitmap.as_raw().len(), (size * size * 4) as usize);
        }
    }

    #[test]
    fn test_render_is_deterministic() {
        let mut source = RgbaImage::new(40, 40);
        for (x, y, px) in source.enumerate_pixels_mut() {
            *px = Rgba([x as u8 * 6, y as u8 * 6, 128, ((x + y) * 3) as u8]);
        }
        let icon = IconImage::new(source, 64);
        let renderer = BitmapRenderer::new();

        let first = renderer.render(&icon, 64).unwrap();
        let second = renderer.render(&icon, 64).unwrap();
        assert_eq!(first.as_raw(), second.as_raw());
        assert_eq!(first.encode_png().unwrap(), second.encode_png().unwrap());
    }

    #[test]
    fn test_small_native_icon_fills_logical_size() {
        let bitmap = BitmapRenderer::new().render(&solid_icon(4, 4, 32), 32).unwrap();

        assert!(bitmap.as_image().pixels().all(|px| *px == GREEN));
        assert_eq!(*bitmap.as_image().get_pixel(31, 31), GREEN);
    }

    #[test]
    fn test_smaller_logical_size_leaves_padding() {
        let bitmap = BitmapRenderer::new().render(&solid_icon(8, 8, 6), 16).unwrap();

        for (x, y, px) in bitmap.as_image().enumerate_pixels() {
            if x < 6 && y < 6 {
                assert_eq!(*px, GREEN, "inside at {x},{y}");
            } else {
                assert_eq!(px.0[3], 0, "outside at {x},{y}");
            }
        }
    }

    #[test]
    fn test_larger_logical_size_is_cropped() {
        let mut source = RgbaImage::from_pixel(32, 32, Rgba([0, 0, 255, 255]));
        source.put_pixel(3, 3, Rgba([255, 0, 0, 255]));
        let bitmap = BitmapRenderer::new()
            .render(&IconImage::new(source, 32), 8)
            .unwrap();

        assert_eq!(bitmap.width(), 8);
        assert_eq!(*bitmap.as_image().get_pixel(3, 3), Rgba([255, 0, 0, 255]));
        assert_eq!(*bitmap.as_image().get_pixel(7, 7), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_transparent_source_stays_transparent() {
        let icon = IconImage::new(RgbaImage::new(8, 8), 8);
        let bitmap = BitmapRenderer::new().render(&icon, 8).unwrap();
        assert!(bitmap.as_image().pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_invalid_dimensions() {
        let renderer = BitmapRenderer::new();
        let icon = solid_icon(2, 2, 2);
        assert!(matches!(
            renderer.render(&icon, 0),
            Err(RenderError::InvalidDimensions(0))
        ));
        assert!(matches!(
            renderer.render(&icon, MAX_DIMENSION + 1),
            Err(RenderError::InvalidDimensions(_))
        ));
        assert!(matches!(
            renderer.render(&solid_icon(2, 2, 0), 8),
            Err(RenderError::InvalidDimensions(0))
        ));
    }

    #[test]
    fn test_png_round_trips_pixels() {
        let bitmap = BitmapRenderer::new().render(&solid_icon(3, 3, 3), 5).unwrap();
        let png = bitmap.encode_png().unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&png).unwrap().into_rgba8();
        assert_eq!(&decoded, bitmap.as_image());
    }
}
