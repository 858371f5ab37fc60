//! Page rasterization into caller-owned pixel buffers.

use std::ops::Deref;

use image::ImageEncoder;
use tracing::{debug, warn};

use crate::engine::{Engine, RenderOptions};
use crate::error::{Error, Result};
use crate::geometry::{ClipRect, Matrix};
use crate::session::Session;

/// Bytes per pixel (R, G, B, A).
pub const BYTES_PER_PIXEL: usize = 4;

/// A tightly packed 4-byte-per-pixel buffer produced by [`Session::render_page`].
///
/// Pixels are RGBA, or BGRA when the session's `render.rgba_byte_order` is off.
///
/// The buffer belongs to the caller; the session keeps no reference to it.
/// Dropping it or calling [`RenderBuffer::release`] frees the memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderBuffer {
    width: u32,
    height: u32,
    rgba: bool,
    data: Vec<u8>,
}

impl RenderBuffer {
    pub const fn width(&self) -> u32 {
        self.width
    }

    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Whether pixels are stored as RGBA rather than BGRA.
    pub const fn is_rgba(&self) -> bool {
        self.rgba
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Pixel bytes at `(x, y)` in buffer order, with the origin at the top-left corner.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = self.data.get(offset..offset + BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Give the buffer back.
    pub fn release(self) {
        debug!("Released {}x{} render buffer", self.width, self.height);
    }

    /// Encode as PNG (always RGBA).
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let swapped;
        let pixels = if self.rgba {
            &self.data
        } else {
            let mut data = self.data.clone();
            for pixel in data.chunks_exact_mut(BYTES_PER_PIXEL) {
                pixel.swap(0, 2);
            }
            swapped = data;
            &swapped
        };

        let mut png_data = Vec::new();
        // Use fast compression for better performance (still lossless)
        let encoder = image::codecs::png::PngEncoder::new_with_quality(
            &mut png_data,
            image::codecs::png::CompressionType::Fast,
            image::codecs::png::FilterType::Adaptive,
        );

        encoder
            .write_image(
                pixels,
                self.width,
                self.height,
                image::ExtendedColorType::Rgba8,
            )
            .map_err(|e| Error::Encode(format!("Failed to encode PNG: {e}")))?;

        Ok(png_data)
    }
}

impl Deref for RenderBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl AsRef<[u8]> for RenderBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// Allocate `bytes` bytes filled with `fill`, reporting allocation failure.
fn allocate(bytes: usize, fill: u8) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    data.try_reserve_exact(bytes).map_err(|_| {
        warn!("Failed to allocate {} byte render buffer", bytes);
        Error::BufferAllocation { bytes }
    })?;
    data.resize(bytes, fill);
    Ok(data)
}

impl<E: Engine> Session<E> {
    /// Rasterize a page into a new `width * height * 4` byte buffer.
    ///
    /// `transform` maps page space onto the pixel grid; the clip is the whole
    /// output. The buffer starts out filled with the configured background
    /// (opaque white by default). If the page can't be resolved the buffer is
    /// dropped and the cache's error is returned. If the engine fails while
    /// drawing, the background-only buffer is returned.
    pub fn render_page(
        &mut self,
        page_num: i32,
        width: i32,
        height: i32,
        transform: &Matrix,
    ) -> Result<RenderBuffer> {
        let (w, h) = match (u32::try_from(width), u32::try_from(height)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
            _ => {
                warn!("Invalid render size {}x{}", width, height);
                return Err(Error::InvalidRenderSize { width, height });
            }
        };

        let bytes = (w as usize)
            .checked_mul(h as usize)
            .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
            .ok_or(Error::BufferAllocation { bytes: usize::MAX })?;

        let options = RenderOptions {
            annotations: self.config().render.annotations,
            rgba_byte_order: self.config().render.rgba_byte_order,
        };
        let mut data = allocate(bytes, self.config().render.background)?;

        let ctx = self.resolve_page(page_num)?;
        if let Err(e) = ctx.engine.rasterize_page(
            ctx.document,
            ctx.page,
            &mut data,
            w,
            h,
            transform,
            &ClipRect::full(w, h),
            options,
        ) {
            warn!("Failed to rasterize page {}, returning blank buffer: {}", page_num, e);
        } else {
            debug!("Rendered page {} at {}x{}", page_num, w, h);
        }

        Ok(RenderBuffer {
            width: w,
            height: h,
            rgba: options.rgba_byte_order,
            data,
        })
    }

    /// Release a buffer returned by [`Session::render_page`].
    #[allow(clippy::unused_self)]
    pub fn release_buffer(&self, buffer: RenderBuffer) {
        buffer.release();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn buffer(width: u32, height: u32, fill: u8) -> RenderBuffer {
        RenderBuffer {
            width,
            height,
            rgba: true,
            data: vec![fill; width as usize * height as usize * BYTES_PER_PIXEL],
        }
    }

    #[test]
    fn test_pixel_lookup() {
        let mut buf = buffer(3, 2, 0xff);
        let offset = (3 + 2) * BYTES_PER_PIXEL;
        buf.data[offset..offset + 4].copy_from_slice(&[1, 2, 3, 4]);

        assert_eq!(buf.pixel(2, 1), Some([1, 2, 3, 4]));
        assert_eq!(buf.pixel(0, 0), Some([0xff; 4]));
        assert_eq!(buf.pixel(3, 0), None);
        assert_eq!(buf.pixel(0, 2), None);
    }

    #[test]
    fn test_encode_png_signature() {
        let png = buffer(4, 4, 0xff).encode_png().unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_encode_png_converts_bgra() {
        let mut bgra = buffer(1, 1, 0xff);
        bgra.rgba = false;
        bgra.data.copy_from_slice(&[0, 0, 0xff, 0xff]);

        let png = bgra.encode_png().unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0).0, [0xff, 0, 0, 0xff]);
    }

    #[test]
    fn test_allocate_fills_background() {
        let data = allocate(16, 0xff).unwrap();
        assert_eq!(data.len(), 16);
        assert!(data.iter().all(|&b| b == 0xff));
    }

    #[test]
    fn test_invalid_size_rejected_before_page_lookup() {
        let mut session = Session::new();

        let result = session.render_page(0, 0, 10, &Matrix::identity());
        assert!(matches!(result, Err(Error::InvalidRenderSize { width: 0, height: 10 })));

        let result = session.render_page(0, 10, -1, &Matrix::identity());
        assert!(matches!(result, Err(Error::InvalidRenderSize { .. })));

        // Valid size, no document: the lookup error comes through unchanged.
        let result = session.render_page(0, 10, 10, &Matrix::identity());
        assert!(matches!(result, Err(Error::NoDocument)));
    }
}
