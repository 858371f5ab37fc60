use mupdf::{Colorspace, Device, IRect, Pixmap};

use crate::engine::{EngineError, RenderOptions};
use crate::geometry::{ClipRect, Matrix};

/// Bytes per output pixel.
const CHANNELS: usize = 4;

/// Rasterize page `page_index` of `doc` into `buffer`.
///
/// `buffer` must hold `width * height * 4` bytes; its current contents are the
/// background the page is drawn over.
#[allow(clippy::too_many_arguments)]
pub(crate) fn rasterize(
    doc: &mupdf::Document,
    page_index: usize,
    buffer: &mut [u8],
    width: u32,
    height: u32,
    transform: &Matrix,
    clip: &ClipRect,
    options: RenderOptions,
) -> Result<(), EngineError> {
    let row_len = width as usize * CHANNELS;
    if buffer.len() != row_len * height as usize {
        return Err(EngineError::Render(format!(
            "buffer of {} bytes does not match {width}x{height}",
            buffer.len()
        )));
    }

    let index = i32::try_from(page_index)
        .map_err(|_| EngineError::Render(format!("page index {page_index} too large")))?;
    let w = i32::try_from(width).map_err(|_| EngineError::Render(format!("width {width} too large")))?;
    let h = i32::try_from(height).map_err(|_| EngineError::Render(format!("height {height} too large")))?;

    let page = doc.load_page(index)?;

    // RGB with alpha: mupdf's native sample order is RGBA.
    let mut pixmap = Pixmap::new_with_w_h(&Colorspace::device_rgb(), w, h, true)?;
    if usize::try_from(pixmap.n()).ok() != Some(CHANNELS) {
        return Err(EngineError::Render(format!(
            "unexpected pixel format with {} components",
            pixmap.n()
        )));
    }
    let stride = usize::try_from(pixmap.stride())
        .ok()
        .filter(|stride| *stride >= row_len && row_len > 0)
        .ok_or_else(|| EngineError::Render("pixmap stride does not fit the output width".to_string()))?;

    for (dst, src) in pixmap.samples_mut().chunks_mut(stride).zip(buffer.chunks(row_len)) {
        dst[..row_len].copy_from_slice(src);
    }

    {
        let device = Device::from_pixmap_with_clip(&pixmap, clip_to_irect(clip))?;
        let ctm = mupdf::Matrix::from(*transform);
        if options.annotations {
            page.run(&device, &ctm)?;
        } else {
            page.run_contents(&device, &ctm)?;
        }
    }

    for (dst, src) in buffer.chunks_mut(row_len).zip(pixmap.samples().chunks(stride)) {
        dst.copy_from_slice(&src[..row_len]);
        if !options.rgba_byte_order {
            for pixel in dst.chunks_exact_mut(CHANNELS) {
                pixel.swap(0, 2);
            }
        }
    }

    Ok(())
}

/// Pixel-aligned clip covering every pixel the float rectangle touches.
#[allow(clippy::cast_possible_truncation)]
fn clip_to_irect(clip: &ClipRect) -> IRect {
    IRect::new(
        clip.left.floor() as i32,
        clip.top.floor() as i32,
        clip.right.ceil() as i32,
        clip.bottom.ceil() as i32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_rounds_outward() {
        let irect = clip_to_irect(&ClipRect::new(0.5, 1.2, 99.1, 49.9));
        assert_eq!((irect.x0, irect.y0, irect.x1, irect.y1), (0, 1, 100, 50));
    }
}
