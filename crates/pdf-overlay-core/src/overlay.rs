//! Rich-text overlays: a page of another document placed on a target page.
//!
//! The overlay source is typically a single-page PDF produced by an external
//! HTML renderer. It is imported as a form object and tagged with a mark
//! carrying the original HTML (and optionally the layout width), so the rich
//! text can be recovered or re-rendered later.
//!
//! The object is built completely detached from the page: import, mark,
//! payloads, placement. Only a fully annotated object is inserted, so a
//! failure at any step leaves the page's object list untouched.

use tracing::{debug, warn};

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::geometry::Matrix;
use crate::session::Session;

/// The first page of the overlay source is the one that gets imported.
const SOURCE_PAGE_NUMBER: u32 = 1;

/// Placement and payload of one rich-text overlay.
///
/// Coordinates are in points with a top-left origin: `left` and `bottom` locate
/// the overlay's bottom-left corner, `bottom` measured down from the top edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RichTextOverlay<'a> {
    /// Bytes of the PDF whose first page is the rendered rich text
    pub source: &'a [u8],
    pub left: f32,
    pub bottom: f32,
    /// Original HTML of the rich text
    pub html: &'a str,
    /// Layout width; stored on the mark only when positive
    pub width: i32,
}

impl<E: Engine> Session<E> {
    /// Place the first page of `overlay.source` on page `page_num`.
    ///
    /// The new object is appended on top of the existing content and moved by
    /// `(left, page_height - bottom)`.
    pub fn overlay_rich_text(&mut self, page_num: i32, overlay: &RichTextOverlay<'_>) -> Result<()> {
        let ctx = self.resolve_page(page_num).map_err(|e| {
            warn!("Overlay target page {} not found: {}", page_num, e);
            Error::page_not_found(page_num, e)
        })?;
        let engine = ctx.engine;
        let keys = &ctx.config.overlay;

        let source = engine.load_document(overlay.source).map_err(|e| {
            warn!("Failed to load overlay source: {}", e);
            Error::SourceLoad(e)
        })?;

        let mut object = engine
            .import_page_as_object(ctx.document, &source, SOURCE_PAGE_NUMBER)
            .map_err(|e| {
                warn!("Failed to import overlay source page: {}", e);
                Error::Import(e)
            })?;

        let mark = engine.create_mark(&mut object, &keys.mark_tag).map_err(|e| {
            warn!("Failed to create '{}' mark: {}", keys.mark_tag, e);
            Error::MarkCreation(e)
        })?;

        engine
            .set_mark_string(ctx.document, &mut object, mark, &keys.html_key, overlay.html)
            .map_err(|source| {
                warn!("Failed to set mark value '{}': {}", keys.html_key, source);
                Error::MarkValue {
                    key: keys.html_key.clone(),
                    source,
                }
            })?;

        if overlay.width > 0 {
            engine
                .set_mark_int(
                    ctx.document,
                    &mut object,
                    mark,
                    &keys.width_key,
                    i64::from(overlay.width),
                )
                .map_err(|source| {
                    warn!("Failed to set mark value '{}': {}", keys.width_key, source);
                    Error::MarkValue {
                        key: keys.width_key.clone(),
                        source,
                    }
                })?;
        }

        // Flip into PDF space (bottom-left origin).
        let page_height = engine.page_height(ctx.page);
        let placement = Matrix::translate(overlay.left, page_height - overlay.bottom);
        engine.transform_object(&mut object, &placement);

        engine.insert_object(ctx.page, object);
        debug!(
            "Overlaid rich text on page {} at ({}, {}), {} html bytes",
            page_num,
            overlay.left,
            page_height - overlay.bottom,
            overlay.html.len()
        );

        Ok(())
    }
}
