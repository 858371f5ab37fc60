//! The PDF engine seam.
//!
//! The session never touches PDF syntax directly: it drives an [`Engine`],
//! which owns parsing, page loading, rasterization, object import, marked
//! content and serialization. [`crate::pdf::PdfEngine`] is the production
//! implementation (lopdf for the object graph, mupdf for rasterization).

use std::fmt;

use thiserror::Error;

use crate::geometry::{ClipRect, Matrix};
use crate::sink::FileSink;

/// Failure reported by an engine primitive.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Library initialization failed
    #[error("initialization failed: {0}")]
    Init(String),

    /// Document bytes could not be parsed
    #[error("parse error: {0}")]
    Parse(String),

    /// A page is missing from the page tree
    #[error("page {0} does not exist")]
    MissingPage(u32),

    /// A page content stream could not be read or written
    #[error("content error: {0}")]
    Content(String),

    /// Rasterization failed
    #[error("render error: {0}")]
    Render(String),

    /// A mark could not be created or addressed
    #[error("invalid mark: {0}")]
    Mark(String),

    /// No object with the given position or id on the page
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// Writing the document failed
    #[error("write error: {0}")]
    Write(String),

    /// Error from the lopdf library
    #[error("lopdf error: {0}")]
    Lopdf(#[from] lopdf::Error),

    /// Error from the mupdf library
    #[error("mupdf error: {0}")]
    Mupdf(String),
}

impl From<mupdf::Error> for EngineError {
    fn from(e: mupdf::Error) -> Self {
        Self::Mupdf(e.to_string())
    }
}

/// Identity of a drawable object, unique within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to a mark attached to a specific object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkId(pub usize);

/// What kind of drawable a page object is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Path,
    Text,
    Image,
    Shading,
    /// An XObject invocation found in existing content
    XObject,
    /// An imported page wrapped as a reusable form
    Form,
    /// Content that could not be split into objects, kept as a whole
    Opaque,
}

/// Rasterization flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Composite annotations on top of page content
    pub annotations: bool,
    /// Emit RGBA instead of the engine's native BGRA order
    pub rgba_byte_order: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            annotations: true,
            rgba_byte_order: true,
        }
    }
}

/// Serialization flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveOptions {
    /// Drop encryption and permission restrictions from the output
    pub remove_security: bool,
}

/// Primitives the session needs from a PDF implementation.
///
/// Handles are plain owned values: the session owns the document and its
/// pages, and passes them back in by reference. A page handle is only ever
/// used with the document it was loaded from.
pub trait Engine {
    type Document;
    type Page;
    type Object;

    /// Initialize the underlying library. Called before every open; must be idempotent.
    fn init(&self) -> Result<(), EngineError> {
        Ok(())
    }

    fn load_document(&self, bytes: &[u8]) -> Result<Self::Document, EngineError>;

    fn page_count(&self, doc: &Self::Document) -> usize;

    fn load_page(&self, doc: &mut Self::Document, index: usize) -> Result<Self::Page, EngineError>;

    fn page_width(&self, page: &Self::Page) -> f32;

    fn page_height(&self, page: &Self::Page) -> f32;

    /// Draw `page` into `buffer` (`width * height * 4` bytes, already filled with
    /// the background) under `transform`, clipped to `clip`.
    #[allow(clippy::too_many_arguments)]
    fn rasterize_page(
        &self,
        doc: &mut Self::Document,
        page: &Self::Page,
        buffer: &mut [u8],
        width: u32,
        height: u32,
        transform: &Matrix,
        clip: &ClipRect,
        options: RenderOptions,
    ) -> Result<(), EngineError>;

    /// Import page `source_page_number` (one-based) of `source` into `target`
    /// as a detached drawable object.
    fn import_page_as_object(
        &self,
        target: &mut Self::Document,
        source: &Self::Document,
        source_page_number: u32,
    ) -> Result<Self::Object, EngineError>;

    fn create_mark(&self, object: &mut Self::Object, name: &str) -> Result<MarkId, EngineError>;

    fn set_mark_string(
        &self,
        doc: &mut Self::Document,
        object: &mut Self::Object,
        mark: MarkId,
        key: &str,
        value: &str,
    ) -> Result<(), EngineError>;

    fn set_mark_int(
        &self,
        doc: &mut Self::Document,
        object: &mut Self::Object,
        mark: MarkId,
        key: &str,
        value: i64,
    ) -> Result<(), EngineError>;

    fn transform_object(&self, object: &mut Self::Object, matrix: &Matrix);

    fn object_kind(&self, object: &Self::Object) -> ObjectKind;

    /// Append `object` to the end of the page's object list, taking ownership.
    fn insert_object(&self, page: &mut Self::Page, object: Self::Object);

    /// Number of objects on the page. The page is mutable so engines can
    /// build the object list on first use.
    fn count_objects(&self, page: &mut Self::Page) -> usize;

    fn object_at(&self, page: &mut Self::Page, index: usize) -> Result<ObjectId, EngineError>;

    fn remove_object(&self, page: &mut Self::Page, id: ObjectId) -> Result<Self::Object, EngineError>;

    /// Whether the object list has edits not yet written to the content stream.
    fn has_pending_changes(&self, page: &Self::Page) -> bool;

    /// Rebuild the page content stream from its object list.
    fn generate_content(&self, doc: &mut Self::Document, page: &mut Self::Page) -> Result<(), EngineError>;

    fn serialize_document(
        &self,
        doc: &mut Self::Document,
        sink: &mut FileSink,
        options: SaveOptions,
    ) -> Result<(), EngineError>;
}
