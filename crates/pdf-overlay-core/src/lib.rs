//! PDF Overlay Core Library
//!
//! An in-process PDF document service built around a single [`Session`]:
//! - Open a document from bytes and load its pages lazily
//! - Rasterize pages into RGBA buffers under an affine transform
//! - Overlay rich text rendered elsewhere as annotated form objects
//! - Reduce a page's object list to a target count
//! - Serialize the edited document with security restrictions removed
//!
//! PDF primitives sit behind the [`Engine`] trait; [`PdfEngine`] is the
//! production implementation.
//!
//! ```no_run
//! use pdf_overlay_core::{Matrix, Session};
//!
//! # fn main() -> pdf_overlay_core::Result<()> {
//! let bytes = std::fs::read("input.pdf")?;
//! let mut session = Session::new();
//! session.open_document(&bytes)?;
//!
//! let buffer = session.render_page(0, 612, 792, &Matrix::identity())?;
//! session.release_buffer(buffer);
//!
//! session.reduce_page_objects(0, 10)?;
//! let saved = session.save_document()?;
//! saved.write_to("output.pdf")?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod overlay;
pub mod pdf;
pub mod prune;
pub mod render;
pub mod save;
pub mod session;
pub mod sink;
pub mod util;

pub use cache::{PageCache, PageIndex};
pub use config::{OverlayConfig, RenderConfig, SaveConfig, SessionConfig};
pub use engine::{Engine, EngineError, MarkId, ObjectId, ObjectKind, RenderOptions, SaveOptions};
pub use error::{Error, Result};
pub use geometry::{ClipRect, Matrix, PageSize};
pub use overlay::RichTextOverlay;
pub use pdf::PdfEngine;
pub use render::RenderBuffer;
pub use session::Session;
pub use sink::{FileSink, SavedDocument};
