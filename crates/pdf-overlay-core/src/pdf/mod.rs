mod content;
mod document;
mod engine;
mod import;
mod page;
mod raster;

pub use content::{Mark, PageObject, parse_objects, split_objects, text_string};
pub use document::EngineDocument;
pub use engine::PdfEngine;
pub use page::EnginePage;
