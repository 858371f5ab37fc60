use thiserror::Error;

use crate::engine::EngineError;

/// Unified error type for pdf-overlay-core
///
/// Every variant names one failure kind a caller can branch on:
/// - Session and page resolution (no document, bad index, page load)
/// - Rasterization (buffer allocation, output size, encoding)
/// - Overlay composition (source load, import, mark annotation)
/// - Object pruning and serialization
/// - Configuration and general I/O
///
/// Engine-level causes travel as the `source` of the variant that reports them.
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Session Errors
    // ==========================================================================
    /// No document is open, or the last open failed
    #[error("no document is open")]
    NoDocument,

    /// The PDF engine could not be initialized
    #[error("failed to initialize PDF engine: {0}")]
    EngineInit(#[source] EngineError),

    /// The document bytes could not be parsed
    #[error("failed to load PDF: {0}")]
    Load(#[source] EngineError),

    // ==========================================================================
    // Page Errors
    // ==========================================================================
    /// A negative page index was requested
    #[error("can't load negative page {page}")]
    NegativeIndex { page: i32 },

    /// Page index past the end of the document
    #[error("page {page} is out of range (document has {total} pages)")]
    IndexOutOfRange { page: i32, total: usize },

    /// The engine failed to load a page that is within range
    #[error("failed to load page {page}: {source}")]
    EngineLoadFailure {
        page: i32,
        #[source]
        source: EngineError,
    },

    /// A mutating operation could not resolve its target page
    #[error("page {page} not found: {cause}")]
    PageNotFound {
        page: i32,
        #[source]
        cause: Box<Error>,
    },

    /// Rebuilding a page content stream failed
    #[error("failed to regenerate content of page {page}: {source}")]
    ContentGeneration {
        page: i32,
        #[source]
        source: EngineError,
    },

    // ==========================================================================
    // Render Errors
    // ==========================================================================
    /// Requested output dimensions are not positive
    #[error("invalid render size {width}x{height}")]
    InvalidRenderSize { width: i32, height: i32 },

    /// The render buffer could not be allocated
    #[error("failed to allocate render buffer of {bytes} bytes")]
    BufferAllocation { bytes: usize },

    /// Failed to encode a render buffer into an image format
    #[error("failed to encode render buffer: {0}")]
    Encode(String),

    // ==========================================================================
    // Overlay Errors
    // ==========================================================================
    /// The overlay source document could not be parsed
    #[error("failed to load overlay source: {0}")]
    SourceLoad(#[source] EngineError),

    /// The engine could not import the source page as an object
    #[error("failed to import source page: {0}")]
    Import(#[source] EngineError),

    /// The engine could not attach a mark to the imported object
    #[error("failed to create mark: {0}")]
    MarkCreation(#[source] EngineError),

    /// A mark payload could not be stored
    #[error("failed to set mark value '{key}': {source}")]
    MarkValue {
        key: String,
        #[source]
        source: EngineError,
    },

    // ==========================================================================
    // Pruning Errors
    // ==========================================================================
    /// Fetching a page object failed
    #[error("failed to fetch page object {index}: {source}")]
    ObjectFetch {
        index: usize,
        #[source]
        source: EngineError,
    },

    /// Removing a page object failed
    #[error("failed to remove page object {index}: {source}")]
    ObjectRemove {
        index: usize,
        #[source]
        source: EngineError,
    },

    // ==========================================================================
    // Save Errors
    // ==========================================================================
    /// The engine failed to serialize the document
    #[error("failed to save PDF: {0}")]
    Serialization(#[source] EngineError),

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap a page resolution failure for operations that need the page to exist.
    pub(crate) fn page_not_found(page: i32, cause: Self) -> Self {
        Self::PageNotFound {
            page,
            cause: Box::new(cause),
        }
    }
}
