//! Document session: the single owner of the open document and its pages.

use tracing::{debug, info, warn};

use crate::cache::PageCache;
use crate::config::SessionConfig;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::geometry::PageSize;
use crate::pdf::PdfEngine;

/// An open-document session.
///
/// Holds at most one document at a time together with the lazily loaded
/// handles of its pages. Opening a new document or calling [`Session::close`]
/// drops every page of the previous one. Render buffers and saved documents
/// already handed out stay valid; they are owned by the caller.
pub struct Session<E: Engine = PdfEngine> {
    engine: E,
    config: SessionConfig,
    document: Option<E::Document>,
    pages: PageCache<E::Page>,
}

/// Borrowed view of a resolved page and everything needed to act on it.
pub(crate) struct PageContext<'a, E: Engine> {
    pub engine: &'a E,
    pub config: &'a SessionConfig,
    pub document: &'a mut E::Document,
    pub page: &'a mut E::Page,
}

impl Session<PdfEngine> {
    /// Create a session backed by the production engine and default config.
    pub fn new() -> Self {
        Self::with_engine(PdfEngine::new(), SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self::with_engine(PdfEngine::new(), config)
    }
}

impl Default for Session<PdfEngine> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Engine> Session<E> {
    pub const fn with_engine(engine: E, config: SessionConfig) -> Self {
        Self {
            engine,
            config,
            document: None,
            pages: PageCache::new(),
        }
    }

    pub const fn engine(&self) -> &E {
        &self.engine
    }

    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub const fn is_open(&self) -> bool {
        self.document.is_some()
    }

    /// The open document, if any.
    pub const fn document(&self) -> Option<&E::Document> {
        self.document.as_ref()
    }

    /// The page cache of the open document.
    pub const fn page_cache(&self) -> &PageCache<E::Page> {
        &self.pages
    }

    /// Open `bytes` as the session's document, replacing any previous one.
    ///
    /// The page cache is reset before anything else, so after a failed open the
    /// session has no document and page operations report [`Error::NoDocument`].
    pub fn open_document(&mut self, bytes: &[u8]) -> Result<()> {
        self.close();

        self.engine.init().map_err(|e| {
            warn!("Failed to initialize PDF engine: {}", e);
            Error::EngineInit(e)
        })?;

        let document = self.engine.load_document(bytes).map_err(|e| {
            warn!("Failed to load PDF: {}", e);
            Error::Load(e)
        })?;

        info!(
            "Opened document: {} bytes, {} pages",
            bytes.len(),
            self.engine.page_count(&document)
        );
        self.document = Some(document);
        Ok(())
    }

    /// Drop the open document and every cached page.
    pub fn close(&mut self) {
        if self.document.is_some() {
            debug!("Closing document ({} cached pages)", self.pages.populated_count());
        }
        // Pages go before the document that owns them.
        self.pages.clear();
        self.document = None;
    }

    /// Number of pages in the open document, 0 when none is open.
    pub fn page_count(&self) -> usize {
        self.document
            .as_ref()
            .map_or(0, |doc| self.engine.page_count(doc))
    }

    /// Resolve `page_num` through the page cache, loading it on first use.
    ///
    /// Repeated calls return the same page instance until the document is
    /// replaced or closed.
    pub fn page(&mut self, page_num: i32) -> Result<&mut E::Page> {
        Ok(self.resolve_page(page_num)?.page)
    }

    pub(crate) fn resolve_page(&mut self, page_num: i32) -> Result<PageContext<'_, E>> {
        let Self {
            engine,
            config,
            document,
            pages,
        } = self;

        let Some(document) = document.as_mut() else {
            warn!("Can't load page {}: no document is open", page_num);
            return Err(Error::NoDocument);
        };

        let total = engine.page_count(document);
        let page = pages.get_or_load(page_num, total, |index| {
            engine.load_page(document, index.as_usize())
        })?;

        Ok(PageContext {
            engine,
            config,
            document,
            page,
        })
    }

    /// Intrinsic size of a page in points.
    pub fn page_size(&mut self, page_num: i32) -> Result<PageSize> {
        let ctx = self.resolve_page(page_num)?;
        Ok(PageSize::new(
            ctx.engine.page_width(ctx.page),
            ctx.engine.page_height(ctx.page),
        ))
    }

    /// Page width in points, or `-1.0` if the page can't be resolved.
    pub fn page_width(&mut self, page_num: i32) -> f32 {
        self.page_size(page_num).map_or(-1.0, |size| size.width)
    }

    /// Page height in points, or `-1.0` if the page can't be resolved.
    pub fn page_height(&mut self, page_num: i32) -> f32 {
        self.page_size(page_num).map_or(-1.0, |size| size.height)
    }

    pub fn count_page_objects(&mut self, page_num: i32) -> Result<usize> {
        let ctx = self
            .resolve_page(page_num)
            .map_err(|e| Error::page_not_found(page_num, e))?;
        Ok(ctx.engine.count_objects(ctx.page))
    }

    /// Rebuild the page's content stream from its current object list.
    pub fn regenerate_page_content(&mut self, page_num: i32) -> Result<()> {
        let ctx = self
            .resolve_page(page_num)
            .map_err(|e| Error::page_not_found(page_num, e))?;

        ctx.engine
            .generate_content(ctx.document, ctx.page)
            .map_err(|source| {
                warn!("Failed to regenerate content of page {}: {}", page_num, source);
                Error::ContentGeneration {
                    page: page_num,
                    source,
                }
            })
    }
}

impl<E: Engine> std::fmt::Debug for Session<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("open", &self.document.is_some())
            .field("page_count", &self.page_count())
            .field("cached_pages", &self.pages.populated_count())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
