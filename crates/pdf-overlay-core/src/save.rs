//! Serializing the session's document.

use tracing::{debug, info, warn};

use crate::engine::{Engine, SaveOptions};
use crate::error::{Error, Result};
use crate::session::Session;
use crate::sink::{FileSink, SavedDocument};

impl<E: Engine> Session<E> {
    /// Serialize the open document.
    ///
    /// Cached pages with pending object edits are regenerated first (unless
    /// `save.flush_pending_edits` is off). The output carries no encryption or
    /// permission restrictions when `save.remove_security` is on. On failure no
    /// bytes are returned.
    pub fn save_document(&mut self) -> Result<SavedDocument> {
        let Self {
            engine,
            config,
            document,
            pages,
        } = self;

        let Some(document) = document.as_mut() else {
            warn!("Can't save: no document is open");
            return Err(Error::NoDocument);
        };

        if config.save.flush_pending_edits {
            for (index, page) in pages.iter_mut() {
                if !engine.has_pending_changes(page) {
                    continue;
                }
                debug!("Flushing pending edits of page {} before save", index);
                engine.generate_content(document, page).map_err(|source| {
                    warn!("Failed to regenerate content of page {}: {}", index, source);
                    Error::ContentGeneration {
                        page: i32::try_from(index).unwrap_or(i32::MAX),
                        source,
                    }
                })?;
            }
        }

        let options = SaveOptions {
            remove_security: config.save.remove_security,
        };
        let mut sink = FileSink::new();
        engine
            .serialize_document(document, &mut sink, options)
            .map_err(|e| {
                warn!("Failed to save PDF: {}", e);
                Error::Serialization(e)
            })?;

        let saved = sink.finish();
        info!("Saved document: {} bytes", saved.len());
        Ok(saved)
    }
}
