//! Reducing a page's object list to a target size.

use tracing::{debug, warn};

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::session::Session;

impl<E: Engine> Session<E> {
    /// Remove objects from the end of the page until at most `target_count` remain.
    ///
    /// The most recently added (topmost) object goes first. A `target_count` of
    /// zero or less empties the page. On a fetch or remove failure the page is
    /// left as reduced so far.
    pub fn reduce_page_objects(&mut self, page_num: i32, target_count: i32) -> Result<()> {
        let ctx = self.resolve_page(page_num).map_err(|e| {
            warn!("Can't reduce objects of page {}: {}", page_num, e);
            Error::page_not_found(page_num, e)
        })?;
        let target = usize::try_from(target_count).unwrap_or(0);

        let initial = ctx.engine.count_objects(ctx.page);
        loop {
            let count = ctx.engine.count_objects(ctx.page);
            if count <= target {
                break;
            }
            let index = count - 1;

            let id = ctx.engine.object_at(ctx.page, index).map_err(|source| {
                warn!("Failed to fetch object {} of page {}: {}", index, page_num, source);
                Error::ObjectFetch { index, source }
            })?;

            ctx.engine.remove_object(ctx.page, id).map_err(|source| {
                warn!("Failed to remove object {} of page {}: {}", index, page_num, source);
                Error::ObjectRemove { index, source }
            })?;
        }

        debug!(
            "Reduced page {} from {} to {} objects",
            page_num,
            initial,
            ctx.engine.count_objects(ctx.page)
        );
        Ok(())
    }
}
