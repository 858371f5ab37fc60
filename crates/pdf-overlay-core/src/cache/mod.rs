//! Lazily populated page cache.
//!
//! Pages are loaded on first request and kept for the lifetime of the open
//! document: the backing vector is indexed by page number, grows to the
//! highest index ever requested and is never compacted or evicted.

mod page_index;

pub use page_index::PageIndex;

use tracing::{debug, warn};

use crate::engine::EngineError;
use crate::error::{Error, Result};

/// Page handles keyed by zero-based page index.
#[derive(Debug)]
pub struct PageCache<P> {
    entries: Vec<Option<P>>,
}

impl<P> Default for PageCache<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> PageCache<P> {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Current bound of the backing sequence (highest requested index + 1).
    pub fn bound(&self) -> usize {
        self.entries.len()
    }

    pub fn is_populated(&self, index: usize) -> bool {
        matches!(self.entries.get(index), Some(Some(_)))
    }

    pub fn populated_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    /// Drop every cached page.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Return the cached page for `page_num`, loading it with `load` on first use.
    ///
    /// On any failure the populated entries are left untouched; the backing
    /// sequence may still have grown to cover `page_num` when the load itself
    /// failed.
    pub fn get_or_load<F>(&mut self, page_num: i32, total_pages: usize, load: F) -> Result<&mut P>
    where
        F: FnOnce(PageIndex) -> std::result::Result<P, EngineError>,
    {
        let Ok(index) = usize::try_from(page_num) else {
            warn!("Can't load negative page {}", page_num);
            return Err(Error::NegativeIndex { page: page_num });
        };

        if !self.is_populated(index) {
            let page_index = PageIndex::try_from_page_num(page_num, total_pages).inspect_err(|_| {
                warn!("Load page {} is out of range", page_num);
            })?;

            if self.entries.len() <= index {
                self.entries.resize_with(index + 1, || None);
            }

            let page = load(page_index).map_err(|source| {
                warn!("Failed to load page {}: {}", page_num, source);
                Error::EngineLoadFailure {
                    page: page_num,
                    source,
                }
            })?;
            debug!("Loaded page {} into cache", page_num);
            self.entries[index] = Some(page);
        }

        self.entries
            .get_mut(index)
            .and_then(Option::as_mut)
            .ok_or(Error::IndexOutOfRange {
                page: page_num,
                total: total_pages,
            })
    }

    /// Cached pages in index order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut P)> {
        self.entries
            .iter_mut()
            .enumerate()
            .filter_map(|(i, entry)| entry.as_mut().map(|page| (i, page)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn loader(calls: &Cell<usize>) -> impl FnOnce(PageIndex) -> std::result::Result<String, EngineError> + '_ {
        move |idx| {
            calls.set(calls.get() + 1);
            Ok(format!("page-{idx}"))
        }
    }

    #[test]
    fn test_repeated_lookup_returns_same_instance() {
        let calls = Cell::new(0);
        let mut cache = PageCache::new();

        let first: *const String = cache.get_or_load(1, 3, loader(&calls)).unwrap();
        let second: *const String = cache.get_or_load(1, 3, loader(&calls)).unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.get(), 1, "second lookup must not reload");
    }

    #[test]
    fn test_out_of_range_does_not_touch_cache() {
        let calls = Cell::new(0);
        let mut cache = PageCache::new();
        cache.get_or_load(0, 3, loader(&calls)).unwrap();

        let result = cache.get_or_load(5, 3, loader(&calls));
        assert!(matches!(result, Err(Error::IndexOutOfRange { page: 5, total: 3 })));

        let result = cache.get_or_load(-2, 3, loader(&calls));
        assert!(matches!(result, Err(Error::NegativeIndex { page: -2 })));

        assert_eq!(cache.bound(), 1);
        assert_eq!(cache.populated_count(), 1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_growth_only_populates_requested_entry() {
        let calls = Cell::new(0);
        let mut cache = PageCache::new();

        let page = cache.get_or_load(2, 3, loader(&calls)).unwrap();
        assert_eq!(page, "page-2");

        assert_eq!(cache.bound(), 3);
        assert!(!cache.is_populated(0));
        assert!(!cache.is_populated(1));
        assert!(cache.is_populated(2));
    }

    #[test]
    fn test_growth_preserves_lower_entries() {
        let calls = Cell::new(0);
        let mut cache = PageCache::new();
        cache.get_or_load(0, 10, loader(&calls)).unwrap().push_str("-edited");

        cache.get_or_load(7, 10, loader(&calls)).unwrap();

        assert_eq!(cache.bound(), 8);
        assert_eq!(cache.get_or_load(0, 10, loader(&calls)).unwrap(), "page-0-edited");
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_load_failure_keeps_growth_but_not_entry() {
        let mut cache: PageCache<String> = PageCache::new();

        let result = cache.get_or_load(4, 5, |_| Err(EngineError::MissingPage(5)));
        assert!(matches!(result, Err(Error::EngineLoadFailure { page: 4, .. })));

        assert_eq!(cache.bound(), 5);
        assert_eq!(cache.populated_count(), 0);

        // A later successful load fills the slot.
        let calls = Cell::new(0);
        assert_eq!(cache.get_or_load(4, 5, loader(&calls)).unwrap(), "page-4");
    }

    #[test]
    fn test_clear_and_iter() {
        let calls = Cell::new(0);
        let mut cache = PageCache::new();
        cache.get_or_load(1, 4, loader(&calls)).unwrap();
        cache.get_or_load(3, 4, loader(&calls)).unwrap();

        let indices: Vec<usize> = cache.iter_mut().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![1, 3]);

        cache.clear();
        assert_eq!(cache.bound(), 0);
        assert_eq!(cache.populated_count(), 0);
    }
}
