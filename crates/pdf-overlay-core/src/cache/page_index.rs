//! Page index newtype for validated conversion from caller indices.
//!
//! Callers address pages with a signed `i32` (matching the engine-facing API,
//! where negative values are representable); the cache and the engine index
//! with `usize`. Validation against the page count happens here, once.

use std::fmt;

use crate::error::Error;

/// A zero-based page index known to be within the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageIndex(usize);

impl PageIndex {
    /// Validate a caller-supplied index against the document's page count.
    pub fn try_from_page_num(page_num: i32, total_pages: usize) -> Result<Self, Error> {
        let index = usize::try_from(page_num).map_err(|_| Error::NegativeIndex { page: page_num })?;

        if index >= total_pages {
            return Err(Error::IndexOutOfRange {
                page: page_num,
                total: total_pages,
            });
        }

        Ok(Self(index))
    }

    /// Get the index as usize for Rust collections.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl From<PageIndex> for usize {
    fn from(index: PageIndex) -> Self {
        index.0
    }
}

impl fmt::Display for PageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_try_from_page_num_valid() {
        let idx = PageIndex::try_from_page_num(5, 10).unwrap();
        assert_eq!(idx.as_usize(), 5);
    }

    #[test]
    fn test_try_from_page_num_negative() {
        let result = PageIndex::try_from_page_num(-1, 5);
        assert!(matches!(result, Err(Error::NegativeIndex { page: -1 })));
    }

    #[test]
    fn test_try_from_page_num_out_of_range() {
        let result = PageIndex::try_from_page_num(5, 5);
        assert!(matches!(result, Err(Error::IndexOutOfRange { page: 5, total: 5 })));
    }

    #[test]
    fn test_empty_document_has_no_valid_index() {
        assert!(PageIndex::try_from_page_num(0, 0).is_err());
    }

    #[test]
    fn test_display() {
        let idx = PageIndex::try_from_page_num(7, 8).unwrap();
        assert_eq!(format!("{idx}"), "7");
    }
}
