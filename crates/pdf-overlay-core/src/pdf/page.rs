//! Page handles and inherited page attributes.
//!
//! # Coordinate System
//!
//! PDF page space has a **bottom-left origin** (Y increases upward). Page
//! width and height are reported from the visible box (`CropBox`, falling back
//! to `MediaBox`), swapped when the page is rotated by 90 or 270 degrees.

use lopdf::{Dictionary, Document, Object, ObjectId as LopdfId};
use tracing::debug;

use crate::geometry::PageSize;
use super::content::{self, PageObject};

/// US Letter, used when a page has no usable box.
const DEFAULT_PAGE_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Guard against cyclic `/Parent` chains.
const MAX_TREE_DEPTH: usize = 64;

/// A loaded page: its place in the document, its size and its content.
///
/// The content is split into objects the first time the object list is
/// needed; size queries and rendering of an unedited page never parse it.
#[derive(Debug)]
pub struct EnginePage {
    pub(crate) index: usize,
    pub(crate) id: LopdfId,
    pub(crate) size: PageSize,
    content: Vec<u8>,
    objects: Option<Vec<PageObject>>,
    pub(crate) dirty: bool,
}

impl EnginePage {
    pub(crate) const fn new(index: usize, id: LopdfId, size: PageSize, content: Vec<u8>) -> Self {
        Self {
            index,
            id,
            size,
            content,
            objects: None,
            dirty: false,
        }
    }

    pub const fn index(&self) -> usize {
        self.index
    }

    pub const fn size(&self) -> PageSize {
        self.size
    }

    /// The page's objects in drawing order.
    pub fn objects(&mut self) -> &[PageObject] {
        self.objects_mut()
    }

    pub(crate) fn objects_mut(&mut self) -> &mut Vec<PageObject> {
        if self.objects.is_none() {
            let content = std::mem::take(&mut self.content);
            let objects = content::parse_objects(&content);
            debug!("Page {} parsed into {} objects", self.index, objects.len());
            self.objects = Some(objects);
        }
        self.objects.get_or_insert_with(Vec::new)
    }

    /// The object list, if it has been built.
    pub(crate) fn parsed_objects(&self) -> Option<&[PageObject]> {
        self.objects.as_deref()
    }
}

/// Follow a reference to the object it names.
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Look up `key` on the page, walking up the page tree for inheritable attributes.
pub(crate) fn inherited_attribute<'a>(doc: &'a Document, page_id: LopdfId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;

    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return resolve(doc, value);
        }
        let Ok(Object::Reference(parent_id)) = node.get(b"Parent") else {
            return None;
        };
        node = doc.get_dictionary(*parent_id).ok()?;
    }

    None
}

fn number(object: &Object) -> Option<f32> {
    match object {
        #[allow(clippy::cast_precision_loss)]
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

fn rectangle(doc: &Document, object: &Object) -> Option<[f32; 4]> {
    let Object::Array(arr) = object else {
        return None;
    };
    if arr.len() != 4 {
        return None;
    }

    let values: Vec<f32> = arr
        .iter()
        .filter_map(|o| resolve(doc, o).and_then(number))
        .collect();

    match values.as_slice() {
        [x0, y0, x1, y1] => Some([x0.min(*x1), y0.min(*y1), x0.max(*x1), y0.max(*y1)]),
        _ => None,
    }
}

/// The page's visible box `[x0, y0, x1, y1]`, normalized.
pub(crate) fn page_box(doc: &Document, page_id: LopdfId) -> [f32; 4] {
    inherited_attribute(doc, page_id, b"CropBox")
        .and_then(|o| rectangle(doc, o))
        .or_else(|| inherited_attribute(doc, page_id, b"MediaBox").and_then(|o| rectangle(doc, o)))
        .unwrap_or(DEFAULT_PAGE_BOX)
}

/// Page size in points, accounting for `/Rotate`.
pub(crate) fn page_size(doc: &Document, page_id: LopdfId) -> PageSize {
    let [x0, y0, x1, y1] = page_box(doc, page_id);
    let (width, height) = (x1 - x0, y1 - y0);

    let rotate = match inherited_attribute(doc, page_id, b"Rotate") {
        Some(Object::Integer(r)) => r.rem_euclid(360),
        _ => 0,
    };

    if rotate == 90 || rotate == 270 {
        PageSize::new(height, width)
    } else {
        PageSize::new(width, height)
    }
}

/// The page's effective resource dictionary, copied out of the tree.
pub(crate) fn resources(doc: &Document, page_id: LopdfId) -> Dictionary {
    match inherited_attribute(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn doc_with_page(page: Dictionary, pages: Dictionary) -> (Document, LopdfId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut page = page;
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        let page_id = doc.add_object(page);

        let mut pages = pages;
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Kids", Object::Array(vec![Object::Reference(page_id)]));
        pages.set("Count", Object::Integer(1));
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        (doc, page_id)
    }

    fn rect(values: [i64; 4]) -> Object {
        Object::Array(values.into_iter().map(Object::Integer).collect())
    }

    #[test]
    fn test_media_box_on_page() {
        let (doc, page_id) = doc_with_page(
            Dictionary::from_iter([("MediaBox", rect([0, 0, 300, 200]))]),
            Dictionary::new(),
        );
        assert_eq!(page_size(&doc, page_id), PageSize::new(300.0, 200.0));
    }

    #[test]
    fn test_inherited_media_box_and_crop_box() {
        let (doc, page_id) = doc_with_page(
            Dictionary::from_iter([("CropBox", rect([10, 10, 110, 60]))]),
            Dictionary::from_iter([("MediaBox", rect([0, 0, 595, 842]))]),
        );
        assert_eq!(page_size(&doc, page_id), PageSize::new(100.0, 50.0));
    }

    #[test]
    fn test_rotation_swaps_dimensions() {
        let (doc, page_id) = doc_with_page(
            Dictionary::from_iter([("MediaBox", rect([0, 0, 300, 200])), ("Rotate", Object::Integer(-90))]),
            Dictionary::new(),
        );
        assert_eq!(page_size(&doc, page_id), PageSize::new(200.0, 300.0));
    }

    #[test]
    fn test_missing_box_defaults_to_letter() {
        let (doc, page_id) = doc_with_page(Dictionary::new(), Dictionary::new());
        assert_eq!(page_size(&doc, page_id), PageSize::new(612.0, 792.0));
    }

    #[test]
    fn test_inverted_box_is_normalized() {
        let (doc, page_id) = doc_with_page(
            Dictionary::from_iter([("MediaBox", rect([300, 200, 0, 0]))]),
            Dictionary::new(),
        );
        assert_eq!(page_box(&doc, page_id), [0.0, 0.0, 300.0, 200.0]);
    }

    #[test]
    fn test_resources_inherited() {
        let font = Dictionary::from_iter([("F1", Object::Reference((40, 0)))]);
        let (doc, page_id) = doc_with_page(
            Dictionary::new(),
            Dictionary::from_iter([("Resources", Object::Dictionary(Dictionary::from_iter([("Font", Object::Dictionary(font))])))]),
        );
        assert!(resources(&doc, page_id).has(b"Font"));
    }
}
