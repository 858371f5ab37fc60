//! Importing a page of one document into another as a Form XObject.
//!
//! The source is cloned and renumbered above the target's highest object id,
//! so its objects can be merged without collisions. Page-tree structure
//! (catalog, page tree nodes, pages, outlines) is left behind; everything the
//! page content can reach comes along.

use lopdf::{Dictionary, Document, Object, ObjectId as LopdfId, Stream};
use tracing::debug;

use crate::engine::EngineError;
use super::page;

/// Import page `page_number` (one-based) of `source` into `target` and return
/// the id of the new form XObject.
pub(crate) fn import_page_as_form(
    target: &mut Document,
    source: &Document,
    page_number: u32,
) -> Result<LopdfId, EngineError> {
    let mut source = source.clone();
    source.renumber_objects_with(target.max_id + 1);

    let page_id = *source
        .get_pages()
        .get(&page_number)
        .ok_or(EngineError::MissingPage(page_number))?;

    let content = source
        .get_page_content(page_id)
        .map_err(|e| EngineError::Content(format!("Failed to read source page content: {e}")))?;
    let [x0, y0, x1, y1] = page::page_box(&source, page_id);
    let resources = page::resources(&source, page_id);

    let mut copied = 0_usize;
    for (object_id, object) in std::mem::take(&mut source.objects) {
        match object.type_name().unwrap_or(b"") {
            b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline" => {}
            _ => {
                target.objects.insert(object_id, object);
                copied += 1;
            }
        }
    }
    target.max_id = target
        .objects
        .keys()
        .map(|id| id.0)
        .max()
        .unwrap_or(0)
        .max(target.max_id);

    let form = Stream::new(
        Dictionary::from_iter([
            ("Type", Object::Name(b"XObject".to_vec())),
            ("Subtype", Object::Name(b"Form".to_vec())),
            (
                "BBox",
                Object::Array(vec![x0.into(), y0.into(), x1.into(), y1.into()]),
            ),
            ("Resources", Object::Dictionary(resources)),
        ]),
        content,
    );
    let form_id = target.add_object(Object::Stream(form));

    debug!(
        "Imported source page {} as form {:?} ({} objects copied)",
        page_number, form_id, copied
    );
    Ok(form_id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};

    fn single_page(width: i64, height: i64, ops: Vec<Operation>) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            Content { operations: ops }.encode().unwrap(),
        ));
        let page_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Contents", Object::Reference(content_id)),
            (
                "MediaBox",
                Object::Array(vec![0.into(), 0.into(), width.into(), height.into()]),
            ),
        ]));
        doc.objects.insert(
            pages_id,
            Object::Dictionary(Dictionary::from_iter([
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Kids", Object::Array(vec![Object::Reference(page_id)])),
                ("Count", Object::Integer(1)),
            ])),
        );
        let catalog_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc
    }

    #[test]
    fn test_import_creates_form_above_existing_ids() {
        let mut target = single_page(200, 200, vec![]);
        let before_max = target.max_id;
        let source = single_page(
            120,
            40,
            vec![Operation::new("re", vec![0.into(), 0.into(), 10.into(), 10.into()]), Operation::new("f", vec![])],
        );

        let form_id = import_page_as_form(&mut target, &source, 1).unwrap();

        assert!(form_id.0 > before_max);
        let form = target.get_object(form_id).unwrap().as_stream().unwrap();
        assert!(matches!(form.dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Form"));
        assert!(!form.content.is_empty());
        // The target keeps exactly one page.
        assert_eq!(target.get_pages().len(), 1);
    }

    #[test]
    fn test_import_missing_page() {
        let mut target = single_page(200, 200, vec![]);
        let source = single_page(100, 100, vec![]);

        let result = import_page_as_form(&mut target, &source, 2);
        assert!(matches!(result, Err(EngineError::MissingPage(2))));
    }
}
