//! Production engine: lopdf object graph, mupdf rasterization.

use lopdf::Object;
use tracing::debug;

use crate::engine::{Engine, EngineError, MarkId, ObjectId, ObjectKind, RenderOptions, SaveOptions};
use crate::geometry::{ClipRect, Matrix};
use crate::sink::FileSink;
use super::content::{self, Mark, PageObject};
use super::document::{self, EngineDocument};
use super::import;
use super::page::{self, EnginePage};
use super::raster;

/// PDF engine backed by lopdf and mupdf.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfEngine;

impl PdfEngine {
    pub const fn new() -> Self {
        Self
    }
}

fn mark_mut(object: &mut PageObject, mark: MarkId) -> Result<&mut Mark, EngineError> {
    object
        .marks
        .get_mut(mark.0)
        .ok_or_else(|| EngineError::Mark(format!("object {} has no mark {}", object.id, mark.0)))
}

fn check_key(key: &str) -> Result<(), EngineError> {
    if key.is_empty() {
        return Err(EngineError::Mark("mark key must not be empty".to_string()));
    }
    Ok(())
}

impl Engine for PdfEngine {
    type Document = EngineDocument;
    type Page = EnginePage;
    type Object = PageObject;

    fn load_document(&self, bytes: &[u8]) -> Result<EngineDocument, EngineError> {
        EngineDocument::from_bytes(bytes)
    }

    fn page_count(&self, doc: &EngineDocument) -> usize {
        doc.page_count()
    }

    fn load_page(&self, doc: &mut EngineDocument, index: usize) -> Result<EnginePage, EngineError> {
        let page_id = doc
            .page_id(index)
            .ok_or_else(|| EngineError::MissingPage(u32::try_from(index).map_or(u32::MAX, |n| n.saturating_add(1))))?;

        let bytes = doc
            .inner
            .get_page_content(page_id)
            .map_err(|e| EngineError::Content(format!("Failed to read page content: {e}")))?;
        let size = page::page_size(&doc.inner, page_id);

        Ok(EnginePage::new(index, page_id, size, bytes))
    }

    fn page_width(&self, page: &EnginePage) -> f32 {
        page.size.width
    }

    fn page_height(&self, page: &EnginePage) -> f32 {
        page.size.height
    }

    fn rasterize_page(
        &self,
        doc: &mut EngineDocument,
        page: &EnginePage,
        buffer: &mut [u8],
        width: u32,
        height: u32,
        transform: &Matrix,
        clip: &ClipRect,
        options: RenderOptions,
    ) -> Result<(), EngineError> {
        if let Some(objects) = page.parsed_objects().filter(|_| page.dirty) {
            let scratch = doc.snapshot_with(page.id, objects)?;
            raster::rasterize(&scratch, page.index, buffer, width, height, transform, clip, options)
        } else {
            let snapshot = doc.snapshot()?;
            raster::rasterize(snapshot, page.index, buffer, width, height, transform, clip, options)
        }
    }

    fn import_page_as_object(
        &self,
        target: &mut EngineDocument,
        source: &EngineDocument,
        source_page_number: u32,
    ) -> Result<PageObject, EngineError> {
        let form_id = import::import_page_as_form(&mut target.inner, &source.inner, source_page_number)?;
        Ok(PageObject::form(content::next_object_id(), form_id))
    }

    fn create_mark(&self, object: &mut PageObject, name: &str) -> Result<MarkId, EngineError> {
        if name.is_empty() {
            return Err(EngineError::Mark("mark name must not be empty".to_string()));
        }
        object.marks.push(Mark::new(name));
        Ok(MarkId(object.marks.len() - 1))
    }

    fn set_mark_string(
        &self,
        _doc: &mut EngineDocument,
        object: &mut PageObject,
        mark: MarkId,
        key: &str,
        value: &str,
    ) -> Result<(), EngineError> {
        check_key(key)?;
        mark_mut(object, mark)?.set(key, content::text_string(value));
        Ok(())
    }

    fn set_mark_int(
        &self,
        _doc: &mut EngineDocument,
        object: &mut PageObject,
        mark: MarkId,
        key: &str,
        value: i64,
    ) -> Result<(), EngineError> {
        check_key(key)?;
        mark_mut(object, mark)?.set(key, Object::Integer(value));
        Ok(())
    }

    fn transform_object(&self, object: &mut PageObject, matrix: &Matrix) {
        object.transform = object.transform.concat(matrix);
    }

    fn object_kind(&self, object: &PageObject) -> ObjectKind {
        object.kind
    }

    fn insert_object(&self, page: &mut EnginePage, object: PageObject) {
        page.objects_mut().push(object);
        page.dirty = true;
    }

    fn count_objects(&self, page: &mut EnginePage) -> usize {
        page.objects_mut().len()
    }

    fn object_at(&self, page: &mut EnginePage, index: usize) -> Result<ObjectId, EngineError> {
        let objects = page.objects_mut();
        objects
            .get(index)
            .map(|object| object.id)
            .ok_or_else(|| EngineError::ObjectNotFound(format!("index {index} of {}", objects.len())))
    }

    fn remove_object(&self, page: &mut EnginePage, id: ObjectId) -> Result<PageObject, EngineError> {
        let objects = page.objects_mut();
        let position = objects
            .iter()
            .position(|object| object.id == id)
            .ok_or_else(|| EngineError::ObjectNotFound(format!("object {id}")))?;
        let removed = objects.remove(position);
        page.dirty = true;
        Ok(removed)
    }

    fn has_pending_changes(&self, page: &EnginePage) -> bool {
        page.dirty
    }

    fn generate_content(&self, doc: &mut EngineDocument, page: &mut EnginePage) -> Result<(), EngineError> {
        document::write_page_content(&mut doc.inner, page.id, page.objects_mut())?;
        page.dirty = false;
        doc.invalidate_snapshot();
        Ok(())
    }

    fn serialize_document(
        &self,
        doc: &mut EngineDocument,
        sink: &mut FileSink,
        options: SaveOptions,
    ) -> Result<(), EngineError> {
        let mut out = doc.inner.clone();
        if options.remove_security {
            document::strip_security(&mut out);
        }
        let pruned = out.prune_objects();
        debug!("Pruned {} unreachable objects before save", pruned.len());

        out.save_to(sink)
            .map_err(|e| EngineError::Write(format!("Failed to save PDF: {e}")))?;
        Ok(())
    }
}
