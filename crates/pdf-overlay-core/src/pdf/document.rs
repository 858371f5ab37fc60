use lopdf::{Dictionary, Document, Object, ObjectId as LopdfId, Stream};
use tracing::debug;

use crate::engine::EngineError;
use super::content::PageObject;
use super::page;

const PDF_MAGIC: &str = "application/pdf";

/// A parsed document owned by the engine.
///
/// The lopdf object graph is the source of truth; a mupdf view of it is built
/// on demand for rasterization and dropped whenever content changes.
pub struct EngineDocument {
    pub(crate) inner: Document,
    page_ids: Vec<LopdfId>,
    snapshot: Option<mupdf::Document>,
}

impl EngineDocument {
    /// Parse a PDF from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EngineError> {
        let inner = Document::load_mem(bytes)
            .map_err(|e| EngineError::Parse(format!("Failed to parse PDF: {e}")))?;

        Ok(Self::from_document(inner))
    }

    pub(crate) fn from_document(inner: Document) -> Self {
        let page_ids = inner.get_pages().into_values().collect();
        Self {
            inner,
            page_ids,
            snapshot: None,
        }
    }

    /// Get number of pages
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub(crate) fn page_id(&self, index: usize) -> Option<LopdfId> {
        self.page_ids.get(index).copied()
    }

    pub(crate) fn invalidate_snapshot(&mut self) {
        self.snapshot = None;
    }

    /// mupdf view of the current object graph.
    pub(crate) fn snapshot(&mut self) -> Result<&mupdf::Document, EngineError> {
        if self.snapshot.is_none() {
            debug!("Building render snapshot");
            let copy = self.inner.clone();
            self.snapshot = Some(open_snapshot(copy)?);
        }
        self.snapshot
            .as_ref()
            .ok_or_else(|| EngineError::Render("render snapshot unavailable".to_string()))
    }

    /// One-off mupdf view with `page_id` showing `objects` instead of its stored content.
    pub(crate) fn snapshot_with(
        &self,
        page_id: LopdfId,
        objects: &[PageObject],
    ) -> Result<mupdf::Document, EngineError> {
        let mut copy = self.inner.clone();
        write_page_content(&mut copy, page_id, objects)?;
        open_snapshot(copy)
    }
}

impl std::fmt::Debug for EngineDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineDocument")
            .field("page_count", &self.page_ids.len())
            .field("objects", &self.inner.objects.len())
            .field("has_snapshot", &self.snapshot.is_some())
            .finish()
    }
}

fn open_snapshot(mut doc: Document) -> Result<mupdf::Document, EngineError> {
    // Objects are already decrypted in memory.
    strip_security(&mut doc);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| EngineError::Render(format!("Failed to serialize render snapshot: {e}")))?;

    mupdf::Document::from_bytes(&bytes, PDF_MAGIC).map_err(EngineError::from)
}

/// Remove encryption and permission restrictions.
pub(crate) fn strip_security(doc: &mut Document) {
    if let Ok(Object::Reference(encrypt_id)) = doc.trailer.get(b"Encrypt") {
        let encrypt_id = *encrypt_id;
        doc.objects.remove(&encrypt_id);
    }
    doc.trailer.remove(b"Encrypt");

    let root_id = match doc.trailer.get(b"Root") {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    };
    if let Some(catalog) = root_id.and_then(|id| doc.get_dictionary_mut(id).ok()) {
        catalog.remove(b"Perms");
    }
}

/// Rewrite the content of `page_id` from `objects`.
///
/// Form objects are registered in the page's `/XObject` resources; a form that
/// already has a name keeps it.
pub(crate) fn write_page_content(
    doc: &mut Document,
    page_id: LopdfId,
    objects: &[PageObject],
) -> Result<(), EngineError> {
    let mut resources = page::resources(doc, page_id);
    let mut xobjects = match resources.get(b"XObject").ok().and_then(|o| page::resolve(doc, o)) {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };

    let mut bytes = Vec::new();
    for object in objects {
        let name = object.form.map(|form_id| form_name(&mut xobjects, form_id));
        let block = object
            .encode(name.as_deref())
            .map_err(|e| EngineError::Content(format!("Failed to encode content: {e}")))?;
        if !bytes.is_empty() {
            bytes.push(b'\n');
        }
        bytes.extend(block);
    }
    let content_id = doc.add_object(Object::Stream(Stream::new(Dictionary::new(), bytes)));

    resources.set("XObject", Object::Dictionary(xobjects));

    let page = doc.get_dictionary_mut(page_id)?;
    page.set("Resources", Object::Dictionary(resources));
    page.set("Contents", Object::Reference(content_id));

    Ok(())
}

/// Resource name for `form_id`, registering a fresh `FXn` name if needed.
fn form_name(xobjects: &mut Dictionary, form_id: LopdfId) -> Vec<u8> {
    let existing = xobjects.iter().find_map(|(name, value)| match value {
        Object::Reference(id) if *id == form_id => Some(name.clone()),
        _ => None,
    });
    if let Some(name) = existing {
        return name;
    }

    let name = (0..)
        .map(|n| format!("FX{n}").into_bytes())
        .find(|candidate| !xobjects.has(candidate))
        .unwrap_or_default();
    xobjects.set(name.clone(), Object::Reference(form_id));
    name
}
