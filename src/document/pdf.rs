/*!
 * PDF implementation of the document codec, built on lopdf.
 */

use std::collections::HashMap;
use std::ops::RangeInclusive;

use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};

use super::DocumentCodec;
use crate::errors::DocumentError;

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE_ATTRIBUTES: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Page trees deeper than this are treated as corrupt
const MAX_TREE_DEPTH: usize = 64;

const PDF_VERSION: &str = "1.7";

/// PDF codec
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfCodec;

impl PdfCodec {
    pub fn new() -> Self {
        Self
    }

    fn pages_root(doc: &Document) -> Result<ObjectId, String> {
        let root = doc
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .map_err(|e| format!("missing document catalog: {}", e))?;
        doc.get_dictionary(root)
            .and_then(|catalog| catalog.get(b"Pages"))
            .and_then(Object::as_reference)
            .map_err(|e| format!("missing page tree: {}", e))
    }

    /// Copy of a page dictionary with inherited attributes made explicit,
    /// so the page keeps its look once detached from its original tree
    fn flatten_page(doc: &Document, page_id: ObjectId) -> Result<Dictionary, DocumentError> {
        let mut page = doc
            .get_dictionary(page_id)
            .map_err(|e| DocumentError::Extract(format!("page {:?}: {}", page_id, e)))?
            .clone();

        let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
        let mut depth = 0;
        while let Some(parent_id) = parent {
            depth += 1;
            if depth > MAX_TREE_DEPTH {
                return Err(DocumentError::Extract("page tree too deep".to_string()));
            }
            let node = match doc.get_dictionary(parent_id) {
                Ok(node) => node,
                Err(_) => break,
            };
            for key in INHERITABLE_ATTRIBUTES {
                if !page.has(key) {
                    if let Ok(value) = node.get(key) {
                        page.set(key.to_vec(), value.clone());
                    }
                }
            }
            parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        }

        Ok(page)
    }

    fn is_page_tree_node(object: &Object) -> bool {
        matches!(object.type_name(), Ok("Page") | Ok("Pages") | Ok("Catalog"))
    }

    /// Append copies of `page_ids` from `source` to the page tree of `target`.
    ///
    /// Only objects reachable from the selected pages are copied, each once,
    /// under fresh ids. References to page tree nodes that were not selected
    /// are cut to `null`.
    fn copy_pages(
        target: &mut Document,
        source: &Document,
        page_ids: &[ObjectId],
    ) -> Result<(), DocumentError> {
        let target_pages = Self::pages_root(target).map_err(DocumentError::Merge)?;

        let mut copier = ObjectCopier::new(source, target);
        let mut copied_pages = Vec::with_capacity(page_ids.len());
        for &page_id in page_ids {
            let page = Self::flatten_page(source, page_id)?;
            let new_id = copier.reserve(page_id);
            copied_pages.push((new_id, page));
        }

        let mut kids = Vec::with_capacity(copied_pages.len());
        for (new_id, mut page) in copied_pages {
            page.remove(b"Parent");
            copier.remap_dictionary(&mut page);
            page.set("Parent", target_pages);
            copier.target.objects.insert(new_id, Object::Dictionary(page));
            kids.push(Object::Reference(new_id));
        }
        copier.drain();

        let pages = target
            .get_object_mut(target_pages)
            .and_then(Object::as_dict_mut)
            .map_err(|e| DocumentError::Merge(e.to_string()))?;
        let count = {
            let existing = pages
                .get_mut(b"Kids")
                .and_then(Object::as_array_mut)
                .map_err(|e| DocumentError::Merge(e.to_string()))?;
            existing.extend(kids);
            existing.len()
        };
        pages.set("Count", count as i64);
        Ok(())
    }
}

/// Copies the object graph hanging off a set of pages into another document
struct ObjectCopier<'a> {
    source: &'a Document,
    target: &'a mut Document,
    /// Source id to target id
    ids: HashMap<ObjectId, ObjectId>,
    pending: Vec<(ObjectId, ObjectId)>,
}

impl<'a> ObjectCopier<'a> {
    fn new(source: &'a Document, target: &'a mut Document) -> Self {
        Self {
            source,
            target,
            ids: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// Allocate the target id of a page that is copied by the caller
    fn reserve(&mut self, page_id: ObjectId) -> ObjectId {
        if let Some(&new_id) = self.ids.get(&page_id) {
            return new_id;
        }
        let new_id = self.target.new_object_id();
        self.ids.insert(page_id, new_id);
        new_id
    }

    fn map_reference(&mut self, id: ObjectId) -> Object {
        if let Some(&new_id) = self.ids.get(&id) {
            return Object::Reference(new_id);
        }
        match self.source.objects.get(&id) {
            Some(object) if !PdfCodec::is_page_tree_node(object) => {
                let new_id = self.target.new_object_id();
                self.ids.insert(id, new_id);
                self.pending.push((id, new_id));
                Object::Reference(new_id)
            }
            _ => Object::Null,
        }
    }

    fn remap(&mut self, object: &mut Object) {
        match object {
            Object::Reference(id) => {
                let id = *id;
                *object = self.map_reference(id);
            }
            Object::Array(items) => {
                for item in items.iter_mut() {
                    self.remap(item);
                }
            }
            Object::Dictionary(dict) => self.remap_dictionary(dict),
            Object::Stream(stream) => self.remap_dictionary(&mut stream.dict),
            _ => {}
        }
    }

    fn remap_dictionary(&mut self, dict: &mut Dictionary) {
        for (_, value) in dict.iter_mut() {
            self.remap(value);
        }
    }

    /// Copy every object discovered so far, and whatever those reference
    fn drain(&mut self) {
        while let Some((source_id, new_id)) = self.pending.pop() {
            let mut object = match self.source.objects.get(&source_id) {
                Some(object) => object.clone(),
                None => Object::Null,
            };
            self.remap(&mut object);
            self.target.objects.insert(new_id, object);
        }
    }
}

impl DocumentCodec for PdfCodec {
    type Document = Document;

    fn load(&self, bytes: &[u8]) -> Result<Document, DocumentError> {
        let doc = Document::load_mem(bytes).map_err(|e| DocumentError::Parse(e.to_string()))?;
        // A document without a usable page tree cannot be chunked
        Self::pages_root(&doc).map_err(DocumentError::Parse)?;
        Ok(doc)
    }

    fn page_count(&self, doc: &Document) -> usize {
        doc.get_pages().len()
    }

    fn create(&self) -> Document {
        let mut doc = Document::with_version(PDF_VERSION);
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0i64,
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    fn serialize(&self, doc: &mut Document) -> Result<Vec<u8>, DocumentError> {
        doc.prune_objects();
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)
            .map_err(|e| DocumentError::Serialize(e.to_string()))?;
        Ok(buffer)
    }

    fn merge_into(
        &self,
        target: &mut Document,
        source: &Document,
        page_indices: &[usize],
    ) -> Result<(), DocumentError> {
        let source_pages: Vec<ObjectId> = source.page_iter().collect();
        let page_ids = page_indices
            .iter()
            .map(|&index| {
                source_pages
                    .get(index)
                    .copied()
                    .ok_or(DocumentError::PageOutOfRange {
                        index,
                        count: source_pages.len(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::copy_pages(target, source, &page_ids)
    }

    fn extract_pages(
        &self,
        doc: &Document,
        pages: RangeInclusive<usize>,
    ) -> Result<Document, DocumentError> {
        let source_pages: Vec<ObjectId> = doc.page_iter().collect();
        let (start, end) = (*pages.start(), *pages.end());
        if end >= source_pages.len() {
            return Err(DocumentError::PageOutOfRange {
                index: end,
                count: source_pages.len(),
            });
        }

        let mut part = self.create();
        Self::copy_pages(&mut part, doc, source_pages.get(start..=end).unwrap_or_default())?;
        Ok(part)
    }
}
