/*!
 * Size-bounded document splitting.
 *
 * A document's serialized size is not the sum of its pages' sizes (shared
 * fonts and images are written once per document), so the splitter measures
 * every candidate chunk by serializing it.
 */

use std::ops::RangeInclusive;
use std::sync::Arc;

use log::debug;

use super::{Chunk, DocumentCodec};
use crate::errors::DocumentError;

/// Default chunk ceiling, just under the surface's 10MB upload limit
pub const DEFAULT_MAX_CHUNK_BYTES: usize = 9 * 1024 * 1024;

/// Splits documents into ordered, contiguous, size-bounded chunks
pub struct DocumentSplitter<C: DocumentCodec> {
    codec: Arc<C>,
    max_chunk_bytes: usize,
}

impl<C: DocumentCodec> Clone for DocumentSplitter<C> {
    fn clone(&self) -> Self {
        Self {
            codec: Arc::clone(&self.codec),
            max_chunk_bytes: self.max_chunk_bytes,
        }
    }
}

impl<C: DocumentCodec> DocumentSplitter<C> {
    pub fn new(codec: Arc<C>, max_chunk_bytes: usize) -> Self {
        Self {
            codec,
            max_chunk_bytes,
        }
    }

    pub fn max_chunk_bytes(&self) -> usize {
        self.max_chunk_bytes
    }

    /// Load and split a serialized document
    pub fn split_bytes(&self, bytes: &[u8]) -> Result<Vec<Chunk>, DocumentError> {
        let doc = self.codec.load(bytes)?;
        self.split(&doc)
    }

    /// Split a loaded document.
    ///
    /// Grows a candidate page by page. When adding a page pushes the candidate
    /// over the ceiling, the candidate without that page is emitted and a new
    /// candidate starts at it. A single page that is over the ceiling on its
    /// own is emitted as an oversized chunk, since pages are never divided.
    pub fn split(&self, doc: &C::Document) -> Result<Vec<Chunk>, DocumentError> {
        let total_pages = self.codec.page_count(doc);
        let mut chunks = Vec::new();
        let mut start = 0;
        // Serialized bytes of pages start..i-1 when they fit
        let mut last_fit: Option<Vec<u8>> = None;

        for i in 0..total_pages {
            let candidate = self.render(doc, start..=i)?;

            if candidate.len() > self.max_chunk_bytes && i > start {
                let buffer = match last_fit.take() {
                    Some(buffer) => buffer,
                    None => self.render(doc, start..=i - 1)?,
                };
                debug!(
                    "Chunk {}: pages {}-{} ({} bytes)",
                    chunks.len() + 1,
                    start + 1,
                    i,
                    buffer.len()
                );
                chunks.push(Chunk::new(buffer, start + 1, i));
                start = i;
            } else {
                last_fit = Some(candidate);
            }
        }

        if start < total_pages {
            let buffer = match last_fit.take() {
                Some(buffer) => buffer,
                None => self.render(doc, start..=total_pages - 1)?,
            };
            debug!(
                "Chunk {}: pages {}-{} ({} bytes)",
                chunks.len() + 1,
                start + 1,
                total_pages,
                buffer.len()
            );
            chunks.push(Chunk::new(buffer, start + 1, total_pages));
        }

        Ok(chunks)
    }

    fn render(&self, doc: &C::Document, pages: RangeInclusive<usize>) -> Result<Vec<u8>, DocumentError> {
        let mut part = self.codec.extract_pages(doc, pages)?;
        self.codec.serialize(&mut part)
    }
}
