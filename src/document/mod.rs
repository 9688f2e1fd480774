/*!
 * Paginated document handling.
 *
 * - `DocumentCodec`: the boundary to the document format (load, slice, serialize, merge)
 * - `pdf`: the PDF codec built on lopdf
 * - `splitter`: size-bounded chunking of a document
 * - `merger`: ordered reassembly of translated chunks
 */

use std::ops::RangeInclusive;

use bytes::Bytes;
use serde::Serialize;

use crate::errors::DocumentError;

pub mod merger;
pub mod pdf;
pub mod splitter;

pub use self::merger::DocumentMerger;
pub use self::pdf::PdfCodec;
pub use self::splitter::DocumentSplitter;

/// Boundary to a paginated document format.
///
/// Pages are addressed by 0-based index. Implementations must be deterministic:
/// serializing the same page set twice yields the same number of bytes.
pub trait DocumentCodec: Send + Sync + 'static {
    /// In-memory form of a loaded document
    type Document: Send;

    /// Parse a document from its serialized bytes
    fn load(&self, bytes: &[u8]) -> Result<Self::Document, DocumentError>;

    /// Number of pages in the document
    fn page_count(&self, doc: &Self::Document) -> usize;

    /// Create an empty document with no pages
    fn create(&self) -> Self::Document;

    /// Serialize the document to bytes
    fn serialize(&self, doc: &mut Self::Document) -> Result<Vec<u8>, DocumentError>;

    /// Append the given pages of `source`, in the given order, to `target`
    fn merge_into(
        &self,
        target: &mut Self::Document,
        source: &Self::Document,
        page_indices: &[usize],
    ) -> Result<(), DocumentError>;

    /// Copy a contiguous page range into a new document
    fn extract_pages(
        &self,
        doc: &Self::Document,
        pages: RangeInclusive<usize>,
    ) -> Result<Self::Document, DocumentError> {
        let count = self.page_count(doc);
        if *pages.end() >= count {
            return Err(DocumentError::PageOutOfRange {
                index: *pages.end(),
                count,
            });
        }

        let indices: Vec<usize> = pages.collect();
        let mut part = self.create();
        self.merge_into(&mut part, doc, &indices)?;
        Ok(part)
    }
}

/// A contiguous, size-bounded slice of a source document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Serialized chunk document
    pub buffer: Bytes,
    /// First page, 1-based, inclusive
    pub start_page: usize,
    /// Last page, 1-based, inclusive
    pub end_page: usize,
    /// Size of `buffer` in bytes
    pub size: usize,
}

impl Chunk {
    pub fn new(buffer: impl Into<Bytes>, start_page: usize, end_page: usize) -> Self {
        let buffer = buffer.into();
        Self {
            size: buffer.len(),
            buffer,
            start_page,
            end_page,
        }
    }

    /// Number of pages in the chunk
    pub fn page_count(&self) -> usize {
        self.end_page - self.start_page + 1
    }
}

/// Summary of how a document would be chunked, without translating it
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChunkPlan {
    pub filename: String,
    pub total_size: usize,
    pub total_pages: usize,
    pub total_chunks: usize,
    pub chunks: Vec<ChunkSummary>,
}

/// One planned chunk
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChunkSummary {
    /// 1-based chunk position
    pub index: usize,
    pub start_page: usize,
    pub end_page: usize,
    pub size: usize,
    pub size_readable: String,
}

impl ChunkPlan {
    pub fn new(filename: &str, total_size: usize, total_pages: usize, chunks: &[Chunk]) -> Self {
        let chunks: Vec<ChunkSummary> = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| ChunkSummary {
                index: i + 1,
                start_page: chunk.start_page,
                end_page: chunk.end_page,
                size: chunk.size,
                size_readable: readable_size(chunk.size),
            })
            .collect();

        Self {
            filename: filename.to_string(),
            total_size,
            total_pages,
            total_chunks: chunks.len(),
            chunks,
        }
    }
}

/// Format a byte count as megabytes with two decimals
pub fn readable_size(bytes: usize) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}
