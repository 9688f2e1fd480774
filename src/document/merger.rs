/*!
 * Ordered reassembly of translated chunks.
 */

use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info};

use super::DocumentCodec;
use crate::errors::DocumentError;

/// Concatenates documents page by page, in input order
pub struct DocumentMerger<C: DocumentCodec> {
    codec: Arc<C>,
}

impl<C: DocumentCodec> Clone for DocumentMerger<C> {
    fn clone(&self) -> Self {
        Self {
            codec: Arc::clone(&self.codec),
        }
    }
}

impl<C: DocumentCodec> DocumentMerger<C> {
    pub fn new(codec: Arc<C>) -> Self {
        Self { codec }
    }

    /// Merge serialized documents into one document.
    ///
    /// Every page of every artifact is copied in order; nothing is reordered,
    /// deduplicated or filtered. Any artifact that fails to parse fails the merge.
    pub fn merge<B: AsRef<[u8]>>(&self, artifacts: &[B]) -> Result<C::Document, DocumentError> {
        let mut merged = self.codec.create();

        for (i, artifact) in artifacts.iter().enumerate() {
            let doc = self.codec.load(artifact.as_ref()).map_err(|e| {
                DocumentError::Merge(format!("artifact {} is unreadable: {}", i + 1, e))
            })?;
            let pages: Vec<usize> = (0..self.codec.page_count(&doc)).collect();
            debug!("Merging artifact {}/{} ({} pages)", i + 1, artifacts.len(), pages.len());
            self.codec.merge_into(&mut merged, &doc, &pages)?;
        }

        Ok(merged)
    }

    /// Merge serialized documents and serialize the result
    pub fn merge_to_bytes<B: AsRef<[u8]>>(&self, artifacts: &[B]) -> Result<Vec<u8>, DocumentError> {
        let mut merged = self.merge(artifacts)?;
        self.codec.serialize(&mut merged)
    }

    /// Read artifacts from disk, in order, and merge them into serialized bytes
    pub async fn merge_files(&self, paths: &[PathBuf]) -> Result<Vec<u8>, DocumentError> {
        let mut artifacts = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = tokio::fs::read(path).await.map_err(|e| {
                DocumentError::Merge(format!("cannot read {}: {}", path.display(), e))
            })?;
            artifacts.push(bytes);
        }

        let merger = self.clone();
        let merged = tokio::task::spawn_blocking(move || merger.merge_to_bytes(&artifacts))
            .await
            .map_err(|e| DocumentError::Merge(format!("merge task failed: {}", e)))??;

        info!("Merged {} artifacts ({} bytes)", paths.len(), merged.len());
        Ok(merged)
    }
}
