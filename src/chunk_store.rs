/*!
 * Temporary storage for chunk artifacts.
 *
 * The store writes each chunk to its own file in a work directory and removes
 * artifacts on request. Removal is best-effort: a file that cannot be deleted
 * is logged and the remaining files are still removed.
 */

use std::path::{Path, PathBuf};

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::document::Chunk;
use crate::errors::StoreError;

static UNSAFE_NAME_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]+").unwrap());

/// A chunk written to the work directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedChunk {
    pub chunk: Chunk,
    /// Location of the chunk file
    pub path: PathBuf,
    /// File name of the chunk file
    pub filename: String,
}

impl PersistedChunk {
    pub fn start_page(&self) -> usize {
        self.chunk.start_page
    }

    pub fn end_page(&self) -> usize {
        self.chunk.end_page
    }
}

/// Work-directory backed chunk store
#[derive(Debug, Clone)]
pub struct ChunkStore {
    root: PathBuf,
}

impl ChunkStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name for the chunk at 1-based `position`
    pub fn chunk_filename(job_prefix: &str, position: usize) -> String {
        let prefix = UNSAFE_NAME_CHARS.replace_all(job_prefix, "_");
        format!("{}_chunk_{}.pdf", prefix, position)
    }

    /// Write chunks to the work directory, in order
    pub async fn persist(
        &self,
        chunks: &[Chunk],
        job_prefix: &str,
    ) -> Result<Vec<PersistedChunk>, StoreError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| StoreError::CreateDir {
                path: self.root.clone(),
                source,
            })?;

        let mut persisted: Vec<PersistedChunk> = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            let filename = Self::chunk_filename(job_prefix, i + 1);
            let path = self.root.join(&filename);

            if let Err(source) = tokio::fs::write(&path, &chunk.buffer).await {
                let written: Vec<PathBuf> = persisted.iter().map(|p| p.path.clone()).collect();
                self.release(&written).await;
                // A partially written file may exist as well
                self.release(std::slice::from_ref(&path)).await;
                return Err(StoreError::Write { path, source });
            }

            debug!("Stored chunk {} at {}", i + 1, path.display());
            persisted.push(PersistedChunk {
                chunk: chunk.clone(),
                path,
                filename,
            });
        }

        Ok(persisted)
    }

    /// Remove artifacts, continuing past failures
    pub async fn release(&self, paths: &[PathBuf]) {
        for path in paths {
            match tokio::fs::remove_file(path).await {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to delete {}: {}", path.display(), e),
            }
        }
    }
}
