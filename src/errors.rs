/*!
 * Error types for the pdf-chunk-translator pipeline.
 *
 * This module contains custom error types for the different stages of a job,
 * using the thiserror crate for ergonomic error definitions:
 * - `DocumentError`: loading, slicing, serializing and merging documents
 * - `StoreError`: temporary artifact storage
 * - `DriverError`: the browsing engine driving the translation surface
 * - `SessionFailure`: one chunk's failed translation session
 * - `JobError`: terminal failure of a whole translation job
 */

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::translation::session::SessionState;

/// Errors raised by a document codec
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The buffer is not a readable paginated document
    #[error("Failed to parse document: {0}")]
    Parse(String),

    /// A page range could not be copied out of the document
    #[error("Failed to extract pages: {0}")]
    Extract(String),

    /// The document could not be written back to bytes
    #[error("Failed to serialize document: {0}")]
    Serialize(String),

    /// Pages could not be appended to the output document
    #[error("Failed to merge document: {0}")]
    Merge(String),

    /// A page index outside the document was requested
    #[error("Page index {index} out of range for document with {count} pages")]
    PageOutOfRange {
        /// Requested 0-based page index
        index: usize,
        /// Number of pages in the document
        count: usize,
    },
}

/// Errors raised by the chunk store
#[derive(Error, Debug)]
pub enum StoreError {
    /// The work directory could not be created
    #[error("Failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A chunk could not be written
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by a browsing engine or one of its sessions
#[derive(Error, Debug)]
pub enum DriverError {
    /// The engine process could not be started
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// The entry point could not be loaded
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// An expected control is not on the page
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// The page, context or engine was closed underneath the session
    #[error("Target page, context or browser has been closed: {0}")]
    TargetClosed(String),

    /// A bounded wait expired
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Any other protocol-level failure
    #[error("Browser protocol error: {0}")]
    Protocol(String),

    /// Local file system failure while handling an artifact
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    /// Whether the session is gone rather than merely slow
    pub fn is_target_gone(&self) -> bool {
        matches!(self, Self::TargetClosed(_))
    }
}

/// Why a translation session ended in the failed state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// The engine could not be launched or reached
    #[error("browser engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Opening the session or loading the entry point failed
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// The upload control was missing or rejected the artifact
    #[error("upload failed: {0}")]
    Upload(String),

    /// No known trigger label became visible
    #[error("trigger not found")]
    TriggerNotFound,

    /// The driver failed while looking for or clicking the trigger
    #[error("trigger failed: {0}")]
    Trigger(String),

    /// No download control appeared before the completion bound
    #[error("timeout waiting for translation to complete after {waited_secs}s")]
    CompletionTimeout { waited_secs: u64 },

    /// The surface closed the session, most likely after detecting automation
    #[error("session closed by the translation service (possible bot detection)")]
    BotDetected,

    /// The download-ready notification never arrived
    #[error("timeout waiting for download: {0}")]
    DownloadTimeout(String),

    /// The downloaded artifact could not be persisted
    #[error("failed to save download: {0}")]
    DownloadSaveFailed(String),

    /// The downloaded artifact was empty
    #[error("downloaded artifact is empty")]
    EmptyArtifact,

    /// The translated artifact does not have as many pages as its chunk
    #[error("translated artifact has {actual} pages, expected {expected}")]
    PageCountMismatch { expected: usize, actual: usize },
}

/// A failed translation session for one artifact
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} failed in state {state}: {cause}", .artifact.display())]
pub struct SessionFailure {
    /// The artifact the session was translating
    pub artifact: PathBuf,
    /// The last state the session reached before failing
    pub state: SessionState,
    /// Human readable cause
    pub cause: FailureCause,
}

impl SessionFailure {
    pub fn new(artifact: impl Into<PathBuf>, state: SessionState, cause: FailureCause) -> Self {
        Self {
            artifact: artifact.into(),
            state,
            cause,
        }
    }

    /// Whether the whole engine should be recreated before translating more artifacts
    pub fn requires_engine_restart(&self) -> bool {
        matches!(self.cause, FailureCause::BotDetected)
    }

    /// Whether the batch may retry this artifact with a fresh session
    pub fn is_retryable(&self) -> bool {
        matches!(self.cause, FailureCause::Navigation(_))
    }
}

/// One failed chunk of a job, identified by its page range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedChunk {
    /// 1-based position of the chunk in the job
    pub index: usize,
    pub start_page: usize,
    pub end_page: usize,
    pub cause: FailureCause,
}

impl fmt::Display for FailedChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chunk {} (pages {}-{}): {}",
            self.index, self.start_page, self.end_page, self.cause
        )
    }
}

fn describe_failures(failures: &[FailedChunk]) -> String {
    let mut text = failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    if failures.iter().any(|f| f.cause == FailureCause::BotDetected) {
        text.push_str(
            "; the browser engine was recreated, retry the failed ranges with slower pacing or a different identity",
        );
    }
    text
}

/// Terminal failure of a translation job
#[derive(Error, Debug)]
pub enum JobError {
    /// The request itself is unusable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The source document could not be read or split
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    /// Temporary artifacts could not be stored
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// At least one chunk failed to translate; no output was produced
    #[error("{} of {total} chunks failed to translate: {}", .failures.len(), describe_failures(.failures))]
    ChunksFailed {
        failures: Vec<FailedChunk>,
        total: usize,
    },

    /// A translated artifact could not be merged
    #[error("Merge failed: {0}")]
    Merge(DocumentError),

    /// Local file system failure outside the chunk store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl JobError {
    /// The failed chunks, if the job aborted at the translation gate
    pub fn failed_chunks(&self) -> &[FailedChunk] {
        match self {
            Self::ChunksFailed { failures, .. } => failures,
            _ => &[],
        }
    }
}
