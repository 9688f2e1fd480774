/*!
 * # pdf-chunk-translator
 *
 * Translate PDF documents that are too large for a web document translation
 * surface by splitting them into size-bounded chunks, translating every chunk
 * through a browser-driven session, and merging the results in page order.
 *
 * ## Features
 *
 * - Greedy, size-measured splitting that never divides a page
 * - One isolated browser context per chunk, on a shared, supervised engine
 * - Label lookup table for the surface's localized buttons
 * - All-or-nothing jobs: any failed chunk aborts the merge and is reported by page range
 * - Temporary artifacts removed after every job, successful or not
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `document`: Document codec, splitter and merger
 * - `chunk_store`: Temporary chunk storage
 * - `browser`: Browsing engine boundary, Chromium driver and engine supervisor
 * - `translation`: Translation sessions and batches:
 *   - `translation::labels`: Control labels per locale
 *   - `translation::session`: Per-artifact session state machine
 *   - `translation::batch`: Sequential batch translation
 * - `file_utils`: File system operations
 * - `app_controller`: Main application controller
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod browser;
pub mod chunk_store;
pub mod document;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::Controller;
pub use document::{Chunk, ChunkPlan, DocumentCodec, DocumentMerger, DocumentSplitter, PdfCodec};
pub use errors::{DocumentError, DriverError, FailedChunk, FailureCause, JobError, SessionFailure, StoreError};
pub use language_utils::{get_language_name, normalize_to_part2t};
pub use translation::{BatchTranslator, TranslationResult, TranslationSession};
