/*!
 * Translation of chunk artifacts through the document translation surface.
 *
 * This module is split into several submodules:
 *
 * - `labels`: visible control labels per interface locale
 * - `session`: the per-artifact session state machine
 * - `batch`: sequential translation of all artifacts of a job
 */

// Re-export main types for easier usage
pub use self::batch::{BatchOptions, BatchTranslator, TranslationResult};
pub use self::labels::{ControlKind, ControlLabel, LabelTable};
pub use self::session::{SessionOptions, SessionState, TranslationSession};

// Submodules
pub mod batch;
pub mod labels;
pub mod session;
