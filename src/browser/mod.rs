/*!
 * Browsing engine boundary used to drive the translation surface.
 *
 * The translation surface has no programmatic API; it is driven through a
 * browser. This module contains:
 * - `BrowserEngine`: a running engine that can open isolated sessions
 * - `SurfaceSession`: one isolated browsing context with a single page
 * - `supervisor`: lazy launch, liveness tracking and teardown of the engine
 * - `chromium`: the Chromium implementation over the DevTools protocol
 * - `mock`: a scripted engine for tests
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::DriverError;
use crate::translation::labels::ControlLabel;

pub mod chromium;
pub mod mock;
pub mod supervisor;

pub use self::supervisor::{EngineLauncher, EngineSupervisor};

/// Per-session options
#[derive(Debug, Clone)]
pub struct SessionProfile {
    /// Directory where downloads of this session land
    pub download_dir: PathBuf,
}

/// A file the surface delivered through a download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedDownload {
    /// File name proposed by the surface
    pub suggested_filename: String,
    /// Where the engine wrote the file
    pub path: PathBuf,
}

/// A running browsing engine
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Open a fresh, isolated session
    async fn open_session(
        &self,
        profile: &SessionProfile,
    ) -> Result<Box<dyn SurfaceSession>, DriverError>;

    /// Whether the engine is still usable
    fn is_connected(&self) -> bool;

    /// Stop the engine
    async fn shutdown(&self) -> Result<(), DriverError>;
}

/// One isolated browsing context driving the surface
#[async_trait]
pub trait SurfaceSession: Send {
    /// Load a URL and wait for it to settle
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    /// Submit a local file through the file input matching `selector`
    async fn upload_file(&mut self, selector: &str, file: &Path) -> Result<(), DriverError>;

    /// Whether a button with the given label is currently visible
    async fn is_control_visible(&mut self, control: &ControlLabel) -> Result<bool, DriverError>;

    /// Activate a visible button with the given label
    async fn click_control(&mut self, control: &ControlLabel) -> Result<(), DriverError>;

    /// Activate a button and wait for the download it triggers
    async fn download_via(
        &mut self,
        control: &ControlLabel,
        timeout: Duration,
    ) -> Result<StagedDownload, DriverError>;

    /// Write a full-page screenshot
    async fn snapshot(&mut self, path: &Path) -> Result<(), DriverError>;

    /// Whether the page or its context has gone away
    fn is_closed(&self) -> bool;

    /// Close the session and release its context
    async fn close(self: Box<Self>) -> Result<(), DriverError>;
}

/// Shared handle to a running engine
pub type EngineHandle = Arc<dyn BrowserEngine>;
