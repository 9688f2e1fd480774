/*!
 * Scripted browsing engine for testing.
 *
 * Each opened session consumes the next `SessionScript` from a shared queue
 * (sessions beyond the queue behave as `Working`):
 * - `SessionScript::Working` - the surface translates by echoing the upload back
 * - `SessionScript::NavigationFails` - the entry point cannot be loaded
 * - `SessionScript::UploadControlMissing` - no file input on the page
 * - `SessionScript::TriggerMissing` - the trigger button never shows up
 * - `SessionScript::TriggerUnreadable` - looking for the trigger fails in the driver
 * - `SessionScript::TriggerClickFails` - the trigger shows up but clicking it fails
 * - `SessionScript::NeverCompletes` - the download button never shows up
 * - `SessionScript::ClosedAfterTrigger` - the surface closes the page after the trigger
 * - `SessionScript::DownloadNeverArrives` - the download event never fires
 * - `SessionScript::EmptyDownload` - the downloaded file is empty
 * - `SessionScript::DropsLastPage` - the translation comes back without its last page
 *
 * The mock surface always shows English labels.
 */

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{BrowserEngine, EngineHandle, EngineLauncher, SessionProfile, StagedDownload, SurfaceSession};
use crate::errors::DriverError;
use crate::translation::labels::ControlLabel;

/// Label of the mock trigger button
pub const MOCK_TRIGGER_LABEL: &str = "Translate";

/// Label of the mock download button
pub const MOCK_DOWNLOAD_LABEL: &str = "Download translation";

/// Behavior of one mock session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionScript {
    Working,
    NavigationFails,
    UploadControlMissing,
    TriggerMissing,
    TriggerUnreadable,
    TriggerClickFails,
    NeverCompletes,
    ClosedAfterTrigger,
    DownloadNeverArrives,
    EmptyDownload,
    DropsLastPage,
}

/// Everything the mock engine observed
#[derive(Debug, Default, Clone)]
pub struct MockLog {
    pub engines_launched: usize,
    pub engines_shut_down: usize,
    pub sessions_opened: usize,
    pub sessions_closed: usize,
    pub navigations: Vec<String>,
    pub uploads: Vec<PathBuf>,
    pub clicks: Vec<String>,
    pub snapshots: Vec<PathBuf>,
}

/// Launcher handing out mock engines that share one script queue and log
pub struct MockLauncher {
    scripts: Arc<Mutex<VecDeque<SessionScript>>>,
    log: Arc<Mutex<MockLog>>,
    failing_launches: AtomicUsize,
}

impl MockLauncher {
    /// Create a launcher whose sessions follow `scripts` in order
    pub fn new(scripts: Vec<SessionScript>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts.into())),
            log: Arc::new(Mutex::new(MockLog::default())),
            failing_launches: AtomicUsize::new(0),
        }
    }

    /// Make the next `count` launches fail
    pub fn with_failing_launches(self, count: usize) -> Self {
        self.failing_launches.store(count, Ordering::SeqCst);
        self
    }

    /// Shared observation log
    pub fn log(&self) -> Arc<Mutex<MockLog>> {
        Arc::clone(&self.log)
    }
}

#[async_trait]
impl EngineLauncher for MockLauncher {
    async fn launch(&self) -> Result<EngineHandle, DriverError> {
        let remaining = self.failing_launches.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_launches.store(remaining - 1, Ordering::SeqCst);
            return Err(DriverError::Launch("simulated launch failure".to_string()));
        }

        self.log.lock().engines_launched += 1;
        Ok(Arc::new(MockEngine {
            scripts: Arc::clone(&self.scripts),
            log: Arc::clone(&self.log),
            connected: AtomicBool::new(true),
        }))
    }
}

/// Mock engine
pub struct MockEngine {
    scripts: Arc<Mutex<VecDeque<SessionScript>>>,
    log: Arc<Mutex<MockLog>>,
    connected: AtomicBool,
}

#[async_trait]
impl BrowserEngine for MockEngine {
    async fn open_session(
        &self,
        profile: &SessionProfile,
    ) -> Result<Box<dyn SurfaceSession>, DriverError> {
        if !self.is_connected() {
            return Err(DriverError::TargetClosed("engine shut down".to_string()));
        }

        let script = self
            .scripts
            .lock()
            .pop_front()
            .unwrap_or(SessionScript::Working);
        self.log.lock().sessions_opened += 1;

        Ok(Box::new(MockSession {
            script,
            log: Arc::clone(&self.log),
            download_dir: profile.download_dir.clone(),
            uploaded: None,
            triggered: false,
            closed: false,
        }))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) -> Result<(), DriverError> {
        self.connected.store(false, Ordering::SeqCst);
        self.log.lock().engines_shut_down += 1;
        Ok(())
    }
}

struct MockSession {
    script: SessionScript,
    log: Arc<Mutex<MockLog>>,
    download_dir: PathBuf,
    uploaded: Option<PathBuf>,
    triggered: bool,
    closed: bool,
}

impl MockSession {
    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.closed {
            return Err(DriverError::TargetClosed("page closed".to_string()));
        }
        Ok(())
    }

    fn visible(&self, control: &ControlLabel) -> bool {
        if control.matches(MOCK_TRIGGER_LABEL) {
            self.uploaded.is_some() && !self.triggered && self.script != SessionScript::TriggerMissing
        } else if control.matches(MOCK_DOWNLOAD_LABEL) {
            self.triggered && self.script != SessionScript::NeverCompletes
        } else {
            false
        }
    }
}

#[async_trait]
impl SurfaceSession for MockSession {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        self.ensure_open()?;
        self.log.lock().navigations.push(url.to_string());
        if self.script == SessionScript::NavigationFails {
            return Err(DriverError::Navigation("net::ERR_NAME_NOT_RESOLVED".to_string()));
        }
        Ok(())
    }

    async fn upload_file(&mut self, selector: &str, file: &Path) -> Result<(), DriverError> {
        self.ensure_open()?;
        if self.script == SessionScript::UploadControlMissing {
            return Err(DriverError::ElementNotFound(selector.to_string()));
        }
        self.log.lock().uploads.push(file.to_path_buf());
        self.uploaded = Some(file.to_path_buf());
        Ok(())
    }

    async fn is_control_visible(&mut self, control: &ControlLabel) -> Result<bool, DriverError> {
        self.ensure_open()?;
        if self.script == SessionScript::TriggerUnreadable && control.matches(MOCK_TRIGGER_LABEL) {
            return Err(DriverError::Protocol("Execution context was destroyed".to_string()));
        }
        Ok(self.visible(control))
    }

    async fn click_control(&mut self, control: &ControlLabel) -> Result<(), DriverError> {
        self.ensure_open()?;
        if !self.visible(control) {
            return Err(DriverError::ElementNotFound(control.text.clone()));
        }
        if self.script == SessionScript::TriggerClickFails && control.matches(MOCK_TRIGGER_LABEL) {
            return Err(DriverError::Protocol("Node is detached from document".to_string()));
        }
        self.log.lock().clicks.push(control.text.clone());
        if control.matches(MOCK_TRIGGER_LABEL) {
            self.triggered = true;
            if self.script == SessionScript::ClosedAfterTrigger {
                self.closed = true;
            }
        }
        Ok(())
    }

    async fn download_via(
        &mut self,
        control: &ControlLabel,
        timeout: Duration,
    ) -> Result<StagedDownload, DriverError> {
        self.click_control(control).await?;

        if self.script == SessionScript::DownloadNeverArrives {
            tokio::time::sleep(timeout).await;
            return Err(DriverError::Timeout("download event".to_string()));
        }

        let content = match (&self.uploaded, self.script) {
            (_, SessionScript::EmptyDownload) => Vec::new(),
            (Some(uploaded), SessionScript::DropsLastPage) => {
                without_last_page(&tokio::fs::read(uploaded).await?)?
            }
            (Some(uploaded), _) => tokio::fs::read(uploaded).await?,
            (None, _) => Vec::new(),
        };

        static DOWNLOADS: AtomicUsize = AtomicUsize::new(0);
        let id = DOWNLOADS.fetch_add(1, Ordering::SeqCst);
        let path = self.download_dir.join(format!("mock-download-{}.part", id));
        tokio::fs::write(&path, content).await?;

        Ok(StagedDownload {
            suggested_filename: "translated.pdf".to_string(),
            path,
        })
    }

    async fn snapshot(&mut self, path: &Path) -> Result<(), DriverError> {
        self.ensure_open()?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, b"mock snapshot").await?;
        self.log.lock().snapshots.push(path.to_path_buf());
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        self.log.lock().sessions_closed += 1;
        Ok(())
    }
}

fn without_last_page(bytes: &[u8]) -> Result<Vec<u8>, DriverError> {
    let mut doc = lopdf::Document::load_mem(bytes).map_err(|e| DriverError::Protocol(e.to_string()))?;
    let last = doc.get_pages().len() as u32;
    doc.delete_pages(&[last]);
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| DriverError::Protocol(e.to_string()))?;
    Ok(buffer)
}
