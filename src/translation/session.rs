/*!
 * One translation of one artifact through the translation surface.
 *
 * A session walks a fixed sequence of states and never re-enters one:
 *
 * `Init -> Navigated -> Uploaded -> Triggered -> Completed -> Downloaded`
 *
 * Any transition may fail instead, which ends the session with a
 * `SessionFailure` naming the artifact, the last state reached and the cause.
 * The isolated browsing context is closed on every exit path.
 */

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use log::{debug, info, warn};
use tokio::time::Instant;
use url::Url;

use super::labels::{ControlKind, ControlLabel, LabelTable};
use crate::browser::{BrowserEngine, SessionProfile, StagedDownload, SurfaceSession};
use crate::errors::{DriverError, FailureCause, SessionFailure};
use crate::file_utils::FileManager;

/// States of a translation session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionState {
    Init,
    Navigated,
    Uploaded,
    Triggered,
    Completed,
    Downloaded,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "INIT",
            Self::Navigated => "NAVIGATED",
            Self::Uploaded => "UPLOADED",
            Self::Triggered => "TRIGGERED",
            Self::Completed => "COMPLETED",
            Self::Downloaded => "DOWNLOADED",
        };
        f.write_str(name)
    }
}

/// Timeouts and surface details for sessions
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Document translation entry point of the surface
    pub entry_url: String,
    /// CSS selector of the file input
    pub upload_selector: String,
    pub navigation_timeout: Duration,
    /// Time given to the page to register an upload
    pub upload_settle: Duration,
    /// How long to look for the trigger control
    pub trigger_timeout: Duration,
    /// Pause after activating the trigger
    pub trigger_settle: Duration,
    /// How long to wait for the translation to finish
    pub completion_timeout: Duration,
    /// How long to wait for the download event
    pub download_timeout: Duration,
    pub poll_interval: Duration,
    /// Capture a snapshot when a session fails
    pub debug_snapshots: bool,
    pub snapshot_dir: PathBuf,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            entry_url: "https://translate.google.com/".to_string(),
            upload_selector: r#"input[type="file"][name="file"]"#.to_string(),
            navigation_timeout: Duration::from_secs(60),
            upload_settle: Duration::from_secs(3),
            trigger_timeout: Duration::from_secs(10),
            trigger_settle: Duration::from_secs(2),
            completion_timeout: Duration::from_secs(180),
            download_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
            debug_snapshots: false,
            snapshot_dir: PathBuf::from("debug-screenshots"),
        }
    }
}

/// Build the entry point URL for a language pair.
///
/// The interface language follows the target language.
pub fn entry_url(base: &str, source_language: &str, target_language: &str) -> Result<Url, url::ParseError> {
    Url::parse_with_params(
        base,
        &[
            ("hl", target_language),
            ("sl", source_language),
            ("tl", target_language),
            ("op", "docs"),
        ],
    )
}

/// Drives a single artifact through the surface
pub struct TranslationSession<'a> {
    engine: &'a dyn BrowserEngine,
    options: &'a SessionOptions,
    labels: &'a LabelTable,
    state: SessionState,
}

impl<'a> TranslationSession<'a> {
    pub fn new(engine: &'a dyn BrowserEngine, options: &'a SessionOptions, labels: &'a LabelTable) -> Self {
        Self {
            engine,
            options,
            labels,
            state: SessionState::Init,
        }
    }

    /// Translate one artifact, returning the path of the translated artifact
    pub async fn translate(
        mut self,
        artifact: &Path,
        source_language: &str,
        target_language: &str,
    ) -> Result<PathBuf, SessionFailure> {
        info!(
            "Starting translation: {} ({} -> {})",
            display_name(artifact),
            source_language,
            target_language
        );

        let profile = SessionProfile {
            download_dir: artifact
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };
        let mut surface = self
            .engine
            .open_session(&profile)
            .await
            .map_err(|e| self.fail(artifact, FailureCause::Navigation(e.to_string())))?;

        let outcome = self
            .drive(surface.as_mut(), artifact, source_language, target_language)
            .await;

        if let Err(failure) = &outcome {
            warn!("Translation error: {}", failure);
            if self.options.debug_snapshots && !surface.is_closed() {
                self.capture_snapshot(surface.as_mut(), artifact).await;
            }
        }

        if let Err(e) = surface.close().await {
            warn!("Could not close browsing context: {}", e);
        }

        outcome
    }

    async fn drive(
        &mut self,
        surface: &mut dyn SurfaceSession,
        artifact: &Path,
        source_language: &str,
        target_language: &str,
    ) -> Result<PathBuf, SessionFailure> {
        // INIT -> NAVIGATED
        let url = entry_url(&self.options.entry_url, source_language, target_language)
            .map_err(|e| self.fail(artifact, FailureCause::Navigation(e.to_string())))?;
        debug!("Navigating to: {}", url);
        match tokio::time::timeout(self.options.navigation_timeout, surface.navigate(url.as_str())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(self.fail(artifact, FailureCause::Navigation(e.to_string()))),
            Err(_) => {
                return Err(self.fail(
                    artifact,
                    FailureCause::Navigation(format!(
                        "page did not load within {}s",
                        self.options.navigation_timeout.as_secs()
                    )),
                ));
            }
        }
        self.advance(SessionState::Navigated);

        // NAVIGATED -> UPLOADED
        surface
            .upload_file(&self.options.upload_selector, artifact)
            .await
            .map_err(|e| self.driver_failure(artifact, e, FailureCause::Upload))?;
        tokio::time::sleep(self.options.upload_settle).await;
        self.advance(SessionState::Uploaded);

        // UPLOADED -> TRIGGERED
        let trigger_labels = self.labels.labels_for(ControlKind::Trigger, target_language);
        let trigger = self
            .await_control(surface, &trigger_labels, self.options.trigger_timeout)
            .await
            .map_err(|e| self.driver_failure(artifact, e, FailureCause::Trigger))?
            .ok_or_else(|| self.fail(artifact, FailureCause::TriggerNotFound))?;
        debug!("Found translate button: \"{}\"", trigger.text);
        surface
            .click_control(&trigger)
            .await
            .map_err(|e| self.driver_failure(artifact, e, FailureCause::Trigger))?;
        tokio::time::sleep(self.options.trigger_settle).await;
        if surface.is_closed() {
            return Err(self.fail(artifact, FailureCause::BotDetected));
        }
        self.advance(SessionState::Triggered);

        // TRIGGERED -> COMPLETED
        debug!("Waiting for translation to complete");
        let download_labels = self.labels.labels_for(ControlKind::Download, target_language);
        let download = self
            .await_control(surface, &download_labels, self.options.completion_timeout)
            .await
            .map_err(|e| {
                self.driver_failure(artifact, e, |_| FailureCause::CompletionTimeout {
                    waited_secs: self.options.completion_timeout.as_secs(),
                })
            })?
            .ok_or_else(|| {
                self.fail(
                    artifact,
                    FailureCause::CompletionTimeout {
                        waited_secs: self.options.completion_timeout.as_secs(),
                    },
                )
            })?;
        debug!("Found download button: \"{}\"", download.text);
        self.advance(SessionState::Completed);

        // COMPLETED -> DOWNLOADED
        let staged = surface
            .download_via(&download, self.options.download_timeout)
            .await
            .map_err(|e| match e {
                DriverError::Timeout(msg) => self.fail(artifact, FailureCause::DownloadTimeout(msg)),
                other => self.driver_failure(artifact, other, FailureCause::DownloadSaveFailed),
            })?;
        debug!("Download started, suggested filename: {}", staged.suggested_filename);

        let destination = FileManager::translated_path(artifact);
        self.persist_download(&staged, &destination)
            .await
            .map_err(|cause| self.fail(artifact, cause))?;
        self.advance(SessionState::Downloaded);

        info!("Translation completed successfully: {}", destination.display());
        Ok(destination)
    }

    /// Poll for the first visible control among `labels`, trying them in order
    /// on every round, until `timeout` elapses
    async fn await_control(
        &self,
        surface: &mut dyn SurfaceSession,
        labels: &[ControlLabel],
        timeout: Duration,
    ) -> Result<Option<ControlLabel>, DriverError> {
        let deadline = Instant::now() + timeout;

        loop {
            if surface.is_closed() {
                return Err(DriverError::TargetClosed("page closed while waiting".to_string()));
            }

            let mut lookup_error = None;
            for label in labels {
                match surface.is_control_visible(label).await {
                    Ok(true) => return Ok(Some(label.clone())),
                    Ok(false) => {}
                    Err(e) if e.is_target_gone() => return Err(e),
                    Err(e) => {
                        debug!("Visibility check for \"{}\" failed: {}", label.text, e);
                        lookup_error = Some(e);
                    }
                }
            }

            let now = Instant::now();
            if now >= deadline {
                // A driver that kept failing is reported as such, not as a missing control
                return match lookup_error {
                    Some(e) => Err(e),
                    None => Ok(None),
                };
            }
            tokio::time::sleep(self.options.poll_interval.min(deadline - now)).await;
        }
    }

    /// Move the downloaded file to its final location and check it has content
    async fn persist_download(&self, staged: &StagedDownload, destination: &Path) -> Result<(), FailureCause> {
        if let Err(rename_error) = tokio::fs::rename(&staged.path, destination).await {
            debug!("Rename failed ({}), copying download instead", rename_error);
            let copied = tokio::fs::copy(&staged.path, destination).await;
            let _ = tokio::fs::remove_file(&staged.path).await;
            copied.map_err(|e| FailureCause::DownloadSaveFailed(e.to_string()))?;
        }

        let size = tokio::fs::metadata(destination)
            .await
            .map_err(|e| FailureCause::DownloadSaveFailed(e.to_string()))?
            .len();
        debug!("Saved {} ({} bytes)", destination.display(), size);
        if size == 0 {
            let _ = tokio::fs::remove_file(destination).await;
            return Err(FailureCause::EmptyArtifact);
        }
        Ok(())
    }

    async fn capture_snapshot(&self, surface: &mut dyn SurfaceSession, artifact: &Path) {
        let stem = artifact
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "artifact".to_string());
        let name = format!(
            "{}-{}-{}.png",
            stem,
            self.state.to_string().to_lowercase(),
            Local::now().format("%Y%m%d%H%M%S%3f")
        );
        let path = self.options.snapshot_dir.join(name);
        match surface.snapshot(&path).await {
            Ok(()) => info!("Screenshot saved: {}", path.display()),
            Err(e) => warn!("Could not take error screenshot: {}", e),
        }
    }

    fn advance(&mut self, next: SessionState) {
        debug_assert!(next > self.state, "session states never repeat");
        self.state = next;
    }

    fn fail(&self, artifact: &Path, cause: FailureCause) -> SessionFailure {
        SessionFailure::new(artifact, self.state, cause)
    }

    /// Failure for a driver error: a vanished page means the surface threw
    /// the session out, anything else maps to the transition's own cause
    fn driver_failure(
        &self,
        artifact: &Path,
        error: DriverError,
        cause: impl FnOnce(String) -> FailureCause,
    ) -> SessionFailure {
        if error.is_target_gone() {
            self.fail(artifact, FailureCause::BotDetected)
        } else {
            self.fail(artifact, cause(error.to_string()))
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
