/*!
 * Batch translation of chunk artifacts.
 *
 * Artifacts are translated one at a time, in order, each in its own session on
 * the shared engine. A failed session never stops the batch: every artifact
 * gets exactly one result. Between sessions the batch waits a randomized delay
 * so requests do not arrive in a machine-regular rhythm.
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use log::{error, info, warn};
use rand::Rng;

use super::labels::LabelTable;
use super::session::{SessionOptions, SessionState, TranslationSession};
use crate::browser::EngineSupervisor;
use crate::errors::{FailureCause, SessionFailure};

/// Pacing and retry settings of a batch
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Extra attempts for an artifact whose navigation failed
    pub max_navigation_retries: usize,
    /// Lower bound of the pause between sessions
    pub min_delay: Duration,
    /// Upper bound of the pause between sessions
    pub max_delay: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_navigation_retries: 1,
            min_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(3000),
        }
    }
}

/// Outcome of one artifact's translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationResult {
    Success {
        /// 0-based position of the artifact in the batch
        position: usize,
        original: PathBuf,
        translated: PathBuf,
    },
    Failure {
        position: usize,
        original: PathBuf,
        failure: SessionFailure,
    },
}

impl TranslationResult {
    pub fn position(&self) -> usize {
        match self {
            Self::Success { position, .. } | Self::Failure { position, .. } => *position,
        }
    }

    pub fn original(&self) -> &Path {
        match self {
            Self::Success { original, .. } | Self::Failure { original, .. } => original,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn translated(&self) -> Option<&Path> {
        match self {
            Self::Success { translated, .. } => Some(translated),
            Self::Failure { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&SessionFailure> {
        match self {
            Self::Failure { failure, .. } => Some(failure),
            Self::Success { .. } => None,
        }
    }
}

/// Batch translator running sessions sequentially on a supervised engine
pub struct BatchTranslator {
    supervisor: Arc<EngineSupervisor>,
    session_options: SessionOptions,
    labels: LabelTable,
    options: BatchOptions,
}

impl BatchTranslator {
    pub fn new(
        supervisor: Arc<EngineSupervisor>,
        session_options: SessionOptions,
        labels: LabelTable,
        options: BatchOptions,
    ) -> Self {
        Self {
            supervisor,
            session_options,
            labels,
            options,
        }
    }

    /// Translate every artifact in order, returning one result per artifact
    pub async fn translate_all(
        &self,
        artifacts: &[PathBuf],
        source_language: &str,
        target_language: &str,
        progress_callback: impl Fn(usize, usize),
    ) -> Vec<TranslationResult> {
        let total = artifacts.len();
        let start_time = Instant::now();
        info!("Translating {} artifacts ({} -> {})", total, source_language, target_language);

        let results = stream::iter(artifacts.iter().enumerate())
            .fold(Vec::with_capacity(total), |mut results, (position, artifact)| {
                let progress_callback = &progress_callback;
                async move {
                    if position > 0 {
                        self.pace().await;
                    }

                    info!("Translating artifact {}/{}: {}", position + 1, total, artifact.display());
                    let result = match self.translate_one(artifact, source_language, target_language).await {
                        Ok(translated) => TranslationResult::Success {
                            position,
                            original: artifact.clone(),
                            translated,
                        },
                        Err(failure) => {
                            error!("Artifact {}/{} failed: {}", position + 1, total, failure);
                            TranslationResult::Failure {
                                position,
                                original: artifact.clone(),
                                failure,
                            }
                        }
                    };

                    results.push(result);
                    progress_callback(results.len(), total);
                    results
                }
            })
            .await;

        let successful = results.iter().filter(|r| r.is_success()).count();
        info!(
            "Translation summary: {}/{} successful in {:?}",
            successful,
            total,
            start_time.elapsed()
        );
        results
    }

    /// One artifact, retrying failed navigations with a fresh session
    async fn translate_one(
        &self,
        artifact: &Path,
        source_language: &str,
        target_language: &str,
    ) -> Result<PathBuf, SessionFailure> {
        let mut attempt = 0;
        loop {
            let engine = self.supervisor.ensure_live().await.map_err(|e| {
                SessionFailure::new(
                    artifact,
                    SessionState::Init,
                    FailureCause::EngineUnavailable(e.to_string()),
                )
            })?;

            let session = TranslationSession::new(engine.as_ref(), &self.session_options, &self.labels);
            match session.translate(artifact, source_language, target_language).await {
                Ok(translated) => return Ok(translated),
                Err(failure) if failure.is_retryable() && attempt < self.options.max_navigation_retries => {
                    attempt += 1;
                    warn!(
                        "Navigation failed for {}, retrying ({}/{})",
                        artifact.display(),
                        attempt,
                        self.options.max_navigation_retries
                    );
                    self.pace().await;
                }
                Err(failure) => {
                    if failure.requires_engine_restart() {
                        warn!(
                            "The translation service closed the session (possible bot detection); \
                             recreating the browser engine before the next artifact"
                        );
                        self.supervisor.invalidate().await;
                    }
                    return Err(failure);
                }
            }
        }
    }

    /// Wait a random delay within the configured bounds
    async fn pace(&self) {
        let min = self.options.min_delay.as_millis() as u64;
        let max = (self.options.max_delay.as_millis() as u64).max(min);
        if max == 0 {
            return;
        }
        let delay = rand::rng().random_range(min..=max);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}
