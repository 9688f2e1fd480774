/*!
 * Ownership of the process-wide browsing engine.
 *
 * The engine is launched on first use and shared by all sessions. When a
 * session reveals that the engine may be compromised (the surface closed the
 * page on us), the supervisor is invalidated and the next `ensure_live` call
 * launches a fresh engine. Both operations serialize on one lock, so
 * concurrent callers never launch twice.
 */

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use log::{info, warn};
use tokio::sync::Mutex;

use super::EngineHandle;
use crate::errors::DriverError;

/// Starts new engine instances
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    async fn launch(&self) -> Result<EngineHandle, DriverError>;
}

/// Owns the shared engine and tracks its liveness
pub struct EngineSupervisor {
    launcher: Box<dyn EngineLauncher>,
    engine: Mutex<Option<EngineHandle>>,
    launches: AtomicUsize,
}

impl EngineSupervisor {
    pub fn new(launcher: impl EngineLauncher + 'static) -> Self {
        Self {
            launcher: Box::new(launcher),
            engine: Mutex::new(None),
            launches: AtomicUsize::new(0),
        }
    }

    /// Return the running engine, launching one if there is none or it died
    pub async fn ensure_live(&self) -> Result<EngineHandle, DriverError> {
        let mut slot = self.engine.lock().await;

        if let Some(engine) = slot.as_ref() {
            if engine.is_connected() {
                return Ok(engine.clone());
            }
            warn!("Browser engine is no longer connected, relaunching");
            if let Some(dead) = slot.take() {
                if let Err(e) = dead.shutdown().await {
                    warn!("Could not shut down dead browser engine: {}", e);
                }
            }
        }

        let engine = self.launcher.launch().await?;
        let count = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Browser engine launched (launch #{})", count);
        *slot = Some(engine.clone());
        Ok(engine)
    }

    /// Tear the engine down so the next `ensure_live` starts a new one
    pub async fn invalidate(&self) {
        let engine = self.engine.lock().await.take();
        if let Some(engine) = engine {
            info!("Closing browser engine");
            if let Err(e) = engine.shutdown().await {
                warn!("Could not close browser engine: {}", e);
            }
        }
    }

    /// Whether an engine is currently held
    pub async fn is_live(&self) -> bool {
        self.engine
            .lock()
            .await
            .as_ref()
            .is_some_and(|engine| engine.is_connected())
    }

    /// Number of engines launched so far
    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}
