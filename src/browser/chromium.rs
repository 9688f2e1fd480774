/*!
 * Chromium engine driven over the DevTools protocol (`chromiumoxide`).
 *
 * One browser process is shared by all sessions. Each session is an isolated
 * browser context with a single page, its own download directory and its own
 * emulation overrides. Controls are located by visible label in page script
 * and activated through a real DOM click.
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    BrowserContextId, DownloadProgressState, EventDownloadProgress, EventDownloadWillBegin,
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetLocaleOverrideParams, SetTimezoneOverrideParams,
    SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams, EventTargetDestroyed,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use log::{debug, info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::{BrowserEngine, EngineHandle, EngineLauncher, SessionProfile, StagedDownload, SurfaceSession};
use crate::app_config::BrowserConfig as BrowserSettings;
use crate::errors::DriverError;
use crate::translation::labels::ControlLabel;

/// Attribute used to tag the element a click is aimed at
const CLICK_MARKER: &str = "data-pct-click";

/// Launches Chromium processes with the configured settings
pub struct ChromiumLauncher {
    settings: BrowserSettings,
}

impl ChromiumLauncher {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    fn browser_config(&self) -> Result<BrowserConfig, DriverError> {
        let settings = &self.settings;
        let mut builder = BrowserConfig::builder()
            .window_size(settings.window_width, settings.window_height)
            .request_timeout(Duration::from_secs(settings.request_timeout_secs))
            .args(settings.args.iter().map(String::as_str));

        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &settings.executable_path {
            builder = builder.chrome_executable(executable);
        }

        builder.build().map_err(DriverError::Launch)
    }
}

#[async_trait]
impl EngineLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<EngineHandle, DriverError> {
        info!(
            "Launching browser in {} mode",
            if self.settings.headless { "headless" } else { "visible" }
        );

        let config = self.browser_config()?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        let alive = Arc::new(AtomicBool::new(true));
        let handler_alive = Arc::clone(&alive);
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {}", e);
                    if matches!(e, CdpError::Ws(_) | CdpError::ChannelSendError(_)) {
                        break;
                    }
                }
            }
            handler_alive.store(false, Ordering::SeqCst);
            debug!("Browser handler finished");
        });

        info!("Browser launched successfully");
        Ok(Arc::new(ChromiumEngine {
            browser: Arc::new(Mutex::new(browser)),
            handler: parking_lot::Mutex::new(Some(handler_task)),
            alive,
            settings: self.settings.clone(),
        }))
    }
}

/// A running Chromium process
pub struct ChromiumEngine {
    browser: Arc<Mutex<Browser>>,
    handler: parking_lot::Mutex<Option<JoinHandle<()>>>,
    alive: Arc<AtomicBool>,
    settings: BrowserSettings,
}

impl ChromiumEngine {
    async fn apply_overrides(&self, page: &Page) -> Result<(), DriverError> {
        let settings = &self.settings;

        page.execute(SetDeviceMetricsOverrideParams::new(
            i64::from(settings.window_width),
            i64::from(settings.window_height),
            1.0,
            false,
        ))
        .await
        .map_err(map_cdp_error)?;

        if let Some(user_agent) = &settings.user_agent {
            page.execute(SetUserAgentOverrideParams::new(user_agent.clone()))
                .await
                .map_err(map_cdp_error)?;
        }

        if let Some(locale) = &settings.locale {
            let mut params = SetLocaleOverrideParams::default();
            params.locale = Some(locale.clone());
            page.execute(params).await.map_err(map_cdp_error)?;
        }

        if let Some(timezone) = &settings.timezone {
            page.execute(SetTimezoneOverrideParams::new(timezone.clone()))
                .await
                .map_err(map_cdp_error)?;
        }

        Ok(())
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn open_session(
        &self,
        profile: &SessionProfile,
    ) -> Result<Box<dyn SurfaceSession>, DriverError> {
        if !self.is_connected() {
            return Err(DriverError::TargetClosed("browser disconnected".to_string()));
        }

        let download_dir = tokio::fs::canonicalize(&profile.download_dir).await?;

        let browser = self.browser.lock().await;
        let context_id = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(map_cdp_error)?
            .result
            .browser_context_id;

        let mut download = SetDownloadBehaviorParams::new(SetDownloadBehaviorBehavior::AllowAndName);
        download.browser_context_id = Some(context_id.clone());
        download.download_path = Some(download_dir.to_string_lossy().to_string());
        download.events_enabled = Some(true);
        browser.execute(download).await.map_err(map_cdp_error)?;

        let mut target = CreateTargetParams::new("about:blank");
        target.browser_context_id = Some(context_id.clone());
        let page = browser.new_page(target).await.map_err(map_cdp_error)?;
        let closed = Arc::new(AtomicBool::new(false));
        let watcher = watch_target(&browser, &page, Arc::clone(&closed)).await?;
        drop(browser);

        self.apply_overrides(&page).await?;

        debug!("Opened browser context {:?}", context_id);
        Ok(Box::new(ChromiumSession {
            browser: Arc::clone(&self.browser),
            page: Some(page),
            context_id,
            download_dir,
            closed,
            watcher,
        }))
    }

    fn is_connected(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) -> Result<(), DriverError> {
        self.alive.store(false, Ordering::SeqCst);

        let result = {
            let mut browser = self.browser.lock().await;
            match browser.close().await {
                Ok(_) => {
                    let _ = browser.wait().await;
                    Ok(())
                }
                Err(e) => Err(map_cdp_error(e)),
            }
        };

        if let Some(handler) = self.handler.lock().take() {
            handler.abort();
        }
        result
    }
}

/// Flag the session closed when its page target is destroyed
async fn watch_target(
    browser: &Browser,
    page: &Page,
    closed: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, DriverError> {
    let target_id = page.target_id().clone();
    let mut destroyed = browser
        .event_listener::<EventTargetDestroyed>()
        .await
        .map_err(map_cdp_error)?;

    Ok(tokio::spawn(async move {
        while let Some(event) = destroyed.next().await {
            if event.target_id == target_id {
                closed.store(true, Ordering::SeqCst);
                break;
            }
        }
    }))
}

/// One isolated browser context with one page
struct ChromiumSession {
    browser: Arc<Mutex<Browser>>,
    page: Option<Page>,
    context_id: BrowserContextId,
    download_dir: PathBuf,
    closed: Arc<AtomicBool>,
    watcher: JoinHandle<()>,
}

impl ChromiumSession {
    fn page(&self) -> Result<&Page, DriverError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DriverError::TargetClosed("page closed".to_string()));
        }
        self.page
            .as_ref()
            .ok_or_else(|| DriverError::TargetClosed("page closed".to_string()))
    }

    /// Map a protocol error, remembering when it shows the page is gone
    fn check(&self, error: CdpError) -> DriverError {
        let error = map_cdp_error(error);
        if error.is_target_gone() {
            self.closed.store(true, Ordering::SeqCst);
        }
        error
    }

    /// Run the label lookup script; with `marker` set, the match is tagged for clicking
    async fn find_control(&self, control: &ControlLabel, marker: Option<&str>) -> Result<bool, DriverError> {
        let script = control_script(control, marker)?;
        let page = self.page()?;
        let result = page.evaluate(script).await.map_err(|e| self.check(e))?;
        result
            .into_value::<bool>()
            .map_err(|e| DriverError::Protocol(e.to_string()))
    }

    async fn click(&mut self, control: &ControlLabel) -> Result<(), DriverError> {
        static CLICKS: AtomicUsize = AtomicUsize::new(0);
        let marker = CLICKS.fetch_add(1, Ordering::SeqCst).to_string();

        if !self.find_control(control, Some(&marker)).await? {
            return Err(DriverError::ElementNotFound(control.text.clone()));
        }

        let selector = format!("[{}=\"{}\"]", CLICK_MARKER, marker);
        let page = self.page()?;
        let element = page.find_element(selector).await.map_err(|e| self.check(e))?;
        element.click().await.map_err(|e| self.check(e))?;
        debug!("Clicked \"{}\"", control.text);
        Ok(())
    }
}

#[async_trait]
impl SurfaceSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        let page = self.page()?;
        page.goto(url).await.map_err(|e| match self.check(e) {
            DriverError::Protocol(msg) => DriverError::Navigation(msg),
            other => other,
        })?;
        Ok(())
    }

    async fn upload_file(&mut self, selector: &str, file: &Path) -> Result<(), DriverError> {
        let file = tokio::fs::canonicalize(file).await?;
        let page = self.page()?;
        let input = page
            .find_element(selector)
            .await
            .map_err(|e| match self.check(e) {
                DriverError::TargetClosed(msg) => DriverError::TargetClosed(msg),
                _ => DriverError::ElementNotFound(selector.to_string()),
            })?;

        let mut params = SetFileInputFilesParams::new(vec![file.to_string_lossy().to_string()]);
        params.backend_node_id = Some(input.backend_node_id);
        page.execute(params).await.map_err(|e| self.check(e))?;
        debug!("Uploaded {}", file.display());
        Ok(())
    }

    async fn is_control_visible(&mut self, control: &ControlLabel) -> Result<bool, DriverError> {
        self.find_control(control, None).await
    }

    async fn click_control(&mut self, control: &ControlLabel) -> Result<(), DriverError> {
        self.click(control).await
    }

    async fn download_via(
        &mut self,
        control: &ControlLabel,
        timeout: Duration,
    ) -> Result<StagedDownload, DriverError> {
        let (mut will_begin, mut progress) = {
            let browser = self.browser.lock().await;
            let will_begin = browser
                .event_listener::<EventDownloadWillBegin>()
                .await
                .map_err(map_cdp_error)?;
            let progress = browser
                .event_listener::<EventDownloadProgress>()
                .await
                .map_err(map_cdp_error)?;
            (will_begin, progress)
        };

        self.click(control).await?;

        let download_dir = self.download_dir.clone();
        let wait = async move {
            let begun = will_begin
                .next()
                .await
                .ok_or_else(|| DriverError::TargetClosed("event stream ended".to_string()))?;
            debug!("Download started: {} ({})", begun.suggested_filename, begun.guid);

            while let Some(event) = progress.next().await {
                if event.guid != begun.guid {
                    continue;
                }
                match event.state {
                    DownloadProgressState::Completed => {
                        return Ok(StagedDownload {
                            suggested_filename: begun.suggested_filename.clone(),
                            path: download_dir.join(&begun.guid),
                        });
                    }
                    DownloadProgressState::Canceled => {
                        return Err(DriverError::Protocol("download canceled".to_string()));
                    }
                    DownloadProgressState::InProgress => {}
                }
            }
            Err(DriverError::TargetClosed("event stream ended".to_string()))
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| DriverError::Timeout(format!("no download within {}s", timeout.as_secs())))?
    }

    async fn snapshot(&mut self, path: &Path) -> Result<(), DriverError> {
        let page = self.page()?;
        let png = page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(|e| self.check(e))?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, png).await?;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(mut self: Box<Self>) -> Result<(), DriverError> {
        self.watcher.abort();

        if let Some(page) = self.page.take() {
            if !self.closed.load(Ordering::SeqCst) {
                if let Err(e) = page.close().await {
                    debug!("Page close failed: {}", e);
                }
            }
        }

        let browser = self.browser.lock().await;
        browser
            .execute(DisposeBrowserContextParams::new(self.context_id.clone()))
            .await
            .map_err(map_cdp_error)?;
        debug!("Disposed browser context {:?}", self.context_id);
        Ok(())
    }
}

/// Page script looking for a visible button-like element whose visible name
/// (aria-label or text) matches the label
fn control_script(control: &ControlLabel, marker: Option<&str>) -> Result<String, DriverError> {
    let label = serde_json::to_string(&control.text).map_err(|e| DriverError::Protocol(e.to_string()))?;
    let tag = match marker {
        Some(marker) => {
            let marker = serde_json::to_string(marker).map_err(|e| DriverError::Protocol(e.to_string()))?;
            format!("match.setAttribute('{}', {});", CLICK_MARKER, marker)
        }
        None => String::new(),
    };

    Ok(format!(
        r#"(() => {{
    const label = {label};
    const exact = {exact};
    const matches = (name) => {{
        const text = (name || '').trim();
        return exact ? text === label : text.includes(label);
    }};
    const visible = (el) => {{
        const rect = el.getBoundingClientRect();
        const style = window.getComputedStyle(el);
        return rect.width > 0 && rect.height > 0
            && style.visibility !== 'hidden' && style.display !== 'none';
    }};
    const candidates = document.querySelectorAll('button, [role="button"], a[href]');
    const match = Array.from(candidates).find((el) =>
        (matches(el.getAttribute('aria-label')) || matches(el.innerText)) && visible(el));
    if (!match) {{
        return false;
    }}
    {tag}
    return true;
}})()"#,
        label = label,
        exact = control.exact,
        tag = tag,
    ))
}

/// Classify protocol errors; vanished targets map to `TargetClosed`
fn map_cdp_error(error: CdpError) -> DriverError {
    if matches!(error, CdpError::Timeout) {
        return DriverError::Timeout("protocol request".to_string());
    }

    let message = error.to_string();
    let lower = message.to_lowercase();
    let gone = [
        "target closed",
        "no target with given id",
        "session with given id not found",
        "browser has disconnected",
        "context was destroyed",
        "page has been closed",
    ];
    if gone.iter().any(|needle| lower.contains(needle)) || matches!(error, CdpError::Ws(_)) {
        DriverError::TargetClosed(message)
    } else if let CdpError::NotFound = error {
        DriverError::ElementNotFound(message)
    } else {
        if lower.contains("closed") {
            warn!("Treating protocol error as closed target: {}", message);
            return DriverError::TargetClosed(message);
        }
        DriverError::Protocol(message)
    }
}
