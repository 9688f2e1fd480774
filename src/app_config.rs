use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::translation::{BatchOptions, ControlKind, ControlLabel, LabelTable, SessionOptions};

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO)
    pub source_language: String,

    /// Target language code (ISO)
    pub target_language: String,

    /// Document splitting settings
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Temporary artifact storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Browsing engine launch settings
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Translation surface contract
    #[serde(default)]
    pub surface: SurfaceConfig,

    /// Session timeouts
    #[serde(default)]
    pub session: SessionConfig,

    /// Batch pacing and retries
    #[serde(default)]
    pub batch: BatchConfig,

    /// Failure diagnostics
    #[serde(default)]
    pub debug: DebugConfig,

    /// Report translated artifacts whose page count differs from their chunk
    #[serde(default)]
    pub verify_page_counts: bool,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Document splitting settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Byte ceiling of one serialized chunk
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_bytes: default_max_chunk_bytes(),
        }
    }
}

/// Temporary artifact storage
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory holding chunks and translated chunks during a job
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
        }
    }
}

/// Browsing engine launch settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BrowserConfig {
    /// Run without a visible window
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Chromium executable, detected when empty
    #[serde(default)]
    pub executable_path: Option<PathBuf>,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    /// User agent presented by every session
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Locale of every session, e.g. `es-ES`
    #[serde(default)]
    pub locale: Option<String>,

    /// Time zone of every session, e.g. `America/Mexico_City`
    #[serde(default)]
    pub timezone: Option<String>,

    /// Additional command line switches
    #[serde(default = "default_browser_args")]
    pub args: Vec<String>,

    /// How long to wait for a protocol response
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            executable_path: None,
            window_width: default_window_width(),
            window_height: default_window_height(),
            user_agent: None,
            locale: None,
            timezone: None,
            args: default_browser_args(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Extra labels for one interface locale
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LabelOverride {
    pub locale: String,

    /// Exact label of the translate button
    #[serde(default)]
    pub trigger: Option<String>,

    /// Text contained in the download button's label
    #[serde(default)]
    pub download: Option<String>,
}

/// Translation surface contract
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SurfaceConfig {
    /// Document translation entry point
    #[serde(default = "default_entry_url")]
    pub entry_url: String,

    /// CSS selector of the file input
    #[serde(default = "default_upload_selector")]
    pub upload_selector: String,

    /// Labels added to the built-in table
    #[serde(default)]
    pub labels: Vec<LabelOverride>,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            entry_url: default_entry_url(),
            upload_selector: default_upload_selector(),
            labels: Vec::new(),
        }
    }
}

/// Session timeouts
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,

    #[serde(default = "default_upload_settle_ms")]
    pub upload_settle_ms: u64,

    #[serde(default = "default_trigger_timeout_ms")]
    pub trigger_timeout_ms: u64,

    #[serde(default = "default_trigger_settle_ms")]
    pub trigger_settle_ms: u64,

    #[serde(default = "default_completion_timeout_secs")]
    pub completion_timeout_secs: u64,

    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_secs: default_navigation_timeout_secs(),
            upload_settle_ms: default_upload_settle_ms(),
            trigger_timeout_ms: default_trigger_timeout_ms(),
            trigger_settle_ms: default_trigger_settle_ms(),
            completion_timeout_secs: default_completion_timeout_secs(),
            download_timeout_secs: default_download_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Batch pacing and retries
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BatchConfig {
    #[serde(default = "default_max_navigation_retries")]
    pub max_navigation_retries: usize,

    /// Lower bound of the random pause between sessions
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Upper bound of the random pause between sessions
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_navigation_retries: default_max_navigation_retries(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Failure diagnostics
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DebugConfig {
    /// Capture a page snapshot when a session fails
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            snapshot_dir: default_snapshot_dir(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<&LogLevel> for log::LevelFilter {
    fn from(level: &LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_max_chunk_bytes() -> usize {
    crate::document::splitter::DEFAULT_MAX_CHUNK_BYTES
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("temp")
}

fn default_true() -> bool {
    true
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

fn default_browser_args() -> Vec<String> {
    [
        "--no-sandbox",
        "--disable-setuid-sandbox",
        "--disable-dev-shm-usage",
        "--disable-gpu",
        "--no-first-run",
        "--mute-audio",
        "--hide-scrollbars",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_entry_url() -> String {
    "https://translate.google.com/".to_string()
}

fn default_upload_selector() -> String {
    r#"input[type="file"][name="file"]"#.to_string()
}

fn default_navigation_timeout_secs() -> u64 {
    60
}

fn default_upload_settle_ms() -> u64 {
    3000
}

fn default_trigger_timeout_ms() -> u64 {
    10_000
}

fn default_trigger_settle_ms() -> u64 {
    2000
}

fn default_completion_timeout_secs() -> u64 {
    180
}

fn default_download_timeout_secs() -> u64 {
    60
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_max_navigation_retries() -> usize {
    1
}

fn default_min_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    3000
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("debug-screenshots")
}

impl Config {
    /// Load the configuration at `path`, writing a default one if it does not exist
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            return Ok(config);
        }

        warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_json = serde_json::to_string_pretty(self)
            .context("Failed to serialize config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write config to file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        // Validate languages
        let _source_name = crate::language_utils::get_language_name(&self.source_language)?;
        let _target_name = crate::language_utils::get_language_name(&self.target_language)?;

        if self.chunking.max_chunk_bytes == 0 {
            return Err(anyhow!("chunking.max_chunk_bytes must be greater than zero"));
        }

        if self.storage.work_dir.as_os_str().is_empty() {
            return Err(anyhow!("storage.work_dir must not be empty"));
        }

        url::Url::parse(&self.surface.entry_url)
            .with_context(|| format!("Invalid surface.entry_url: {}", self.surface.entry_url))?;

        if self.surface.upload_selector.trim().is_empty() {
            return Err(anyhow!("surface.upload_selector must not be empty"));
        }

        let session = &self.session;
        if session.navigation_timeout_secs == 0
            || session.trigger_timeout_ms == 0
            || session.completion_timeout_secs == 0
            || session.download_timeout_secs == 0
        {
            return Err(anyhow!("Session timeouts must be greater than zero"));
        }

        if session.poll_interval_ms == 0 {
            return Err(anyhow!("session.poll_interval_ms must be greater than zero"));
        }

        if self.batch.min_delay_ms > self.batch.max_delay_ms {
            return Err(anyhow!(
                "batch.min_delay_ms ({}) must not exceed batch.max_delay_ms ({})",
                self.batch.min_delay_ms,
                self.batch.max_delay_ms
            ));
        }

        Ok(())
    }

    /// Session settings derived from the surface, session and debug sections
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            entry_url: self.surface.entry_url.clone(),
            upload_selector: self.surface.upload_selector.clone(),
            navigation_timeout: Duration::from_secs(self.session.navigation_timeout_secs),
            upload_settle: Duration::from_millis(self.session.upload_settle_ms),
            trigger_timeout: Duration::from_millis(self.session.trigger_timeout_ms),
            trigger_settle: Duration::from_millis(self.session.trigger_settle_ms),
            completion_timeout: Duration::from_secs(self.session.completion_timeout_secs),
            download_timeout: Duration::from_secs(self.session.download_timeout_secs),
            poll_interval: Duration::from_millis(self.session.poll_interval_ms),
            debug_snapshots: self.debug.enabled,
            snapshot_dir: self.debug.snapshot_dir.clone(),
        }
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            max_navigation_retries: self.batch.max_navigation_retries,
            min_delay: Duration::from_millis(self.batch.min_delay_ms),
            max_delay: Duration::from_millis(self.batch.max_delay_ms),
        }
    }

    /// Built-in labels extended with the configured ones
    pub fn label_table(&self) -> LabelTable {
        let mut table = LabelTable::default();
        for entry in &self.surface.labels {
            if let Some(trigger) = &entry.trigger {
                table.insert(&entry.locale, ControlKind::Trigger, ControlLabel::exact(trigger.as_str()));
            }
            if let Some(download) = &entry.download {
                table.insert(&entry.locale, ControlKind::Download, ControlLabel::contains(download.as_str()));
            }
        }
        table
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: "en".to_string(),
            target_language: "es".to_string(),
            chunking: ChunkingConfig::default(),
            storage: StorageConfig::default(),
            browser: BrowserConfig::default(),
            surface: SurfaceConfig::default(),
            session: SessionConfig::default(),
            batch: BatchConfig::default(),
            debug: DebugConfig::default(),
            verify_page_counts: false,
            log_level: LogLevel::default(),
        }
    }
}
