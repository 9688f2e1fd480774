// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info};
use std::io::Write;
use std::path::{Path, PathBuf};

use pdf_chunk_translator::Controller;
use pdf_chunk_translator::app_config::{self, Config};
use pdf_chunk_translator::file_utils::FileManager;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a PDF document (default command)
    Translate(TranslateArgs),

    /// Show how a PDF document would be split, without translating it
    Analyze(AnalyzeArgs),

    /// Generate shell completions for pdf-chunk-translator
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Options shared by every command that reads the configuration
#[derive(Args, Debug, Clone)]
struct CommonOptions {
    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Byte ceiling of one chunk
    #[arg(long)]
    max_chunk_bytes: Option<usize>,
}

/// Options of the translate command
#[derive(Args, Debug, Clone)]
struct TranslateOptions {
    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Directory for the translated document (defaults to the input's directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Source language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Show the browser and save a screenshot when a chunk fails
    #[arg(long, env = "DEV_MODE")]
    debug: bool,

    #[command(flatten)]
    common: CommonOptions,
}

#[derive(Args, Debug)]
struct TranslateArgs {
    /// Input PDF document
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    #[command(flatten)]
    options: TranslateOptions,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Input PDF document
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    #[command(flatten)]
    common: CommonOptions,
}

/// pdf-chunk-translator - translate large PDFs through a web document translator
///
/// Splits a PDF into chunks under the translator's upload limit, translates each
/// chunk in its own browser session and merges the translated chunks in order.
#[derive(Parser, Debug)]
#[command(name = "pdf-chunk-translator")]
#[command(version)]
#[command(about = "Chunked PDF translation through a web document translator")]
#[command(args_conflicts_with_subcommands = true)]
#[command(long_about = "pdf-chunk-translator splits PDF documents into size-bounded chunks, translates every chunk through a browser-driven web document translator, and merges the translated chunks back into one document.

EXAMPLES:
    pdf-chunk-translator report.pdf                      # Translate using default config
    pdf-chunk-translator -s en -t fr report.pdf          # Translate from English to French
    pdf-chunk-translator -f -o out/ report.pdf           # Overwrite into another directory
    pdf-chunk-translator analyze report.pdf              # Print the chunk plan as JSON
    DEV_MODE=true pdf-chunk-translator report.pdf        # Visible browser, screenshots on failure
    pdf-chunk-translator completions bash > pct.bash     # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input PDF document
    #[arg(value_name = "INPUT_PATH")]
    input_path: Option<PathBuf>,

    #[command(flatten)]
    options: TranslateOptions,
}

// @struct: Custom logger implementation, filtered by the global max level
struct CustomLogger;

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color and emoji for log level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("1;31", "❌ "),
            Level::Warn => ("1;33", "🚧 "),
            Level::Info => ("1;32", " "),
            Level::Debug => ("1;36", "🔍 "),
            Level::Trace => ("1;35", "📋 "),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (color, emoji) = Self::style_for_level(record.level());
            let _ = writeln!(
                std::io::stderr(),
                "\x1B[{}m{} {} {}\x1B[0m",
                color,
                now,
                emoji,
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Info until the configuration says otherwise
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    let result = match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "pdf-chunk-translator", &mut std::io::stdout());
            return Ok(());
        }
        Some(Commands::Translate(args)) => run_translate(args).await,
        Some(Commands::Analyze(args)) => run_analyze(args).await,
        None => {
            let input_path = cli.input_path.ok_or_else(|| {
                anyhow!("INPUT_PATH is required when no subcommand is specified")
            })?;
            run_translate(TranslateArgs {
                input_path,
                options: cli.options,
            })
            .await
        }
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

/// Load the configuration and apply the options every command shares
fn load_config(common: &CommonOptions) -> Result<Config> {
    if let Some(level) = &common.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(LevelFilter::from(&level));
    }

    let mut config = Config::load_or_create(&common.config_path)?;

    if let Some(level) = &common.log_level {
        config.log_level = level.clone().into();
    }
    if let Some(max_chunk_bytes) = common.max_chunk_bytes {
        config.chunking.max_chunk_bytes = max_chunk_bytes;
    }

    log::set_max_level(LevelFilter::from(&config.log_level));
    Ok(config)
}

async fn run_translate(args: TranslateArgs) -> Result<()> {
    let options = args.options;
    let mut config = load_config(&options.common)?;

    if let Some(source_lang) = &options.source_language {
        config.source_language = source_lang.clone();
    }
    if let Some(target_lang) = &options.target_language {
        config.target_language = target_lang.clone();
    }
    if options.debug {
        config.debug.enabled = true;
        config.browser.headless = false;
    }

    config.validate().context("Configuration validation failed")?;

    let output_dir = options.output_dir.clone().unwrap_or_else(|| {
        args.input_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf()
    });

    let controller = Controller::with_config(config)?;
    let result = controller
        .run(args.input_path.clone(), output_dir, options.force_overwrite)
        .await;
    controller.shutdown().await;

    let output_path = result?;
    info!("Success: {}", output_path.display());
    Ok(())
}

async fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let config = load_config(&args.common)?;
    config.validate().context("Configuration validation failed")?;

    let bytes = FileManager::read_bytes(&args.input_path)?;
    let filename = args
        .input_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let controller = Controller::with_config(config)?;
    let plan = controller.analyze(bytes, &filename).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&plan).context("Failed to serialize chunk plan")?
    );
    Ok(())
}
