use anyhow::{Context, Result, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::Config;
use crate::browser::chromium::ChromiumLauncher;
use crate::browser::{EngineLauncher, EngineSupervisor};
use crate::chunk_store::{ChunkStore, PersistedChunk};
use crate::document::{ChunkPlan, DocumentCodec, DocumentMerger, DocumentSplitter, PdfCodec};
use crate::errors::{FailedChunk, FailureCause, JobError};
use crate::file_utils::{FileManager, FileType};
use crate::language_utils;
use crate::translation::{BatchTranslator, TranslationResult};

// @module: Application controller for chunked document translation

/// Temporary artifacts of one translation job
#[derive(Debug, Default)]
struct Job {
    /// Unique prefix of this job's chunk files
    prefix: String,
    chunks: Vec<PersistedChunk>,
    translated: Vec<PathBuf>,
}

impl Job {
    fn new(filename: &str) -> Self {
        let stem = Path::new(filename)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string());
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self {
            prefix: format!("{}_{}", stem, &id[..8]),
            ..Self::default()
        }
    }

    /// Every file this job has written
    fn artifacts(&self) -> Vec<PathBuf> {
        self.chunks
            .iter()
            .map(|c| c.path.clone())
            .chain(self.translated.iter().cloned())
            .collect()
    }
}

/// Main application controller for document translation
pub struct Controller<C: DocumentCodec = PdfCodec> {
    // @field: App configuration
    config: Config,
    codec: Arc<C>,
    splitter: DocumentSplitter<C>,
    merger: DocumentMerger<C>,
    store: ChunkStore,
    supervisor: Arc<EngineSupervisor>,
    translator: BatchTranslator,
}

impl Controller<PdfCodec> {
    // @method: Create a controller translating PDFs through Chromium
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;
        let launcher = ChromiumLauncher::new(config.browser.clone());
        Ok(Self::with_parts(config, PdfCodec::new(), launcher))
    }
}

impl<C: DocumentCodec> Controller<C> {
    /// Create a controller from a codec and an engine launcher
    pub fn with_parts(config: Config, codec: C, launcher: impl EngineLauncher + 'static) -> Self {
        let codec = Arc::new(codec);
        let supervisor = Arc::new(EngineSupervisor::new(launcher));
        let translator = BatchTranslator::new(
            Arc::clone(&supervisor),
            config.session_options(),
            config.label_table(),
            config.batch_options(),
        );

        Self {
            splitter: DocumentSplitter::new(Arc::clone(&codec), config.chunking.max_chunk_bytes),
            merger: DocumentMerger::new(Arc::clone(&codec)),
            store: ChunkStore::new(config.storage.work_dir.clone()),
            codec,
            supervisor,
            translator,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Supervisor of the shared browsing engine
    pub fn engine_supervisor(&self) -> &Arc<EngineSupervisor> {
        &self.supervisor
    }

    /// Plan how a document would be chunked, without translating anything
    pub async fn analyze(&self, bytes: Vec<u8>, filename: &str) -> Result<ChunkPlan, JobError> {
        let total_size = bytes.len();
        let (total_pages, chunks) = self.split(bytes).await?;
        let plan = ChunkPlan::new(filename, total_size, total_pages, &chunks);
        info!(
            "{}: {} pages, {} chunks",
            filename, plan.total_pages, plan.total_chunks
        );
        Ok(plan)
    }

    /// Translate a serialized document and return the serialized translation
    pub async fn translate_document(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<Vec<u8>, JobError> {
        self.translate_document_with_progress(bytes, filename, source_language, target_language, |_, _| {})
            .await
    }

    /// Same as `translate_document`, reporting `(completed, total)` chunks
    pub async fn translate_document_with_progress(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        source_language: &str,
        target_language: &str,
        progress_callback: impl Fn(usize, usize),
    ) -> Result<Vec<u8>, JobError> {
        let source_language = surface_language(source_language)?;
        let target_language = surface_language(target_language)?;

        let (total_pages, chunks) = self.split(bytes).await?;
        if chunks.is_empty() {
            return Err(JobError::InvalidInput(format!("{} has no pages", filename)));
        }
        info!(
            "Translating {} ({} pages in {} chunks, {} -> {})",
            filename,
            total_pages,
            chunks.len(),
            source_language,
            target_language
        );

        let mut job = Job::new(filename);
        job.chunks = self.store.persist(&chunks, &job.prefix).await?;

        let outcome = self
            .translate_job(&mut job, &source_language, &target_language, progress_callback)
            .await;

        let artifacts = job.artifacts();
        debug!("Releasing {} temporary artifacts", artifacts.len());
        self.store.release(&artifacts).await;

        outcome
    }

    async fn translate_job(
        &self,
        job: &mut Job,
        source_language: &str,
        target_language: &str,
        progress_callback: impl Fn(usize, usize),
    ) -> Result<Vec<u8>, JobError> {
        let paths: Vec<PathBuf> = job.chunks.iter().map(|c| c.path.clone()).collect();
        let results = self
            .translator
            .translate_all(&paths, source_language, target_language, progress_callback)
            .await;

        job.translated = results
            .iter()
            .filter_map(|r| r.translated().map(Path::to_path_buf))
            .collect();

        let mut failures = self.collect_failures(&job.chunks, &results);
        if failures.is_empty() && self.config.verify_page_counts {
            failures = self.verify_page_counts(&job.chunks, &results).await;
        }

        if !failures.is_empty() {
            let error = JobError::ChunksFailed {
                failures,
                total: job.chunks.len(),
            };
            warn!("{}", error);
            return Err(error);
        }

        let merged = self
            .merger
            .merge_files(&job.translated)
            .await
            .map_err(JobError::Merge)?;
        info!("Translated document assembled ({} bytes)", merged.len());
        Ok(merged)
    }

    fn collect_failures(&self, chunks: &[PersistedChunk], results: &[TranslationResult]) -> Vec<FailedChunk> {
        results
            .iter()
            .filter_map(|result| {
                let failure = result.failure()?;
                let chunk = &chunks[result.position()];
                Some(FailedChunk {
                    index: result.position() + 1,
                    start_page: chunk.start_page(),
                    end_page: chunk.end_page(),
                    cause: failure.cause.clone(),
                })
            })
            .collect()
    }

    /// Report translated artifacts whose page count differs from their chunk
    async fn verify_page_counts(
        &self,
        chunks: &[PersistedChunk],
        results: &[TranslationResult],
    ) -> Vec<FailedChunk> {
        let mut failures = Vec::new();

        for result in results {
            let Some(translated) = result.translated() else {
                continue;
            };
            let chunk = &chunks[result.position()];
            let expected = chunk.chunk.page_count();

            let actual = match tokio::fs::read(translated).await {
                Ok(bytes) => self.codec.load(&bytes).map(|doc| self.codec.page_count(&doc)),
                Err(e) => Err(crate::errors::DocumentError::Parse(e.to_string())),
            };

            let cause = match actual {
                Ok(actual) if actual == expected => continue,
                Ok(actual) => FailureCause::PageCountMismatch { expected, actual },
                Err(e) => FailureCause::DownloadSaveFailed(e.to_string()),
            };
            failures.push(FailedChunk {
                index: result.position() + 1,
                start_page: chunk.start_page(),
                end_page: chunk.end_page(),
                cause,
            });
        }

        failures
    }

    /// Split on the blocking pool
    async fn split(&self, bytes: Vec<u8>) -> Result<(usize, Vec<crate::document::Chunk>), JobError> {
        let splitter = self.splitter.clone();
        let codec = Arc::clone(&self.codec);
        tokio::task::spawn_blocking(move || {
            let doc = codec.load(&bytes)?;
            let total_pages = codec.page_count(&doc);
            let chunks = splitter.split(&doc)?;
            Ok::<_, JobError>((total_pages, chunks))
        })
        .await
        .map_err(|e| JobError::Io(std::io::Error::other(e.to_string())))?
    }

    /// Run the main workflow with an input document and output directory
    pub async fn run(&self, input_file: PathBuf, output_dir: PathBuf, force_overwrite: bool) -> Result<PathBuf> {
        let start_time = std::time::Instant::now();

        if !FileManager::file_exists(&input_file) {
            return Err(anyhow!("Input file does not exist: {:?}", input_file));
        }
        if FileManager::detect_file_type(&input_file)? != FileType::Pdf {
            return Err(anyhow!("Input file is not a PDF document: {:?}", input_file));
        }

        FileManager::ensure_dir(&output_dir)?;
        let output_path = FileManager::generate_output_path(&input_file, &output_dir);
        if output_path.exists() && !force_overwrite {
            warn!("Skipping file, translation already exists (use -f to force overwrite)");
            return Ok(output_path);
        }

        let filename = input_file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document.pdf".to_string());
        let bytes = tokio::fs::read(&input_file)
            .await
            .with_context(|| format!("Failed to read input file: {:?}", input_file))?;

        let progress_bar = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("█▓▒░"));
        progress_bar.set_message(filename.clone());

        let result = self
            .translate_document_with_progress(
                bytes,
                &filename,
                &self.config.source_language,
                &self.config.target_language,
                |done, total| {
                    progress_bar.set_length(total as u64);
                    progress_bar.set_position(done as u64);
                },
            )
            .await;

        match result {
            Ok(translated) => {
                progress_bar.finish_with_message("done");
                FileManager::write_bytes(&output_path, &translated)?;
                info!(
                    "Translation completed in {}: {}",
                    Self::format_duration(start_time.elapsed()),
                    output_path.display()
                );
                Ok(output_path)
            }
            Err(e) => {
                progress_bar.abandon_with_message("failed");
                Err(anyhow::Error::new(e).context(format!("Failed to translate {}", filename)))
            }
        }
    }

    /// Tear down the browsing engine
    pub async fn shutdown(&self) {
        self.supervisor.invalidate().await;
    }

    // Format duration in a human-readable format (HH:MM:SS)
    fn format_duration(duration: std::time::Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}

/// Language code as the surface expects it
fn surface_language(code: &str) -> Result<String, JobError> {
    language_utils::normalize_to_part1_or_part2t(code)
        .map_err(|e| JobError::InvalidInput(e.to_string()))
}
