/*!
 * Tests for the translation session state machine, driven by the mock engine
 */

use std::path::{Path, PathBuf};

use anyhow::Result;
use pdf_chunk_translator::browser::EngineLauncher;
use pdf_chunk_translator::browser::mock::{MockLauncher, SessionScript};
use pdf_chunk_translator::errors::{FailureCause, SessionFailure};
use pdf_chunk_translator::translation::{LabelTable, SessionOptions, SessionState, TranslationSession};
use tempfile::TempDir;

use crate::common;

struct Fixture {
    launcher: MockLauncher,
    options: SessionOptions,
    labels: LabelTable,
    temp_dir: TempDir,
    artifact: PathBuf,
}

impl Fixture {
    fn new(script: SessionScript) -> Result<Self> {
        let temp_dir = common::create_temp_dir()?;
        let artifact = common::write_file(temp_dir.path(), "job_chunk_1.pdf", &common::build_simple_pdf(2))?;
        let mut options = common::fast_session_options();
        options.snapshot_dir = temp_dir.path().join("snapshots");
        Ok(Self {
            launcher: MockLauncher::new(vec![script]),
            options,
            labels: LabelTable::default(),
            temp_dir,
            artifact,
        })
    }

    async fn run(&self) -> Result<Result<PathBuf, SessionFailure>> {
        let engine = self.launcher.launch().await?;
        let session = TranslationSession::new(engine.as_ref(), &self.options, &self.labels);
        Ok(session.translate(&self.artifact, "en", "es").await)
    }

    fn dir(&self) -> &Path {
        self.temp_dir.path()
    }
}

fn expect_failure(outcome: Result<PathBuf, SessionFailure>) -> SessionFailure {
    match outcome {
        Ok(path) => panic!("expected failure, got {}", path.display()),
        Err(failure) => failure,
    }
}

#[tokio::test]
async fn test_translate_withWorkingSurface_shouldSaveTranslatedArtifact() -> Result<()> {
    let fixture = Fixture::new(SessionScript::Working)?;

    let translated = fixture.run().await??;

    assert_eq!(translated, fixture.dir().join("translated_job_chunk_1.pdf"));
    assert_eq!(std::fs::read(&translated)?, std::fs::read(&fixture.artifact)?);

    let log = fixture.launcher.log();
    let log = log.lock();
    assert_eq!(log.navigations.len(), 1);
    assert!(log.navigations[0].contains("sl=en"));
    assert!(log.navigations[0].contains("tl=es"));
    assert!(log.navigations[0].contains("op=docs"));
    assert_eq!(log.uploads, vec![fixture.artifact.clone()]);
    assert_eq!(log.clicks, vec!["Translate".to_string(), "Download translation".to_string()]);
    assert_eq!(log.sessions_closed, 1);
    Ok(())
}

#[tokio::test]
async fn test_translate_withWorkingSurface_shouldLeaveNoStagedDownload() -> Result<()> {
    let fixture = Fixture::new(SessionScript::Working)?;

    fixture.run().await??;

    let leftovers: Vec<_> = common::dir_entries(fixture.dir())
        .into_iter()
        .filter(|p| p.extension().is_some_and(|e| e == "part"))
        .collect();
    assert!(leftovers.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_translate_whenNavigationFails_shouldFailInInit() -> Result<()> {
    let fixture = Fixture::new(SessionScript::NavigationFails)?;

    let failure = expect_failure(fixture.run().await?);

    assert_eq!(failure.state, SessionState::Init);
    assert!(matches!(failure.cause, FailureCause::Navigation(_)));
    assert!(failure.is_retryable());
    assert_eq!(failure.artifact, fixture.artifact);
    Ok(())
}

#[tokio::test]
async fn test_translate_withoutUploadControl_shouldFailInNavigated() -> Result<()> {
    let fixture = Fixture::new(SessionScript::UploadControlMissing)?;

    let failure = expect_failure(fixture.run().await?);

    assert_eq!(failure.state, SessionState::Navigated);
    assert!(matches!(failure.cause, FailureCause::Upload(_)));
    Ok(())
}

#[tokio::test]
async fn test_translate_withoutTrigger_shouldReportTriggerNotFound() -> Result<()> {
    let fixture = Fixture::new(SessionScript::TriggerMissing)?;

    let failure = expect_failure(fixture.run().await?);

    assert_eq!(failure.state, SessionState::Uploaded);
    assert_eq!(failure.cause, FailureCause::TriggerNotFound);
    Ok(())
}

#[tokio::test]
async fn test_translate_whenTriggerLookupKeepsFailing_shouldReportDriverMessage() -> Result<()> {
    let fixture = Fixture::new(SessionScript::TriggerUnreadable)?;

    let failure = expect_failure(fixture.run().await?);

    assert_eq!(failure.state, SessionState::Uploaded);
    match &failure.cause {
        FailureCause::Trigger(message) => assert!(message.contains("Execution context was destroyed")),
        other => panic!("expected a trigger failure, got {}", other),
    }
    assert_eq!(fixture.launcher.log().lock().sessions_closed, 1);
    Ok(())
}

#[tokio::test]
async fn test_translate_whenTriggerClickFails_shouldReportDriverMessage() -> Result<()> {
    let fixture = Fixture::new(SessionScript::TriggerClickFails)?;

    let failure = expect_failure(fixture.run().await?);

    assert_eq!(failure.state, SessionState::Uploaded);
    match &failure.cause {
        FailureCause::Trigger(message) => assert!(message.contains("Node is detached")),
        other => panic!("expected a trigger failure, got {}", other),
    }
    assert!(!failure.requires_engine_restart());
    Ok(())
}

#[tokio::test]
async fn test_translate_whenNeverCompleting_shouldReportCompletionTimeout() -> Result<()> {
    let fixture = Fixture::new(SessionScript::NeverCompletes)?;

    let failure = expect_failure(fixture.run().await?);

    assert_eq!(failure.state, SessionState::Triggered);
    assert!(matches!(failure.cause, FailureCause::CompletionTimeout { .. }));
    assert!(!fixture.dir().join("translated_job_chunk_1.pdf").exists());
    Ok(())
}

#[tokio::test]
async fn test_translate_whenSurfaceClosesPage_shouldReportBotDetection() -> Result<()> {
    let fixture = Fixture::new(SessionScript::ClosedAfterTrigger)?;

    let failure = expect_failure(fixture.run().await?);

    assert_eq!(failure.cause, FailureCause::BotDetected);
    assert!(failure.requires_engine_restart());
    assert!(failure.state < SessionState::Triggered);
    Ok(())
}

#[tokio::test]
async fn test_translate_whenDownloadNeverArrives_shouldReportDownloadTimeout() -> Result<()> {
    let fixture = Fixture::new(SessionScript::DownloadNeverArrives)?;

    let failure = expect_failure(fixture.run().await?);

    assert_eq!(failure.state, SessionState::Completed);
    assert!(matches!(failure.cause, FailureCause::DownloadTimeout(_)));
    Ok(())
}

#[tokio::test]
async fn test_translate_withEmptyDownload_shouldRejectArtifact() -> Result<()> {
    let fixture = Fixture::new(SessionScript::EmptyDownload)?;

    let failure = expect_failure(fixture.run().await?);

    assert_eq!(failure.state, SessionState::Completed);
    assert_eq!(failure.cause, FailureCause::EmptyArtifact);
    assert!(!fixture.dir().join("translated_job_chunk_1.pdf").exists());
    Ok(())
}

#[tokio::test]
async fn test_translate_onEveryFailure_shouldCloseSession() -> Result<()> {
    let scripts = [
        SessionScript::NavigationFails,
        SessionScript::UploadControlMissing,
        SessionScript::TriggerMissing,
        SessionScript::NeverCompletes,
        SessionScript::ClosedAfterTrigger,
        SessionScript::DownloadNeverArrives,
        SessionScript::EmptyDownload,
    ];

    for script in scripts {
        let fixture = Fixture::new(script)?;
        assert!(fixture.run().await?.is_err(), "{:?} should fail", script);
        let log = fixture.launcher.log();
        let log = log.lock();
        assert_eq!(log.sessions_opened, 1, "{:?}", script);
        assert_eq!(log.sessions_closed, 1, "{:?}", script);
    }
    Ok(())
}

#[tokio::test]
async fn test_translate_withDebugSnapshots_shouldCaptureFailureState() -> Result<()> {
    let mut fixture = Fixture::new(SessionScript::TriggerMissing)?;
    fixture.options.debug_snapshots = true;

    expect_failure(fixture.run().await?);

    let snapshots = fixture.launcher.log().lock().snapshots.clone();
    assert_eq!(snapshots.len(), 1);
    let name = snapshots[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("job_chunk_1-uploaded-"));
    assert!(name.ends_with(".png"));
    assert!(snapshots[0].starts_with(fixture.dir().join("snapshots")));
    Ok(())
}

#[tokio::test]
async fn test_translate_withoutDebugSnapshots_shouldNotCapture() -> Result<()> {
    let fixture = Fixture::new(SessionScript::TriggerMissing)?;

    expect_failure(fixture.run().await?);

    assert!(fixture.launcher.log().lock().snapshots.is_empty());
    assert!(!fixture.dir().join("snapshots").exists());
    Ok(())
}

#[tokio::test]
async fn test_translate_withTargetLocaleUnknown_shouldFallBackToOtherLabels() -> Result<()> {
    let fixture = Fixture::new(SessionScript::Working)?;
    let engine = fixture.launcher.launch().await?;

    // The mock surface shows English labels whatever the target language
    let session = TranslationSession::new(engine.as_ref(), &fixture.options, &fixture.labels);
    let translated = session.translate(&fixture.artifact, "en", "ja").await;

    assert!(translated.is_ok());
    Ok(())
}
