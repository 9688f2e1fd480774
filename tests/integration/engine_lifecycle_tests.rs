/*!
 * Browser engine lifecycle across jobs: lazy launch, reuse, recreation and teardown
 */

use anyhow::Result;
use pdf_chunk_translator::Controller;
use pdf_chunk_translator::browser::mock::{MockLauncher, SessionScript};
use pdf_chunk_translator::document::PdfCodec;
use pdf_chunk_translator::errors::{FailureCause, JobError};

use crate::common;

#[tokio::test]
async fn test_controller_shouldLaunchEngineLazily() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let launcher = MockLauncher::new(vec![]);
    let log = launcher.log();

    let controller = Controller::with_parts(
        common::fast_config(&temp_dir.path().join("work")),
        PdfCodec::new(),
        launcher,
    );

    assert_eq!(log.lock().engines_launched, 0);
    assert!(!controller.engine_supervisor().is_live().await);
    Ok(())
}

#[tokio::test]
async fn test_consecutiveJobs_shouldShareOneEngine() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let controller = Controller::with_parts(
        common::fast_config(&temp_dir.path().join("work")),
        PdfCodec::new(),
        MockLauncher::new(vec![]),
    );

    for _ in 0..3 {
        controller
            .translate_document(common::build_simple_pdf(2), "doc.pdf", "en", "es")
            .await?;
    }

    assert_eq!(controller.engine_supervisor().launch_count(), 1);
    assert!(controller.engine_supervisor().is_live().await);
    Ok(())
}

#[tokio::test]
async fn test_shutdown_shouldCloseEngineAndAllowRelaunch() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let launcher = MockLauncher::new(vec![]);
    let log = launcher.log();
    let controller = Controller::with_parts(
        common::fast_config(&temp_dir.path().join("work")),
        PdfCodec::new(),
        launcher,
    );

    controller
        .translate_document(common::build_simple_pdf(1), "doc.pdf", "en", "es")
        .await?;
    controller.shutdown().await;

    assert_eq!(log.lock().engines_shut_down, 1);
    assert!(!controller.engine_supervisor().is_live().await);

    controller
        .translate_document(common::build_simple_pdf(1), "doc.pdf", "en", "es")
        .await?;
    assert_eq!(controller.engine_supervisor().launch_count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_botDetection_shouldFailJobAndRecreateEngine() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let work_dir = temp_dir.path().join("work");
    let launcher = MockLauncher::new(vec![SessionScript::ClosedAfterTrigger]);
    let log = launcher.log();
    let controller = Controller::with_parts(common::fast_config(&work_dir), PdfCodec::new(), launcher);

    let error = controller
        .translate_document(common::build_simple_pdf(2), "doc.pdf", "en", "es")
        .await
        .err()
        .expect("job should fail");

    assert_eq!(error.failed_chunks()[0].cause, FailureCause::BotDetected);
    assert!(error.to_string().contains("recreated"));
    assert_eq!(log.lock().engines_shut_down, 1);

    // The next job runs on a fresh engine
    controller
        .translate_document(common::build_simple_pdf(2), "doc.pdf", "en", "es")
        .await?;
    assert_eq!(controller.engine_supervisor().launch_count(), 2);
    assert!(common::dir_entries(&work_dir).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unavailableEngine_shouldFailEveryChunk() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let bytes = common::build_pdf(&[2000, 2000, 2000]);
    let mut config = common::fast_config(&temp_dir.path().join("work"));
    config.chunking.max_chunk_bytes = bytes.len() / 3 + 512;
    let launcher = MockLauncher::new(vec![]).with_failing_launches(100);
    let controller = Controller::with_parts(config, PdfCodec::new(), launcher);

    let result = controller.translate_document(bytes, "doc.pdf", "en", "es").await;

    match result {
        Err(JobError::ChunksFailed { failures, total }) => {
            assert_eq!(failures.len(), total);
            assert!(failures
                .iter()
                .all(|f| matches!(f.cause, FailureCause::EngineUnavailable(_))));
        }
        Err(other) => panic!("expected ChunksFailed, got {}", other),
        Ok(_) => panic!("job without an engine must fail"),
    }
    Ok(())
}
