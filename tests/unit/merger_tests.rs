/*!
 * Tests for ordered reassembly of translated chunks
 */

use std::sync::Arc;

use anyhow::Result;
use pdf_chunk_translator::document::{DocumentCodec, DocumentMerger, DocumentSplitter, PdfCodec};
use pdf_chunk_translator::errors::DocumentError;

use crate::common::{self, FakeCodec, FakeDocument};

#[test]
fn test_merge_afterSplit_shouldRestorePageOrder() -> Result<()> {
    let codec = Arc::new(FakeCodec::new(16));
    let doc = FakeDocument::with_weights(&[40, 40, 40, 40, 40, 40, 40]);
    let chunks = DocumentSplitter::new(codec.clone(), 150).split(&doc)?;
    assert!(chunks.len() > 1);

    let buffers: Vec<_> = chunks.iter().map(|c| c.buffer.clone()).collect();
    let merged = DocumentMerger::new(codec).merge(&buffers)?;

    assert_eq!(merged.labels(), (1..=7).collect::<Vec<u32>>());
    Ok(())
}

#[test]
fn test_merge_shouldKeepInputOrderWithoutReordering() -> Result<()> {
    let codec = Arc::new(FakeCodec::new(0));
    let mut second = FakeDocument::with_weights(&[1, 1]);
    let mut first = FakeDocument::with_weights(&[1]);
    // Labels deliberately out of order: the merger must not sort them
    for page in &mut second.pages {
        page.label += 10;
    }

    let artifacts = vec![codec.serialize(&mut second)?, codec.serialize(&mut first)?];
    let merged = DocumentMerger::new(codec).merge(&artifacts)?;

    assert_eq!(merged.labels(), vec![11, 12, 1]);
    Ok(())
}

#[test]
fn test_merge_withUnreadableArtifact_shouldFailWithMergeError() {
    let codec = Arc::new(FakeCodec::new(0));
    let mut good = FakeDocument::with_weights(&[5]);
    let artifacts = vec![codec.serialize(&mut good).unwrap(), b"garbage".to_vec()];

    let result = DocumentMerger::new(codec).merge(&artifacts);

    match result {
        Err(DocumentError::Merge(message)) => assert!(message.contains("artifact 2")),
        other => panic!("expected merge error, got {:?}", other.map(|d| d.labels())),
    }
}

#[test]
fn test_mergeToBytes_withRealPdfChunks_shouldRestoreAllPages() -> Result<()> {
    let padding = [900, 900, 900, 900, 900];
    let bytes = common::build_pdf(&padding);
    let codec = Arc::new(PdfCodec::new());
    let chunks = DocumentSplitter::new(codec.clone(), bytes.len() / 2).split_bytes(&bytes)?;
    assert!(chunks.len() > 1);

    let buffers: Vec<_> = chunks.iter().map(|c| c.buffer.clone()).collect();
    let merged = DocumentMerger::new(codec.clone()).merge_to_bytes(&buffers)?;

    assert_eq!(common::count_pages(codec.as_ref(), &merged)?, padding.len());
    assert_eq!(common::page_labels(&merged), vec![1, 2, 3, 4, 5]);
    Ok(())
}

#[tokio::test]
async fn test_mergeFiles_shouldReadArtifactsInGivenOrder() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let first = common::write_file(temp_dir.path(), "a.pdf", &common::build_simple_pdf(2))?;
    let second = common::write_file(temp_dir.path(), "b.pdf", &common::build_simple_pdf(1))?;

    let codec = Arc::new(PdfCodec::new());
    let merged = DocumentMerger::new(codec.clone())
        .merge_files(&[first, second])
        .await?;

    assert_eq!(common::count_pages(codec.as_ref(), &merged)?, 3);
    assert_eq!(common::page_labels(&merged), vec![1, 2, 1]);
    Ok(())
}

#[tokio::test]
async fn test_mergeFiles_withMissingArtifact_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let missing = temp_dir.path().join("missing.pdf");

    let result = DocumentMerger::new(Arc::new(PdfCodec::new()))
        .merge_files(&[missing])
        .await;

    assert!(matches!(result, Err(DocumentError::Merge(_))));
    Ok(())
}
