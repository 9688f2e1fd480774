/*!
 * Tests for size-bounded document splitting
 */

use std::sync::Arc;

use anyhow::Result;
use pdf_chunk_translator::document::{Chunk, DocumentCodec, DocumentSplitter, PdfCodec};
use pdf_chunk_translator::document::splitter::DEFAULT_MAX_CHUNK_BYTES;

use crate::common::{self, FakeCodec, FakeDocument};

const MIB: f64 = 1024.0 * 1024.0;

fn mib(value: f64) -> u32 {
    (value * MIB) as u32
}

fn ranges(chunks: &[Chunk]) -> Vec<(usize, usize)> {
    chunks.iter().map(|c| (c.start_page, c.end_page)).collect()
}

/// Every page in exactly one chunk, in order, without gaps
fn assert_contiguous(chunks: &[Chunk], total_pages: usize) {
    let mut expected_start = 1;
    for chunk in chunks {
        assert_eq!(chunk.start_page, expected_start, "chunks must be contiguous");
        assert!(chunk.end_page >= chunk.start_page);
        expected_start = chunk.end_page + 1;
    }
    assert_eq!(expected_start, total_pages + 1, "chunks must cover every page");
}

/// A 25-page document: 8MB in pages 1-10, 11MB once pages 11-15 join them
fn scenario_weights() -> Vec<u32> {
    let mut weights = vec![mib(0.8); 10];
    weights.push(mib(1.5));
    weights.extend(vec![mib(0.375); 4]);
    weights.push(mib(7.0));
    weights.extend(vec![mib(0.2); 9]);
    weights
}

#[test]
fn test_split_withScenarioDocument_shouldNeverJoinPagesOneToEleven() -> Result<()> {
    let codec = Arc::new(FakeCodec::new(1024));
    let weights = scenario_weights();
    let doc = FakeDocument::with_weights(&weights);
    assert!(codec.size_of(&weights[..10]) <= DEFAULT_MAX_CHUNK_BYTES);
    assert!(codec.size_of(&weights[..15]) > 11 * 1024 * 1024 - 1024 * 1024 / 2);

    let splitter = DocumentSplitter::new(codec.clone(), DEFAULT_MAX_CHUNK_BYTES);
    let chunks = splitter.split(&doc)?;

    assert_eq!(ranges(&chunks), vec![(1, 10), (11, 15), (16, 25)]);
    assert_eq!(chunks[0].size, codec.size_of(&weights[..10]));
    for chunk in &chunks {
        assert!(chunk.size <= DEFAULT_MAX_CHUNK_BYTES);
    }
    Ok(())
}

#[test]
fn test_split_withMixedWeights_shouldCoverAllPagesWithinCeiling() -> Result<()> {
    let codec = Arc::new(FakeCodec::new(64));
    let weights: Vec<u32> = vec![120, 30, 400, 15, 15, 15, 250, 90, 600, 10, 10, 330, 45, 200];
    let doc = FakeDocument::with_weights(&weights);
    let max = 700;

    let chunks = DocumentSplitter::new(codec.clone(), max).split(&doc)?;

    assert_contiguous(&chunks, weights.len());
    for chunk in &chunks {
        assert!(chunk.size <= max || chunk.page_count() == 1);
        assert_eq!(chunk.size, chunk.buffer.len());
    }
    Ok(())
}

#[test]
fn test_split_shouldEmitLargestFittingPrefix() -> Result<()> {
    let codec = Arc::new(FakeCodec::new(64));
    let weights: Vec<u32> = vec![100, 100, 100, 100, 100, 100];
    let doc = FakeDocument::with_weights(&weights);
    // Three pages fit, four do not
    let max = codec.size_of(&weights[..3]);

    let chunks = DocumentSplitter::new(codec.clone(), max).split(&doc)?;

    assert_eq!(ranges(&chunks), vec![(1, 3), (4, 6)]);
    Ok(())
}

#[test]
fn test_split_chunkBytes_shouldHoldExactlyTheirPages() -> Result<()> {
    let codec = Arc::new(FakeCodec::new(16));
    let doc = FakeDocument::with_weights(&[50, 50, 50, 50, 50]);

    let chunks = DocumentSplitter::new(codec.clone(), 150).split(&doc)?;

    for chunk in &chunks {
        let part = codec.load(&chunk.buffer)?;
        let expected: Vec<u32> = (chunk.start_page as u32..=chunk.end_page as u32).collect();
        assert_eq!(part.labels(), expected);
    }
    Ok(())
}

#[test]
fn test_split_withOversizedFirstPage_shouldEmitItAlone() -> Result<()> {
    let codec = Arc::new(FakeCodec::new(16));
    let doc = FakeDocument::with_weights(&[5000, 10, 10]);

    let chunks = DocumentSplitter::new(codec, 1000).split(&doc)?;

    assert_eq!(ranges(&chunks), vec![(1, 1), (2, 3)]);
    assert!(chunks[0].size > 1000);
    Ok(())
}

#[test]
fn test_split_withOversizedMiddlePage_shouldIsolateIt() -> Result<()> {
    let codec = Arc::new(FakeCodec::new(16));
    let doc = FakeDocument::with_weights(&[10, 10, 5000, 10]);

    let chunks = DocumentSplitter::new(codec, 1000).split(&doc)?;

    assert_eq!(ranges(&chunks), vec![(1, 2), (3, 3), (4, 4)]);
    Ok(())
}

#[test]
fn test_split_withZeroPages_shouldReturnNoChunks() -> Result<()> {
    let codec = Arc::new(FakeCodec::new(16));
    let chunks = DocumentSplitter::new(codec, 1000).split(&FakeDocument::default())?;
    assert!(chunks.is_empty());
    Ok(())
}

#[test]
fn test_split_withSmallDocument_shouldReturnSingleChunk() -> Result<()> {
    let codec = Arc::new(FakeCodec::new(16));
    let mut doc = FakeDocument::with_weights(&[10, 20, 30]);

    let chunks = DocumentSplitter::new(codec.clone(), 10_000).split(&doc)?;

    assert_eq!(ranges(&chunks), vec![(1, 3)]);
    assert_eq!(chunks[0].buffer.as_ref(), codec.serialize(&mut doc)?.as_slice());
    Ok(())
}

#[test]
fn test_split_calledTwice_shouldBeIdempotent() -> Result<()> {
    let codec = Arc::new(FakeCodec::new(32));
    let doc = FakeDocument::with_weights(&[300, 20, 20, 500, 80, 80, 80, 700, 5]);
    let splitter = DocumentSplitter::new(codec, 800);

    let first = splitter.split(&doc)?;
    let second = splitter.split(&doc)?;

    assert_eq!(ranges(&first), ranges(&second));
    let sizes = |chunks: &[Chunk]| chunks.iter().map(|c| c.size).collect::<Vec<_>>();
    assert_eq!(sizes(&first), sizes(&second));
    Ok(())
}

#[test]
fn test_splitBytes_withRealPdf_shouldProduceSelfContainedChunks() -> Result<()> {
    let padding = [4000, 200, 200, 3000, 100, 100, 2500, 50];
    let bytes = common::build_pdf(&padding);
    let codec = Arc::new(PdfCodec::new());
    let max = bytes.len() / 2;

    let chunks = DocumentSplitter::new(codec.clone(), max).split_bytes(&bytes)?;

    assert!(chunks.len() > 1);
    assert_contiguous(&chunks, padding.len());
    for chunk in &chunks {
        assert!(chunk.size <= max || chunk.page_count() == 1);
        let expected: Vec<usize> = (chunk.start_page..=chunk.end_page).collect();
        assert_eq!(common::page_labels(&chunk.buffer), expected);
        assert!(common::pages_are_self_contained(&chunk.buffer));
    }
    Ok(())
}

#[test]
fn test_splitBytes_withGarbage_shouldFail() {
    let splitter = DocumentSplitter::new(Arc::new(PdfCodec::new()), DEFAULT_MAX_CHUNK_BYTES);
    assert!(splitter.split_bytes(b"definitely not a pdf").is_err());
}
