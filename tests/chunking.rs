mod common;

use std::sync::Arc;

use common::{MockEmbedder, markdown_fixture};
use docsmith::chunking::{ChunkingConfig, MarkdownChunker};

fn config() -> ChunkingConfig {
    ChunkingConfig::default()
}

#[tokio::test]
async fn short_sections_are_merged_forward() {
    // 40 sections of 100 words each, below min_size individually.
    let doc = markdown_fixture(40, 100);
    let chunker = MarkdownChunker::new(doc, config(), None, None).unwrap();
    let (chunks, _) = chunker.chunk().await.unwrap();

    // Merging reduced the segment count and no accumulated chunk bursts the
    // character cap.
    assert!(chunks.len() < 41);
    for (i, chunk) in chunks.iter().enumerate() {
        assert!(
            chunk.char_count() <= 2000,
            "chunk {i} oversized: {} chars",
            chunk.char_count()
        );
        if i + 1 < chunks.len() {
            assert!(chunk.word_count() >= 50);
        }
    }
    assert!(chunks.iter().filter(|c| c.metadata.is_combined).count() >= chunks.len() - 1);
}

#[tokio::test]
async fn small_merge_accumulation_respects_max_size() {
    let doc = markdown_fixture(60, 100);
    let chunker = MarkdownChunker::new(doc, config(), None, None).unwrap();
    let (chunks, _) = chunker.chunk().await.unwrap();

    assert!(chunks.iter().any(|c| c.metadata.is_combined));
    for chunk in &chunks {
        if chunk.metadata.is_combined {
            assert!(chunk.char_count() <= 2000);
        }
    }
}

#[tokio::test]
async fn tiny_threshold_triggers_unconditional_merge() {
    let doc = format!("# Top\n\njust a few words\n\n## Next\n\n{}\n", "word ".repeat(800));
    let chunker = MarkdownChunker::new(doc, config(), None, None).unwrap();
    let (chunks, _) = chunker.chunk().await.unwrap();

    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].metadata.is_combined);
    assert!(chunks[0].text.contains("just a few words"));
}

#[tokio::test]
async fn merge_across_headers_drops_disagreeing_levels() {
    let doc = format!(
        "# Guide\n\n## Alpha\n\ntiny alpha text\n\n## Beta\n\n{}\n",
        "word ".repeat(800)
    );
    let chunker = MarkdownChunker::new(doc, config(), None, None).unwrap();
    let (chunks, _) = chunker.chunk().await.unwrap();

    let merged = chunks
        .iter()
        .find(|c| c.metadata.is_combined)
        .expect("expected a merged chunk");
    // Alpha and Beta disagree at H2, so the merged chunk has no H2 context.
    assert_eq!(merged.metadata.header(2), None);
}

#[tokio::test]
async fn finalize_writes_positional_metadata() {
    let doc = format!("# Title\n\nShort intro.\n\n## Sub\n\n{}\n", "word ".repeat(800));
    let chunker = MarkdownChunker::new(doc, config(), None, None).unwrap();
    let (chunks, stats) = chunker.chunk().await.unwrap();

    assert_eq!(stats.total_chunks, chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let meta = &chunk.metadata;
        assert_eq!(meta.chunk_index, Some(i));
        assert_eq!(meta.doc_title.as_deref(), Some("Title"));
        assert_eq!(meta.word_count, Some(chunk.word_count()));
        assert_eq!(meta.char_count, Some(chunk.char_count()));
        let path = meta.section_path.as_deref().unwrap();
        assert!(path.starts_with("Title"));
    }
}

#[tokio::test]
async fn explicit_title_overrides_extraction() {
    let doc = format!("# Inline Title\n\n{}\n", "word ".repeat(100));
    let chunker =
        MarkdownChunker::new(doc, config(), Some("Given Title".into()), None).unwrap();
    let (chunks, _) = chunker.chunk().await.unwrap();
    assert_eq!(chunks[0].metadata.doc_title.as_deref(), Some("Given Title"));
}

#[tokio::test]
async fn semantic_resplit_marks_pieces_and_preserves_text() {
    let section: String = (0..150)
        .map(|i| {
            if i < 75 {
                format!("Oceans cover most of sentence {i}. ")
            } else {
                format!("Compilers rewrite sentence {i} quickly. ")
            }
        })
        .collect();
    let doc = format!("# Big\n\n{section}\n");

    // min_size lowered so the resplit pieces survive the merge pass.
    let chunker = MarkdownChunker::new(
        doc.clone(),
        ChunkingConfig {
            min_size: 20,
            tiny_chunk_threshold: 5,
            ..config()
        },
        None,
        Some(Arc::new(MockEmbedder)),
    )
    .unwrap();
    let (chunks, _) = chunker.chunk().await.unwrap();

    assert!(chunks.len() > 1);
    assert!(chunks.iter().any(|c| c.metadata.is_semantic_split));
    // All sentences survive, in original order.
    let all: String = chunks.iter().map(|c| c.text.as_str()).collect();
    assert!(all.contains("sentence 0"));
    assert!(all.contains("sentence 149"));
    let first = all.find("sentence 10.").unwrap();
    let last = all.find("sentence 140").unwrap();
    assert!(first < last);
}

#[tokio::test]
async fn oversized_chunks_pass_through_when_semantic_disabled() {
    let doc = format!("# Big\n\n{}\n", "alpha beta gamma. ".repeat(400));
    let chunker = MarkdownChunker::new(
        doc,
        ChunkingConfig {
            enable_semantic: false,
            ..config()
        },
        None,
        Some(Arc::new(MockEmbedder)),
    )
    .unwrap();
    let (chunks, _) = chunker.chunk().await.unwrap();

    assert!(chunks.iter().all(|c| !c.metadata.is_semantic_split));
    assert!(chunks.iter().any(|c| c.char_count() > 2000));
}
