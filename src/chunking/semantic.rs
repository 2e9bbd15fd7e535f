//! Pass 2: embedding-distance resplitting of oversized segments.
//!
//! Consecutive sentence windows are embedded, the cosine distance between
//! adjacent windows is computed, and a cut is placed wherever the distance
//! exceeds a percentile threshold over the segment's distance distribution.
//! The embedding capability is injected; nothing here interprets vector
//! contents beyond pairwise distances.

use crate::chunking::chunk::Chunk;
use crate::embedding::Embedder;
use crate::errors::IngestError;

/// Percentile used for the breakpoint threshold.
const BREAKPOINT_PERCENTILE: f64 = 95.0;

/// Sentences on each side combined into an embedding window.
const WINDOW_BUFFER: usize = 1;

/// Resplits one oversized segment at semantic breakpoints.
///
/// Returns the original segment unchanged when it has too few sentences or
/// the detector finds no improvement (a single piece). Errors from the
/// embedder propagate; the engine treats them as fail-soft per segment.
pub async fn resplit(chunk: &Chunk, embedder: &dyn Embedder) -> Result<Vec<Chunk>, IngestError> {
    let sentences = split_sentences(&chunk.text);
    if sentences.len() < 3 {
        return Ok(vec![chunk.clone()]);
    }

    let windows: Vec<String> = (0..sentences.len())
        .map(|i| {
            let start = i.saturating_sub(WINDOW_BUFFER);
            let end = (i + WINDOW_BUFFER + 1).min(sentences.len());
            sentences[start..end].concat()
        })
        .collect();

    let embeddings = embedder.embed(&windows).await?;
    if embeddings.len() != windows.len() {
        return Err(IngestError::Embedding(format!(
            "embedder returned {} vectors for {} windows",
            embeddings.len(),
            windows.len()
        )));
    }

    let distances: Vec<f64> = embeddings
        .windows(2)
        .map(|pair| cosine_distance(&pair[0], &pair[1]))
        .collect();
    let threshold = percentile(&distances, BREAKPOINT_PERCENTILE);

    let mut pieces = Vec::new();
    let mut current = String::new();
    for (i, sentence) in sentences.iter().enumerate() {
        current.push_str(sentence);
        let is_breakpoint = i < distances.len() && distances[i] > threshold;
        if is_breakpoint && !current.trim().is_empty() {
            pieces.push(std::mem::take(&mut current));
        }
    }
    if !current.trim().is_empty() {
        pieces.push(current);
    }

    if pieces.len() <= 1 {
        return Ok(vec![chunk.clone()]);
    }

    Ok(pieces
        .into_iter()
        .map(|text| {
            let mut metadata = chunk.metadata.clone();
            metadata.is_semantic_split = true;
            Chunk::new(text, metadata)
        })
        .collect())
}

/// Splits text into sentences, keeping terminators and trailing whitespace so
/// the pieces concatenate back to the input.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    let mut blank_run = 0usize;

    while let Some(c) = chars.next() {
        current.push(c);
        blank_run = if c == '\n' { blank_run + 1 } else { 0 };

        let terminator = matches!(c, '.' | '!' | '?');
        let followed_by_space = chars.peek().is_some_and(|n| n.is_whitespace());
        let paragraph_break = blank_run >= 2;

        if paragraph_break || (terminator && followed_by_space) {
            // Absorb the whitespace run into the finished sentence.
            while chars.peek().is_some_and(|n| n.is_whitespace()) {
                current.push(chars.next().expect("peeked"));
            }
            sentences.push(std::mem::take(&mut current));
            blank_run = 0;
        }
    }

    if !current.is_empty() {
        sentences.push(current);
    }

    sentences
}

/// Cosine distance between two vectors; zero vectors yield distance 0.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|y| (*y as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

/// Linearly interpolated percentile over `values` (like numpy's default).
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let pos = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let frac = pos - lower as f64;
    sorted[lower] + frac * (sorted[upper] - sorted[lower])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::chunk::ChunkMetadata;
    use async_trait::async_trait;

    #[test]
    fn sentence_split_is_lossless() {
        let text = "First one. Second here! Third?\n\nNew paragraph without end";
        let sentences = split_sentences(text);
        assert_eq!(sentences.concat(), text);
        assert_eq!(sentences.len(), 4);
    }

    #[test]
    fn percentile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((percentile(&values, 50.0) - 3.0).abs() < 1e-9);
        assert!(percentile(&values, 95.0) < 5.0);
        assert!(percentile(&values, 95.0) > 4.0);
    }

    #[test]
    fn cosine_distance_bounds() {
        assert!((cosine_distance(&[1.0, 0.0], &[1.0, 0.0])).abs() < 1e-9);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-9);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    /// Embedder that places sentences mentioning "ocean" in one cluster and
    /// everything else in another.
    struct ClusterEmbedder;

    #[async_trait]
    impl Embedder for ClusterEmbedder {
        fn id(&self) -> &str {
            "cluster-test"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IngestError> {
            Ok(texts
                .iter()
                .map(|t| {
                    if t.contains("ocean") {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.0, 1.0]
                    }
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn resplit_cuts_at_topic_boundary() {
        let text = "The ocean is vast. The ocean holds salt. The ocean moves. \
                    The ocean is deep. The ocean is cold. The ocean is blue. \
                    Rust compiles fast. Rust checks borrows. Rust has traits. \
                    Rust ships crates. Rust builds tools. Rust runs tests.";
        let chunk = Chunk::new(text, ChunkMetadata::default());

        let pieces = resplit(&chunk, &ClusterEmbedder).await.unwrap();
        assert!(pieces.len() > 1);
        assert!(pieces.iter().all(|p| p.metadata.is_semantic_split));
        let rejoined: String = pieces.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(rejoined, text);
    }

    #[tokio::test]
    async fn short_segments_pass_through() {
        let chunk = Chunk::new("One. Two.", ChunkMetadata::default());
        let pieces = resplit(&chunk, &ClusterEmbedder).await.unwrap();
        assert_eq!(pieces.len(), 1);
        assert!(!pieces[0].metadata.is_semantic_split);
    }
}
