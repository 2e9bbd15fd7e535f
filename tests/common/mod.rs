//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use docsmith::context::PipelineContext;
use docsmith::embedding::{Embedder, EmbedderFactory, VectorEntry, VectorStore};
use docsmith::errors::IngestError;
use docsmith::stage::Stage;

/// Deterministic embedder: vectors derive from byte content only, so equal
/// texts embed identically across runs.
pub struct MockEmbedder;

#[async_trait]
impl Embedder for MockEmbedder {
    fn id(&self) -> &str {
        "mock-embedder"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IngestError> {
        Ok(texts.iter().map(|t| embed_text(t)).collect())
    }
}

fn embed_text(text: &str) -> Vec<f32> {
    let mut vector = [0.0f32; 8];
    for (i, byte) in text.bytes().enumerate() {
        vector[i % 8] += f32::from(byte) / 255.0;
    }
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector.to_vec()
}

/// Factory handing out [`MockEmbedder`] handles, counting loads.
#[derive(Default)]
pub struct MockEmbedderFactory {
    pub loads: AtomicUsize,
}

#[async_trait]
impl EmbedderFactory for MockEmbedderFactory {
    async fn load(&self, _model: &str) -> Result<Arc<dyn Embedder>, IngestError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockEmbedder))
    }
}

/// Vector store that records every entry it receives.
#[derive(Default)]
pub struct MemoryVectorStore {
    pub entries: Mutex<Vec<VectorEntry>>,
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn add_chunks(&self, entries: &[VectorEntry]) -> Result<Vec<String>, IngestError> {
        let mut stored = self.entries.lock();
        stored.extend(entries.iter().cloned());
        Ok(entries.iter().map(|e| e.id.clone()).collect())
    }
}

/// Vector store whose every batch fails.
pub struct FailingVectorStore;

#[async_trait]
impl VectorStore for FailingVectorStore {
    async fn add_chunks(&self, _entries: &[VectorEntry]) -> Result<Vec<String>, IngestError> {
        Err(IngestError::Embedding("vector store unavailable".into()))
    }
}

/// Stage that records its execution in a shared log and completes.
pub struct RecordingStage {
    name: &'static str,
    deps: Vec<&'static str>,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl RecordingStage {
    pub fn new(
        name: &'static str,
        deps: Vec<&'static str>,
        log: Arc<Mutex<Vec<&'static str>>>,
    ) -> Self {
        Self { name, deps, log }
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn name(&self) -> &'static str {
        self.name
    }

    fn required_stages(&self) -> &[&'static str] {
        &self.deps
    }

    async fn execute(&self, ctx: PipelineContext) -> Result<PipelineContext, IngestError> {
        self.log.lock().push(self.name);
        Ok(ctx.mark_stage_completed(self.name))
    }
}

/// Stage that always records a domain failure.
pub struct FailingStage {
    name: &'static str,
    deps: Vec<&'static str>,
}

impl FailingStage {
    pub fn new(name: &'static str, deps: Vec<&'static str>) -> Self {
        Self { name, deps }
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn name(&self) -> &'static str {
        self.name
    }

    fn required_stages(&self) -> &[&'static str] {
        &self.deps
    }

    async fn execute(&self, ctx: PipelineContext) -> Result<PipelineContext, IngestError> {
        Ok(ctx.mark_stage_failed(self.name, "intentional failure"))
    }
}

/// Stage declaring dependencies only, for wiring-validation tests.
pub struct WiredStage {
    name: &'static str,
    deps: Vec<&'static str>,
}

impl WiredStage {
    pub fn new(name: &'static str, deps: Vec<&'static str>) -> Self {
        Self { name, deps }
    }
}

#[async_trait]
impl Stage for WiredStage {
    fn name(&self) -> &'static str {
        self.name
    }

    fn required_stages(&self) -> &[&'static str] {
        &self.deps
    }

    async fn execute(&self, ctx: PipelineContext) -> Result<PipelineContext, IngestError> {
        Ok(ctx.mark_stage_completed(self.name))
    }
}

/// A markdown document with one short intro and `sections` long H2 sections.
pub fn markdown_fixture(sections: usize, words_per_section: usize) -> String {
    let mut doc = String::from("# Fixture Guide\n\nIntro paragraph for the guide.\n\n");
    for i in 0..sections {
        doc.push_str(&format!("## Section {i}\n\n"));
        for w in 0..words_per_section {
            doc.push_str(&format!("word{w} "));
        }
        doc.push('\n');
    }
    doc
}
