//! Document pipeline: chunk → extract (concurrently) → consolidate → persist.
//!
//! Failures are collected, never propagated: a chunk that exhausts its
//! retries shrinks the graph, an unavailable store is reported next to the
//! graph, and narrative errors stay with their report.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};
use serde::Serialize;

use crate::config::{Config, ExtractionConfig};
use crate::error::PapergraphError;
use crate::extract::{Extractor, RetryPolicy};
use crate::graph::{consolidate, CanonicalGraph, GraphStore, PersistSummary};
use crate::ingest::chunk_text;
use crate::llm::ChatModel;
use crate::narrative::{NarrativeGenerator, NarrativeReport};

/// Chunking and fan-out knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_chunks: usize,
    pub concurrency: usize,
}

impl From<&ExtractionConfig> for PipelineSettings {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            max_chunks: config.max_chunks,
            concurrency: config.concurrency,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&ExtractionConfig::default())
    }
}

/// A chunk whose extraction gave up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkFailure {
    pub chunk_index: usize,
    pub attempts: u32,
    pub error: String,
}

/// What happened when the graph was handed to the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StoreStatus {
    Persisted { summary: PersistSummary },
    Unavailable { reason: String },
    Failed { error: String },
    Skipped,
}

/// Result of running one document through the graph pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct GraphOutcome {
    pub graph: CanonicalGraph,
    /// Chunks the chunker produced, before the max-chunk cap
    pub chunks_total: usize,
    /// Chunks sent to the model
    pub chunks_processed: usize,
    pub failures: Vec<ChunkFailure>,
    pub store: StoreStatus,
}

/// Graph pipeline plus narratives for one document.
#[derive(Debug)]
pub struct PaperAnalysis {
    pub graph: GraphOutcome,
    pub narratives: NarrativeReport,
}

/// Entry point wiring the model and store into the pipeline.
///
/// Both dependencies are created once per process and passed in.
pub struct Pipeline {
    extractor: Extractor,
    narratives: NarrativeGenerator,
    store: Option<GraphStore>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        model: Arc<dyn ChatModel>,
        store: Option<GraphStore>,
        settings: PipelineSettings,
        policy: RetryPolicy,
    ) -> Self {
        // Narratives are single-shot; only the deadline carries over
        let narrative_policy = RetryPolicy::new(1, policy.timeout);
        Self {
            extractor: Extractor::new(Arc::clone(&model), policy),
            narratives: NarrativeGenerator::new(model, narrative_policy),
            store,
            settings,
        }
    }

    /// Build a pipeline from loaded configuration.
    pub fn from_config(config: &Config, model: Arc<dyn ChatModel>, store: Option<GraphStore>) -> Self {
        let policy = RetryPolicy::new(
            config.extraction.max_attempts,
            Duration::from_secs(config.model.timeout_secs),
        )
        .with_backoff(Duration::from_millis(config.extraction.retry_backoff_ms));
        Self::new(model, store, PipelineSettings::from(&config.extraction), policy)
    }

    /// Chunk, extract and consolidate without touching the store.
    pub async fn extract_graph(&self, text: &str) -> GraphOutcome {
        let start = Instant::now();
        let mut chunks = chunk_text(text, self.settings.chunk_size, self.settings.chunk_overlap);
        let chunks_total = chunks.len();
        if chunks.len() > self.settings.max_chunks {
            log::info!(
                "Document produced {} chunks, processing the first {}",
                chunks_total,
                self.settings.max_chunks
            );
            chunks.truncate(self.settings.max_chunks);
        }
        let chunks_processed = chunks.len();

        // `buffered` yields in submission order, so results line up with chunk indices
        let extractor = &self.extractor;
        let results: Vec<_> = stream::iter(chunks.into_iter().enumerate())
            .map(|(index, chunk)| async move { (index, extractor.extract_chunk(index, &chunk).await) })
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let mut partials = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (index, result) in results {
            match result {
                Ok(partial) => partials.push(partial),
                Err(e) => {
                    log::warn!("Skipping chunk {}: {}", index, e);
                    let attempts = match &e {
                        PapergraphError::ChunkExtraction { attempts, .. } => *attempts,
                        _ => 0,
                    };
                    failures.push(ChunkFailure {
                        chunk_index: index,
                        attempts,
                        error: e.to_string(),
                    });
                }
            }
        }

        let graph = consolidate(&partials);
        log::info!(
            "Extracted {} entities and {} relations from {}/{} chunks in {:?}",
            graph.entities().len(),
            graph.relations().len(),
            partials.len(),
            chunks_processed,
            start.elapsed()
        );

        GraphOutcome {
            graph,
            chunks_total,
            chunks_processed,
            failures,
            store: StoreStatus::Skipped,
        }
    }

    /// Run the graph pipeline and persist the result if a store is attached.
    pub async fn process_document(&self, text: &str) -> GraphOutcome {
        let mut outcome = self.extract_graph(text).await;

        outcome.store = match &self.store {
            None => StoreStatus::Skipped,
            Some(store) => match store.persist(&outcome.graph).await {
                Ok(summary) => {
                    log::info!(
                        "Persisted graph: {} new nodes, {} new edges",
                        summary.nodes_created,
                        summary.edges_created
                    );
                    StoreStatus::Persisted { summary }
                }
                Err(PapergraphError::StoreUnavailable(reason)) => {
                    log::warn!("Graph not persisted, store unavailable: {}", reason);
                    StoreStatus::Unavailable { reason }
                }
                Err(e) => {
                    log::warn!("Graph not persisted: {}", e);
                    StoreStatus::Failed { error: e.to_string() }
                }
            },
        };

        outcome
    }

    /// Graph pipeline and all narratives, run concurrently.
    pub async fn analyze(&self, text: &str) -> PaperAnalysis {
        let (graph, narratives) =
            tokio::join!(self.process_document(text), self.narratives.generate_all(text));
        PaperAnalysis { graph, narratives }
    }

    /// Release the store connection.
    pub fn shutdown(self) -> crate::Result<()> {
        match self.store {
            Some(store) => store.close(),
            None => Ok(()),
        }
    }
}
