//! Per-chunk entity and relation extraction.

mod parse;
mod retry;

pub use parse::parse_partial_graph;
pub use retry::{with_retries, RetryFailure, RetryPolicy};

use std::sync::Arc;

use crate::error::{PapergraphError, Result};
use crate::graph::PartialGraph;
use crate::llm::{ChatModel, ModelRequest};
use crate::prompts;

/// Turns one chunk of text into a [`PartialGraph`] via the model.
#[derive(Clone)]
pub struct Extractor {
    model: Arc<dyn ChatModel>,
    policy: RetryPolicy,
}

impl Extractor {
    pub fn new(model: Arc<dyn ChatModel>, policy: RetryPolicy) -> Self {
        Self { model, policy }
    }

    /// Extract a single chunk.
    pub async fn extract(&self, chunk: &str) -> Result<PartialGraph> {
        self.extract_chunk(0, chunk).await
    }

    /// Extract chunk number `chunk_index`, retrying transport, timeout and
    /// parse failures up to the policy's attempt budget.
    ///
    /// Exhausted or terminal failures come back as
    /// [`PapergraphError::ChunkExtraction`].
    pub async fn extract_chunk(&self, chunk_index: usize, chunk: &str) -> Result<PartialGraph> {
        let request = ModelRequest::structured(
            prompts::extraction_system(),
            prompts::extraction_user(chunk),
            prompts::extraction_schema(),
        );
        let label = format!("chunk {}", chunk_index);
        let model = &self.model;
        let request = &request;

        let outcome = with_retries(self.policy, &label, |_| async move {
            let raw = model.complete(request).await?;
            parse_partial_graph(&raw)
        })
        .await;

        match outcome {
            Ok(partial) => {
                log::debug!(
                    "Chunk {}: {} entities, {} relations from {}",
                    chunk_index,
                    partial.entities.len(),
                    partial.relations.len(),
                    self.model.name()
                );
                Ok(partial)
            }
            Err(RetryFailure {
                attempts,
                last_error,
            }) => Err(PapergraphError::ChunkExtraction {
                chunk_index,
                attempts,
                message: last_error.to_string(),
            }),
        }
    }
}
