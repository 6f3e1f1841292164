//! Whole-document narrative reports: key topics, hypotheses, future work.
//!
//! Each report is one model call over the full text. The three are
//! independent; a failure in one never affects the others.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{PapergraphError, Result};
use crate::extract::{with_retries, RetryPolicy};
use crate::llm::{ChatModel, ModelRequest};
use crate::prompts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeKind {
    KeyTopics,
    Hypotheses,
    FutureWork,
}

impl NarrativeKind {
    pub const ALL: [NarrativeKind; 3] = [
        NarrativeKind::KeyTopics,
        NarrativeKind::Hypotheses,
        NarrativeKind::FutureWork,
    ];

    /// Stable snake_case identifier, matching the serialized form.
    pub fn key(&self) -> &'static str {
        match self {
            NarrativeKind::KeyTopics => "key_topics",
            NarrativeKind::Hypotheses => "hypotheses",
            NarrativeKind::FutureWork => "future_work",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            NarrativeKind::KeyTopics => "Key Topics & Methods",
            NarrativeKind::Hypotheses => "Hypotheses & Ideas",
            NarrativeKind::FutureWork => "Future Work",
        }
    }

    fn system_prompt(&self) -> &'static str {
        match self {
            NarrativeKind::KeyTopics => prompts::KEY_TOPICS_SYSTEM,
            NarrativeKind::Hypotheses => prompts::HYPOTHESES_SYSTEM,
            NarrativeKind::FutureWork => prompts::FUTURE_WORK_SYSTEM,
        }
    }
}

impl fmt::Display for NarrativeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Outcome of all three generators.
#[derive(Debug)]
pub struct NarrativeReport {
    pub key_topics: Result<String>,
    pub hypotheses: Result<String>,
    pub future_work: Result<String>,
}

impl NarrativeReport {
    pub fn get(&self, kind: NarrativeKind) -> &Result<String> {
        match kind {
            NarrativeKind::KeyTopics => &self.key_topics,
            NarrativeKind::Hypotheses => &self.hypotheses,
            NarrativeKind::FutureWork => &self.future_work,
        }
    }

    /// Markdown for `kind`, or the error text in its place.
    pub fn render(&self, kind: NarrativeKind) -> String {
        match self.get(kind) {
            Ok(markdown) => markdown.clone(),
            Err(e) => format!("**Error generating {}:** {}", kind.title().to_lowercase(), e),
        }
    }

    pub fn failures(&self) -> Vec<NarrativeKind> {
        NarrativeKind::ALL
            .into_iter()
            .filter(|k| self.get(*k).is_err())
            .collect()
    }
}

/// Runs the narrative templates against a model.
#[derive(Clone)]
pub struct NarrativeGenerator {
    model: Arc<dyn ChatModel>,
    policy: RetryPolicy,
}

impl NarrativeGenerator {
    pub fn new(model: Arc<dyn ChatModel>, policy: RetryPolicy) -> Self {
        Self { model, policy }
    }

    /// Produce one report over the full document text.
    pub async fn generate(&self, kind: NarrativeKind, full_text: &str) -> Result<String> {
        if full_text.trim().is_empty() {
            return Err(PapergraphError::Generation("document text is empty".to_string()));
        }

        let request = ModelRequest::text(kind.system_prompt(), full_text);
        let model = &self.model;
        let request = &request;

        with_retries(self.policy, kind.title(), |_| async move {
            model.complete(request).await
        })
        .await
        .map_err(|failure| {
            log::warn!("{} generation failed: {}", kind.title(), failure.last_error);
            PapergraphError::Generation(failure.last_error.to_string())
        })
    }

    /// Run all three generators concurrently.
    pub async fn generate_all(&self, full_text: &str) -> NarrativeReport {
        let (key_topics, hypotheses, future_work) = tokio::join!(
            self.generate(NarrativeKind::KeyTopics, full_text),
            self.generate(NarrativeKind::Hypotheses, full_text),
            self.generate(NarrativeKind::FutureWork, full_text),
        );

        NarrativeReport {
            key_topics,
            hypotheses,
            future_work,
        }
    }
}
