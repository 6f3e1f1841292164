//! Model boundary: an opaque "send prompt, get text back" capability.

mod client;
mod types;

pub use client::ChatClient;
pub use types::ModelRequest;

use async_trait::async_trait;

use crate::error::Result;

/// Anything that can answer a [`ModelRequest`] with text.
///
/// Implementations make a single attempt; retrying and timeouts are
/// layered on by the extractor and narrative generators.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: &ModelRequest) -> Result<String>;

    /// Identifier used in log lines.
    fn name(&self) -> &str {
        "model"
    }
}
