use thiserror::Error;

/// Main error type for papergraph
#[derive(Error, Debug)]
pub enum PapergraphError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport or HTTP-level failure talking to the model provider
    #[error("Model API error: {0}")]
    Model(String),

    /// The provider refused the request; repeating it cannot succeed
    #[error("Model API rejected request ({status}): {message}")]
    ModelRejected { status: u16, message: String },

    /// A single model call exceeded its deadline
    #[error("Model call timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Model output did not match the expected schema
    #[error("Parse error: {0}")]
    Parse(String),

    /// A chunk exhausted its attempt budget
    #[error("Extraction failed for chunk {chunk_index} after {attempts} attempt(s): {message}")]
    ChunkExtraction {
        chunk_index: usize,
        attempts: u32,
        message: String,
    },

    /// The persistent store could not be reached; the operation was skipped
    #[error("Graph store unavailable: {0}")]
    StoreUnavailable(String),

    /// A narrative report could not be produced
    #[error("Generation error: {0}")]
    Generation(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PapergraphError {
    /// Whether another attempt at the same model call could succeed.
    ///
    /// Transport failures, server errors, rate limits, timeouts and
    /// malformed output are retryable. Rejected requests, configuration and
    /// input errors are terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PapergraphError::Model(_) | PapergraphError::Timeout(_) | PapergraphError::Parse(_)
        )
    }
}

/// Convenient Result type using PapergraphError
pub type Result<T> = std::result::Result<T, PapergraphError>;
