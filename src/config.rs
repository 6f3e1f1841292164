use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub papergraph: PapergraphConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    /// File the configuration was read from, if any
    #[serde(skip)]
    source: Option<PathBuf>,
}

/// Storage and process-level settings
#[derive(Debug, Clone, Deserialize)]
pub struct PapergraphConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for PapergraphConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
        }
    }
}

/// Model provider configuration (any OpenAI-compatible chat endpoint)
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub temperature: f32,
    /// Deadline for a single model call, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: 0.0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Chunking and extraction policy knobs
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    /// Maximum chunk length in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Chunks beyond this count are not sent to the model
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles on each further attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Chunk extractions in flight at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_chunks: default_max_chunks(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("graph.db")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_model() -> String {
    "meta-llama/llama-3.1-8b-instruct".to_string()
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_chunk_size() -> usize {
    4000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_max_chunks() -> usize {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_concurrency() -> usize {
    4
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in PAPERGRAPH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    ///
    /// A missing ./config.toml falls back to defaults; an explicitly named
    /// file that cannot be read is an error.
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        // Runs before the logger exists; callers report `source()` afterwards
        let mut config = match std::env::var("PAPERGRAPH_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => {
                let path = PathBuf::from("config.toml");
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Config::default()
                }
            }
        };

        if let Ok(db_path) = std::env::var("GRAPH_DATABASE_PATH") {
            config.papergraph.db_path = PathBuf::from(db_path);
        }

        config.validate()?;

        Ok(config)
    }

    /// Parse a TOML config file without touching the environment.
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Config file that was loaded, or `None` when running on defaults
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Validate configuration values
    ///
    /// The API key is checked separately by [`Config::api_key`], so commands
    /// that only touch the store run without one.
    pub fn validate(&self) -> Result<()> {
        self.extraction.validate()?;

        if self.model.timeout_secs == 0 {
            anyhow::bail!("model.timeout_secs must be greater than 0");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.papergraph.db_path
    }

    /// Read the API key named by `model.api_key_env`.
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.model.api_key_env).with_context(|| {
            format!(
                "Environment variable {} not set. Set it in your .env file or as an environment variable with your model provider API key.",
                self.model.api_key_env
            )
        })
    }
}

impl ExtractionConfig {
    /// Validate numeric ranges
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            anyhow::bail!("extraction.chunk_size must be greater than 0");
        }

        if self.chunk_overlap >= self.chunk_size {
            anyhow::bail!("extraction.chunk_overlap must be less than chunk_size");
        }

        if self.max_chunks == 0 {
            anyhow::bail!("extraction.max_chunks must be greater than 0");
        }

        if self.max_attempts == 0 {
            anyhow::bail!("extraction.max_attempts must be greater than 0");
        }

        if self.concurrency == 0 {
            anyhow::bail!("extraction.concurrency must be greater than 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    const TEST_CONFIG: &str = r#"
[papergraph]
db_path = "./test.db"
log_level = "debug"

[model]
model = "test-model"
api_key_env = "PAPERGRAPH_TEST_KEY"
timeout_secs = 5

[extraction]
chunk_size = 1000
chunk_overlap = 100
max_chunks = 8
"#;

    fn with_config_env(config_path: &Path, api_key: Option<&str>, f: impl FnOnce()) {
        let original_config = std::env::var("PAPERGRAPH_CONFIG").ok();
        let original_key = std::env::var("PAPERGRAPH_TEST_KEY").ok();
        std::env::set_var("PAPERGRAPH_CONFIG", config_path.to_str().unwrap());
        match api_key {
            Some(k) => std::env::set_var("PAPERGRAPH_TEST_KEY", k),
            None => std::env::remove_var("PAPERGRAPH_TEST_KEY"),
        }
        f();
        std::env::remove_var("PAPERGRAPH_CONFIG");
        std::env::remove_var("PAPERGRAPH_TEST_KEY");
        if let Some(val) = original_config {
            std::env::set_var("PAPERGRAPH_CONFIG", val);
        }
        if let Some(val) = original_key {
            std::env::set_var("PAPERGRAPH_TEST_KEY", val);
        }
    }

    #[test]
    fn test_config_load_success() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, TEST_CONFIG).unwrap();
        with_config_env(&config_path, Some("test-key"), || {
            let config = Config::load();
            assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
            let config = config.unwrap();
            assert_eq!(config.api_key().unwrap(), "test-key");
            assert_eq!(config.source(), Some(config_path.as_path()));
            assert_eq!(config.papergraph.log_level, "debug");
            assert_eq!(config.model.model, "test-model");
            assert_eq!(config.extraction.chunk_size, 1000);
            assert_eq!(config.extraction.max_chunks, 8);
            // unspecified knobs fall back to defaults
            assert_eq!(config.extraction.max_attempts, 3);
            assert_eq!(config.model.base_url, "https://openrouter.ai/api/v1");
        });
    }

    #[test]
    fn test_config_missing_api_key() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, TEST_CONFIG).unwrap();
        with_config_env(&config_path, None, || {
            let config = Config::load().expect("store-only commands load without a key");
            let key = config.api_key();
            assert!(key.is_err(), "Expected missing API key error");
            assert!(key.unwrap_err().to_string().contains("PAPERGRAPH_TEST_KEY"));
        });
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let original = std::env::var("PAPERGRAPH_CONFIG").ok();
        std::env::set_var("PAPERGRAPH_CONFIG", "nonexistent.toml");
        let config = Config::load();
        assert!(config.is_err());
        std::env::remove_var("PAPERGRAPH_CONFIG");
        if let Some(v) = original {
            std::env::set_var("PAPERGRAPH_CONFIG", v);
        }
    }

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.source().is_none());
        assert_eq!(config.db_path(), Path::new("graph.db"));
        assert_eq!(config.model.api_key_env, "OPENROUTER_API_KEY");
        assert_eq!(config.model.temperature, 0.0);
        assert_eq!(config.extraction.max_chunks, 5);
        assert_eq!(config.extraction.max_attempts, 3);
        assert!(config.extraction.validate().is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let extraction = ExtractionConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..ExtractionConfig::default()
        };
        let err = extraction.validate().unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let extraction = ExtractionConfig {
            max_attempts: 0,
            ..ExtractionConfig::default()
        };
        assert!(extraction.validate().is_err());
    }
}
