//! Configuration for metadata extraction.
//!
//! All pipeline behaviour is controlled through [`ExtractionConfig`], built
//! via [`ExtractionConfigBuilder`] or read from the environment with
//! [`ExtractionConfig::from_env`]. Nothing in the library reads environment
//! variables after construction; the config struct is passed into every
//! stage explicitly.

use crate::error::ExtractError;
use crate::pipeline::invoke::ModelBackend;
use crate::progress::ProgressCallback;
use std::fmt;
use std::sync::Arc;

/// Environment variable overriding [`ExtractionConfig::chunk_target_chars`].
pub const ENV_CHUNK_TARGET: &str = "DOC_CHUNK_TARGET";
/// Environment variable overriding [`ExtractionConfig::max_concurrency`].
pub const ENV_CONCURRENCY: &str = "DOC_CONCURRENCY";
/// Environment variable overriding [`ExtractionConfig::max_chunks`].
pub const ENV_MAX_CHUNKS: &str = "DOC_MAX_CHUNKS";
/// Environment variable overriding [`ExtractionConfig::model_id`].
pub const ENV_MODEL: &str = "OLLAMA_MODEL";

pub const DEFAULT_CHUNK_TARGET: usize = 9000;
pub const DEFAULT_CONCURRENCY: usize = 3;
pub const DEFAULT_MODEL: &str = "mistral";
pub const DEFAULT_COMMAND: &str = "ollama";
pub const DEFAULT_MAX_PROMPT_CHARS: usize = 9000;
pub const DEFAULT_SCANNED_THRESHOLD: usize = 600;

/// Configuration for a metadata extraction run.
///
/// # Example
/// ```rust
/// use paper_extract::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .chunk_target_chars(6000)
///     .max_concurrency(2)
///     .model_id("llama3.1")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_concurrency, 2);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Soft character budget per chunk. Default: 9000.
    ///
    /// Pages are never split, so a single page longer than this still
    /// becomes one (oversized) chunk.
    pub chunk_target_chars: usize,

    /// Maximum model invocations in flight at once. Default: 3.
    ///
    /// Each invocation is a separate `ollama run` process holding the model
    /// in memory, so this bounds process count, not just request rate.
    pub max_concurrency: usize,

    /// Keep only the first N chunks; 0 means no limit. Default: 0.
    pub max_chunks: usize,

    /// Model identifier passed to the runner. Default: "mistral".
    pub model_id: String,

    /// Executable invoked as `<model_command> run <model_id>`. Default: "ollama".
    pub model_command: String,

    /// Hard cap on chunk text included in a prompt. Default: 9000.
    pub max_prompt_chars: usize,

    /// Average characters per page below which the PDF is reported as
    /// probably scanned. Default: 600.
    pub scanned_threshold_chars: usize,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Pre-constructed backend. Takes precedence over `model_command`.
    pub backend: Option<Arc<dyn ModelBackend>>,

    /// Receives per-chunk progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            chunk_target_chars: DEFAULT_CHUNK_TARGET,
            max_concurrency: DEFAULT_CONCURRENCY,
            max_chunks: 0,
            model_id: DEFAULT_MODEL.to_string(),
            model_command: DEFAULT_COMMAND.to_string(),
            max_prompt_chars: DEFAULT_MAX_PROMPT_CHARS,
            scanned_threshold_chars: DEFAULT_SCANNED_THRESHOLD,
            password: None,
            backend: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("chunk_target_chars", &self.chunk_target_chars)
            .field("max_concurrency", &self.max_concurrency)
            .field("max_chunks", &self.max_chunks)
            .field("model_id", &self.model_id)
            .field("model_command", &self.model_command)
            .field("max_prompt_chars", &self.max_prompt_chars)
            .field("scanned_threshold_chars", &self.scanned_threshold_chars)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("backend", &self.backend.as_ref().map(|_| "<dyn ModelBackend>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Defaults overlaid with `DOC_CHUNK_TARGET`, `DOC_CONCURRENCY`,
    /// `DOC_MAX_CHUNKS` and `OLLAMA_MODEL`.
    ///
    /// Unset, empty, or unparsable values keep the default. Zero keeps the
    /// default for the chunk target and concurrency.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let positive = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|&n| n > 0)
        };

        let mut config = Self::default();
        if let Some(n) = positive(ENV_CHUNK_TARGET) {
            config.chunk_target_chars = n;
        }
        if let Some(n) = positive(ENV_CONCURRENCY) {
            config.max_concurrency = n;
        }
        if let Some(n) = positive(ENV_MAX_CHUNKS) {
            config.max_chunks = n;
        }
        if let Some(model) = lookup(ENV_MODEL).filter(|m| !m.trim().is_empty()) {
            config.model_id = model.trim().to_string();
        }
        config
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn chunk_target_chars(mut self, n: usize) -> Self {
        self.config.chunk_target_chars = n.max(1);
        self
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.config.max_concurrency = n.max(1);
        self
    }

    pub fn max_chunks(mut self, n: usize) -> Self {
        self.config.max_chunks = n;
        self
    }

    pub fn model_id(mut self, model: impl Into<String>) -> Self {
        self.config.model_id = model.into();
        self
    }

    pub fn model_command(mut self, program: impl Into<String>) -> Self {
        self.config.model_command = program.into();
        self
    }

    pub fn max_prompt_chars(mut self, n: usize) -> Self {
        self.config.max_prompt_chars = n.max(1);
        self
    }

    pub fn scanned_threshold_chars(mut self, n: usize) -> Self {
        self.config.scanned_threshold_chars = n;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn ModelBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.model_id.trim().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "Model identifier must not be empty".into(),
            ));
        }
        if c.backend.is_none() && c.model_command.trim().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "Model command must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
