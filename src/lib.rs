//! # paper-extract
//!
//! Extract structured metadata from scientific PDFs with a locally hosted
//! large language model.
//!
//! Given a paper, the crate returns one [`Extraction`]: document type,
//! authors, date, and four short summaries (content, methods, findings,
//! conclusions). Fields the model cannot determine hold the sentinel
//! `"Unknown"` rather than being empty.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Read     per-page text layer via pdfium (spawn_blocking)
//!  ├─ 2. Hints    heuristic title / author guesses from the first pages
//!  ├─ 3. Chunk    whole pages packed under a character budget
//!  ├─ 4. Invoke   one model call per chunk, N in flight (default 3)
//!  ├─ 5. Repair   tolerant JSON parsing, alias mapping, validation
//!  └─ 6. Merge    per-field precedence rules → one record
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paper_extract::{extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // `ollama run mistral` by default; OLLAMA_MODEL, DOC_CHUNK_TARGET,
//!     // DOC_CONCURRENCY and DOC_MAX_CHUNKS override the defaults.
//!     let config = ExtractionConfig::from_env();
//!     let record = extract("paper.pdf", &config).await?;
//!     println!("{}: {}", record.document_type, record.authors.join(", "));
//!     Ok(())
//! }
//! ```
//!
//! ## Backends
//!
//! The pipeline talks to the model through [`ModelBackend`]. The default
//! [`CommandBackend`] spawns `ollama run <model>` per chunk;
//! [`ProviderBackend`] calls any `edgequake-llm` provider in-process. Tests
//! and embedders can supply their own implementation through
//! [`ExtractionConfigBuilder::backend`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `paper-extract` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ```toml
//! paper-extract = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{ExtractError, InvocationError};
pub use extract::{extract, extract_detailed, extract_from_bytes, extract_pages, extract_sync};
pub use normalize::{
    normalize_result, EnvelopeStatus, ExtractionEnvelope, NormalizedResult, NormalizedSection,
    SectionId,
};
pub use output::{Extraction, ExtractionOutput, ExtractionStats, Hints, UNKNOWN};
pub use pipeline::invoke::{CommandBackend, ModelBackend, ProviderBackend};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
