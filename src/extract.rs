//! Extraction entry points and the chunk orchestrator.
//!
//! [`extract`] is the one call most callers need: PDF path in, merged
//! [`Extraction`] out. The other functions expose the same pipeline with
//! more detail ([`extract_detailed`]), from already-extracted page text
//! ([`extract_pages`]), from an in-memory buffer ([`extract_from_bytes`]),
//! or without an async runtime ([`extract_sync`]).
//!
//! ## Failure policy
//!
//! Malformed model output never fails a run; the reconciler turns it into an
//! all-"Unknown" record. A failed model *invocation* does: the first one
//! observed aborts the document with [`ExtractError::Invocation`], and chunks
//! still in flight are abandoned.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::output::{Extraction, ExtractionOutput, ExtractionStats, Hints};
use crate::pipeline::chunk::chunk_pages;
use crate::pipeline::document::{needs_ocr, read_document};
use crate::pipeline::hints::compute_hints;
use crate::pipeline::invoke::{extract_chunk, resolve_backend, ModelBackend};
use crate::pipeline::merge::{apply_author_hints, merge_extractions};
use crate::pipeline::reconcile::{ReconcileStage, Reconciled};
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract metadata from the PDF at `path`.
///
/// # Example
/// ```rust,no_run
/// use paper_extract::{extract, ExtractionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ExtractionConfig::from_env();
/// let record = extract("paper.pdf", &config).await?;
/// println!("{} ({})", record.document_type, record.date);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// - the file is missing, unreadable, not a PDF, encrypted, or corrupt
/// - pdfium cannot be loaded
/// - any chunk's model invocation fails
pub async fn extract(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<Extraction, ExtractError> {
    Ok(extract_detailed(path, config).await?.extraction)
}

/// Like [`extract`], but also returns the hints and run statistics.
pub async fn extract_detailed(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let total_start = Instant::now();
    let path = path.as_ref();
    info!("Starting extraction: {}", path.display());

    let read_start = Instant::now();
    let document = read_document(
        path,
        config.password.as_deref(),
        config.scanned_threshold_chars,
    )
    .await?;
    let read_duration_ms = read_start.elapsed().as_millis() as u64;
    debug!(
        "Read {} text pages ({} in file) in {}ms",
        document.pages.len(),
        document.raw_page_count,
        read_duration_ms
    );

    let mut output = run_pipeline(&document.pages, document.likely_scanned, config).await?;
    output.stats.read_duration_ms = read_duration_ms;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    Ok(output)
}

/// Run the pipeline on page texts that were extracted elsewhere.
///
/// Pages are used as given: no trimming and no dropping of empty pages.
pub async fn extract_pages<S>(
    pages: &[S],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError>
where
    S: AsRef<str> + Sync,
{
    let likely_scanned = needs_ocr(pages, config.scanned_threshold_chars);
    run_pipeline(pages, likely_scanned, config).await
}

/// Extract metadata from PDF bytes held in memory.
///
/// The bytes are written to a managed [`tempfile`] that is removed when this
/// function returns.
pub async fn extract_from_bytes(
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let mut tmp = tempfile::NamedTempFile::new()
        .map_err(|e| ExtractError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| ExtractError::Internal(format!("tempfile write: {e}")))?;
    extract_detailed(tmp.path(), config).await
}

/// Synchronous wrapper around [`extract_detailed`].
///
/// Creates a temporary tokio runtime internally; do not call from inside
/// an async context.
pub fn extract_sync(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(extract_detailed(path, config))
}

// ── Orchestration ────────────────────────────────────────────────────────

async fn run_pipeline<S>(
    pages: &[S],
    likely_scanned: bool,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError>
where
    S: AsRef<str> + Sync,
{
    let start = Instant::now();

    if likely_scanned {
        warn!("PDF looks text-light (possibly scanned); OCR is not available");
    }
    info!("Pages detected: {}", pages.len());

    let hints = compute_hints(pages);
    debug!(
        "Hints: title={:?}, {} author guess(es)",
        hints.title,
        hints.authors.len()
    );

    let mut chunks = chunk_pages(pages, config.chunk_target_chars);
    let total_chunks = chunks.len();
    if config.max_chunks > 0 && chunks.len() > config.max_chunks {
        debug!(
            "Dropping {} trailing chunk(s) (max_chunks = {})",
            chunks.len() - config.max_chunks,
            config.max_chunks
        );
        chunks.truncate(config.max_chunks);
    }
    info!(
        "Chunked into {} chunk(s) (~{} chars target each)",
        chunks.len(),
        config.chunk_target_chars
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(chunks.len());
    }

    let backend = resolve_backend(config);
    let llm_start = Instant::now();
    let results = dispatch_chunks(&backend, &chunks, &hints, config).await?;
    let llm_duration_ms = llm_start.elapsed().as_millis() as u64;

    let fallback_chunks = results
        .iter()
        .filter(|r| r.stage == ReconcileStage::Fallback)
        .count();
    let parts: Vec<Extraction> = results.into_iter().map(|r| r.extraction).collect();

    let mut extraction = merge_extractions(&parts);
    if apply_author_hints(&mut extraction, &hints.authors) {
        debug!("Model returned no authors; using heuristic guesses");
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(chunks.len());
    }

    let stats = ExtractionStats {
        page_count: pages.len(),
        total_chunks,
        processed_chunks: chunks.len(),
        fallback_chunks,
        likely_scanned,
        read_duration_ms: 0,
        llm_duration_ms,
        total_duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Extraction complete: {} chunk(s), {} fallback, {}ms",
        stats.processed_chunks, stats.fallback_chunks, stats.total_duration_ms
    );

    Ok(ExtractionOutput {
        extraction,
        hints,
        stats,
    })
}

/// Run every chunk through the model with at most `max_concurrency` calls
/// in flight. Results come back in chunk order regardless of completion
/// order.
async fn dispatch_chunks(
    backend: &Arc<dyn ModelBackend>,
    chunks: &[String],
    hints: &Hints,
    config: &ExtractionConfig,
) -> Result<Vec<Reconciled>, ExtractError> {
    let total = chunks.len();
    let completed = AtomicUsize::new(0);
    let completed = &completed;

    let mut in_flight = stream::iter(chunks.iter().enumerate().map(move |(idx, chunk)| {
        let backend = Arc::clone(backend);
        async move {
            let chunk_num = idx + 1;
            if let Some(ref cb) = config.progress_callback {
                cb.on_chunk_start(chunk_num, total);
            }

            let result =
                extract_chunk(backend.as_ref(), chunk, hints, config.max_prompt_chars).await;

            match &result {
                Ok(_) => {
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    info!("Completed chunk {}/{}", done, total);
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_chunk_complete(chunk_num, done, total);
                    }
                }
                Err(e) => {
                    warn!("Chunk {}/{}: model invocation failed: {}", chunk_num, total, e);
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_chunk_error(chunk_num, total, &e.to_string());
                    }
                }
            }
            (idx, result)
        }
    }))
    .buffer_unordered(config.max_concurrency.max(1));

    let mut slots: Vec<Option<Reconciled>> = vec![None; total];
    while let Some((idx, result)) = in_flight.next().await {
        let reconciled = result.map_err(|source| ExtractError::Invocation {
            chunk: idx + 1,
            total,
            source,
        })?;
        if reconciled.stage == ReconcileStage::Fallback {
            warn!(
                "Chunk {}/{}: reply could not be parsed; using Unknown record",
                idx + 1,
                total
            );
        }
        slots[idx] = Some(reconciled);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(idx, slot)| {
            slot.ok_or_else(|| ExtractError::Internal(format!("chunk {} produced no result", idx + 1)))
        })
        .collect()
}
