//! End-to-end tests for paper-extract.
//!
//! Most tests drive the public pipeline with scripted in-process backends,
//! so they need neither pdfium nor a model. Tests against a real PDF and a
//! real `ollama` install are gated behind the `E2E_ENABLED` environment
//! variable and the presence of files in `./test_cases/`.
//!
//! Run the live tests with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=./libpdfium.so cargo test --test e2e -- --nocapture

use async_trait::async_trait;
use paper_extract::{
    extract_detailed, extract_from_bytes, extract_pages, extract_sync, CommandBackend,
    ExtractError, ExtractionConfig, ExtractionEnvelope, ExtractionProgressCallback,
    InvocationError, ModelBackend, UNKNOWN,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

/// Install a `RUST_LOG`-driven subscriber for live runs. Safe to call from
/// every test.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Extract the `PAGE i / N` number of the first page in a prompt's chunk.
fn first_page_in(prompt: &str) -> Option<usize> {
    let at = prompt.find("===== PAGE ")? + "===== PAGE ".len();
    prompt[at..].split_whitespace().next()?.parse().ok()
}

fn config_with(backend: Arc<dyn ModelBackend>) -> ExtractionConfig {
    ExtractionConfig::builder()
        .backend(backend)
        .build()
        .expect("valid config")
}

/// Replies with a fixed string and records every prompt.
struct FixedReply {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl FixedReply {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ModelBackend for FixedReply {
    async fn invoke(&self, prompt: &str) -> Result<String, InvocationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

/// One JSON reply per page, delayed so later chunks finish first.
struct ReversedLatency {
    total: usize,
}

#[async_trait]
impl ModelBackend for ReversedLatency {
    async fn invoke(&self, prompt: &str) -> Result<String, InvocationError> {
        let page = first_page_in(prompt).unwrap_or(0);
        let delay = (self.total + 1 - page) as u64 * 15;
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(format!(
            r#"{{"documentType":"Type {page}","authors":["Author {page}"],"date":"Unknown","contentSummary":"Summary of page {page}."}}"#
        ))
    }
}

/// Tracks the peak number of concurrent invocations.
#[derive(Default)]
struct ConcurrencyProbe {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl ModelBackend for ConcurrencyProbe {
    async fn invoke(&self, _prompt: &str) -> Result<String, InvocationError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("{}".to_string())
    }
}

/// Fails the chunk starting at `bad_page`.
struct FailsOnPage {
    bad_page: usize,
}

#[async_trait]
impl ModelBackend for FailsOnPage {
    async fn invoke(&self, prompt: &str) -> Result<String, InvocationError> {
        if first_page_in(prompt) == Some(self.bad_page) {
            return Err(InvocationError::NonZeroExit {
                program: "ollama".into(),
                code: Some(1),
                stderr: "Error: model 'mistral' not found".into(),
            });
        }
        Ok("{}".to_string())
    }
}

#[derive(Default)]
struct RecordingCallback {
    started_with: AtomicUsize,
    chunk_starts: AtomicUsize,
    completions: Mutex<Vec<usize>>,
    errors: Mutex<Vec<(usize, String)>>,
    finished_with: AtomicUsize,
}

impl ExtractionProgressCallback for RecordingCallback {
    fn on_extraction_start(&self, total_chunks: usize) {
        self.started_with.store(total_chunks, Ordering::SeqCst);
    }
    fn on_chunk_start(&self, _chunk: usize, _total: usize) {
        self.chunk_starts.fetch_add(1, Ordering::SeqCst);
    }
    fn on_chunk_complete(&self, _chunk: usize, completed: usize, _total: usize) {
        self.completions.lock().unwrap().push(completed);
    }
    fn on_chunk_error(&self, chunk: usize, _total: usize, error: &str) {
        self.errors.lock().unwrap().push((chunk, error.to_string()));
    }
    fn on_extraction_complete(&self, total_chunks: usize) {
        self.finished_with.store(total_chunks, Ordering::SeqCst);
    }
}

// ── Pipeline behaviour (scripted backends) ──────────────────────────────────

#[tokio::test]
async fn test_zero_pages_dispatch_one_empty_chunk() {
    let backend = FixedReply::new("");
    let pages: Vec<String> = Vec::new();

    let out = extract_pages(&pages, &config_with(backend.clone()))
        .await
        .expect("zero pages must not fail");

    let prompts = backend.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1, "exactly one chunk is dispatched");
    assert!(prompts[0].ends_with("DOCUMENT CHUNK:\n"));
    assert!(out.extraction.is_unknown());
    assert_eq!(out.stats.total_chunks, 1);
    assert_eq!(out.stats.fallback_chunks, 1);
    assert!(out.stats.likely_scanned);
}

#[tokio::test]
async fn test_json_embedded_in_prose_is_recovered() {
    let backend = FixedReply::new(
        "Here you go: {\"documentType\":\"Review\",\"authors\":[\"Jane Smith\"],\
         \"date\":\"2021\",\"contentSummary\":\"Reviews sleep research.\"} Hope this helps!",
    );
    let out = extract_pages(&["Some page text"], &config_with(backend))
        .await
        .unwrap();

    assert_eq!(out.extraction.document_type, "Review");
    assert_eq!(out.extraction.authors, vec!["Jane Smith"]);
    assert_eq!(out.extraction.date, "2021");
    assert_eq!(out.extraction.content_summary, "Reviews sleep research.");
    assert_eq!(out.extraction.methods_summary, UNKNOWN);
    assert_eq!(out.stats.fallback_chunks, 0);
}

#[tokio::test]
async fn test_merge_follows_chunk_order_not_completion_order() {
    let pages: Vec<String> = (1..=5).map(|i| format!("text of page {i}")).collect();
    let config = ExtractionConfig::builder()
        .backend(Arc::new(ReversedLatency { total: 5 }))
        .chunk_target_chars(1)
        .max_concurrency(5)
        .build()
        .unwrap();

    let out = extract_pages(&pages, &config).await.unwrap();

    assert_eq!(out.extraction.document_type, "Type 1");
    assert_eq!(
        out.extraction.authors,
        vec!["Author 1", "Author 2", "Author 3", "Author 4", "Author 5"]
    );
    assert!(out
        .extraction
        .content_summary
        .starts_with("Summary of page 1. Summary of page 2."));
}

#[tokio::test]
async fn test_concurrency_cap_is_respected() {
    let probe = Arc::new(ConcurrencyProbe::default());
    let pages: Vec<String> = (0..10).map(|i| format!("page {i}")).collect();
    let config = ExtractionConfig::builder()
        .backend(probe.clone())
        .chunk_target_chars(1)
        .max_concurrency(3)
        .build()
        .unwrap();

    extract_pages(&pages, &config).await.unwrap();

    assert_eq!(probe.calls.load(Ordering::SeqCst), 10, "every chunk is scheduled");
    let peak = probe.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak concurrency {peak} exceeded the cap");
    assert!(peak >= 2, "chunks should overlap, peak was {peak}");
}

#[tokio::test]
async fn test_invocation_failure_aborts_document() {
    let cb = Arc::new(RecordingCallback::default());
    let pages: Vec<String> = (0..4).map(|i| format!("page {i}")).collect();
    let config = ExtractionConfig::builder()
        .backend(Arc::new(FailsOnPage { bad_page: 2 }))
        .chunk_target_chars(1)
        .max_concurrency(1)
        .progress_callback(cb.clone())
        .build()
        .unwrap();

    let err = extract_pages(&pages, &config).await.unwrap_err();
    match &err {
        ExtractError::Invocation { chunk, total, source } => {
            assert_eq!(*chunk, 2);
            assert_eq!(*total, 4);
            assert_eq!(source.to_string(), "Error: model 'mistral' not found");
        }
        other => panic!("expected Invocation error, got {other:?}"),
    }

    let errors = cb.errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, 2);
    assert_eq!(cb.finished_with.load(Ordering::SeqCst), 0, "run never completes");
}

#[tokio::test]
async fn test_progress_events_cover_every_chunk() {
    let cb = Arc::new(RecordingCallback::default());
    let pages: Vec<String> = (0..6).map(|i| format!("page {i}")).collect();
    let config = ExtractionConfig::builder()
        .backend(FixedReply::new("{}"))
        .chunk_target_chars(1)
        .max_chunks(4)
        .max_concurrency(2)
        .progress_callback(cb.clone())
        .build()
        .unwrap();

    let out = extract_pages(&pages, &config).await.unwrap();

    assert_eq!(out.stats.total_chunks, 6);
    assert_eq!(out.stats.processed_chunks, 4);
    assert_eq!(cb.started_with.load(Ordering::SeqCst), 4);
    assert_eq!(cb.chunk_starts.load(Ordering::SeqCst), 4);
    assert_eq!(*cb.completions.lock().unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(cb.finished_with.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_title_hint_comes_from_page_one_when_abstract_on_page_two() {
    let backend = FixedReply::new(r#"{"documentType":"Research Article"}"#);
    let pages = [
        "Circadian disruption and working memory in shift nurses\nAuthors: Maria K. Lopez1, John Van Buren2*",
        "Abstract\nWe followed 120 nurses across rotating shifts for a year.",
        "Introduction\nShift work is common in healthcare settings worldwide.",
    ];

    let out = extract_pages(&pages, &config_with(backend.clone()))
        .await
        .unwrap();

    assert_eq!(
        out.hints.title.as_deref(),
        Some("Circadian disruption and working memory in shift nurses")
    );
    // The model returned no authors, so the heuristic guesses are used.
    assert_eq!(
        out.extraction.authors,
        vec!["Maria K. Lopez", "John Van Buren"]
    );
    let prompts = backend.prompts.lock().unwrap();
    assert!(prompts[0].contains("Possible Title: Circadian disruption and working memory"));
}

#[tokio::test]
async fn test_model_authors_take_precedence_over_hints() {
    let backend = FixedReply::new(r#"{"authors":"Wei Zhang; Ada Lovelace"}"#);
    let out = extract_pages(&["A Paper Title Here\nBy: Jane Smith"], &config_with(backend))
        .await
        .unwrap();
    assert_eq!(out.hints.authors, vec!["Jane Smith"]);
    assert_eq!(out.extraction.authors, vec!["Wei Zhang", "Ada Lovelace"]);
}

#[tokio::test]
async fn test_envelope_from_pipeline_result() {
    let backend = FixedReply::new(
        r#"{"documentType":"RCT","findingsSummary":"Drug A beat placebo. Effects lasted 6 months."}"#,
    );
    let out = extract_pages(&["trial text"], &config_with(backend)).await.unwrap();
    let envelope = ExtractionEnvelope::from(Ok(out.extraction));
    let json = serde_json::to_value(&envelope).unwrap();

    assert_eq!(json["status"], "success");
    assert_eq!(json["raw"]["documentType"], "RCT");
    assert_eq!(
        json["normalized"]["sections"][2]["bullets"],
        serde_json::json!(["Drug A beat placebo.", "Effects lasted 6 months."])
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_command_backend_drives_pipeline() {
    let backend = CommandBackend::new(
        "sh",
        [
            "-c",
            r#"cat >/dev/null; printf '%s\n' 'Sure: {"documentType":"Case Report","date":"2018"}'"#,
        ],
    );
    let config = config_with(Arc::new(backend));
    let out = extract_pages(&["a case", "another page"], &config)
        .await
        .unwrap();
    assert_eq!(out.extraction.document_type, "Case Report");
    assert_eq!(out.extraction.date, "2018");
}

#[cfg(unix)]
#[tokio::test]
async fn test_missing_model_runner_fails_with_spawn_error() {
    let config = ExtractionConfig::builder()
        .model_command("paper-extract-no-such-runner")
        .build()
        .unwrap();
    let err = extract_pages(&["text"], &config).await.unwrap_err();
    assert!(
        matches!(
            err,
            ExtractError::Invocation {
                source: InvocationError::Spawn { .. },
                ..
            }
        ),
        "got {err:?}"
    );
}

// ── Input validation (no pdfium needed) ─────────────────────────────────────

#[tokio::test]
async fn test_nonexistent_file() {
    let backend = FixedReply::new("{}");
    let err = extract_detailed("/tmp/does-not-exist-paper-extract.pdf", &config_with(backend))
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::FileNotFound { .. }));
}

#[tokio::test]
async fn test_bytes_without_pdf_magic() {
    let backend = FixedReply::new("{}");
    let result = extract_from_bytes(b"GIF89a not a pdf", &config_with(backend)).await;
    tokio_test::assert_err!(result);
}

#[test]
fn test_extract_sync_reports_missing_file() {
    let backend = FixedReply::new("{}");
    let err = extract_sync("/tmp/missing-paper-extract.pdf", &config_with(backend)).unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn test_extract_pages_under_block_on() {
    let backend = FixedReply::new(r#"{"date":"1999"}"#);
    let config = config_with(backend);
    let out = tokio_test::block_on(extract_pages(&["page"], &config));
    let out = tokio_test::assert_ok!(out);
    assert_eq!(out.extraction.date, "1999");
}

#[test]
fn test_config_from_env_defaults_are_sane() {
    let config = ExtractionConfig::from_env();
    assert!(config.chunk_target_chars > 0);
    assert!(config.max_concurrency > 0);
    assert!(!config.model_id.is_empty());
}

// ── Live tests (real PDF + real ollama) ─────────────────────────────────────

#[tokio::test]
async fn test_live_extract_sample_paper() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample_paper.pdf"));
    init_tracing();

    let config = ExtractionConfig::from_env();
    let out = extract_detailed(&path, &config)
        .await
        .expect("live extraction should succeed");

    assert!(out.stats.page_count > 0, "sample paper has a text layer");
    assert!(!out.stats.likely_scanned);
    assert!(!out.extraction.document_type.is_empty());
    assert!(!out.extraction.content_summary.is_empty());

    println!(
        "[live] {} pages, {} chunks ({} fallback), {}ms\n{}",
        out.stats.page_count,
        out.stats.processed_chunks,
        out.stats.fallback_chunks,
        out.stats.total_duration_ms,
        serde_json::to_string_pretty(&out.extraction).unwrap()
    );
}

#[tokio::test]
async fn test_live_extract_from_bytes_first_chunk_only() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample_paper.pdf"));
    init_tracing();
    let bytes = std::fs::read(&path).expect("read PDF bytes");

    let config = ExtractionConfig::builder()
        .max_chunks(1)
        .model_id(std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "mistral".into()))
        .build()
        .expect("valid config");

    let out = extract_from_bytes(&bytes, &config)
        .await
        .expect("extract_from_bytes should succeed");
    assert_eq!(out.stats.processed_chunks, 1);
}
