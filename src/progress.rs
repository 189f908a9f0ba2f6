//! Progress-callback trait for per-chunk extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through a document's chunks.
//!
//! Chunks run concurrently, so `on_chunk_start` and `on_chunk_complete` may
//! arrive from different tasks in any order. The `completed` count passed to
//! `on_chunk_complete` comes from a single atomic counter and is therefore
//! strictly increasing even when chunk indices are not.
//!
//! # Example
//!
//! ```rust
//! use paper_extract::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::Arc;
//!
//! struct PrintingCallback;
//!
//! impl ExtractionProgressCallback for PrintingCallback {
//!     fn on_chunk_complete(&self, _chunk: usize, completed: usize, total: usize) {
//!         eprintln!("chunk {completed}/{total} done");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(PrintingCallback))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it dispatches and completes chunks.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once after chunking, before any model call.
    ///
    /// # Arguments
    /// * `total_chunks` — chunks that will be sent to the model
    fn on_extraction_start(&self, total_chunks: usize) {
        let _ = total_chunks;
    }

    /// Called when a chunk acquires a concurrency slot.
    ///
    /// # Arguments
    /// * `chunk` — 1-indexed chunk number
    /// * `total` — total chunks
    fn on_chunk_start(&self, chunk: usize, total: usize) {
        let _ = (chunk, total);
    }

    /// Called when a chunk's reply has been reconciled.
    ///
    /// # Arguments
    /// * `chunk`     — 1-indexed chunk number
    /// * `completed` — chunks finished so far, including this one
    /// * `total`     — total chunks
    fn on_chunk_complete(&self, chunk: usize, completed: usize, total: usize) {
        let _ = (chunk, completed, total);
    }

    /// Called when a chunk's model invocation fails. The run aborts afterwards.
    fn on_chunk_error(&self, chunk: usize, total: usize, error: &str) {
        let _ = (chunk, total, error);
    }

    /// Called once after all chunks are merged.
    fn on_extraction_complete(&self, total_chunks: usize) {
        let _ = total_chunks;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        started_total: AtomicUsize,
        starts: AtomicUsize,
        last_completed: AtomicUsize,
        errors: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_extraction_start(&self, total_chunks: usize) {
            self.started_total.store(total_chunks, Ordering::SeqCst);
        }

        fn on_chunk_start(&self, _chunk: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_chunk_complete(&self, _chunk: usize, completed: usize, _total: usize) {
            self.last_completed.store(completed, Ordering::SeqCst);
        }

        fn on_chunk_error(&self, _chunk: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_extraction_start(3);
        cb.on_chunk_start(1, 3);
        cb.on_chunk_complete(1, 1, 3);
        cb.on_chunk_error(2, 3, "boom");
        cb.on_extraction_complete(3);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_extraction_start(2);
        tracker.on_chunk_start(2, 2);
        tracker.on_chunk_start(1, 2);
        tracker.on_chunk_complete(2, 1, 2);
        tracker.on_chunk_complete(1, 2, 2);

        assert_eq!(tracker.started_total.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.last_completed.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_extraction_start(1);
        cb.on_chunk_complete(1, 1, 1);
    }
}
