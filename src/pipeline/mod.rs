//! Pipeline stages for metadata extraction.
//!
//! Each submodule implements one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! document ──▶ hints ──▶ chunk ──▶ invoke ──▶ reconcile ──▶ merge
//!  (pdfium)   (regex)   (pages)   (model)    (JSON fixup)  (per field)
//! ```
//!
//! 1. [`document`]  read per-page text; runs in `spawn_blocking` because
//!    pdfium is a blocking C library
//! 2. [`hints`]     guess a title and authors from the first pages
//! 3. [`chunk`]     pack whole pages into chunks under a character budget
//! 4. [`invoke`]    build the prompt and call the model, one call per chunk;
//!    the only stage that talks to another process
//! 5. [`reconcile`] turn each reply into a valid record, never failing
//! 6. [`merge`]     fold the per-chunk records into one

pub mod chunk;
pub mod document;
pub mod hints;
pub mod invoke;
pub mod merge;
pub mod reconcile;
