//! Error types for the paper-extract library.
//!
//! Two error types reflect two distinct failure modes:
//!
//! * [`ExtractError`] — **Fatal**: the extraction cannot produce a record
//!   (bad input file, pdfium unavailable, a chunk's model invocation failed).
//!   Returned as `Err(ExtractError)` from the top-level `extract*` functions.
//!
//! * [`InvocationError`] — a single call to the inference backend failed at
//!   the process or transport level. There is no per-chunk containment: the
//!   orchestrator wraps the first one it sees in [`ExtractError::Invocation`]
//!   and abandons the document.
//!
//! Malformed model *output* is not an error at all from the caller's point
//! of view. The reconciler absorbs it and falls back to an all-"Unknown"
//! record, so nothing here describes bad JSON.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the paper-extract library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium-render could not read the text layer of a page.
    #[error("Text extraction failed for page {page}: {detail}")]
    TextExtractionFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library next to the\n\
executable, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Model errors ──────────────────────────────────────────────────────
    /// The inference backend failed for one chunk; the whole document fails.
    #[error("Model invocation failed on chunk {chunk}/{total}: {source}")]
    Invocation {
        chunk: usize,
        total: usize,
        #[source]
        source: InvocationError,
    },

    /// A named in-process provider could not be constructed.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failed call to the inference backend.
///
/// Displayed text for [`InvocationError::NonZeroExit`] is the process's
/// standard error verbatim, so callers surfacing it to users see exactly what
/// the model runner printed.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// The process could not be started (binary missing, not executable).
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing the prompt or collecting output failed mid-call.
    #[error("I/O error talking to '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process ran but exited unsuccessfully.
    #[error("{}", exit_message(.program, .code, .stderr))]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// An in-process provider returned an error.
    #[error("provider error: {message}")]
    Provider { message: String },
}

fn exit_message(program: &str, code: &Option<i32>, stderr: &str) -> String {
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    match code {
        Some(c) => format!("{program} exited with code {c}"),
        None => format!("{program} was terminated by a signal"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_zero_exit_prefers_stderr() {
        let e = InvocationError::NonZeroExit {
            program: "ollama".into(),
            code: Some(1),
            stderr: "Error: model 'mistral' not found\n".into(),
        };
        assert_eq!(e.to_string(), "Error: model 'mistral' not found");
    }

    #[test]
    fn non_zero_exit_without_stderr_names_code() {
        let e = InvocationError::NonZeroExit {
            program: "ollama".into(),
            code: Some(137),
            stderr: "   ".into(),
        };
        assert_eq!(e.to_string(), "ollama exited with code 137");
    }

    #[test]
    fn invocation_display_names_chunk() {
        let e = ExtractError::Invocation {
            chunk: 2,
            total: 5,
            source: InvocationError::Provider {
                message: "connection refused".into(),
            },
        };
        let msg = e.to_string();
        assert!(msg.contains("chunk 2/5"), "got: {msg}");
        assert!(msg.contains("connection refused"), "got: {msg}");
    }

    #[test]
    fn spawn_display_names_program() {
        let e = InvocationError::Spawn {
            program: "ollama".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file"),
        };
        assert!(e.to_string().contains("'ollama'"));
    }
}
