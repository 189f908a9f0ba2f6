//! Document source: read the text layer of a PDF, one string per page.
//!
//! pdfium is a blocking C library, so all of its work runs inside
//! `tokio::task::spawn_blocking`. The input is checked up front (exists,
//! readable, starts with `%PDF`) so callers get a precise error instead of a
//! pdfium load failure.
//!
//! Page texts are trimmed and empty pages are dropped. A scanned PDF with no
//! text layer therefore yields zero pages, which the pipeline still handles.

use crate::error::ExtractError;
use pdfium_render::prelude::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit pdfium shared library.
pub const ENV_PDFIUM_LIB_PATH: &str = "PDFIUM_LIB_PATH";

/// The text layer of one document.
#[derive(Debug, Clone, Default)]
pub struct DocumentText {
    /// All non-empty pages joined with newlines.
    pub full_text: String,
    /// Trimmed, non-empty page texts in document order.
    pub pages: Vec<String>,
    /// Average characters per page is below the scanned threshold.
    pub likely_scanned: bool,
    /// Page count reported by the PDF, including pages without text.
    pub raw_page_count: usize,
}

/// True when the average text per page is below `threshold` characters,
/// which usually means the pages are images.
pub fn needs_ocr<S: AsRef<str>>(pages: &[S], threshold: usize) -> bool {
    let total: usize = pages.iter().map(|p| p.as_ref().chars().count()).sum::<usize>()
        + pages.len().saturating_sub(1);
    total / pages.len().max(1) < threshold
}

/// Check that `path` exists, is readable and carries the PDF magic bytes.
pub fn validate_pdf_path(path: &Path) -> Result<(), ExtractError> {
    if !path.exists() {
        return Err(ExtractError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExtractError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => {
            return Err(ExtractError::FileNotFound {
                path: path.to_path_buf(),
            })
        }
    };

    let mut magic = [0u8; 4];
    let read = file.read(&mut magic).unwrap_or(0);
    if read < magic.len() || &magic != b"%PDF" {
        return Err(ExtractError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

/// Read every page's text from the PDF at `path`.
pub async fn read_document(
    path: &Path,
    password: Option<&str>,
    scanned_threshold: usize,
) -> Result<DocumentText, ExtractError> {
    validate_pdf_path(path)?;
    info!("Reading PDF: {}", path.display());

    let path_buf = path.to_path_buf();
    let password = password.map(str::to_string);
    let (pages, raw_page_count) = tokio::task::spawn_blocking(move || {
        read_pages_blocking(&path_buf, password.as_deref())
    })
    .await
    .map_err(|e| ExtractError::Internal(format!("PDF reader task panicked: {e}")))??;

    let likely_scanned = needs_ocr(&pages, scanned_threshold);
    Ok(DocumentText {
        full_text: pages.join("\n"),
        pages,
        likely_scanned,
        raw_page_count,
    })
}

fn read_pages_blocking(
    path: &Path,
    password: Option<&str>,
) -> Result<(Vec<String>, usize), ExtractError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_file(path, password)
        .map_err(|e| load_error(path, password.is_some(), e))?;

    let raw_page_count = document.pages().len() as usize;
    let mut pages = Vec::with_capacity(raw_page_count);
    for (index, page) in document.pages().iter().enumerate() {
        let text = page.text().map_err(|e| ExtractError::TextExtractionFailed {
            page: index + 1,
            detail: format!("{e:?}"),
        })?;
        let text = text.all().replace("\r\n", "\n");
        let text = text.trim();
        if text.is_empty() {
            debug!("Page {} has no text layer", index + 1);
            continue;
        }
        pages.push(text.to_string());
    }

    debug!(
        "Read {} of {} pages with text from {}",
        pages.len(),
        raw_page_count,
        path.display()
    );
    Ok((pages, raw_page_count))
}

fn load_error(path: &Path, had_password: bool, e: PdfiumError) -> ExtractError {
    let detail = format!("{e:?}");
    if detail.to_lowercase().contains("password") {
        if had_password {
            ExtractError::WrongPassword {
                path: path.to_path_buf(),
            }
        } else {
            ExtractError::PasswordRequired {
                path: path.to_path_buf(),
            }
        }
    } else {
        ExtractError::CorruptPdf {
            path: path.to_path_buf(),
            detail,
        }
    }
}

/// Bind to pdfium: `PDFIUM_LIB_PATH` if set, else a library next to the
/// executable or in the working directory, else the system library.
fn bind_pdfium() -> Result<Pdfium, ExtractError> {
    if let Ok(path) = std::env::var(ENV_PDFIUM_LIB_PATH) {
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| {
            ExtractError::PdfiumBindingFailed(format!("{ENV_PDFIUM_LIB_PATH}={path}: {e}"))
        })?;
        return Ok(Pdfium::new(bindings));
    }

    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        candidates.push(Pdfium::pdfium_platform_library_name_at_path(&dir));
    }
    candidates.push(Pdfium::pdfium_platform_library_name_at_path(Path::new(".")));

    for candidate in &candidates {
        if let Ok(bindings) = Pdfium::bind_to_library(candidate) {
            debug!("Bound pdfium at {}", candidate.display());
            return Ok(Pdfium::new(bindings));
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        ExtractError::PdfiumBindingFailed(format!(
            "{e} (looked for {})",
            Pdfium::pdfium_platform_library_name().to_string_lossy()
        ))
    })?;
    Ok(Pdfium::new(bindings))
}
