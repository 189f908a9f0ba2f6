//! Display normalization and the JSON result envelope.
//!
//! [`normalize_result`] reshapes an [`Extraction`] for presentation: each
//! summary becomes a list of sentence bullets and the author list is cleaned
//! up for display. [`ExtractionEnvelope`] is the `{status, raw, normalized}`
//! document handed to clients (the CLI prints it with `--json`).

use crate::error::ExtractError;
use crate::output::Extraction;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

static RE_PERIOD_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r"\. *,").unwrap());
static RE_SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]\s+").unwrap());
static RE_ET_AL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)et al\.").unwrap());

/// Which summary a section was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionId {
    Content,
    Methods,
    Findings,
    Conclusions,
}

impl SectionId {
    pub fn title(self) -> &'static str {
        match self {
            SectionId::Content => "Content Summary",
            SectionId::Methods => "Methods Summary",
            SectionId::Findings => "Findings Summary",
            SectionId::Conclusions => "Conclusions Summary",
        }
    }
}

/// One summary split into bullets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedSection {
    pub id: SectionId,
    pub title: String,
    pub bullets: Vec<String>,
}

/// An [`Extraction`] shaped for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedResult {
    pub document_type: String,
    pub year: String,
    pub authors: Vec<String>,
    pub sections: Vec<NormalizedSection>,
}

/// Build the display form of `raw`. Sections always come in the order
/// content, methods, findings, conclusions.
pub fn normalize_result(raw: &Extraction) -> NormalizedResult {
    let section = |id: SectionId, text: &str| NormalizedSection {
        id,
        title: id.title().to_string(),
        bullets: split_into_bullets(text),
    };

    NormalizedResult {
        document_type: raw.document_type.clone(),
        year: raw.date.clone(),
        authors: dedupe_authors(&raw.authors),
        sections: vec![
            section(SectionId::Content, &raw.content_summary),
            section(SectionId::Methods, &raw.methods_summary),
            section(SectionId::Findings, &raw.findings_summary),
            section(SectionId::Conclusions, &raw.conclusions_summary),
        ],
    }
}

/// Split prose into sentences at `.`, `!` or `?` followed by whitespace,
/// dropping case-insensitive repeats.
pub fn split_into_bullets(text: &str) -> Vec<String> {
    let text = RE_PERIOD_COMMA.replace_all(text, ". ");

    let mut sentences = Vec::new();
    let mut start = 0;
    for m in RE_SENTENCE_END.find_iter(&text) {
        // Keep the terminator (one ASCII byte), drop the whitespace run.
        sentences.push(&text[start..m.start() + 1]);
        start = m.end();
    }
    sentences.push(&text[start..]);

    let mut seen = HashSet::new();
    sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Trim, drop blanks and "et al." entries, dedup case-insensitively.
pub fn dedupe_authors(authors: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    authors
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty() && !RE_ET_AL.is_match(a))
        .filter(|a| seen.insert(a.to_lowercase()))
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Error,
}

/// `{status, raw, normalized}` on success, `{status, error}` on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionEnvelope {
    pub status: EnvelopeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Extraction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized: Option<NormalizedResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionEnvelope {
    pub fn success(raw: Extraction) -> Self {
        let normalized = normalize_result(&raw);
        Self {
            status: EnvelopeStatus::Success,
            raw: Some(raw),
            normalized: Some(normalized),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: EnvelopeStatus::Error,
            raw: None,
            normalized: None,
            error: Some(message.into()),
        }
    }

    /// HTTP status a server would answer with: 200 on success, 400 when no
    /// document was supplied, 500 for anything else.
    pub fn status_code_for(result: &Result<Extraction, ExtractError>) -> u16 {
        match result {
            Ok(_) => 200,
            Err(ExtractError::FileNotFound { .. }) => 400,
            Err(_) => 500,
        }
    }
}

impl From<Result<Extraction, ExtractError>> for ExtractionEnvelope {
    fn from(result: Result<Extraction, ExtractError>) -> Self {
        match result {
            Ok(raw) => Self::success(raw),
            Err(e) => Self::failure(e.to_string()),
        }
    }
}
