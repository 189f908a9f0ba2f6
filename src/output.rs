//! Output types: the canonical [`Extraction`] record and run metadata.
//!
//! Every string field of an [`Extraction`] is non-empty. A field the model
//! could not determine holds the sentinel [`UNKNOWN`], never an empty string,
//! so consumers can render any record without null checks.

use serde::{Deserialize, Serialize};

/// Placeholder for "not determinable from the text".
pub const UNKNOWN: &str = "Unknown";

/// Structured metadata for one scientific document (or one chunk of it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    /// e.g. "Research Article", "Review", "RCT".
    pub document_type: String,
    /// Person names, unique, in first-seen order.
    pub authors: Vec<String>,
    /// Publication year or date string.
    pub date: String,
    pub content_summary: String,
    pub methods_summary: String,
    pub findings_summary: String,
    pub conclusions_summary: String,
}

impl Extraction {
    /// The record returned when nothing could be recovered from a reply.
    pub fn unknown() -> Self {
        Self {
            document_type: UNKNOWN.to_string(),
            authors: Vec::new(),
            date: UNKNOWN.to_string(),
            content_summary: UNKNOWN.to_string(),
            methods_summary: UNKNOWN.to_string(),
            findings_summary: UNKNOWN.to_string(),
            conclusions_summary: UNKNOWN.to_string(),
        }
    }

    /// True when every field holds the sentinel and no author is known.
    pub fn is_unknown(&self) -> bool {
        *self == Self::unknown()
    }
}

impl Default for Extraction {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Low-confidence title/author guesses taken from the first pages.
///
/// Hints are shown to the model as context and only override its output when
/// the merged record ends up with no authors at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hints {
    pub title: Option<String>,
    pub authors: Vec<String>,
}

/// Everything produced by one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// The merged record.
    pub extraction: Extraction,
    /// Heuristic hints fed into every prompt.
    pub hints: Hints,
    /// Run statistics.
    pub stats: ExtractionStats,
}

/// Counters and timings for a single extraction run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Pages the pipeline received.
    pub page_count: usize,
    /// Chunks produced before the `max_chunks` cap.
    pub total_chunks: usize,
    /// Chunks actually sent to the model.
    pub processed_chunks: usize,
    /// Chunks whose reply could not be reconciled into anything but the
    /// all-"Unknown" fallback.
    pub fallback_chunks: usize,
    /// Average text per page fell below the scanned-document threshold.
    pub likely_scanned: bool,
    /// Wall-clock time reading the PDF text layer.
    pub read_duration_ms: u64,
    /// Wall-clock time spent in model invocations (all chunks, overlapped).
    pub llm_duration_ms: u64,
    /// End-to-end wall-clock time.
    pub total_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_record_uses_sentinel_everywhere() {
        let e = Extraction::unknown();
        assert_eq!(e.document_type, UNKNOWN);
        assert_eq!(e.date, UNKNOWN);
        assert_eq!(e.conclusions_summary, UNKNOWN);
        assert!(e.authors.is_empty());
        assert!(e.is_unknown());
    }

    #[test]
    fn serialises_with_camel_case_keys() {
        let json = serde_json::to_value(Extraction::unknown()).unwrap();
        let obj = json.as_object().unwrap();
        for key in [
            "documentType",
            "authors",
            "date",
            "contentSummary",
            "methodsSummary",
            "findingsSummary",
            "conclusionsSummary",
        ] {
            assert!(obj.contains_key(key), "missing key {key}");
        }
        assert_eq!(obj.len(), 7);
    }
}
