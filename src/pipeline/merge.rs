//! Combine per-chunk records into one document record.
//!
//! Field rules:
//!
//! | Field(s)                     | Rule                                   |
//! |------------------------------|----------------------------------------|
//! | `authors`                    | union, exact dedup, first-seen order   |
//! | `documentType`, `date`       | first value that is not "Unknown"      |
//! | the four summaries           | dedup on a 200-char prefix, then join  |
//!
//! Input order is chunk order, so the result does not depend on which chunk
//! finished first.

use crate::output::{Extraction, UNKNOWN};
use std::collections::HashSet;

/// Leading characters used as the identity of a summary during dedup.
pub const SUMMARY_KEY_CHARS: usize = 200;

/// Merge per-chunk records, given in chunk order.
pub fn merge_extractions(parts: &[Extraction]) -> Extraction {
    Extraction {
        document_type: pick_first(parts.iter().map(|p| p.document_type.as_str())),
        authors: union_authors(parts.iter().map(|p| p.authors.as_slice())),
        date: pick_first(parts.iter().map(|p| p.date.as_str())),
        content_summary: join_unique(parts.iter().map(|p| p.content_summary.as_str())),
        methods_summary: join_unique(parts.iter().map(|p| p.methods_summary.as_str())),
        findings_summary: join_unique(parts.iter().map(|p| p.findings_summary.as_str())),
        conclusions_summary: join_unique(parts.iter().map(|p| p.conclusions_summary.as_str())),
    }
}

/// Replace an empty author list with the heuristic guesses, if any.
pub fn apply_author_hints(merged: &mut Extraction, hint_authors: &[String]) -> bool {
    if merged.authors.is_empty() && !hint_authors.is_empty() {
        merged.authors = hint_authors.to_vec();
        return true;
    }
    false
}

fn union_authors<'a>(lists: impl Iterator<Item = &'a [String]>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for author in lists.flatten() {
        if author.is_empty() || author == UNKNOWN {
            continue;
        }
        if seen.insert(author.as_str()) {
            out.push(author.clone());
        }
    }
    out
}

fn pick_first<'a>(values: impl Iterator<Item = &'a str>) -> String {
    values
        .map(str::trim)
        .find(|v| !v.is_empty() && !v.eq_ignore_ascii_case(UNKNOWN))
        .unwrap_or(UNKNOWN)
        .to_string()
}

fn join_unique<'a>(values: impl Iterator<Item = &'a str>) -> String {
    let mut seen = HashSet::new();
    let mut kept = Vec::new();
    for v in values {
        if v.is_empty() || v == UNKNOWN {
            continue;
        }
        let key: String = v.chars().take(SUMMARY_KEY_CHARS).collect();
        if seen.insert(key) {
            kept.push(v);
        }
    }
    if kept.is_empty() {
        UNKNOWN.to_string()
    } else {
        kept.join(" ")
    }
}
