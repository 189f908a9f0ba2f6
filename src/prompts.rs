//! Instruction prompt for per-chunk metadata extraction.
//!
//! The prompt is fully deterministic: the same chunk and hints always produce
//! the same bytes, which keeps model replies reproducible at low temperature
//! and lets tests pin the layout.

use crate::output::{Hints, UNKNOWN};

/// Schema, field definitions and output rules sent ahead of every chunk.
pub const EXTRACTION_INSTRUCTIONS: &str = r#"You extract metadata from SCIENTIFIC PAPERS. Work ONLY from the provided text.
Return ONE JSON object with EXACT keys:
documentType, authors (array of strings), date, contentSummary, methodsSummary, findingsSummary, conclusionsSummary.

Definitions:
- documentType: e.g., Research Article, Review, Case Report, RCT, Cohort Study, Systematic Review, etc.
- authors: list of person names only.
- date: publication year or date string if available; otherwise "Unknown".
- contentSummary: 2-4 short sentences about what the paper studies.
- methodsSummary: 2-4 short sentences (design, sample, measures, analysis).
- findingsSummary: 2-4 short sentences summarizing main empirical results.
- conclusionsSummary: 1-3 short sentences summarizing the authors' conclusions/implications.

Rules:
- Use "Unknown" ONLY if not present in this text.
- Do NOT invent data. Keep sentences concise.
- Reply with ONLY JSON (no prose, no markdown)."#;

/// Hard-truncate `text` to `max_chars` characters.
///
/// When anything is cut, a `[TRUNCATED: n more chars]` notice is appended so
/// the model knows the chunk continues.
pub fn trim_for_prompt(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars).collect();
    format!("{kept}\n\n[TRUNCATED: {} more chars]", total - max_chars)
}

/// Render the advisory hint block.
pub fn hint_block(hints: &Hints) -> String {
    let title = hints
        .title
        .as_deref()
        .filter(|t| !t.is_empty())
        .unwrap_or(UNKNOWN);
    let authors = if hints.authors.is_empty() {
        UNKNOWN.to_string()
    } else {
        hints.authors.join(", ")
    };
    format!(
        "HINTS (may be wrong; verify with text):\n- Possible Title: {title}\n- Possible Authors: {authors}"
    )
}

/// Build the full prompt for one chunk.
pub fn build_prompt(chunk: &str, hints: &Hints, max_prompt_chars: usize) -> String {
    format!(
        "{}\n\n{}\n\nDOCUMENT CHUNK:\n{}",
        EXTRACTION_INSTRUCTIONS,
        hint_block(hints),
        trim_for_prompt(chunk, max_prompt_chars).trim()
    )
}
