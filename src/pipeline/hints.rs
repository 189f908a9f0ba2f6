//! Cheap title/author guesses from the opening lines of a paper.
//!
//! These are advisory. They are printed into every prompt as "may be wrong"
//! context, and the author list is used only if the model returns no
//! authors for any chunk.

use crate::output::Hints;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Lines considered when looking for a title before the first heading.
const TITLE_WINDOW: usize = 5;
/// Title candidates must be longer than 8 and shorter than 220 characters.
const TITLE_MIN_CHARS: usize = 9;
const TITLE_MAX_CHARS: usize = 219;
/// Author heuristics only look at the head of the text.
const AUTHOR_SCAN_LINES: usize = 60;
const MAX_AUTHOR_GUESSES: usize = 12;

static RE_SECTION_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:abstract|introduction)\b").unwrap());

static RE_AUTHOR_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:by|authors?)\s*[:\-]\s*(.+)").unwrap());

/// `First [M.] Last [Last…]`
static RE_PERSON_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z][a-z]+(?:\s[A-Z]\.)?(?:\s[A-Z][a-z]+)+\b").unwrap()
});

static RE_FOOTNOTE_MARKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+|\*").unwrap());

/// Compute hints for a document, preferring its first two pages.
///
/// Each heuristic falls back to the whole document when the first two pages
/// give nothing.
pub fn compute_hints<S: AsRef<str>>(pages: &[S]) -> Hints {
    let head = pages
        .iter()
        .take(2)
        .map(|p| p.as_ref())
        .collect::<Vec<_>>()
        .join("\n");
    let whole = || {
        pages
            .iter()
            .map(|p| p.as_ref())
            .collect::<Vec<_>>()
            .join("\n")
    };

    let title = extract_title(&head).or_else(|| extract_title(&whole()));
    let mut authors = extract_authors(&head);
    if authors.is_empty() {
        authors = extract_authors(&whole());
    }

    Hints { title, authors }
}

/// Guess a title: the first reasonably sized line before "Abstract" or
/// "Introduction" (or among the first few lines if neither appears).
pub fn extract_title(text: &str) -> Option<String> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let window = match lines.iter().position(|l| RE_SECTION_START.is_match(l)) {
        Some(idx) if idx > 0 => &lines[..idx.min(TITLE_WINDOW)],
        _ => &lines[..lines.len().min(TITLE_WINDOW)],
    };

    window
        .iter()
        .find(|l| (TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&l.chars().count()))
        .map(|l| l.to_string())
}

/// Guess author names from an explicit "Authors:"/"By:" label, else from
/// capitalised name-shaped phrases.
pub fn extract_authors(text: &str) -> Vec<String> {
    let head: Vec<&str> = text.lines().take(AUTHOR_SCAN_LINES).collect();

    for line in &head {
        if let Some(caps) = RE_AUTHOR_LABEL.captures(line) {
            let names = split_name_list(&caps[1]);
            if !names.is_empty() {
                return names;
            }
        }
    }

    let joined = head.join(" ");
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for m in RE_PERSON_NAME.find_iter(&joined) {
        if seen.insert(m.as_str().to_lowercase()) {
            names.push(m.as_str().to_string());
            if names.len() == MAX_AUTHOR_GUESSES {
                break;
            }
        }
    }
    names
}

/// Split `"A. Smith1*, B. Jones2; C. Wu"` into clean names.
fn split_name_list(list: &str) -> Vec<String> {
    list.split([',', ';'])
        .map(|s| RE_FOOTNOTE_MARKS.replace_all(s, "").trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
