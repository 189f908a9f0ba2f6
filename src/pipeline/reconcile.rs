//! Turn an unreliable model reply into a schema-valid [`Extraction`].
//!
//! [`reconcile`] is total. Whatever text comes back (empty, prose, half a
//! JSON object, valid JSON with the wrong keys), the result is a record whose
//! string fields are all non-empty. The stages are:
//!
//! 1. **Parse**: the whole reply as JSON, else the greedy `{ … }` span from
//!    the first `{` to the last `}`. Only a JSON object counts.
//! 2. **Normalize**: canonical fields are filled from an ordered alias table
//!    ([`FIELD_ALIASES`]); scalars are coerced to trimmed strings and missing
//!    values become [`UNKNOWN`].
//! 3. **Validate** against the strict record shape.
//! 4. **Repair**: if no object was recovered or validation failed, straighten
//!    curly quotes, collapse all whitespace, and try stages 1-3 once more.
//! 5. **Fallback** to [`Extraction::unknown`].

use crate::output::{Extraction, UNKNOWN};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

/// Canonical record fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    DocumentType,
    Authors,
    Date,
    ContentSummary,
    MethodsSummary,
    FindingsSummary,
    ConclusionsSummary,
}

impl Field {
    pub fn key(self) -> &'static str {
        match self {
            Field::DocumentType => "documentType",
            Field::Authors => "authors",
            Field::Date => "date",
            Field::ContentSummary => "contentSummary",
            Field::MethodsSummary => "methodsSummary",
            Field::FindingsSummary => "findingsSummary",
            Field::ConclusionsSummary => "conclusionsSummary",
        }
    }
}

/// Keys consulted for each field, in priority order. The first key present
/// with a non-null value wins.
pub const FIELD_ALIASES: &[(Field, &[&str])] = &[
    (Field::Authors, &["authors", "author", "author_list"]),
    (Field::ContentSummary, &["contentSummary", "abstract", "summary"]),
    (Field::MethodsSummary, &["methodsSummary", "methods", "methodology"]),
    (Field::FindingsSummary, &["findingsSummary", "findings", "results"]),
    (
        Field::ConclusionsSummary,
        &["conclusionsSummary", "conclusions", "conclusion"],
    ),
    (Field::Date, &["date", "year", "publication_date"]),
    (
        Field::DocumentType,
        &["documentType", "type", "articleType", "title"],
    ),
];

/// How a reply was turned into a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileStage {
    /// Parsed and validated as returned.
    Direct,
    /// Recovered only after quote/whitespace cleanup.
    Repaired,
    /// Nothing usable; the all-"Unknown" record.
    Fallback,
}

/// A reconciled record and the stage that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub extraction: Extraction,
    pub stage: ReconcileStage,
}

/// Why a normalized record was rejected. Never leaves this module.
#[derive(Debug, Error, PartialEq, Eq)]
enum ValidationError {
    #[error("no JSON object in reply")]
    NoObject,
    #[error("field `{0}` is empty")]
    EmptyField(&'static str),
    #[error("author #{0} is empty")]
    EmptyAuthor(usize),
}

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Reconcile one raw model reply.
pub fn reconcile(raw: &str) -> Reconciled {
    let first_err = match attempt(raw) {
        Ok(extraction) => {
            return Reconciled {
                extraction,
                stage: ReconcileStage::Direct,
            }
        }
        Err(e) => e,
    };

    let repaired = repair_text(raw);
    match attempt(&repaired) {
        Ok(extraction) => {
            debug!("Model reply recovered after cleanup");
            Reconciled {
                extraction,
                stage: ReconcileStage::Repaired,
            }
        }
        Err(e) => {
            debug!(
                "Model reply unusable ({} chars): {}; after cleanup: {}",
                raw.len(),
                first_err,
                e
            );
            Reconciled {
                extraction: Extraction::unknown(),
                stage: ReconcileStage::Fallback,
            }
        }
    }
}

fn attempt(text: &str) -> Result<Extraction, ValidationError> {
    let obj = parse_object(text).ok_or(ValidationError::NoObject)?;
    let extraction = normalize_object(&obj);
    validate(&extraction)?;
    Ok(extraction)
}

/// Parse `text` as a JSON object, falling back to its outermost brace span.
fn parse_object(text: &str) -> Option<Map<String, Value>> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text.trim()) {
        return Some(map);
    }
    match serde_json::from_str::<Value>(brace_span(text)?) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// First `{` through last `}`, inclusive.
fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn repair_text(text: &str) -> String {
    let straightened = text
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");
    RE_WHITESPACE.replace_all(&straightened, " ").into_owned()
}

fn lookup(obj: &Map<String, Value>, field: Field) -> Option<&Value> {
    let (_, aliases) = FIELD_ALIASES.iter().find(|(f, _)| *f == field)?;
    aliases
        .iter()
        .filter_map(|key| obj.get(*key))
        .find(|v| !v.is_null())
}

/// Map an arbitrary JSON object onto the canonical record.
pub fn normalize_object(obj: &Map<String, Value>) -> Extraction {
    let scalar = |field: Field| {
        lookup(obj, field)
            .and_then(coerce_scalar)
            .unwrap_or_else(|| UNKNOWN.to_string())
    };

    Extraction {
        document_type: scalar(Field::DocumentType),
        authors: lookup(obj, Field::Authors)
            .map(coerce_authors)
            .unwrap_or_default(),
        date: scalar(Field::Date),
        content_summary: scalar(Field::ContentSummary),
        methods_summary: scalar(Field::MethodsSummary),
        findings_summary: scalar(Field::FindingsSummary),
        conclusions_summary: scalar(Field::ConclusionsSummary),
    }
}

/// Strings are trimmed, numbers and booleans printed, arrays of scalars
/// joined with ", ". Empty results, nulls and objects yield `None`.
fn coerce_scalar(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(coerce_scalar)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Null | Value::Object(_) => return None,
    };
    (!s.is_empty()).then_some(s)
}

/// A list keeps its non-empty entries (objects contribute their `name`);
/// anything else is split on commas and semicolons.
fn coerce_authors(value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(o) => o.get("name").and_then(coerce_scalar),
                other => coerce_scalar(other),
            })
            .collect(),
        other => coerce_scalar(other)
            .map(|s| {
                s.split([',', ';'])
                    .map(|part| part.trim().to_string())
                    .filter(|part| !part.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
    };

    let mut seen = HashSet::new();
    raw.into_iter().filter(|a| seen.insert(a.clone())).collect()
}

fn validate(e: &Extraction) -> Result<(), ValidationError> {
    let scalars = [
        (Field::DocumentType, &e.document_type),
        (Field::Date, &e.date),
        (Field::ContentSummary, &e.content_summary),
        (Field::MethodsSummary, &e.methods_summary),
        (Field::FindingsSummary, &e.findings_summary),
        (Field::ConclusionsSummary, &e.conclusions_summary),
    ];
    for (field, value) in scalars {
        if value.trim().is_empty() {
            return Err(ValidationError::EmptyField(field.key()));
        }
    }
    if let Some(idx) = e.authors.iter().position(|a| a.trim().is_empty()) {
        return Err(ValidationError::EmptyAuthor(idx));
    }
    Ok(())
}
