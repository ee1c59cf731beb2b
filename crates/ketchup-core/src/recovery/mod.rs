//! Deterministic recovery of structured data from raw model text.
//!
//! Cleaning strips reasoning traces and a surrounding code fence. Parsing
//! then runs an ordered chain of stages and stops at the first success:
//!
//! 1. strict JSON on the whole text
//! 2. strict JSON on the first balanced `{...}` / `[...]` span
//! 3. the same span with trailing commas removed
//! 4. literal parse of the cleaned span
//! 5. literal parse of the whole text

pub mod literal;

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::plan::PLANS_PER_ROUND;

/// Longest cleaned output handed to the stage chain, in bytes. Span search
/// is quadratic on unbalanced brackets; completions are capped far below this.
pub const MAX_RECOVERY_BYTES: usize = 16 * 1024;

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>.*?</think>").expect("valid regex"));
static FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[a-zA-Z0-9_\-]*").expect("valid regex"));
static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("valid regex"));

/// Why model output could not be turned into plan records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseFailure {
    /// Nothing structured could be recovered, or the structure was wrong.
    #[error("model output was not parseable: {0}")]
    Unparseable(String),
    /// The output parsed but carried no plans.
    #[error("model returned no plans")]
    NoPlans,
}

// ---------------------------------------------------------------------------
// Cleaning
// ---------------------------------------------------------------------------

/// Remove `<think>` blocks and a surrounding markdown fence.
pub fn clean_output(raw: &str) -> String {
    let without_think = THINK_BLOCK.replace_all(raw.trim(), "");
    let text = without_think.trim();
    if !text.starts_with("```") {
        return text.to_owned();
    }
    let opened = FENCE_OPEN.replace(text, "");
    let body = opened.trim();
    body.strip_suffix("```").unwrap_or(body).trim().to_owned()
}

/// The balanced span opening at byte `start`, if it closes.
///
/// Only the opener's own bracket type is counted. Brackets inside
/// double-quoted strings are ignored, honoring backslash escapes.
fn balanced_span(text: &str, start: usize) -> Option<&str> {
    let opener = text[start..].chars().next()?;
    let closer = if opener == '{' { '}' } else { ']' };
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        if ch == '"' {
            in_string = true;
        } else if ch == opener {
            depth += 1;
        } else if ch == closer {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                let end = start + offset + ch.len_utf8();
                return Some(&text[start..end]);
            }
        }
    }
    None
}

/// The first `{` or `[` that yields a balanced span.
pub fn extract_json_candidate(text: &str) -> Option<&str> {
    text.char_indices()
        .filter(|(_, c)| *c == '{' || *c == '[')
        .find_map(|(idx, _)| balanced_span(text, idx))
}

/// Drop commas directly before a closing bracket.
pub fn remove_trailing_commas(candidate: &str) -> String {
    TRAILING_COMMA.replace_all(candidate, "$1").into_owned()
}

// ---------------------------------------------------------------------------
// Stage chain
// ---------------------------------------------------------------------------

struct Candidate<'a> {
    text: &'a str,
    span: Option<&'a str>,
    sanitized: Option<String>,
}

impl<'a> Candidate<'a> {
    fn new(text: &'a str) -> Self {
        let span = extract_json_candidate(text);
        Self {
            text,
            span,
            sanitized: span.map(remove_trailing_commas),
        }
    }

    fn span(&self) -> Result<&'a str, String> {
        self.span.ok_or_else(|| "no balanced span".to_owned())
    }

    fn sanitized(&self) -> Result<&str, String> {
        self.sanitized.as_deref().ok_or_else(|| "no balanced span".to_owned())
    }
}

type StageFn = fn(&Candidate<'_>) -> Result<Value, String>;

const STAGES: [(&str, StageFn); 5] = [
    ("strict_whole", strict_whole),
    ("strict_span", strict_span),
    ("sanitized_span", sanitized_span),
    ("literal_span", literal_span),
    ("literal_whole", literal_whole),
];

fn strict_whole(c: &Candidate<'_>) -> Result<Value, String> {
    strict(c.text)
}

fn strict_span(c: &Candidate<'_>) -> Result<Value, String> {
    strict(c.span()?)
}

fn sanitized_span(c: &Candidate<'_>) -> Result<Value, String> {
    strict(c.sanitized()?)
}

fn literal_span(c: &Candidate<'_>) -> Result<Value, String> {
    literal(c.sanitized()?)
}

fn literal_whole(c: &Candidate<'_>) -> Result<Value, String> {
    literal(c.text)
}

fn strict(text: &str) -> Result<Value, String> {
    serde_json::from_str(text).map_err(|e| e.to_string())
}

fn literal(text: &str) -> Result<Value, String> {
    literal::parse_literal(text).map_err(|e| e.to_string())
}

/// Parse cleaned model text into a JSON value.
pub fn parse_json_like(text: &str) -> Result<Value, ParseFailure> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseFailure::Unparseable("output was empty".to_owned()));
    }
    if text.len() > MAX_RECOVERY_BYTES {
        return Err(ParseFailure::Unparseable(format!(
            "output too long ({} bytes, limit {MAX_RECOVERY_BYTES})",
            text.len()
        )));
    }

    let candidate = Candidate::new(text);
    let mut last_error = String::new();
    for (name, stage) in STAGES {
        match stage(&candidate) {
            Ok(value) => {
                tracing::debug!(stage = name, "recovered structured output");
                return Ok(value);
            }
            Err(e) => last_error = format!("{name}: {e}"),
        }
    }
    Err(ParseFailure::Unparseable(last_error))
}

/// Extract up to five raw plan records from model output.
///
/// The plan list is the `plans` key of an object or a top-level list. Only
/// object entries are kept.
pub fn extract_plans(raw: &str) -> Result<Vec<Map<String, Value>>, ParseFailure> {
    let parsed = parse_json_like(&clean_output(raw))?;

    let items = match parsed {
        Value::Object(mut obj) => match obj.remove("plans") {
            Some(Value::Array(items)) => items,
            None | Some(Value::Null) => Vec::new(),
            Some(other) if is_falsy(&other) => Vec::new(),
            Some(_) => {
                return Err(ParseFailure::Unparseable("`plans` is not a list".to_owned()));
            }
        },
        Value::Array(items) => items,
        _ => Vec::new(),
    };

    if items.is_empty() {
        return Err(ParseFailure::NoPlans);
    }

    let records: Vec<Map<String, Value>> = items
        .into_iter()
        .take(PLANS_PER_ROUND)
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect();

    if records.is_empty() {
        return Err(ParseFailure::Unparseable("plans contained no objects".to_owned()));
    }
    Ok(records)
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
    }
}

/// Log-safe preview: at most `max_chars`, newlines escaped.
pub fn snippet(raw: &str, max_chars: usize) -> String {
    clean_output(raw)
        .chars()
        .take(max_chars)
        .collect::<String>()
        .replace('\n', "\\n")
}
