//! JSON object extraction from free-form model output
//!
//! The retry loop only sees the [`JsonExtractor`] trait, so the heuristic can be
//! swapped without touching it.

use once_cell::sync::Lazy;
use regex::Regex;

/// First `{` through last `}`, across newlines
static GREEDY_OBJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\{.*\}").expect("static regex")
});

/// Finds the substring of a model response that should be parsed as JSON
pub trait JsonExtractor: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Return the candidate JSON object text, or `None` if nothing looks like one
    fn extract<'a>(&self, text: &'a str) -> Option<&'a str>;
}

/// Single greedy match from the first `{` to the last `}`.
///
/// Prose around one object is fine. Two separate objects in the same response
/// are merged into one span that will usually fail to parse.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyBraceExtractor;

impl JsonExtractor for GreedyBraceExtractor {
    fn name(&self) -> &str {
        "greedy"
    }

    fn extract<'a>(&self, text: &'a str) -> Option<&'a str> {
        GREEDY_OBJECT.find(text).map(|m| m.as_str())
    }
}

/// Scans for the first brace-balanced object, skipping braces inside string
/// literals. Returns `None` if the first object never closes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BalancedBraceExtractor;

impl JsonExtractor for BalancedBraceExtractor {
    fn name(&self) -> &str {
        "balanced"
    }

    fn extract<'a>(&self, text: &'a str) -> Option<&'a str> {
        let start = text.find('{')?;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (offset, ch) in text[start..].char_indices() {
            if in_string {
                match ch {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => in_string = false,
                    _ => {}
                }
                continue;
            }

            match ch {
                '"' => in_string = true,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let end = start + offset + ch.len_utf8();
                        return Some(&text[start..end]);
                    }
                }
                _ => {}
            }
        }

        None
    }
}
