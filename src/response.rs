//! Model output post-processing.
//!
//! Local models wrap their JSON in prose or markdown fences, and sometimes
//! produce no JSON at all. [`parse_response`] scans the text for the first
//! position where a complete, syntactically valid JSON object starts and
//! returns it; if there is none, the raw text comes back unchanged as
//! [`Analysis::Raw`]. The raw variant is a normal result, not an error.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::mode::Mode;

/// Result of a query: a JSON object, or the model's raw text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Analysis {
    Json(Value),
    Raw(String),
}

impl Analysis {
    pub fn is_json(&self) -> bool {
        matches!(self, Analysis::Json(_))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Analysis::Json(v) => Some(v),
            Analysis::Raw(_) => None,
        }
    }

    /// The `mode` the result reports, if it is JSON and carries one.
    pub fn reported_mode(&self) -> Option<&str> {
        self.as_json()?.get("mode")?.as_str()
    }

    /// Set `mode` on a JSON result that lacks a usable one.
    ///
    /// Returns true when the field was filled in.
    pub fn fill_missing_mode(&mut self, mode: Mode) -> bool {
        if let Analysis::Json(Value::Object(map)) = self {
            let present = map.get("mode").and_then(Value::as_str).is_some();
            if !present {
                map.insert("mode".to_string(), Value::String(mode.display_name().to_string()));
                return true;
            }
        }
        false
    }

    /// Typed view of a JSON result. Unknown or missing fields fall back to
    /// defaults.
    pub fn report(&self) -> Option<AnalysisReport> {
        serde_json::from_value(self.as_json()?.clone()).ok()
    }

    /// Pretty JSON for JSON results, the unchanged text for raw ones.
    pub fn render(&self) -> String {
        match self {
            Analysis::Json(v) => serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string()),
            Analysis::Raw(text) => text.clone(),
        }
    }
}

/// Extract the first valid JSON object from model output.
pub fn parse_response(raw: &str) -> Analysis {
    match first_json_object(raw) {
        Some(map) => Analysis::Json(Value::Object(map)),
        None => Analysis::Raw(raw.to_string()),
    }
}

/// Only top-level candidates count: braces inside a failed candidate are never
/// tried on their own, so a truncated reply cannot yield one of its nested
/// objects.
fn first_json_object(text: &str) -> Option<Map<String, Value>> {
    let mut from = 0;
    while let Some(offset) = text[from..].find('{') {
        let pos = from + offset;
        let candidate = &text[pos..];

        let mut stream = serde_json::Deserializer::from_str(candidate).into_iter::<Value>();
        let eof = match stream.next() {
            Some(Ok(Value::Object(map))) => return Some(map),
            Some(Err(e)) => e.is_eof(),
            _ => false,
        };

        from = match balanced_span(candidate) {
            Some(len) => pos + len,
            // Unterminated JSON: every later brace is nested inside it.
            None if eof => return None,
            // A stray `{` in prose.
            None => pos + 1,
        };
    }
    None
}

/// Byte length of the brace-balanced span starting at `text[0] == '{'`,
/// ignoring braces inside JSON strings. `None` if it never closes.
fn balanced_span(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" | "critical" => Ok(Severity::High),
            "medium" | "moderate" => Ok(Severity::Medium),
            "low" | "info" | "informational" => Ok(Severity::Low),
            other => Err(format!("unknown severity: {}", other)),
        }
    }
}

/// Reads a severity string, mapping anything unrecognised to `None`.
fn lenient_severity<'de, D>(deserializer: D) -> Result<Option<Severity>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok()))
}

/// One finding reported by the model.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Event {
    pub description: String,
    #[serde(deserialize_with = "lenient_severity")]
    pub severity: Option<Severity>,
    pub tags: Vec<String>,
}

/// Typed view of the JSON output schema.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisReport {
    pub mode: Option<String>,
    pub events: Vec<Event>,
    pub ioc: Vec<Value>,
    pub mitre: Vec<Value>,
    pub summary: String,
    #[serde(deserialize_with = "lenient_severity")]
    pub severity: Option<Severity>,
}
