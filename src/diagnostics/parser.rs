// src/diagnostics/parser.rs

//! JSON-lines diagnostic parser.
//!
//! Input is one line of tool output believed to hold a single JSON object.
//! Two shapes are understood:
//! - the cargo envelope: `{"reason": "compiler-message", "message": {...}}`
//!   interleaved with other reasons (`compiler-artifact`,
//!   `build-script-executed`, `build-finished`, ...), which are skipped;
//! - a bare rustc diagnostic object (`level`, `message`, `spans` at the top
//!   level), as printed by `rustc --error-format json`.
//!
//! The shape is detected from the first decodable object and kept until
//! [`DiagnosticParser::reset`]. Nothing here returns an error: anything that
//! does not decode or is not a diagnostic yields no diagnostics.
//!
//! Decoding goes through `serde_json::Value` rather than typed structs so
//! missing optional fields and duplicated keys do not reject a whole message.

use serde_json::{Map, Value};
use tracing::trace;

use super::model::{FileDiagnostic, Range, Severity};

/// `reason` of cargo messages that carry a diagnostic.
pub const COMPILER_MESSAGE: &str = "compiler-message";

/// Detected wire shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    /// Cargo `--message-format json` envelopes.
    Cargo,
    /// Bare rustc diagnostics.
    Rustc,
}

impl MessageFormat {
    fn detect(obj: &Map<String, Value>) -> Option<Self> {
        if obj.contains_key("reason") {
            Some(MessageFormat::Cargo)
        } else if obj.contains_key("level") && obj.contains_key("spans") {
            Some(MessageFormat::Rustc)
        } else {
            None
        }
    }
}

/// Result of parsing one line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLine {
    /// Whether the line decoded as a JSON object.
    pub is_json: bool,
    /// At most one top-level diagnostic per message; empty when skipped.
    pub diagnostics: Vec<FileDiagnostic>,
    /// Tool-rendered human text of a diagnostic message, if present.
    pub rendered: Option<String>,
    /// Whether the line was recognised as a diagnostic message at all, even
    /// one without a resolvable location.
    pub is_diagnostic: bool,
}

impl ParsedLine {
    fn skipped_json() -> Self {
        ParsedLine {
            is_json: true,
            ..Default::default()
        }
    }
}

/// Stateful only in the detected [`MessageFormat`].
#[derive(Debug, Default)]
pub struct DiagnosticParser {
    format: Option<MessageFormat>,
}

impl DiagnosticParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the detected format (start of a new run).
    pub fn reset(&mut self) {
        self.format = None;
    }

    pub fn format(&self) -> Option<MessageFormat> {
        self.format
    }

    /// Diagnostics carried by `text`.
    pub fn parse_line(&mut self, text: &str) -> Vec<FileDiagnostic> {
        self.parse_message(text).diagnostics
    }

    /// Diagnostics plus rendered text carried by `text`.
    pub fn parse_message(&mut self, text: &str) -> ParsedLine {
        let value: Value = match serde_json::from_str(text.trim()) {
            Ok(value) => value,
            Err(e) => {
                trace!(error = %e, "line is not JSON; skipping");
                return ParsedLine::default();
            }
        };
        let Some(obj) = value.as_object() else {
            return ParsedLine::default();
        };

        let format = match self.format {
            Some(format) => format,
            None => match MessageFormat::detect(obj) {
                Some(format) => {
                    trace!(?format, "detected message format");
                    self.format = Some(format);
                    format
                }
                None => return ParsedLine::skipped_json(),
            },
        };

        let diagnostic = match format {
            MessageFormat::Cargo => {
                let reason = obj.get("reason").and_then(Value::as_str);
                if reason != Some(COMPILER_MESSAGE) {
                    trace!(?reason, "non-diagnostic message skipped");
                    return ParsedLine::skipped_json();
                }
                match obj.get("message").and_then(Value::as_object) {
                    Some(message) => message,
                    None => return ParsedLine::skipped_json(),
                }
            }
            MessageFormat::Rustc => {
                if !obj.contains_key("level") {
                    return ParsedLine::skipped_json();
                }
                obj
            }
        };

        ParsedLine {
            is_json: true,
            diagnostics: convert(diagnostic).into_iter().collect(),
            rendered: str_field(diagnostic, "rendered").map(str::to_string),
            is_diagnostic: true,
        }
    }
}

/// One span of the wire format, leniently decoded.
#[derive(Debug, Clone)]
struct Span {
    file_name: String,
    range: Range,
    is_primary: bool,
    label: Option<String>,
    suggested_replacement: Option<String>,
    expansion: Option<Box<Span>>,
}

impl Span {
    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let file_name = str_field(obj, "file_name")?.to_string();
        let line_start = u32_field(obj, "line_start")?;
        let line_end = u32_field(obj, "line_end").unwrap_or(line_start);
        let column_start = u32_field(obj, "column_start").unwrap_or(1);
        let column_end = u32_field(obj, "column_end").unwrap_or(column_start);

        let expansion = obj
            .get("expansion")
            .and_then(Value::as_object)
            .and_then(|exp| exp.get("span"))
            .and_then(Span::from_value)
            .map(Box::new);

        Some(Span {
            file_name,
            range: Range::from_tool(line_start, column_start, line_end, column_end),
            is_primary: obj.get("is_primary").and_then(Value::as_bool).unwrap_or(false),
            label: non_empty(str_field(obj, "label")),
            suggested_replacement: str_field(obj, "suggested_replacement").map(str::to_string),
            expansion,
        })
    }

    /// Walk out of macro expansions to the first span in a real file.
    fn resolve(&self) -> Option<(&str, Range)> {
        let mut current = self;
        loop {
            if is_real_file(&current.file_name) {
                return Some((current.file_name.as_str(), current.range));
            }
            current = current.expansion.as_deref()?;
        }
    }
}

fn is_real_file(name: &str) -> bool {
    !name.is_empty() && !(name.starts_with('<') && name.ends_with('>'))
}

fn spans_of(diag: &Map<String, Value>) -> Vec<Span> {
    diag.get("spans")
        .and_then(Value::as_array)
        .map(|spans| spans.iter().filter_map(Span::from_value).collect())
        .unwrap_or_default()
}

/// The primary span, or the first span when none is marked primary.
fn primary_index(spans: &[Span]) -> Option<usize> {
    if spans.is_empty() {
        return None;
    }
    Some(spans.iter().position(|s| s.is_primary).unwrap_or(0))
}

fn convert(diag: &Map<String, Value>) -> Option<FileDiagnostic> {
    let spans = spans_of(diag);
    let primary_idx = primary_index(&spans)?;
    let primary = &spans[primary_idx];
    let (file, range) = primary.resolve()?;

    let severity = Severity::from_level(str_field(diag, "level").unwrap_or_default());
    let base_message = str_field(diag, "message").unwrap_or_default();
    let mut message = base_message.to_string();
    if let Some(label) = &primary.label {
        if label != base_message {
            message.push('\n');
            message.push_str(label);
        }
    }

    let mut children = Vec::new();

    // Every other span is a related location. Further primary spans keep the
    // parent severity (`unused imports: A, B`); secondary spans are notes.
    // Unlabelled spans carry the parent message.
    for (idx, span) in spans.iter().enumerate() {
        if idx == primary_idx {
            continue;
        }
        let Some((file, range)) = span.resolve() else {
            continue;
        };
        let text = span.label.as_deref().unwrap_or(base_message);
        let child_severity = if span.is_primary { severity } else { Severity::Note };
        children.push(FileDiagnostic::new(file, range, child_severity, text));
    }

    if let Some(nested) = diag.get("children").and_then(Value::as_array) {
        for child in nested.iter().filter_map(Value::as_object) {
            children.extend(convert_child(child, file, range));
        }
    }

    Some(
        FileDiagnostic::new(file, range, severity, message)
            .with_code(code_of(diag))
            .with_children(children),
    )
}

/// A child note/help. Without spans of its own it points at the parent.
fn convert_child(
    child: &Map<String, Value>,
    parent_file: &str,
    parent_range: Range,
) -> Option<FileDiagnostic> {
    let text = str_field(child, "message").unwrap_or_default();
    if text.is_empty() {
        return None;
    }
    let severity = Severity::from_level(str_field(child, "level").unwrap_or_default());
    let spans = spans_of(child);

    let (file, range, message) = match primary_index(&spans) {
        Some(idx) => {
            let span = &spans[idx];
            let (file, range) = span.resolve().unwrap_or((parent_file, parent_range));
            let message = match span.suggested_replacement.as_deref() {
                Some(replacement) if !replacement.is_empty() => {
                    format!("{text}: `{replacement}`")
                }
                _ => text.to_string(),
            };
            (file, range, message)
        }
        None => (parent_file, parent_range, text.to_string()),
    };

    Some(FileDiagnostic::new(file, range, severity, message).with_code(code_of(child)))
}

fn code_of(diag: &Map<String, Value>) -> Option<String> {
    diag.get("code")
        .and_then(Value::as_object)
        .and_then(|code| str_field(code, "code"))
        .map(str::to_string)
}

fn str_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

fn u32_field(obj: &Map<String, Value>, key: &str) -> Option<u32> {
    obj.get(key)
        .and_then(Value::as_u64)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.filter(|s| !s.is_empty()).map(str::to_string)
}
