// src/diagnostics/model.rs

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Severity of a diagnostic.
///
/// `Note` and `Help` form the informational tier; `Help` is the lowest and
/// absorbs every level string the tool may invent later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
    Note,
    Help,
}

impl Severity {
    /// Map a tool `level` string. Never fails.
    pub fn from_level(level: &str) -> Self {
        match level {
            "error" | "error: internal compiler error" => Severity::Error,
            "warning" => Severity::Warning,
            "note" => Severity::Note,
            _ => Severity::Help,
        }
    }

    pub fn is_informational(self) -> bool {
        matches!(self, Severity::Note | Severity::Help)
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
            Severity::Help => "help",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 0-based line/column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// 0-based, end-exclusive range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Convert tool coordinates: 1-based lines, 1-based columns where the end
    /// column points one past the last character.
    ///
    /// Zeros are clamped to the first line/column and an end before the
    /// start collapses to an empty range at the start.
    pub fn from_tool(line_start: u32, column_start: u32, line_end: u32, column_end: u32) -> Self {
        let start = Position::new(line_start.saturating_sub(1), column_start.saturating_sub(1));
        let end = Position::new(line_end.saturating_sub(1), column_end.saturating_sub(1));
        if end < start {
            Self::new(start, start)
        } else {
            Self::new(start, end)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A normalized, file-scoped diagnostic.
///
/// Fields are private; a diagnostic is immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiagnostic {
    path: PathBuf,
    range: Range,
    severity: Severity,
    message: String,
    code: Option<String>,
    children: Vec<FileDiagnostic>,
}

impl FileDiagnostic {
    pub fn new(
        path: impl Into<PathBuf>,
        range: Range,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            range,
            severity,
            message: message.into(),
            code: None,
            children: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: Option<String>) -> Self {
        self.code = code;
        self
    }

    pub fn with_children(mut self, children: Vec<FileDiagnostic>) -> Self {
        self.children = children;
        self
    }

    /// Same diagnostic with its path (and its children's) resolved against
    /// `base` when relative.
    pub fn resolved_against(self, base: &Path) -> Self {
        let path = resolve_path(base, &self.path);
        let children = self
            .children
            .into_iter()
            .map(|child| child.resolved_against(base))
            .collect();
        Self {
            path,
            children,
            ..self
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn range(&self) -> Range {
        self.range
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Related notes and suggestions.
    pub fn children(&self) -> &[FileDiagnostic] {
        &self.children
    }

    /// Whether two diagnostics would look identical in an editor.
    pub fn same_report(&self, other: &FileDiagnostic) -> bool {
        self.range == other.range && self.severity == other.severity && self.message == other.message
    }

    /// Format as `path:line:col: severity[code]: message` (1-indexed for display).
    pub fn display_with_path(&self) -> String {
        let code = self.code.as_deref().map(|c| format!("[{c}]")).unwrap_or_default();
        let first_line = self.message.lines().next().unwrap_or_default();
        format!(
            "{}:{}:{}: {}{}: {}",
            self.path.display(),
            self.range.start.line + 1,
            self.range.start.column + 1,
            self.severity.label(),
            code,
            first_line,
        )
    }
}

/// Join `path` onto `base` when relative and drop `.` components.
pub fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    joined
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
