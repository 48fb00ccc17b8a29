// src/diagnostics/publisher.rs

//! Published diagnostic set, kept in sync with the latest run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, trace};

use super::model::{FileDiagnostic, Severity};
use super::sink::DiagnosticsSink;

/// Absolute file path → diagnostics currently shown for it, in arrival order.
pub type PublishedSet = BTreeMap<PathBuf, Vec<FileDiagnostic>>;

/// Owns the [`PublishedSet`] and mirrors every change to a sink.
///
/// `clear` empties everything (once per run start); `publish` only ever
/// appends. Identical diagnostics are all kept unless dedupe is enabled.
pub struct DiagnosticPublisher {
    published: PublishedSet,
    sink: Arc<dyn DiagnosticsSink>,
    dedupe: bool,
}

impl std::fmt::Debug for DiagnosticPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticPublisher")
            .field("files", &self.published.len())
            .field("dedupe", &self.dedupe)
            .finish_non_exhaustive()
    }
}

impl DiagnosticPublisher {
    pub fn new(sink: Arc<dyn DiagnosticsSink>) -> Self {
        Self {
            published: PublishedSet::new(),
            sink,
            dedupe: false,
        }
    }

    pub fn with_dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe = dedupe;
        self
    }

    /// Empty the published set, telling the sink to drop every file shown so far.
    pub fn clear(&mut self) {
        debug!(files = self.published.len(), "clearing published diagnostics");
        for path in self.published.keys() {
            self.sink.set(path, &[]);
        }
        self.published.clear();
    }

    /// Append `diagnostic` to its file's sequence and push the new sequence.
    ///
    /// Relative paths are resolved against `base_dir`. Returns false when the
    /// diagnostic was dropped as a duplicate.
    pub fn publish(&mut self, diagnostic: FileDiagnostic, base_dir: &Path) -> bool {
        let diagnostic = diagnostic.resolved_against(base_dir);
        let path = diagnostic.path().to_path_buf();
        let entries = self.published.entry(path).or_default();

        if self.dedupe && entries.iter().any(|d| d.same_report(&diagnostic)) {
            trace!(path = %diagnostic.path().display(), "duplicate diagnostic dropped");
            return false;
        }

        entries.push(diagnostic);
        if let Some(last) = entries.last() {
            self.sink.set(last.path(), entries);
        }
        true
    }

    pub fn published(&self) -> &PublishedSet {
        &self.published
    }

    /// Diagnostics shown for `path` (empty if none).
    pub fn for_file(&self, path: &Path) -> &[FileDiagnostic] {
        self.published.get(path).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot::from_set(&self.published)
    }
}

/// Counts over a published set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    pub files: usize,
    pub errors: usize,
    pub warnings: usize,
    pub informational: usize,
}

impl DiagnosticsSnapshot {
    pub fn from_set(set: &PublishedSet) -> Self {
        let mut snapshot = DiagnosticsSnapshot {
            files: set.len(),
            ..Default::default()
        };
        for diagnostic in set.values().flatten() {
            match diagnostic.severity() {
                Severity::Error => snapshot.errors += 1,
                Severity::Warning => snapshot.warnings += 1,
                Severity::Note | Severity::Help => snapshot.informational += 1,
            }
        }
        snapshot
    }

    pub fn total(&self) -> usize {
        self.errors + self.warnings + self.informational
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Short form for summaries, e.g. `"E:1 W:2"`. Empty when nothing is shown.
    pub fn status_string(&self) -> String {
        let mut parts = Vec::new();
        if self.errors > 0 {
            parts.push(format!("E:{}", self.errors));
        }
        if self.warnings > 0 {
            parts.push(format!("W:{}", self.warnings));
        }
        if self.informational > 0 {
            parts.push(format!("I:{}", self.informational));
        }
        parts.join(" ")
    }
}
