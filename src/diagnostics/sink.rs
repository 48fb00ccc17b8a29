// src/diagnostics/sink.rs

//! Destinations for published diagnostics.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::model::FileDiagnostic;

/// Receives the full current sequence for a file each time it changes.
/// An empty slice means nothing is shown for that file any more.
pub trait DiagnosticsSink: Send + Sync {
    fn set(&self, path: &Path, diagnostics: &[FileDiagnostic]);
}

/// Keeps the last sequence per file; what an editor would be showing.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    files: Arc<Mutex<BTreeMap<PathBuf, Vec<FileDiagnostic>>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn files(&self) -> MutexGuard<'_, BTreeMap<PathBuf, Vec<FileDiagnostic>>> {
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current sequence for `path` (empty if none).
    pub fn get(&self, path: &Path) -> Vec<FileDiagnostic> {
        self.files().get(path).cloned().unwrap_or_default()
    }

    /// Files with a non-empty sequence, sorted.
    pub fn shown_files(&self) -> Vec<PathBuf> {
        self.files().keys().cloned().collect()
    }

    pub fn total(&self) -> usize {
        self.files().values().map(Vec::len).sum()
    }
}

impl DiagnosticsSink for MemorySink {
    fn set(&self, path: &Path, diagnostics: &[FileDiagnostic]) {
        let mut files = self.files();
        if diagnostics.is_empty() {
            files.remove(path);
        } else {
            files.insert(path.to_path_buf(), diagnostics.to_vec());
        }
    }
}

/// Prints each newly appended diagnostic as `path:line:col: severity: message`.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    printed: Mutex<HashMap<PathBuf, usize>>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiagnosticsSink for ConsoleSink {
    fn set(&self, path: &Path, diagnostics: &[FileDiagnostic]) {
        let mut printed = self.printed.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let seen = printed.entry(path.to_path_buf()).or_insert(0);
        if diagnostics.len() < *seen {
            *seen = 0;
        }
        for diagnostic in &diagnostics[*seen..] {
            println!("{}", diagnostic.display_with_path());
            for child in diagnostic.children() {
                println!("  {}", child.display_with_path());
            }
        }
        *seen = diagnostics.len();
    }
}
