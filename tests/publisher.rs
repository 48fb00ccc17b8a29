use std::path::{Path, PathBuf};
use std::sync::Arc;

use buildpipe::diagnostics::{
    DiagnosticPublisher, DiagnosticsSnapshot, FileDiagnostic, MemorySink, Position, Range,
    Severity,
};

fn diag(path: &str, line: u32, severity: Severity, message: &str) -> FileDiagnostic {
    FileDiagnostic::new(
        path,
        Range::new(Position::new(line, 0), Position::new(line, 3)),
        severity,
        message,
    )
}

fn publisher() -> (DiagnosticPublisher, MemorySink) {
    let sink = MemorySink::new();
    (DiagnosticPublisher::new(Arc::new(sink.clone())), sink)
}

#[test]
fn publish_resolves_relative_paths_and_keeps_arrival_order() {
    let (mut publisher, sink) = publisher();
    let base = Path::new("/work/demo");

    publisher.publish(diag("src/lib.rs", 9, Severity::Warning, "later line"), base);
    publisher.publish(diag("src/lib.rs", 1, Severity::Error, "earlier line"), base);
    publisher.publish(diag("/abs/other.rs", 0, Severity::Note, "absolute"), base);

    let lib = PathBuf::from("/work/demo/src/lib.rs");
    let shown = sink.get(&lib);
    assert_eq!(shown.len(), 2);
    assert_eq!(shown[0].message(), "later line");
    assert_eq!(shown[1].message(), "earlier line");
    assert_eq!(publisher.for_file(&lib).len(), 2);

    assert_eq!(sink.get(Path::new("/abs/other.rs")).len(), 1);
    assert_eq!(
        sink.shown_files(),
        vec![PathBuf::from("/abs/other.rs"), lib]
    );
}

#[test]
fn identical_diagnostics_are_all_kept_by_default() {
    let (mut publisher, sink) = publisher();
    let base = Path::new("/w");

    assert!(publisher.publish(diag("a.rs", 0, Severity::Warning, "dup"), base));
    assert!(publisher.publish(diag("a.rs", 0, Severity::Warning, "dup"), base));

    assert_eq!(sink.get(Path::new("/w/a.rs")).len(), 2);
}

#[test]
fn dedupe_drops_identical_reports_per_file() {
    let sink = MemorySink::new();
    let mut publisher = DiagnosticPublisher::new(Arc::new(sink.clone())).with_dedupe(true);
    let base = Path::new("/w");

    assert!(publisher.publish(diag("a.rs", 0, Severity::Warning, "dup"), base));
    assert!(!publisher.publish(diag("a.rs", 0, Severity::Warning, "dup"), base));
    // Same report in another file is not a duplicate.
    assert!(publisher.publish(diag("b.rs", 0, Severity::Warning, "dup"), base));
    // Different severity is not a duplicate.
    assert!(publisher.publish(diag("a.rs", 0, Severity::Error, "dup"), base));

    assert_eq!(sink.get(Path::new("/w/a.rs")).len(), 2);
    assert_eq!(sink.total(), 3);
}

#[test]
fn clear_empties_everything_in_the_sink() {
    let (mut publisher, sink) = publisher();
    let base = Path::new("/w");
    publisher.publish(diag("a.rs", 0, Severity::Error, "x"), base);
    publisher.publish(diag("b.rs", 0, Severity::Error, "y"), base);

    publisher.clear();

    assert!(publisher.published().is_empty());
    assert!(sink.shown_files().is_empty());
    assert_eq!(publisher.snapshot(), DiagnosticsSnapshot::default());

    // Clearing twice is harmless.
    publisher.clear();
    assert_eq!(sink.total(), 0);
}

#[test]
fn snapshot_counts_and_status_string() {
    let (mut publisher, _sink) = publisher();
    let base = Path::new("/w");
    publisher.publish(diag("a.rs", 0, Severity::Error, "e"), base);
    publisher.publish(diag("a.rs", 1, Severity::Warning, "w1"), base);
    publisher.publish(diag("b.rs", 0, Severity::Warning, "w2"), base);
    publisher.publish(diag("b.rs", 1, Severity::Help, "h"), base);

    let snapshot = publisher.snapshot();

    assert_eq!(snapshot.files, 2);
    assert_eq!(snapshot.errors, 1);
    assert_eq!(snapshot.warnings, 2);
    assert_eq!(snapshot.informational, 1);
    assert_eq!(snapshot.total(), 4);
    assert_eq!(snapshot.status_string(), "E:1 W:2 I:1");
    assert_eq!(DiagnosticsSnapshot::default().status_string(), "");
}

#[test]
fn children_are_resolved_with_their_parent() {
    let (mut publisher, sink) = publisher();
    let parent = diag("src/lib.rs", 3, Severity::Error, "parent")
        .with_children(vec![diag("src/other.rs", 1, Severity::Note, "related")]);

    publisher.publish(parent, Path::new("/w"));

    let shown = sink.get(Path::new("/w/src/lib.rs"));
    assert_eq!(
        shown[0].children()[0].path(),
        Path::new("/w/src/other.rs")
    );
    assert_eq!(
        shown[0].display_with_path(),
        "/w/src/lib.rs:4:1: error: parent"
    );
}
