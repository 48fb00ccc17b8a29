use std::path::Path;

use buildpipe::diagnostics::{DiagnosticParser, MessageFormat, Position, Range, Severity};
use buildpipe_test_utils::messages::{
    build_finished, compiler_artifact, compiler_message, diagnostic, secondary_span,
    simple_message, span, with_children, with_code,
};
use proptest::prelude::*;
use serde_json::json;

fn range(l0: u32, c0: u32, l1: u32, c1: u32) -> Range {
    Range::new(Position::new(l0, c0), Position::new(l1, c1))
}

#[test]
fn severity_mapping_never_drops() {
    assert_eq!(Severity::from_level("error"), Severity::Error);
    assert_eq!(Severity::from_level("warning"), Severity::Warning);
    assert_eq!(
        Severity::from_level("error: internal compiler error"),
        Severity::Error
    );
    assert!(Severity::from_level("note").is_informational());
    assert!(Severity::from_level("help").is_informational());
    assert!(Severity::from_level("failure-note").is_informational());
    assert!(Severity::from_level("").is_informational());
}

#[test]
fn unknown_level_diagnostic_is_still_emitted() {
    let mut parser = DiagnosticParser::new();
    let line = simple_message("shiny-new-level", "something odd", "src/lib.rs", 1, 1);

    let diags = parser.parse_line(&line);

    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].severity(), Severity::Help);
}

#[test]
fn coordinates_single_line_boundary() {
    let mut parser = DiagnosticParser::new();
    let line = compiler_message(diagnostic(
        "error",
        "boom",
        vec![span("src/main.rs", 1, 1, 1, 5)],
    ));

    let diags = parser.parse_line(&line);

    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].range(), range(0, 0, 0, 4));
}

#[test]
fn coordinates_zero_width_span() {
    let mut parser = DiagnosticParser::new();
    let line = compiler_message(diagnostic(
        "error",
        "expected `;`",
        vec![span("src/main.rs", 7, 12, 7, 12)],
    ));

    let diags = parser.parse_line(&line);

    assert_eq!(diags[0].range(), range(6, 11, 6, 11));
    assert!(diags[0].range().is_empty());
}

#[test]
fn coordinates_multi_line_span() {
    let mut parser = DiagnosticParser::new();
    let line = compiler_message(diagnostic(
        "warning",
        "unreachable",
        vec![span("src/lib.rs", 10, 5, 14, 6)],
    ));

    let diags = parser.parse_line(&line);

    assert_eq!(diags[0].range(), range(9, 4, 13, 5));
}

#[test]
fn malformed_and_foreign_lines_yield_nothing() {
    let mut parser = DiagnosticParser::new();

    assert!(parser.parse_line("not json").is_empty());
    assert!(
        parser
            .parse_line("{\"reason\":\"build-script-executed\"}")
            .is_empty()
    );
    assert!(parser.parse_line(&compiler_artifact()).is_empty());
    assert!(parser.parse_line(&build_finished(true)).is_empty());
    assert!(parser.parse_line("{\"reason\":\"compiler-message\"").is_empty());
    assert!(parser.parse_line("").is_empty());
}

#[test]
fn non_json_is_flagged_as_such() {
    let mut parser = DiagnosticParser::new();

    let parsed = parser.parse_message("{ this is program output }");
    assert!(!parsed.is_json);

    let parsed = parser.parse_message(&compiler_artifact());
    assert!(parsed.is_json);
    assert!(!parsed.is_diagnostic);
}

#[test]
fn check_warning_example_with_duplicate_key() {
    let mut parser = DiagnosticParser::new();
    let line = r#"{"reason":"compiler-message","package_id":"demo 0.1.0","message":{"message":"unused variable: `x`","level":"warning","spans":[{"file_name":"src/lib.rs","line_start":3,"line_start":3,"column_start":1,"column_end":10}]},"target":{"name":"demo"}}"#;

    let diags = parser.parse_line(line);

    assert_eq!(diags.len(), 1);
    let diag = &diags[0];
    assert_eq!(diag.path(), Path::new("src/lib.rs"));
    assert_eq!(diag.severity(), Severity::Warning);
    assert_eq!(diag.range(), range(2, 0, 2, 9));
    assert_eq!(parser.format(), Some(MessageFormat::Cargo));
}

#[test]
fn message_without_spans_yields_nothing_but_is_a_diagnostic() {
    let mut parser = DiagnosticParser::new();
    let line = compiler_message(diagnostic(
        "error",
        "aborting due to 2 previous errors",
        vec![],
    ));

    let parsed = parser.parse_message(&line);

    assert!(parsed.is_diagnostic);
    assert!(parsed.diagnostics.is_empty());
    assert_eq!(
        parsed.rendered.as_deref(),
        Some("error: aborting due to 2 previous errors\n")
    );
}

#[test]
fn code_children_and_secondary_spans_become_related() {
    let mut parser = DiagnosticParser::new();
    let mut primary = span("src/lib.rs", 5, 9, 5, 10);
    primary["label"] = json!("second mutable borrow occurs here");

    let diag = with_children(
        with_code(
            diagnostic(
                "error",
                "cannot borrow `v` as mutable more than once at a time",
                vec![
                    primary,
                    secondary_span("src/lib.rs", 4, 9, 10, "first mutable borrow occurs here"),
                ],
            ),
            "E0499",
        ),
        vec![
            json!({
                "message": "for more information, see the error index",
                "level": "note",
                "spans": [],
                "children": [],
            }),
            json!({
                "message": "consider cloning",
                "level": "help",
                "spans": [{
                    "file_name": "src/lib.rs",
                    "line_start": 4, "line_end": 4,
                    "column_start": 9, "column_end": 10,
                    "is_primary": true,
                    "suggested_replacement": "v.clone()",
                }],
                "children": [],
            }),
        ],
    );

    let diags = parser.parse_line(&compiler_message(diag));

    assert_eq!(diags.len(), 1, "children must not become top-level entries");
    let diag = &diags[0];
    assert_eq!(diag.code(), Some("E0499"));
    assert_eq!(
        diag.message(),
        "cannot borrow `v` as mutable more than once at a time\nsecond mutable borrow occurs here"
    );

    let children = diag.children();
    assert_eq!(children.len(), 3);

    assert_eq!(children[0].message(), "first mutable borrow occurs here");
    assert_eq!(children[0].severity(), Severity::Note);
    assert_eq!(children[0].range(), range(3, 8, 3, 9));

    // No spans: points at the parent.
    assert_eq!(children[1].range(), diag.range());
    assert_eq!(children[1].severity(), Severity::Note);

    assert_eq!(children[2].severity(), Severity::Help);
    assert_eq!(children[2].message(), "consider cloning: `v.clone()`");
}

#[test]
fn every_span_location_is_kept() {
    let mut parser = DiagnosticParser::new();
    let mut elsewhere = span("src/main.rs", 3, 1, 3, 8);
    elsewhere["is_primary"] = json!(false);

    let diags = parser.parse_line(&compiler_message(diagnostic(
        "warning",
        "unused imports: `HashMap` and `HashSet`",
        vec![
            span("src/lib.rs", 1, 24, 1, 31),
            span("src/lib.rs", 1, 33, 1, 40),
            elsewhere,
        ],
    )));

    assert_eq!(diags.len(), 1);
    let diag = &diags[0];
    assert_eq!(diag.range(), range(0, 23, 0, 30));

    let children = diag.children();
    assert_eq!(children.len(), 2);

    assert_eq!(children[0].path(), Path::new("src/lib.rs"));
    assert_eq!(children[0].range(), range(0, 32, 0, 39));
    assert_eq!(children[0].severity(), Severity::Warning);
    assert_eq!(children[0].message(), "unused imports: `HashMap` and `HashSet`");

    assert_eq!(children[1].path(), Path::new("src/main.rs"));
    assert_eq!(children[1].range(), range(2, 0, 2, 7));
    assert_eq!(children[1].severity(), Severity::Note);
    assert_eq!(children[1].message(), "unused imports: `HashMap` and `HashSet`");
}

#[test]
fn macro_expansion_is_walked_to_a_real_file() {
    let mut parser = DiagnosticParser::new();
    let mut inner = span("<::core::macros::panic>", 1, 1, 1, 20);
    inner["expansion"] = json!({
        "span": span("src/main.rs", 12, 5, 12, 30),
        "macro_decl_name": "panic!",
    });

    let diags = parser.parse_line(&compiler_message(diagnostic(
        "error",
        "in macro",
        vec![inner],
    )));

    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].path(), Path::new("src/main.rs"));
    assert_eq!(diags[0].range(), range(11, 4, 11, 29));
}

#[test]
fn unresolvable_primary_span_yields_nothing() {
    let mut parser = DiagnosticParser::new();
    let line = compiler_message(diagnostic(
        "error",
        "internal",
        vec![span("<anon>", 1, 1, 1, 2)],
    ));

    assert!(parser.parse_line(&line).is_empty());
}

#[test]
fn bare_rustc_format_is_detected_and_kept() {
    let mut parser = DiagnosticParser::new();
    let line = diagnostic("warning", "unused import", vec![span("lib.rs", 1, 5, 1, 12)]).to_string();

    let diags = parser.parse_line(&line);

    assert_eq!(diags.len(), 1);
    assert_eq!(parser.format(), Some(MessageFormat::Rustc));

    // A cargo envelope is not a diagnostic in this format.
    assert!(parser.parse_line(&compiler_artifact()).is_empty());

    parser.reset();
    assert_eq!(parser.format(), None);
}

#[test]
fn parse_then_resolve_against_working_dir() {
    let mut parser = DiagnosticParser::new();
    let diags = parser.parse_line(&simple_message("error", "x", "./src/lib.rs", 2, 3));

    let resolved = diags[0].clone().resolved_against(Path::new("/work/demo"));

    assert_eq!(resolved.path(), Path::new("/work/demo/src/lib.rs"));
}

proptest! {
    /// Lines and columns always shift down by exactly one, and the range
    /// never ends before it starts.
    #[test]
    fn tool_coordinates_shift_to_zero_based(
        line in 1u32..10_000,
        col in 1u32..500,
        extra_lines in 0u32..50,
        end_col in 1u32..500,
    ) {
        let r = Range::from_tool(line, col, line + extra_lines, end_col);
        prop_assert_eq!(r.start, Position::new(line - 1, col - 1));
        prop_assert!(r.start <= r.end);
        if extra_lines > 0 {
            prop_assert_eq!(r.end, Position::new(line + extra_lines - 1, end_col - 1));
        }
    }
}
