//! Builders for the build tool's JSON-lines messages.

use serde_json::{json, Value};

/// A primary span (1-based, as the tool emits it).
pub fn span(file: &str, line_start: u32, column_start: u32, line_end: u32, column_end: u32) -> Value {
    json!({
        "file_name": file,
        "byte_start": 0,
        "byte_end": 0,
        "line_start": line_start,
        "line_end": line_end,
        "column_start": column_start,
        "column_end": column_end,
        "is_primary": true,
        "label": null,
        "suggested_replacement": null,
        "expansion": null,
    })
}

/// A non-primary span with a label.
pub fn secondary_span(file: &str, line: u32, column_start: u32, column_end: u32, label: &str) -> Value {
    let mut span = span(file, line, column_start, line, column_end);
    span["is_primary"] = json!(false);
    span["label"] = json!(label);
    span
}

/// A rustc diagnostic object.
pub fn diagnostic(level: &str, message: &str, spans: Vec<Value>) -> Value {
    json!({
        "$message_type": "diagnostic",
        "message": message,
        "code": null,
        "level": level,
        "spans": spans,
        "children": [],
        "rendered": format!("{level}: {message}\n"),
    })
}

pub fn with_code(mut diagnostic: Value, code: &str) -> Value {
    diagnostic["code"] = json!({ "code": code, "explanation": null });
    diagnostic
}

pub fn with_children(mut diagnostic: Value, children: Vec<Value>) -> Value {
    diagnostic["children"] = Value::Array(children);
    diagnostic
}

/// A cargo `compiler-message` envelope around `diagnostic`, as one line.
pub fn compiler_message(diagnostic: Value) -> String {
    json!({
        "reason": "compiler-message",
        "package_id": "path+file:///work/demo#0.1.0",
        "manifest_path": "/work/demo/Cargo.toml",
        "target": { "kind": ["lib"], "name": "demo", "src_path": "/work/demo/src/lib.rs" },
        "message": diagnostic,
    })
    .to_string()
}

/// Shorthand for a one-span cargo warning or error line.
pub fn simple_message(level: &str, message: &str, file: &str, line: u32, column: u32) -> String {
    compiler_message(diagnostic(
        level,
        message,
        vec![span(file, line, column, line, column + 1)],
    ))
}

pub fn compiler_artifact() -> String {
    json!({
        "reason": "compiler-artifact",
        "package_id": "path+file:///work/demo#0.1.0",
        "target": { "kind": ["lib"], "name": "demo" },
        "filenames": ["/work/demo/target/debug/libdemo.rlib"],
        "fresh": false,
    })
    .to_string()
}

pub fn build_finished(success: bool) -> String {
    json!({ "reason": "build-finished", "success": success }).to_string()
}
