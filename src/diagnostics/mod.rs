// src/diagnostics/mod.rs

//! Structured diagnostics: data model, JSON-lines parser, per-file publisher.
//!
//! - [`model`]: `FileDiagnostic`, `Severity`, 0-based `Range`.
//! - [`parser`]: one tool output line in, zero or more diagnostics out.
//! - [`publisher`]: the published set, kept in sync with the latest run.
//! - [`sink`]: where published sets go (memory for hosts/tests, console).

pub mod model;
pub mod parser;
pub mod publisher;
pub mod sink;

pub use model::{FileDiagnostic, Position, Range, Severity};
pub use parser::{DiagnosticParser, MessageFormat, ParsedLine};
pub use publisher::{DiagnosticPublisher, DiagnosticsSnapshot, PublishedSet};
pub use sink::{ConsoleSink, DiagnosticsSink, MemorySink};
