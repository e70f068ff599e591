//! §7 category 1 diagnostics: conditions that are undefined C semantics rather than
//! malformed IR (divide-by-zero, oversized shift, tautological compare, self-referencing
//! memory address). Simplification always succeeds regardless of whether a sink is
//! attached; a sink just lets a host observe what was left unfolded and why.

use serde::{Deserialize, Serialize};

use crate::insn::{InsnId, SourcePos};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    DivideByZero,
    ShiftOverflow,
    TautologicalCompare,
    SelfReferencingAddress,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub insn: InsnId,
    pub pos: SourcePos,
    pub message: String,
}

/// Injection seam for warnings (§9 Design Notes, "Warnings as effects"): keeps the core
/// simplifier testable without coupling it to a concrete logging backend.
pub trait DiagnosticSink {
    fn emit(&mut self, diagnostic: Diagnostic);
}

/// Default sink: forwards to `log::warn!`, matching the workspace convention of piping
/// pass-level warnings through `log` rather than printing directly.
#[derive(Debug, Default)]
pub struct LogDiagnosticSink;

impl DiagnosticSink for LogDiagnosticSink {
    fn emit(&mut self, diagnostic: Diagnostic) {
        log::warn!(
            "{:?} at {:?} ({}:{}): {}",
            diagnostic.kind,
            diagnostic.insn,
            diagnostic.pos.line,
            diagnostic.pos.column,
            diagnostic.message
        );
    }
}

/// Test-only sink that records diagnostics instead of logging them, so assertions can
/// check exactly what fired without scraping log output.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub recorded: Vec<Diagnostic>,
}

impl DiagnosticSink for RecordingSink {
    fn emit(&mut self, diagnostic: Diagnostic) {
        self.recorded.push(diagnostic);
    }
}

/// A sink that discards everything, for callers that genuinely don't want warnings.
#[derive(Debug, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn emit(&mut self, _diagnostic: Diagnostic) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_every_diagnostic() {
        let mut sink = RecordingSink::default();
        sink.emit(Diagnostic {
            kind: DiagnosticKind::DivideByZero,
            insn: InsnId(3),
            pos: SourcePos::default(),
            message: "division by zero".into(),
        });
        assert_eq!(sink.recorded.len(), 1);
        assert_eq!(sink.recorded[0].kind, DiagnosticKind::DivideByZero);
    }
}
