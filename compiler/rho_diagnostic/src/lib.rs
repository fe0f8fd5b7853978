//! Diagnostic reporting for the Rho runtime.
//!
//! The runtime never terminates the host on a script error; it hands a
//! [`Diagnostic`] to a [`DiagnosticSink`] and returns an error status to its
//! caller. Hosts pick the sink: `StderrSink` for a terminal session,
//! [`CollectingSink`] for tests and embedders.

use std::fmt;

use rho_ir::SymId;

/// Severity level for diagnostics.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// A single reportable event: message, offending symbol, source line.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// Symbol the report is about, when one exists.
    pub sym: SymId,
    /// Source line of the offending statement (0 when unknown).
    pub line: u32,
}

impl Diagnostic {
    /// Build an error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            sym: SymId::INVALID,
            line: 0,
        }
    }

    /// Attach the offending symbol.
    #[must_use]
    pub fn with_sym(mut self, sym: SymId) -> Self {
        self.sym = sym;
        self
    }

    /// Attach the source line.
    #[must_use]
    pub fn at_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line > 0 {
            write!(f, "{}: {} (line {})", self.severity, self.message, self.line)
        } else {
            write!(f, "{}: {}", self.severity, self.message)
        }
    }
}

/// Receives diagnostics from the runtime.
///
/// This is the single seam between the core and whatever surface displays
/// errors; the core calls [`report`](DiagnosticSink::report) and nothing else.
pub trait DiagnosticSink {
    fn report(&mut self, diag: Diagnostic);
}

/// Sink that stores every diagnostic, for tests and embedders.
#[derive(Default)]
pub struct CollectingSink {
    diagnostics: Vec<Diagnostic>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All diagnostics reported so far, in order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Number of error-severity diagnostics.
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    /// Drop everything collected so far.
    pub fn clear(&mut self) {
        self.diagnostics.clear();
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }
}

/// Sink that prints each diagnostic to stderr as it arrives.
#[derive(Default)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn report(&mut self, diag: Diagnostic) {
        eprintln!("{diag}");
    }
}
