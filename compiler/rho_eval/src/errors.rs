//! Error and control-flow signal types.
//!
//! The original engine threads break/continue/return/error through every
//! handler as sentinel return values. That discipline is kept, split across
//! the two halves of a `Result`: genuine failures are the `Err` side
//! ([`ExecError`]), and the non-failure signals are the `Ok` side
//! ([`Control`]), because loops and case statements must branch on which
//! signal arrived, not merely detect failure.

use std::fmt;

use rho_ir::SymId;
use thiserror::Error;

/// What kind of failure occurred.
///
/// Grouped by [`ErrorClass`]: allocation failures, binding failures detected
/// by the call binder, and assignment/evaluation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecErrorKind {
    // Allocation
    #[error("symbol table exhausted")]
    TableExhausted,

    // Binding
    #[error("unknown keyword: {name}")]
    UnknownKeyword { name: String },
    #[error("keyword parameter defined both ways: {name}")]
    DoublyDefined { name: String },
    #[error("too many arguments to {routine}")]
    TooManyArgs { routine: String },
    #[error("too few arguments to {routine}")]
    TooFewArgs { routine: String },
    #[error("unknown routine: {name}")]
    UnknownRoutine { name: String },
    #[error("{routine} is not a function")]
    NotAFunction { routine: String },
    #[error("a subroutine may not return a value")]
    SubroutineReturnsValue,
    #[error("a function must return a value")]
    FunctionReturnsNothing,

    // Assignment / evaluation
    #[error("assignment target is protected")]
    ProtectedTarget,
    #[error("illegal conversion from {from} to {to}")]
    IllegalConversion { from: String, to: String },
    #[error("expression must reduce to a scalar")]
    NonScalarCondition,
    #[error("loop bounds must be numeric scalars")]
    BadLoopBound,
    #[error("expression does not produce a value")]
    NotAValue,
    #[error("variable is undefined")]
    UndefinedValue,

    // Cooperative cancellation
    #[error("execution aborted")]
    Aborted,
}

/// Coarse taxonomy used by hosts and tests.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorClass {
    Allocation,
    Binding,
    Assignment,
    Aborted,
}

impl ExecErrorKind {
    /// Classify this kind into the coarse taxonomy.
    pub fn class(&self) -> ErrorClass {
        match self {
            ExecErrorKind::TableExhausted => ErrorClass::Allocation,
            ExecErrorKind::UnknownKeyword { .. }
            | ExecErrorKind::DoublyDefined { .. }
            | ExecErrorKind::TooManyArgs { .. }
            | ExecErrorKind::TooFewArgs { .. }
            | ExecErrorKind::UnknownRoutine { .. }
            | ExecErrorKind::NotAFunction { .. }
            | ExecErrorKind::SubroutineReturnsValue
            | ExecErrorKind::FunctionReturnsNothing => ErrorClass::Binding,
            ExecErrorKind::ProtectedTarget
            | ExecErrorKind::IllegalConversion { .. }
            | ExecErrorKind::NonScalarCondition
            | ExecErrorKind::BadLoopBound
            | ExecErrorKind::NotAValue
            | ExecErrorKind::UndefinedValue => ErrorClass::Assignment,
            ExecErrorKind::Aborted => ErrorClass::Aborted,
        }
    }
}

/// A script-level failure in flight.
///
/// Carries the offending symbol and source line for the diagnostic, plus a
/// `reported` flag so the innermost routine boundary reports each error
/// exactly once while every enclosing frame still sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecError {
    pub kind: ExecErrorKind,
    /// Offending symbol, when one exists.
    pub sym: SymId,
    /// Source line of the offending statement (0 when unknown).
    pub line: u32,
    /// Set once a routine boundary has handed this error to the sink.
    pub reported: bool,
}

impl ExecError {
    pub fn new(kind: ExecErrorKind) -> Self {
        ExecError {
            kind,
            sym: SymId::INVALID,
            line: 0,
            reported: false,
        }
    }

    /// Attach the offending symbol.
    #[must_use]
    pub fn with_sym(mut self, sym: SymId) -> Self {
        self.sym = sym;
        self
    }

    /// Attach the source line, keeping an earlier (more precise) one.
    #[must_use]
    pub fn at_line(mut self, line: u32) -> Self {
        if self.line == 0 {
            self.line = line;
        }
        self
    }

    /// Coarse classification of the failure.
    pub fn class(&self) -> ErrorClass {
        self.kind.class()
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl std::error::Error for ExecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl From<ExecErrorKind> for ExecError {
    fn from(kind: ExecErrorKind) -> Self {
        ExecError::new(kind)
    }
}

/// Non-failure control-flow signals, threaded through every handler.
///
/// Every handler forwards signals it does not consume: loops consume `Break`
/// and `Continue`, routine boundaries consume `Return`, and only the top
/// level consumes `ReturnAll`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Control {
    /// Statement completed; continue with the next one.
    Normal,
    /// End the innermost loop successfully.
    Break,
    /// Skip to the innermost loop's next condition check.
    Continue,
    /// Leave the enclosing routine.
    Return,
    /// Unwind every routine frame back to the top level.
    ReturnAll,
}

impl Control {
    /// True for `Normal`.
    #[inline]
    pub fn is_normal(self) -> bool {
        matches!(self, Control::Normal)
    }
}

/// Status of executing one statement: a control signal or an error.
pub type Status = Result<Control, ExecError>;

/// Result of evaluating a value position: a symbol id or an error.
pub type ValueResult = Result<SymId, ExecError>;
