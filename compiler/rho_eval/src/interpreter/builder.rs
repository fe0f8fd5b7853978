//! Builder for [`Interp`].

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use rho_diagnostic::{DiagnosticSink, StderrSink};
use rho_ir::{NodeArena, NodeId, StringInterner};

use crate::symtab::SymbolTable;

use super::{Interp, RoutineCompiler};

/// Configures and assembles an [`Interp`].
///
/// Everything is optional: the default interpreter reports to stderr, has no
/// lazy compiler, no trace hook, and a fresh abort flag.
pub struct InterpBuilder<'a> {
    nodes: &'a NodeArena,
    interner: &'a StringInterner,
    max_slots: Option<usize>,
    symtab: Option<SymbolTable>,
    compiler: Option<Box<dyn RoutineCompiler + 'a>>,
    sink: Option<Box<dyn DiagnosticSink + 'a>>,
    trace: Option<Box<dyn FnMut(NodeId, u32) + 'a>>,
    abort: Option<Arc<AtomicBool>>,
}

impl<'a> InterpBuilder<'a> {
    pub(crate) fn new(nodes: &'a NodeArena, interner: &'a StringInterner) -> Self {
        InterpBuilder {
            nodes,
            interner,
            max_slots: None,
            symtab: None,
            compiler: None,
            sink: None,
            trace: None,
            abort: None,
        }
    }

    /// Cap the symbol-table growth.
    #[must_use]
    pub fn max_slots(mut self, max_slots: usize) -> Self {
        self.max_slots = Some(max_slots);
        self
    }

    /// Start from a table the compiler already populated with literal and
    /// variable symbols.
    #[must_use]
    pub fn symtab(mut self, symtab: SymbolTable) -> Self {
        self.symtab = Some(symtab);
        self
    }

    /// Attach the on-demand routine compiler.
    #[must_use]
    pub fn compiler(mut self, compiler: impl RoutineCompiler + 'a) -> Self {
        self.compiler = Some(Box::new(compiler));
        self
    }

    /// Route diagnostics somewhere other than stderr.
    #[must_use]
    pub fn sink(mut self, sink: impl DiagnosticSink + 'a) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Observe every statement before it runs.
    #[must_use]
    pub fn trace(mut self, hook: impl FnMut(NodeId, u32) + 'a) -> Self {
        self.trace = Some(Box::new(hook));
        self
    }

    /// Share an abort flag with the host (e.g. a Ctrl-C handler).
    #[must_use]
    pub fn abort_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.abort = Some(flag);
        self
    }

    pub fn build(self) -> Interp<'a> {
        let symtab = match (self.symtab, self.max_slots) {
            (Some(table), _) => table,
            (None, Some(max)) => SymbolTable::with_max_slots(max),
            (None, None) => SymbolTable::new(),
        };
        Interp {
            nodes: self.nodes,
            interner: self.interner,
            symtab,
            routines: FxHashMap::default(),
            builtins: FxHashMap::default(),
            compiler: self.compiler,
            sink: self.sink.unwrap_or_else(|| Box::new(StderrSink)),
            trace: self.trace,
            abort: self.abort.unwrap_or_default(),
            frames: Vec::new(),
            unwinding: false,
        }
    }
}
