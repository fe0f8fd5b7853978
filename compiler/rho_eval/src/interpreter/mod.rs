//! Interpreter state container.
//!
//! All runtime state — the symbol table, routine and builtin registries, the
//! lazy-compile callback, the diagnostics sink, the trace hook, and the
//! cooperative abort flag — lives in one [`Interp`] value threaded through
//! every core call. Nothing is module-level mutable state.
//!
//! The dispatcher itself lives in `crate::exec`, the call binder in
//! `crate::call`; both are `impl Interp` blocks so the whole engine shares
//! this one container.

mod builder;

pub use builder::InterpBuilder;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use rho_diagnostic::{Diagnostic, DiagnosticSink};
use rho_ir::{Name, NodeArena, NodeId, RoutineMeta, StringInterner, SymId};

use crate::call::Builtin;
use crate::errors::{Control, ExecError, ExecErrorKind, Status};
use crate::symtab::{Context, SymClass, SymbolTable};

/// Which flavor of routine a compiled body is.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum RoutineKind {
    Subroutine,
    Function,
    Block,
}

/// A routine handed back by the lazy compile callback.
///
/// The statement nodes are already in the shared arena; only registration is
/// lazy. The callback creates the formal-parameter symbols itself, through
/// the symbol table it is given.
pub struct CompiledRoutine {
    pub kind: RoutineKind,
    pub meta: RoutineMeta,
}

/// The "compile this routine's source now" seam.
///
/// Invoked by the dispatcher the first time an as-yet-uncompiled routine is
/// called by name; returning `None` means the routine does not exist.
pub trait RoutineCompiler {
    fn compile(
        &mut self,
        name: &str,
        symtab: &mut SymbolTable,
        interner: &StringInterner,
    ) -> Option<CompiledRoutine>;
}

/// One user-routine call frame.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Frame {
    pub(crate) routine: SymId,
    pub(crate) is_function: bool,
    /// Captured by a `Return` with a value inside a function.
    pub(crate) return_value: SymId,
}

/// The interpreter: symbol table plus statement executor.
pub struct Interp<'a> {
    pub(crate) nodes: &'a NodeArena,
    pub(crate) interner: &'a StringInterner,
    pub symtab: SymbolTable,
    pub(crate) routines: FxHashMap<Name, SymId>,
    pub(crate) builtins: FxHashMap<Name, Builtin>,
    pub(crate) compiler: Option<Box<dyn RoutineCompiler + 'a>>,
    pub(crate) sink: Box<dyn DiagnosticSink + 'a>,
    /// Observational per-statement hook, invoked before dispatch.
    pub(crate) trace: Option<Box<dyn FnMut(NodeId, u32) + 'a>>,
    abort: Arc<AtomicBool>,
    pub(crate) frames: Vec<Frame>,
    /// Set by `ReturnAll`; cleared only at the top level.
    pub(crate) unwinding: bool,
}

impl<'a> Interp<'a> {
    /// Start building an interpreter over a compiled program.
    pub fn builder(nodes: &'a NodeArena, interner: &'a StringInterner) -> InterpBuilder<'a> {
        InterpBuilder::new(nodes, interner)
    }

    /// Register a builtin routine under its declared name.
    pub fn register_builtin(&mut self, builtin: Builtin) {
        let name = self.interner.intern(&builtin.spec.name);
        self.builtins.insert(name, builtin);
    }

    /// Install a compiled user routine, creating its routine symbol.
    ///
    /// Formal-parameter symbols are re-parented into the routine's context so
    /// teardown and the recursion guard see them as the routine's own rows.
    pub fn install_routine(
        &mut self,
        name: Name,
        compiled: CompiledRoutine,
    ) -> Result<SymId, ExecError> {
        // A deferred placeholder keeps its symbol; compiling fills it in.
        let routine = match self.routines.get(&name) {
            Some(&sym) => sym,
            None => self.symtab.define(name, Context::TopLevel)?,
        };
        for param in &compiled.meta.params {
            let sym = self.symtab.get_mut(param.sym);
            sym.context = Context::Routine(routine);
        }
        let class = match compiled.kind {
            RoutineKind::Subroutine => SymClass::Subroutine(compiled.meta),
            RoutineKind::Function => SymClass::Function(compiled.meta),
            RoutineKind::Block => SymClass::BlockRoutine(compiled.meta),
        };
        self.symtab.get_mut(routine).class = class;
        self.routines.insert(name, routine);
        Ok(routine)
    }

    /// Register a routine by name before its body exists.
    ///
    /// The placeholder symbol carries a deferred class until the first call
    /// drives the compile callback; `install_routine` then fills in the same
    /// symbol, so ids handed out here stay valid across compilation.
    pub fn declare_routine(&mut self, name: Name, kind: RoutineKind) -> Result<SymId, ExecError> {
        if let Some(&sym) = self.routines.get(&name) {
            return Ok(sym);
        }
        let routine = self.symtab.define(name, Context::TopLevel)?;
        self.symtab.get_mut(routine).class = match kind {
            RoutineKind::Subroutine => SymClass::DeferredSubroutine,
            RoutineKind::Function => SymClass::DeferredFunction,
            RoutineKind::Block => SymClass::DeferredBlock,
        };
        self.routines.insert(name, routine);
        Ok(routine)
    }

    /// Resolve a routine name, compiling on demand on first use.
    pub(crate) fn resolve_routine(&mut self, name: Name, line: u32) -> Result<SymId, ExecError> {
        if let Some(&sym) = self.routines.get(&name) {
            if !self.symtab.get(sym).class.is_routine() {
                // Deferred placeholder: compile now and re-resolve.
                self.compile_on_demand(name)?;
                return self.routines.get(&name).copied().ok_or_else(|| {
                    self.unknown_routine(name, line)
                });
            }
            return Ok(sym);
        }
        self.compile_on_demand(name)?;
        self.routines
            .get(&name)
            .copied()
            .ok_or_else(|| self.unknown_routine(name, line))
    }

    fn compile_on_demand(&mut self, name: Name) -> Result<(), ExecError> {
        let text = self.interner.lookup(name);
        let compiled = match self.compiler.as_mut() {
            Some(compiler) => compiler.compile(text, &mut self.symtab, self.interner),
            None => None,
        };
        if let Some(compiled) = compiled {
            tracing::debug!(routine = text, "compiled routine on demand");
            self.install_routine(name, compiled)?;
        }
        Ok(())
    }

    pub(crate) fn unknown_routine(&self, name: Name, line: u32) -> ExecError {
        ExecError::new(ExecErrorKind::UnknownRoutine {
            name: self.interner.lookup(name).to_owned(),
        })
        .at_line(line)
    }

    /// Metadata of a named formal-parameter list, for tests and hosts.
    pub fn routine_meta(&self, routine: SymId) -> Option<&RoutineMeta> {
        match &self.symtab.get(routine).class {
            SymClass::Subroutine(meta)
            | SymClass::Function(meta)
            | SymClass::BlockRoutine(meta) => Some(meta),
            _ => None,
        }
    }

    /// Context new temporaries should belong to: the innermost routine
    /// frame, or the top level.
    pub(crate) fn current_context(&self) -> Context {
        match self.frames.last() {
            Some(frame) => Context::Routine(frame.routine),
            None => Context::TopLevel,
        }
    }

    /// Shared handle for requesting a cooperative abort.
    ///
    /// The dispatcher converts the flag into an error at the next statement
    /// boundary; nothing is preempted.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    /// Request a cooperative abort from this thread.
    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }

    pub(crate) fn abort_requested(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    pub(crate) fn clear_abort(&self) {
        self.abort.store(false, Ordering::Relaxed);
    }

    /// Report an error through the sink unless some boundary already did.
    pub(crate) fn report_once(&mut self, err: &mut ExecError) {
        if err.reported {
            return;
        }
        err.reported = true;
        let diag = Diagnostic::error(err.to_string())
            .with_sym(err.sym)
            .at_line(err.line);
        self.sink.report(diag);
    }

    /// Execute a top-level statement list the way the interactive surface
    /// does: an error is reported, the rest of the list is skipped, and the
    /// interpreter is ready for the next input.
    ///
    /// Returns the status of the last statement attempted.
    pub fn run_toplevel(&mut self, stmts: &[NodeId]) -> Status {
        self.clear_abort();
        self.unwinding = false;
        for &stmt in stmts {
            match self.execute(stmt) {
                Ok(Control::Normal) => {}
                Ok(control) => {
                    // Break/Continue cannot cross the top level; Return and
                    // ReturnAll simply end the input.
                    self.unwinding = false;
                    return Ok(control);
                }
                Err(mut err) => {
                    self.report_once(&mut err);
                    return Err(err);
                }
            }
        }
        Ok(Control::Normal)
    }
}
