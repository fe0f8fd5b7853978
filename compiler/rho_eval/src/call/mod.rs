//! Argument binding and routine invocation.
//!
//! Builtin and user-defined calls share one binding skeleton: partition the
//! actual arguments into positional and keyword-tagged, match keyword names
//! by case-sensitive prefix, evaluate each bound value exactly once in the
//! caller's original order, and hand newly produced free temporaries to the
//! callee's context so teardown reclaims them.
//!
//! Builtins bind against a declared [`BuiltinSpec`] keyword table; user
//! routines bind against their formal-parameter names. The binder never
//! mutates formal rows itself; [`Interp::invoke_user`] snapshots them first
//! and rebinds them only after every argument has been evaluated in the
//! caller's frame.

use smallvec::{smallvec, SmallVec};

use rho_ir::{Arg, ArgRange, BuiltinSpec, KeywordSpec, Name, Operand, RoutineParam, StringInterner, SymId};

use crate::errors::{Control, ExecError, ExecErrorKind, ValueResult};
use crate::interpreter::{Frame, Interp};
use crate::recursion::ParamSnapshot;
use crate::replace::deep_copy;
use crate::symtab::{Context, SymClass};

/// Prefix that zeroes a parameter or flips a mode keyword's polarity.
const NO_PREFIX: &str = "NO";
/// Keyword accepted by every builtin; its value replaces the mode wholesale.
const MODE_KEYWORD: &str = "MODE";

/// Native handler of a builtin routine.
///
/// Returns the result symbol, or [`SymId::INVALID`] when the builtin
/// produces no value.
pub type BuiltinFn = fn(&mut Interp<'_>, &BoundArgs) -> ValueResult;

/// A registered builtin: declared interface plus native handler.
pub struct Builtin {
    pub spec: BuiltinSpec,
    pub func: BuiltinFn,
}

impl Builtin {
    pub fn new(spec: BuiltinSpec, func: BuiltinFn) -> Self {
        Builtin { spec, func }
    }
}

/// Arguments of one builtin call, as the native handler sees them.
///
/// Keyword slots occupy `0..offset`; positional arguments land at
/// `offset..`. An unsupplied or explicitly zeroed slot holds
/// [`SymId::INVALID`].
#[derive(Debug)]
pub struct BoundArgs {
    slots: SmallVec<[SymId; 8]>,
    /// Tracks supplied slots, including zeroed ones, for doubly-defined
    /// detection.
    filled: SmallVec<[bool; 8]>,
    /// Shared mode value: default, then mode-bit keywords OR/AND-NOT their
    /// patterns in, and a `MODE` keyword replaces it outright.
    pub mode: u64,
    offset: usize,
    npos: usize,
    /// Free temporaries produced while binding, reclaimed after the call.
    temps: SmallVec<[SymId; 4]>,
}

impl BoundArgs {
    fn new(offset: usize, mode: u64) -> Self {
        BoundArgs {
            slots: smallvec![SymId::INVALID; offset],
            filled: smallvec![false; offset],
            mode,
            offset,
            npos: 0,
            temps: SmallVec::new(),
        }
    }

    /// The `i`-th positional argument, or `INVALID` when absent.
    pub fn positional(&self, i: usize) -> SymId {
        self.slots
            .get(self.offset + i)
            .copied()
            .unwrap_or(SymId::INVALID)
    }

    /// The keyword slot at `slot`, or `INVALID` when unsupplied or zeroed.
    pub fn keyword(&self, slot: usize) -> SymId {
        self.slots.get(slot).copied().unwrap_or(SymId::INVALID)
    }

    /// True when the keyword slot was supplied at all, even in zeroed form.
    pub fn keyword_supplied(&self, slot: usize) -> bool {
        self.filled.get(slot).copied().unwrap_or(false)
    }

    /// Number of positional arguments supplied.
    pub fn npos(&self) -> usize {
        self.npos
    }
}

/// A keyword name resolved against a declared table.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
struct KeywordHit {
    index: usize,
    /// Matched through the `NO` prefix.
    negated: bool,
}

/// Match a user-supplied keyword against a builtin's declared table.
///
/// Case-sensitive prefix matching, first declaration wins. A direct match
/// always beats the `NO`-prefixed reading, so a keyword that itself starts
/// with `NO` stays reachable.
fn match_declared(keywords: &[KeywordSpec], user: &str) -> Option<KeywordHit> {
    if user.is_empty() {
        return None;
    }
    if let Some(index) = keywords.iter().position(|k| k.name.starts_with(user)) {
        return Some(KeywordHit {
            index,
            negated: false,
        });
    }
    if let Some(rest) = user.strip_prefix(NO_PREFIX) {
        if !rest.is_empty() {
            if let Some(index) = keywords.iter().position(|k| k.name.starts_with(rest)) {
                return Some(KeywordHit {
                    index,
                    negated: true,
                });
            }
        }
    }
    None
}

/// Match a user-supplied keyword against a routine's formal names.
fn match_param(
    params: &[RoutineParam],
    interner: &StringInterner,
    user: &str,
) -> Option<KeywordHit> {
    if user.is_empty() {
        return None;
    }
    if let Some(index) = params
        .iter()
        .position(|p| interner.lookup(p.name).starts_with(user))
    {
        return Some(KeywordHit {
            index,
            negated: false,
        });
    }
    if let Some(rest) = user.strip_prefix(NO_PREFIX) {
        if !rest.is_empty() {
            if let Some(index) = params
                .iter()
                .position(|p| interner.lookup(p.name).starts_with(rest))
            {
                return Some(KeywordHit {
                    index,
                    negated: true,
                });
            }
        }
    }
    None
}

fn is_universal_mode(user: &str) -> bool {
    !user.is_empty() && MODE_KEYWORD.starts_with(user)
}

/// Actual arguments bound to a user routine's formals.
struct UserBinding {
    /// Value per formal, in declaration order; `INVALID` for unset or
    /// zeroed parameters.
    bindings: SmallVec<[SymId; 8]>,
    /// Free temporaries produced while binding; the callee context reclaims
    /// them at teardown.
    temps: SmallVec<[SymId; 4]>,
}

impl<'a> Interp<'a> {
    /// Evaluate one argument position, or bind it unevaluated.
    ///
    /// Preserve keywords and evaluation-suppressing routines receive a call
    /// node wrapped as an `ExecutableNode` temporary instead of its result.
    fn eval_binding(
        &mut self,
        value: Operand,
        suppress: bool,
        ctx: Context,
        temps: &mut SmallVec<[SymId; 4]>,
        line: u32,
    ) -> ValueResult {
        if suppress {
            return match value {
                Operand::Sym(sym) => Ok(sym),
                Operand::Node(node) => {
                    let id = self.symtab.create_temp().map_err(|e| e.at_line(line))?;
                    let sym = self.symtab.get_mut(id);
                    sym.class = SymClass::ExecutableNode(node);
                    sym.context = ctx;
                    temps.push(id);
                    Ok(id)
                }
            };
        }
        let id = self.eval_operand(value, line)?;
        if self.symtab.is_free_temp(id) {
            self.symtab.get_mut(id).context = ctx;
            temps.push(id);
        }
        Ok(id)
    }

    /// Bind actual arguments against a builtin's keyword table.
    #[expect(
        clippy::cast_sign_loss,
        reason = "A MODE value reinterprets the scalar's bits as a mask"
    )]
    pub(crate) fn bind_builtin(
        &mut self,
        spec: &BuiltinSpec,
        args: ArgRange,
        line: u32,
    ) -> Result<BoundArgs, ExecError> {
        let args = self.nodes.args(args);
        let ctx = self.current_context();
        let mut bound = BoundArgs::new(spec.positional_offset, spec.default_mode);

        for arg in args {
            let Some(kw) = arg.keyword else {
                if bound.npos >= spec.max_args {
                    return Err(ExecError::new(ExecErrorKind::TooManyArgs {
                        routine: spec.name.clone(),
                    })
                    .at_line(line));
                }
                let id =
                    self.eval_binding(arg.value, spec.suppress_eval, ctx, &mut bound.temps, line)?;
                bound.slots.push(id);
                bound.filled.push(true);
                bound.npos += 1;
                continue;
            };

            let text = self.interner.lookup(kw);
            let Some(hit) = match_declared(&spec.keywords, text) else {
                if is_universal_mode(text) {
                    // MODE replaces the shared value; it never ORs.
                    let id = self.eval_binding(arg.value, false, ctx, &mut bound.temps, line)?;
                    let value = self.symtab.scalar_value(id).map_err(|e| e.at_line(line))?;
                    bound.mode = value.as_i64() as u64;
                    continue;
                }
                return Err(ExecError::new(ExecErrorKind::UnknownKeyword {
                    name: text.to_owned(),
                })
                .at_line(line));
            };

            let kwspec = &spec.keywords[hit.index];
            if let Some(bits) = kwspec.mode_bits {
                // Set when declared polarity and NO-negation agree, clear
                // otherwise.
                if kwspec.clear == hit.negated {
                    bound.mode |= bits;
                } else {
                    bound.mode &= !bits;
                }
                continue;
            }

            let slot = spec.keywords[..hit.index]
                .iter()
                .filter(|k| k.consumes_slot())
                .count();
            if bound.filled[slot] {
                return Err(ExecError::new(ExecErrorKind::DoublyDefined {
                    name: kwspec.name.clone(),
                })
                .at_line(line));
            }
            bound.filled[slot] = true;
            if hit.negated {
                // NO on a non-mode keyword zeroes the slot.
                bound.slots[slot] = SymId::INVALID;
            } else {
                let suppress = spec.suppress_eval || kwspec.preserve;
                let id = self.eval_binding(arg.value, suppress, ctx, &mut bound.temps, line)?;
                bound.slots[slot] = id;
            }
        }

        if bound.npos < spec.min_args {
            return Err(ExecError::new(ExecErrorKind::TooFewArgs {
                routine: spec.name.clone(),
            })
            .at_line(line));
        }
        Ok(bound)
    }

    /// Call a builtin routine: bind, invoke, reclaim argument temporaries.
    pub(crate) fn call_builtin(&mut self, routine: Name, args: ArgRange, line: u32) -> ValueResult {
        if self.unwinding {
            return Ok(SymId::INVALID);
        }
        let Some(builtin) = self.builtins.get(&routine) else {
            return Err(self.unknown_routine(routine, line));
        };
        let spec = builtin.spec.clone();
        let func = builtin.func;
        let bound = self.bind_builtin(&spec, args, line)?;
        tracing::trace!(routine = %spec.name, mode = bound.mode, npos = bound.npos, "builtin call");
        let result = func(self, &bound).map_err(|e| e.at_line(line));
        self.free_call_temps(&bound.temps, result.as_ref().ok().copied());
        result
    }

    /// Bind actual arguments against a user routine's formal parameters.
    ///
    /// Evaluation happens in the caller's frame, before any formal row is
    /// touched, so argument expressions still see the caller's bindings.
    fn bind_user(
        &mut self,
        routine: SymId,
        routine_name: &str,
        params: &[RoutineParam],
        variadic: bool,
        args: &[Arg],
        line: u32,
    ) -> Result<UserBinding, ExecError> {
        let ctx = Context::Routine(routine);
        let mut bindings: SmallVec<[SymId; 8]> = smallvec![SymId::INVALID; params.len()];
        let mut filled: SmallVec<[bool; 8]> = smallvec![false; params.len()];
        let mut temps: SmallVec<[SymId; 4]> = SmallVec::new();
        let mut npos = 0usize;
        // Surplus positional arguments, destined for the variadic tail list.
        let mut surplus: Vec<SymId> = Vec::new();

        for arg in args {
            let Some(kw) = arg.keyword else {
                let id = self.eval_binding(arg.value, false, ctx, &mut temps, line)?;
                if variadic && !params.is_empty() && npos + 1 >= params.len() {
                    surplus.push(id);
                } else if npos < params.len() {
                    if filled[npos] {
                        return Err(ExecError::new(ExecErrorKind::DoublyDefined {
                            name: self.interner.lookup(params[npos].name).to_owned(),
                        })
                        .at_line(line));
                    }
                    bindings[npos] = id;
                    filled[npos] = true;
                } else {
                    return Err(ExecError::new(ExecErrorKind::TooManyArgs {
                        routine: routine_name.to_owned(),
                    })
                    .at_line(line));
                }
                npos += 1;
                continue;
            };

            let text = self.interner.lookup(kw);
            let Some(hit) = match_param(params, self.interner, text) else {
                return Err(ExecError::new(ExecErrorKind::UnknownKeyword {
                    name: text.to_owned(),
                })
                .at_line(line));
            };
            if filled[hit.index] {
                return Err(ExecError::new(ExecErrorKind::DoublyDefined {
                    name: self.interner.lookup(params[hit.index].name).to_owned(),
                })
                .at_line(line));
            }
            let id = self.eval_binding(arg.value, false, ctx, &mut temps, line)?;
            filled[hit.index] = true;
            if hit.negated {
                // Only NO plus the literal affirmative scalar zeroes a
                // parameter; anything else is not a recognized keyword.
                if !self.symtab.is_affirmative(id) {
                    return Err(ExecError::new(ExecErrorKind::UnknownKeyword {
                        name: text.to_owned(),
                    })
                    .at_line(line));
                }
                bindings[hit.index] = SymId::INVALID;
            } else {
                bindings[hit.index] = id;
            }
        }

        if !surplus.is_empty() {
            let tail = params.len() - 1;
            if filled[tail] {
                return Err(ExecError::new(ExecErrorKind::DoublyDefined {
                    name: self.interner.lookup(params[tail].name).to_owned(),
                })
                .at_line(line));
            }
            bindings[tail] = self.collect_variadic_tail(&surplus, ctx, &mut temps, line)?;
            filled[tail] = true;
        }

        Ok(UserBinding { bindings, temps })
    }

    /// Build the synthetic aggregate holding surplus positional arguments.
    ///
    /// Free temporaries are re-parented into the list, which then owns them;
    /// anything else is referenced through a non-owning `ListPointer` so the
    /// caller's storage survives routine teardown.
    fn collect_variadic_tail(
        &mut self,
        surplus: &[SymId],
        ctx: Context,
        temps: &mut SmallVec<[SymId; 4]>,
        line: u32,
    ) -> ValueResult {
        let list = self.symtab.create_temp().map_err(|e| e.at_line(line))?;
        let mut children = Vec::with_capacity(surplus.len());
        for &id in surplus {
            if self.symtab.is_free_temp(id) {
                self.symtab.get_mut(id).context = Context::Embedded(list);
                children.push(id);
            } else {
                let alias = self.symtab.create_temp().map_err(|e| e.at_line(line))?;
                let sym = self.symtab.get_mut(alias);
                sym.class = SymClass::ListPointer(id);
                sym.context = Context::Embedded(list);
                children.push(alias);
            }
        }
        let sym = self.symtab.get_mut(list);
        sym.class = SymClass::PlainList(children);
        sym.context = ctx;
        temps.push(list);
        Ok(list)
    }

    /// Call a user routine: resolve, bind, snapshot formals, run the body,
    /// tear the frame down, restore formals.
    ///
    /// `want_value` is set for calls in expression position, which require a
    /// function; a statement-position call of a function discards its value.
    pub(crate) fn invoke_user(
        &mut self,
        name: Name,
        args: ArgRange,
        line: u32,
        want_value: bool,
    ) -> ValueResult {
        if self.unwinding {
            return Ok(SymId::INVALID);
        }
        let routine = self.resolve_routine(name, line)?;
        let routine_name = self.interner.lookup(name);
        let (meta, is_function) = match &self.symtab.get(routine).class {
            SymClass::Function(meta) => (meta.clone(), true),
            SymClass::Subroutine(meta) | SymClass::BlockRoutine(meta) => (meta.clone(), false),
            _ => return Err(self.unknown_routine(name, line)),
        };
        if want_value && !is_function {
            return Err(ExecError::new(ExecErrorKind::NotAFunction {
                routine: routine_name.to_owned(),
            })
            .at_line(line));
        }

        let args = self.nodes.args(args);
        let binding = self.bind_user(routine, routine_name, &meta.params, meta.variadic, args, line)?;

        // Formal rows change only after every argument has been evaluated.
        let snapshot = ParamSnapshot::capture(&self.symtab, &meta.params);
        for (param, &actual) in meta.params.iter().zip(&binding.bindings) {
            self.symtab.get_mut(param.sym).class = if actual.is_valid() {
                SymClass::Transfer(actual)
            } else {
                SymClass::Undefined
            };
        }
        self.frames.push(Frame {
            routine,
            is_function,
            return_value: SymId::INVALID,
        });
        tracing::debug!(routine = routine_name, depth = self.frames.len(), "enter routine");

        let mut outcome: Result<(), ExecError> = Ok(());
        for &stmt in &meta.body {
            match self.execute(stmt) {
                Ok(Control::Normal) => {}
                Ok(Control::ReturnAll) => {
                    self.unwinding = true;
                    break;
                }
                // Return leaves the routine; a stray loop signal ends the
                // body the same way.
                Ok(Control::Return | Control::Break | Control::Continue) => break,
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }

        let mut ret = self
            .frames
            .pop()
            .map_or(SymId::INVALID, |frame| frame.return_value);
        if outcome.is_err() {
            ret = SymId::INVALID;
        }

        // Rescue the return value from the dying context before teardown.
        if ret.is_valid() && self.symtab.get(ret).context == Context::Routine(routine) {
            if self.symtab.is_free_temp(ret) {
                let caller = self.current_context();
                self.symtab.get_mut(ret).context = caller;
            } else {
                let caller = self.current_context();
                match deep_copy(&mut self.symtab, ret, caller) {
                    Ok(copy) => ret = copy,
                    Err(err) => {
                        outcome = Err(err.at_line(line));
                        ret = SymId::INVALID;
                    }
                }
            }
        }

        // An enclosing frame of the same routine keeps its context alive;
        // a recursive exit frees only this call's argument temporaries.
        if self.frames.iter().any(|frame| frame.routine == routine) {
            for &temp in &binding.temps {
                if temp != ret && self.symtab.is_free_temp(temp) {
                    self.symtab.zap(temp);
                }
            }
        } else {
            self.symtab.zap_context(routine);
        }
        snapshot.restore(&mut self.symtab);
        tracing::debug!(routine = routine_name, "leave routine");

        if let Err(mut err) = outcome {
            // Innermost boundary reports; enclosing frames just forward.
            self.report_once(&mut err);
            return Err(err);
        }
        if want_value && !ret.is_valid() {
            return Err(ExecError::new(ExecErrorKind::FunctionReturnsNothing).at_line(line));
        }
        Ok(ret)
    }

    /// Reclaim free-temporary arguments after a builtin call, sparing the
    /// returned value.
    fn free_call_temps(&mut self, temps: &[SymId], keep: Option<SymId>) {
        for &temp in temps {
            if Some(temp) == keep {
                continue;
            }
            if self.symtab.is_free_temp(temp) {
                self.symtab.zap(temp);
            }
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
