//! Statement dispatch.
//!
//! `execute` is one recursive function over [`NodeId`]; nesting depth
//! follows the statement tree, guarded by `ensure_sufficient_stack`. Every
//! handler returns a [`Status`]: loops consume `Break` and `Continue`,
//! routine boundaries consume `Return`, the top level consumes `ReturnAll`,
//! and everything else forwards whatever signal it receives.
//!
//! The cooperative abort flag is polled once per statement, so a runaway
//! loop stops at the next statement boundary rather than preempting
//! anything mid-handler.

mod forloop;

use rho_ir::{NodeId, NodeKind, Operand, SymId};
use rho_stack::ensure_sufficient_stack;

use crate::errors::{Control, ExecError, ExecErrorKind, Status, ValueResult};
use crate::interpreter::Interp;
use crate::replace;
use crate::symtab::SymClass;

impl<'a> Interp<'a> {
    /// Execute one statement node.
    pub fn execute(&mut self, node: NodeId) -> Status {
        if self.unwinding {
            return Ok(Control::ReturnAll);
        }
        let line = self.nodes.get(node).line;
        if self.abort_requested() {
            return Err(ExecError::new(ExecErrorKind::Aborted).at_line(line));
        }
        if let Some(trace) = self.trace.as_mut() {
            trace(node, line);
        }
        tracing::trace!(node = node.raw(), line, "execute");
        ensure_sufficient_stack(|| self.dispatch(node, line))
    }

    fn dispatch(&mut self, node: NodeId, line: u32) -> Status {
        match self.nodes.get(node).kind {
            NodeKind::Nop => Ok(Control::Normal),
            NodeKind::Block(range) => {
                let stmts = self.nodes.stmt_list(range);
                for &stmt in stmts {
                    let control = self.execute(stmt)?;
                    if !control.is_normal() {
                        return Ok(control);
                    }
                }
                Ok(Control::Normal)
            }
            NodeKind::Replace { target, source } => {
                let Some(value) = self.eval_value(source, line)? else {
                    return Ok(Control::ReturnAll);
                };
                replace::replace(&mut self.symtab, target, value).map_err(|e| e.at_line(line))?;
                Ok(Control::Normal)
            }
            NodeKind::InternalCall { routine, args } => {
                let ret = self.call_builtin(routine, args, line)?;
                self.discard_temp(ret);
                self.after_call()
            }
            NodeKind::UserCall { routine, args } | NodeKind::CodeBlockCall { routine, args } => {
                let ret = self.invoke_user(routine, args, line, false)?;
                self.discard_temp(ret);
                self.after_call()
            }
            NodeKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let Some(truth) = self.eval_condition(cond, line)? else {
                    return Ok(Control::ReturnAll);
                };
                if truth {
                    self.execute(then_branch)
                } else if let Some(branch) = else_branch {
                    self.execute(branch)
                } else {
                    Ok(Control::Normal)
                }
            }
            NodeKind::Case { arms, default } => {
                let arms = self.nodes.arms(arms);
                for arm in arms {
                    let Some(truth) = self.eval_condition(arm.guard, line)? else {
                        return Ok(Control::ReturnAll);
                    };
                    if truth {
                        return self.execute(arm.body);
                    }
                }
                match default {
                    Some(branch) => self.execute(branch),
                    None => Ok(Control::Normal),
                }
            }
            NodeKind::NumericCase {
                selector,
                branches,
                default,
            } => {
                let Some(id) = self.eval_value(selector, line)? else {
                    return Ok(Control::ReturnAll);
                };
                let index = self.symtab.scalar_value(id).map_err(|e| e.at_line(line))?.as_i64();
                self.discard_temp(id);
                let branches = self.nodes.stmt_list(branches);
                // Out of range, including negative, falls through to the
                // default branch.
                let chosen = usize::try_from(index)
                    .ok()
                    .and_then(|i| branches.get(i).copied());
                match chosen {
                    Some(branch) => self.execute(branch),
                    None => match default {
                        Some(branch) => self.execute(branch),
                        None => Ok(Control::Normal),
                    },
                }
            }
            NodeKind::For {
                counter,
                start,
                end,
                step,
                body,
            } => self.exec_for(counter, start, end, step, body, line),
            NodeKind::Repeat { body, until } => loop {
                match self.execute(body)? {
                    Control::Normal | Control::Continue => {}
                    Control::Break => return Ok(Control::Normal),
                    other => return Ok(other),
                }
                let Some(done) = self.eval_condition(until, line)? else {
                    return Ok(Control::ReturnAll);
                };
                if done {
                    return Ok(Control::Normal);
                }
            },
            NodeKind::WhileDo { cond, body } => loop {
                let Some(truth) = self.eval_condition(cond, line)? else {
                    return Ok(Control::ReturnAll);
                };
                if !truth {
                    return Ok(Control::Normal);
                }
                match self.execute(body)? {
                    Control::Normal | Control::Continue => {}
                    Control::Break => return Ok(Control::Normal),
                    other => return Ok(other),
                }
            },
            NodeKind::DoWhile { body, cond } => loop {
                match self.execute(body)? {
                    Control::Normal | Control::Continue => {}
                    Control::Break => return Ok(Control::Normal),
                    other => return Ok(other),
                }
                let Some(truth) = self.eval_condition(cond, line)? else {
                    return Ok(Control::ReturnAll);
                };
                if !truth {
                    return Ok(Control::Normal);
                }
            },
            NodeKind::Return { value } => self.exec_return(value, line),
            NodeKind::Break => Ok(Control::Break),
            NodeKind::Continue => Ok(Control::Continue),
            NodeKind::ReturnAll => {
                self.unwinding = true;
                Ok(Control::ReturnAll)
            }
        }
    }

    fn exec_return(&mut self, value: Option<Operand>, line: u32) -> Status {
        let is_function = self.frames.last().is_some_and(|f| f.is_function);
        match value {
            Some(op) => {
                if !is_function {
                    return Err(
                        ExecError::new(ExecErrorKind::SubroutineReturnsValue).at_line(line)
                    );
                }
                let Some(id) = self.eval_value(op, line)? else {
                    return Ok(Control::ReturnAll);
                };
                // Deref so returning a formal hands back the caller's own
                // symbol instead of an alias into the dying frame.
                let id = self.symtab.deref(id);
                if let Some(frame) = self.frames.last_mut() {
                    frame.return_value = id;
                }
            }
            None => {
                if is_function {
                    return Err(
                        ExecError::new(ExecErrorKind::FunctionReturnsNothing).at_line(line)
                    );
                }
            }
        }
        Ok(Control::Return)
    }

    /// Normal completion, unless a call inside the statement started an
    /// unwind.
    fn after_call(&self) -> Status {
        if self.unwinding {
            Ok(Control::ReturnAll)
        } else {
            Ok(Control::Normal)
        }
    }

    /// Evaluate a value position to a symbol id.
    ///
    /// The compiler resolves every non-symbol value position to a call node;
    /// anything else here is a compiler defect surfacing as `NotAValue`.
    pub(crate) fn eval_operand(&mut self, operand: Operand, line: u32) -> ValueResult {
        let node = match operand {
            Operand::Sym(sym) => return Ok(sym),
            Operand::Node(node) => node,
        };
        if self.unwinding {
            return Ok(SymId::INVALID);
        }
        let inner = self.nodes.get(node);
        let ret = match inner.kind {
            NodeKind::InternalCall { routine, args } => {
                self.call_builtin(routine, args, inner.line)?
            }
            NodeKind::UserCall { routine, args } | NodeKind::CodeBlockCall { routine, args } => {
                self.invoke_user(routine, args, inner.line, true)?
            }
            _ => return Err(ExecError::new(ExecErrorKind::NotAValue).at_line(line)),
        };
        if !ret.is_valid() && !self.unwinding {
            return Err(ExecError::new(ExecErrorKind::NotAValue).at_line(inner.line));
        }
        Ok(ret)
    }

    /// Evaluate an operand, mapping an in-flight unwind to `None` so the
    /// handler can forward `ReturnAll` instead of touching a missing value.
    fn eval_value(&mut self, operand: Operand, line: u32) -> Result<Option<SymId>, ExecError> {
        let id = self.eval_operand(operand, line)?;
        if self.unwinding {
            return Ok(None);
        }
        Ok(Some(id))
    }

    /// Evaluate a condition operand down to its truth value.
    fn eval_condition(&mut self, operand: Operand, line: u32) -> Result<Option<bool>, ExecError> {
        let Some(id) = self.eval_value(operand, line)? else {
            return Ok(None);
        };
        let truth = self.symtab.truthy(id).map_err(|e| e.at_line(line))?;
        self.discard_temp(id);
        Ok(Some(truth))
    }

    /// Force a preserved (unevaluated) argument when the builtin asks.
    pub fn eval_preserved(&mut self, id: SymId) -> ValueResult {
        let resolved = self.symtab.deref(id);
        match self.symtab.get(resolved).class {
            SymClass::ExecutableNode(node) => {
                let line = self.nodes.get(node).line;
                self.eval_operand(Operand::Node(node), line)
            }
            _ => Ok(resolved),
        }
    }

    /// Drop a statement-level value nobody consumed.
    pub(crate) fn discard_temp(&mut self, id: SymId) {
        if id.is_valid() && self.symtab.is_free_temp(id) {
            self.symtab.zap(id);
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
