//! Counted loops.
//!
//! Bounds are evaluated once, widened to the widest of the three types, and
//! the counter walks by comparison against the end bound rather than by a
//! precomputed iteration count: a start value already past the end bound in
//! the loop's direction runs zero iterations.

use rho_ir::{NodeId, Operand, SymId};

use crate::errors::{Control, ExecError, ExecErrorKind, Status};
use crate::interpreter::Interp;
use crate::symtab::{ScalarValue, SymClass, SymFlags};

impl<'a> Interp<'a> {
    #[expect(
        clippy::float_cmp,
        reason = "an exactly zero step is the degenerate case being rejected"
    )]
    pub(crate) fn exec_for(
        &mut self,
        counter: SymId,
        start: Operand,
        end: Operand,
        step: Option<Operand>,
        body: NodeId,
        line: u32,
    ) -> Status {
        let Some(start) = self.loop_bound(start, line)? else {
            return Ok(Control::ReturnAll);
        };
        let Some(end) = self.loop_bound(end, line)? else {
            return Ok(Control::ReturnAll);
        };
        let step = match step {
            Some(op) => match self.loop_bound(op, line)? {
                Some(value) => value,
                None => return Ok(Control::ReturnAll),
            },
            None => ScalarValue::Int16(1),
        };

        let widest = start.dtype().widen(end.dtype()).widen(step.dtype());
        if widest.is_complex() {
            return Err(ExecError::new(ExecErrorKind::BadLoopBound).at_line(line));
        }
        // A zero step can never cross the end bound.
        if step.as_f64() == 0.0 {
            return Err(ExecError::new(ExecErrorKind::BadLoopBound).at_line(line));
        }
        // Non-negative step walks up, negative walks down.
        let ascending = step.as_f64() >= 0.0;

        if widest.is_floating() {
            let mut current = start.as_f64();
            let end = end.as_f64();
            let step = step.as_f64();
            loop {
                let past = if ascending { current > end } else { current < end };
                if past {
                    break;
                }
                self.bind_counter(counter, ScalarValue::Double(current).convert_to(widest), line)?;
                match self.execute(body)? {
                    Control::Normal | Control::Continue => {}
                    Control::Break => break,
                    other => return Ok(other),
                }
                current += step;
            }
        } else {
            let mut current = start.as_i64();
            let end = end.as_i64();
            let step = step.as_i64();
            loop {
                let past = if ascending { current > end } else { current < end };
                if past {
                    break;
                }
                self.bind_counter(counter, ScalarValue::Int64(current).convert_to(widest), line)?;
                match self.execute(body)? {
                    Control::Normal | Control::Continue => {}
                    Control::Break => break,
                    other => return Ok(other),
                }
                current = current.wrapping_add(step);
            }
        }
        Ok(Control::Normal)
    }

    /// Evaluate one loop bound down to a numeric scalar.
    fn loop_bound(&mut self, op: Operand, line: u32) -> Result<Option<ScalarValue>, ExecError> {
        let id = self.eval_operand(op, line)?;
        if self.unwinding {
            return Ok(None);
        }
        let value = match self.symtab.scalar_value(id) {
            Ok(value) => value,
            Err(err) if err.kind == ExecErrorKind::NonScalarCondition => {
                return Err(ExecError::new(ExecErrorKind::BadLoopBound)
                    .with_sym(id)
                    .at_line(line));
            }
            Err(err) => return Err(err.at_line(line)),
        };
        self.discard_temp(id);
        Ok(Some(value))
    }

    /// Rebind the loop counter to its next value, freeing whatever the
    /// counter symbol held before.
    fn bind_counter(&mut self, counter: SymId, value: ScalarValue, line: u32) -> Result<(), ExecError> {
        let target = self.symtab.deref(counter);
        if self.symtab.get(target).flags.contains(SymFlags::CONSTANT) {
            return Err(ExecError::new(ExecErrorKind::ProtectedTarget)
                .with_sym(target)
                .at_line(line));
        }
        self.symtab.free_payload(target);
        let sym = self.symtab.get_mut(target);
        sym.dtype = value.dtype();
        sym.class = SymClass::Scalar(value);
        Ok(())
    }
}
