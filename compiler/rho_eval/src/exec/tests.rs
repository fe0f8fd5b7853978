use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use crate::interpreter::Interp;
use crate::symtab::{Context, ScalarValue, SymbolTable};
use rho_ir::{CaseArm, DataType, NodeArena, StringInterner};

/// Model a compiled literal: a constant slot the statement tree references.
fn scalar_sym(table: &mut SymbolTable, v: i64) -> SymId {
    let id = table.create_literal().unwrap();
    let sym = table.get_mut(id);
    sym.class = SymClass::Scalar(ScalarValue::Int64(v));
    sym.dtype = DataType::Int64;
    id
}

/// Trace log shared with the interpreter's statement hook.
type TraceLog = Rc<RefCell<Vec<NodeId>>>;

fn traced_interp<'a>(
    arena: &'a NodeArena,
    interner: &'a StringInterner,
    table: SymbolTable,
) -> (Interp<'a>, TraceLog) {
    let log: TraceLog = Rc::new(RefCell::new(Vec::new()));
    let hook = Rc::clone(&log);
    let interp = Interp::builder(arena, interner)
        .symtab(table)
        .trace(move |node, _line| hook.borrow_mut().push(node))
        .build();
    (interp, log)
}

fn executions(log: &TraceLog, node: NodeId) -> usize {
    log.borrow().iter().filter(|&&n| n == node).count()
}

mod counted_loops {
    use pretty_assertions::assert_eq;

    use super::*;

    struct Loop {
        arena: NodeArena,
        table: SymbolTable,
        counter: SymId,
        body: NodeId,
        node: NodeId,
    }

    fn build(interner: &StringInterner, start: i64, end: i64, step: Option<i64>) -> Loop {
        let mut table = SymbolTable::new();
        let counter = table.define(interner.intern("I"), Context::TopLevel).unwrap();
        let start = scalar_sym(&mut table, start);
        let end = scalar_sym(&mut table, end);
        let step = step.map(|s| scalar_sym(&mut table, s));
        let mut arena = NodeArena::new();
        let body = arena.alloc(NodeKind::Nop, 2);
        let node = arena.alloc(
            NodeKind::For {
                counter,
                start: Operand::Sym(start),
                end: Operand::Sym(end),
                step: step.map(Operand::Sym),
                body,
            },
            1,
        );
        Loop {
            arena,
            table,
            counter,
            body,
            node,
        }
    }

    #[test]
    fn descending_bounds_with_default_step_run_zero_iterations() {
        let interner = StringInterner::new();
        let l = build(&interner, 5, 1, None);
        let (mut interp, log) = traced_interp(&l.arena, &interner, l.table);
        assert_eq!(interp.execute(l.node).unwrap(), Control::Normal);
        assert_eq!(executions(&log, l.body), 0);
    }

    #[test]
    fn negative_step_with_ascending_bounds_runs_zero_iterations() {
        let interner = StringInterner::new();
        let l = build(&interner, 1, 5, Some(-1));
        let (mut interp, log) = traced_interp(&l.arena, &interner, l.table);
        assert_eq!(interp.execute(l.node).unwrap(), Control::Normal);
        assert_eq!(executions(&log, l.body), 0);
    }

    #[test]
    fn equal_bounds_run_exactly_one_iteration() {
        let interner = StringInterner::new();
        let l = build(&interner, 1, 1, None);
        let (mut interp, log) = traced_interp(&l.arena, &interner, l.table);
        assert_eq!(interp.execute(l.node).unwrap(), Control::Normal);
        assert_eq!(executions(&log, l.body), 1);
        assert_eq!(
            interp.symtab.scalar_value(l.counter).unwrap(),
            ScalarValue::Int64(1)
        );
    }

    #[test]
    fn negative_step_counts_down_by_comparison() {
        let interner = StringInterner::new();
        let l = build(&interner, 5, 1, Some(-1));
        let (mut interp, log) = traced_interp(&l.arena, &interner, l.table);
        assert_eq!(interp.execute(l.node).unwrap(), Control::Normal);
        assert_eq!(executions(&log, l.body), 5);
        assert_eq!(
            interp.symtab.scalar_value(l.counter).unwrap(),
            ScalarValue::Int64(1)
        );
    }

    #[test]
    fn body_literals_survive_every_iteration() {
        let interner = StringInterner::new();
        let mut table = SymbolTable::new();
        let counter = table.define(interner.intern("I"), Context::TopLevel).unwrap();
        let target = table.define(interner.intern("X"), Context::TopLevel).unwrap();
        let start = scalar_sym(&mut table, 1);
        let end = scalar_sym(&mut table, 3);
        let forty_two = scalar_sym(&mut table, 42);
        let mut arena = NodeArena::new();
        // The assignment re-reads the same literal slot on each pass.
        let body = arena.alloc(
            NodeKind::Replace {
                target,
                source: Operand::Sym(forty_two),
            },
            2,
        );
        let node = arena.alloc(
            NodeKind::For {
                counter,
                start: Operand::Sym(start),
                end: Operand::Sym(end),
                step: None,
                body,
            },
            1,
        );
        let (mut interp, log) = traced_interp(&arena, &interner, table);
        assert_eq!(interp.execute(node).unwrap(), Control::Normal);
        assert_eq!(executions(&log, body), 3);
        assert_eq!(
            interp.symtab.scalar_value(target).unwrap(),
            ScalarValue::Int64(42)
        );
        assert!(!interp.symtab.get(forty_two).is_unused());
    }

    #[test]
    fn zero_step_is_rejected() {
        let interner = StringInterner::new();
        let l = build(&interner, 1, 5, Some(0));
        let (mut interp, _log) = traced_interp(&l.arena, &interner, l.table);
        let err = interp.execute(l.node).unwrap_err();
        assert_eq!(err.kind, ExecErrorKind::BadLoopBound);
    }

    #[test]
    fn non_scalar_bound_is_rejected() {
        let interner = StringInterner::new();
        let mut table = SymbolTable::new();
        let counter = table.define(interner.intern("I"), Context::TopLevel).unwrap();
        let bad = table.create_temp().unwrap();
        table.get_mut(bad).class = SymClass::Str("oops".to_owned());
        let end = scalar_sym(&mut table, 3);
        let mut arena = NodeArena::new();
        let body = arena.alloc(NodeKind::Nop, 2);
        let node = arena.alloc(
            NodeKind::For {
                counter,
                start: Operand::Sym(bad),
                end: Operand::Sym(end),
                step: None,
                body,
            },
            1,
        );
        let (mut interp, _log) = traced_interp(&arena, &interner, table);
        assert_eq!(
            interp.execute(node).unwrap_err().kind,
            ExecErrorKind::BadLoopBound
        );
    }
}

mod condition_loops {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn break_ends_the_loop_normally() {
        let interner = StringInterner::new();
        let mut table = SymbolTable::new();
        let never = scalar_sym(&mut table, 0);
        let mut arena = NodeArena::new();
        let body = arena.alloc(NodeKind::Break, 2);
        let node = arena.alloc(
            NodeKind::Repeat {
                body,
                until: Operand::Sym(never),
            },
            1,
        );
        let (mut interp, log) = traced_interp(&arena, &interner, table);
        assert_eq!(interp.execute(node).unwrap(), Control::Normal);
        assert_eq!(executions(&log, body), 1);
    }

    #[test]
    fn continue_skips_the_rest_of_the_body() {
        let interner = StringInterner::new();
        let mut table = SymbolTable::new();
        let target = table.define(interner.intern("X"), Context::TopLevel).unwrap();
        let undefined = table.create_temp().unwrap();
        let done = scalar_sym(&mut table, 1);
        let mut arena = NodeArena::new();
        let skip = arena.alloc(NodeKind::Continue, 2);
        // Would raise an undefined-value error if ever reached.
        let bad = arena.alloc(
            NodeKind::Replace {
                target,
                source: Operand::Sym(undefined),
            },
            3,
        );
        let list = arena.alloc_stmt_list(&[skip, bad]);
        let body = arena.alloc(NodeKind::Block(list), 2);
        let node = arena.alloc(
            NodeKind::Repeat {
                body,
                until: Operand::Sym(done),
            },
            1,
        );
        let (mut interp, log) = traced_interp(&arena, &interner, table);
        assert_eq!(interp.execute(node).unwrap(), Control::Normal);
        assert_eq!(executions(&log, bad), 0);
    }

    #[test]
    fn do_while_runs_the_body_before_the_check() {
        let interner = StringInterner::new();
        let mut table = SymbolTable::new();
        let stop = scalar_sym(&mut table, 0);
        let mut arena = NodeArena::new();
        let body = arena.alloc(NodeKind::Nop, 2);
        let node = arena.alloc(
            NodeKind::DoWhile {
                body,
                cond: Operand::Sym(stop),
            },
            1,
        );
        let (mut interp, log) = traced_interp(&arena, &interner, table);
        assert_eq!(interp.execute(node).unwrap(), Control::Normal);
        assert_eq!(executions(&log, body), 1);
    }

    #[test]
    fn while_do_checks_before_the_body() {
        let interner = StringInterner::new();
        let mut table = SymbolTable::new();
        let stop = scalar_sym(&mut table, 0);
        let mut arena = NodeArena::new();
        let body = arena.alloc(NodeKind::Nop, 2);
        let node = arena.alloc(
            NodeKind::WhileDo {
                cond: Operand::Sym(stop),
                body,
            },
            1,
        );
        let (mut interp, log) = traced_interp(&arena, &interner, table);
        assert_eq!(interp.execute(node).unwrap(), Control::Normal);
        assert_eq!(executions(&log, body), 0);
    }
}

mod branching {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn if_takes_the_else_branch_on_zero() {
        let interner = StringInterner::new();
        let mut table = SymbolTable::new();
        let cond = scalar_sym(&mut table, 0);
        let mut arena = NodeArena::new();
        let then_branch = arena.alloc(NodeKind::Nop, 2);
        let else_branch = arena.alloc(NodeKind::Nop, 3);
        let node = arena.alloc(
            NodeKind::If {
                cond: Operand::Sym(cond),
                then_branch,
                else_branch: Some(else_branch),
            },
            1,
        );
        let (mut interp, log) = traced_interp(&arena, &interner, table);
        assert_eq!(interp.execute(node).unwrap(), Control::Normal);
        assert_eq!(executions(&log, then_branch), 0);
        assert_eq!(executions(&log, else_branch), 1);
    }

    #[test]
    fn non_scalar_condition_is_an_error() {
        let interner = StringInterner::new();
        let mut table = SymbolTable::new();
        let cond = table.create_temp().unwrap();
        table.get_mut(cond).class = SymClass::Str("not a scalar".to_owned());
        let mut arena = NodeArena::new();
        let then_branch = arena.alloc(NodeKind::Nop, 2);
        let node = arena.alloc(
            NodeKind::If {
                cond: Operand::Sym(cond),
                then_branch,
                else_branch: None,
            },
            1,
        );
        let (mut interp, _log) = traced_interp(&arena, &interner, table);
        assert_eq!(
            interp.execute(node).unwrap_err().kind,
            ExecErrorKind::NonScalarCondition
        );
    }

    #[test]
    fn case_runs_the_first_true_guard_only() {
        let interner = StringInterner::new();
        let mut table = SymbolTable::new();
        let no = scalar_sym(&mut table, 0);
        let yes = scalar_sym(&mut table, 1);
        let mut arena = NodeArena::new();
        let b1 = arena.alloc(NodeKind::Nop, 2);
        let b2 = arena.alloc(NodeKind::Nop, 3);
        let b3 = arena.alloc(NodeKind::Nop, 4);
        let arms = arena.alloc_arms(&[
            CaseArm {
                guard: Operand::Sym(no),
                body: b1,
            },
            CaseArm {
                guard: Operand::Sym(yes),
                body: b2,
            },
            CaseArm {
                guard: Operand::Sym(yes),
                body: b3,
            },
        ]);
        let node = arena.alloc(
            NodeKind::Case {
                arms,
                default: None,
            },
            1,
        );
        let (mut interp, log) = traced_interp(&arena, &interner, table);
        assert_eq!(interp.execute(node).unwrap(), Control::Normal);
        assert_eq!(executions(&log, b1), 0);
        assert_eq!(executions(&log, b2), 1);
        assert_eq!(executions(&log, b3), 0);
    }

    #[test]
    fn numeric_case_selects_by_index_and_clamps_to_default() {
        for (selector, expect_branch, expect_default) in
            [(1i64, 1, 0), (7, 0, 1), (-1, 0, 1)]
        {
            let interner = StringInterner::new();
            let mut table = SymbolTable::new();
            let sel = scalar_sym(&mut table, selector);
            let mut arena = NodeArena::new();
            let b0 = arena.alloc(NodeKind::Nop, 2);
            let b1 = arena.alloc(NodeKind::Nop, 3);
            let branches = arena.alloc_stmt_list(&[b0, b1]);
            let default = arena.alloc(NodeKind::Nop, 4);
            let node = arena.alloc(
                NodeKind::NumericCase {
                    selector: Operand::Sym(sel),
                    branches,
                    default: Some(default),
                },
                1,
            );
            let (mut interp, log) = traced_interp(&arena, &interner, table);
            assert_eq!(interp.execute(node).unwrap(), Control::Normal);
            assert_eq!(executions(&log, b1), expect_branch);
            assert_eq!(executions(&log, default), expect_default);
        }
    }
}

mod blocks_and_signals {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn block_stops_at_the_first_error() {
        let interner = StringInterner::new();
        let mut table = SymbolTable::new();
        let target = table.define(interner.intern("X"), Context::TopLevel).unwrap();
        let undefined = table.create_temp().unwrap();
        let mut arena = NodeArena::new();
        let first = arena.alloc(NodeKind::Nop, 1);
        let bad = arena.alloc(
            NodeKind::Replace {
                target,
                source: Operand::Sym(undefined),
            },
            2,
        );
        let third = arena.alloc(NodeKind::Nop, 3);
        let list = arena.alloc_stmt_list(&[first, bad, third]);
        let node = arena.alloc(NodeKind::Block(list), 1);
        let (mut interp, log) = traced_interp(&arena, &interner, table);
        assert_eq!(
            interp.execute(node).unwrap_err().kind,
            ExecErrorKind::UndefinedValue
        );
        assert_eq!(executions(&log, first), 1);
        assert_eq!(executions(&log, third), 0);
    }

    #[test]
    fn top_level_return_carries_no_value() {
        let interner = StringInterner::new();
        let mut table = SymbolTable::new();
        let value = scalar_sym(&mut table, 1);
        let mut arena = NodeArena::new();
        let plain = arena.alloc(NodeKind::Return { value: None }, 1);
        let with_value = arena.alloc(
            NodeKind::Return {
                value: Some(Operand::Sym(value)),
            },
            2,
        );
        let (mut interp, _log) = traced_interp(&arena, &interner, table);
        assert_eq!(interp.execute(plain).unwrap(), Control::Return);
        // Outside a function frame a returned value has nowhere to go.
        assert_eq!(
            interp.execute(with_value).unwrap_err().kind,
            ExecErrorKind::SubroutineReturnsValue
        );
    }

    #[test]
    fn abort_flag_stops_the_next_statement() {
        let interner = StringInterner::new();
        let table = SymbolTable::new();
        let mut arena = NodeArena::new();
        let node = arena.alloc(NodeKind::Nop, 1);
        let (mut interp, _log) = traced_interp(&arena, &interner, table);
        interp.request_abort();
        assert_eq!(interp.execute(node).unwrap_err().kind, ExecErrorKind::Aborted);
    }
}
