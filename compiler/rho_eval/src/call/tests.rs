use super::*;
use crate::errors::ExecErrorKind;
use crate::symtab::{ScalarValue, SymbolTable};
use rho_ir::{Arg, DataType, NodeArena, NodeKind, SymId};

fn scalar_sym(table: &mut SymbolTable, v: i64) -> SymId {
    let id = table.create_temp().unwrap();
    let sym = table.get_mut(id);
    sym.class = SymClass::Scalar(ScalarValue::Int64(v));
    sym.dtype = DataType::Int64;
    id
}

/// Builtin that hands back the shared mode value as a scalar.
fn echo_mode(interp: &mut Interp<'_>, bound: &BoundArgs) -> ValueResult {
    let id = interp.symtab.create_temp()?;
    let mode = i64::try_from(bound.mode).unwrap_or(i64::MAX);
    interp.symtab.get_mut(id).class = SymClass::Scalar(ScalarValue::Int64(mode));
    Ok(id)
}

/// Builtin that hands back its first keyword slot.
fn echo_slot0(_interp: &mut Interp<'_>, bound: &BoundArgs) -> ValueResult {
    Ok(bound.keyword(0))
}

/// Builtin that hands back its first positional argument.
fn echo_pos0(_interp: &mut Interp<'_>, bound: &BoundArgs) -> ValueResult {
    Ok(bound.positional(0))
}

/// Builtin reporting 1 when keyword slot 0 was supplied in zeroed form.
fn flag_zeroed(interp: &mut Interp<'_>, bound: &BoundArgs) -> ValueResult {
    let zeroed = bound.keyword_supplied(0) && !bound.keyword(0).is_valid();
    let id = interp.symtab.create_temp()?;
    interp.symtab.get_mut(id).class = SymClass::Scalar(ScalarValue::Int64(i64::from(zeroed)));
    Ok(id)
}

/// Builtin reporting 1 when keyword slot 0 arrived unevaluated.
fn flag_executable(interp: &mut Interp<'_>, bound: &BoundArgs) -> ValueResult {
    let preserved = matches!(
        interp.symtab.get(bound.keyword(0)).class,
        SymClass::ExecutableNode(_)
    );
    let id = interp.symtab.create_temp()?;
    interp.symtab.get_mut(id).class = SymClass::Scalar(ScalarValue::Int64(i64::from(preserved)));
    Ok(id)
}

/// Bind and invoke one builtin call, reducing the result to a scalar.
fn eval_builtin(
    spec: BuiltinSpec,
    func: BuiltinFn,
    build: impl FnOnce(&StringInterner, &mut SymbolTable) -> Vec<Arg>,
) -> Result<Option<ScalarValue>, ExecError> {
    let interner = StringInterner::new();
    let mut table = SymbolTable::new();
    let args = build(&interner, &mut table);
    let mut arena = NodeArena::new();
    let range = arena.alloc_args(&args);
    let name = interner.intern(&spec.name);
    let mut interp = Interp::builder(&arena, &interner).symtab(table).build();
    interp.register_builtin(Builtin::new(spec, func));
    let ret = interp.call_builtin(name, range, 1)?;
    Ok(if ret.is_valid() {
        interp.symtab.scalar_value(ret).ok()
    } else {
        None
    })
}

mod keyword_matching {
    use pretty_assertions::assert_eq;

    use super::*;

    fn table(decls: &[&str]) -> Vec<KeywordSpec> {
        decls.iter().map(|d| KeywordSpec::parse(d).unwrap()).collect()
    }

    #[test]
    fn prefix_matches_first_declaration() {
        let kws = table(&["BARN", "BAR"]);
        let hit = match_declared(&kws, "BA").unwrap();
        assert_eq!(hit.index, 0);
        assert!(!hit.negated);
    }

    #[test]
    fn no_prefix_negates() {
        let kws = table(&["BAR"]);
        let hit = match_declared(&kws, "NOBA").unwrap();
        assert_eq!(hit.index, 0);
        assert!(hit.negated);
    }

    #[test]
    fn keyword_starting_with_no_stays_reachable() {
        let kws = table(&["NOTIFY"]);
        let hit = match_declared(&kws, "NOT").unwrap();
        assert_eq!(hit.index, 0);
        assert!(!hit.negated);
    }

    #[test]
    fn empty_and_unknown_names_do_not_match() {
        let kws = table(&["BAR"]);
        assert_eq!(match_declared(&kws, ""), None);
        assert_eq!(match_declared(&kws, "QUX"), None);
        // NO alone is not a negated match of anything.
        assert_eq!(match_declared(&kws, "NO"), None);
    }

    #[test]
    fn formal_names_match_by_prefix_too() {
        let interner = StringInterner::new();
        let params = [
            RoutineParam {
                name: interner.intern("ALPHA"),
                sym: SymId::new(10),
            },
            RoutineParam {
                name: interner.intern("BETA"),
                sym: SymId::new(11),
            },
        ];
        let hit = match_param(&params, &interner, "BE").unwrap();
        assert_eq!(hit.index, 1);
        assert!(!hit.negated);
        let hit = match_param(&params, &interner, "NOAL").unwrap();
        assert_eq!(hit.index, 0);
        assert!(hit.negated);
    }
}

mod builtin_binding {
    use pretty_assertions::assert_eq;

    use super::*;

    fn kwtest() -> BuiltinSpec {
        BuiltinSpec::new("kwtest", 0, 2)
            .with_keywords(&["2048FOO", "BAR"])
            .unwrap()
    }

    #[test]
    fn mode_keyword_ors_its_bits() {
        let got = eval_builtin(kwtest(), echo_mode, |i, t| {
            vec![Arg::keyword(i.intern("FOO"), Operand::Sym(scalar_sym(t, 1)))]
        })
        .unwrap();
        assert_eq!(got, Some(ScalarValue::Int64(2048)));
    }

    #[test]
    fn no_form_clears_mode_bits() {
        let spec = kwtest().default_mode(2048 | 4);
        let got = eval_builtin(spec, echo_mode, |i, t| {
            vec![Arg::keyword(i.intern("NOFOO"), Operand::Sym(scalar_sym(t, 1)))]
        })
        .unwrap();
        assert_eq!(got, Some(ScalarValue::Int64(4)));
    }

    #[test]
    fn clear_polarity_flips_under_no() {
        let spec = BuiltinSpec::new("kwtest", 0, 0)
            .with_keywords(&["~16TRACE"])
            .unwrap()
            .default_mode(16);
        let cleared = eval_builtin(spec.clone(), echo_mode, |i, t| {
            vec![Arg::keyword(i.intern("TRACE"), Operand::Sym(scalar_sym(t, 1)))]
        })
        .unwrap();
        assert_eq!(cleared, Some(ScalarValue::Int64(0)));

        let set = eval_builtin(spec, echo_mode, |i, t| {
            vec![Arg::keyword(i.intern("NOTRACE"), Operand::Sym(scalar_sym(t, 1)))]
        })
        .unwrap();
        assert_eq!(set, Some(ScalarValue::Int64(16)));
    }

    #[test]
    fn mode_keyword_replaces_instead_of_oring() {
        // /FOO first, then MODE=5: the assignment wins over the OR.
        let got = eval_builtin(kwtest(), echo_mode, |i, t| {
            vec![
                Arg::keyword(i.intern("FOO"), Operand::Sym(scalar_sym(t, 1))),
                Arg::keyword(i.intern("MODE"), Operand::Sym(scalar_sym(t, 5))),
            ]
        })
        .unwrap();
        assert_eq!(got, Some(ScalarValue::Int64(5)));

        // MODE=5 first, then /FOO ORs on top of the replaced value.
        let got = eval_builtin(kwtest(), echo_mode, |i, t| {
            vec![
                Arg::keyword(i.intern("MODE"), Operand::Sym(scalar_sym(t, 5))),
                Arg::keyword(i.intern("FOO"), Operand::Sym(scalar_sym(t, 1))),
            ]
        })
        .unwrap();
        assert_eq!(got, Some(ScalarValue::Int64(5 | 2048)));
    }

    #[test]
    fn abbreviated_keyword_fills_its_slot() {
        let got = eval_builtin(kwtest(), echo_slot0, |i, t| {
            vec![Arg::keyword(i.intern("BA"), Operand::Sym(scalar_sym(t, 7)))]
        })
        .unwrap();
        assert_eq!(got, Some(ScalarValue::Int64(7)));
    }

    #[test]
    fn no_on_slot_keyword_zeroes_it() {
        let got = eval_builtin(kwtest(), flag_zeroed, |i, t| {
            vec![Arg::keyword(i.intern("NOBAR"), Operand::Sym(scalar_sym(t, 1)))]
        })
        .unwrap();
        assert_eq!(got, Some(ScalarValue::Int64(1)));
    }

    #[test]
    fn unknown_keyword_is_rejected() {
        let err = eval_builtin(kwtest(), echo_mode, |i, t| {
            vec![Arg::keyword(i.intern("QUX"), Operand::Sym(scalar_sym(t, 1)))]
        })
        .unwrap_err();
        assert_eq!(
            err.kind,
            ExecErrorKind::UnknownKeyword {
                name: "QUX".to_owned()
            }
        );
    }

    #[test]
    fn doubly_defined_keyword_is_rejected() {
        let err = eval_builtin(kwtest(), echo_slot0, |i, t| {
            vec![
                Arg::keyword(i.intern("BA"), Operand::Sym(scalar_sym(t, 1))),
                Arg::keyword(i.intern("BAR"), Operand::Sym(scalar_sym(t, 2))),
            ]
        })
        .unwrap_err();
        assert_eq!(
            err.kind,
            ExecErrorKind::DoublyDefined {
                name: "BAR".to_owned()
            }
        );
    }

    #[test]
    fn positional_arity_is_enforced() {
        let spec = BuiltinSpec::new("one", 1, 1);
        let err = eval_builtin(spec.clone(), echo_pos0, |_, _| vec![]).unwrap_err();
        assert_eq!(
            err.kind,
            ExecErrorKind::TooFewArgs {
                routine: "one".to_owned()
            }
        );

        let err = eval_builtin(spec, echo_pos0, |_, t| {
            vec![
                Arg::positional(Operand::Sym(scalar_sym(t, 1))),
                Arg::positional(Operand::Sym(scalar_sym(t, 2))),
            ]
        })
        .unwrap_err();
        assert_eq!(
            err.kind,
            ExecErrorKind::TooManyArgs {
                routine: "one".to_owned()
            }
        );
    }

    #[test]
    fn positional_args_land_after_keyword_slots() {
        let got = eval_builtin(kwtest(), echo_pos0, |_, t| {
            vec![Arg::positional(Operand::Sym(scalar_sym(t, 9)))]
        })
        .unwrap();
        assert_eq!(got, Some(ScalarValue::Int64(9)));
    }

    #[test]
    fn preserve_keyword_passes_the_node_through_unevaluated() {
        let interner = StringInterner::new();
        let table = SymbolTable::new();
        let mut arena = NodeArena::new();
        // A call node that would fail if evaluated; preserve must not run it.
        let inner = arena.alloc(
            NodeKind::UserCall {
                routine: interner.intern("missing"),
                args: rho_ir::ArgRange::EMPTY,
            },
            1,
        );
        let args = [Arg::keyword(interner.intern("FMT"), Operand::Node(inner))];
        let range = arena.alloc_args(&args);
        let spec = BuiltinSpec::new("prtest", 0, 0)
            .with_keywords(&["#FMT"])
            .unwrap();
        let name = interner.intern("prtest");
        let mut interp = Interp::builder(&arena, &interner).symtab(table).build();
        interp.register_builtin(Builtin::new(spec, flag_executable));
        let ret = interp.call_builtin(name, range, 1).unwrap();
        assert_eq!(
            interp.symtab.scalar_value(ret).unwrap(),
            ScalarValue::Int64(1)
        );
    }

    #[test]
    fn suppression_flag_covers_every_argument() {
        let interner = StringInterner::new();
        let table = SymbolTable::new();
        let mut arena = NodeArena::new();
        let inner = arena.alloc(
            NodeKind::UserCall {
                routine: interner.intern("missing"),
                args: rho_ir::ArgRange::EMPTY,
            },
            1,
        );
        let args = [Arg::keyword(interner.intern("BAR"), Operand::Node(inner))];
        let range = arena.alloc_args(&args);
        let spec = BuiltinSpec::new("quoted", 0, 0)
            .with_keywords(&["BAR"])
            .unwrap()
            .suppress_eval();
        let name = interner.intern("quoted");
        let mut interp = Interp::builder(&arena, &interner).symtab(table).build();
        interp.register_builtin(Builtin::new(spec, flag_executable));
        let ret = interp.call_builtin(name, range, 1).unwrap();
        assert_eq!(
            interp.symtab.scalar_value(ret).unwrap(),
            ScalarValue::Int64(1)
        );
    }

    #[test]
    fn argument_temps_are_reclaimed_after_the_call() {
        let interner = StringInterner::new();
        let mut table = SymbolTable::new();
        let arg = scalar_sym(&mut table, 3);
        let mut arena = NodeArena::new();
        let range = arena.alloc_args(&[Arg::positional(Operand::Sym(arg))]);
        let spec = BuiltinSpec::new("drop", 0, 1);
        let name = interner.intern("drop");
        let mut interp = Interp::builder(&arena, &interner).symtab(table).build();
        interp.register_builtin(Builtin::new(spec, echo_mode));
        let before = interp.symtab.len();
        interp.call_builtin(name, range, 1).unwrap();
        // The argument temp was zapped and its slot is reusable.
        assert!(interp.symtab.get(arg).is_unused());
        assert!(interp.symtab.len() <= before + 1);
    }

    #[test]
    fn literal_arguments_survive_the_call() {
        let interner = StringInterner::new();
        let mut table = SymbolTable::new();
        let lit = table.create_literal().unwrap();
        table.get_mut(lit).class = SymClass::Scalar(ScalarValue::Int64(3));
        table.get_mut(lit).dtype = DataType::Int64;
        let mut arena = NodeArena::new();
        let range = arena.alloc_args(&[Arg::positional(Operand::Sym(lit))]);
        let spec = BuiltinSpec::new("keep", 0, 1);
        let name = interner.intern("keep");
        let mut interp = Interp::builder(&arena, &interner).symtab(table).build();
        interp.register_builtin(Builtin::new(spec, echo_pos0));

        // The same call runs twice; the literal slot must feed both.
        for _ in 0..2 {
            let ret = interp.call_builtin(name, range, 1).unwrap();
            assert_eq!(
                interp.symtab.scalar_value(ret).unwrap(),
                ScalarValue::Int64(3)
            );
        }
        assert!(!interp.symtab.get(lit).is_unused());
    }
}
