use std::collections::HashSet;
use std::thread;

use pretty_assertions::assert_eq;
use tungsten_core::number::{num_mul, num_pow, num_recip};
use tungsten_core::order::sort_elements;
use tungsten_core::{format_value, EvalStamp, NumericError, Symbol, Value};

fn power(base: &str, exp: i64) -> Value {
    Value::call("Power", vec![Value::sym(base), Value::int(exp)])
}

#[test]
fn interning_is_shared_across_threads() {
    let here = Symbol::new("Plus");
    let local = Symbol::new("interning_probe");
    let handles: Vec<_> = (0..4)
        .map(|_| {
            thread::spawn(|| (Symbol::new("Plus"), Symbol::new("interning_probe")))
        })
        .collect();
    for handle in handles {
        let (system, global) = handle.join().unwrap();
        assert!(system.ptr_eq(&here));
        assert!(global.ptr_eq(&local));
        assert_eq!(global.name(), "Global`interning_probe");
    }
}

#[test]
fn squared_binomial_terms_fall_into_textbook_order() {
    // the terms of (a + b)^2 plus some constants, deliberately shuffled
    let mut terms = vec![
        power("b", 2),
        Value::rational(1, 2),
        Value::call("Times", vec![Value::int(2), Value::sym("a"), Value::sym("b")]),
        Value::sym("c"),
        Value::real(3.5),
        power("a", 2),
        Value::str("tag"),
        Value::sym("a"),
    ];
    sort_elements(&mut terms);
    let rendered = format_value(&Value::list(terms));
    assert_eq!(
        rendered,
        "{1/2, 3.5, \"tag\", a, Power[a, 2], Times[2, a, b], Power[b, 2], c}"
    );
}

#[test]
fn canonical_order_is_independent_of_input_order() {
    let terms = vec![
        Value::sym("y"),
        power("x", 3),
        Value::call("Times", vec![Value::sym("x"), Value::sym("y")]),
        Value::int(7),
        Value::call("f", vec![Value::sym("x")]),
    ];
    let mut forward = terms.clone();
    let mut backward: Vec<Value> = terms.into_iter().rev().collect();
    sort_elements(&mut forward);
    sort_elements(&mut backward);
    assert_eq!(forward, backward);

    let mut again = forward.clone();
    sort_elements(&mut again);
    assert_eq!(again, forward);
}

#[test]
fn definition_presentation_composes_shorthands() {
    // the shape value_list hands back for a stored rule
    let lhs = Value::call(
        "HoldPattern",
        vec![Value::call(
            "f",
            vec![Value::call(
                "Pattern",
                vec![Value::sym("x"), Value::call("Blank", vec![])],
            )],
        )],
    );
    let rule = Value::call("RuleDelayed", vec![lhs, power("x", 2)]);
    assert_eq!(format_value(&rule), "HoldPattern[f[x_]] :> Power[x, 2]");
}

#[test]
fn stamps_are_visible_through_shared_clones() {
    let term = Value::call("Plus", vec![Value::int(1), Value::sym("x")]);
    let alias = term.clone();
    let mut symbols = HashSet::new();
    term.collect_symbols(&mut symbols);
    let stamp = EvalStamp {
        generation: 3,
        symbols: symbols.into_iter().collect::<Vec<_>>().into(),
    };
    if let Value::Expr(node) = &term {
        node.set_stamp(stamp.clone());
    }
    match &alias {
        Value::Expr(node) => assert_eq!(node.stamp(), Some(stamp)),
        _ => panic!("expected a compound term"),
    }
}

#[test]
fn serialization_drops_normal_form_stamps() {
    let term = Value::call("Times", vec![Value::int(2), Value::sym("x")]);
    if let Value::Expr(node) = &term {
        node.set_stamp(EvalStamp {
            generation: 9,
            symbols: vec![Symbol::new("Times")].into(),
        });
    }
    let json = serde_json::to_string(&term).unwrap();
    let back: Value = serde_json::from_str(&json).unwrap();
    assert_eq!(back, term);
    match &back {
        Value::Expr(node) => assert_eq!(node.stamp(), None),
        _ => panic!("expected a compound term"),
    }
}

#[test]
fn exact_faults_carry_their_own_errors() {
    assert_eq!(
        num_recip(&Value::int(0)),
        Err(NumericError::DivisionByZero)
    );
    assert_eq!(
        num_mul(&Value::int(i64::MAX), &Value::int(2)),
        Err(NumericError::Overflow)
    );
    // exact radicals are declined, not computed inexactly
    assert_eq!(
        num_pow(&Value::int(2), &Value::rational(1, 2)),
        Err(NumericError::Unsupported)
    );
}
