//! Definition-store workflows driven entirely through evaluated input
//! forms, the way an interactive session reshapes its environment.

use pretty_assertions::assert_eq;
use tungsten::{Evaluator, Value};

fn named(name: &str) -> Value {
    Value::call(
        "Pattern",
        vec![Value::sym(name), Value::call("Blank", vec![])],
    )
}

fn set(lhs: Value, rhs: Value) -> Value {
    Value::call("Set", vec![lhs, rhs])
}

fn set_delayed(lhs: Value, rhs: Value) -> Value {
    Value::call("SetDelayed", vec![lhs, rhs])
}

#[test]
fn defining_and_applying_a_function() {
    let mut ev = Evaluator::new();
    // f[x_] := x^2
    ev.evaluate_top(&set_delayed(
        Value::call("f", vec![named("x")]),
        Value::call("Power", vec![Value::sym("x"), Value::int(2)]),
    ));
    assert_eq!(
        ev.evaluate_top(&Value::call("f", vec![Value::int(3)])),
        Value::int(9)
    );
    // the argument evaluates before the rule sees it
    let nested = Value::call(
        "f",
        vec![Value::call("Plus", vec![Value::int(1), Value::int(2)])],
    );
    assert_eq!(ev.evaluate_top(&nested), Value::int(9));
}

#[test]
fn clearing_by_name_string_restores_the_bare_symbol() {
    let mut ev = Evaluator::new();
    ev.evaluate_top(&set(Value::sym("x"), Value::int(2)));
    assert_eq!(ev.evaluate_top(&Value::sym("x")), Value::int(2));

    ev.evaluate_top(&Value::call("Clear", vec![Value::str("x")]));
    assert_eq!(ev.evaluate_top(&Value::sym("x")), Value::sym("x"));
}

#[test]
fn cleared_rules_stop_applying() {
    let mut ev = Evaluator::new();
    ev.evaluate_top(&set_delayed(
        Value::call("f", vec![named("x")]),
        Value::sym("matched"),
    ));
    let call = Value::call("f", vec![Value::int(1)]);
    assert_eq!(ev.evaluate_top(&call), Value::sym("matched"));

    ev.evaluate_top(&Value::call("Clear", vec![Value::sym("f")]));
    assert_eq!(ev.evaluate_top(&call), call);
}

#[test]
fn clear_keeps_attributes_but_clear_all_resets_them() {
    let mut ev = Evaluator::new();
    ev.evaluate_top(&Value::call(
        "SetAttributes",
        vec![Value::sym("f"), Value::sym("Orderless")],
    ));
    ev.evaluate_top(&set_delayed(
        Value::call("f", vec![named("x")]),
        Value::sym("x"),
    ));

    ev.evaluate_top(&Value::call("Clear", vec![Value::sym("f")]));
    let listing = Value::call("Attributes", vec![Value::sym("f")]);
    assert_eq!(
        ev.evaluate_top(&listing),
        Value::call("List", vec![Value::sym("Orderless")])
    );

    ev.evaluate_top(&Value::call("ClearAll", vec![Value::sym("f")]));
    assert_eq!(ev.evaluate_top(&listing), Value::call("List", vec![]));
}

#[test]
fn unset_removes_one_rule_and_leaves_the_rest() {
    let mut ev = Evaluator::new();
    ev.evaluate_top(&set_delayed(
        Value::call("f", vec![named("x")]),
        Value::sym("general"),
    ));
    ev.evaluate_top(&set(
        Value::call("f", vec![Value::int(0)]),
        Value::sym("zero"),
    ));
    let listing = Value::call("DownValues", vec![Value::sym("f")]);
    assert_eq!(ev.evaluate_top(&listing).elements().len(), 2);

    // f[0] =.
    ev.evaluate_top(&Value::call(
        "Unset",
        vec![Value::call("f", vec![Value::int(0)])],
    ));
    assert_eq!(ev.evaluate_top(&listing).elements().len(), 1);
    assert_eq!(
        ev.evaluate_top(&Value::call("f", vec![Value::int(0)])),
        Value::sym("general")
    );
}

#[test]
fn specific_rules_outrank_earlier_general_ones() {
    let mut ev = Evaluator::new();
    // the general rule goes in first; the literal one must still win
    ev.evaluate_top(&set_delayed(
        Value::call("g", vec![named("x")]),
        Value::sym("general"),
    ));
    ev.evaluate_top(&set(
        Value::call("g", vec![Value::int(0)]),
        Value::sym("zero"),
    ));
    assert_eq!(
        ev.evaluate_top(&Value::call("g", vec![Value::int(0)])),
        Value::sym("zero")
    );
    assert_eq!(
        ev.evaluate_top(&Value::call("g", vec![Value::int(1)])),
        Value::sym("general")
    );
}

#[test]
fn guarded_rules_sit_ahead_of_their_fallback() {
    let mut ev = Evaluator::new();
    // absval[x_] := x, then the guarded negative case on top
    ev.evaluate_top(&set_delayed(
        Value::call("absval", vec![named("x")]),
        Value::sym("x"),
    ));
    let guarded = Value::call(
        "Condition",
        vec![
            Value::call("absval", vec![named("x")]),
            Value::call("Less", vec![Value::sym("x"), Value::int(0)]),
        ],
    );
    ev.evaluate_top(&set_delayed(
        guarded,
        Value::call("Times", vec![Value::int(-1), Value::sym("x")]),
    ));

    assert_eq!(
        ev.evaluate_top(&Value::call("absval", vec![Value::int(-5)])),
        Value::int(5)
    );
    assert_eq!(
        ev.evaluate_top(&Value::call("absval", vec![Value::int(3)])),
        Value::int(3)
    );
}

#[test]
fn redefining_a_pattern_replaces_its_rule() {
    let mut ev = Evaluator::new();
    let lhs = Value::call("f", vec![named("x")]);
    ev.evaluate_top(&set_delayed(lhs.clone(), Value::sym("first")));
    ev.evaluate_top(&set_delayed(lhs.clone(), Value::sym("second")));

    let listing = Value::call("DownValues", vec![Value::sym("f")]);
    assert_eq!(ev.evaluate_top(&listing).elements().len(), 1);
    assert_eq!(
        ev.evaluate_top(&Value::call("f", vec![Value::int(1)])),
        Value::sym("second")
    );
}

#[test]
fn optional_arguments_fill_from_the_rule_default() {
    let mut ev = Evaluator::new();
    // pad[x_, y_: 10] := {x, y}
    ev.evaluate_top(&set_delayed(
        Value::call(
            "pad",
            vec![
                named("x"),
                Value::call("Optional", vec![named("y"), Value::int(10)]),
            ],
        ),
        Value::list(vec![Value::sym("x"), Value::sym("y")]),
    ));
    assert_eq!(
        ev.evaluate_top(&Value::call("pad", vec![Value::int(1)])),
        Value::list(vec![Value::int(1), Value::int(10)])
    );
    assert_eq!(
        ev.evaluate_top(&Value::call("pad", vec![Value::int(1), Value::int(2)])),
        Value::list(vec![Value::int(1), Value::int(2)])
    );
}

#[test]
fn upvalues_merge_wrapped_values_through_plus() {
    let mut ev = Evaluator::new();
    // box[n_] + box[m_] ^:= box[n + m]
    ev.evaluate_top(&Value::call(
        "UpSetDelayed",
        vec![
            Value::call(
                "Plus",
                vec![
                    Value::call("box", vec![named("n")]),
                    Value::call("box", vec![named("m")]),
                ],
            ),
            Value::call(
                "box",
                vec![Value::call("Plus", vec![Value::sym("n"), Value::sym("m")])],
            ),
        ],
    ));

    let sum = Value::call(
        "Plus",
        vec![
            Value::call("box", vec![Value::int(1)]),
            Value::call("box", vec![Value::int(2)]),
        ],
    );
    let expected = Value::call("box", vec![Value::int(3)]);
    assert_eq!(ev.evaluate_top(&sum), expected);

    // the rule lives on box, not on the protected Plus
    let up_listing = Value::call("UpValues", vec![Value::sym("box")]);
    assert_eq!(ev.evaluate_top(&up_listing).elements().len(), 1);
    let down_listing = Value::call("DownValues", vec![Value::sym("Plus")]);
    assert_eq!(ev.evaluate_top(&down_listing).elements().len(), 0);
}

#[test]
fn tag_set_delayed_reaches_subvalues() {
    let mut ev = Evaluator::new();
    // f /: f[x_][y_] := pair[x, y]
    ev.evaluate_top(&Value::call(
        "TagSetDelayed",
        vec![
            Value::sym("f"),
            Value::expr(Value::call("f", vec![named("x")]), vec![named("y")]),
            Value::call("pair", vec![Value::sym("x"), Value::sym("y")]),
        ],
    ));

    let curried = Value::expr(Value::call("f", vec![Value::int(1)]), vec![Value::int(2)]);
    assert_eq!(
        ev.evaluate_top(&curried),
        Value::call("pair", vec![Value::int(1), Value::int(2)])
    );
    let listing = Value::call("SubValues", vec![Value::sym("f")]);
    assert_eq!(ev.evaluate_top(&listing).elements().len(), 1);
}

#[test]
fn protection_toggles_around_assignment() {
    let mut ev = Evaluator::new();
    ev.evaluate_top(&set(Value::sym("x"), Value::int(2)));
    ev.evaluate_top(&Value::call("Protect", vec![Value::sym("x")]));

    ev.evaluate_top(&set(Value::sym("x"), Value::int(3)));
    assert_eq!(ev.take_messages()[0].tag, "wrsym");
    assert_eq!(ev.evaluate_top(&Value::sym("x")), Value::int(2));

    ev.evaluate_top(&Value::call("Unprotect", vec![Value::sym("x")]));
    ev.evaluate_top(&set(Value::sym("x"), Value::int(3)));
    assert!(ev.take_messages().is_empty());
    assert_eq!(ev.evaluate_top(&Value::sym("x")), Value::int(3));
}

#[test]
fn locked_symbols_refuse_attribute_changes() {
    let mut ev = Evaluator::new();
    let attempt = Value::call(
        "SetAttributes",
        vec![Value::sym("List"), Value::sym("HoldAll")],
    );
    ev.evaluate_top(&attempt);
    assert_eq!(ev.take_messages()[0].tag, "locked");

    // still locked and still protected afterwards
    let listing = ev.evaluate_top(&Value::call("Attributes", vec![Value::sym("List")]));
    assert_eq!(
        listing,
        Value::call(
            "List",
            vec![Value::sym("Locked"), Value::sym("Protected")]
        )
    );
}

#[test]
fn unset_misses_interpolate_the_offending_form() {
    let mut ev = Evaluator::new();
    let miss = Value::call(
        "Unset",
        vec![Value::call("g", vec![Value::int(3)])],
    );
    assert_eq!(ev.evaluate_top(&miss), Value::sym("$Failed"));
    let messages = ev.take_messages();
    assert_eq!(messages[0].tag, "norep");
    assert_eq!(messages[0].text, "Assignment on g for g[3] not found.");
}

#[test]
fn redefinition_invalidates_previously_computed_normal_forms() {
    let mut ev = Evaluator::new();
    let sum = Value::call("Plus", vec![Value::sym("x"), Value::int(1)]);
    let normal = ev.evaluate_top(&sum);
    assert_eq!(
        normal,
        Value::call("Plus", vec![Value::int(1), Value::sym("x")])
    );
    // handing the stamped result back is a no-op while nothing changed
    assert_eq!(ev.evaluate_top(&normal), normal);

    ev.evaluate_top(&set(Value::sym("x"), Value::int(10)));
    assert_eq!(ev.evaluate_top(&normal), Value::int(11));
}

#[test]
fn remove_forgets_the_record_clear_all_keeps_it() {
    let mut ev = Evaluator::new();
    ev.evaluate_top(&set(Value::sym("kept"), Value::int(1)));
    ev.evaluate_top(&set(Value::sym("dropped"), Value::int(2)));

    ev.evaluate_top(&Value::call("ClearAll", vec![Value::sym("kept")]));
    ev.evaluate_top(&Value::call("Remove", vec![Value::sym("dropped")]));
    assert_eq!(ev.evaluate_top(&Value::sym("kept")), Value::sym("kept"));
    assert_eq!(ev.evaluate_top(&Value::sym("dropped")), Value::sym("dropped"));

    // the emptied record still answers to name globs, the removed one is gone
    assert_eq!(
        ev.evaluate_top(&Value::call("Protect", vec![Value::str("kept")])),
        Value::list(vec![Value::str("kept")])
    );
    assert_eq!(
        ev.evaluate_top(&Value::call("Protect", vec![Value::str("dropped")])),
        Value::list(vec![])
    );
}

#[test]
fn sessions_do_not_share_definitions() {
    let mut first = Evaluator::new();
    let mut second = Evaluator::new();
    first.evaluate_top(&set(Value::sym("x"), Value::int(1)));
    assert_eq!(second.evaluate_top(&Value::sym("x")), Value::sym("x"));
    assert_eq!(first.evaluate_top(&Value::sym("x")), Value::int(1));
}
