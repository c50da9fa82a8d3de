//! Arithmetic and comparison handlers.
//!
//! `Plus` and `Times` fold their numeric elements through the active
//! [`NumericAdapter`](crate::numeric::NumericAdapter) and keep everything else
//! symbolic. The comparison family answers only when the adapter can decide
//! every pairing; otherwise the form is left alone for rules to pick up.

use std::cmp::Ordering;

use tungsten_core::{NumericError, Value};

use crate::control::EvalResult;
use crate::eval::Evaluator;

use super::bool_value;

#[derive(Clone, Copy)]
enum FoldOp {
    Add,
    Mul,
}

pub(super) fn plus(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    fold(ev, value, FoldOp::Add)
}

pub(super) fn times(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    fold(ev, value, FoldOp::Mul)
}

/// Collapse the numeric elements of a `Plus` or `Times` into one number and
/// reassemble the form around whatever stayed symbolic.
fn fold(ev: &mut Evaluator, value: &Value, op: FoldOp) -> EvalResult<Option<Value>> {
    let mut numeric: Option<Value> = None;
    let mut rest: Vec<Value> = Vec::new();
    for element in value.elements() {
        if !element.is_number() {
            rest.push(element.clone());
            continue;
        }
        numeric = Some(match numeric.take() {
            None => element.clone(),
            Some(acc) => {
                let folded = match op {
                    FoldOp::Add => ev.adapter().add(&acc, element),
                    FoldOp::Mul => ev.adapter().multiply(&acc, element),
                };
                match folded {
                    Ok(folded) => folded,
                    Err(NumericError::Overflow) => {
                        ev.message("General", "ovfl", &[]);
                        return Ok(Some(Value::call("Overflow", vec![])));
                    }
                    Err(_) => return Ok(None),
                }
            }
        });
    }
    if matches!(op, FoldOp::Mul) {
        if let Some(zero) = numeric.as_ref().filter(|acc| is_zero(acc)) {
            // 0 * Infinity and friends are indeterminate, everything else
            // is annihilated by the zero.
            if rest.iter().any(is_infinite) {
                ev.message("Infinity", "indet", &[value.clone()]);
                return Ok(Some(Value::sym("Indeterminate")));
            }
            return Ok(Some(zero.clone()));
        }
    }
    let identity_dropped = match op {
        FoldOp::Add => matches!(numeric, Some(Value::Integer(0))),
        FoldOp::Mul => matches!(numeric, Some(Value::Integer(1))),
    };
    if identity_dropped && !rest.is_empty() {
        numeric = None;
    }
    let mut out: Vec<Value> = Vec::with_capacity(rest.len() + 1);
    if let Some(acc) = numeric {
        out.push(acc);
    }
    out.extend(rest);
    let candidate = match out.len() {
        0 => match op {
            FoldOp::Add => Value::int(0),
            FoldOp::Mul => Value::int(1),
        },
        1 => out.remove(0),
        _ => Value::expr(value.head(), out),
    };
    if candidate.same_q(value) {
        Ok(None)
    } else {
        Ok(Some(candidate))
    }
}

pub(super) fn power(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    let (base, exponent) = match value.elements() {
        [base] => return Ok(Some(base.clone())),
        [base, exponent] => (base, exponent),
        _ => return Ok(None),
    };
    if is_zero(base) {
        return match exponent.round_to_float().and_then(|f| f.partial_cmp(&0.0)) {
            Some(Ordering::Equal) => {
                ev.message("Power", "indet", &[value.clone()]);
                Ok(Some(Value::sym("Indeterminate")))
            }
            Some(Ordering::Less) => {
                ev.message("Power", "infy", &[value.clone()]);
                Ok(Some(Value::sym("ComplexInfinity")))
            }
            Some(Ordering::Greater) => Ok(Some(zero_like(base, exponent))),
            None => Ok(None),
        };
    }
    if matches!(exponent, Value::Integer(0)) {
        return Ok(Some(Value::int(1)));
    }
    if matches!(exponent, Value::Integer(1)) {
        return Ok(Some(base.clone()));
    }
    if !base.is_number() || !exponent.is_number() {
        return Ok(None);
    }
    match ev.adapter().power(base, exponent) {
        Ok(candidate) => {
            if candidate.same_q(value) {
                Ok(None)
            } else {
                Ok(Some(candidate))
            }
        }
        Err(NumericError::Overflow) => {
            ev.message("General", "ovfl", &[]);
            Ok(Some(Value::call("Overflow", vec![])))
        }
        Err(NumericError::DivisionByZero) => {
            ev.message("Power", "infy", &[value.clone()]);
            Ok(Some(Value::sym("ComplexInfinity")))
        }
        // Exact radicals and other unsupported pairings stay symbolic.
        Err(NumericError::Unsupported) => Ok(None),
    }
}

pub(super) fn minus(_ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    match value.elements() {
        [x] => Ok(Some(Value::call("Times", vec![Value::int(-1), x.clone()]))),
        _ => Ok(None),
    }
}

pub(super) fn subtract(_ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    match value.elements() {
        [a, b] => Ok(Some(Value::call(
            "Plus",
            vec![
                a.clone(),
                Value::call("Times", vec![Value::int(-1), b.clone()]),
            ],
        ))),
        _ => Ok(None),
    }
}

pub(super) fn divide(_ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    match value.elements() {
        [a, b] => Ok(Some(Value::call(
            "Times",
            vec![
                a.clone(),
                Value::call("Power", vec![b.clone(), Value::int(-1)]),
            ],
        ))),
        _ => Ok(None),
    }
}

pub(super) fn sqrt(_ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    match value.elements() {
        [x] => Ok(Some(Value::call(
            "Power",
            vec![x.clone(), Value::rational(1, 2)],
        ))),
        _ => Ok(None),
    }
}

pub(super) fn equal(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    let elements = value.elements();
    if elements.len() < 2 {
        return Ok(Some(bool_value(true)));
    }
    let mut all_known = true;
    for pair in elements.windows(2) {
        match decide_equal(ev, &pair[0], &pair[1]) {
            Some(true) => {}
            Some(false) => return Ok(Some(bool_value(false))),
            None => all_known = false,
        }
    }
    if all_known {
        Ok(Some(bool_value(true)))
    } else {
        Ok(None)
    }
}

pub(super) fn unequal(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    let elements = value.elements();
    if elements.len() < 2 {
        return Ok(Some(bool_value(true)));
    }
    let mut all_known = true;
    for (i, a) in elements.iter().enumerate() {
        for b in &elements[i + 1..] {
            match decide_equal(ev, a, b) {
                Some(true) => return Ok(Some(bool_value(false))),
                Some(false) => {}
                None => all_known = false,
            }
        }
    }
    if all_known {
        Ok(Some(bool_value(true)))
    } else {
        Ok(None)
    }
}

/// Numeric tolerance first, then structural identity, then the handful of
/// literal kinds whose equality is decidable without rules.
fn decide_equal(ev: &Evaluator, a: &Value, b: &Value) -> Option<bool> {
    if let Some(answer) = ev.adapter().equal(a, b) {
        return Some(answer);
    }
    if a.same_q(b) {
        return Some(true);
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x == y),
        (Value::Symbol(x), Value::Symbol(y))
            if x.is_semantic_constant() && y.is_semantic_constant() =>
        {
            Some(x == y)
        }
        _ => None,
    }
}

fn relation(ev: &Evaluator, value: &Value, accept: fn(Ordering) -> bool) -> Option<Value> {
    let elements = value.elements();
    if elements.len() < 2 {
        return Some(bool_value(true));
    }
    for pair in elements.windows(2) {
        match ev.adapter().compare(&pair[0], &pair[1]) {
            Some(order) if accept(order) => {}
            Some(_) => return Some(bool_value(false)),
            None => return None,
        }
    }
    Some(bool_value(true))
}

pub(super) fn less(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    Ok(relation(ev, value, |order| order == Ordering::Less))
}

pub(super) fn less_equal(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    Ok(relation(ev, value, |order| order != Ordering::Greater))
}

pub(super) fn greater(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    Ok(relation(ev, value, |order| order == Ordering::Greater))
}

pub(super) fn greater_equal(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    Ok(relation(ev, value, |order| order != Ordering::Less))
}

pub(super) fn same_q(_ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    let truth = value
        .elements()
        .windows(2)
        .all(|pair| pair[0].same_q(&pair[1]));
    Ok(Some(bool_value(truth)))
}

pub(super) fn unsame_q(_ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    let elements = value.elements();
    for (i, a) in elements.iter().enumerate() {
        for b in &elements[i + 1..] {
            if a.same_q(b) {
                return Ok(Some(bool_value(false)));
            }
        }
    }
    Ok(Some(bool_value(true)))
}

fn is_zero(value: &Value) -> bool {
    match value {
        Value::Integer(0) => true,
        Value::Real { value: x, .. } => *x == 0.0,
        _ => false,
    }
}

fn is_infinite(value: &Value) -> bool {
    matches!(
        value,
        Value::Symbol(sym) if matches!(
            sym.name(),
            "System`Infinity" | "System`ComplexInfinity" | "System`Indeterminate"
        )
    )
}

fn zero_like(base: &Value, exponent: &Value) -> Value {
    if matches!(base, Value::Real { .. }) || matches!(exponent, Value::Real { .. }) {
        Value::real(0.0)
    } else {
        Value::int(0)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tungsten_core::Value;

    use crate::eval::Evaluator;

    #[test]
    fn plus_folds_numbers_and_keeps_symbols() {
        let mut ev = Evaluator::new();
        let value = Value::call(
            "Plus",
            vec![Value::int(1), Value::int(2), Value::sym("x")],
        );
        let expected = Value::call("Plus", vec![Value::int(3), Value::sym("x")]);
        assert_eq!(ev.evaluate_top(&value), expected);
    }

    #[test]
    fn plus_of_integers_is_an_integer() {
        let mut ev = Evaluator::new();
        let value = Value::call("Plus", vec![Value::int(1), Value::int(2)]);
        assert_eq!(ev.evaluate_top(&value), Value::int(3));
    }

    #[test]
    fn mixed_precision_sums_become_inexact() {
        let mut ev = Evaluator::new();
        let value = Value::call("Plus", vec![Value::int(1), Value::real(2.5)]);
        assert_eq!(ev.evaluate_top(&value), Value::real(3.5));
    }

    #[test]
    fn exact_zero_drops_but_real_zero_stays() {
        let mut ev = Evaluator::new();
        let exact = Value::call("Plus", vec![Value::int(0), Value::sym("x")]);
        assert_eq!(ev.evaluate_top(&exact), Value::sym("x"));

        let inexact = Value::call("Plus", vec![Value::real(0.0), Value::sym("x")]);
        assert_eq!(ev.evaluate_top(&inexact), inexact);
    }

    #[test]
    fn times_zero_annihilates_symbols() {
        let mut ev = Evaluator::new();
        let value = Value::call("Times", vec![Value::int(0), Value::sym("x")]);
        assert_eq!(ev.evaluate_top(&value), Value::int(0));
    }

    #[test]
    fn times_zero_with_infinity_is_indeterminate() {
        let mut ev = Evaluator::new();
        let value = Value::call("Times", vec![Value::int(0), Value::sym("Infinity")]);
        assert_eq!(ev.evaluate_top(&value), Value::sym("Indeterminate"));
        let messages = ev.take_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].tag, "indet");
    }

    #[test]
    fn integer_overflow_reports_and_yields_overflow() {
        let mut ev = Evaluator::new();
        let value = Value::call("Plus", vec![Value::int(i64::MAX), Value::int(1)]);
        assert_eq!(ev.evaluate_top(&value), Value::call("Overflow", vec![]));
        let messages = ev.take_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].tag, "ovfl");
    }

    #[test]
    fn integer_powers_compute() {
        let mut ev = Evaluator::new();
        let value = Value::call("Power", vec![Value::int(2), Value::int(10)]);
        assert_eq!(ev.evaluate_top(&value), Value::int(1024));
    }

    #[test]
    fn exact_radicals_stay_symbolic() {
        let mut ev = Evaluator::new();
        let value = Value::call("Power", vec![Value::int(2), Value::rational(1, 2)]);
        assert_eq!(ev.evaluate_top(&value), value);
        assert!(ev.take_messages().is_empty());
    }

    #[test]
    fn zero_to_negative_power_is_complex_infinity() {
        let mut ev = Evaluator::new();
        let value = Value::call("Power", vec![Value::int(0), Value::int(-1)]);
        assert_eq!(ev.evaluate_top(&value), Value::sym("ComplexInfinity"));
        let messages = ev.take_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].symbol, "Power");
        assert_eq!(messages[0].tag, "infy");
    }

    #[test]
    fn zero_to_zero_is_indeterminate() {
        let mut ev = Evaluator::new();
        let value = Value::call("Power", vec![Value::int(0), Value::int(0)]);
        assert_eq!(ev.evaluate_top(&value), Value::sym("Indeterminate"));
        assert_eq!(ev.take_messages()[0].tag, "indet");
    }

    #[test]
    fn divide_by_zero_goes_through_power() {
        let mut ev = Evaluator::new();
        let value = Value::call("Divide", vec![Value::int(1), Value::int(0)]);
        assert_eq!(ev.evaluate_top(&value), Value::sym("ComplexInfinity"));
        assert_eq!(ev.take_messages()[0].tag, "infy");
    }

    #[test]
    fn subtract_and_minus_rewrite_through_plus_and_times() {
        let mut ev = Evaluator::new();
        let difference = Value::call("Subtract", vec![Value::int(5), Value::int(3)]);
        assert_eq!(ev.evaluate_top(&difference), Value::int(2));

        let negated = Value::call("Minus", vec![Value::int(5)]);
        assert_eq!(ev.evaluate_top(&negated), Value::int(-5));
    }

    #[test]
    fn sqrt_becomes_a_half_power() {
        let mut ev = Evaluator::new();
        let value = Value::call("Sqrt", vec![Value::sym("x")]);
        let expected = Value::call("Power", vec![Value::sym("x"), Value::rational(1, 2)]);
        assert_eq!(ev.evaluate_top(&value), expected);
    }

    #[test]
    fn chained_comparisons_check_every_pair() {
        let mut ev = Evaluator::new();
        let ascending = Value::call(
            "Less",
            vec![Value::int(1), Value::int(2), Value::int(3)],
        );
        assert_eq!(ev.evaluate_top(&ascending), Value::sym("True"));

        let broken = Value::call(
            "Less",
            vec![Value::int(1), Value::int(3), Value::int(2)],
        );
        assert_eq!(ev.evaluate_top(&broken), Value::sym("False"));
    }

    #[test]
    fn undecidable_comparisons_stay_put() {
        let mut ev = Evaluator::new();
        let value = Value::call("Less", vec![Value::int(1), Value::sym("x")]);
        assert_eq!(ev.evaluate_top(&value), value);
    }

    #[test]
    fn equal_is_tolerant_but_same_q_is_not() {
        let mut ev = Evaluator::new();
        let equal = Value::call("Equal", vec![Value::int(1), Value::real(1.0)]);
        assert_eq!(ev.evaluate_top(&equal), Value::sym("True"));

        let same = Value::call("SameQ", vec![Value::int(1), Value::real(1.0)]);
        assert_eq!(ev.evaluate_top(&same), Value::sym("False"));

        let unsame = Value::call("UnsameQ", vec![Value::int(1), Value::real(1.0)]);
        assert_eq!(ev.evaluate_top(&unsame), Value::sym("True"));
    }

    #[test]
    fn equal_on_unrelated_symbols_stays_symbolic() {
        let mut ev = Evaluator::new();
        let identical = Value::call("Equal", vec![Value::sym("a"), Value::sym("a")]);
        assert_eq!(ev.evaluate_top(&identical), Value::sym("True"));

        let open = Value::call("Equal", vec![Value::sym("a"), Value::sym("b")]);
        assert_eq!(ev.evaluate_top(&open), open);
    }
}
