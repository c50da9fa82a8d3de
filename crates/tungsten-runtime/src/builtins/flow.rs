//! Control flow: sequencing, branching, the loop family, and the
//! non-local transfers that ride the signal channel.
//!
//! Loop bodies are held, so each handler drives evaluation itself and
//! decides which signals it absorbs. `Break` and `Continue` stop at the
//! nearest loop, `Return` stops the loop and becomes its value, and
//! everything else keeps unwinding.

use std::cmp::Ordering;

use tungsten_core::{Symbol, Value};
use tungsten_rewrite::{Rule, RuleList};

use crate::control::{ControlSignal, EvalResult};
use crate::eval::{is_true, Evaluator};

use super::{assign, is_false};

pub(super) fn compound_expression(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    let mut last = Value::sym("Null");
    for element in value.elements() {
        last = ev.evaluate(element)?;
    }
    Ok(Some(last))
}

pub(super) fn if_branch(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    let elements = value.elements();
    if !(2..=4).contains(&elements.len()) {
        return Ok(None);
    }
    let condition = &elements[0];
    if is_true(condition) {
        return Ok(Some(ev.evaluate(&elements[1])?));
    }
    if is_false(condition) {
        return match elements.get(2) {
            Some(branch) => Ok(Some(ev.evaluate(branch)?)),
            None => Ok(Some(Value::sym("Null"))),
        };
    }
    // An undecided condition takes the fourth argument when present and
    // otherwise leaves the form alone.
    match elements.get(3) {
        Some(fallback) => Ok(Some(ev.evaluate(fallback)?)),
        None => Ok(None),
    }
}

pub(super) fn while_loop(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    let (test, body) = match value.elements() {
        [test] => (test, None),
        [test, body] => (test, Some(body)),
        _ => return Ok(None),
    };
    loop {
        let decided = ev.evaluate(test)?;
        if !is_true(&decided) {
            break;
        }
        if let Some(body) = body {
            match ev.evaluate(body) {
                Ok(_) | Err(ControlSignal::Continue) => {}
                Err(ControlSignal::Break) => break,
                Err(ControlSignal::Return(result)) => return Ok(Some(result)),
                Err(signal) => return Err(signal),
            }
        }
    }
    Ok(Some(Value::sym("Null")))
}

pub(super) fn for_loop(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    let (test, increment, body) = match value.elements() {
        [_, test, increment] => (test, increment, None),
        [_, test, increment, body] => (test, increment, Some(body)),
        _ => return Ok(None),
    };
    loop {
        let decided = ev.evaluate(test)?;
        if !is_true(&decided) {
            break;
        }
        if let Some(body) = body {
            match ev.evaluate(body) {
                Ok(_) | Err(ControlSignal::Continue) => {}
                Err(ControlSignal::Break) => break,
                Err(ControlSignal::Return(result)) => return Ok(Some(result)),
                Err(signal) => return Err(signal),
            }
        }
        match ev.evaluate(increment) {
            Ok(_) | Err(ControlSignal::Continue) => {}
            Err(ControlSignal::Break) => break,
            Err(ControlSignal::Return(result)) => return Ok(Some(result)),
            Err(signal) => return Err(signal),
        }
    }
    Ok(Some(Value::sym("Null")))
}

enum IterSpec {
    Items {
        var: Symbol,
        items: Vec<Value>,
    },
    Range {
        var: Option<Symbol>,
        start: Value,
        step: Value,
        count: Value,
    },
}

pub(super) fn do_loop(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    let elements = value.elements();
    if elements.len() < 2 {
        return Ok(None);
    }
    let body = &elements[0];
    if elements.len() > 2 {
        // Several iterators nest with the first one outermost.
        let mut nested = vec![body.clone()];
        nested.extend(elements[2..].iter().cloned());
        let inner = Value::expr(value.head(), nested);
        return Ok(Some(Value::expr(
            value.head(),
            vec![inner, elements[1].clone()],
        )));
    }
    match parse_iterator(ev, &elements[1])? {
        Some(IterSpec::Items { var, items }) => iterate_items(ev, "Do", body, &var, items),
        Some(IterSpec::Range {
            var,
            start,
            step,
            count,
        }) => iterate_range(ev, "Do", body, var.as_ref(), &start, &step, &count),
        None => {
            ev.message("Do", "iterb", &[]);
            Ok(None)
        }
    }
}

fn parse_iterator(ev: &mut Evaluator, spec: &Value) -> EvalResult<Option<IterSpec>> {
    let expanded;
    let spec = if spec.as_symbol().is_some() {
        expanded = ev.evaluate(spec)?;
        &expanded
    } else {
        spec
    };
    if spec.head_is("List") {
        parse_iterator_list(ev, spec.elements())
    } else {
        parse_iterator_list(ev, std::slice::from_ref(spec))
    }
}

fn parse_iterator_list(ev: &mut Evaluator, items: &[Value]) -> EvalResult<Option<IterSpec>> {
    match items {
        [imax] => bounds(ev, None, None, imax, None),
        [Value::Symbol(var), second] => {
            let decided = ev.evaluate(second)?;
            if decided.head_is("List") {
                return Ok(Some(IterSpec::Items {
                    var: var.clone(),
                    items: decided.elements().to_vec(),
                }));
            }
            bounds(ev, Some(var.clone()), None, &decided, None)
        }
        [Value::Symbol(var), imin, imax] => bounds(ev, Some(var.clone()), Some(imin), imax, None),
        [Value::Symbol(var), imin, imax, step] => {
            bounds(ev, Some(var.clone()), Some(imin), imax, Some(step))
        }
        _ => Ok(None),
    }
}

/// Evaluate range bounds once, up front, and derive the iteration count
/// as `(stop - start) / step`.
fn bounds(
    ev: &mut Evaluator,
    var: Option<Symbol>,
    start: Option<&Value>,
    stop: &Value,
    step: Option<&Value>,
) -> EvalResult<Option<IterSpec>> {
    let start = match start {
        Some(value) => ev.evaluate(value)?,
        None => Value::int(1),
    };
    let stop = ev.evaluate(stop)?;
    let step = match step {
        Some(value) => ev.evaluate(value)?,
        None => Value::int(1),
    };
    let step_is_zero = matches!(step, Value::Integer(0))
        || matches!(&step, Value::Real { value, .. } if *value == 0.0);
    if step_is_zero {
        return Ok(None);
    }
    let count = ev.evaluate(&Value::call(
        "Divide",
        vec![
            Value::call("Subtract", vec![stop, start.clone()]),
            step.clone(),
        ],
    ))?;
    Ok(Some(IterSpec::Range {
        var,
        start,
        step,
        count,
    }))
}

/// Empty the iteration variable's ownvalues, keeping the old list for
/// restoration. `None` means the variable is not writable.
fn bind_probe(ev: &mut Evaluator, op: &str, var: &Symbol) -> Option<RuleList> {
    match ev.definitions_mut().swap_ownvalues(var, RuleList::new()) {
        Ok(saved) => Some(saved),
        Err(error) => {
            assign::report_defs_error(ev, op, &error);
            None
        }
    }
}

fn rebind(ev: &mut Evaluator, op: &str, var: &Symbol, value: Value) -> Result<(), ()> {
    let mut rules = RuleList::new();
    rules.insert(Rule::immediate(Value::Symbol(var.clone()), value));
    match ev.definitions_mut().swap_ownvalues(var, rules) {
        Ok(_) => Ok(()),
        Err(error) => {
            assign::report_defs_error(ev, op, &error);
            Err(())
        }
    }
}

fn restore(ev: &mut Evaluator, var: &Symbol, saved: RuleList) {
    // The probe already established the symbol is writable.
    let _ = ev.definitions_mut().swap_ownvalues(var, saved);
}

fn iterate_items(
    ev: &mut Evaluator,
    op: &str,
    body: &Value,
    var: &Symbol,
    items: Vec<Value>,
) -> EvalResult<Option<Value>> {
    let saved = match bind_probe(ev, op, var) {
        Some(saved) => saved,
        None => return Ok(None),
    };
    let mut outcome: EvalResult<Option<Value>> = Ok(Some(Value::sym("Null")));
    for item in items {
        if rebind(ev, op, var, item).is_err() {
            outcome = Ok(None);
            break;
        }
        match ev.evaluate(body) {
            Ok(_) | Err(ControlSignal::Continue) => {}
            Err(ControlSignal::Break) => break,
            Err(ControlSignal::Return(result)) => {
                outcome = Ok(Some(result));
                break;
            }
            Err(signal) => {
                outcome = Err(signal);
                break;
            }
        }
    }
    restore(ev, var, saved);
    outcome
}

fn iterate_range(
    ev: &mut Evaluator,
    op: &str,
    body: &Value,
    var: Option<&Symbol>,
    start: &Value,
    step: &Value,
    count: &Value,
) -> EvalResult<Option<Value>> {
    let saved = match var {
        Some(var) => match bind_probe(ev, op, var) {
            Some(saved) => Some(saved),
            None => return Ok(None),
        },
        None => None,
    };
    let mut outcome: EvalResult<Option<Value>> = Ok(Some(Value::sym("Null")));
    let mut index: i64 = 0;
    loop {
        match ev.adapter().compare(&Value::int(index), count) {
            Some(Ordering::Less) | Some(Ordering::Equal) => {}
            Some(Ordering::Greater) => break,
            None => {
                ev.message(op, "iterb", &[]);
                outcome = Ok(None);
                break;
            }
        }
        let current = ev.evaluate(&Value::call(
            "Plus",
            vec![
                start.clone(),
                Value::call("Times", vec![step.clone(), Value::int(index)]),
            ],
        ));
        let current = match current {
            Ok(current) => current,
            Err(signal) => {
                outcome = Err(signal);
                break;
            }
        };
        if let Some(var) = var {
            if rebind(ev, op, var, current).is_err() {
                outcome = Ok(None);
                break;
            }
        }
        match ev.evaluate(body) {
            Ok(_) | Err(ControlSignal::Continue) => {}
            Err(ControlSignal::Break) => break,
            Err(ControlSignal::Return(result)) => {
                outcome = Ok(Some(result));
                break;
            }
            Err(signal) => {
                outcome = Err(signal);
                break;
            }
        }
        index += 1;
    }
    if let (Some(var), Some(saved)) = (var, saved) {
        restore(ev, var, saved);
    }
    outcome
}

pub(super) fn catch(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    let elements = value.elements();
    match elements {
        [body] => match ev.evaluate(body) {
            Ok(result) => Ok(Some(result)),
            Err(ControlSignal::Throw { value, .. }) => Ok(Some(value)),
            Err(signal) => Err(signal),
        },
        [body, form] | [body, form, _] => {
            let handler = elements.get(2);
            match ev.evaluate(body) {
                Ok(result) => Ok(Some(result)),
                Err(ControlSignal::Throw {
                    value,
                    tag: Some(tag),
                }) => {
                    if ev.pattern_matches(form, &tag)? {
                        match handler {
                            Some(f) => {
                                let applied = Value::expr(f.clone(), vec![value, tag]);
                                Ok(Some(ev.evaluate(&applied)?))
                            }
                            None => Ok(Some(value)),
                        }
                    } else {
                        Err(ControlSignal::Throw {
                            value,
                            tag: Some(tag),
                        })
                    }
                }
                // Untagged throws only stop at an untagged catch.
                Err(signal) => Err(signal),
            }
        }
        _ => Ok(None),
    }
}

pub(super) fn throw(_ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    match value.elements() {
        [v] => Err(ControlSignal::Throw {
            value: v.clone(),
            tag: None,
        }),
        [v, t] => Err(ControlSignal::Throw {
            value: v.clone(),
            tag: Some(t.clone()),
        }),
        _ => Ok(None),
    }
}

pub(super) fn control_return(_ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    match value.elements() {
        [] => Err(ControlSignal::Return(Value::sym("Null"))),
        [v] => Err(ControlSignal::Return(v.clone())),
        _ => Ok(None),
    }
}

pub(super) fn break_loop(_ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    if value.elements().is_empty() {
        Err(ControlSignal::Break)
    } else {
        Ok(None)
    }
}

pub(super) fn continue_loop(_ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    if value.elements().is_empty() {
        Err(ControlSignal::Continue)
    } else {
        Ok(None)
    }
}

pub(super) fn abort(_ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    if value.elements().is_empty() {
        Err(ControlSignal::Abort)
    } else {
        Ok(None)
    }
}

pub(super) fn check_abort(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    let (body, fallback) = match value.elements() {
        [body, fallback] => (body, fallback),
        _ => return Ok(None),
    };
    match ev.evaluate(body) {
        Ok(result) => Ok(Some(result)),
        Err(ControlSignal::Abort) => Ok(Some(ev.evaluate(fallback)?)),
        Err(signal) => Err(signal),
    }
}

/// `Evaluate` surviving into a held position has done its job by the time
/// the handler sees it; unwrap to the evaluated contents.
pub(super) fn evaluate_wrapper(_ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    match value.elements() {
        [v] => Ok(Some(v.clone())),
        elements => Ok(Some(Value::call("Sequence", elements.to_vec()))),
    }
}
