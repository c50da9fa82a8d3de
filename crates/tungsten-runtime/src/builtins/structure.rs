//! Structural predicates and term surgery: heads, lengths, canonical
//! ordering, threading, and rule application with `ReplaceAll` and
//! `ReplaceRepeated`.

use std::cmp::Ordering;

use tungsten_core::order::{canonical_cmp, sort_elements};
use tungsten_core::Value;
use tungsten_rewrite::Rule;

use crate::control::EvalResult;
use crate::eval::Evaluator;

use super::bool_value;

pub(super) fn atom_q(_ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    match value.elements() {
        [v] => Ok(Some(bool_value(v.is_atom()))),
        _ => Ok(None),
    }
}

pub(super) fn head(_ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    match value.elements() {
        [v] => Ok(Some(v.head())),
        _ => Ok(None),
    }
}

pub(super) fn length(_ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    match value.elements() {
        [v] => Ok(Some(Value::int(v.elements().len() as i64))),
        _ => Ok(None),
    }
}

pub(super) fn order(_ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    match value.elements() {
        [a, b] => Ok(Some(Value::int(match canonical_cmp(a, b) {
            Ordering::Less => 1,
            Ordering::Equal => 0,
            Ordering::Greater => -1,
        }))),
        _ => Ok(None),
    }
}

pub(super) fn ordered_q(_ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    match value.elements() {
        [v] if !v.is_atom() => {
            let ordered = v
                .elements()
                .windows(2)
                .all(|pair| canonical_cmp(&pair[0], &pair[1]) != Ordering::Greater);
            Ok(Some(bool_value(ordered)))
        }
        _ => Ok(None),
    }
}

pub(super) fn sort(_ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    match value.elements() {
        [v] if !v.is_atom() => {
            let mut elements = v.elements().to_vec();
            sort_elements(&mut elements);
            Ok(Some(Value::expr(v.head(), elements)))
        }
        _ => Ok(None),
    }
}

pub(super) fn thread(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    let target = match value.elements() {
        [target] if !target.is_atom() => target,
        _ => return Ok(None),
    };
    match ev.thread_listable(target) {
        Some(result) if !result.same_q(target) => Ok(Some(result)),
        // A length mismatch was already reported as tdlen.
        Some(_) => Ok(None),
        None => Ok(Some(target.clone())),
    }
}

pub(super) fn replace_all(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    let (target, rules_value) = match value.elements() {
        [target, rules_value] => (target, rules_value),
        _ => return Ok(None),
    };
    let rules = match parse_rules(rules_value) {
        Some(rules) => rules,
        None => {
            ev.message("ReplaceAll", "reps", &[rules_value.clone()]);
            return Ok(None);
        }
    };
    Ok(Some(apply_everywhere(ev, target, &rules)?))
}

pub(super) fn replace_repeated(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    let (target, rules_value) = match value.elements() {
        [target, rules_value] => (target, rules_value),
        _ => return Ok(None),
    };
    let rules = match parse_rules(rules_value) {
        Some(rules) => rules,
        None => {
            ev.message("ReplaceRepeated", "reps", &[rules_value.clone()]);
            return Ok(None);
        }
    };
    let limit = ev.iteration_limit();
    let mut current = target.clone();
    for _ in 0..limit {
        let replaced = apply_everywhere(ev, &current, &rules)?;
        let evaluated = ev.evaluate(&replaced)?;
        if evaluated.same_q(&current) {
            return Ok(Some(evaluated));
        }
        current = evaluated;
    }
    ev.message("$IterationLimit", "itlim", &[Value::int(limit as i64)]);
    Ok(Some(current))
}

fn parse_rules(value: &Value) -> Option<Vec<Rule>> {
    let items: &[Value] = if value.head_is("List") {
        value.elements()
    } else {
        std::slice::from_ref(value)
    };
    let mut rules = Vec::with_capacity(items.len());
    for item in items {
        if item.has_form("Rule", 2, Some(2)) {
            rules.push(Rule::immediate(
                item.elements()[0].clone(),
                item.elements()[1].clone(),
            ));
        } else if item.has_form("RuleDelayed", 2, Some(2)) {
            rules.push(Rule::delayed(
                item.elements()[0].clone(),
                item.elements()[1].clone(),
            ));
        } else {
            return None;
        }
    }
    Some(rules)
}

/// Outermost-first, leftmost-innermost walk: a match replaces the whole
/// subterm and stops the descent below it.
fn apply_everywhere(ev: &mut Evaluator, value: &Value, rules: &[Rule]) -> EvalResult<Value> {
    if let Some(result) = ev.apply_rule_slice(value, rules)? {
        return Ok(result);
    }
    match value.as_expr() {
        Some(node) => {
            let head = apply_everywhere(ev, &node.head, rules)?;
            let mut elements = Vec::with_capacity(node.elements.len());
            for element in &node.elements {
                elements.push(apply_everywhere(ev, element, rules)?);
            }
            Ok(Value::expr(head, elements))
        }
        None => Ok(value.clone()),
    }
}
