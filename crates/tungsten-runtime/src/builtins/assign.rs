//! Definition surgery: the `Set` family, attribute changes, and the
//! introspection forms that read definitions back out.
//!
//! All of these route through [`Definitions`] and report refusals as
//! `wrsym` or `locked` messages instead of failing the evaluation.

use tungsten_core::{Symbol, Value};
use tungsten_rewrite::{Attributes, DefKind, Definitions, DefsError, Delayed, Rule};

use crate::control::EvalResult;
use crate::eval::Evaluator;

struct Target {
    tag: Symbol,
    kind: DefKind,
}

/// Strip `HoldPattern` wrappers off an assignment left-hand side.
fn peel_hold_pattern(mut value: &Value) -> &Value {
    while value.has_form("HoldPattern", 1, Some(1)) {
        value = &value.elements()[0];
    }
    value
}

/// Move `Condition` wrappers from the right-hand side onto the pattern, so
/// `f[x_] := body /; test` stores as the rule `f[x_] /; test -> body`.
fn unroll_conditions(lhs: Value, rhs: Value) -> (Value, Value) {
    let mut pattern = lhs;
    let mut body = rhs;
    while body.has_form("Condition", 2, Some(2)) {
        let condition = body.elements()[1].clone();
        let inner = body.elements()[0].clone();
        pattern = Value::call("Condition", vec![pattern, condition]);
        body = inner;
    }
    (pattern, body)
}

/// Where an untagged assignment lands: ownvalues for a symbol, downvalues
/// for `f[...]`, subvalues for a curried `f[...][...]`.
fn target_for(focus: &Value) -> Option<Target> {
    match focus {
        Value::Symbol(sym) => Some(Target {
            tag: sym.clone(),
            kind: DefKind::Own,
        }),
        Value::Expr(_) => {
            let tag = focus.lookup_symbol()?.clone();
            let kind = if focus.head_symbol() == Some(&tag) {
                DefKind::Down
            } else {
                DefKind::Sub
            };
            Some(Target { tag, kind })
        }
        _ => None,
    }
}

/// Which store a `TagSet` on `tag` reaches for this left-hand side, if any.
fn tagged_target(focus: &Value, tag: &Symbol) -> Option<DefKind> {
    if let Value::Symbol(sym) = focus {
        return if sym == tag { Some(DefKind::Own) } else { None };
    }
    if focus.as_expr().is_some() {
        if focus.lookup_symbol() == Some(tag) {
            return if focus.head_symbol() == Some(tag) {
                Some(DefKind::Down)
            } else {
                Some(DefKind::Sub)
            };
        }
        if focus
            .elements()
            .iter()
            .any(|element| upset_tag(element).as_ref() == Some(tag))
        {
            return Some(DefKind::Up);
        }
    }
    None
}

/// The symbol an element contributes an upvalue to. Pattern wrappers are
/// looked through; other atoms fall back to their type head.
fn upset_tag(element: &Value) -> Option<Symbol> {
    match element {
        Value::Symbol(sym) => Some(sym.clone()),
        Value::Expr(_) => {
            if element.has_form("Pattern", 2, Some(2)) {
                return upset_tag(&element.elements()[1]);
            }
            if element.has_any_form(
                &["Blank", "BlankSequence", "BlankNullSequence"],
                1,
                Some(1),
            ) {
                return upset_tag(&element.elements()[0]);
            }
            if element.has_form("Condition", 2, Some(2))
                || element.has_form("PatternTest", 2, Some(2))
                || element.has_form("HoldPattern", 1, Some(1))
                || element.has_form("Optional", 1, Some(2))
            {
                return upset_tag(&element.elements()[0]);
            }
            element.lookup_symbol().cloned()
        }
        _ => element.head().as_symbol().cloned(),
    }
}

pub(super) fn report_defs_error(ev: &mut Evaluator, op: &str, error: &DefsError) {
    match error {
        DefsError::Protected(sym) => {
            ev.message(op, "wrsym", &[Value::Symbol(sym.clone())]);
        }
        DefsError::Locked(sym) => {
            ev.message(op, "locked", &[Value::Symbol(sym.clone())]);
        }
    }
}

fn store_rule(ev: &mut Evaluator, op: &str, target: &Target, rule: Rule) -> bool {
    let stored = ev.definitions_mut().add_rule(target.kind, &target.tag, rule);
    match stored {
        Ok(()) => true,
        Err(error) => {
            report_defs_error(ev, op, &error);
            false
        }
    }
}

fn assign_rule(
    ev: &mut Evaluator,
    op: &str,
    lhs: &Value,
    rhs: &Value,
    delayed: Delayed,
    explicit_tag: Option<&Symbol>,
) -> bool {
    let focus = peel_hold_pattern(lhs);
    let target = match explicit_tag {
        Some(tag) => match tagged_target(focus, tag) {
            Some(kind) => Target {
                tag: tag.clone(),
                kind,
            },
            None => {
                ev.message(op, "tagnfd", &[Value::Symbol(tag.clone())]);
                return false;
            }
        },
        None => match target_for(focus) {
            Some(target) => target,
            None => {
                ev.message(op, "setraw", &[focus.clone()]);
                return false;
            }
        },
    };
    let (pattern, body) = unroll_conditions(focus.clone(), rhs.clone());
    let rule = match delayed {
        Delayed::No => Rule::immediate(pattern, body),
        Delayed::Yes => Rule::delayed(pattern, body),
    };
    store_rule(ev, op, &target, rule)
}

fn defs_ok(ev: &mut Evaluator, op: &str, stored: Result<(), DefsError>) -> bool {
    match stored {
        Ok(()) => true,
        Err(error) => {
            report_defs_error(ev, op, &error);
            false
        }
    }
}

/// Left-hand sides that write to an ancillary store instead of a rule
/// list: `f::tag`, `Default[f]`, `Options[f]`, and `Format[...]`.
fn special_set(
    ev: &mut Evaluator,
    op: &str,
    lhs: &Value,
    rhs: &Value,
    delayed: Delayed,
) -> Option<bool> {
    if lhs.has_form("MessageName", 2, Some(2)) {
        if let (Value::Symbol(sym), Value::String(tag), Value::String(text)) =
            (&lhs.elements()[0], &lhs.elements()[1], rhs)
        {
            let sym = sym.clone();
            let stored = ev.definitions_mut().set_message(&sym, tag, text);
            return Some(defs_ok(ev, op, stored));
        }
    }
    if lhs.has_form("Default", 1, Some(2)) {
        if let Value::Symbol(sym) = &lhs.elements()[0] {
            let position = match lhs.elements().get(1) {
                None => Some(None),
                Some(Value::Integer(n)) if *n >= 1 => Some(Some(*n as usize)),
                Some(_) => None,
            };
            if let Some(position) = position {
                let sym = sym.clone();
                let stored = ev.definitions_mut().set_default(&sym, position, rhs.clone());
                return Some(defs_ok(ev, op, stored));
            }
        }
    }
    if lhs.has_form("Options", 1, Some(1)) {
        if let (Value::Symbol(sym), Some(pairs)) = (&lhs.elements()[0], option_pairs(rhs)) {
            let sym = sym.clone();
            let mut ok = true;
            for (name, value) in pairs {
                let stored = ev.definitions_mut().set_option(&sym, &name, value);
                if !defs_ok(ev, op, stored) {
                    ok = false;
                    break;
                }
            }
            return Some(ok);
        }
    }
    if lhs.has_form("Format", 1, Some(1)) {
        let focus = peel_hold_pattern(&lhs.elements()[0]);
        return Some(match target_for(focus) {
            Some(target) => {
                let rule = match delayed {
                    Delayed::No => Rule::immediate(focus.clone(), rhs.clone()),
                    Delayed::Yes => Rule::delayed(focus.clone(), rhs.clone()),
                };
                let stored = ev.definitions_mut().add_format_rule(&target.tag, rule);
                defs_ok(ev, op, stored)
            }
            None => {
                ev.message(op, "setraw", &[lhs.elements()[0].clone()]);
                false
            }
        });
    }
    None
}

fn option_pairs(rhs: &Value) -> Option<Vec<(String, Value)>> {
    let items: &[Value] = if rhs.head_is("List") {
        rhs.elements()
    } else {
        std::slice::from_ref(rhs)
    };
    let mut pairs = Vec::with_capacity(items.len());
    for item in items {
        if !item.has_any_form(&["Rule", "RuleDelayed"], 2, Some(2)) {
            return None;
        }
        let name = match &item.elements()[0] {
            Value::Symbol(sym) => sym.short_name().to_string(),
            Value::String(text) => text.clone(),
            _ => return None,
        };
        pairs.push((name, item.elements()[1].clone()));
    }
    Some(pairs)
}

pub(super) fn set(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    let (lhs, rhs) = match value.elements() {
        [lhs, rhs] => (lhs, rhs),
        _ => return Ok(None),
    };
    if special_set(ev, "Set", lhs, rhs, Delayed::No).is_none() {
        assign_rule(ev, "Set", lhs, rhs, Delayed::No, None);
    }
    // Set yields its right-hand side whether or not the write landed.
    Ok(Some(rhs.clone()))
}

pub(super) fn set_delayed(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    let (lhs, rhs) = match value.elements() {
        [lhs, rhs] => (lhs, rhs),
        _ => return Ok(None),
    };
    let ok = match special_set(ev, "SetDelayed", lhs, rhs, Delayed::Yes) {
        Some(ok) => ok,
        None => assign_rule(ev, "SetDelayed", lhs, rhs, Delayed::Yes, None),
    };
    Ok(Some(outcome_value(ok)))
}

pub(super) fn tag_set(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    let (tag_value, lhs, rhs) = match value.elements() {
        [tag, lhs, rhs] => (tag, lhs, rhs),
        _ => return Ok(None),
    };
    let tag = match tag_value.as_symbol() {
        Some(tag) => tag.clone(),
        None => {
            ev.message("TagSet", "sym", &[tag_value.clone(), Value::int(1)]);
            return Ok(None);
        }
    };
    // TagSet holds all of its arguments, so the right-hand side gets its
    // immediate evaluation here.
    let rhs = ev.evaluate(rhs)?;
    assign_rule(ev, "TagSet", lhs, &rhs, Delayed::No, Some(&tag));
    Ok(Some(rhs))
}

pub(super) fn tag_set_delayed(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    let (tag_value, lhs, rhs) = match value.elements() {
        [tag, lhs, rhs] => (tag, lhs, rhs),
        _ => return Ok(None),
    };
    let tag = match tag_value.as_symbol() {
        Some(tag) => tag.clone(),
        None => {
            ev.message("TagSetDelayed", "sym", &[tag_value.clone(), Value::int(1)]);
            return Ok(None);
        }
    };
    let ok = assign_rule(ev, "TagSetDelayed", lhs, rhs, Delayed::Yes, Some(&tag));
    Ok(Some(outcome_value(ok)))
}

fn up_assign(ev: &mut Evaluator, op: &str, lhs: &Value, rhs: &Value, delayed: Delayed) -> bool {
    let focus = peel_hold_pattern(lhs);
    if focus.is_atom() {
        ev.message(
            op,
            "normal",
            &[
                Value::int(1),
                Value::call(op, vec![lhs.clone(), rhs.clone()]),
            ],
        );
        return false;
    }
    let (pattern, body) = unroll_conditions(focus.clone(), rhs.clone());
    let mut seen: Vec<Symbol> = Vec::new();
    let mut stored = false;
    for element in focus.elements() {
        let tag = match upset_tag(element) {
            Some(tag) => tag,
            None => continue,
        };
        if seen.iter().any(|known| known == &tag) {
            continue;
        }
        seen.push(tag.clone());
        let rule = match delayed {
            Delayed::No => Rule::immediate(pattern.clone(), body.clone()),
            Delayed::Yes => Rule::delayed(pattern.clone(), body.clone()),
        };
        let landed = ev.definitions_mut().add_rule(DefKind::Up, &tag, rule);
        if defs_ok(ev, op, landed) {
            stored = true;
        }
    }
    stored
}

pub(super) fn up_set(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    let (lhs, rhs) = match value.elements() {
        [lhs, rhs] => (lhs, rhs),
        _ => return Ok(None),
    };
    up_assign(ev, "UpSet", lhs, rhs, Delayed::No);
    Ok(Some(rhs.clone()))
}

pub(super) fn up_set_delayed(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    let (lhs, rhs) = match value.elements() {
        [lhs, rhs] => (lhs, rhs),
        _ => return Ok(None),
    };
    let ok = up_assign(ev, "UpSetDelayed", lhs, rhs, Delayed::Yes);
    Ok(Some(outcome_value(ok)))
}

fn outcome_value(ok: bool) -> Value {
    Value::sym(if ok { "Null" } else { "$Failed" })
}

pub(super) fn unset(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    let lhs = match value.elements() {
        [lhs] => lhs,
        _ => return Ok(None),
    };
    let focus = peel_hold_pattern(lhs);
    let target = match target_for(focus) {
        Some(target) => target,
        None => {
            ev.message("Unset", "setraw", &[focus.clone()]);
            return Ok(Some(Value::sym("$Failed")));
        }
    };
    let removed = ev.definitions_mut().unset(target.kind, &target.tag, focus);
    match removed {
        Ok(true) => Ok(Some(Value::sym("Null"))),
        Ok(false) => {
            ev.message(
                "Unset",
                "norep",
                &[focus.clone(), Value::Symbol(target.tag.clone())],
            );
            Ok(Some(Value::sym("$Failed")))
        }
        Err(error) => {
            report_defs_error(ev, "Unset", &error);
            Ok(Some(Value::sym("$Failed")))
        }
    }
}

fn clear_with(
    ev: &mut Evaluator,
    op: &str,
    value: &Value,
    apply: fn(&mut Definitions, &Symbol) -> Result<(), DefsError>,
) -> EvalResult<Option<Value>> {
    for element in value.elements() {
        match element {
            Value::Symbol(sym) => {
                let sym = sym.clone();
                let cleared = apply(ev.definitions_mut(), &sym);
                defs_ok(ev, op, cleared);
            }
            Value::String(pattern) => {
                let names = ev.definitions().get_matching_names(pattern);
                for name in names {
                    let sym = Symbol::new(&name);
                    let cleared = apply(ev.definitions_mut(), &sym);
                    defs_ok(ev, op, cleared);
                }
            }
            other => {
                ev.message(op, "ssym", &[other.clone()]);
            }
        }
    }
    Ok(Some(Value::sym("Null")))
}

pub(super) fn clear(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    clear_with(ev, "Clear", value, Definitions::clear)
}

pub(super) fn clear_all(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    clear_with(ev, "ClearAll", value, Definitions::clear_all)
}

pub(super) fn remove(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    clear_with(ev, "Remove", value, Definitions::remove)
}

fn protection_targets(ev: &mut Evaluator, op: &str, value: &Value) -> Vec<Symbol> {
    let mut targets = Vec::new();
    for element in value.elements() {
        match element {
            Value::Symbol(sym) => targets.push(sym.clone()),
            Value::String(pattern) => {
                for name in ev.definitions().get_matching_names(pattern) {
                    targets.push(Symbol::new(&name));
                }
            }
            other => {
                let other = other.clone();
                ev.message(op, "ssym", &[other]);
            }
        }
    }
    targets
}

fn toggle_protection(
    ev: &mut Evaluator,
    op: &str,
    value: &Value,
    protect: bool,
) -> EvalResult<Option<Value>> {
    let mut changed: Vec<Value> = Vec::new();
    for sym in protection_targets(ev, op, value) {
        let has = ev
            .definitions()
            .attributes(&sym)
            .contains(Attributes::PROTECTED);
        if has == protect {
            continue;
        }
        let toggled = if protect {
            ev.definitions_mut().set_attributes(&sym, Attributes::PROTECTED)
        } else {
            ev.definitions_mut().clear_attributes(&sym, Attributes::PROTECTED)
        };
        if defs_ok(ev, op, toggled) {
            changed.push(Value::str(sym.short_name()));
        }
    }
    Ok(Some(Value::call("List", changed)))
}

pub(super) fn protect(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    toggle_protection(ev, "Protect", value, true)
}

pub(super) fn unprotect(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    toggle_protection(ev, "Unprotect", value, false)
}

fn parse_attributes(ev: &mut Evaluator, op: &str, value: &Value) -> Option<Attributes> {
    let items: &[Value] = if value.head_is("List") {
        value.elements()
    } else {
        std::slice::from_ref(value)
    };
    let mut attrs = Attributes::empty();
    for item in items {
        let parsed = item
            .as_symbol()
            .and_then(|sym| Attributes::from_name(sym.short_name()));
        match parsed {
            Some(bits) => attrs |= bits,
            None => {
                ev.message(op, "attnf", &[item.clone()]);
                return None;
            }
        }
    }
    Some(attrs)
}

fn change_attributes(
    ev: &mut Evaluator,
    op: &str,
    value: &Value,
    apply: fn(&mut Definitions, &Symbol, Attributes) -> Result<(), DefsError>,
) -> EvalResult<Option<Value>> {
    let (symbols_value, attrs_value) = match value.elements() {
        [symbols, attrs] => (symbols, attrs),
        _ => return Ok(None),
    };
    let attrs = match parse_attributes(ev, op, attrs_value) {
        Some(attrs) => attrs,
        None => return Ok(Some(Value::sym("$Failed"))),
    };
    let targets: &[Value] = if symbols_value.head_is("List") {
        symbols_value.elements()
    } else {
        std::slice::from_ref(symbols_value)
    };
    for target in targets {
        let sym = match target.as_symbol() {
            Some(sym) => sym.clone(),
            None => {
                ev.message(op, "sym", &[target.clone(), Value::int(1)]);
                continue;
            }
        };
        let applied = apply(ev.definitions_mut(), &sym, attrs);
        defs_ok(ev, op, applied);
    }
    Ok(Some(Value::sym("Null")))
}

pub(super) fn set_attributes(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    change_attributes(ev, "SetAttributes", value, Definitions::set_attributes)
}

pub(super) fn clear_attributes(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    change_attributes(ev, "ClearAttributes", value, Definitions::clear_attributes)
}

pub(super) fn attributes(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    let sym = match value.elements() {
        [Value::Symbol(sym)] => sym.clone(),
        [other] => {
            ev.message("Attributes", "sym", &[other.clone(), Value::int(1)]);
            return Ok(None);
        }
        _ => return Ok(None),
    };
    let names = ev.definitions().attributes(&sym).names();
    let elements = names.into_iter().map(Value::sym).collect();
    Ok(Some(Value::call("List", elements)))
}

fn value_list(
    ev: &mut Evaluator,
    op: &str,
    value: &Value,
    kind: DefKind,
) -> EvalResult<Option<Value>> {
    let sym = match value.elements() {
        [Value::Symbol(sym)] => sym.clone(),
        [other] => {
            ev.message(op, "sym", &[other.clone(), Value::int(1)]);
            return Ok(None);
        }
        _ => return Ok(None),
    };
    let mut out = Vec::new();
    if let Some(record) = ev.definitions().lookup(&sym) {
        for rule in record.rules(kind) {
            out.push(present_rule(rule));
        }
    }
    Ok(Some(Value::call("List", out)))
}

/// Definitions read back as `HoldPattern[lhs] :> rhs`, keeping the pattern
/// inert.
fn present_rule(rule: &Rule) -> Value {
    Value::call(
        "RuleDelayed",
        vec![
            Value::call("HoldPattern", vec![rule.lhs.clone()]),
            rule.rhs.clone(),
        ],
    )
}

pub(super) fn own_values(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    value_list(ev, "OwnValues", value, DefKind::Own)
}

pub(super) fn down_values(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    value_list(ev, "DownValues", value, DefKind::Down)
}

pub(super) fn sub_values(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    value_list(ev, "SubValues", value, DefKind::Sub)
}

pub(super) fn up_values(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    value_list(ev, "UpValues", value, DefKind::Up)
}

pub(super) fn options(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    let sym = match value.elements() {
        [Value::Symbol(sym)] => sym.clone(),
        [other] => {
            ev.message("Options", "sym", &[other.clone(), Value::int(1)]);
            return Ok(None);
        }
        _ => return Ok(None),
    };
    let mut pairs: Vec<(String, Value)> = match ev.definitions().lookup(&sym) {
        Some(record) => record
            .options
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
        None => Vec::new(),
    };
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    let elements = pairs
        .into_iter()
        .map(|(name, setting)| Value::call("Rule", vec![Value::sym(&name), setting]))
        .collect();
    Ok(Some(Value::call("List", elements)))
}

pub(super) fn default_read(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    let elements = value.elements();
    let sym = match elements.first().and_then(Value::as_symbol) {
        Some(sym) => sym.clone(),
        None => return Ok(None),
    };
    let found = match elements {
        // Position 0 is never a stored slot, so this reads the general
        // default only.
        [_] => ev.definitions().default_value(&sym, 0),
        [_, Value::Integer(n)] if *n >= 1 => ev.definitions().default_value(&sym, *n as usize),
        _ => return Ok(None),
    };
    Ok(found.cloned())
}

pub(super) fn message_name(ev: &mut Evaluator, value: &Value) -> EvalResult<Option<Value>> {
    let (sym, tag) = match value.elements() {
        [Value::Symbol(sym), Value::String(tag)] => (sym.clone(), tag.clone()),
        _ => return Ok(None),
    };
    // Unlike reporting, reading back does not fall through to General.
    let found = ev
        .definitions()
        .lookup(&sym)
        .and_then(|record| record.messages.get(&tag));
    Ok(found.map(|text| Value::str(text)))
}
