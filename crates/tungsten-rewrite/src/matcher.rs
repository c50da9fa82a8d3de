//! Backtracking pattern matcher.
//!
//! Matching walks pattern and candidate together, binding pattern names as
//! it goes. Sequence-capable patterns (`__`, `___`, `Repeated`, `Optional`)
//! are matched against candidate slices; under `Orderless` the slices
//! become subsets, and under `Flat` a single-value pattern may swallow a
//! run of elements regrouped under the function head. Choice points clone
//! the binding map and commit it only on success.
//!
//! The matcher re-enters evaluation for `PatternTest` and `Condition`
//! through [`MatchHooks`], so it has no dependency on the evaluator proper.

use std::collections::HashMap;

use thiserror::Error;
use tungsten_core::{Symbol, Value};

use crate::attrs::Attributes;
use crate::defs::Definitions;
use crate::specificity::pattern_cmp;

/// Pattern-name bindings, keyed by fully qualified symbol name. A name
/// bound to a multi-element span holds it as a `Sequence[...]` value.
pub type Bindings = HashMap<String, Value>;

/// Failure modes beyond an ordinary mismatch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    /// `Pattern` whose name slot is not a symbol.
    #[error("invalid pattern name in {0:?}")]
    BadPatternName(Value),
    /// A pattern construct with the wrong number of elements.
    #[error("{head} used with {got} elements where {expected} are expected")]
    BadArity {
        head: String,
        got: usize,
        expected: usize,
    },
    /// Evaluation inside a test or condition raised a control signal; the
    /// signal itself is parked with the host.
    #[error("matching interrupted")]
    Interrupted,
}

fn bad_arity(head: &str, got: usize, expected: usize) -> MatchError {
    MatchError::BadArity {
        head: head.to_string(),
        got,
        expected,
    }
}

/// Services the matcher needs from its host.
pub trait MatchHooks {
    /// Attributes of a symbol, driving `Orderless`/`Flat`/`OneIdentity`
    /// matching.
    fn attributes(&self, sym: &Symbol) -> Attributes;

    /// Default value for an omitted `Optional` element of `head` at the
    /// 1-based `position`.
    fn default_value(&self, head: &Symbol, position: usize) -> Option<Value>;

    /// Decide `PatternTest`: evaluate `test[candidate]` and report whether
    /// it yielded `True`.
    fn eval_test(&mut self, test: &Value, candidate: &Value) -> Result<bool, MatchError>;

    /// Decide `Condition`: evaluate the condition under `bindings` and
    /// report whether it yielded `True`.
    fn eval_condition(&mut self, condition: &Value, bindings: &Bindings)
        -> Result<bool, MatchError>;
}

/// Hooks backed by a definition store alone: pattern tests never pass, and
/// a condition holds only when substitution leaves the literal `True`.
pub struct StructuralHooks<'a>(pub &'a Definitions);

impl MatchHooks for StructuralHooks<'_> {
    fn attributes(&self, sym: &Symbol) -> Attributes {
        self.0.attributes(sym)
    }

    fn default_value(&self, head: &Symbol, position: usize) -> Option<Value> {
        self.0.default_value(head, position).cloned()
    }

    fn eval_test(&mut self, _test: &Value, _candidate: &Value) -> Result<bool, MatchError> {
        Ok(false)
    }

    fn eval_condition(
        &mut self,
        condition: &Value,
        bindings: &Bindings,
    ) -> Result<bool, MatchError> {
        Ok(literally_true(&substitute_bindings(condition, bindings)))
    }
}

fn literally_true(v: &Value) -> bool {
    matches!(v, Value::Symbol(s) if s.name() == "System`True")
}

/// Match `pattern` against `candidate`; `Ok(Some(..))` carries the
/// bindings of a successful match.
pub fn match_pattern(
    hooks: &mut dyn MatchHooks,
    pattern: &Value,
    candidate: &Value,
) -> Result<Option<Bindings>, MatchError> {
    let mut binds = Bindings::new();
    if match_value(hooks, pattern, candidate, &mut binds)? {
        Ok(Some(binds))
    } else {
        Ok(None)
    }
}

fn match_value(
    hooks: &mut dyn MatchHooks,
    pattern: &Value,
    candidate: &Value,
    binds: &mut Bindings,
) -> Result<bool, MatchError> {
    match_slice(hooks, pattern, std::slice::from_ref(candidate), binds)
}

/// The span of candidate elements a pattern can cover.
struct Span {
    min: usize,
    max: Option<usize>,
    optional: bool,
}

impl Span {
    const SINGLE: Span = Span {
        min: 1,
        max: Some(1),
        optional: false,
    };

    fn many(min: usize) -> Span {
        Span {
            min,
            max: None,
            optional: false,
        }
    }

    fn is_single(&self) -> bool {
        self.min == 1 && self.max == Some(1) && !self.optional
    }
}

fn span_of(pattern: &Value) -> Span {
    let node = match pattern.as_expr() {
        Some(node) => node,
        None => return Span::SINGLE,
    };
    let head = match node.head.as_symbol() {
        Some(s) => s.name(),
        None => return Span::SINGLE,
    };
    let n = node.elements.len();
    match head {
        "System`BlankSequence" if n <= 1 => Span::many(1),
        "System`BlankNullSequence" if n <= 1 => Span::many(0),
        "System`Repeated" if n == 1 => Span::many(1),
        "System`RepeatedNull" if n == 1 => Span::many(0),
        "System`Pattern" if n == 2 => span_of(&node.elements[1]),
        "System`PatternTest" | "System`Condition" if n == 2 => span_of(&node.elements[0]),
        "System`HoldPattern" if n == 1 => span_of(&node.elements[0]),
        "System`Optional" if n == 1 || n == 2 => {
            let inner = span_of(&node.elements[0]);
            Span {
                min: 0,
                max: inner.max,
                optional: true,
            }
        }
        "System`Alternatives" if n > 0 => {
            let mut min = usize::MAX;
            let mut max = Some(0);
            for branch in &node.elements {
                let span = span_of(branch);
                min = min.min(span.min);
                max = match (max, span.max) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    _ => None,
                };
            }
            Span {
                min,
                max,
                optional: false,
            }
        }
        _ => Span::SINGLE,
    }
}

/// Bound value of a matched span: a single element stays bare, anything
/// else becomes a `Sequence`.
fn sequence_of(parts: &[Value]) -> Value {
    if parts.len() == 1 {
        parts[0].clone()
    } else {
        Value::expr(
            Value::Symbol(Symbol::system("Sequence")),
            parts.to_vec(),
        )
    }
}

/// Match one pattern against a span of candidate elements. Single-value
/// patterns require a one-element span; the `Flat` regrouping that lets
/// them take more is decided by the caller, which sees the attributes.
fn match_slice(
    hooks: &mut dyn MatchHooks,
    pattern: &Value,
    parts: &[Value],
    binds: &mut Bindings,
) -> Result<bool, MatchError> {
    let node = match pattern.as_expr() {
        Some(node) => node,
        None => return Ok(parts.len() == 1 && pattern.same_q(&parts[0])),
    };
    let head = match node.head.as_symbol() {
        Some(s) => s.name(),
        None => return match_single_structural(hooks, pattern, parts, binds),
    };
    let n = node.elements.len();
    match head {
        "System`Blank" | "System`BlankSequence" | "System`BlankNullSequence" => {
            if n > 1 {
                return Err(bad_arity(strip_system(head), n, 1));
            }
            let (min, single) = match head {
                "System`Blank" => (1, true),
                "System`BlankSequence" => (1, false),
                _ => (0, false),
            };
            if parts.len() < min || (single && parts.len() != 1) {
                return Ok(false);
            }
            match node.elements.first() {
                Some(restriction) => {
                    Ok(parts.iter().all(|part| part.head().same_q(restriction)))
                }
                None => Ok(true),
            }
        }
        "System`Pattern" => {
            if n != 2 {
                return Err(bad_arity("Pattern", n, 2));
            }
            let name = match node.elements[0].as_symbol() {
                Some(s) => s.name().to_string(),
                None => return Err(MatchError::BadPatternName(pattern.clone())),
            };
            if !match_slice(hooks, &node.elements[1], parts, binds)? {
                return Ok(false);
            }
            let bound = sequence_of(parts);
            match binds.get(&name) {
                Some(existing) => Ok(existing.same_q(&bound)),
                None => {
                    binds.insert(name, bound);
                    Ok(true)
                }
            }
        }
        "System`PatternTest" => {
            if n != 2 {
                return Err(bad_arity("PatternTest", n, 2));
            }
            if !match_slice(hooks, &node.elements[0], parts, binds)? {
                return Ok(false);
            }
            for part in parts {
                if !hooks.eval_test(&node.elements[1], part)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        "System`Condition" => {
            if n != 2 {
                return Err(bad_arity("Condition", n, 2));
            }
            if !match_slice(hooks, &node.elements[0], parts, binds)? {
                return Ok(false);
            }
            hooks.eval_condition(&node.elements[1], binds)
        }
        "System`Alternatives" => {
            for branch in &node.elements {
                let mut trial = binds.clone();
                if match_slice(hooks, branch, parts, &mut trial)? {
                    *binds = trial;
                    return Ok(true);
                }
            }
            Ok(false)
        }
        "System`Except" => {
            if n == 0 || n > 2 {
                return Err(bad_arity("Except", n, 1));
            }
            let mut scratch = binds.clone();
            if match_slice(hooks, &node.elements[0], parts, &mut scratch)? {
                return Ok(false);
            }
            match node.elements.get(1) {
                Some(positive) => match_slice(hooks, positive, parts, binds),
                None => Ok(true),
            }
        }
        "System`Optional" => {
            if n == 0 || n > 2 {
                return Err(bad_arity("Optional", n, 1));
            }
            match_slice(hooks, &node.elements[0], parts, binds)
        }
        "System`Repeated" | "System`RepeatedNull" => {
            if n != 1 {
                return Err(bad_arity(strip_system(head), n, 1));
            }
            if head == "System`Repeated" && parts.is_empty() {
                return Ok(false);
            }
            // repetitions share bindings, so named sub-patterns unify
            for part in parts {
                if !match_value(hooks, &node.elements[0], part, binds)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        "System`Verbatim" => {
            if n != 1 {
                return Err(bad_arity("Verbatim", n, 1));
            }
            Ok(parts.len() == 1 && node.elements[0].same_q(&parts[0]))
        }
        "System`HoldPattern" => {
            if n != 1 {
                return Err(bad_arity("HoldPattern", n, 1));
            }
            match_slice(hooks, &node.elements[0], parts, binds)
        }
        _ => match_single_structural(hooks, pattern, parts, binds),
    }
}

fn strip_system(name: &str) -> &str {
    name.strip_prefix("System`").unwrap_or(name)
}

fn match_single_structural(
    hooks: &mut dyn MatchHooks,
    pattern: &Value,
    parts: &[Value],
    binds: &mut Bindings,
) -> Result<bool, MatchError> {
    if parts.len() != 1 {
        return Ok(false);
    }
    let node = match pattern.as_expr() {
        Some(node) => node,
        None => return Ok(pattern.same_q(&parts[0])),
    };
    match_expression(hooks, node, &parts[0], binds)
}

fn match_expression(
    hooks: &mut dyn MatchHooks,
    pattern: &tungsten_core::ExprNode,
    candidate: &Value,
    binds: &mut Bindings,
) -> Result<bool, MatchError> {
    let attrs = match pattern.head.as_symbol() {
        Some(s) => hooks.attributes(s),
        None => Attributes::empty(),
    };
    if let Some(node) = candidate.as_expr() {
        let mut trial = binds.clone();
        if match_value(hooks, &pattern.head, &node.head, &mut trial)?
            && match_function_elements(
                hooks,
                &pattern.elements,
                &node.elements,
                pattern.head.as_symbol(),
                attrs,
                &mut trial,
            )?
        {
            *binds = trial;
            return Ok(true);
        }
    }
    // under OneIdentity a lone value also reads as head[value]; recursion
    // stops because the wrapped candidate has the pattern's head
    let same_head = candidate
        .as_expr()
        .map_or(false, |node| node.head.same_q(&pattern.head));
    if attrs.contains(Attributes::ONE_IDENTITY) && !same_head {
        let wrapped = Value::expr(pattern.head.clone(), vec![candidate.clone()]);
        return match_expression(hooks, pattern, &wrapped, binds);
    }
    Ok(false)
}

fn match_function_elements(
    hooks: &mut dyn MatchHooks,
    pats: &[Value],
    cands: &[Value],
    head: Option<&Symbol>,
    attrs: Attributes,
    binds: &mut Bindings,
) -> Result<bool, MatchError> {
    let flat = attrs.contains(Attributes::FLAT) && head.is_some();
    let total = cands.len();
    let items: Vec<(usize, &Value)> = pats.iter().enumerate().map(|(i, p)| (i + 1, p)).collect();
    if attrs.contains(Attributes::ORDERLESS) && items.len() > 1 {
        let mut ordered = items;
        ordered.sort_by(|(_, a), (_, b)| {
            let fixed_a = span_of(a).is_single();
            let fixed_b = span_of(b).is_single();
            fixed_b.cmp(&fixed_a).then_with(|| pattern_cmp(a, b))
        });
        let mut used = vec![false; cands.len()];
        match_orderless(hooks, &ordered, cands, &mut used, head, flat, total, binds)
    } else {
        match_sequential(hooks, &items, cands, head, flat, total, binds)
    }
}

/// Slice sizes to try for one pattern element. Later elements are served
/// first from shorter spans; the last element grabs greedily. The 0-or-1
/// case prefers presence over absence either way.
fn size_order(min: usize, hi: usize, last: bool) -> Vec<usize> {
    if min > hi {
        return Vec::new();
    }
    if last {
        (min..=hi).rev().collect()
    } else if min == 0 && hi == 1 {
        vec![1, 0]
    } else {
        (min..=hi).collect()
    }
}

fn match_sequential(
    hooks: &mut dyn MatchHooks,
    items: &[(usize, &Value)],
    cands: &[Value],
    head: Option<&Symbol>,
    flat: bool,
    total: usize,
    binds: &mut Bindings,
) -> Result<bool, MatchError> {
    let Some(&(position, pattern)) = items.first() else {
        return Ok(cands.is_empty());
    };
    let rest = &items[1..];
    let span = span_of(pattern);
    let rest_min: usize = rest.iter().map(|(_, p)| span_of(p).min).sum();
    let available = cands.len().saturating_sub(rest_min);
    let widened = flat && span.is_single();
    let hi = match span.max {
        Some(m) if !widened => m.min(available),
        _ => available,
    };
    for k in size_order(span.min, hi, rest.is_empty()) {
        let mut trial = binds.clone();
        let matched = if k == 0 {
            match_empty_span(hooks, pattern, &span, head, position, &mut trial)?
        } else {
            match_span(
                hooks,
                pattern,
                &span,
                &cands[..k],
                head,
                flat,
                total,
                &mut trial,
            )?
        };
        if matched && match_sequential(hooks, rest, &cands[k..], head, flat, total, &mut trial)? {
            *binds = trial;
            return Ok(true);
        }
    }
    Ok(false)
}

#[allow(clippy::too_many_arguments)]
fn match_orderless(
    hooks: &mut dyn MatchHooks,
    items: &[(usize, &Value)],
    cands: &[Value],
    used: &mut Vec<bool>,
    head: Option<&Symbol>,
    flat: bool,
    total: usize,
    binds: &mut Bindings,
) -> Result<bool, MatchError> {
    let Some(&(position, pattern)) = items.first() else {
        return Ok(used.iter().all(|u| *u));
    };
    let rest = &items[1..];
    let span = span_of(pattern);
    let free = used.iter().filter(|u| !**u).count();
    let rest_min: usize = rest.iter().map(|(_, p)| span_of(p).min).sum();
    let available = free.saturating_sub(rest_min);
    let widened = flat && span.is_single();
    let hi = match span.max {
        Some(m) if !widened => m.min(available),
        _ => available,
    };
    for k in size_order(span.min, hi, rest.is_empty()) {
        if k == 0 {
            let mut trial = binds.clone();
            if match_empty_span(hooks, pattern, &span, head, position, &mut trial)?
                && match_orderless(hooks, rest, cands, used, head, flat, total, &mut trial)?
            {
                *binds = trial;
                return Ok(true);
            }
        } else {
            let mut chosen = Vec::with_capacity(k);
            if pick_subset(
                hooks, items, cands, used, head, flat, total, binds, k, 0, &mut chosen,
            )? {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Choose `k` unused candidate indices (ascending, so candidate order is
/// kept inside the span) and try them for the first pattern item.
#[allow(clippy::too_many_arguments)]
fn pick_subset(
    hooks: &mut dyn MatchHooks,
    items: &[(usize, &Value)],
    cands: &[Value],
    used: &mut Vec<bool>,
    head: Option<&Symbol>,
    flat: bool,
    total: usize,
    binds: &mut Bindings,
    k: usize,
    start: usize,
    chosen: &mut Vec<usize>,
) -> Result<bool, MatchError> {
    let (_, pattern) = items[0];
    if chosen.len() == k {
        let parts: Vec<Value> = chosen.iter().map(|&i| cands[i].clone()).collect();
        let span = span_of(pattern);
        let mut trial = binds.clone();
        if match_span(hooks, pattern, &span, &parts, head, flat, total, &mut trial)? {
            for &i in chosen.iter() {
                used[i] = true;
            }
            if match_orderless(hooks, &items[1..], cands, used, head, flat, total, &mut trial)? {
                *binds = trial;
                return Ok(true);
            }
            for &i in chosen.iter() {
                used[i] = false;
            }
        }
        return Ok(false);
    }
    for i in start..cands.len() {
        if used[i] {
            continue;
        }
        chosen.push(i);
        if pick_subset(
            hooks, items, cands, used, head, flat, total, binds, k, i + 1, chosen,
        )? {
            return Ok(true);
        }
        chosen.pop();
    }
    Ok(false)
}

/// Match a pattern against a nonempty span, regrouping under the function
/// head when `Flat` widened a single-value pattern.
#[allow(clippy::too_many_arguments)]
fn match_span(
    hooks: &mut dyn MatchHooks,
    pattern: &Value,
    span: &Span,
    parts: &[Value],
    head: Option<&Symbol>,
    flat: bool,
    total: usize,
    binds: &mut Bindings,
) -> Result<bool, MatchError> {
    if span.is_single() && parts.len() != 1 {
        if flat && parts.len() > 1 && parts.len() < total {
            if let Some(head) = head {
                let wrapped = Value::expr(Value::Symbol(head.clone()), parts.to_vec());
                return match_value(hooks, pattern, &wrapped, binds);
            }
        }
        return Ok(false);
    }
    match_slice(hooks, pattern, parts, binds)
}

/// Match a pattern against the empty span: either a nullable sequence
/// pattern or an omitted `Optional` element standing in for its default.
fn match_empty_span(
    hooks: &mut dyn MatchHooks,
    pattern: &Value,
    span: &Span,
    head: Option<&Symbol>,
    position: usize,
    binds: &mut Bindings,
) -> Result<bool, MatchError> {
    if span.optional {
        let default = match optional_default(hooks, pattern, head, position)? {
            Some(value) => value,
            None => return Ok(false),
        };
        return match_value(hooks, pattern, &default, binds);
    }
    match_slice(hooks, pattern, &[], binds)
}

/// The value an omitted `Optional` element takes: its explicit default, or
/// the definition-store default of the surrounding function.
fn optional_default(
    hooks: &mut dyn MatchHooks,
    pattern: &Value,
    head: Option<&Symbol>,
    position: usize,
) -> Result<Option<Value>, MatchError> {
    let node = match pattern.as_expr() {
        Some(node) => node,
        None => return Ok(None),
    };
    let head_name = match node.head.as_symbol() {
        Some(s) => s.name(),
        None => return Ok(None),
    };
    let n = node.elements.len();
    match head_name {
        "System`Optional" if n == 2 => Ok(Some(node.elements[1].clone())),
        "System`Optional" if n == 1 => {
            Ok(head.and_then(|h| hooks.default_value(h, position)))
        }
        "System`Pattern" if n == 2 => optional_default(hooks, &node.elements[1], head, position),
        "System`PatternTest" | "System`Condition" if n == 2 => {
            optional_default(hooks, &node.elements[0], head, position)
        }
        "System`HoldPattern" if n == 1 => {
            optional_default(hooks, &node.elements[0], head, position)
        }
        _ => Ok(None),
    }
}

/// Replace bound pattern names by their values. A value bound to a span
/// arrives as `Sequence[...]` and splices into the surrounding element
/// list, as do literal `Sequence` heads produced along the way.
pub fn substitute_bindings(value: &Value, binds: &Bindings) -> Value {
    if binds.is_empty() {
        return value.clone();
    }
    replace_names(value, binds)
}

fn replace_names(value: &Value, binds: &Bindings) -> Value {
    match value {
        Value::Symbol(s) => binds
            .get(s.name())
            .cloned()
            .unwrap_or_else(|| value.clone()),
        Value::Expr(node) => {
            let head = replace_names(&node.head, binds);
            let mut elements = Vec::with_capacity(node.elements.len());
            for element in &node.elements {
                let replaced = replace_names(element, binds);
                if replaced.head_is("Sequence") {
                    elements.extend(replaced.elements().iter().cloned());
                } else {
                    elements.push(replaced);
                }
            }
            Value::expr(head, elements)
        }
        _ => value.clone(),
    }
}
