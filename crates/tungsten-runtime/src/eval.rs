//! The rewrite loop.
//!
//! [`Evaluator::evaluate`] drives a term to normal form. Each pass
//! evaluates the head, evaluates or holds the elements under the head's
//! attributes, splices `Sequence`, strips `Unevaluated`, flattens `Flat`
//! heads and sorts `Orderless` ones, threads `Listable` heads over lists,
//! and then looks for a rewrite: a registered native operator first, then
//! the lookup symbol's down- or subvalues, then upvalues reached through
//! the elements. Passes repeat until one finds no rewrite; element
//! evaluation and canonicalization on their own never trigger another
//! pass, since both are idempotent.
//!
//! Normal forms are stamped with the store generation they were computed
//! under; a later evaluation of the same node returns immediately unless
//! one of the symbols it depends on has been redefined since.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use tungsten_core::order::canonical_cmp;
use tungsten_core::{EvalStamp, Symbol, Value};
use tungsten_rewrite::{
    match_pattern, substitute_bindings, Attributes, Bindings, Definitions, MatchError, MatchHooks,
    Rule, RuleList,
};

use crate::builtins;
use crate::control::{ControlSignal, EvalResult};
use crate::messages::{render_template, Message};
use crate::numeric::{ExactAdapter, NumericAdapter};

/// A native operator. Answers `Ok(Some(result))` to rewrite the term,
/// `Ok(None)` to decline and let rule lookup continue.
pub type NativeFn = fn(&mut Evaluator, &Value) -> EvalResult<Option<Value>>;

pub const DEFAULT_RECURSION_LIMIT: usize = 512;
pub const DEFAULT_ITERATION_LIMIT: usize = 4096;

/// Lower bound both limits are clamped to, so the guard machinery itself
/// stays evaluable.
const MIN_LIMIT: usize = 20;
/// Upper bound on `$RecursionLimit`; past it deep recursion would exhaust
/// the host stack before the guard fires.
const MAX_RECURSION_LIMIT: usize = 4096;

/// One evaluation session: a definition store, the native operators, a
/// numeric engine and the message buffer.
///
/// Sessions share nothing. To branch one, clone its store and hand the
/// clone to [`Evaluator::with_definitions`].
pub struct Evaluator {
    defs: Definitions,
    natives: HashMap<Symbol, NativeFn>,
    adapter: Box<dyn NumericAdapter>,
    messages: Vec<Message>,
    recursion_depth: usize,
    cancel: Arc<AtomicBool>,
    /// Signal raised inside a pattern test or condition, parked here while
    /// the matcher unwinds with [`MatchError::Interrupted`].
    pending: Option<ControlSignal>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Evaluator::new()
    }
}

impl Evaluator {
    /// The standard environment: every builtin operator installed with its
    /// attributes, messages and defaults, and protected.
    pub fn new() -> Self {
        let mut ev = Evaluator::with_definitions(Definitions::new());
        builtins::install(&mut ev);
        ev
    }

    /// An evaluator over a caller-supplied store. Native operators are
    /// registered, the store is taken as-is: pass a clone of another
    /// session's store to branch it, or a fresh one for a bare environment
    /// without the builtin attribute and message records.
    pub fn with_definitions(defs: Definitions) -> Self {
        let mut ev = Evaluator {
            defs,
            natives: HashMap::new(),
            adapter: Box::new(ExactAdapter),
            messages: Vec::new(),
            recursion_depth: 0,
            cancel: Arc::new(AtomicBool::new(false)),
            pending: None,
        };
        builtins::register_natives(&mut ev);
        ev
    }

    /// Swap in a different numeric engine.
    pub fn with_adapter(mut self, adapter: Box<dyn NumericAdapter>) -> Self {
        self.adapter = adapter;
        self
    }

    pub fn definitions(&self) -> &Definitions {
        &self.defs
    }

    pub fn definitions_mut(&mut self) -> &mut Definitions {
        &mut self.defs
    }

    pub fn adapter(&self) -> &dyn NumericAdapter {
        self.adapter.as_ref()
    }

    /// Token that cancels evaluation from outside. Once set, the running
    /// evaluation unwinds with [`ControlSignal::Abort`] at the next
    /// checkpoint.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Messages emitted since the buffer was last drained.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn take_messages(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.messages)
    }

    /// Emit `symbol::tag`, rendering the stored template with `args`.
    /// Unknown templates still produce a message naming the missing entry.
    pub fn message(&mut self, symbol: &str, tag: &str, args: &[Value]) {
        let sym = Symbol::new(symbol);
        let text = match self.defs.message_template(&sym, tag) {
            Some(template) => render_template(template, args),
            None => format!("Message {}::{} not found.", sym.short_name(), tag),
        };
        self.messages.push(Message::new(sym.short_name(), tag, text));
    }

    /// Emit `symbol::tag` and hand back the abort signal, for failures
    /// that end the current evaluation.
    pub fn error(&mut self, symbol: &str, tag: &str, args: &[Value]) -> ControlSignal {
        self.message(symbol, tag, args);
        ControlSignal::Abort
    }

    /// Register a native operator for a head symbol.
    pub fn register(&mut self, name: &str, native: NativeFn) {
        self.natives.insert(Symbol::new(name), native);
    }

    fn limit_value(&self, name: &str, default: usize) -> usize {
        let rhs = self
            .defs
            .lookup(&Symbol::system(name))
            .and_then(|record| record.ownvalues.rules().first())
            .map(|rule| &rule.rhs);
        match rhs {
            Some(Value::Integer(n)) if *n > 0 => *n as usize,
            Some(Value::Symbol(sym)) if sym.name() == "System`Infinity" => usize::MAX,
            _ => default,
        }
    }

    /// Current `$RecursionLimit`.
    pub fn recursion_limit(&self) -> usize {
        self.limit_value("$RecursionLimit", DEFAULT_RECURSION_LIMIT)
            .clamp(MIN_LIMIT, MAX_RECURSION_LIMIT)
    }

    /// Current `$IterationLimit`.
    pub fn iteration_limit(&self) -> usize {
        self.limit_value("$IterationLimit", DEFAULT_ITERATION_LIMIT)
            .max(MIN_LIMIT)
    }

    /// Evaluate `value` to normal form. The error arm carries in-flight
    /// control signals; callers that want a final answer for a whole input
    /// use [`Evaluator::evaluate_top`].
    pub fn evaluate(&mut self, value: &Value) -> EvalResult<Value> {
        if self.cancel.load(AtomicOrdering::Relaxed) {
            return Err(ControlSignal::Abort);
        }
        let limit = self.recursion_limit();
        if self.recursion_depth >= limit {
            return Err(self.error("$RecursionLimit", "reclim", &[Value::int(limit as i64)]));
        }
        self.recursion_depth += 1;
        let result = self.evaluate_inner(value);
        self.recursion_depth -= 1;
        result
    }

    /// Evaluate one top-level input, resolving stray control signals:
    /// `Return[v]` answers `v`, aborts answer `$Aborted`, loose loop
    /// signals and uncaught throws are reported and answered held.
    pub fn evaluate_top(&mut self, value: &Value) -> Value {
        match self.evaluate(value) {
            Ok(result) => result,
            Err(ControlSignal::Abort) => Value::sym("$Aborted"),
            Err(ControlSignal::Return(result)) => result,
            Err(ControlSignal::Break) => {
                self.message("Break", "nofdw", &[]);
                Value::call("Hold", vec![Value::call("Break", Vec::new())])
            }
            Err(ControlSignal::Continue) => {
                self.message("Continue", "nofdw", &[]);
                Value::call("Hold", vec![Value::call("Continue", Vec::new())])
            }
            Err(ControlSignal::Throw { value, tag }) => {
                let thrown = match tag {
                    Some(tag) => Value::call("Throw", vec![value, tag]),
                    None => Value::call("Throw", vec![value]),
                };
                self.message("Throw", "nocatch", &[thrown.clone()]);
                Value::call("Hold", vec![thrown])
            }
        }
    }

    fn evaluate_inner(&mut self, value: &Value) -> EvalResult<Value> {
        match value {
            Value::Expr(_) => self.evaluate_expression(value),
            Value::Symbol(sym) if !sym.is_semantic_constant() => self.evaluate_symbol(sym),
            _ => Ok(value.clone()),
        }
    }

    /// Ownvalue lookup. A symbol that rewrites hands its replacement back
    /// to [`Evaluator::evaluate`], so chains of symbol definitions count
    /// against the recursion limit.
    fn evaluate_symbol(&mut self, sym: &Symbol) -> EvalResult<Value> {
        let rules = match self.defs.lookup(sym) {
            Some(record) if !record.ownvalues.is_empty() => record.ownvalues.clone(),
            _ => return Ok(Value::Symbol(sym.clone())),
        };
        let value = Value::Symbol(sym.clone());
        match self.apply_rule_list(&value, &rules)? {
            Some(result) if !result.same_q(&value) => self.evaluate(&result),
            _ => Ok(value),
        }
    }

    /// The fixpoint loop for a compound term.
    fn evaluate_expression(&mut self, value: &Value) -> EvalResult<Value> {
        let limit = self.iteration_limit();
        let mut current = value.clone();
        let mut names: HashSet<Symbol> = HashSet::new();
        let mut iteration = 1usize;
        loop {
            if self.cancel.load(AtomicOrdering::Relaxed) {
                return Err(ControlSignal::Abort);
            }

            // a valid normal-form stamp short-circuits the whole pass
            if let Value::Expr(node) = &current {
                if let Some(stamp) = node.stamp() {
                    if self.defs.unchanged_since(&stamp.symbols, stamp.generation) {
                        return Ok(current);
                    }
                }
            }

            if let Some(sym) = current.lookup_symbol() {
                names.insert(sym.clone());
            }

            let step = self.rewrite_step(&current);
            let (next, rewrote) = match step {
                Ok(step) => step,
                // a Return raised under one of the user-defined names in
                // this call chain ends here, as the value of the chain
                Err(ControlSignal::Return(result))
                    if names.iter().any(|sym| self.defs.is_user(sym)) =>
                {
                    return Ok(result);
                }
                Err(signal) => return Err(signal),
            };

            if !rewrote {
                self.stamp_normal_form(&next);
                return Ok(next);
            }
            current = next;

            iteration += 1;
            if iteration > limit {
                self.message("$IterationLimit", "itlim", &[Value::int(limit as i64)]);
                return Ok(Value::sym("$Aborted"));
            }
        }
    }

    /// One pass of the rewrite loop. The flag reports whether a rewrite
    /// was applied and the pass is worth repeating.
    fn rewrite_step(&mut self, value: &Value) -> EvalResult<(Value, bool)> {
        let node = match value {
            Value::Expr(node) => node.clone(),
            Value::Symbol(sym) => return Ok((self.evaluate_symbol(sym)?, false)),
            _ => return Ok((value.clone(), false)),
        };

        // the head first; its attributes drive everything below
        let head = self.evaluate(&node.head)?;
        let attrs = match head.as_symbol() {
            Some(sym) => self.defs.attributes(sym),
            None => Attributes::empty(),
        };
        let complete = attrs.holds_all_complete();

        // elements next, under the hold attributes. `Evaluate` overrides a
        // hold; `Unevaluated` elements wait for the stripping pass below.
        // The flag on each element records a stripped `Unevaluated` wrapper
        // owed back if no rewrite applies.
        let mut elements: Vec<(Value, bool)> = Vec::with_capacity(node.elements.len());
        for (index, element) in node.elements.iter().enumerate() {
            let eval = if attrs.holds_position(index) {
                !complete && element.has_form("Evaluate", 1, Some(1))
            } else {
                !element.has_form("Unevaluated", 1, Some(1))
            };
            let element = if eval {
                self.evaluate(element)?
            } else {
                element.clone()
            };
            elements.push((element, false));
        }

        if !complete && !attrs.contains(Attributes::SEQUENCE_HOLD) {
            if elements.iter().any(|(element, _)| element.head_is("Sequence")) {
                let mut spliced = Vec::with_capacity(elements.len());
                for (element, dirty) in elements {
                    if element.head_is("Sequence") {
                        spliced.extend(element.elements().iter().cloned().map(|e| (e, dirty)));
                    } else {
                        spliced.push((element, dirty));
                    }
                }
                elements = spliced;
            }
        }

        if !complete {
            for slot in elements.iter_mut() {
                if slot.0.has_form("Unevaluated", 1, Some(1)) {
                    let inner = slot.0.elements()[0].clone();
                    slot.0 = inner;
                    slot.1 = true;
                }
            }
        }

        if attrs.contains(Attributes::FLAT) {
            fn flatten(head: &Value, pairs: Vec<(Value, bool)>, out: &mut Vec<(Value, bool)>) {
                for (element, dirty) in pairs {
                    if element.as_expr().is_some_and(|e| e.head.same_q(head)) {
                        let children = element
                            .elements()
                            .iter()
                            .cloned()
                            .map(|e| (e, dirty))
                            .collect();
                        flatten(head, children, out);
                    } else {
                        out.push((element, dirty));
                    }
                }
            }
            let mut flattened = Vec::with_capacity(elements.len());
            flatten(&head, elements, &mut flattened);
            elements = flattened;
        }

        if attrs.contains(Attributes::ORDERLESS) {
            elements.sort_by(|a, b| canonical_cmp(&a.0, &b.0));
        }

        let rebuilt = Value::expr(
            head.clone(),
            elements.iter().map(|(element, _)| element.clone()).collect(),
        );

        if attrs.contains(Attributes::LISTABLE) {
            if let Some(threaded) = self.thread_listable(&rebuilt) {
                if threaded.same_q(&rebuilt) {
                    // unequal list lengths, already reported; the form is final
                    return Ok((restore_unevaluated(head, elements), false));
                }
                return Ok((threaded, true));
            }
        }

        match self.find_rewrite(&head, &rebuilt, attrs)? {
            Some(result) if !result.same_q(&rebuilt) => Ok((result, true)),
            // a rewrite to the same term means nothing further will change
            Some(_) | None => Ok((restore_unevaluated(head, elements), false)),
        }
    }

    /// Look for a rewrite of a canonicalized compound term: a registered
    /// native first, then the lookup symbol's down- or subvalues, then the
    /// upvalues of each element's lookup symbol.
    fn find_rewrite(
        &mut self,
        head: &Value,
        value: &Value,
        attrs: Attributes,
    ) -> EvalResult<Option<Value>> {
        if let Some(sym) = head.as_symbol() {
            if let Some(native) = self.natives.get(sym).copied() {
                if let Some(result) = native(self, value)? {
                    return Ok(Some(result));
                }
            }
        }

        if let Some(lookup) = value.lookup_symbol().cloned() {
            let rules = self.defs.lookup(&lookup).map(|record| {
                if head.as_symbol() == Some(&lookup) {
                    record.downvalues.clone()
                } else {
                    record.subvalues.clone()
                }
            });
            if let Some(rules) = rules {
                if let Some(result) = self.apply_rule_list(value, &rules)? {
                    return Ok(Some(result));
                }
            }
        }

        if !attrs.holds_all_complete() {
            let mut seen: Vec<Symbol> = Vec::new();
            for element in value.elements() {
                let Some(sym) = element.lookup_symbol() else {
                    continue;
                };
                if seen.iter().any(|s| s == sym) {
                    continue;
                }
                seen.push(sym.clone());
                let rules = match self.defs.lookup(sym) {
                    Some(record) if !record.upvalues.is_empty() => record.upvalues.clone(),
                    _ => continue,
                };
                if let Some(result) = self.apply_rule_list(value, &rules)? {
                    return Ok(Some(result));
                }
            }
        }

        Ok(None)
    }

    /// Thread a `Listable` head over its list elements, so `f[{a, b}, c]`
    /// becomes `{f[a, c], f[b, c]}`. `None` when no element is a list;
    /// the term itself when list lengths disagree, which ends evaluation.
    pub(crate) fn thread_listable(&mut self, value: &Value) -> Option<Value> {
        let elements = value.elements();
        let mut width: Option<usize> = None;
        for element in elements {
            if element.head_is("List") {
                let len = element.elements().len();
                match width {
                    Some(w) if w != len => {
                        self.message("Thread", "tdlen", &[value.clone()]);
                        return Some(value.clone());
                    }
                    _ => width = Some(len),
                }
            }
        }
        let width = width?;
        let head = value.head();
        let rows = (0..width)
            .map(|i| {
                let row = elements
                    .iter()
                    .map(|element| {
                        if element.head_is("List") {
                            element.elements()[i].clone()
                        } else {
                            element.clone()
                        }
                    })
                    .collect();
                Value::expr(head.clone(), row)
            })
            .collect();
        Some(Value::list(rows))
    }

    /// Try `rules` in order; the first match rewrites. Malformed patterns
    /// are reported and skipped, control signals raised inside tests and
    /// conditions propagate.
    pub(crate) fn apply_rule_list(
        &mut self,
        value: &Value,
        rules: &RuleList,
    ) -> EvalResult<Option<Value>> {
        self.apply_rule_slice(value, rules.rules())
    }

    pub(crate) fn apply_rule_slice(
        &mut self,
        value: &Value,
        rules: &[Rule],
    ) -> EvalResult<Option<Value>> {
        for rule in rules {
            match match_pattern(self, &rule.lhs, value) {
                Ok(Some(binds)) => return Ok(Some(substitute_bindings(&rule.rhs, &binds))),
                Ok(None) => {}
                Err(error) => {
                    if let Some(signal) = self.match_failure(error) {
                        return Err(signal);
                    }
                }
            }
        }
        Ok(None)
    }

    /// Whether `pattern` matches `value`, under the same failure handling
    /// as rule application.
    pub(crate) fn pattern_matches(&mut self, pattern: &Value, value: &Value) -> EvalResult<bool> {
        match match_pattern(self, pattern, value) {
            Ok(outcome) => Ok(outcome.is_some()),
            Err(error) => match self.match_failure(error) {
                Some(signal) => Err(signal),
                None => Ok(false),
            },
        }
    }

    /// Surface a matcher failure: malformed patterns become messages and
    /// count as no match, an interruption re-arms its parked signal.
    fn match_failure(&mut self, error: MatchError) -> Option<ControlSignal> {
        match error {
            MatchError::Interrupted => {
                Some(self.pending.take().unwrap_or(ControlSignal::Abort))
            }
            MatchError::BadPatternName(pattern) => {
                self.message("Pattern", "patvar", &[pattern]);
                None
            }
            MatchError::BadArity {
                head,
                got,
                expected,
            } => {
                let args = [
                    Value::sym(&head),
                    Value::int(got as i64),
                    Value::int(expected as i64),
                ];
                self.message(&head, "argrx", &args);
                None
            }
        }
    }

    fn stamp_normal_form(&self, value: &Value) {
        if let Value::Expr(node) = value {
            let mut symbols = HashSet::new();
            value.collect_symbols(&mut symbols);
            node.set_stamp(EvalStamp {
                generation: self.defs.generation(),
                symbols: symbols.into_iter().collect(),
            });
        }
    }
}

/// Re-wrap the elements whose `Unevaluated` wrapper was stripped for rule
/// lookup; owed only when no rewrite applied.
fn restore_unevaluated(head: Value, elements: Vec<(Value, bool)>) -> Value {
    let wrapped = elements
        .into_iter()
        .map(|(element, dirty)| {
            if dirty {
                Value::call("Unevaluated", vec![element])
            } else {
                element
            }
        })
        .collect();
    Value::expr(head, wrapped)
}

pub(crate) fn is_true(value: &Value) -> bool {
    matches!(value.as_symbol(), Some(sym) if sym.name() == "System`True")
}

impl MatchHooks for Evaluator {
    fn attributes(&self, sym: &Symbol) -> Attributes {
        self.defs.attributes(sym)
    }

    fn default_value(&self, head: &Symbol, position: usize) -> Option<Value> {
        self.defs.default_value(head, position).cloned()
    }

    fn eval_test(&mut self, test: &Value, candidate: &Value) -> Result<bool, MatchError> {
        let call = Value::expr(test.clone(), vec![candidate.clone()]);
        match self.evaluate(&call) {
            Ok(result) => Ok(is_true(&result)),
            Err(signal) => {
                self.pending = Some(signal);
                Err(MatchError::Interrupted)
            }
        }
    }

    fn eval_condition(
        &mut self,
        condition: &Value,
        bindings: &Bindings,
    ) -> Result<bool, MatchError> {
        let substituted = substitute_bindings(condition, bindings);
        match self.evaluate(&substituted) {
            Ok(result) => Ok(is_true(&result)),
            Err(signal) => {
                self.pending = Some(signal);
                Err(MatchError::Interrupted)
            }
        }
    }
}
