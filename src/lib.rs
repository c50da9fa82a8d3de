//! Tungsten: a Wolfram-style symbolic term rewriting engine.
//!
//! The facade re-exports the three layers of the workspace so embedders can
//! depend on one crate: [`tungsten_core`] for the term model,
//! [`tungsten_rewrite`] for rule storage and pattern matching, and
//! [`tungsten_runtime`] for the fixpoint evaluator and its builtins.
//!
//! A session is an [`Evaluator`] holding its own [`Definitions`] store:
//! build terms with the [`Value`] constructors, feed them to
//! [`Evaluator::evaluate_top`], and drain diagnostics from the message
//! buffer.

pub use tungsten_core::{format_value, EvalStamp, ExprNode, NumericError, Symbol, Value};
pub use tungsten_rewrite::{
    match_pattern, substitute_bindings, Attributes, Bindings, DefKind, Definition, Definitions,
    DefsError, Delayed, MatchError, MatchHooks, Rule, RuleList, StructuralHooks,
};
pub use tungsten_runtime::{
    ControlSignal, EvalResult, Evaluator, ExactAdapter, ExternalValue, Message, NativeFn,
    NumericAdapter,
};
