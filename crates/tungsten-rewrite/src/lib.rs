//! Rule storage and pattern matching.
//!
//! This crate owns the two halves of the rewriting machinery that sit
//! between the term model and the evaluator: the symbol-indexed
//! [`Definitions`] store, which keeps attributes and rewrite rules in
//! specificity order, and the backtracking pattern [`matcher`], which binds
//! pattern names to (sequences of) values under the attributes of the
//! function being matched.

pub mod attrs;
pub mod defs;
pub mod matcher;
pub mod rule;
pub mod specificity;

pub use attrs::Attributes;
pub use defs::{DefKind, Definition, Definitions, DefsError};
pub use matcher::{
    match_pattern, substitute_bindings, Bindings, MatchError, MatchHooks, StructuralHooks,
};
pub use rule::{Delayed, Rule, RuleList};
pub use specificity::pattern_cmp;
