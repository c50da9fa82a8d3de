//! Builtin symbol registry.
//!
//! Everything the evaluator knows out of the box is installed from here:
//! attribute sets, message templates, default element values, the two
//! evaluation limits, and the native handlers that implement arithmetic,
//! assignment, control flow, and structural operations.

mod arith;
mod assign;
mod flow;
mod structure;

use tungsten_core::{Symbol, Value};
use tungsten_rewrite::{Attributes, Definitions, Rule};

use crate::eval::{Evaluator, NativeFn};

/// Seed a fresh environment with the standard builtin records.
pub fn install(ev: &mut Evaluator) {
    let defs = ev.definitions_mut();
    // Messages, limits, and defaults go in first: the setters respect
    // protection, and `install_attributes` is what raises the bits.
    install_messages(defs);
    install_limits(defs);
    install_defaults(defs);
    install_attributes(defs);
}

/// Hook the native handlers up to their symbols.
pub fn register_natives(ev: &mut Evaluator) {
    let table: &[(&str, NativeFn)] = &[
        ("Abort", flow::abort),
        ("AtomQ", structure::atom_q),
        ("Attributes", assign::attributes),
        ("Break", flow::break_loop),
        ("Catch", flow::catch),
        ("CheckAbort", flow::check_abort),
        ("Clear", assign::clear),
        ("ClearAll", assign::clear_all),
        ("ClearAttributes", assign::clear_attributes),
        ("CompoundExpression", flow::compound_expression),
        ("Continue", flow::continue_loop),
        ("Default", assign::default_read),
        ("Divide", arith::divide),
        ("Do", flow::do_loop),
        ("DownValues", assign::down_values),
        ("Equal", arith::equal),
        ("Evaluate", flow::evaluate_wrapper),
        ("For", flow::for_loop),
        ("Greater", arith::greater),
        ("GreaterEqual", arith::greater_equal),
        ("Head", structure::head),
        ("If", flow::if_branch),
        ("Length", structure::length),
        ("Less", arith::less),
        ("LessEqual", arith::less_equal),
        ("MessageName", assign::message_name),
        ("Minus", arith::minus),
        ("Options", assign::options),
        ("Order", structure::order),
        ("OrderedQ", structure::ordered_q),
        ("OwnValues", assign::own_values),
        ("Plus", arith::plus),
        ("Power", arith::power),
        ("Protect", assign::protect),
        ("Remove", assign::remove),
        ("ReplaceAll", structure::replace_all),
        ("ReplaceRepeated", structure::replace_repeated),
        ("Return", flow::control_return),
        ("SameQ", arith::same_q),
        ("Set", assign::set),
        ("SetAttributes", assign::set_attributes),
        ("SetDelayed", assign::set_delayed),
        ("Sort", structure::sort),
        ("Sqrt", arith::sqrt),
        ("SubValues", assign::sub_values),
        ("Subtract", arith::subtract),
        ("TagSet", assign::tag_set),
        ("TagSetDelayed", assign::tag_set_delayed),
        ("Thread", structure::thread),
        ("Throw", flow::throw),
        ("Times", arith::times),
        ("Unequal", arith::unequal),
        ("UnsameQ", arith::unsame_q),
        ("Unprotect", assign::unprotect),
        ("Unset", assign::unset),
        ("UpSet", assign::up_set),
        ("UpSetDelayed", assign::up_set_delayed),
        ("UpValues", assign::up_values),
        ("While", flow::while_loop),
    ];
    for (name, native) in table {
        ev.register(name, *native);
    }
}

fn install_messages(defs: &mut Definitions) {
    let table: &[(&str, &str, &str)] = &[
        (
            "General",
            "argrx",
            "`1` called with `2` arguments; `3` arguments are expected.",
        ),
        ("General", "attnf", "`1` is not a known attribute."),
        ("General", "indet", "Indeterminate expression `1` encountered."),
        ("General", "infy", "Infinite expression `1` encountered."),
        ("General", "iterb", "Iterator does not have appropriate bounds."),
        ("General", "locked", "Symbol `1` is locked."),
        (
            "General",
            "normal",
            "Nonatomic expression expected at position `1` in `2`.",
        ),
        ("General", "ovfl", "Overflow occurred in computation."),
        (
            "General",
            "reps",
            "`1` is neither a list of replacement rules nor a valid dispatch table, and so cannot be used for replacing.",
        ),
        ("General", "setraw", "Cannot assign to raw object `1`."),
        ("General", "ssym", "`1` is not a symbol or a string."),
        (
            "General",
            "sym",
            "Argument `1` at position `2` is expected to be a symbol.",
        ),
        (
            "General",
            "tagnfd",
            "Tag `1` not found or too deep for an assigned rule.",
        ),
        ("General", "wrsym", "Symbol `1` is Protected."),
        ("$IterationLimit", "itlim", "Iteration limit of `1` exceeded."),
        ("$RecursionLimit", "reclim", "Recursion depth of `1` exceeded."),
        (
            "Break",
            "nofdw",
            "No enclosing For, While, or Do found for Break[].",
        ),
        (
            "Continue",
            "nofdw",
            "No enclosing For, While, or Do found for Continue[].",
        ),
        (
            "Pattern",
            "patvar",
            "First element in pattern `1` is not a valid pattern name.",
        ),
        (
            "Thread",
            "tdlen",
            "Objects of unequal length in `1` cannot be combined.",
        ),
        ("Throw", "nocatch", "Uncaught `1` returned to top level."),
        ("Unset", "norep", "Assignment on `2` for `1` not found."),
    ];
    for (name, tag, text) in table {
        let _ = defs.set_message(&Symbol::system(name), tag, text);
    }
}

fn install_limits(defs: &mut Definitions) {
    let table: &[(&str, i64)] = &[
        ("$RecursionLimit", crate::eval::DEFAULT_RECURSION_LIMIT as i64),
        ("$IterationLimit", crate::eval::DEFAULT_ITERATION_LIMIT as i64),
    ];
    for (name, limit) in table {
        let sym = Symbol::system(name);
        let rule = Rule::immediate(Value::Symbol(sym.clone()), Value::int(*limit));
        let _ = defs.add_rule(tungsten_rewrite::DefKind::Own, &sym, rule);
    }
}

fn install_defaults(defs: &mut Definitions) {
    let _ = defs.set_default(&Symbol::system("Plus"), None, Value::int(0));
    let _ = defs.set_default(&Symbol::system("Times"), None, Value::int(1));
    let _ = defs.set_default(&Symbol::system("Power"), Some(2), Value::int(1));
}

fn install_attributes(defs: &mut Definitions) {
    use Attributes as A;
    let p = A::PROTECTED;
    let table: &[(&str, Attributes)] = &[
        ("$Aborted", p),
        ("$Failed", p),
        ("$IterationLimit", A::empty()),
        ("$RecursionLimit", A::empty()),
        ("Abort", p),
        ("Alternatives", p),
        ("AtomQ", p),
        ("Attributes", A::HOLD_ALL.union(A::LISTABLE).union(p)),
        ("Blank", p),
        ("BlankNullSequence", p),
        ("BlankSequence", p),
        ("Break", p),
        ("Catch", A::HOLD_ALL.union(p)),
        ("CheckAbort", A::HOLD_ALL.union(p)),
        ("Clear", A::HOLD_ALL.union(p)),
        ("ClearAll", A::HOLD_ALL.union(p)),
        ("ClearAttributes", A::HOLD_FIRST.union(p)),
        ("Complex", p),
        ("ComplexInfinity", p),
        (
            "CompoundExpression",
            A::HOLD_ALL.union(A::READ_PROTECTED).union(p),
        ),
        ("Condition", A::HOLD_ALL.union(p)),
        ("Constant", p),
        ("Continue", p),
        ("Default", p),
        ("Divide", A::LISTABLE.union(A::NUMERIC_FUNCTION).union(p)),
        ("Do", A::HOLD_ALL.union(p)),
        ("DownValues", A::HOLD_ALL.union(p)),
        ("Equal", p),
        ("Evaluate", p),
        ("Except", p),
        ("False", A::LOCKED.union(p)),
        ("Flat", p),
        ("For", A::HOLD_REST.union(p)),
        ("Format", p),
        ("General", p),
        ("Greater", p),
        ("GreaterEqual", p),
        ("Head", p),
        ("Hold", A::HOLD_ALL.union(p)),
        ("HoldAll", p),
        ("HoldAllComplete", p),
        ("HoldComplete", A::HOLD_ALL_COMPLETE.union(p)),
        ("HoldFirst", p),
        ("HoldForm", A::HOLD_ALL.union(p)),
        ("HoldPattern", A::HOLD_ALL.union(p)),
        ("HoldRest", p),
        ("If", A::HOLD_REST.union(p)),
        ("Indeterminate", p),
        ("Infinity", A::CONSTANT.union(A::READ_PROTECTED).union(p)),
        ("Integer", p),
        ("Length", p),
        ("Less", p),
        ("LessEqual", p),
        ("List", A::LOCKED.union(p)),
        ("Listable", p),
        ("Locked", p),
        ("MessageName", A::HOLD_FIRST.union(p)),
        ("Minus", A::LISTABLE.union(A::NUMERIC_FUNCTION).union(p)),
        ("NHoldAll", p),
        ("NHoldFirst", p),
        ("NHoldRest", p),
        ("Null", p),
        ("NumericFunction", p),
        ("OneIdentity", p),
        ("Optional", p),
        ("Options", p),
        ("Order", p),
        ("OrderedQ", p),
        ("Orderless", p),
        ("Overflow", p),
        ("OwnValues", A::HOLD_ALL.union(p)),
        ("Pattern", A::HOLD_FIRST.union(p)),
        ("PatternTest", A::HOLD_REST.union(p)),
        (
            "Plus",
            A::FLAT
                .union(A::LISTABLE)
                .union(A::NUMERIC_FUNCTION)
                .union(A::ONE_IDENTITY)
                .union(A::ORDERLESS)
                .union(p),
        ),
        (
            "Power",
            A::LISTABLE
                .union(A::NUMERIC_FUNCTION)
                .union(A::ONE_IDENTITY)
                .union(p),
        ),
        ("Protect", A::HOLD_ALL.union(p)),
        ("Protected", p),
        ("Rational", p),
        ("ReadProtected", p),
        ("Real", p),
        ("Remove", A::HOLD_ALL.union(p)),
        ("Repeated", p),
        ("RepeatedNull", p),
        ("ReplaceAll", p),
        ("ReplaceRepeated", p),
        ("Return", p),
        ("Rule", A::SEQUENCE_HOLD.union(p)),
        ("RuleDelayed", A::HOLD_REST.union(A::SEQUENCE_HOLD).union(p)),
        ("SameQ", p),
        ("Sequence", p),
        ("SequenceHold", p),
        ("Set", A::HOLD_FIRST.union(A::SEQUENCE_HOLD).union(p)),
        ("SetAttributes", A::HOLD_FIRST.union(p)),
        ("SetDelayed", A::HOLD_ALL.union(A::SEQUENCE_HOLD).union(p)),
        ("Sort", p),
        ("Sqrt", A::LISTABLE.union(A::NUMERIC_FUNCTION).union(p)),
        ("String", p),
        ("SubValues", A::HOLD_ALL.union(p)),
        ("Subtract", A::LISTABLE.union(A::NUMERIC_FUNCTION).union(p)),
        ("Symbol", p),
        ("TagSet", A::HOLD_ALL.union(A::SEQUENCE_HOLD).union(p)),
        ("TagSetDelayed", A::HOLD_ALL.union(A::SEQUENCE_HOLD).union(p)),
        ("Thread", p),
        ("Throw", p),
        (
            "Times",
            A::FLAT
                .union(A::LISTABLE)
                .union(A::NUMERIC_FUNCTION)
                .union(A::ONE_IDENTITY)
                .union(A::ORDERLESS)
                .union(p),
        ),
        ("True", A::LOCKED.union(p)),
        ("Unequal", p),
        ("Unevaluated", A::HOLD_ALL_COMPLETE.union(p)),
        ("Unprotect", A::HOLD_ALL.union(p)),
        ("UnsameQ", p),
        ("Unset", A::HOLD_FIRST.union(p)),
        ("UpSet", A::HOLD_FIRST.union(A::SEQUENCE_HOLD).union(p)),
        ("UpSetDelayed", A::HOLD_ALL.union(A::SEQUENCE_HOLD).union(p)),
        ("UpValues", A::HOLD_ALL.union(p)),
        ("Verbatim", p),
        ("While", A::HOLD_ALL.union(p)),
    ];
    for (name, attrs) in table {
        defs.install_builtin(&Symbol::system(name), *attrs);
    }
}

pub(crate) fn is_false(value: &Value) -> bool {
    matches!(value, Value::Symbol(sym) if sym.name() == "System`False")
}

pub(crate) fn bool_value(truth: bool) -> Value {
    Value::sym(if truth { "True" } else { "False" })
}
