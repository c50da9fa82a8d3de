//! Non-local control flow.
//!
//! `Return`, `Break`, `Continue`, `Throw` and `Abort` do not produce values
//! in place; they unwind to whoever is prepared to handle them. The
//! evaluator threads them as the error arm of every result, so no signal
//! can be dropped silently: anything unhandled surfaces at the top level.

use tungsten_core::Value;

/// A control signal in flight. Carried as the `Err` arm of [`EvalResult`]
/// until a handler consumes it.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlSignal {
    /// `Abort[]`, a recursion/iteration guard, or external cancellation.
    /// Unwinds to the top level, which answers `$Aborted`.
    Abort,
    /// `Return[v]`, absorbed by the innermost user-defined function call.
    Return(Value),
    /// `Break[]`, consumed by the innermost loop.
    Break,
    /// `Continue[]`, consumed by the innermost loop iteration.
    Continue,
    /// `Throw[v]` or `Throw[v, tag]`, consumed by a matching `Catch`.
    Throw { value: Value, tag: Option<Value> },
}

pub type EvalResult<T> = Result<T, ControlSignal>;
