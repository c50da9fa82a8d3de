//! The evaluation layer: the fixpoint [`Evaluator`] with its builtin
//! operators, non-local control signals, the message side channel and the
//! pluggable numeric boundary.

pub mod builtins;
pub mod control;
pub mod eval;
pub mod messages;
pub mod numeric;

pub use control::{ControlSignal, EvalResult};
pub use eval::{Evaluator, NativeFn};
pub use messages::Message;
pub use numeric::{ExactAdapter, ExternalValue, NumericAdapter};
