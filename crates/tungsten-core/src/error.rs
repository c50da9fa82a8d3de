use thiserror::Error;

/// Failure modes of exact arithmetic over the numeric atoms.
///
/// `Unsupported` is not a fault: it marks operand combinations the exact
/// layer declines to reduce (for example a symbolic power), which the
/// caller leaves unevaluated.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericError {
    #[error("overflow in exact arithmetic")]
    Overflow,
    #[error("division by zero")]
    DivisionByZero,
    #[error("operation not defined for these operands")]
    Unsupported,
}
