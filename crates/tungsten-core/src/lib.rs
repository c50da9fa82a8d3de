//! Core term model for the tungsten engine: atoms, compound expressions,
//! symbol interning and the canonical term order shared by every layer above.

pub mod error;
pub mod number;
pub mod order;
pub mod pretty;
pub mod symbol;
pub mod value;

pub use error::NumericError;
pub use pretty::format_value;
pub use symbol::Symbol;
pub use value::{EvalStamp, ExprNode, Value};
