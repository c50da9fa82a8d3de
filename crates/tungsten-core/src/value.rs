use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::number;
use crate::symbol::{ensure_context, Symbol};

/// A term of the language. Atoms and compound expressions form a single
/// homogeneous tree; compound nodes are shared through `Arc`, so cloning a
/// term never copies its spine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    /// Normalized: `den > 1`, sign on the numerator, fully reduced.
    Rational { num: i64, den: i64 },
    /// `prec` is a decimal digit count, `None` meaning machine precision.
    Real { value: f64, prec: Option<u32> },
    /// Components are real-valued numeric atoms. An exact zero imaginary
    /// part never survives construction.
    Complex { re: Box<Value>, im: Box<Value> },
    String(String),
    Symbol(Symbol),
    Expr(Arc<ExprNode>),
}

/// A compound term `head[e1, ..., en]`. The node also carries a
/// normal-form stamp maintained by the evaluator; the stamp takes no part
/// in equality and is dropped on serialization.
#[derive(Serialize, Deserialize)]
pub struct ExprNode {
    pub head: Value,
    pub elements: Vec<Value>,
    #[serde(skip)]
    stamp: Mutex<Option<EvalStamp>>,
}

/// Records that the owning term was found to be in normal form while the
/// definition store was at `generation`, depending only on `symbols`.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalStamp {
    pub generation: u64,
    pub symbols: Arc<[Symbol]>,
}

impl ExprNode {
    pub fn new(head: Value, elements: Vec<Value>) -> Self {
        ExprNode {
            head,
            elements,
            stamp: Mutex::new(None),
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn stamp(&self) -> Option<EvalStamp> {
        self.stamp.lock().clone()
    }

    pub fn set_stamp(&self, stamp: EvalStamp) {
        *self.stamp.lock() = Some(stamp);
    }
}

impl fmt::Debug for ExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExprNode")
            .field("head", &self.head)
            .field("elements", &self.elements)
            .finish()
    }
}

impl PartialEq for ExprNode {
    fn eq(&self, other: &Self) -> bool {
        self.head == other.head && self.elements == other.elements
    }
}

impl Value {
    pub fn int(n: i64) -> Value {
        Value::Integer(n)
    }

    pub fn real(value: f64) -> Value {
        Value::Real { value, prec: None }
    }

    pub fn real_prec(value: f64, digits: u32) -> Value {
        Value::Real {
            value,
            prec: Some(digits),
        }
    }

    /// Normalized rational constructor; `den` must be nonzero.
    pub fn rational(num: i64, den: i64) -> Value {
        debug_assert!(den != 0);
        number::make_rational(num, den).unwrap_or(Value::Integer(0))
    }

    pub fn complex(re: Value, im: Value) -> Value {
        number::make_complex(re, im)
    }

    pub fn str(s: impl Into<String>) -> Value {
        Value::String(s.into())
    }

    pub fn sym(name: &str) -> Value {
        Value::Symbol(Symbol::new(name))
    }

    pub fn expr(head: Value, elements: Vec<Value>) -> Value {
        Value::Expr(Arc::new(ExprNode::new(head, elements)))
    }

    /// Compound term with a symbol head, resolving the context of `head`.
    pub fn call(head: &str, elements: Vec<Value>) -> Value {
        Value::expr(Value::sym(head), elements)
    }

    pub fn list(elements: Vec<Value>) -> Value {
        Value::call("List", elements)
    }

    pub fn is_atom(&self) -> bool {
        !matches!(self, Value::Expr(_))
    }

    pub fn is_number(&self) -> bool {
        number::is_numeric_atom(self)
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_expr(&self) -> Option<&ExprNode> {
        match self {
            Value::Expr(e) => Some(e),
            _ => None,
        }
    }

    pub fn elements(&self) -> &[Value] {
        match self {
            Value::Expr(e) => &e.elements,
            _ => &[],
        }
    }

    /// The head of a term. For atoms this is the builtin type symbol, e.g.
    /// `Integer` or `Symbol`.
    pub fn head(&self) -> Value {
        let name = match self {
            Value::Integer(_) => "Integer",
            Value::Rational { .. } => "Rational",
            Value::Real { .. } => "Real",
            Value::Complex { .. } => "Complex",
            Value::String(_) => "String",
            Value::Symbol(_) => "Symbol",
            Value::Expr(e) => return e.head.clone(),
        };
        Value::Symbol(Symbol::system(name))
    }

    /// The immediate head symbol of a compound term, if it has one.
    pub fn head_symbol(&self) -> Option<&Symbol> {
        self.as_expr().and_then(|e| e.head.as_symbol())
    }

    /// The symbol a definition lookup for this term goes through: the term
    /// itself when it is a symbol, otherwise the innermost head symbol of a
    /// curried chain like `f[a][b]`.
    pub fn lookup_symbol(&self) -> Option<&Symbol> {
        let mut current = self;
        loop {
            match current {
                Value::Symbol(s) => return Some(s),
                Value::Expr(e) => current = &e.head,
                _ => return None,
            }
        }
    }

    /// Whether the term is compound with the given symbol head. `name` may
    /// be fully qualified or a short builtin name.
    pub fn head_is(&self, name: &str) -> bool {
        match self.head_symbol() {
            Some(s) => s.name() == name || (!name.contains('`') && s.name() == ensure_context(name)),
            None => false,
        }
    }

    /// Shape test: symbol head `name` with an element count between `min`
    /// and `max` (`None` for no upper bound).
    pub fn has_form(&self, name: &str, min: usize, max: Option<usize>) -> bool {
        if !self.head_is(name) {
            return false;
        }
        let n = self.elements().len();
        n >= min && max.map_or(true, |m| n <= m)
    }

    pub fn has_any_form(&self, names: &[&str], min: usize, max: Option<usize>) -> bool {
        names.iter().any(|name| self.has_form(name, min, max))
    }

    /// Structural identity, the `SameQ` relation. Reals compare tolerantly
    /// in their last binary digits; terms of different kinds are never the
    /// same, so `1` and `1.0` are distinct.
    pub fn same_q(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Expr(a), Value::Expr(b)) => {
                if Arc::ptr_eq(a, b) {
                    return true;
                }
                a.elements.len() == b.elements.len()
                    && a.head.same_q(&b.head)
                    && a.elements.iter().zip(&b.elements).all(|(x, y)| x.same_q(y))
            }
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (
                Value::Rational { num: an, den: ad },
                Value::Rational { num: bn, den: bd },
            ) => an == bn && ad == bd,
            (Value::Real { value: a, .. }, Value::Real { value: b, .. }) => number::almost_equal(
                *a,
                number::precision_bits(self),
                *b,
                number::precision_bits(other),
            ),
            (
                Value::Complex { re: ar, im: ai },
                Value::Complex { re: br, im: bi },
            ) => ar.same_q(br) && ai.same_q(bi),
            (Value::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }

    /// Best-effort reduction to a machine float; `None` when the term is
    /// not a real-valued number.
    pub fn round_to_float(&self) -> Option<f64> {
        number::to_f64(self)
    }

    /// Collect every symbol mentioned anywhere in the term, heads included.
    pub fn collect_symbols(&self, out: &mut HashSet<Symbol>) {
        match self {
            Value::Symbol(s) => {
                out.insert(s.clone());
            }
            Value::Expr(e) => {
                e.head.collect_symbols(out);
                for element in &e.elements {
                    element.collect_symbols(out);
                }
            }
            Value::Complex { re, im } => {
                re.collect_symbols(out);
                im.collect_symbols(out);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn heads_of_atoms() {
        assert_eq!(Value::int(3).head(), Value::sym("Integer"));
        assert_eq!(Value::rational(1, 2).head(), Value::sym("Rational"));
        assert_eq!(Value::real(1.5).head(), Value::sym("Real"));
        assert_eq!(Value::str("hi").head(), Value::sym("String"));
        assert_eq!(Value::sym("x").head(), Value::sym("Symbol"));
        let f = Value::call("f", vec![Value::int(1)]);
        assert_eq!(f.head(), Value::sym("f"));
    }

    #[test]
    fn lookup_symbol_follows_curried_heads() {
        let fab = Value::expr(
            Value::call("f", vec![Value::sym("a")]),
            vec![Value::sym("b")],
        );
        assert_eq!(fab.lookup_symbol(), Some(&Symbol::new("f")));
        assert_eq!(Value::sym("x").lookup_symbol(), Some(&Symbol::new("x")));
        assert_eq!(Value::int(1).lookup_symbol(), None);
    }

    #[test]
    fn has_form_checks_head_and_arity() {
        let p = Value::call("Power", vec![Value::sym("x"), Value::int(2)]);
        assert!(p.has_form("Power", 2, Some(2)));
        assert!(p.has_form("System`Power", 1, None));
        assert!(!p.has_form("Power", 3, None));
        assert!(!p.has_form("Times", 2, Some(2)));
        assert!(!Value::int(1).has_form("Integer", 0, None));
    }

    #[test]
    fn same_q_is_structural() {
        let a = Value::call("f", vec![Value::int(1), Value::sym("x")]);
        let b = Value::call("f", vec![Value::int(1), Value::sym("x")]);
        assert!(a.same_q(&b));
        assert!(!a.same_q(&Value::call("f", vec![Value::int(1)])));
        assert!(!Value::int(1).same_q(&Value::real(1.0)));
    }

    #[test]
    fn same_q_reals_are_tolerant_in_the_last_digits() {
        assert!(Value::real(1.0).same_q(&Value::real(1.0 + 1e-15)));
        assert!(!Value::real(1.0).same_q(&Value::real(1.001)));
        assert!(!Value::real_prec(1.0, 30).same_q(&Value::real_prec(1.0 + 1e-16, 30)));
    }

    #[test]
    fn clones_share_structure() {
        let a = Value::call("f", vec![Value::int(1); 3]);
        let b = a.clone();
        match (&a, &b) {
            (Value::Expr(x), Value::Expr(y)) => assert!(Arc::ptr_eq(x, y)),
            _ => panic!("expected compound terms"),
        }
        assert!(a.same_q(&b));
    }

    #[test]
    fn complex_construction_collapses_exact_zero() {
        assert_eq!(
            Value::complex(Value::int(3), Value::int(0)),
            Value::int(3)
        );
        let c = Value::complex(Value::int(3), Value::int(2));
        assert!(matches!(c, Value::Complex { .. }));
        assert_eq!(c.head(), Value::sym("Complex"));
    }

    #[test]
    fn collect_symbols_sees_heads_and_leaves() {
        let v = Value::expr(
            Value::call("f", vec![Value::sym("a")]),
            vec![Value::sym("b"), Value::call("g", vec![Value::int(1)])],
        );
        let mut out = HashSet::new();
        v.collect_symbols(&mut out);
        let mut names: Vec<&str> = out.iter().map(Symbol::name).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["Global`a", "Global`b", "Global`f", "Global`g"]);
    }

    #[test]
    fn serde_round_trip() {
        let v = Value::call(
            "Plus",
            vec![Value::int(1), Value::rational(1, 2), Value::sym("x")],
        );
        let json = serde_json::to_string(&v).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
        assert!(back.same_q(&v));
    }

    #[test]
    fn stamps_do_not_affect_equality() {
        let a = Value::call("f", vec![Value::int(1)]);
        let b = Value::call("f", vec![Value::int(1)]);
        if let Value::Expr(node) = &a {
            node.set_stamp(EvalStamp {
                generation: 7,
                symbols: Arc::from(vec![Symbol::new("f")]),
            });
        }
        assert_eq!(a, b);
        assert!(a.same_q(&b));
    }
}
