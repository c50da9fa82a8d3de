//! Canonical term order.
//!
//! Terms sort by class first: numbers, then strings, then numeric compound
//! terms, then symbols and everything else. Products and powers over named
//! variables compare through their exponent monomials, which is what puts
//! `x`, `x^2`, `x^2 y`, `x y^3` in the familiar polynomial order.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::value::Value;
use crate::{number, symbol::Symbol};

/// Heads whose compound terms count as numeric when every element is
/// numeric, independent of any definition store.
const ARITHMETIC_HEADS: &[&str] = &[
    "System`Divide",
    "System`Minus",
    "System`Plus",
    "System`Power",
    "System`Sqrt",
    "System`Subtract",
    "System`Times",
];

fn is_numeric_term(v: &Value) -> bool {
    match v {
        Value::Integer(_) | Value::Rational { .. } | Value::Real { .. } | Value::Complex { .. } => {
            true
        }
        Value::Expr(e) => {
            matches!(e.head.as_symbol(), Some(s) if ARITHMETIC_HEADS.binary_search(&s.name()).is_ok())
                && e.elements.iter().all(is_numeric_term)
        }
        _ => false,
    }
}

type Monomial = BTreeMap<String, f64>;

/// Exponent map of a product or power over named variables. Symbols always
/// have one; compound terms only when at least one named factor appears.
fn monomial_of(v: &Value) -> Option<Monomial> {
    match v {
        Value::Symbol(s) => {
            let mut m = Monomial::new();
            m.insert(s.name().to_string(), 1.0);
            Some(m)
        }
        Value::Expr(e) => {
            let mut m = Monomial::new();
            if e.head.as_symbol().map(Symbol::name) == Some("System`Times") {
                for element in &e.elements {
                    if let Some(s) = element.as_symbol() {
                        *m.entry(s.name().to_string()).or_insert(0.0) += 1.0;
                    } else if element.has_form("Power", 2, Some(2)) {
                        let parts = element.elements();
                        if let (Some(var), Some(exp)) =
                            (parts[0].as_symbol(), parts[1].round_to_float())
                        {
                            *m.entry(var.name().to_string()).or_insert(0.0) += exp;
                        }
                    }
                }
            } else if v.has_form("Power", 2, Some(2)) {
                let parts = v.elements();
                if let (Some(var), Some(exp)) = (parts[0].as_symbol(), parts[1].round_to_float()) {
                    *m.entry(var.name().to_string()).or_insert(0.0) += exp;
                }
            }
            if m.is_empty() {
                None
            } else {
                Some(m)
            }
        }
        _ => None,
    }
}

fn monomial_cmp(a: &Monomial, b: &Monomial) -> Ordering {
    let mut sa = a.clone();
    let mut sb = b.clone();
    // cancel variables common to both sides
    for var in a.keys() {
        if b.contains_key(var) {
            let dec = sa[var].min(sb[var]);
            for side in [&mut sa, &mut sb] {
                let remaining = side[var] - dec;
                if remaining == 0.0 {
                    side.remove(var);
                } else {
                    side.insert(var.clone(), remaining);
                }
            }
        }
    }
    let sa: Vec<(&String, &f64)> = sa.iter().collect();
    let sb: Vec<(&String, &f64)> = sb.iter().collect();
    let mut index = 0;
    loop {
        match (index >= sa.len(), index >= sb.len()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }
        let (avar, aexp) = sa[index];
        let (bvar, bexp) = sb[index];
        match avar.cmp(bvar) {
            Ordering::Equal => {}
            other => return other,
        }
        if aexp != bexp {
            // at the trailing variable the smaller power is the simpler
            // term; in the interior the larger leading power sorts first
            return if index + 1 == sa.len() || index + 1 == sb.len() {
                aexp.total_cmp(bexp)
            } else {
                bexp.total_cmp(aexp)
            };
        }
        index += 1;
    }
}

/// Class rank: numbers (0,0), strings (0,1), then compound/symbolic terms
/// with numeric ones first and monomial-bearing ones before the rest.
fn rank(v: &Value) -> (u8, u8) {
    match v {
        Value::Integer(_) | Value::Rational { .. } | Value::Real { .. } | Value::Complex { .. } => {
            (0, 0)
        }
        Value::String(_) => (0, 1),
        Value::Symbol(_) => (2, 2),
        Value::Expr(_) => {
            let numeric = if is_numeric_term(v) { 1 } else { 2 };
            if monomial_of(v).is_some() {
                (numeric, 2)
            } else {
                (numeric, 3)
            }
        }
    }
}

static ZERO: Value = Value::Integer(0);

fn number_pair(v: &Value) -> (&Value, &Value) {
    match v {
        Value::Complex { re, im } => (re, im),
        _ => (v, &ZERO),
    }
}

fn number_cmp(a: &Value, b: &Value) -> Ordering {
    let (ar, ai) = number_pair(a);
    let (br, bi) = number_pair(b);
    number::num_cmp(ar, br)
        .unwrap_or(Ordering::Equal)
        .then_with(|| number::num_cmp(ai, bi).unwrap_or(Ordering::Equal))
}

fn elements_cmp(a: &[Value], b: &[Value]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match canonical_cmp(x, y) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

/// Total order on terms used for `Orderless` canonicalization, `Sort`,
/// `Order` and `OrderedQ`.
pub fn canonical_cmp(a: &Value, b: &Value) -> Ordering {
    let ra = rank(a);
    let rb = rank(b);
    match ra.cmp(&rb) {
        Ordering::Equal => {}
        other => return other,
    }
    match ra {
        (0, 0) => number_cmp(a, b),
        (0, 1) => match (a, b) {
            (Value::String(x), Value::String(y)) => x.cmp(y),
            _ => Ordering::Equal,
        },
        (_, 2) => {
            // symbols and monomial-bearing products, compared monomial
            // first with plain symbols ahead of equivalent products
            let ma = monomial_of(a).unwrap_or_default();
            let mb = monomial_of(b).unwrap_or_default();
            monomial_cmp(&ma, &mb)
                .then_with(|| {
                    let depth = |v: &Value| u8::from(!v.is_atom());
                    depth(a).cmp(&depth(b))
                })
                .then_with(|| match (a, b) {
                    (Value::Symbol(x), Value::Symbol(y)) => x.cmp(y),
                    (Value::Expr(x), Value::Expr(y)) => canonical_cmp(&x.head, &y.head)
                        .then_with(|| elements_cmp(&x.elements, &y.elements)),
                    _ => Ordering::Equal,
                })
        }
        _ => match (a, b) {
            (Value::Expr(x), Value::Expr(y)) => canonical_cmp(&x.head, &y.head)
                .then_with(|| x.elements.len().cmp(&y.elements.len()))
                .then_with(|| elements_cmp(&x.elements, &y.elements)),
            _ => Ordering::Equal,
        },
    }
}

/// Stable in-place sort by the canonical order.
pub fn sort_elements(elements: &mut [Value]) {
    elements.sort_by(canonical_cmp);
}
