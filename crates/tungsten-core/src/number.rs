//! Exact and machine arithmetic over the numeric atoms.
//!
//! Integers and rationals are computed exactly with `i64` components and
//! `i128` intermediates; anything that leaves that range reports
//! [`NumericError::Overflow`] instead of silently wrapping. Reals carry an
//! optional decimal precision, `None` meaning machine precision.

use std::cmp::Ordering;

use crate::error::NumericError;
use crate::value::Value;

pub const MACHINE_PRECISION_BITS: u32 = 53;
pub const MACHINE_PRECISION_DIGITS: u32 = 15;

const LOG2_10: f64 = 3.321928094887362;

/// Binary working precision for a decimal digit count.
pub fn digits_to_bits(digits: u32) -> u32 {
    (((digits + 1) as f64) * LOG2_10).round() as u32
}

/// Decimal digit count shown for a binary precision.
pub fn bits_to_digits(bits: u32) -> u32 {
    ((bits as f64 / LOG2_10 - 1.0).round() as i64).max(1) as u32
}

pub fn gcd(a: i64, b: i64) -> u64 {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

fn fit_i64(x: i128) -> Result<i64, NumericError> {
    i64::try_from(x).map_err(|_| NumericError::Overflow)
}

fn reduced(num: i128, den: i128) -> Result<Value, NumericError> {
    if den == 0 {
        return Err(NumericError::DivisionByZero);
    }
    let (mut num, mut den) = (num, den);
    if den < 0 {
        num = -num;
        den = -den;
    }
    let mut a = num.unsigned_abs();
    let mut b = den.unsigned_abs();
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    let g = a.max(1) as i128;
    let num = fit_i64(num / g)?;
    let den = fit_i64(den / g)?;
    if den == 1 {
        Ok(Value::Integer(num))
    } else {
        Ok(Value::Rational { num, den })
    }
}

/// Normalized rational constructor: the sign lives on the numerator, the
/// fraction is fully reduced and integer results collapse to `Integer`.
pub fn make_rational(num: i64, den: i64) -> Result<Value, NumericError> {
    reduced(num as i128, den as i128)
}

/// Tolerant comparison of two floats at the coarser of the two binary
/// precisions, `None` standing for an exact operand. Mirrors the usual
/// arbitrary-precision convention of allowing a relative error of
/// `0.5^(prec - 7)`, which also serves as the absolute tolerance near zero.
pub fn almost_equal(a: f64, a_bits: Option<u32>, b: f64, b_bits: Option<u32>) -> bool {
    let bits = match (a_bits, b_bits) {
        (Some(x), Some(y)) => x.min(y),
        (Some(x), None) | (None, Some(x)) => x,
        (None, None) => MACHINE_PRECISION_BITS,
    };
    let rel_eps = 0.5_f64.powi(bits as i32 - 7);
    let diff = (a - b).abs();
    if diff <= rel_eps {
        return true;
    }
    diff <= rel_eps * a.abs().max(b.abs())
}

/// Binary precision of a real atom, `None` for exact operands.
pub fn precision_bits(v: &Value) -> Option<u32> {
    match v {
        Value::Real { prec, .. } => Some(prec.map(digits_to_bits).unwrap_or(MACHINE_PRECISION_BITS)),
        _ => None,
    }
}

/// Best-effort reduction of a numeric atom to a machine float. Complex and
/// non-numeric terms do not reduce.
pub fn to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Integer(n) => Some(*n as f64),
        Value::Rational { num, den } => Some(*num as f64 / *den as f64),
        Value::Real { value, .. } => Some(*value),
        _ => None,
    }
}

pub fn is_numeric_atom(v: &Value) -> bool {
    matches!(
        v,
        Value::Integer(_) | Value::Rational { .. } | Value::Real { .. } | Value::Complex { .. }
    )
}

/// Whether a numeric atom is exact. `None` for non-numeric terms.
pub fn is_exact(v: &Value) -> Option<bool> {
    match v {
        Value::Integer(_) | Value::Rational { .. } => Some(true),
        Value::Real { .. } => Some(false),
        Value::Complex { re, im } => Some(is_exact(re) == Some(true) && is_exact(im) == Some(true)),
        _ => None,
    }
}

/// Real and imaginary components of a numeric atom.
fn parts(v: &Value) -> Option<(Value, Value)> {
    match v {
        Value::Complex { re, im } => Some(((**re).clone(), (**im).clone())),
        _ if is_numeric_atom(v) => Some((v.clone(), Value::Integer(0))),
        _ => None,
    }
}

fn is_exact_zero(v: &Value) -> bool {
    matches!(v, Value::Integer(0))
}

/// Rebuild a complex value, collapsing an exact zero imaginary part.
pub fn make_complex(re: Value, im: Value) -> Value {
    if is_exact_zero(&im) {
        re
    } else {
        Value::Complex {
            re: Box::new(re),
            im: Box::new(im),
        }
    }
}

// Scalar arithmetic on the real-valued atoms. Precision follows the usual
// contagion rule: any machine operand gives a machine result, otherwise the
// smaller decimal precision wins and exact operands do not constrain it.
#[derive(Clone, Copy)]
enum Scalar {
    Exact(i64, i64),
    Float(f64, Option<u32>),
}

fn scalar_of(v: &Value) -> Result<Scalar, NumericError> {
    match v {
        Value::Integer(n) => Ok(Scalar::Exact(*n, 1)),
        Value::Rational { num, den } => Ok(Scalar::Exact(*num, *den)),
        Value::Real { value, prec } => Ok(Scalar::Float(*value, *prec)),
        _ => Err(NumericError::Unsupported),
    }
}

fn scalar_value(s: Scalar) -> Result<Value, NumericError> {
    match s {
        Scalar::Exact(n, d) => make_rational(n, d),
        Scalar::Float(v, prec) => {
            if !v.is_finite() {
                return Err(NumericError::Overflow);
            }
            Ok(Value::Real { value: v, prec })
        }
    }
}

fn join_precision(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        _ => None,
    }
}

fn scalar_float(s: Scalar) -> (f64, Option<u32>) {
    match s {
        Scalar::Exact(n, d) => (n as f64 / d as f64, None),
        Scalar::Float(v, p) => (v, p),
    }
}

fn float_binop(a: Scalar, b: Scalar, f: impl Fn(f64, f64) -> f64) -> Scalar {
    let (x, px) = scalar_float(a);
    let (y, py) = scalar_float(b);
    let prec = match (a, b) {
        // an exact operand leaves the other side's precision in charge
        (Scalar::Exact(..), Scalar::Float(_, p)) | (Scalar::Float(_, p), Scalar::Exact(..)) => p,
        _ => join_precision(px, py),
    };
    Scalar::Float(f(x, y), prec)
}

fn scalar_add(a: Scalar, b: Scalar) -> Result<Scalar, NumericError> {
    match (a, b) {
        (Scalar::Exact(an, ad), Scalar::Exact(bn, bd)) => {
            let num = an as i128 * bd as i128 + bn as i128 * ad as i128;
            let den = ad as i128 * bd as i128;
            match reduced(num, den)? {
                Value::Integer(n) => Ok(Scalar::Exact(n, 1)),
                Value::Rational { num, den } => Ok(Scalar::Exact(num, den)),
                _ => Err(NumericError::Unsupported),
            }
        }
        _ => Ok(float_binop(a, b, |x, y| x + y)),
    }
}

fn scalar_mul(a: Scalar, b: Scalar) -> Result<Scalar, NumericError> {
    match (a, b) {
        (Scalar::Exact(an, ad), Scalar::Exact(bn, bd)) => {
            let num = an as i128 * bn as i128;
            let den = ad as i128 * bd as i128;
            match reduced(num, den)? {
                Value::Integer(n) => Ok(Scalar::Exact(n, 1)),
                Value::Rational { num, den } => Ok(Scalar::Exact(num, den)),
                _ => Err(NumericError::Unsupported),
            }
        }
        _ => Ok(float_binop(a, b, |x, y| x * y)),
    }
}

/// Sum of two numeric atoms.
pub fn num_add(a: &Value, b: &Value) -> Result<Value, NumericError> {
    if matches!(a, Value::Complex { .. }) || matches!(b, Value::Complex { .. }) {
        let (ar, ai) = parts(a).ok_or(NumericError::Unsupported)?;
        let (br, bi) = parts(b).ok_or(NumericError::Unsupported)?;
        let re = num_add(&ar, &br)?;
        let im = num_add(&ai, &bi)?;
        return Ok(make_complex(re, im));
    }
    scalar_value(scalar_add(scalar_of(a)?, scalar_of(b)?)?)
}

/// Product of two numeric atoms.
pub fn num_mul(a: &Value, b: &Value) -> Result<Value, NumericError> {
    if matches!(a, Value::Complex { .. }) || matches!(b, Value::Complex { .. }) {
        let (ar, ai) = parts(a).ok_or(NumericError::Unsupported)?;
        let (br, bi) = parts(b).ok_or(NumericError::Unsupported)?;
        let re = num_add(&num_mul(&ar, &br)?, &num_neg(&num_mul(&ai, &bi)?)?)?;
        let im = num_add(&num_mul(&ar, &bi)?, &num_mul(&ai, &br)?)?;
        return Ok(make_complex(re, im));
    }
    scalar_value(scalar_mul(scalar_of(a)?, scalar_of(b)?)?)
}

pub fn num_neg(a: &Value) -> Result<Value, NumericError> {
    num_mul(a, &Value::Integer(-1))
}

/// Multiplicative inverse. The caller is expected to have screened exact
/// zeros, which surface here as `DivisionByZero`.
pub fn num_recip(a: &Value) -> Result<Value, NumericError> {
    match a {
        Value::Integer(n) => make_rational(1, *n),
        Value::Rational { num, den } => make_rational(*den, *num),
        Value::Real { value, prec } => {
            if *value == 0.0 {
                return Err(NumericError::DivisionByZero);
            }
            Ok(Value::Real {
                value: 1.0 / *value,
                prec: *prec,
            })
        }
        Value::Complex { re, im } => {
            // 1/(a+bi) = (a-bi)/(a^2+b^2)
            let norm = num_add(&num_mul(re, re)?, &num_mul(im, im)?)?;
            if is_exact_zero(&norm) {
                return Err(NumericError::DivisionByZero);
            }
            let inv_norm = num_recip(&norm)?;
            let re2 = num_mul(re, &inv_norm)?;
            let im2 = num_neg(&num_mul(im, &inv_norm)?)?;
            Ok(make_complex(re2, im2))
        }
        _ => Err(NumericError::Unsupported),
    }
}

fn pow_by_squaring(base: &Value, n: u64) -> Result<Value, NumericError> {
    let mut acc = Value::Integer(1);
    let mut base = base.clone();
    let mut n = n;
    while n > 0 {
        if n & 1 == 1 {
            acc = num_mul(&acc, &base)?;
        }
        n >>= 1;
        if n > 0 {
            base = num_mul(&base, &base)?;
        }
    }
    Ok(acc)
}

/// Power of numeric atoms. Zero bases and zero exponents are the caller's
/// business; fractional powers of negative or complex bases are left
/// unreduced as `Unsupported`.
pub fn num_pow(base: &Value, exp: &Value) -> Result<Value, NumericError> {
    match exp {
        Value::Integer(n) => {
            if *n >= 0 {
                pow_by_squaring(base, *n as u64)
            } else {
                let positive = pow_by_squaring(base, n.unsigned_abs())?;
                num_recip(&positive)
            }
        }
        Value::Rational { .. } | Value::Real { .. } => {
            let base_prec = match base {
                Value::Real { prec, .. } => Some(*prec),
                _ => None,
            };
            let exp_prec = match exp {
                Value::Real { prec, .. } => Some(*prec),
                _ => None,
            };
            // an exact radical stays symbolic, only inexact operands force a float
            let prec = match (base_prec, exp_prec) {
                (None, None) => return Err(NumericError::Unsupported),
                (Some(p), None) | (None, Some(p)) => p,
                (Some(p), Some(q)) => join_precision(p, q),
            };
            let b = to_f64(base).ok_or(NumericError::Unsupported)?;
            let e = to_f64(exp).ok_or(NumericError::Unsupported)?;
            let r = b.powf(e);
            if r.is_nan() {
                return Err(NumericError::Unsupported);
            }
            if !r.is_finite() {
                return Err(NumericError::Overflow);
            }
            Ok(Value::Real { value: r, prec })
        }
        _ => Err(NumericError::Unsupported),
    }
}

/// Linear order on real-valued numeric atoms. Complex values and
/// non-numerics are unordered.
pub fn num_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Complex { .. }, _) | (_, Value::Complex { .. }) => None,
        (Value::Integer(x), Value::Integer(y)) => Some(x.cmp(y)),
        _ => {
            let exact = |v: &Value| -> Option<(i128, i128)> {
                match v {
                    Value::Integer(n) => Some((*n as i128, 1)),
                    Value::Rational { num, den } => Some((*num as i128, *den as i128)),
                    _ => None,
                }
            };
            if let (Some((an, ad)), Some((bn, bd))) = (exact(a), exact(b)) {
                return Some((an * bd).cmp(&(bn * ad)));
            }
            let x = to_f64(a)?;
            let y = to_f64(b)?;
            Some(x.total_cmp(&y))
        }
    }
}

/// Numeric equality across atom kinds, tolerant in the precision of the
/// least precise inexact operand. `None` when either side is not numeric.
pub fn num_eq(a: &Value, b: &Value) -> Option<bool> {
    if !is_numeric_atom(a) || !is_numeric_atom(b) {
        return None;
    }
    if matches!(a, Value::Complex { .. }) || matches!(b, Value::Complex { .. }) {
        let (ar, ai) = parts(a)?;
        let (br, bi) = parts(b)?;
        return Some(num_eq(&ar, &br)? && num_eq(&ai, &bi)?);
    }
    if is_exact(a) == Some(true) && is_exact(b) == Some(true) {
        return num_cmp(a, b).map(|o| o == Ordering::Equal);
    }
    Some(almost_equal(
        to_f64(a)?,
        precision_bits(a),
        to_f64(b)?,
        precision_bits(b),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rationals_normalize() {
        assert_eq!(make_rational(2, 4), Ok(Value::Rational { num: 1, den: 2 }));
        assert_eq!(make_rational(4, 2), Ok(Value::Integer(2)));
        assert_eq!(make_rational(-1, -2), Ok(Value::Rational { num: 1, den: 2 }));
        assert_eq!(
            make_rational(1, -2),
            Ok(Value::Rational { num: -1, den: 2 })
        );
        assert_eq!(make_rational(0, 5), Ok(Value::Integer(0)));
        assert_eq!(make_rational(3, 0), Err(NumericError::DivisionByZero));
    }

    #[test]
    fn machine_reals_compare_tolerantly() {
        assert!(almost_equal(1.0, None, 1.0 + 1e-15, None));
        assert!(!almost_equal(1.0, None, 1.0001, None));
        // tolerance scales with magnitude
        assert!(almost_equal(1e10, None, 1e10 + 1.0, None));
    }

    #[test]
    fn higher_precision_distinguishes_closer_values() {
        let bits = Some(digits_to_bits(30));
        assert!(almost_equal(1.0, None, 1.0 + 1e-16, None));
        assert!(!almost_equal(1.0, bits, 1.0 + 1e-16, bits));
    }

    #[test]
    fn exact_addition() {
        let half = make_rational(1, 2).unwrap();
        let third = make_rational(1, 3).unwrap();
        assert_eq!(num_add(&half, &third), make_rational(5, 6));
        assert_eq!(num_add(&half, &half), Ok(Value::Integer(1)));
        assert_eq!(
            num_add(&Value::Integer(i64::MAX), &Value::Integer(1)),
            Err(NumericError::Overflow)
        );
    }

    #[test]
    fn real_contagion() {
        let r = num_add(&Value::Integer(1), &Value::real(0.5)).unwrap();
        assert_eq!(r, Value::real(1.5));
        // exact plus precise real keeps the real's precision
        let p = num_add(&Value::Integer(1), &Value::real_prec(0.5, 30)).unwrap();
        assert_eq!(p, Value::real_prec(1.5, 30));
        // machine wins over precise
        let m = num_add(&Value::real(0.25), &Value::real_prec(0.25, 30)).unwrap();
        assert_eq!(m, Value::real(0.5));
    }

    #[test]
    fn powers() {
        assert_eq!(
            num_pow(&Value::Integer(2), &Value::Integer(10)),
            Ok(Value::Integer(1024))
        );
        assert_eq!(
            num_pow(&Value::Integer(2), &Value::Integer(-2)),
            make_rational(1, 4)
        );
        assert_eq!(
            num_pow(&make_rational(2, 3).unwrap(), &Value::Integer(2)),
            make_rational(4, 9)
        );
        assert_eq!(
            num_pow(&Value::Integer(2), &Value::Integer(64)),
            Err(NumericError::Overflow)
        );
        // I^2 == -1
        let i = Value::Complex {
            re: Box::new(Value::Integer(0)),
            im: Box::new(Value::Integer(1)),
        };
        assert_eq!(num_pow(&i, &Value::Integer(2)), Ok(Value::Integer(-1)));
    }

    #[test]
    fn fractional_power_of_negative_base_stays_symbolic() {
        assert_eq!(
            num_pow(&Value::Integer(-2), &Value::real(0.5)),
            Err(NumericError::Unsupported)
        );
    }

    #[test]
    fn exact_radicals_stay_symbolic() {
        assert_eq!(
            num_pow(&Value::Integer(2), &make_rational(1, 2).unwrap()),
            Err(NumericError::Unsupported)
        );
        // but an inexact exponent forces the float path
        let r = num_pow(&Value::Integer(2), &Value::real(0.5)).unwrap();
        assert!(matches!(r, Value::Real { prec: None, .. }));
    }

    #[test]
    fn comparisons() {
        assert_eq!(
            num_cmp(&make_rational(1, 3).unwrap(), &Value::real(0.34)),
            Some(Ordering::Less)
        );
        assert_eq!(
            num_cmp(&Value::Integer(2), &make_rational(5, 2).unwrap()),
            Some(Ordering::Less)
        );
        assert_eq!(num_cmp(&Value::Integer(3), &Value::sym("x")), None);
    }

    #[test]
    fn mixed_equality() {
        assert_eq!(num_eq(&Value::Integer(1), &Value::real(1.0)), Some(true));
        assert_eq!(num_eq(&Value::Integer(1), &Value::real(1.5)), Some(false));
        assert_eq!(
            num_eq(&make_rational(1, 2).unwrap(), &Value::real(0.5)),
            Some(true)
        );
        assert_eq!(num_eq(&Value::Integer(1), &Value::sym("x")), None);
    }

    #[test]
    fn complex_products_collapse_to_real() {
        let i = Value::Complex {
            re: Box::new(Value::Integer(0)),
            im: Box::new(Value::Integer(1)),
        };
        assert_eq!(num_mul(&i, &i), Ok(Value::Integer(-1)));
        let minus_i = Value::Complex {
            re: Box::new(Value::Integer(0)),
            im: Box::new(Value::Integer(-1)),
        };
        assert_eq!(num_recip(&i), Ok(minus_i));
    }
}
