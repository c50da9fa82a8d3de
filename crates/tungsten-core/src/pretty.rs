//! Compact one-line rendering of terms, used by diagnostics and tests.
//! Standard contexts are stripped from symbols, lists print in braces and
//! the common pattern shorthands (`x_`, `__h`) are restored.

use crate::value::Value;

pub fn format_value(v: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, v);
    out
}

fn write_value(out: &mut String, v: &Value) {
    match v {
        Value::Integer(n) => out.push_str(&n.to_string()),
        Value::Rational { num, den } => {
            out.push_str(&num.to_string());
            out.push('/');
            out.push_str(&den.to_string());
        }
        Value::Real { value, prec } => {
            push_real(out, *value);
            if let Some(digits) = prec {
                out.push('`');
                out.push_str(&digits.to_string());
            }
        }
        Value::Complex { re, im } => {
            out.push_str("Complex[");
            write_value(out, re);
            out.push_str(", ");
            write_value(out, im);
            out.push(']');
        }
        Value::String(s) => {
            out.push('"');
            for c in s.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    '\r' => out.push_str("\\r"),
                    _ => out.push(c),
                }
            }
            out.push('"');
        }
        Value::Symbol(s) => out.push_str(&s.to_string()),
        Value::Expr(e) => {
            if let Some(short) = pattern_shorthand(v) {
                out.push_str(&short);
                return;
            }
            if e.head.as_symbol().map(|s| s.name()) == Some("System`List") {
                out.push('{');
                write_elements(out, &e.elements);
                out.push('}');
                return;
            }
            if let Some(arrow) = match e.head.as_symbol().map(|s| s.name()) {
                Some("System`Rule") if e.elements.len() == 2 => Some(" -> "),
                Some("System`RuleDelayed") if e.elements.len() == 2 => Some(" :> "),
                _ => None,
            } {
                write_value(out, &e.elements[0]);
                out.push_str(arrow);
                write_value(out, &e.elements[1]);
                return;
            }
            write_value(out, &e.head);
            out.push('[');
            write_elements(out, &e.elements);
            out.push(']');
        }
    }
}

fn write_elements(out: &mut String, elements: &[Value]) {
    for (i, element) in elements.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_value(out, element);
    }
}

fn push_real(out: &mut String, value: f64) {
    let s = value.to_string();
    let plain = s.bytes().all(|b| b.is_ascii_digit() || b == b'-');
    out.push_str(&s);
    if plain {
        out.push('.');
    }
}

fn blank_marks(v: &Value) -> Option<(&'static str, Option<&Value>)> {
    let e = v.as_expr()?;
    if e.elements.len() > 1 {
        return None;
    }
    let marks = match e.head.as_symbol()?.name() {
        "System`Blank" => "_",
        "System`BlankSequence" => "__",
        "System`BlankNullSequence" => "___",
        _ => return None,
    };
    Some((marks, e.elements.first()))
}

fn pattern_shorthand(v: &Value) -> Option<String> {
    if let Some((marks, head)) = blank_marks(v) {
        return Some(match head {
            Some(h) => format!("{marks}{}", format_value(h)),
            None => marks.to_string(),
        });
    }
    // Pattern[name, blank] prints as name_ and friends
    if v.has_form("Pattern", 2, Some(2)) {
        let elements = v.elements();
        let name = elements[0].as_symbol()?;
        let (marks, head) = blank_marks(&elements[1])?;
        return Some(match head {
            Some(h) => format!("{name}{marks}{}", format_value(h)),
            None => format!("{name}{marks}"),
        });
    }
    None
}
