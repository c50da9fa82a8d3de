//! Evaluation messages.
//!
//! Messages are a side channel, not a control signal: emitting one never
//! changes the course of evaluation. The evaluator accumulates them in
//! order; hosts drain the buffer between top-level inputs.

use std::fmt;

use tungsten_core::{format_value, Value};

/// One emitted message, e.g. `Set::wrsym: Symbol Plus is Protected.`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Short name of the symbol the message is filed under.
    pub symbol: String,
    pub tag: String,
    /// Rendered text with all placeholders substituted.
    pub text: String,
}

impl Message {
    pub fn new(symbol: &str, tag: &str, text: String) -> Self {
        Message {
            symbol: symbol.to_string(),
            tag: tag.to_string(),
            text,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}: {}", self.symbol, self.tag, self.text)
    }
}

/// Substitute `` `1` ``-style placeholders in a message template with the
/// formatted arguments. Placeholders without a matching argument and stray
/// backquote runs are kept verbatim.
pub fn render_template(template: &str, args: &[Value]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '`' {
            out.push(c);
            continue;
        }
        let mut digits = String::new();
        while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
            digits.push(*d);
            chars.next();
        }
        if !digits.is_empty() && chars.peek() == Some(&'`') {
            match digits.parse::<usize>() {
                Ok(index) if index >= 1 && index <= args.len() => {
                    chars.next();
                    out.push_str(&format_value(&args[index - 1]));
                    continue;
                }
                _ => {}
            }
        }
        // not a substitutable placeholder; the closing mark, if any, is
        // re-examined on the next round
        out.push('`');
        out.push_str(&digits);
    }
    out
}
