//! The symbol-indexed definition store.
//!
//! Every symbol that has been given any meaning owns one [`Definition`]
//! record: its attribute bits, the four rule classes, format rules, message
//! templates, options and default element values. The store also keeps a
//! monotonically increasing generation counter; each mutation bumps it and
//! records the new value on the touched symbol, which lets the evaluator
//! validate normal-form stamps instead of flushing caches wholesale.

use std::collections::HashMap;

use regex::Regex;
use thiserror::Error;
use tungsten_core::{Symbol, Value};

use crate::attrs::Attributes;
use crate::rule::{Rule, RuleList};

/// The four rule classes a definition can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefKind {
    Own,
    Down,
    Sub,
    Up,
}

/// Refusals to mutate a definition. `Locked` wins over `Protected` when
/// both apply.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefsError {
    #[error("symbol {0} is Protected")]
    Protected(Symbol),
    #[error("symbol {0} is Locked")]
    Locked(Symbol),
}

/// Everything known about one symbol.
#[derive(Debug, Clone, Default)]
pub struct Definition {
    pub attributes: Attributes,
    pub ownvalues: RuleList,
    pub downvalues: RuleList,
    pub subvalues: RuleList,
    pub upvalues: RuleList,
    pub formatvalues: RuleList,
    /// Message templates by tag, e.g. `"argrx"`.
    pub messages: HashMap<String, String>,
    pub options: HashMap<String, Value>,
    /// Default element values: a general one under `None`, positional ones
    /// under their 1-based argument position.
    pub defaults: Vec<(Option<usize>, Value)>,
    /// Installed by the runtime rather than user code. Builtin symbols do
    /// not absorb `Return` signals.
    pub is_builtin: bool,
    last_changed: u64,
}

impl Definition {
    pub fn rules(&self, kind: DefKind) -> &RuleList {
        match kind {
            DefKind::Own => &self.ownvalues,
            DefKind::Down => &self.downvalues,
            DefKind::Sub => &self.subvalues,
            DefKind::Up => &self.upvalues,
        }
    }

    fn rules_mut(&mut self, kind: DefKind) -> &mut RuleList {
        match kind {
            DefKind::Own => &mut self.ownvalues,
            DefKind::Down => &mut self.downvalues,
            DefKind::Sub => &mut self.subvalues,
            DefKind::Up => &mut self.upvalues,
        }
    }

    /// Store generation at which this definition last changed.
    pub fn last_changed(&self) -> u64 {
        self.last_changed
    }
}

/// The definition store. Owned by whoever drives evaluation and passed
/// down explicitly, so independent sessions never share state.
#[derive(Debug, Clone, Default)]
pub struct Definitions {
    table: HashMap<Symbol, Definition>,
    generation: u64,
}

impl Definitions {
    pub fn new() -> Self {
        Definitions::default()
    }

    /// Current store generation. Strictly increases with every mutation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn lookup(&self, sym: &Symbol) -> Option<&Definition> {
        self.table.get(sym)
    }

    pub fn attributes(&self, sym: &Symbol) -> Attributes {
        self.table
            .get(sym)
            .map(|d| d.attributes)
            .unwrap_or_default()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.table.keys()
    }

    /// Whether `sym` carries a user definition, as opposed to a builtin one
    /// or none at all.
    pub fn is_user(&self, sym: &Symbol) -> bool {
        self.table.get(sym).is_some_and(|d| !d.is_builtin)
    }

    /// True when none of `symbols` changed after store generation
    /// `generation`. Symbols without a record count as unchanged: dropping
    /// a definition only removes rewrites, it cannot invalidate a form that
    /// was already normal.
    pub fn unchanged_since(&self, symbols: &[Symbol], generation: u64) -> bool {
        symbols.iter().all(|s| {
            self.table
                .get(s)
                .map_or(true, |d| d.last_changed <= generation)
        })
    }

    fn touch(&mut self, sym: &Symbol) {
        self.generation += 1;
        let generation = self.generation;
        self.table.entry(sym.clone()).or_default().last_changed = generation;
    }

    fn check_value_write(&self, sym: &Symbol) -> Result<(), DefsError> {
        let attrs = self.attributes(sym);
        if attrs.contains(Attributes::LOCKED) {
            return Err(DefsError::Locked(sym.clone()));
        }
        if attrs.contains(Attributes::PROTECTED) {
            return Err(DefsError::Protected(sym.clone()));
        }
        Ok(())
    }

    fn check_attribute_write(&self, sym: &Symbol) -> Result<(), DefsError> {
        if self.attributes(sym).contains(Attributes::LOCKED) {
            return Err(DefsError::Locked(sym.clone()));
        }
        Ok(())
    }

    /// Install a builtin: set its attribute bits and mark it runtime-owned.
    /// Not subject to protection checks; runs before user code exists.
    pub fn install_builtin(&mut self, sym: &Symbol, attributes: Attributes) {
        let record = self.table.entry(sym.clone()).or_default();
        record.attributes = attributes;
        record.is_builtin = true;
        self.touch(sym);
    }

    pub fn add_rule(&mut self, kind: DefKind, sym: &Symbol, rule: Rule) -> Result<(), DefsError> {
        self.check_value_write(sym)?;
        self.table
            .entry(sym.clone())
            .or_default()
            .rules_mut(kind)
            .insert(rule);
        self.touch(sym);
        Ok(())
    }

    /// Replace the symbol's ownvalues wholesale, handing the previous list
    /// back. Loop constructs use this to bind an iteration variable for the
    /// body and put the old meaning back afterwards.
    pub fn swap_ownvalues(
        &mut self,
        sym: &Symbol,
        rules: RuleList,
    ) -> Result<RuleList, DefsError> {
        self.check_value_write(sym)?;
        let record = self.table.entry(sym.clone()).or_default();
        let previous = std::mem::replace(&mut record.ownvalues, rules);
        self.touch(sym);
        Ok(previous)
    }

    pub fn add_format_rule(&mut self, sym: &Symbol, rule: Rule) -> Result<(), DefsError> {
        self.check_value_write(sym)?;
        self.table
            .entry(sym.clone())
            .or_default()
            .formatvalues
            .insert(rule);
        self.touch(sym);
        Ok(())
    }

    /// Remove the rule with a `sameQ` pattern; reports whether one existed.
    pub fn unset(&mut self, kind: DefKind, sym: &Symbol, lhs: &Value) -> Result<bool, DefsError> {
        self.check_value_write(sym)?;
        let removed = match self.table.get_mut(sym) {
            Some(record) => record.rules_mut(kind).remove(lhs),
            None => false,
        };
        if removed {
            self.touch(sym);
        }
        Ok(removed)
    }

    /// Drop the value rules of `sym`, keeping attributes, messages, options
    /// and defaults.
    pub fn clear(&mut self, sym: &Symbol) -> Result<(), DefsError> {
        self.check_value_write(sym)?;
        if let Some(record) = self.table.get_mut(sym) {
            record.ownvalues.clear();
            record.downvalues.clear();
            record.subvalues.clear();
            record.upvalues.clear();
            self.touch(sym);
        }
        Ok(())
    }

    /// Drop everything the symbol carries, attributes included.
    pub fn clear_all(&mut self, sym: &Symbol) -> Result<(), DefsError> {
        self.check_value_write(sym)?;
        self.check_attribute_write(sym)?;
        if let Some(record) = self.table.get_mut(sym) {
            let is_builtin = record.is_builtin;
            *record = Definition {
                is_builtin,
                ..Definition::default()
            };
            self.touch(sym);
        }
        Ok(())
    }

    /// Forget the symbol entirely.
    pub fn remove(&mut self, sym: &Symbol) -> Result<(), DefsError> {
        self.check_value_write(sym)?;
        if self.table.remove(sym).is_some() {
            self.generation += 1;
        }
        Ok(())
    }

    pub fn set_attributes(&mut self, sym: &Symbol, attrs: Attributes) -> Result<(), DefsError> {
        self.check_attribute_write(sym)?;
        self.table.entry(sym.clone()).or_default().attributes |= attrs;
        self.touch(sym);
        Ok(())
    }

    pub fn clear_attributes(&mut self, sym: &Symbol, attrs: Attributes) -> Result<(), DefsError> {
        self.check_attribute_write(sym)?;
        if let Some(record) = self.table.get_mut(sym) {
            record.attributes &= !attrs;
            self.touch(sym);
        }
        Ok(())
    }

    pub fn set_message(&mut self, sym: &Symbol, tag: &str, text: &str) -> Result<(), DefsError> {
        self.check_value_write(sym)?;
        self.table
            .entry(sym.clone())
            .or_default()
            .messages
            .insert(tag.to_string(), text.to_string());
        self.touch(sym);
        Ok(())
    }

    /// Template for `sym::tag`, falling back to `General::tag`.
    pub fn message_template(&self, sym: &Symbol, tag: &str) -> Option<&str> {
        if let Some(text) = self.lookup(sym).and_then(|d| d.messages.get(tag)) {
            return Some(text);
        }
        let general = Symbol::system("General");
        self.lookup(&general)
            .and_then(|d| d.messages.get(tag))
            .map(String::as_str)
    }

    pub fn set_option(&mut self, sym: &Symbol, name: &str, value: Value) -> Result<(), DefsError> {
        self.check_value_write(sym)?;
        self.table
            .entry(sym.clone())
            .or_default()
            .options
            .insert(name.to_string(), value);
        self.touch(sym);
        Ok(())
    }

    pub fn set_default(
        &mut self,
        sym: &Symbol,
        position: Option<usize>,
        value: Value,
    ) -> Result<(), DefsError> {
        self.check_value_write(sym)?;
        let defaults = &mut self.table.entry(sym.clone()).or_default().defaults;
        if let Some(slot) = defaults.iter_mut().find(|(p, _)| *p == position) {
            slot.1 = value;
        } else {
            defaults.push((position, value));
        }
        self.touch(sym);
        Ok(())
    }

    /// Default value for an element of `sym` at 1-based `position`. A
    /// positional default shadows the general one.
    pub fn default_value(&self, sym: &Symbol, position: usize) -> Option<&Value> {
        let defaults = &self.lookup(sym)?.defaults;
        defaults
            .iter()
            .find(|(p, _)| *p == Some(position))
            .or_else(|| defaults.iter().find(|(p, _)| p.is_none()))
            .map(|(_, v)| v)
    }

    /// Names of defined symbols matching a glob. `*` matches any name run,
    /// `@` a nonempty run without uppercase letters. A pattern without a
    /// context mark matches short names in `System`` and `Global``; a
    /// context part may itself use wildcards, where `*` crosses context
    /// marks.
    pub fn get_matching_names(&self, pattern: &str) -> Vec<String> {
        let valid = pattern
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '$' | '`' | '*' | '@'));
        if !valid {
            return Vec::new();
        }
        let regex = match pattern.rfind('`') {
            Some(pos) => {
                let (context, short) = (&pattern[..=pos], &pattern[pos + 1..]);
                let context_re = if context == "`" {
                    "System`".to_string()
                } else {
                    glob_to_regex(context, false)
                };
                format!("^{}{}$", context_re, glob_to_regex(short, true))
            }
            None => format!("^(?:System`|Global`){}$", glob_to_regex(pattern, true)),
        };
        let re = match Regex::new(&regex) {
            Ok(re) => re,
            Err(_) => return Vec::new(),
        };
        let mut names: Vec<String> = self
            .table
            .keys()
            .filter(|sym| re.is_match(sym.name()))
            .map(|sym| sym.name().to_string())
            .collect();
        names.sort_unstable();
        names
    }
}

fn glob_to_regex(part: &str, short: bool) -> String {
    let mut out = String::with_capacity(part.len());
    for c in part.chars() {
        match c {
            '*' => out.push_str(if short { "[^`]*" } else { ".*" }),
            '@' => out.push_str(if short { "[^A-Z]+" } else { "[^A-Z`]+" }),
            '$' => out.push_str("\\$"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sym(name: &str) -> Symbol {
        Symbol::new(name)
    }

    fn down_rule(head: &str, arg: Value, rhs: Value) -> Rule {
        Rule::delayed(Value::call(head, vec![arg]), rhs)
    }

    #[test]
    fn rules_land_in_their_class() {
        let mut defs = Definitions::new();
        let f = sym("f");
        defs.add_rule(DefKind::Down, &f, down_rule("f", Value::int(1), Value::int(10)))
            .unwrap();
        defs.add_rule(DefKind::Own, &f, Rule::immediate(Value::sym("f"), Value::int(3)))
            .unwrap();
        let record = defs.lookup(&f).unwrap();
        assert_eq!(record.rules(DefKind::Down).len(), 1);
        assert_eq!(record.rules(DefKind::Own).len(), 1);
        assert_eq!(record.rules(DefKind::Up).len(), 0);
    }

    #[test]
    fn protection_refuses_value_writes_but_not_attribute_writes() {
        let mut defs = Definitions::new();
        let f = sym("f");
        defs.set_attributes(&f, Attributes::PROTECTED).unwrap();
        let err = defs
            .add_rule(DefKind::Down, &f, down_rule("f", Value::int(1), Value::int(2)))
            .unwrap_err();
        assert_eq!(err, DefsError::Protected(f.clone()));
        defs.set_attributes(&f, Attributes::LISTABLE).unwrap();
        assert!(defs.attributes(&f).contains(Attributes::LISTABLE));
    }

    #[test]
    fn locked_refuses_everything() {
        let mut defs = Definitions::new();
        let f = sym("f");
        defs.set_attributes(&f, Attributes::LOCKED).unwrap();
        assert_eq!(
            defs.set_attributes(&f, Attributes::FLAT),
            Err(DefsError::Locked(f.clone()))
        );
        assert_eq!(defs.clear_all(&f), Err(DefsError::Locked(f.clone())));
        assert_eq!(
            defs.add_rule(DefKind::Down, &f, down_rule("f", Value::int(1), Value::int(2))),
            Err(DefsError::Locked(f))
        );
    }

    #[test]
    fn swap_ownvalues_replaces_and_returns_the_old_list() {
        let mut defs = Definitions::new();
        let i = sym("i");
        defs.add_rule(DefKind::Own, &i, Rule::immediate(Value::sym("i"), Value::int(1)))
            .unwrap();
        let before = defs.generation();

        let mut bound = RuleList::new();
        bound.insert(Rule::immediate(Value::sym("i"), Value::int(2)));
        let saved = defs.swap_ownvalues(&i, bound).unwrap();
        assert_eq!(saved.rules()[0].rhs, Value::int(1));
        assert_eq!(
            defs.lookup(&i).unwrap().rules(DefKind::Own).rules()[0].rhs,
            Value::int(2)
        );
        assert!(defs.generation() > before);

        defs.swap_ownvalues(&i, saved).unwrap();
        assert_eq!(
            defs.lookup(&i).unwrap().rules(DefKind::Own).rules()[0].rhs,
            Value::int(1)
        );
    }

    #[test]
    fn unset_removes_only_same_q_patterns() {
        let mut defs = Definitions::new();
        let f = sym("f");
        let lhs = Value::call("f", vec![Value::int(1)]);
        defs.add_rule(DefKind::Down, &f, Rule::immediate(lhs.clone(), Value::int(2)))
            .unwrap();
        assert_eq!(
            defs.unset(DefKind::Down, &f, &Value::call("f", vec![Value::int(9)])),
            Ok(false)
        );
        assert_eq!(defs.unset(DefKind::Down, &f, &lhs), Ok(true));
        assert!(defs.lookup(&f).unwrap().downvalues.is_empty());
    }

    #[test]
    fn clear_keeps_attributes_clear_all_drops_them() {
        let mut defs = Definitions::new();
        let f = sym("f");
        defs.set_attributes(&f, Attributes::ORDERLESS).unwrap();
        defs.add_rule(DefKind::Down, &f, down_rule("f", Value::int(1), Value::int(2)))
            .unwrap();
        defs.set_message(&f, "usage", "f does things").unwrap();
        defs.clear(&f).unwrap();
        let record = defs.lookup(&f).unwrap();
        assert!(record.downvalues.is_empty());
        assert!(record.attributes.contains(Attributes::ORDERLESS));
        assert_eq!(record.messages.get("usage").map(String::as_str), Some("f does things"));
        defs.clear_all(&f).unwrap();
        let record = defs.lookup(&f).unwrap();
        assert_eq!(record.attributes, Attributes::empty());
        assert!(record.messages.is_empty());
    }

    #[test]
    fn remove_forgets_the_symbol() {
        let mut defs = Definitions::new();
        let f = sym("f");
        defs.add_rule(DefKind::Down, &f, down_rule("f", Value::int(1), Value::int(2)))
            .unwrap();
        let before = defs.generation();
        defs.remove(&f).unwrap();
        assert!(defs.lookup(&f).is_none());
        assert!(defs.generation() > before);
    }

    #[test]
    fn generation_tracks_staleness_per_symbol() {
        let mut defs = Definitions::new();
        let f = sym("f");
        let g = sym("g");
        defs.add_rule(DefKind::Down, &f, down_rule("f", Value::int(1), Value::int(2)))
            .unwrap();
        let snapshot = defs.generation();
        assert!(defs.unchanged_since(&[f.clone(), g.clone()], snapshot));
        defs.add_rule(DefKind::Down, &g, down_rule("g", Value::int(1), Value::int(2)))
            .unwrap();
        assert!(defs.unchanged_since(&[f.clone()], snapshot));
        assert!(!defs.unchanged_since(&[g], snapshot));
        assert!(defs.unchanged_since(&[sym("unrelated")], snapshot));
    }

    #[test]
    fn message_templates_fall_back_to_general() {
        let mut defs = Definitions::new();
        let general = Symbol::system("General");
        defs.set_message(&general, "argrx", "`1` called with `2` arguments.")
            .unwrap();
        defs.set_message(&sym("f"), "argrx", "f is special.").unwrap();
        assert_eq!(
            defs.message_template(&sym("f"), "argrx"),
            Some("f is special.")
        );
        assert_eq!(
            defs.message_template(&sym("g"), "argrx"),
            Some("`1` called with `2` arguments.")
        );
        assert_eq!(defs.message_template(&sym("g"), "missing"), None);
    }

    #[test]
    fn positional_defaults_shadow_the_general_one() {
        let mut defs = Definitions::new();
        let f = sym("f");
        defs.set_default(&f, None, Value::int(0)).unwrap();
        defs.set_default(&f, Some(2), Value::int(1)).unwrap();
        assert_eq!(defs.default_value(&f, 1), Some(&Value::int(0)));
        assert_eq!(defs.default_value(&f, 2), Some(&Value::int(1)));
        assert_eq!(defs.default_value(&sym("g"), 1), None);
    }

    #[test]
    fn name_globs() {
        let mut defs = Definitions::new();
        for name in ["foo", "fog", "Fun", "other"] {
            defs.add_rule(
                DefKind::Own,
                &sym(name),
                Rule::immediate(Value::sym(name), Value::int(0)),
            )
            .unwrap();
        }
        defs.install_builtin(&Symbol::system("Floor"), Attributes::PROTECTED);
        assert_eq!(
            defs.get_matching_names("fo*"),
            vec!["Global`fog", "Global`foo"]
        );
        assert_eq!(
            defs.get_matching_names("Global`*"),
            vec!["Global`Fun", "Global`fog", "Global`foo", "Global`other"]
        );
        // `@` never matches uppercase
        assert_eq!(defs.get_matching_names("@"), vec!["Global`fog", "Global`foo", "Global`other"]);
        assert_eq!(defs.get_matching_names("F*"), vec!["Global`Fun", "System`Floor"]);
        assert_eq!(defs.get_matching_names("bad-*"), Vec::<String>::new());
    }
}
