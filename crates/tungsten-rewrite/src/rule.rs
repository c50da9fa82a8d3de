//! Rewrite rules and ordered rule lists.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tungsten_core::Value;

use crate::specificity::pattern_cmp;

/// Whether a rule re-evaluates its right-hand side at application time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Delayed {
    No,
    Yes,
}

/// One rewrite rule. Immediate rules (`lhs -> rhs`) carry an already
/// evaluated right-hand side; delayed rules (`lhs :> rhs`) keep it verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub lhs: Value,
    pub rhs: Value,
    pub delayed: Delayed,
}

impl Rule {
    pub fn immediate(lhs: Value, rhs: Value) -> Self {
        Rule {
            lhs,
            rhs,
            delayed: Delayed::No,
        }
    }

    pub fn delayed(lhs: Value, rhs: Value) -> Self {
        Rule {
            lhs,
            rhs,
            delayed: Delayed::Yes,
        }
    }

    pub fn is_delayed(&self) -> bool {
        self.delayed == Delayed::Yes
    }
}

/// Rules of one definition slot, ordered from most to least specific.
///
/// Insertion keeps the order invariant: a rule lands before every strictly
/// less specific rule and before equally specific ones, so redefinitions at
/// the same specificity take effect immediately. A rule whose pattern is
/// `sameQ` to a stored one replaces it in place of accumulating.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleList(Vec<Rule>);

impl RuleList {
    pub fn new() -> Self {
        RuleList(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.0.iter()
    }

    pub fn insert(&mut self, rule: Rule) {
        self.0.retain(|r| !r.lhs.same_q(&rule.lhs));
        let pos = self
            .0
            .partition_point(|r| pattern_cmp(&r.lhs, &rule.lhs) == Ordering::Less);
        self.0.insert(pos, rule);
    }

    /// Drop the rule whose pattern is `sameQ` to `lhs`.
    pub fn remove(&mut self, lhs: &Value) -> bool {
        let before = self.0.len();
        self.0.retain(|r| !r.lhs.same_q(lhs));
        self.0.len() != before
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl<'a> IntoIterator for &'a RuleList {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn blank(name: &str) -> Value {
        Value::call(
            "Pattern",
            vec![Value::sym(name), Value::call("Blank", vec![])],
        )
    }

    fn f(arg: Value) -> Value {
        Value::call("f", vec![arg])
    }

    #[test]
    fn specific_rules_come_first() {
        let mut rules = RuleList::new();
        rules.insert(Rule::delayed(f(blank("x")), Value::sym("general")));
        rules.insert(Rule::delayed(f(Value::int(1)), Value::sym("literal")));
        let order: Vec<&Value> = rules.iter().map(|r| &r.rhs).collect();
        assert_eq!(order, vec![&Value::sym("literal"), &Value::sym("general")]);
    }

    #[test]
    fn newest_wins_among_equals() {
        let mut rules = RuleList::new();
        rules.insert(Rule::delayed(f(blank("x")), Value::int(1)));
        rules.insert(Rule::delayed(f(blank("y")), Value::int(2)));
        assert_eq!(rules.len(), 2);
        assert_eq!(rules.rules()[0].rhs, Value::int(2));
    }

    #[test]
    fn same_pattern_replaces() {
        let mut rules = RuleList::new();
        rules.insert(Rule::delayed(f(blank("x")), Value::int(1)));
        rules.insert(Rule::delayed(f(blank("x")), Value::int(2)));
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.rules()[0].rhs, Value::int(2));
    }

    #[test]
    fn remove_targets_same_q_patterns() {
        let mut rules = RuleList::new();
        rules.insert(Rule::delayed(f(blank("x")), Value::int(1)));
        assert!(!rules.remove(&f(Value::int(3))));
        assert!(rules.remove(&f(blank("x"))));
        assert!(rules.is_empty());
    }
}
