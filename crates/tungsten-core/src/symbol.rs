use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Separator between a context and a short symbol name, as in `System`Plus`.
pub const CONTEXT_MARK: char = '`';

pub const SYSTEM_CONTEXT: &str = "System`";
pub const GLOBAL_CONTEXT: &str = "Global`";

/// Short names that resolve into the `System`` context when written without
/// an explicit context mark. Sorted for binary search.
static SYSTEM_NAMES: &[&str] = &[
    "$Aborted",
    "$Failed",
    "$IterationLimit",
    "$RecursionLimit",
    "Abort",
    "Alternatives",
    "AtomQ",
    "Attributes",
    "Blank",
    "BlankNullSequence",
    "BlankSequence",
    "Break",
    "Catch",
    "CheckAbort",
    "Clear",
    "ClearAll",
    "ClearAttributes",
    "Complex",
    "ComplexInfinity",
    "CompoundExpression",
    "Condition",
    "Constant",
    "Continue",
    "Default",
    "Divide",
    "Do",
    "DownValues",
    "Equal",
    "Evaluate",
    "Except",
    "False",
    "Flat",
    "For",
    "Format",
    "General",
    "Greater",
    "GreaterEqual",
    "Head",
    "Hold",
    "HoldAll",
    "HoldAllComplete",
    "HoldComplete",
    "HoldFirst",
    "HoldForm",
    "HoldPattern",
    "HoldRest",
    "If",
    "Indeterminate",
    "Infinity",
    "Integer",
    "Length",
    "Less",
    "LessEqual",
    "List",
    "Listable",
    "Locked",
    "MessageName",
    "Minus",
    "NHoldAll",
    "NHoldFirst",
    "NHoldRest",
    "Null",
    "NumericFunction",
    "OneIdentity",
    "Optional",
    "Options",
    "Order",
    "OrderedQ",
    "Orderless",
    "Overflow",
    "OwnValues",
    "Pattern",
    "PatternTest",
    "Plus",
    "Power",
    "Protect",
    "Protected",
    "Rational",
    "ReadProtected",
    "Real",
    "Remove",
    "Repeated",
    "RepeatedNull",
    "ReplaceAll",
    "ReplaceRepeated",
    "Return",
    "Rule",
    "RuleDelayed",
    "SameQ",
    "Sequence",
    "SequenceHold",
    "Set",
    "SetAttributes",
    "SetDelayed",
    "Sort",
    "Sqrt",
    "String",
    "SubValues",
    "Subtract",
    "Symbol",
    "TagSet",
    "TagSetDelayed",
    "Thread",
    "Throw",
    "Times",
    "True",
    "Unequal",
    "Unevaluated",
    "Unprotect",
    "UnsameQ",
    "Unset",
    "UpSet",
    "UpSetDelayed",
    "UpValues",
    "Verbatim",
    "While",
];

static INTERN: OnceLock<RwLock<HashMap<String, Arc<str>>>> = OnceLock::new();

fn intern_table() -> &'static RwLock<HashMap<String, Arc<str>>> {
    INTERN.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Resolve a possibly short name to a fully qualified one. Names carrying a
/// context mark are kept as given; bare names of well-known builtins land in
/// `System``, everything else in `Global``.
pub fn ensure_context(name: &str) -> String {
    if name.contains(CONTEXT_MARK) {
        return name.to_string();
    }
    if SYSTEM_NAMES.binary_search(&name).is_ok() {
        format!("{SYSTEM_CONTEXT}{name}")
    } else {
        format!("{GLOBAL_CONTEXT}{name}")
    }
}

/// Strip the context prefix from a fully qualified name.
pub fn strip_context(name: &str) -> &str {
    match name.rfind(CONTEXT_MARK) {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

/// Interned handle to a fully qualified symbol name. Handles for the same
/// name share storage, so equality is usually a single pointer comparison
/// and clones are cheap.
#[derive(Clone, Eq)]
pub struct Symbol(Arc<str>);

impl Symbol {
    /// Intern `name`, resolving a missing context per [`ensure_context`].
    pub fn new(name: &str) -> Self {
        let full = ensure_context(name);
        Self::intern(&full)
    }

    /// Intern a short name directly in the `System`` context.
    pub fn system(short: &str) -> Self {
        Self::intern(&format!("{SYSTEM_CONTEXT}{short}"))
    }

    fn intern(full: &str) -> Self {
        if let Some(existing) = intern_table().read().get(full) {
            return Symbol(existing.clone());
        }
        let mut table = intern_table().write();
        let entry = table
            .entry(full.to_string())
            .or_insert_with(|| Arc::from(full));
        Symbol(entry.clone())
    }

    /// The fully qualified name, context included.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// The name with its context prefix removed.
    pub fn short_name(&self) -> &str {
        strip_context(&self.0)
    }

    /// The context prefix including the trailing mark, e.g. `System``.
    pub fn context(&self) -> &str {
        match self.0.rfind(CONTEXT_MARK) {
            Some(pos) => &self.0[..=pos],
            None => "",
        }
    }

    pub fn is_system(&self) -> bool {
        self.0.starts_with(SYSTEM_CONTEXT)
    }

    /// Symbols whose value is fixed by the language itself. They never carry
    /// definitions, so evaluation can return them untouched.
    pub fn is_semantic_constant(&self) -> bool {
        matches!(self.name(), "System`True" | "System`False" | "System`Null")
    }

    /// Identity check on the interned storage.
    pub fn ptr_eq(&self, other: &Symbol) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.as_ref().hash(state);
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.as_ref().cmp(other.0.as_ref())
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        if let Some(short) = name
            .strip_prefix(SYSTEM_CONTEXT)
            .or_else(|| name.strip_prefix(GLOBAL_CONTEXT))
        {
            f.write_str(short)
        } else {
            f.write_str(name)
        }
    }
}

impl Serialize for Symbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Symbol::new(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn system_names_are_sorted() {
        let mut sorted = SYSTEM_NAMES.to_vec();
        sorted.sort_unstable();
        assert_eq!(SYSTEM_NAMES.to_vec(), sorted);
    }

    #[test]
    fn interning_shares_storage() {
        let a = Symbol::new("Plus");
        let b = Symbol::new("System`Plus");
        assert!(a.ptr_eq(&b));
        assert_eq!(a, b);
    }

    #[test]
    fn context_resolution() {
        assert_eq!(Symbol::new("Plus").name(), "System`Plus");
        assert_eq!(Symbol::new("frobnicate").name(), "Global`frobnicate");
        assert_eq!(Symbol::new("My`Own`thing").name(), "My`Own`thing");
    }

    #[test]
    fn short_name_and_context() {
        let s = Symbol::new("My`Own`thing");
        assert_eq!(s.short_name(), "thing");
        assert_eq!(s.context(), "My`Own`");
        assert_eq!(Symbol::new("Plus").context(), "System`");
    }

    #[test]
    fn display_strips_standard_contexts() {
        assert_eq!(Symbol::new("Plus").to_string(), "Plus");
        assert_eq!(Symbol::new("x").to_string(), "x");
        assert_eq!(Symbol::new("My`thing").to_string(), "My`thing");
    }

    #[test]
    fn constants_are_recognized() {
        assert!(Symbol::new("True").is_semantic_constant());
        assert!(Symbol::new("Null").is_semantic_constant());
        assert!(!Symbol::new("Plus").is_semantic_constant());
        assert!(!Symbol::new("x").is_semantic_constant());
    }

    #[test]
    fn ordering_is_by_full_name() {
        let mut syms = vec![Symbol::new("x"), Symbol::new("Plus"), Symbol::new("a")];
        syms.sort();
        let names: Vec<&str> = syms.iter().map(Symbol::name).collect();
        assert_eq!(names, vec!["Global`a", "Global`x", "System`Plus"]);
    }

    #[test]
    fn serde_round_trip_reinterns() {
        let s = Symbol::new("Orderless");
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, "\"System`Orderless\"");
        let back: Symbol = serde_json::from_str(&json).unwrap();
        assert!(back.ptr_eq(&s));
    }
}
