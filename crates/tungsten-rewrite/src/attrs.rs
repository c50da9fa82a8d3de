//! Symbol attributes controlling evaluation and matching.

use bitflags::bitflags;

bitflags! {
    /// Attribute bits of a symbol.
    ///
    /// `HOLD_ALL_COMPLETE` subsumes `HOLD_ALL`: it additionally suppresses
    /// sequence splicing, `Unevaluated` stripping and upvalue lookup.
    #[derive(Default)]
    pub struct Attributes: u32 {
        const LOCKED = 1 << 0;
        const PROTECTED = 1 << 1;
        const READ_PROTECTED = 1 << 2;
        const CONSTANT = 1 << 3;
        const FLAT = 1 << 4;
        const LISTABLE = 1 << 5;
        const NUMERIC_FUNCTION = 1 << 6;
        const ONE_IDENTITY = 1 << 7;
        const ORDERLESS = 1 << 8;
        const HOLD_FIRST = 1 << 9;
        const HOLD_REST = 1 << 10;
        const HOLD_ALL = 1 << 11;
        const HOLD_ALL_COMPLETE = (1 << 11) | (1 << 12);
        const NHOLD_FIRST = 1 << 13;
        const NHOLD_REST = 1 << 14;
        const NHOLD_ALL = 1 << 15;
        const SEQUENCE_HOLD = 1 << 16;
    }
}

/// Attribute names in the order `Attributes[f]` lists them.
const NAMED: &[(&str, Attributes)] = &[
    ("Constant", Attributes::CONSTANT),
    ("Flat", Attributes::FLAT),
    ("HoldAll", Attributes::HOLD_ALL),
    ("HoldAllComplete", Attributes::HOLD_ALL_COMPLETE),
    ("HoldFirst", Attributes::HOLD_FIRST),
    ("HoldRest", Attributes::HOLD_REST),
    ("Listable", Attributes::LISTABLE),
    ("Locked", Attributes::LOCKED),
    ("NHoldAll", Attributes::NHOLD_ALL),
    ("NHoldFirst", Attributes::NHOLD_FIRST),
    ("NHoldRest", Attributes::NHOLD_REST),
    ("NumericFunction", Attributes::NUMERIC_FUNCTION),
    ("OneIdentity", Attributes::ONE_IDENTITY),
    ("Orderless", Attributes::ORDERLESS),
    ("Protected", Attributes::PROTECTED),
    ("ReadProtected", Attributes::READ_PROTECTED),
    ("SequenceHold", Attributes::SEQUENCE_HOLD),
];

impl Attributes {
    /// Whether the element at `index` (0-based) is kept unevaluated.
    pub fn holds_position(self, index: usize) -> bool {
        if self.contains(Attributes::HOLD_ALL) {
            return true;
        }
        if index == 0 {
            self.contains(Attributes::HOLD_FIRST)
        } else {
            self.contains(Attributes::HOLD_REST)
        }
    }

    pub fn holds_all_complete(self) -> bool {
        self.contains(Attributes::HOLD_ALL_COMPLETE)
    }

    /// Look an attribute up by its short symbol name.
    pub fn from_name(name: &str) -> Option<Attributes> {
        NAMED
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, flag)| *flag)
    }

    /// Names of the set attributes, alphabetically. `HoldAllComplete`
    /// shadows its `HoldAll` component.
    pub fn names(self) -> Vec<&'static str> {
        let mut out = Vec::new();
        for (name, flag) in NAMED {
            if *flag == Attributes::HOLD_ALL && self.contains(Attributes::HOLD_ALL_COMPLETE) {
                continue;
            }
            if self.contains(*flag) {
                out.push(*name);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hold_positions() {
        assert!(Attributes::HOLD_FIRST.holds_position(0));
        assert!(!Attributes::HOLD_FIRST.holds_position(1));
        assert!(!Attributes::HOLD_REST.holds_position(0));
        assert!(Attributes::HOLD_REST.holds_position(2));
        assert!(Attributes::HOLD_ALL.holds_position(0));
        assert!(Attributes::HOLD_ALL_COMPLETE.holds_position(5));
        assert!(!Attributes::empty().holds_position(0));
    }

    #[test]
    fn complete_hold_implies_hold_all() {
        assert!(Attributes::HOLD_ALL_COMPLETE.contains(Attributes::HOLD_ALL));
        assert!(!Attributes::HOLD_ALL.holds_all_complete());
        assert!(Attributes::HOLD_ALL_COMPLETE.holds_all_complete());
    }

    #[test]
    fn name_round_trip() {
        for (name, flag) in NAMED {
            assert_eq!(Attributes::from_name(name), Some(*flag));
        }
        assert_eq!(Attributes::from_name("Sideways"), None);
    }

    #[test]
    fn names_listing() {
        let attrs = Attributes::ORDERLESS | Attributes::FLAT | Attributes::PROTECTED;
        assert_eq!(attrs.names(), vec!["Flat", "Orderless", "Protected"]);
        assert_eq!(
            Attributes::HOLD_ALL_COMPLETE.names(),
            vec!["HoldAllComplete"]
        );
        assert_eq!(Attributes::HOLD_ALL.names(), vec!["HoldAll"]);
    }
}
