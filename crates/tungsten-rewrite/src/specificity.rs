//! Pattern specificity ordering.
//!
//! Rule lists keep their patterns sorted so that more specific patterns are
//! tried first. [`pattern_cmp`] realizes that order: `Less` means "tried
//! earlier". Literals precede blanks, head-restricted blanks precede bare
//! ones, single blanks precede sequence blanks, and among structured
//! patterns a longer argument list counts as more specific.

use std::cmp::Ordering;

use tungsten_core::Value;

/// Specificity key of one pattern node. Keys compare slot by slot; `head`
/// and `elements` recurse into [`pattern_cmp`].
struct PatKey<'a> {
    /// 0 for atoms, 2 for structured patterns, 3 for malformed constructs.
    class: u8,
    /// Pattern family inside a class: 0 for ordinary expressions, 1..=3 for
    /// the blank family (+10 with a head restriction, +20 without), 1 also
    /// marks an empty `Alternatives`.
    family: u8,
    /// Drops to 0 under `PatternTest`.
    test: u8,
    /// Drops to 0 when the pattern is named.
    named: u8,
    /// Rises to 1 under `Optional`.
    optional: u8,
    head: Option<&'a Value>,
    elements: Option<&'a [Value]>,
    /// Ordinary expressions append a virtual element ranking above every
    /// real pattern, so longer argument lists sort first.
    closing_mark: bool,
    /// Drops to 0 under `Condition`, compared last.
    condition: u8,
}

const ATOM_KEY: PatKey<'static> = PatKey {
    class: 0,
    family: 0,
    test: 1,
    named: 1,
    optional: 0,
    head: None,
    elements: None,
    closing_mark: false,
    condition: 1,
};

fn malformed_key<'a>(head: &'a Value, elements: &'a [Value]) -> PatKey<'a> {
    PatKey {
        class: 3,
        family: 0,
        test: 0,
        named: 0,
        optional: 0,
        head: Some(head),
        elements: Some(elements),
        closing_mark: false,
        condition: 1,
    }
}

fn pat_key(v: &Value) -> PatKey<'_> {
    let node = match v {
        Value::Expr(node) => node,
        _ => return ATOM_KEY,
    };
    let head_name = match node.head.as_symbol() {
        Some(s) => s.name(),
        None => return general_key(v),
    };
    let n = node.elements.len();
    match head_name {
        "System`Blank" | "System`BlankSequence" | "System`BlankNullSequence" => {
            if n > 1 {
                return malformed_key(&node.head, &node.elements);
            }
            let base = match head_name {
                "System`Blank" => 1,
                "System`BlankSequence" => 2,
                _ => 3,
            };
            PatKey {
                class: 2,
                family: base + if n == 1 { 10 } else { 20 },
                test: 1,
                named: 1,
                optional: 0,
                head: Some(&node.head),
                elements: Some(&node.elements),
                closing_mark: false,
                condition: 1,
            }
        }
        "System`PatternTest" if n == 2 => {
            let mut key = pat_key(&node.elements[0]);
            key.test = 0;
            key
        }
        "System`Condition" if n == 2 => {
            let mut key = pat_key(&node.elements[0]);
            key.condition = 0;
            key
        }
        "System`Pattern" if n == 2 => {
            let mut key = pat_key(&node.elements[1]);
            key.named = 0;
            key
        }
        "System`Optional" if n == 1 || n == 2 => {
            let mut key = pat_key(&node.elements[0]);
            key.optional = 1;
            key
        }
        "System`Verbatim" | "System`HoldPattern" if n == 1 => pat_key(&node.elements[0]),
        "System`Alternatives" => {
            if node.elements.is_empty() {
                return PatKey {
                    class: 2,
                    family: 1,
                    test: 0,
                    named: 0,
                    optional: 0,
                    head: None,
                    elements: None,
                    closing_mark: false,
                    condition: 0,
                };
            }
            // an alternative is as specific as its most specific branch
            let mut best = &node.elements[0];
            for branch in &node.elements[1..] {
                if pattern_cmp(branch, best) == Ordering::Less {
                    best = branch;
                }
            }
            pat_key(best)
        }
        _ => general_key(v),
    }
}

fn general_key(v: &Value) -> PatKey<'_> {
    let node = match v {
        Value::Expr(node) => node,
        _ => return ATOM_KEY,
    };
    PatKey {
        class: 2,
        family: 0,
        test: 1,
        named: 1,
        optional: 0,
        head: Some(&node.head),
        elements: Some(&node.elements),
        closing_mark: true,
        condition: 1,
    }
}

/// Item of the virtual element stream a key compares with.
enum StreamItem<'a> {
    Pattern(&'a Value),
    ClosingMark,
    End,
}

fn stream_item<'a>(elements: Option<&'a [Value]>, mark: bool, index: usize) -> StreamItem<'a> {
    let items = elements.unwrap_or(&[]);
    if index < items.len() {
        StreamItem::Pattern(&items[index])
    } else if mark && index == items.len() {
        StreamItem::ClosingMark
    } else {
        StreamItem::End
    }
}

fn elements_cmp(a: &PatKey<'_>, b: &PatKey<'_>) -> Ordering {
    let mut index = 0;
    loop {
        let left = stream_item(a.elements, a.closing_mark, index);
        let right = stream_item(b.elements, b.closing_mark, index);
        match (left, right) {
            (StreamItem::End, StreamItem::End) => return Ordering::Equal,
            (StreamItem::End, _) => return Ordering::Less,
            (_, StreamItem::End) => return Ordering::Greater,
            (StreamItem::ClosingMark, StreamItem::ClosingMark) => {}
            (StreamItem::ClosingMark, StreamItem::Pattern(_)) => return Ordering::Greater,
            (StreamItem::Pattern(_), StreamItem::ClosingMark) => return Ordering::Less,
            (StreamItem::Pattern(x), StreamItem::Pattern(y)) => match pattern_cmp(x, y) {
                Ordering::Equal => {}
                other => return other,
            },
        }
        index += 1;
    }
}

/// Compare two patterns by specificity; `Less` sorts first.
pub fn pattern_cmp(a: &Value, b: &Value) -> Ordering {
    let ka = pat_key(a);
    let kb = pat_key(b);
    (ka.class, ka.family, ka.test, ka.named, ka.optional)
        .cmp(&(kb.class, kb.family, kb.test, kb.named, kb.optional))
        .then_with(|| match (ka.head, kb.head) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => pattern_cmp(x, y),
        })
        .then_with(|| elements_cmp(&ka, &kb))
        .then_with(|| ka.condition.cmp(&kb.condition))
}
