//! Logical data model: values, directions, and quads.
//!
//! Values are immutable terms with a total string ordering; quads are
//! ordered 4-tuples of values indexed by [`Direction`].

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A logical graph term.
///
/// `Int` exists so that synthetic results (such as the output of a count
/// or a recursion depth) can be carried as first-class values.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Value {
    /// An IRI node.
    Iri(String),
    /// A blank node with a local name.
    Bnode(String),
    /// A plain string literal.
    Str(String),
    /// A language-tagged string literal.
    LangStr {
        /// Literal content.
        value: String,
        /// BCP 47 language tag.
        lang: String,
    },
    /// A typed literal.
    Typed {
        /// Literal content.
        value: String,
        /// Datatype IRI.
        datatype: String,
    },
    /// A signed integer.
    Int(i64),
    /// A raw byte sequence.
    Bytes(Vec<u8>),
}

impl Value {
    /// Shorthand for an IRI value.
    pub fn iri(s: impl Into<String>) -> Self {
        Value::Iri(s.into())
    }

    /// Shorthand for a plain string literal.
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Whether this value names a node (IRI or blank node) rather than
    /// carrying literal content.
    pub fn is_node_ref(&self) -> bool {
        matches!(self, Value::Iri(_) | Value::Bnode(_))
    }

    /// The literal content used by string filters, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::LangStr { value, .. } | Value::Typed { value, .. } => Some(value),
            Value::Iri(s) | Value::Bnode(s) => Some(s),
            _ => None,
        }
    }

    /// Ordering used by comparison filters.
    ///
    /// Integers compare numerically; textual kinds compare lexically on
    /// their content. Values of different kinds do not compare, and a
    /// filter over them fails.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (a, b) if a.kind() == b.kind() => Some(a.text()?.cmp(b.text()?)),
            _ => None,
        }
    }

    fn kind(&self) -> u8 {
        match self {
            Value::Iri(_) => 0,
            Value::Bnode(_) => 1,
            Value::Str(_) => 2,
            Value::LangStr { .. } => 3,
            Value::Typed { .. } => 4,
            Value::Int(_) => 5,
            Value::Bytes(_) => 6,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Iri(s) => write!(f, "<{s}>"),
            Value::Bnode(s) => write!(f, "_:{s}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::LangStr { value, lang } => write!(f, "{value:?}@{lang}"),
            Value::Typed { value, datatype } => write!(f, "{value:?}^^<{datatype}>"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Bytes(b) => write!(f, "0x{}", hex(b)),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Iri(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Iri(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

/// One of the four quad positions, plus a pre-binding placeholder.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Direction {
    /// No position chosen yet. Forbidden in any executable tree.
    #[default]
    Any,
    Subject,
    Predicate,
    Object,
    Label,
}

impl Direction {
    /// The four real quad positions, in storage order.
    pub const POSITIONS: [Direction; 4] = [
        Direction::Subject,
        Direction::Predicate,
        Direction::Object,
        Direction::Label,
    ];
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Any => "any",
            Direction::Subject => "subject",
            Direction::Predicate => "predicate",
            Direction::Object => "object",
            Direction::Label => "label",
        };
        f.write_str(name)
    }
}

/// An ordered (subject, predicate, object, label) statement.
///
/// The label is optional; an unlabeled quad has no value at
/// [`Direction::Label`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quad {
    pub subject: Value,
    pub predicate: Value,
    pub object: Value,
    pub label: Option<Value>,
}

impl Quad {
    /// Builds an unlabeled quad.
    pub fn new(subject: impl Into<Value>, predicate: impl Into<Value>, object: impl Into<Value>) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            label: None,
        }
    }

    /// Attaches a label to the quad.
    pub fn with_label(mut self, label: impl Into<Value>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The value at a direction, if present.
    pub fn get(&self, d: Direction) -> Option<&Value> {
        match d {
            Direction::Subject => Some(&self.subject),
            Direction::Predicate => Some(&self.predicate),
            Direction::Object => Some(&self.object),
            Direction::Label => self.label.as_ref(),
            Direction::Any => None,
        }
    }
}

impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)?;
        if let Some(label) = &self.label {
            write!(f, " {label}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_is_per_kind() {
        assert_eq!(Value::Int(1).compare(&Value::Int(2)), Some(Ordering::Less));
        assert_eq!(
            Value::str("a").compare(&Value::str("b")),
            Some(Ordering::Less)
        );
        assert_eq!(Value::str("a").compare(&Value::Int(1)), None);
        assert_eq!(Value::iri("a").compare(&Value::str("a")), None);
    }

    #[test]
    fn quad_direction_access() {
        let q = Quad::new("s", "p", "o").with_label("l");
        assert_eq!(q.get(Direction::Subject), Some(&Value::iri("s")));
        assert_eq!(q.get(Direction::Label), Some(&Value::iri("l")));
        assert_eq!(Quad::new("s", "p", "o").get(Direction::Label), None);
        assert_eq!(q.get(Direction::Any), None);
    }

    #[test]
    fn value_serde_round_trip() {
        let v = Value::LangStr {
            value: "bonjour".into(),
            lang: "fr".into(),
        };
        let s = serde_json::to_string(&v).unwrap();
        assert_eq!(serde_json::from_str::<Value>(&s).unwrap(), v);
    }
}
