//! Dynamic field values for the test doubles.

use std::fmt;

use super::tracker::Atom;

/// A field value: plain data or an observable cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No value
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Number(i64),
    /// String
    Text(String),
    /// Observable cell owned by a [`Tracker`](super::Tracker)
    Observable(Atom),
}

impl Value {
    /// The text, if this is a string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The number, if this is an integer.
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The cell, if this is observable.
    pub fn as_atom(&self) -> Option<&Atom> {
        match self {
            Self::Observable(atom) => Some(atom),
            _ => None,
        }
    }

    /// Read through an observable cell; plain values are returned as-is.
    ///
    /// Reading a cell inside a tracked scope records it as a dependency.
    pub fn resolve(&self) -> Value {
        match self {
            Self::Observable(atom) => atom.get(),
            other => other.clone(),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(i64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Atom> for Value {
    fn from(atom: Atom) -> Self {
        Self::Observable(atom)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(text) => f.write_str(text),
            Self::Observable(atom) => write!(f, "{}", atom.get_untracked()),
        }
    }
}
