//! Property keys.
//!
//! A property key is either an interned-ish string, an array index, or a
//! symbol. Canonicalization (an integer-shaped string becomes an index key)
//! happens in the key constructor so shape tables only ever see one form.

use crate::SymbolId;
use std::fmt;

/// A canonical property key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// Named property.
    String(String),
    /// Array index property.
    Index(u32),
    /// Symbol-keyed property (also used for private names).
    Symbol(SymbolId),
}

impl PropertyKey {
    /// Creates a key from a string, canonicalizing array indices.
    ///
    /// `"0"`..`"4294967294"` become [`PropertyKey::Index`]; anything else,
    /// including `"-0"` and leading-zero forms, stays a string key.
    pub fn from_str_key(s: &str) -> Self {
        if let Ok(index) = s.parse::<u32>() {
            // Reject non-canonical spellings like "01".
            if index.to_string() == s && index != u32::MAX {
                return PropertyKey::Index(index);
            }
        }
        PropertyKey::String(s.to_string())
    }

    /// Creates an index key from a non-negative integer-valued double.
    pub fn from_f64(n: f64) -> Option<Self> {
        if n.fract() == 0.0 && n >= 0.0 && n < u32::MAX as f64 {
            Some(PropertyKey::Index(n as u32))
        } else {
            None
        }
    }

    /// Returns the index if this is an index key.
    pub fn as_index(&self) -> Option<u32> {
        match self {
            PropertyKey::Index(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::String(s) => write!(f, "{}", s),
            PropertyKey::Index(i) => write!(f, "{}", i),
            PropertyKey::Symbol(id) => write!(f, "{}", id),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        PropertyKey::from_str_key(s)
    }
}

impl From<u32> for PropertyKey {
    fn from(i: u32) -> Self {
        PropertyKey::Index(i)
    }
}
