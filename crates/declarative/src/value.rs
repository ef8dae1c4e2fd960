//! The null/unknown/known value lattice
//!
//! Every node in a snapshot tree is wrapped in a [`Value`]: it is either
//! explicitly `Null`, `Unknown` until the external system resolves it, or
//! `Known` with a payload. Scalars use [`Scalar`] as payload; objects and
//! collections use their child lists.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Three-way value lattice
#[derive(Debug, Clone, PartialEq)]
pub enum Value<T = Scalar> {
    /// Explicitly absent
    Null,
    /// Not known until after the change is applied
    Unknown,
    /// Resolved payload
    Known(T),
}

impl<T> Value<T> {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// Null or unknown: nothing to reconcile against
    pub fn is_unresolved(&self) -> bool {
        !self.is_known()
    }

    /// Borrow the known payload
    pub fn known(&self) -> Option<&T> {
        match self {
            Self::Known(v) => Some(v),
            Self::Null | Self::Unknown => None,
        }
    }

    /// Borrow the payload, keeping the lattice tag
    pub fn as_ref(&self) -> Value<&T> {
        match self {
            Self::Null => Value::Null,
            Self::Unknown => Value::Unknown,
            Self::Known(v) => Value::Known(v),
        }
    }

    /// Map the known payload
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Value<U> {
        match self {
            Self::Null => Value::Null,
            Self::Unknown => Value::Unknown,
            Self::Known(v) => Value::Known(f(v)),
        }
    }

    /// Name of the lattice tag, for diagnostics
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Unknown => "unknown",
            Self::Known(_) => "known",
        }
    }
}

/// Kind of a scalar field as declared by the schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    String,
    Bool,
    Number,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::Number => "number",
        };
        f.write_str(name)
    }
}

/// Known scalar payload
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Bool(bool),
    Number(f64),
}

impl Scalar {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Self::String(_) => ScalarKind::String,
            Self::Bool(_) => ScalarKind::Bool,
            Self::Number(_) => ScalarKind::Number,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Empty string counts as "no value" for presence checks
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::String(s) if s.is_empty())
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl Value<Scalar> {
    /// Known string shortcut
    pub fn string(s: impl Into<String>) -> Self {
        Self::Known(Scalar::String(s.into()))
    }

    /// Known bool shortcut
    pub fn bool(b: bool) -> Self {
        Self::Known(Scalar::Bool(b))
    }

    /// Known number shortcut
    pub fn number(n: f64) -> Self {
        Self::Known(Scalar::Number(n))
    }

    /// Known and not the empty string
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Known(s) if !s.is_empty())
    }

    pub fn as_str(&self) -> Option<&str> {
        self.known().and_then(Scalar::as_str)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.known().and_then(Scalar::as_bool)
    }
}
