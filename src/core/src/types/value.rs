//! Typed attribute values

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker for values that are present but carry no content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyKind {
    /// The source returned a null
    NullValue,
    /// The source returned a zero-length string or byte array
    ZeroLengthValue,
}

/// A single value of an [`IdPAttribute`](super::IdPAttribute)
///
/// Values are ordered and hashable so that filtering can operate on value sets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    /// Plain string
    String(String),

    /// Value qualified by a security domain, e.g. `user@example.org`
    Scoped {
        /// Local part
        value: String,
        /// Scope (security domain)
        scope: String,
    },

    /// Raw bytes
    Bytes(Vec<u8>),

    /// Serialized XML object. Parsing belongs to the protocol codecs.
    Xml(String),

    /// Present but empty
    Empty(EmptyKind),

    /// Deployment specific value type
    Custom {
        /// Value type name
        type_name: String,
        /// Opaque string form
        value: String,
    },
}

impl AttributeValue {
    /// Create a string value
    pub fn string(value: impl Into<String>) -> Self {
        AttributeValue::String(value.into())
    }

    /// Create a scoped string value
    pub fn scoped(value: impl Into<String>, scope: impl Into<String>) -> Self {
        AttributeValue::Scoped {
            value: value.into(),
            scope: scope.into(),
        }
    }

    /// Create a byte array value
    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        AttributeValue::Bytes(value.into())
    }

    /// Create an XML value from its serialized form
    pub fn xml(value: impl Into<String>) -> Self {
        AttributeValue::Xml(value.into())
    }

    /// String content for string-like values (`String` and the local part
    /// of `Scoped`). Other value types have no string form for matching.
    pub fn string_value(&self) -> Option<&str> {
        match self {
            AttributeValue::String(value) => Some(value),
            AttributeValue::Scoped { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Scope of a scoped value
    pub fn scope(&self) -> Option<&str> {
        match self {
            AttributeValue::Scoped { scope, .. } => Some(scope),
            _ => None,
        }
    }

    /// Whether this is an [`AttributeValue::Empty`] marker
    pub fn is_empty_marker(&self) -> bool {
        matches!(self, AttributeValue::Empty(_))
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(value) => write!(f, "{}", value),
            AttributeValue::Scoped { value, scope } => write!(f, "{}@{}", value, scope),
            AttributeValue::Bytes(bytes) => write!(f, "{}", STANDARD.encode(bytes)),
            AttributeValue::Xml(xml) => write!(f, "{}", xml),
            AttributeValue::Empty(_) => Ok(()),
            AttributeValue::Custom { value, .. } => write!(f, "{}", value),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}
