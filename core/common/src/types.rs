//! Identifiers and sensitive values used throughout the client.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Server ids arrive as JSON numbers today, but the client treats them as
/// opaque text so the wire format may change without touching callers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Text(String),
}

/// Id text plus the JSON form it is written back in.
///
/// Equality and hashing look at the text only.
#[derive(Debug, Clone)]
struct OpaqueId {
    text: String,
    numeric: bool,
}

impl OpaqueId {
    fn parse(text: String, what: &str) -> crate::Result<Self> {
        if text.trim().is_empty() {
            return Err(crate::Error::InvalidInput(format!(
                "{} id cannot be empty",
                what
            )));
        }
        // Only the canonical decimal form goes out as a number; "007" or "+5" stay text.
        let numeric = text
            .parse::<i64>()
            .map(|n| n.to_string() == text)
            .unwrap_or(false);
        Ok(Self { text, numeric })
    }
}

impl PartialEq for OpaqueId {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for OpaqueId {}

impl Hash for OpaqueId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl Serialize for OpaqueId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.text.parse::<i64>() {
            Ok(n) if self.numeric => serializer.serialize_i64(n),
            _ => serializer.serialize_str(&self.text),
        }
    }
}

impl<'de> Deserialize<'de> for OpaqueId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(n) => Self {
                text: n.to_string(),
                numeric: true,
            },
            RawId::Text(text) => Self {
                text,
                numeric: false,
            },
        })
    }
}

/// Server-assigned identifier of a vault item.
///
/// Written back in the JSON form it was read in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(OpaqueId);

impl ItemId {
    /// Create a new ItemId.
    ///
    /// # Errors
    /// - Returns error if id is empty
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        OpaqueId::parse(id.into(), "Item").map(Self)
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0.text
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.text)
    }
}

/// Identifier of the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(OpaqueId);

impl UserId {
    /// Create a new UserId.
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        OpaqueId::parse(id.into(), "User").map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0.text
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.text)
    }
}

/// Sensitive text (item passwords, session tokens) that zeroizes on drop.
///
/// `Debug` never prints the value.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    /// Wrap a sensitive value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// An empty secret ("leave unchanged" on update).
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Expose the value. Callers must not log it.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}
