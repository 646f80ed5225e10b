//! Domain primitives: TimeMs, Address, AssetId.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Time in milliseconds since Unix epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TimeMs(pub i64);

impl TimeMs {
    /// Create a TimeMs from milliseconds.
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        TimeMs(chrono::Utc::now().timestamp_millis())
    }

    /// Get the underlying milliseconds value.
    pub fn as_ms(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for TimeMs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("address must not be empty")]
    Empty,
    #[error("address must not contain whitespace")]
    Whitespace,
}

/// Opaque participant / account identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Create an Address from a string without validation.
    pub fn new(addr: impl Into<String>) -> Self {
        Address(addr.into())
    }

    /// Get the address as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AddressParseError::Empty);
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(AddressParseError::Whitespace);
        }
        Ok(Address(trimmed.to_string()))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Asset identifier. The native asset is distinct from every fungible token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum AssetId {
    Native,
    Token(String),
}

impl AssetId {
    pub fn token(id: impl Into<String>) -> Self {
        AssetId::Token(id.into())
    }

    pub fn is_native(&self) -> bool {
        matches!(self, AssetId::Native)
    }
}

impl From<String> for AssetId {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("native") {
            AssetId::Native
        } else {
            AssetId::Token(trimmed.to_string())
        }
    }
}

impl From<AssetId> for String {
    fn from(value: AssetId) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetId::Native => write!(f, "native"),
            AssetId::Token(id) => write!(f, "{}", id),
        }
    }
}
