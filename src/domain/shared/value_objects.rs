//! Shared value objects used across the controller

use crate::domain::shared::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Call identifier
///
/// Never shown to the gateway; used locally to tell a call apart from the
/// one that replaced it while an operation was suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(Uuid);

impl CallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Negotiation session identifier handed out by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Short numeric identity naming a registrant (e.g. `1234`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Parse user input: exactly `length` ASCII digits
    pub fn parse(raw: &str, length: usize) -> Result<Self, DomainError> {
        if raw.len() != length {
            return Err(DomainError::InvalidIdentity(format!(
                "'{}' must be exactly {} digits",
                raw, length
            )));
        }

        if !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::InvalidIdentity(format!(
                "'{}' must contain digits only",
                raw
            )));
        }

        Ok(Self(raw.to_string()))
    }

    /// Identity reported by the gateway, taken as-is
    pub fn from_gateway(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_parse() {
        let identity = Identity::parse("1234", 4).unwrap();
        assert_eq!(identity.as_str(), "1234");
        assert_eq!(identity.to_string(), "1234");
    }

    #[test]
    fn test_identity_rejects_wrong_length() {
        assert!(matches!(
            Identity::parse("99", 4),
            Err(DomainError::InvalidIdentity(_))
        ));
        assert!(matches!(
            Identity::parse("12345", 4),
            Err(DomainError::InvalidIdentity(_))
        ));
        assert!(Identity::parse("", 4).is_err());
    }

    #[test]
    fn test_identity_rejects_non_digits() {
        assert!(Identity::parse("12a4", 4).is_err());
        assert!(Identity::parse("-123", 4).is_err());
        // multi-byte digits are not ASCII digits
        assert!(Identity::parse("١٢", 4).is_err());
    }

    #[test]
    fn test_identity_serializes_as_plain_string() {
        let identity = Identity::parse("5678", 4).unwrap();
        assert_eq!(serde_json::to_string(&identity).unwrap(), "\"5678\"");
    }
}
