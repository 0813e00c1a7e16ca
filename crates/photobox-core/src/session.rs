//! Session identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix used for hub-assigned session IDs.
pub const SESSION_ID_PREFIX: &str = "client-";

/// Unique identifier for one connected client.
///
/// Assigned by the hub from its connection counter (e.g., "client-7").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new SessionId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates the ID for the n-th accepted connection.
    pub fn from_connection(connection_number: u64) -> Self {
        Self::new(format!("{SESSION_ID_PREFIX}{connection_number}"))
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_from_connection() {
        let id = SessionId::from_connection(7);
        assert_eq!(id.as_str(), "client-7");
        assert_eq!(format!("{id}"), "client-7");
    }

    #[test]
    fn test_session_id_equality() {
        assert_eq!(SessionId::from("client-1"), SessionId::from_connection(1));
        assert_eq!(SessionId::new("client-1"), SessionId::from(String::from("client-1")));
        assert_ne!(SessionId::from_connection(1), SessionId::from_connection(2));
    }
}
