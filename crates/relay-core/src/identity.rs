//! Identity value objects: nicknames and connection identifiers.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Nickname claimed by a chat client.
///
/// Chosen by the client as the first line after connecting. Nicknames are
/// compared case-sensitively and exactly; no format validation is applied,
/// so any string (including the empty string) is a valid nickname.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nickname(String);

impl Nickname {
    /// Creates a new Nickname from a string.
    pub fn new(nickname: impl Into<String>) -> Self {
        Self(nickname.into())
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the nickname, returning the owned string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Nickname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Nickname {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Nickname {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Nickname {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Nickname {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Identifier of one accepted connection.
///
/// Assigned from a monotonically increasing counter by the listener, so two
/// sessions that used the same nickname at different times stay distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a connection ID from its raw counter value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw counter value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}
