//! # Session identity.
//!
//! A [`SessionIdentity`] names **who** a channel talks about (the
//! [`Subject`]: role + id) and carries the bearer token the relay
//! authenticates. It is immutable and shared by `Arc`; a different identity
//! means a new channel.

use std::fmt;

use secrecy::SecretString;

/// Kind of subject a tracking stream belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// A technician travelling to a job.
    Technician,
    /// A client sharing their location with the assigned technician.
    Client,
}

impl Role {
    /// Lowercase role name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Technician => "technician",
            Role::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked subject: `(role, id)`.
///
/// Displays as `"<role>/<id>"`, the form used in event `subject` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subject {
    /// Subject kind.
    pub role: Role,
    /// Backend identifier of the technician or client.
    pub id: u64,
}

impl Subject {
    /// Creates a subject.
    pub const fn new(role: Role, id: u64) -> Self {
        Self { role, id }
    }

    /// Shorthand for a technician subject.
    pub const fn technician(id: u64) -> Self {
        Self::new(Role::Technician, id)
    }

    /// Shorthand for a client subject.
    pub const fn client(id: u64) -> Self {
        Self::new(Role::Client, id)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.role, self.id)
    }
}

/// Immutable identity of one channel.
///
/// `Debug` never prints the token.
#[derive(Debug)]
pub struct SessionIdentity {
    subject: Subject,
    token: SecretString,
}

impl SessionIdentity {
    /// Creates an identity for `subject` authenticated by `token`.
    pub fn new(subject: Subject, token: impl Into<String>) -> Self {
        Self {
            subject,
            token: SecretString::from(token.into()),
        }
    }

    /// The subject this identity streams.
    #[inline]
    pub fn subject(&self) -> Subject {
        self.subject
    }

    /// Bearer token for the relay handshake.
    #[inline]
    pub fn token(&self) -> &SecretString {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_display() {
        assert_eq!(Subject::technician(42).to_string(), "technician/42");
        assert_eq!(Subject::client(7).to_string(), "client/7");
    }

    #[test]
    fn debug_hides_token() {
        let id = SessionIdentity::new(Subject::client(1), "very-secret-token");
        let dbg = format!("{id:?}");
        assert!(!dbg.contains("very-secret-token"), "{dbg}");
        assert!(dbg.contains("Client"));
    }
}
