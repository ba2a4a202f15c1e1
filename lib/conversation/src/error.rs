//! Error types for the conversation crate.
//!
//! [`SessionError`] describes why a session record could not be read or
//! written. The session manager logs these and reports them to callers as
//! an absent record or a `false` result; they never cross its API.

use std::fmt;

/// Errors from session persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A stored record could not be decoded.
    Corrupt { session_id: String, reason: String },
    /// A record could not be turned into its stored form.
    Serialization { session_id: String, reason: String },
    /// A patch tried to change a field the manager owns.
    ProtectedField { field: String },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupt { session_id, reason } => {
                write!(f, "stored session {session_id} is corrupt: {reason}")
            }
            Self::Serialization { session_id, reason } => {
                write!(f, "session {session_id} could not be serialized: {reason}")
            }
            Self::ProtectedField { field } => {
                write!(f, "session field '{field}' cannot be patched")
            }
        }
    }
}

impl std::error::Error for SessionError {}
