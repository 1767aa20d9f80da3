//! Session authentication errors.

use std::fmt;

use chrono::{DateTime, Utc};

/// Reasons a session token is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No session cookie was presented.
    NoSession,
    /// The token cannot be parsed, declares an unexpected algorithm, or its
    /// claims are missing or malformed.
    Malformed(String),
    /// The signature does not match the token contents.
    InvalidSignature,
    /// The token was valid but its expiry has passed.
    Expired(DateTime<Utc>),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSession => write!(f, "No session"),
            Self::Malformed(msg) => write!(f, "Malformed token: {}", msg),
            Self::InvalidSignature => write!(f, "Invalid token signature"),
            Self::Expired(at) => write!(f, "Token is already expired: {}", at.to_rfc3339()),
        }
    }
}

impl std::error::Error for AuthError {}

/// Failures while minting a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The claims could not be signed.
    Signing(String),
    /// The signed token could not be written into a cookie. The token itself
    /// is still valid.
    Cookie(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signing(msg) => write!(f, "Fail to sign session token: {}", msg),
            Self::Cookie(msg) => write!(f, "Fail to save session cookie: {}", msg),
        }
    }
}

impl std::error::Error for SessionError {}
