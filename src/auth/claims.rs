//! Claims carried inside a session token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::error::AuthError;
use crate::types::Identity;

/// Payload of a signed session token.
///
/// The token is the only record of a session; nothing is kept server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Verified identity of the caller
    #[serde(rename = "user")]
    pub identity: Identity,
    /// Instant after which the token is rejected
    pub expires_at: DateTime<Utc>,
    /// Optional picture URL from the identity provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl SessionClaims {
    pub fn new(identity: Identity, expires_at: DateTime<Utc>, image: Option<String>) -> Self {
        Self {
            identity,
            expires_at,
            image,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Loosely typed claims as they come off the wire, checked field by field
/// so the error names the offending field.
#[derive(Debug, Deserialize)]
pub(crate) struct RawClaims {
    user: Option<Value>,
    expires_at: Option<Value>,
    image: Option<Value>,
}

impl TryFrom<RawClaims> for SessionClaims {
    type Error = AuthError;

    fn try_from(raw: RawClaims) -> Result<Self, Self::Error> {
        let identity = match raw.user {
            Some(Value::String(user)) if !user.is_empty() => Identity::new(user),
            Some(Value::String(_)) => return Err(malformed("'user' field is empty")),
            Some(_) => return Err(malformed("'user' field is not a string")),
            None => return Err(malformed("missing 'user' field in token")),
        };

        let expires_at = match raw.expires_at {
            Some(Value::String(value)) => DateTime::parse_from_rfc3339(&value)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    malformed(&format!(
                        "fail to parse 'expires_at' field properly: {}: {}",
                        value, e
                    ))
                })?,
            Some(_) => return Err(malformed("'expires_at' field is not a string")),
            None => return Err(malformed("missing 'expires_at' field in token")),
        };

        let image = match raw.image {
            Some(Value::String(image)) => Some(image),
            Some(Value::Null) | None => None,
            Some(_) => return Err(malformed("'image' field is not a string")),
        };

        Ok(SessionClaims {
            identity,
            expires_at,
            image,
        })
    }
}

fn malformed(msg: &str) -> AuthError {
    AuthError::Malformed(msg.to_string())
}
