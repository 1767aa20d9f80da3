//! NewType wrappers for the gateway's string identifiers.
//!
//! These keep an identity from being passed where a role name or a
//! correlation id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// String newtype usable as a `HashMap` key looked up by `&str`.
macro_rules! string_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        // Lets the resolver cache be queried with a borrowed identity.
        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Verified caller identity, usually an email address.
    ///
    /// It is carried inside the signed session token and is the key the
    /// authorization table resolves against.
    Identity
);

string_id!(
    /// Name of a role in the authorization table.
    RoleName
);

string_id!(
    /// Per-request identifier forwarded to the backend for audit correlation.
    CorrelationId
);

impl CorrelationId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_identity_borrow_lookup() {
        let mut map = HashMap::new();
        map.insert(Identity::new("alpha@example.com"), 1);

        assert_eq!(map.get("alpha@example.com"), Some(&1));
        assert_eq!(map.get("bravo@example.com"), None);
    }

    #[test]
    fn test_identity_serde_transparent() {
        let id = Identity::new("alpha@example.com");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"alpha@example.com\"");

        let back: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_correlation_id_is_unique() {
        let a = CorrelationId::generate();
        let b = CorrelationId::generate();
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(a.as_str()).is_ok());
    }
}
