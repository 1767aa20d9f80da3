//! Authorization: map an authenticated identity to the tags it may query.
//!
//! The table is loaded once at startup from JSON:
//!
//! ```json
//! {
//!   "users": [{"user_id": "alpha@example.com", "role": "blue"}],
//!   "roles": [{"name": "blue", "allowed_tags": ["spell.1"]}],
//!   "rules": [{"user_regex": "@example\\.com$", "role": "blue"}]
//! }
//! ```
//!
//! Resolution checks explicit user records first, then the rules in the
//! order they were declared. Identities matched by a rule are cached for the
//! life of the process. An identity with neither is denied.

mod error;
mod resolver;
mod table;

pub use error::ConfigError;
pub use resolver::{AuthzResolver, ResolvedRole};
pub use table::{AuthzTable, PermittedTags, Role, RoleIdx, Rule, WILDCARD_TAG};
