//! Immutable role/user/rule table.
//!
//! Users and rules refer to roles by index into `roles`, so a resolved
//! identity only needs a `usize` to reach its tag set.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use http::HeaderValue;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::authz::error::ConfigError;
use crate::types::{Identity, RoleName};

/// Tag that grants unrestricted access when listed in a role.
pub const WILDCARD_TAG: &str = "*";

/// On-disk shape of the authorization file.
#[derive(Debug, Deserialize)]
struct AuthzDocument {
    #[serde(default)]
    users: Vec<UserEntry>,
    #[serde(default)]
    roles: Vec<RoleEntry>,
    #[serde(default)]
    rules: Vec<RuleEntry>,
}

#[derive(Debug, Deserialize)]
struct UserEntry {
    user_id: String,
    role: String,
}

#[derive(Debug, Deserialize)]
struct RoleEntry {
    name: String,
    #[serde(default)]
    allowed_tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RuleEntry {
    user_regex: String,
    role: String,
}

/// The set of tags a role grants.
///
/// An empty set is a real answer (the role grants nothing), distinct from an
/// identity that resolves to no role at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PermittedTags(Vec<String>);

impl PermittedTags {
    pub fn new(tags: Vec<String>) -> Self {
        Self(tags)
    }

    pub fn tags(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    /// Whether the role explicitly lists the `*` tag.
    pub fn is_unrestricted(&self) -> bool {
        self.contains(WILDCARD_TAG)
    }

    /// Value sent to the backend: `*` for unrestricted roles, otherwise the
    /// comma-joined tags (empty for a role without tags).
    pub fn header_value(&self) -> String {
        if self.is_unrestricted() {
            WILDCARD_TAG.to_string()
        } else {
            self.0.join(",")
        }
    }
}

/// A named bundle of permitted tags.
#[derive(Debug, Clone)]
pub struct Role {
    pub name: RoleName,
    pub tags: PermittedTags,
}

/// Index of a role inside [`AuthzTable::roles`].
pub type RoleIdx = usize;

/// Ordered fallback rule: first pattern that matches wins.
#[derive(Debug)]
pub struct Rule {
    pub pattern: Regex,
    pub role: RoleIdx,
}

impl Rule {
    pub fn source(&self) -> &str {
        self.pattern.as_str()
    }
}

/// Validated authorization table. Never mutated after [`AuthzTable::parse`].
#[derive(Debug)]
pub struct AuthzTable {
    roles: Vec<Role>,
    users: HashMap<Identity, RoleIdx>,
    rules: Vec<Rule>,
}

impl AuthzTable {
    /// Read and validate a table from a JSON file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse(&raw)
    }

    /// Parse and validate a table from raw JSON.
    ///
    /// Checks run in a fixed order and the first violation wins: duplicate
    /// roles, duplicate users, user role references, rule role references,
    /// rule patterns, then role tags.
    pub fn parse(raw: &[u8]) -> Result<Self, ConfigError> {
        let doc: AuthzDocument =
            serde_json::from_slice(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut role_index: HashMap<String, RoleIdx> = HashMap::with_capacity(doc.roles.len());
        let mut roles = Vec::with_capacity(doc.roles.len());
        for entry in doc.roles {
            if role_index.contains_key(&entry.name) {
                return Err(ConfigError::DuplicateRole(entry.name));
            }
            role_index.insert(entry.name.clone(), roles.len());
            roles.push(Role {
                name: RoleName::new(entry.name),
                tags: PermittedTags::new(entry.allowed_tags),
            });
        }

        let mut seen_users = HashMap::with_capacity(doc.users.len());
        for entry in &doc.users {
            if seen_users.insert(entry.user_id.as_str(), ()).is_some() {
                return Err(ConfigError::DuplicateUser(entry.user_id.clone()));
            }
        }

        let mut users = HashMap::with_capacity(doc.users.len());
        for entry in doc.users {
            let Some(&idx) = role_index.get(&entry.role) else {
                return Err(ConfigError::UserRoleNotFound {
                    role: entry.role,
                    user: entry.user_id,
                });
            };
            users.insert(Identity::new(entry.user_id), idx);
        }

        let mut rule_roles = Vec::with_capacity(doc.rules.len());
        for entry in &doc.rules {
            let Some(&idx) = role_index.get(&entry.role) else {
                return Err(ConfigError::RuleRoleNotFound {
                    role: entry.role.clone(),
                    pattern: entry.user_regex.clone(),
                });
            };
            rule_roles.push(idx);
        }

        let mut rules = Vec::with_capacity(doc.rules.len());
        for (entry, role) in doc.rules.into_iter().zip(rule_roles) {
            let pattern = Regex::new(&entry.user_regex).map_err(|e| ConfigError::InvalidRegex {
                pattern: entry.user_regex.clone(),
                reason: e.to_string(),
            })?;
            rules.push(Rule { pattern, role });
        }

        // Tags travel comma-joined in a header value.
        for role in &roles {
            if let Some(tag) = role
                .tags
                .tags()
                .iter()
                .find(|tag| tag.contains(',') || HeaderValue::from_str(tag).is_err())
            {
                return Err(ConfigError::InvalidTag {
                    role: role.name.to_string(),
                    tag: tag.clone(),
                });
            }
        }

        Ok(Self {
            roles,
            users,
            rules,
        })
    }

    pub fn role(&self, idx: RoleIdx) -> &Role {
        &self.roles[idx]
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Explicit user records, identity to role index.
    pub fn users(&self) -> &HashMap<Identity, RoleIdx> {
        &self.users
    }

    /// First rule, in declaration order, whose pattern matches `identity`.
    pub fn match_rule(&self, identity: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.pattern.is_match(identity))
    }
}
