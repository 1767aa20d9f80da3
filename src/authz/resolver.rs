//! Identity to permitted-tag resolution with a lazily extended cache.

use std::collections::HashMap;
use std::path::Path;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::authz::error::ConfigError;
use crate::authz::table::{AuthzTable, PermittedTags, Role, RoleIdx};
use crate::types::{Identity, RoleName};

/// Outcome of a successful resolution, borrowed from the immutable table.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedRole<'a> {
    role: &'a Role,
}

impl<'a> ResolvedRole<'a> {
    pub fn role_name(&self) -> &'a RoleName {
        &self.role.name
    }

    pub fn tags(&self) -> &'a PermittedTags {
        &self.role.tags
    }
}

/// Resolves identities against an [`AuthzTable`].
///
/// The table is read without locking. Identities that matched a rule are
/// remembered in `resolved`, which is seeded from the explicit user records
/// and only ever grows.
#[derive(Debug)]
pub struct AuthzResolver {
    table: AuthzTable,
    resolved: RwLock<HashMap<Identity, RoleIdx>>,
}

impl AuthzResolver {
    pub fn new(table: AuthzTable) -> Self {
        let resolved = table.users().clone();

        info!(
            roles = table.roles().len(),
            users = table.users().len(),
            rules = table.rules().len(),
            "Read authorization table"
        );

        Self {
            table,
            resolved: RwLock::new(resolved),
        }
    }

    /// Parse raw JSON and build a resolver.
    pub fn load(raw: &[u8]) -> Result<Self, ConfigError> {
        AuthzTable::parse(raw).map(Self::new)
    }

    /// Load a resolver from a JSON file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        AuthzTable::load_from_file(path).map(Self::new)
    }

    pub fn table(&self) -> &AuthzTable {
        &self.table
    }

    /// Resolve `identity` to its role.
    ///
    /// Returns `None` when there is no user record and no rule matches; the
    /// caller must treat that as a denial.
    pub async fn resolve(&self, identity: &str) -> Option<ResolvedRole<'_>> {
        let cached = self.resolved.read().await.get(identity).copied();
        if let Some(idx) = cached {
            return Some(self.resolved_role(idx));
        }

        let rule = self.table.match_rule(identity)?;

        // Another task may have resolved the same identity in the meantime;
        // whichever insert lands first is kept, and both agree anyway.
        let idx = *self
            .resolved
            .write()
            .await
            .entry(Identity::new(identity))
            .or_insert(rule.role);

        debug!(
            identity = %identity,
            rule = %rule.source(),
            role = %self.table.role(idx).name,
            "Resolved identity by rule"
        );

        Some(self.resolved_role(idx))
    }

    /// Number of identities currently known to the cache, user records
    /// included.
    pub async fn cached_identities(&self) -> usize {
        self.resolved.read().await.len()
    }

    fn resolved_role(&self, idx: RoleIdx) -> ResolvedRole<'_> {
        ResolvedRole {
            role: self.table.role(idx),
        }
    }
}
