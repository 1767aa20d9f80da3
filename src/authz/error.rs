//! Load-time errors for the authorization table.
//!
//! The `Display` strings are stable: operators grep for them and the
//! `check-authz` command prints them verbatim.

use std::fmt;

/// Errors raised while loading an authorization table.
///
/// Any of these aborts the whole load; a partially validated table is never
/// handed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The file could not be read.
    Io { path: String, message: String },
    /// The document is not valid JSON or has the wrong shape.
    Parse(String),
    /// Two roles share a name.
    DuplicateRole(String),
    /// Two user records share an identity.
    DuplicateUser(String),
    /// A user record references a role that does not exist.
    UserRoleNotFound { role: String, user: String },
    /// A rule references a role that does not exist.
    RuleRoleNotFound { role: String, pattern: String },
    /// A rule pattern does not compile.
    InvalidRegex { pattern: String, reason: String },
    /// A role tag cannot be carried in the permitted-tags header.
    InvalidTag { role: String, tag: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, message } => {
                write!(f, "Fail to load authz file: {}: {}", path, message)
            }
            Self::Parse(msg) => write!(f, "Fail to parse authz data json: {}", msg),
            Self::DuplicateRole(name) => write!(f, "Role '{}' is duplicated", name),
            Self::DuplicateUser(id) => write!(f, "User '{}' is duplicated", id),
            Self::UserRoleNotFound { role, user } => {
                write!(f, "Role '{}' of User '{}' is not found", role, user)
            }
            Self::RuleRoleNotFound { role, pattern } => {
                write!(f, "Role '{}' of Rule '{}' is not found", role, pattern)
            }
            Self::InvalidRegex { pattern, .. } => {
                write!(f, "Fail to compile regex of a rule: {}", pattern)
            }
            Self::InvalidTag { role, tag } => {
                write!(f, "Tag {:?} of Role '{}' is invalid", tag, role)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
