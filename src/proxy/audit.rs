//! Audit trail for forwarded requests.

use std::net::IpAddr;

use serde::Serialize;
use tracing::info;

use crate::types::{CorrelationId, Identity};

/// One forwarded request, as recorded before the backend is called.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord<'a> {
    pub user: &'a Identity,
    pub permitted_tags: &'a str,
    pub path: &'a str,
    pub ipaddr: Option<IpAddr>,
    pub user_agent: Option<&'a str>,
    pub request_id: &'a CorrelationId,
}

impl AuditRecord<'_> {
    /// Emit the record on the `audit` target. Never fails the request.
    pub fn emit(&self) {
        info!(
            target: "audit",
            user = %self.user,
            permitted_tags = %self.permitted_tags,
            path = %self.path,
            ipaddr = ?self.ipaddr,
            user_agent = self.user_agent.unwrap_or(""),
            request_id = %self.request_id,
            "Audit log"
        );
    }
}
