//! Per-request authentication, authorization and forwarding.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request};
use axum::http::header;
use axum::response::Response;
use tracing::{debug, warn};

use crate::auth::SessionManager;
use crate::authz::AuthzResolver;
use crate::proxy::audit::AuditRecord;
use crate::proxy::error::GatewayError;
use crate::proxy::upstream::{TrustHeaders, Upstream};
use crate::types::{CorrelationId, Identity};

/// Enforces the session and role decision in front of the backend.
///
/// Each request moves through:
///
/// ```text
/// RECEIVED -> AUTHENTICATING -> AUTH_FAILED (401)
///                            -> AUTHORIZING -> DENIED (403)
///                                           -> FORWARDING -> BACKEND_ERROR (502/504)
///                                                         -> RESPONDED
/// ```
///
/// Nothing is sent to the backend unless both checks pass.
pub struct ProxyGateway {
    sessions: Arc<SessionManager>,
    authz: Arc<AuthzResolver>,
    upstream: Upstream,
}

impl ProxyGateway {
    pub fn new(sessions: Arc<SessionManager>, authz: Arc<AuthzResolver>, upstream: Upstream) -> Self {
        Self {
            sessions,
            authz,
            upstream,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn authz(&self) -> &Arc<AuthzResolver> {
        &self.authz
    }

    pub fn upstream(&self) -> &Upstream {
        &self.upstream
    }

    /// Authenticate, authorize and forward one request.
    pub async fn forward(&self, request: Request) -> Result<Response, GatewayError> {
        let ipaddr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let (parts, body) = request.into_parts();

        let claims = self.sessions.validate_headers(&parts.headers).map_err(|e| {
            warn!(path = %parts.uri.path(), error = %e, "Authentication failed");
            GatewayError::Unauthenticated(e)
        })?;
        let identity: Identity = claims.identity;

        let Some(role) = self.authz.resolve(identity.as_str()).await else {
            warn!(identity = %identity, path = %parts.uri.path(), "Unauthorized user");
            return Err(GatewayError::Unauthorized(identity));
        };
        debug!(identity = %identity, role = %role.role_name(), "Identity resolved");

        let permitted_tags = role.tags().header_value();
        let request_id = CorrelationId::generate();

        AuditRecord {
            user: &identity,
            permitted_tags: &permitted_tags,
            path: parts.uri.path(),
            ipaddr,
            user_agent: parts
                .headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok()),
            request_id: &request_id,
        }
        .emit();

        self.upstream
            .forward(
                parts.method,
                &parts.uri,
                &parts.headers,
                body,
                TrustHeaders {
                    permitted_tags: &permitted_tags,
                    request_id: &request_id,
                },
            )
            .await
    }
}
