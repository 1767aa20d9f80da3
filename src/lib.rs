// Core modules
pub mod api;
pub mod auth;
pub mod authz;
pub mod config;
pub mod proxy;
pub mod types;

// Re-export key types and functions
pub use api::{AppState, create_router};
pub use auth::{AuthError, SessionClaims, SessionManager};
pub use authz::{AuthzResolver, AuthzTable, ConfigError, PermittedTags};
pub use config::GatewayConfig;
pub use proxy::{GatewayError, ProxyGateway, Upstream, UpstreamConfig};
pub use types::{CorrelationId, Identity, RoleName};

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

/// Convenience function to build the fully wired gateway router.
///
/// This loads the authorization table, creates the session manager and the
/// backend client, and returns the router ready to be served. Any problem
/// with the table aborts startup.
pub fn create_app(config: &GatewayConfig) -> Result<axum::Router> {
    let authz = Arc::new(AuthzResolver::load_from_file(&config.authz_file)?);

    let sessions = Arc::new(SessionManager::new(
        config.jwt_secret.clone(),
        config::session_duration(config.session_hours)?,
        config.secure_cookie,
    ));

    let upstream = Upstream::new(UpstreamConfig {
        endpoint: config.endpoint.clone(),
        api_key: config.api_key.clone(),
        read_timeout: config.backend_timeout,
        connect_timeout: config.connect_timeout,
    })?;
    info!(endpoint = %upstream.endpoint(), "Backend client ready");

    let gateway = ProxyGateway::new(sessions, authz, upstream);
    Ok(create_router(AppState::new(
        Arc::new(gateway),
        config.hello_reply.as_str(),
    )))
}
