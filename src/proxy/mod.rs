//! Forwarding to the search backend.
//!
//! [`ProxyGateway`] validates the caller's session, resolves the identity to
//! a role and forwards the request to the single configured backend. Three
//! headers are set on every forwarded call, replacing anything the client
//! sent under the same names:
//!
//! - `x-api-key`: the pre-shared backend key
//! - `x-permitted-tags`: the role's tags joined with `,`, or `*`
//! - `x-request-id`: a fresh UUID, also written to the audit log
//!
//! The backend's status, headers and body are streamed back unchanged.

mod audit;
mod error;
mod gateway;
mod upstream;

pub use audit::AuditRecord;
pub use error::GatewayError;
pub use gateway::ProxyGateway;
pub use upstream::{
    HEADER_API_KEY, HEADER_PERMITTED_TAGS, HEADER_REQUEST_ID, MAX_REQUEST_BODY_BYTES,
    TrustHeaders, Upstream, UpstreamConfig,
};
