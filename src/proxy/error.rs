//! Per-request errors at the gateway boundary.

use std::fmt;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::auth::AuthError;
use crate::types::{CorrelationId, Identity};

/// Errors that end a request before (or instead of) a backend response.
///
/// Every variant becomes an HTTP status and a small JSON body; none of them
/// escape the request handler.
#[derive(Debug)]
pub enum GatewayError {
    /// The session is missing, malformed, tampered with or expired.
    Unauthenticated(AuthError),
    /// The identity resolves to no role.
    Unauthorized(Identity),
    /// The request itself could not be read.
    BadRequest(String),
    /// The request body exceeds the forwarding limit.
    PayloadTooLarge { limit: usize },
    /// The backend could not be reached or the exchange failed.
    BadGateway {
        request_id: CorrelationId,
        message: String,
    },
    /// The backend did not answer in time.
    GatewayTimeout {
        request_id: CorrelationId,
        message: String,
    },
    /// Unexpected failure inside the gateway.
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Unauthorized(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            Self::GatewayTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client. Details stay in the server log.
    fn public_message(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => "Authentication failed",
            Self::Unauthorized(_) => "Unauthorized user",
            Self::BadRequest(_) => "Invalid request",
            Self::PayloadTooLarge { .. } => "Request body too large",
            Self::BadGateway { .. } => "Backend request failed",
            Self::GatewayTimeout { .. } => "Backend request timed out",
            Self::Internal(_) => "Internal server error",
        }
    }

    fn request_id(&self) -> Option<&CorrelationId> {
        match self {
            Self::BadGateway { request_id, .. } | Self::GatewayTimeout { request_id, .. } => {
                Some(request_id)
            }
            _ => None,
        }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated(e) => write!(f, "Authentication failed: {}", e),
            Self::Unauthorized(id) => write!(f, "Unauthorized user: {}", id),
            Self::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            Self::PayloadTooLarge { limit } => {
                write!(f, "Request body exceeds {} bytes", limit)
            }
            Self::BadGateway {
                request_id,
                message,
            } => write!(f, "Backend request {} failed: {}", request_id, message),
            Self::GatewayTimeout {
                request_id,
                message,
            } => write!(f, "Backend request {} timed out: {}", request_id, message),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for GatewayError {}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let mut body = serde_json::json!({ "msg": self.public_message() });
        if let Some(request_id) = self.request_id() {
            body["request_id"] = serde_json::Value::String(request_id.to_string());
        }

        (self.status(), Json(body)).into_response()
    }
}
