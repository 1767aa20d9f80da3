//! Session authentication.
//!
//! The gateway never talks to the identity provider itself. Whatever
//! completes the login (an OAuth2 code exchange, an operator minting a token
//! with `issue-token`) hands a verified identity to
//! [`SessionManager::issue`], and the resulting token is stored in an
//! HTTP-only cookie.
//!
//! ## Security Model
//!
//! - Tokens are HS256 JWTs signed with a process-wide secret
//! - The signature is checked before any claim is trusted
//! - Expiry is strict: a token is rejected once `now > expires_at`
//! - Nothing about a session is stored server-side
//!
//! ## Usage
//!
//! ```ignore
//! let token = sessions.issue(Identity::new("alpha@example.com"), None)?;
//! let set_cookie = sessions.session_cookie(&token)?;
//!
//! // later, per request
//! let claims = sessions.validate_headers(request.headers())?;
//! ```

mod claims;
mod cookie;
mod error;
mod session;

pub use claims::SessionClaims;
pub use cookie::{SESSION_COOKIE_NAME, token_from_headers};
pub use error::{AuthError, SessionError};
pub use session::{DEFAULT_SESSION_HOURS, SessionManager, generate_secret};
