//! Stateless session tokens.
//!
//! A session is an HS256-signed JWT holding [`SessionClaims`], stored in an
//! HTTP-only cookie. Validation verifies the HMAC over the raw
//! `header.payload` bytes before any part of the token is decoded, so a
//! tampered token is reported as a bad signature rather than whatever
//! parse error the tampering happens to cause.

use axum::http::{HeaderMap, HeaderValue};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sha2::Sha256;
use tracing::{debug, warn};

use crate::auth::claims::{RawClaims, SessionClaims};
use crate::auth::cookie;
use crate::auth::error::{AuthError, SessionError};
use crate::types::Identity;

type HmacSha256 = Hmac<Sha256>;

/// Default lifetime of a session.
pub const DEFAULT_SESSION_HOURS: i64 = 24;

/// Signs and validates session tokens with a symmetric secret.
///
/// Replacing the secret (or letting it be regenerated on restart) invalidates
/// every outstanding session.
pub struct SessionManager {
    secret: Vec<u8>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_duration: Duration,
    secure_cookie: bool,
}

impl SessionManager {
    /// Create a manager. A missing or empty secret is replaced by a random
    /// one, which only lives as long as the process.
    pub fn new(secret: Option<String>, session_duration: Duration, secure_cookie: bool) -> Self {
        let secret = match secret.filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None => {
                warn!("jwt-secret is not set, then automatically generated");
                generate_secret()
            }
        };
        let secret = secret.into_bytes();

        Self {
            encoding_key: EncodingKey::from_secret(&secret),
            decoding_key: DecodingKey::from_secret(&secret),
            secret,
            session_duration,
            secure_cookie,
        }
    }

    pub fn session_duration(&self) -> Duration {
        self.session_duration
    }

    /// Sign claims for `identity` expiring at `expires_at`.
    pub fn sign(
        &self,
        identity: Identity,
        expires_at: DateTime<Utc>,
        image: Option<String>,
    ) -> Result<String, SessionError> {
        let claims = SessionClaims::new(identity, expires_at, image);
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| SessionError::Signing(e.to_string()))
    }

    /// Sign a session for a freshly verified identity, valid for the
    /// configured session duration.
    pub fn issue(&self, identity: Identity, image: Option<String>) -> Result<String, SessionError> {
        let expires_at = Utc::now()
            .checked_add_signed(self.session_duration)
            .ok_or_else(|| {
                SessionError::Signing(format!(
                    "session duration out of range: {}",
                    self.session_duration
                ))
            })?;
        self.sign(identity, expires_at, image)
    }

    /// `Set-Cookie` value persisting `token`.
    ///
    /// A failure here leaves the token itself valid; the caller decides
    /// whether to retry or report it.
    pub fn session_cookie(&self, token: &str) -> Result<HeaderValue, SessionError> {
        cookie::session_cookie(
            token,
            self.session_duration.num_seconds(),
            self.secure_cookie,
        )
        .map_err(|e| {
            warn!("fail to save cookie: {}", e);
            SessionError::Cookie(e.to_string())
        })
    }

    /// `Set-Cookie` value clearing the session. Best effort: a failure is
    /// logged and `None` returned.
    pub fn logout(&self) -> Option<HeaderValue> {
        match cookie::clear_cookie(self.secure_cookie) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Fail to delete cookie, but nothing to do: {}", e);
                None
            }
        }
    }

    /// Validate the session cookie carried by a request.
    pub fn validate_headers(&self, headers: &HeaderMap) -> Result<SessionClaims, AuthError> {
        self.validate(cookie::token_from_headers(headers))
    }

    /// Validate a token and return its claims.
    pub fn validate(&self, token: Option<&str>) -> Result<SessionClaims, AuthError> {
        self.validate_at(token, Utc::now())
    }

    fn validate_at(
        &self,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SessionClaims, AuthError> {
        let token = token.filter(|t| !t.is_empty()).ok_or(AuthError::NoSession)?;

        let (message, signature) = split_token(token)?;
        self.verify_signature(message, signature)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        // Signature is already verified, so anything failing here is a
        // structural problem with the token.
        let raw = decode::<RawClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| AuthError::Malformed(e.to_string()))?
            .claims;
        let claims = SessionClaims::try_from(raw)?;

        if claims.is_expired_at(now) {
            return Err(AuthError::Expired(claims.expires_at));
        }

        debug!(identity = %claims.identity, "Session validated");
        Ok(claims)
    }

    fn verify_signature(&self, message: &str, signature: &str) -> Result<(), AuthError> {
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::InvalidSignature)?;

        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| AuthError::InvalidSignature)?;
        mac.update(message.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::InvalidSignature)
    }
}

/// Split a compact JWS into (`header.payload`, `signature`).
fn split_token(token: &str) -> Result<(&str, &str), AuthError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return Err(AuthError::Malformed("That's not even a token".to_string()));
    }

    let split = segments[0].len() + 1 + segments[1].len();
    Ok((&token[..split], &token[split + 1..]))
}

/// Random secret used when none is configured.
pub fn generate_secret() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SessionManager {
        SessionManager::new(
            Some("test-secret".to_string()),
            Duration::hours(DEFAULT_SESSION_HOURS),
            false,
        )
    }

    fn alpha() -> Identity {
        Identity::new("alpha@example.com")
    }

    #[test]
    fn test_sign_validate_round_trip() {
        let mgr = manager();
        let expires_at = Utc::now() + Duration::hours(1);

        let token = mgr
            .sign(alpha(), expires_at, Some("https://img/a.png".to_string()))
            .unwrap();
        let claims = mgr.validate(Some(&token)).unwrap();

        assert_eq!(claims.identity, alpha());
        assert_eq!(claims.expires_at, expires_at);
        assert_eq!(claims.image.as_deref(), Some("https://img/a.png"));
    }

    #[test]
    fn test_round_trip_without_image() {
        let mgr = manager();
        let token = mgr.issue(alpha(), None).unwrap();
        let claims = mgr.validate(Some(&token)).unwrap();
        assert_eq!(claims.identity, alpha());
        assert!(claims.image.is_none());
    }

    #[test]
    fn test_no_session() {
        let mgr = manager();
        assert_eq!(mgr.validate(None), Err(AuthError::NoSession));
        assert_eq!(mgr.validate(Some("")), Err(AuthError::NoSession));
        assert_eq!(
            mgr.validate_headers(&HeaderMap::new()),
            Err(AuthError::NoSession)
        );
    }

    #[test]
    fn test_expired_token() {
        let mgr = manager();
        let expires_at = Utc::now() - Duration::seconds(1);
        let token = mgr.sign(alpha(), expires_at, None).unwrap();

        assert_eq!(
            mgr.validate(Some(&token)),
            Err(AuthError::Expired(expires_at))
        );
    }

    #[test]
    fn test_expiry_is_strict() {
        let mgr = manager();
        let expires_at = Utc::now() + Duration::hours(1);
        let token = mgr.sign(alpha(), expires_at, None).unwrap();

        assert!(mgr.validate_at(Some(&token), expires_at).is_ok());
        assert!(matches!(
            mgr.validate_at(Some(&token), expires_at + Duration::milliseconds(1)),
            Err(AuthError::Expired(_))
        ));
    }

    #[test]
    fn test_expired_token_with_bad_signature_reports_signature() {
        let mgr = manager();
        let other = SessionManager::new(Some("other-secret".to_string()), Duration::hours(1), false);
        let token = other
            .sign(alpha(), Utc::now() - Duration::hours(1), None)
            .unwrap();

        assert_eq!(mgr.validate(Some(&token)), Err(AuthError::InvalidSignature));
    }

    #[test]
    fn test_any_flipped_byte_is_rejected() {
        let mgr = manager();
        let token = mgr.issue(alpha(), Some("https://img/a.png".to_string())).unwrap();

        for (i, byte) in token.bytes().enumerate() {
            for mask in [0x01u8, 0x02, 0x04, 0x08, 0x10] {
                let mut tampered = token.clone().into_bytes();
                tampered[i] ^= mask;
                let tampered = String::from_utf8(tampered).unwrap();

                let result = mgr.validate(Some(&tampered));
                if byte == b'.' {
                    // A broken separator no longer splits into three segments.
                    assert!(
                        matches!(result, Err(AuthError::Malformed(_))),
                        "separator {} flipped with {:#04x}: {:?}",
                        i,
                        mask,
                        result
                    );
                } else {
                    assert_eq!(
                        result,
                        Err(AuthError::InvalidSignature),
                        "byte {} flipped with {:#04x}",
                        i,
                        mask
                    );
                }
            }
        }
    }

    #[test]
    fn test_malformed_tokens() {
        let mgr = manager();
        for token in ["garbage", "a.b", "a..c", "a.b.c.d"] {
            assert!(
                matches!(mgr.validate(Some(token)), Err(AuthError::Malformed(_))),
                "token {:?}",
                token
            );
        }
    }

    #[test]
    fn test_unsigned_token_is_malformed() {
        let mgr = manager();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD
            .encode(br#"{"user":"alpha@example.com","expires_at":"2099-01-01T00:00:00Z"}"#);
        let token = format!("{}.{}.", header, payload);

        assert!(matches!(
            mgr.validate(Some(&token)),
            Err(AuthError::Malformed(_))
        ));
    }

    #[test]
    fn test_signed_token_missing_user_is_malformed() {
        let mgr = manager();
        let claims = serde_json::json!({ "expires_at": "2099-01-01T00:00:00Z" });
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert_eq!(
            mgr.validate(Some(&token)),
            Err(AuthError::Malformed(
                "missing 'user' field in token".to_string()
            ))
        );
    }

    #[test]
    fn test_validate_headers_reads_cookie() {
        let mgr = manager();
        let token = mgr.issue(alpha(), None).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_str(&format!("gateway_session={}", token)).unwrap(),
        );

        assert_eq!(mgr.validate_headers(&headers).unwrap().identity, alpha());
    }

    #[test]
    fn test_generated_secret_sessions_do_not_survive_restart() {
        let first = SessionManager::new(None, Duration::hours(1), false);
        let second = SessionManager::new(Some(String::new()), Duration::hours(1), false);
        let token = first.issue(alpha(), None).unwrap();

        assert!(first.validate(Some(&token)).is_ok());
        assert_eq!(
            second.validate(Some(&token)),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn test_session_cookie_and_logout() {
        let mgr = manager();
        let token = mgr.issue(alpha(), None).unwrap();

        let cookie = mgr.session_cookie(&token).unwrap();
        assert!(cookie.to_str().unwrap().contains("Max-Age=86400"));
        assert!(cookie.to_str().unwrap().contains(&token));

        let cleared = mgr.logout().unwrap();
        assert!(cleared.to_str().unwrap().contains("Max-Age=0"));
    }

    #[test]
    fn test_issue_with_out_of_range_duration_fails() {
        let mgr = SessionManager::new(Some("test-secret".to_string()), Duration::MAX, false);
        assert!(matches!(
            mgr.issue(alpha(), None),
            Err(SessionError::Signing(_))
        ));
    }

    #[test]
    fn test_generate_secret() {
        let a = generate_secret();
        assert_eq!(a.len(), 64);
        assert_ne!(a, generate_secret());
    }
}
