use axum::http::{HeaderMap, HeaderValue, header};

pub const SESSION_COOKIE_NAME: &str = "gateway_session";

/// Find the session token in the request's `Cookie` headers.
pub fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|cookie| {
            cookie
                .trim()
                .strip_prefix(SESSION_COOKIE_NAME)
                .and_then(|rest| rest.strip_prefix('='))
        })
        .filter(|token| !token.is_empty())
}

/// `Set-Cookie` value storing `token`.
pub fn session_cookie(
    token: &str,
    max_age_secs: i64,
    secure: bool,
) -> Result<HeaderValue, header::InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{}={}; HttpOnly; {}SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE_NAME,
        token,
        if secure { "Secure; " } else { "" },
        max_age_secs
    ))
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_cookie(secure: bool) -> Result<HeaderValue, header::InvalidHeaderValue> {
    session_cookie("", 0, secure)
}
