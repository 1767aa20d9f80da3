//! HTTP client for the single backend.

use std::time::Duration;

use anyhow::Context;
use axum::body::{Body, Bytes};
use axum::response::Response;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri, header};
use http_body_util::LengthLimitError;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::proxy::error::GatewayError;
use crate::types::CorrelationId;

pub const HEADER_API_KEY: &str = "x-api-key";
pub const HEADER_PERMITTED_TAGS: &str = "x-permitted-tags";
pub const HEADER_REQUEST_ID: &str = "x-request-id";

/// Largest request body accepted for forwarding.
pub const MAX_REQUEST_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Headers meaningful only for a single connection; never forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub struct UpstreamConfig {
    pub endpoint: Url,
    pub api_key: String,
    pub read_timeout: Duration,
    pub connect_timeout: Duration,
}

/// Trust headers attached to one forwarded request.
pub struct TrustHeaders<'a> {
    pub permitted_tags: &'a str,
    pub request_id: &'a CorrelationId,
}

/// Pooled connection to the backend plus the shared API key.
pub struct Upstream {
    client: Client,
    endpoint: Url,
    api_key: HeaderValue,
}

impl Upstream {
    pub fn new(config: UpstreamConfig) -> anyhow::Result<Self> {
        let mut api_key =
            HeaderValue::from_str(&config.api_key).context("API key is not a valid header value")?;
        api_key.set_sensitive(true);

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Fail to create backend HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint,
            api_key,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Backend URL for an incoming request URI: the endpoint's base path
    /// followed by the full incoming path and query.
    pub fn target_url(&self, uri: &Uri) -> Url {
        let mut url = self.endpoint.clone();
        let base = self.endpoint.path().trim_end_matches('/');
        url.set_path(&format!("{}{}", base, uri.path()));
        url.set_query(uri.query());
        url
    }

    /// Forward a request and stream the backend's answer back.
    ///
    /// The request body is read up to [`MAX_REQUEST_BODY_BYTES`] and sent
    /// unchanged. The response body is not buffered: dropping the returned
    /// response (for instance when the client goes away) drops the backend
    /// stream and with it the connection.
    pub async fn forward(
        &self,
        method: Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: Body,
        trust: TrustHeaders<'_>,
    ) -> Result<Response, GatewayError> {
        let url = self.target_url(uri);
        let request_headers = self.request_headers(headers, &trust)?;
        let body = read_body(body).await?;

        debug!(%method, %url, request_id = %trust.request_id, "Forwarding request");

        let mut request = self.client.request(method, url).headers(request_headers);
        if !body.is_empty() {
            request = request.body(body);
        }

        let upstream = request.send().await.map_err(|e| {
            warn!(request_id = %trust.request_id, error = %e, "Backend request failed");
            if e.is_timeout() {
                GatewayError::GatewayTimeout {
                    request_id: trust.request_id.clone(),
                    message: e.to_string(),
                }
            } else {
                GatewayError::BadGateway {
                    request_id: trust.request_id.clone(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = upstream.status();
        let response_headers = strip_hop_by_hop(upstream.headers());

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }

    fn request_headers(
        &self,
        incoming: &HeaderMap,
        trust: &TrustHeaders<'_>,
    ) -> Result<HeaderMap, GatewayError> {
        let mut headers = strip_hop_by_hop(incoming);
        headers.remove(header::HOST);
        headers.remove(header::COOKIE);
        // Recomputed from the forwarded body.
        headers.remove(header::CONTENT_LENGTH);

        let permitted_tags = HeaderValue::from_str(trust.permitted_tags)
            .map_err(|e| GatewayError::Internal(format!("invalid permitted tags: {}", e)))?;
        let request_id = HeaderValue::from_str(trust.request_id.as_str())
            .map_err(|e| GatewayError::Internal(format!("invalid request id: {}", e)))?;

        headers.insert(HEADER_API_KEY, self.api_key.clone());
        headers.insert(HEADER_PERMITTED_TAGS, permitted_tags);
        headers.insert(HEADER_REQUEST_ID, request_id);
        Ok(headers)
    }
}

/// Buffer a request body, up to [`MAX_REQUEST_BODY_BYTES`].
async fn read_body(body: Body) -> Result<Bytes, GatewayError> {
    axum::body::to_bytes(body, MAX_REQUEST_BODY_BYTES)
        .await
        .map_err(|e| {
            if exceeds_limit(&e) {
                GatewayError::PayloadTooLarge {
                    limit: MAX_REQUEST_BODY_BYTES,
                }
            } else {
                GatewayError::BadRequest(format!("fail to read request body: {}", e))
            }
        })
}

fn exceeds_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();

    // Headers named in `Connection` are hop-by-hop as well.
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in HOP_BY_HOP {
        out.remove(name);
    }
    for name in &named {
        out.remove(name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(endpoint: &str) -> Upstream {
        Upstream::new(UpstreamConfig {
            endpoint: Url::parse(endpoint).unwrap(),
            api_key: "backend-key".to_string(),
            read_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(1),
        })
        .unwrap()
    }

    #[test]
    fn test_target_url_prepends_base_path() {
        let up = upstream("https://search.internal/prod");
        let uri: Uri = "/api/v1/search/abc/logs?offset=10&limit=5".parse().unwrap();
        assert_eq!(
            up.target_url(&uri).as_str(),
            "https://search.internal/prod/api/v1/search/abc/logs?offset=10&limit=5"
        );
    }

    #[test]
    fn test_target_url_trailing_slash_and_no_query() {
        let up = upstream("http://10.0.0.5:8080/prod/");
        let uri: Uri = "/api/v1/search".parse().unwrap();
        assert_eq!(
            up.target_url(&uri).as_str(),
            "http://10.0.0.5:8080/prod/api/v1/search"
        );

        let root = upstream("http://10.0.0.5:8080");
        assert_eq!(
            root.target_url(&uri).as_str(),
            "http://10.0.0.5:8080/api/v1/search"
        );
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected_before_sending() {
        // Nothing listens on the discard port; the body check comes first.
        let up = upstream("http://127.0.0.1:9");
        let uri: Uri = "/api/v1/search".parse().unwrap();
        let request_id = CorrelationId::new("req-1");

        let err = up
            .forward(
                Method::POST,
                &uri,
                &HeaderMap::new(),
                Body::from(vec![b'x'; MAX_REQUEST_BODY_BYTES + 1]),
                TrustHeaders {
                    permitted_tags: "spell.1",
                    request_id: &request_id,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GatewayError::PayloadTooLarge {
                limit: MAX_REQUEST_BODY_BYTES
            }
        ));
        assert_eq!(err.status(), http::StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_body_within_limit_is_read() {
        let body = read_body(Body::from("{\"query\":\"x\"}")).await.unwrap();
        assert_eq!(&body[..], b"{\"query\":\"x\"}");
    }

    #[test]
    fn test_request_headers_replace_trust_headers() {
        let up = upstream("http://backend");
        let mut incoming = HeaderMap::new();
        incoming.insert(header::HOST, HeaderValue::from_static("gateway.example.com"));
        incoming.insert(header::COOKIE, HeaderValue::from_static("gateway_session=abc"));
        incoming.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-trace"));
        incoming.insert("x-trace", HeaderValue::from_static("1"));
        incoming.insert(HEADER_API_KEY, HeaderValue::from_static("forged"));
        incoming.insert(HEADER_PERMITTED_TAGS, HeaderValue::from_static("*"));
        incoming.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let request_id = CorrelationId::new("req-1");
        let headers = up
            .request_headers(
                &incoming,
                &TrustHeaders {
                    permitted_tags: "spell.1",
                    request_id: &request_id,
                },
            )
            .unwrap();

        assert_eq!(headers[HEADER_API_KEY], "backend-key");
        assert_eq!(headers[HEADER_PERMITTED_TAGS], "spell.1");
        assert_eq!(headers[HEADER_REQUEST_ID], "req-1");
        assert_eq!(headers[header::ACCEPT], "application/json");
        assert!(headers.get(header::HOST).is_none());
        assert!(headers.get(header::COOKIE).is_none());
        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.get("x-trace").is_none());
    }
}
