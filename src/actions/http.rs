//! Outbound HTTP wrapper and the transport it runs on.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::guard::{GuardRequest, Guarded, Guardian, Validation};

use super::{truncate_chars, ActionType};

/// Characters of the response body kept in audit metadata.
const RESPONSE_PREVIEW_CHARS: usize = 200;

/// HTTP error raised before or while sending.
#[derive(Debug, Error)]
pub enum HttpError {
    /// URL could not be parsed or uses an unsupported scheme.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    /// Method name is not a valid HTTP token.
    #[error("invalid method: {0}")]
    InvalidMethod(String),
    /// Header name or value is malformed.
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    /// Underlying HTTP transport error.
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
}

/// One outbound request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    /// Method, `GET` by default.
    #[serde(default = "default_method")]
    pub method: String,
    /// Absolute `http` or `https` URL.
    pub url: String,
    /// Request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Optional request body.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".to_owned()
}

impl HttpRequest {
    /// A `GET` request to `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: default_method(),
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }
}

/// A received response. Any status is a response, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response headers (lossy UTF-8).
    pub headers: BTreeMap<String, String>,
    /// Response body (lossy UTF-8).
    pub body: String,
}

/// Sends [`HttpRequest`]s. Implemented by [`ReqwestTransport`] and by test doubles.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send one request and return whatever the server answered.
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::RequestFailed`] if the client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, HttpError> {
        let inner = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        let url = parse_url(&request.url)?;
        let method = reqwest::Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| HttpError::InvalidMethod(request.method.clone()))?;

        let mut builder = self.inner.request(method, url);
        for (name, value) in &request.headers {
            let header_name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| HttpError::InvalidHeader(name.clone()))?;
            let header_value = reqwest::header::HeaderValue::from_str(value)
                .map_err(|_| HttpError::InvalidHeader(name.clone()))?;
            builder = builder.header(header_name, header_value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let bytes = response.bytes().await?;
        Ok(HttpResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

/// Parse `raw` and require an `http` or `https` scheme with a host.
fn parse_url(raw: &str) -> Result<Url, HttpError> {
    let parsed = Url::parse(raw).map_err(|e| HttpError::InvalidUrl(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(HttpError::InvalidUrl(format!(
            "unsupported scheme: {}",
            parsed.scheme()
        )));
    }
    if parsed.host_str().is_none() {
        return Err(HttpError::InvalidUrl("URL has no host".to_owned()));
    }
    Ok(parsed)
}

/// Whether `status` counts as the expected answer.
///
/// With no explicit list, any 2xx or 3xx status passes.
pub(crate) fn status_expected(status: u16, expected: &[u16]) -> bool {
    if expected.is_empty() {
        (200..400).contains(&status)
    } else {
        expected.contains(&status)
    }
}

/// Send `request` through `transport` under the guard.
///
/// The response is returned whatever its status; validation grades it
/// against `expected_statuses`.
pub async fn wrap_http_request(
    guardian: &Guardian,
    transport: &dyn HttpTransport,
    task_id: &str,
    lane: &str,
    request: &HttpRequest,
    expected_statuses: &[u16],
) -> Guarded<HttpResponse, HttpError> {
    let action = ActionType::HttpRequest;
    let method = request.method.to_ascii_uppercase();
    let guard_request = GuardRequest::new(
        task_id,
        lane,
        action.as_str(),
        format!("{method} {} returns expected status", request.url),
        action.confidence_pre(),
    )
    .with_metadata("method", method.clone())
    .with_metadata("url", request.url.clone());

    guardian
        .exec_with_guard(
            guard_request,
            || transport.send(request),
            |response: &HttpResponse| {
                Ok(
                    Validation::from_check(status_expected(response.status, expected_statuses))
                        .with("status", response.status)
                        .with(
                            "response",
                            truncate_chars(&response.body, RESPONSE_PREVIEW_CHARS),
                        ),
                )
            },
        )
        .await
}
