use std::error::Error as StdError;
use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use reqwest::redirect::Policy;
use thiserror::Error;
use url::Url;

use crate::fetch::options::HttpOptions;

/// Largest feed body accepted.
pub const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Same-scheme redirect hops the transport follows on its own.
pub const MAX_TRANSPORT_REDIRECTS: usize = 10;

/// One GET request: a userinfo-free URL plus fully layered options.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: Url,
    pub options: HttpOptions,
}

/// Errors that can occur while retrieving a document.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Response body exceeded the size limit
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// A redirect was refused because it changes scheme. Carries the target
    /// so the caller can decide whether to retry it.
    #[error("Redirect from {from} to {to} changes protocol")]
    RedirectForbidden { from: Url, to: Url },
    /// The same-scheme redirect chain was too long
    #[error("Too many redirects (max {0})")]
    RedirectLimit(usize),
    /// The redirect chain came back to a URL it already visited
    #[error("Redirect loop detected at {0}")]
    RedirectLoop(Url),
}

/// Retrieves the raw bytes of a document.
pub trait Transport: Send + Sync {
    /// Performs one GET.
    ///
    /// Redirects that keep the scheme may be followed internally. A redirect
    /// that changes scheme must fail with [`TransportError::RedirectForbidden`]
    /// without contacting the target.
    fn fetch(
        &self,
        request: FetchRequest,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;
}

/// Why the redirect policy stopped a chain; recovered from the
/// `reqwest::Error` source chain after `send()` fails.
#[derive(Debug, Clone, Error)]
enum RedirectStop {
    #[error("redirect from {from} to {to} changes scheme")]
    SchemeChange { from: Url, to: Url },
    #[error("too many redirects (max {0})")]
    Limit(usize),
    #[error("redirect loop at {0}")]
    Loop(Url),
}

impl From<RedirectStop> for TransportError {
    fn from(stop: RedirectStop) -> Self {
        match stop {
            RedirectStop::SchemeChange { from, to } => TransportError::RedirectForbidden { from, to },
            RedirectStop::Limit(max) => TransportError::RedirectLimit(max),
            RedirectStop::Loop(url) => TransportError::RedirectLoop(url),
        }
    }
}

/// Follows redirects that keep the scheme; refuses the rest.
///
/// - Limits chains to `max_hops`
/// - Detects redirect loops (same URL appearing twice in chain)
/// - Refuses `http` to `https` as well as `https` to `http`: the caller owns
///   that decision
/// - Logs each hop for debugging
fn scheme_preserving_policy(max_hops: usize) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() > max_hops {
            return attempt.error(RedirectStop::Limit(max_hops));
        }

        let Some(from) = attempt.previous().last().cloned() else {
            return attempt.follow();
        };
        let to = attempt.url().clone();

        if attempt.previous().iter().any(|prev| prev.as_str() == to.as_str()) {
            tracing::debug!(to = %to, "Stopping redirect loop");
            return attempt.error(RedirectStop::Loop(to));
        }

        if from.scheme() != to.scheme() {
            tracing::debug!(from = %from, to = %to, "Stopping scheme-changing redirect");
            return attempt.error(RedirectStop::SchemeChange { from, to });
        }

        tracing::debug!(
            from = %from,
            to = %to,
            hop = attempt.previous().len(),
            "Following redirect"
        );
        attempt.follow()
    })
}

fn redirect_stop(err: &reqwest::Error) -> Option<RedirectStop> {
    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(stop) = inner.downcast_ref::<RedirectStop>() {
            return Some(stop.clone());
        }
        source = inner.source();
    }
    None
}

/// [`Transport`] backed by `reqwest`.
///
/// Holds two clients: one with the scheme-preserving redirect policy, and one
/// that never follows redirects (for `follow_redirects = false`).
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    following: reqwest::Client,
    manual: reqwest::Client,
    body_limit: usize,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        Ok(Self {
            following: reqwest::Client::builder()
                .redirect(scheme_preserving_policy(MAX_TRANSPORT_REDIRECTS))
                .build()?,
            manual: reqwest::Client::builder()
                .redirect(Policy::none())
                .build()?,
            body_limit: MAX_FEED_SIZE,
        })
    }

    /// Overrides the [`MAX_FEED_SIZE`] body limit.
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    async fn exchange(&self, request: FetchRequest) -> Result<Vec<u8>, TransportError> {
        let FetchRequest { url, options } = request;
        let client = if options.follows_redirects() {
            &self.following
        } else {
            &self.manual
        };

        let mut builder = client
            .get(url.clone())
            .header(reqwest::header::USER_AGENT, options.user_agent());
        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(auth) = &options.basic_auth {
            builder = builder.basic_auth(auth.username(), auth.expose_password());
        }

        let response = builder.send().await.map_err(|e| match redirect_stop(&e) {
            Some(stop) => TransportError::from(stop),
            None => TransportError::Network(e),
        })?;

        if !response.status().is_success() {
            tracing::debug!(url = %url, status = %response.status(), "Feed request failed");
            return Err(TransportError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, self.body_limit).await
    }
}

impl Transport for ReqwestTransport {
    async fn fetch(&self, request: FetchRequest) -> Result<Vec<u8>, TransportError> {
        let timeout = request.options.timeout();
        tracing::debug!(url = %request.url, timeout_ms = timeout.as_millis() as u64, "Fetching feed");

        tokio::time::timeout(timeout, self.exchange(request))
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, TransportError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(TransportError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(TransportError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(TransportError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
