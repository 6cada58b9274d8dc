use crate::error::FeedError;
use crate::fetch::options::HttpOptions;
use crate::fetch::transport::{FetchRequest, Transport, TransportError};
use crate::fetch::url::ResolvedUrl;

/// Upgrade hops followed before giving up.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Retrieves a feed document by URL.
///
/// For each hop the URL is parsed, embedded credentials are split off and the
/// options are layered as caller, then embedded credentials, then
/// [`HttpOptions::defaults`]. When the transport refuses a scheme-changing
/// redirect, the resolver retries the target only if it upgrades `http` to
/// `https`. Every other failure, including a refused downgrade, is returned
/// unchanged. Nothing is retried.
#[derive(Debug)]
pub struct UrlResolver<T> {
    transport: T,
    max_redirects: usize,
}

impl<T: Transport> UrlResolver<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetches `url`, following HTTP to HTTPS upgrades.
    ///
    /// # Errors
    ///
    /// - [`FeedError::InvalidUrl`] / [`FeedError::InvalidUriScheme`] before any
    ///   request is made
    /// - [`FeedError::Transport`] with the transport's own error, including
    ///   [`TransportError::RedirectForbidden`] for downgrades
    /// - [`FeedError::TooManyRedirects`] after `max_redirects` upgrades
    pub async fn resolve(&self, url: &str, options: &HttpOptions) -> Result<Vec<u8>, FeedError> {
        let mut target = ResolvedUrl::parse(url)?;
        let defaults = HttpOptions::defaults();
        let mut hops = 0;

        loop {
            let (url, credentials) = target.into_parts();
            let embedded = credentials.map(HttpOptions::credentials).unwrap_or_default();
            let request = FetchRequest {
                url,
                options: options.or(&embedded).or(&defaults),
            };

            match self.transport.fetch(request).await {
                Ok(bytes) => return Ok(bytes),
                Err(TransportError::RedirectForbidden { from, to })
                    if from.scheme() == "http" && to.scheme() == "https" =>
                {
                    if hops >= self.max_redirects {
                        tracing::warn!(
                            to = %to,
                            max = self.max_redirects,
                            "Giving up on redirect chain"
                        );
                        return Err(FeedError::TooManyRedirects(self.max_redirects));
                    }
                    hops += 1;
                    tracing::debug!(from = %from, to = %to, hop = hops, "Following HTTPS upgrade");
                    target = ResolvedUrl::from_url(to)?;
                }
                Err(e) => {
                    if let TransportError::RedirectForbidden { from, to } = &e {
                        tracing::warn!(from = %from, to = %to, "Refusing protocol downgrade");
                    }
                    return Err(e.into());
                }
            }
        }
    }
}
