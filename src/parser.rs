use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::error::FeedError;
use crate::feed::{Feed, ItemField, SanitizationPolicy, Sanitizer, SelfSanitizer};
use crate::fetch::{HttpOptions, ReqwestTransport, Transport, UrlResolver, DEFAULT_MAX_REDIRECTS};
use crate::xml::Document;

/// Construction options for [`FeedParser`].
///
/// One of `url` or `feed_document` is required. A supplied document takes
/// precedence and is parsed without touching the network.
#[derive(Clone)]
pub struct ParserOptions {
    pub url: Option<String>,
    pub feed_document: Option<Vec<u8>>,
    /// Caller-level HTTP options; highest precedence on every hop.
    pub http: HttpOptions,
    /// Defaults to [`SelfSanitizer`].
    pub sanitizer: Option<Arc<dyn Sanitizer>>,
    /// Defaults to [`SanitizationPolicy::default_fields`].
    pub sanitize_fields: Option<HashSet<ItemField>>,
    pub max_redirects: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            url: None,
            feed_document: None,
            http: HttpOptions::default(),
            sanitizer: None,
            sanitize_fields: None,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

impl fmt::Debug for ParserOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserOptions")
            .field("url", &self.url)
            .field(
                "feed_document",
                &self.feed_document.as_ref().map(|doc| format!("<{} bytes>", doc.len())),
            )
            .field("http", &self.http)
            .field("sanitizer", &self.sanitizer.as_ref().map(|_| "<dyn Sanitizer>"))
            .field("sanitize_fields", &self.sanitize_fields)
            .field("max_redirects", &self.max_redirects)
            .finish()
    }
}

impl ParserOptions {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn from_document(document: impl Into<Vec<u8>>) -> Self {
        Self {
            feed_document: Some(document.into()),
            ..Self::default()
        }
    }

    pub fn with_http(mut self, http: HttpOptions) -> Self {
        self.http = http;
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: Arc<dyn Sanitizer>) -> Self {
        self.sanitizer = Some(sanitizer);
        self
    }

    pub fn with_sanitize_fields(mut self, fields: impl IntoIterator<Item = ItemField>) -> Self {
        self.sanitize_fields = Some(fields.into_iter().collect());
        self
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }
}

enum Source {
    Url(String),
    Document(Vec<u8>),
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Url(url) => f.debug_tuple("Url").field(url).finish(),
            Source::Document(document) => write!(f, "Document(<{} bytes>)", document.len()),
        }
    }
}

/// Entry point: turns a URL or a document into a normalized [`Feed`].
///
/// The sanitization policy is fixed at construction and shared by every item
/// this parser produces. [`FeedParser::parse`] is memoized; parsers are
/// independent of each other and hold no global state.
///
/// # Example
///
/// ```ignore
/// use feedparser::{FeedParser, ParserOptions};
///
/// let parser = FeedParser::new(ParserOptions::from_url("https://example.com/atom.xml"))?;
/// let feed = parser.parse().await?;
/// println!("{} ({} items)", feed.title(), feed.items().len());
/// ```
pub struct FeedParser<T = ReqwestTransport> {
    source: Source,
    http: HttpOptions,
    policy: Arc<SanitizationPolicy>,
    resolver: UrlResolver<T>,
    feed: OnceCell<Feed>,
}

impl FeedParser<ReqwestTransport> {
    /// Creates a parser using the `reqwest` transport.
    ///
    /// # Errors
    ///
    /// - [`FeedError::MissingSource`] if neither `url` nor `feed_document` is set
    /// - [`FeedError::Transport`] if the HTTP client cannot be built
    pub fn new(options: ParserOptions) -> Result<Self, FeedError> {
        let transport = ReqwestTransport::new()?;
        Self::with_transport(options, transport)
    }
}

impl<T: Transport> FeedParser<T> {
    /// Creates a parser that fetches through `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::MissingSource`] if neither `url` nor
    /// `feed_document` is set.
    pub fn with_transport(options: ParserOptions, transport: T) -> Result<Self, FeedError> {
        let ParserOptions {
            url,
            feed_document,
            http,
            sanitizer,
            sanitize_fields,
            max_redirects,
        } = options;

        let source = match (feed_document, url) {
            (Some(document), _) => Source::Document(document),
            (None, Some(url)) => Source::Url(url),
            (None, None) => return Err(FeedError::MissingSource),
        };

        let policy = SanitizationPolicy::new(
            sanitizer.unwrap_or_else(|| Arc::new(SelfSanitizer)),
            sanitize_fields.unwrap_or_else(SanitizationPolicy::default_fields),
        );

        Ok(Self {
            source,
            http,
            policy: Arc::new(policy),
            resolver: UrlResolver::new(transport).with_max_redirects(max_redirects),
            feed: OnceCell::new(),
        })
    }

    /// Fetches (unless a document was supplied), parses and normalizes the
    /// feed.
    ///
    /// The first successful result is cached: later calls return the same
    /// [`Feed`] without fetching or parsing again. A failed attempt is not
    /// cached.
    ///
    /// # Errors
    ///
    /// Resolver errors ([`FeedError::InvalidUriScheme`],
    /// [`FeedError::Transport`], ...), [`FeedError::Xml`] for malformed
    /// documents and [`FeedError::UnrecognizedFeedFormat`].
    pub async fn parse(&self) -> Result<&Feed, FeedError> {
        self.feed.get_or_try_init(|| self.load()).await
    }

    pub fn policy(&self) -> &SanitizationPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &T {
        self.resolver.transport()
    }

    async fn load(&self) -> Result<Feed, FeedError> {
        let bytes = match &self.source {
            Source::Document(document) => Cow::Borrowed(document.as_slice()),
            Source::Url(url) => {
                tracing::info!(url = %url, "Fetching feed");
                Cow::Owned(self.resolver.resolve(url, &self.http).await?)
            }
        };

        let document = Document::parse(&bytes)?;
        let feed = Feed::extract(document, Arc::clone(&self.policy))?;
        tracing::info!(
            dialect = %feed.dialect(),
            items = feed.items().len(),
            "Parsed feed"
        );
        Ok(feed)
    }
}

impl<T> fmt::Debug for FeedParser<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedParser")
            .field("source", &self.source)
            .field("policy", &self.policy)
            .field("parsed", &self.feed.initialized())
            .finish_non_exhaustive()
    }
}
