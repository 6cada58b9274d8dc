use thiserror::Error;

use crate::fetch::TransportError;
use crate::xml::XmlError;

/// Errors that can occur while resolving, parsing or normalizing a feed.
///
/// A failed parse never yields a partial feed. Missing optional data (an item
/// without an author, a feed without a title) is not an error.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Neither a URL nor a feed document was supplied
    #[error("Either a URL or a feed document is required")]
    MissingSource,

    /// The feed URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The feed URL uses a scheme other than `http` or `https`
    #[error("Only URIs with http or https protocol are supported (got `{0}`)")]
    InvalidUriScheme(String),

    /// The transport failed; propagated unchanged, including refused
    /// redirects that were not a plain HTTP to HTTPS upgrade
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Too many HTTP to HTTPS upgrade hops were followed
    #[error("Too many redirects (max {0})")]
    TooManyRedirects(usize),

    /// The payload is not well-formed XML
    #[error(transparent)]
    Xml(#[from] XmlError),

    /// The root element is neither RSS nor Atom
    #[error("Unrecognized feed format: root element <{0}>")]
    UnrecognizedFeedFormat(String),
}
