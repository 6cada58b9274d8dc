//! Normalizes RSS 2.0 and Atom 1.0 feeds into one item model.
//!
//! [`FeedParser`] fetches a feed (or takes a document directly), detects its
//! dialect and exposes the channel metadata and items through one set of
//! accessors, whatever the source format. Retrieval extracts credentials
//! embedded in the URL and never follows a redirect from HTTPS to HTTP.

pub mod config;
pub mod error;
pub mod feed;
pub mod fetch;
pub mod parser;
pub mod xml;

pub use error::FeedError;
pub use feed::{Feed, FeedDialect, FeedItem, FeedRecord, ItemField, ItemRecord, Sanitizer};
pub use parser::{FeedParser, ParserOptions};
