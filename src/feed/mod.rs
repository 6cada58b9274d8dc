//! Feed normalization for RSS 2.0 and Atom 1.0.
//!
//! A parsed [`Document`](crate::xml::Document) flows through three stages:
//!
//! - **Detection**: [`detect`] classifies the root element as RSS or Atom
//! - **Extraction**: [`Feed::extract`] reads metadata and items through the
//!   per-dialect [`schema`] table
//! - **Sanitization**: item accessors pass selected fields through the
//!   parser's [`SanitizationPolicy`] on every read
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use feedparser::feed::{Feed, SanitizationPolicy};
//! use feedparser::xml::Document;
//!
//! let document = Document::parse(bytes)?;
//! let feed = Feed::extract(document, Arc::new(SanitizationPolicy::default()))?;
//! for item in feed.items() {
//!     println!("{} <{}>", item.title(), item.link());
//! }
//! ```

mod content;
mod detect;
mod extract;
mod item;
mod sanitize;
pub mod schema;

pub use content::decode;
pub use detect::detect;
pub use extract::{Feed, FeedRecord};
pub use item::{FeedItem, ItemRecord};
pub use sanitize::{
    strip_control_chars, ControlCharSanitizer, ItemField, SanitizationPolicy, Sanitizer,
    SelfSanitizer, UnknownItemField,
};
pub use schema::FeedDialect;
