//! Namespace-stripped XML element tree with path queries.
//!
//! Feed extraction never touches raw XML events directly. Documents are read
//! once into an owned [`Document`] (element names and attribute keys reduced to
//! their local part, `xmlns` bindings dropped), then queried with small
//! XPath-like [`Path`] expressions:
//!
//! - `/rss/channel/item`: absolute, starting at the document root
//! - `author/name`: relative to a context element
//! - `link[@rel='self']`: attribute predicates
//! - `category[2]`: 1-based positional predicates
//!
//! Text nodes keep their raw (still escaped) source so that XHTML content can
//! be re-serialized without a lossy decode/encode round trip.

mod document;
mod path;

pub use document::{unescape, Document, Element, Node, XmlError};
pub use path::{Path, PathError};
