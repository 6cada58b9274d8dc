//! Feed retrieval over HTTP(S).
//!
//! - [`url`]: scheme check and embedded-credential extraction
//! - [`options`]: layered [`HttpOptions`] with basic-auth credentials
//! - [`transport`]: the [`Transport`] seam and its `reqwest` implementation
//! - [`resolver`]: [`UrlResolver`], which follows HTTP to HTTPS upgrades and
//!   refuses everything else that changes scheme
//!
//! # Security
//!
//! A redirect from `https` to `http` is never followed, at any hop. The
//! transport stops every scheme-changing redirect before contacting the
//! target; only the resolver may decide to retry one, and only as an upgrade.

pub mod options;
pub mod resolver;
pub mod transport;
pub mod url;

pub use options::{BasicAuth, HttpOptions, USER_AGENT};
pub use resolver::{UrlResolver, DEFAULT_MAX_REDIRECTS};
pub use transport::{FetchRequest, ReqwestTransport, Transport, TransportError};
pub use url::ResolvedUrl;
