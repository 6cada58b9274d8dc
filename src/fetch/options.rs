use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

/// User agent sent when the caller does not set one.
pub const USER_AGENT: &str = concat!("feedparser/", env!("CARGO_PKG_VERSION"));

/// Per-request timeout used when the caller does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP basic-auth credentials.
///
/// The password is held as a [`SecretString`] and never appears in `Debug`
/// output or logs.
pub struct BasicAuth {
    username: String,
    password: Option<SecretString>,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: Option<String>) -> Self {
        Self {
            username: username.into(),
            password: password.map(SecretString::from),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    pub(crate) fn expose_password(&self) -> Option<&str> {
        self.password.as_ref().map(|p| p.expose_secret())
    }
}

impl Clone for BasicAuth {
    fn clone(&self) -> Self {
        Self {
            username: self.username.clone(),
            password: self
                .expose_password()
                .map(|p| SecretString::from(p.to_owned())),
        }
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Options for one HTTP retrieval.
///
/// Every field is optional so that option sets can be layered: the resolver
/// combines caller options, credentials embedded in the URL and
/// [`HttpOptions::defaults`], in that order of precedence.
#[derive(Debug, Clone, Default)]
pub struct HttpOptions {
    pub user_agent: Option<String>,
    pub basic_auth: Option<BasicAuth>,
    pub follow_redirects: Option<bool>,
    pub timeout: Option<Duration>,
    /// Extra request headers. Names compare case-insensitively when layered.
    pub headers: BTreeMap<String, String>,
}

impl HttpOptions {
    /// The lowest-precedence layer: identifying user agent, redirects
    /// followed, [`DEFAULT_TIMEOUT`].
    pub fn defaults() -> Self {
        Self {
            user_agent: Some(USER_AGENT.to_owned()),
            basic_auth: None,
            follow_redirects: Some(true),
            timeout: Some(DEFAULT_TIMEOUT),
            headers: BTreeMap::new(),
        }
    }

    /// A layer carrying only basic-auth credentials.
    pub fn credentials(auth: BasicAuth) -> Self {
        Self {
            basic_auth: Some(auth),
            ..Self::default()
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_basic_auth(mut self, auth: BasicAuth) -> Self {
        self.basic_auth = Some(auth);
        self
    }

    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = Some(follow);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Returns `self` with unset fields taken from `fallback`.
    ///
    /// Headers are unioned; on a case-insensitive name clash `self` wins.
    pub fn or(&self, fallback: &HttpOptions) -> HttpOptions {
        let mut headers = self.headers.clone();
        for (name, value) in &fallback.headers {
            if !headers.keys().any(|k| k.eq_ignore_ascii_case(name)) {
                headers.insert(name.clone(), value.clone());
            }
        }

        HttpOptions {
            user_agent: self.user_agent.clone().or_else(|| fallback.user_agent.clone()),
            basic_auth: self.basic_auth.clone().or_else(|| fallback.basic_auth.clone()),
            follow_redirects: self.follow_redirects.or(fallback.follow_redirects),
            timeout: self.timeout.or(fallback.timeout),
            headers,
        }
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(USER_AGENT)
    }

    pub fn follows_redirects(&self) -> bool {
        self.follow_redirects.unwrap_or(true)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT)
    }
}
