//! Configuration file parser for ~/.config/feedparser/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde, though we log a warning when the file
//! contains potential typos.
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::feed::{ControlCharSanitizer, ItemField, Sanitizer, SelfSanitizer};
use crate::fetch::{HttpOptions, DEFAULT_MAX_REDIRECTS};
use crate::parser::ParserOptions;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Built-in sanitizers selectable from the config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SanitizerKind {
    /// Hand values back unchanged
    #[default]
    Passthrough,
    /// Strip terminal control characters and ANSI escapes
    ControlChars,
}

impl SanitizerKind {
    pub fn build(self) -> Arc<dyn Sanitizer> {
        match self {
            SanitizerKind::Passthrough => Arc::new(SelfSanitizer),
            SanitizerKind::ControlChars => Arc::new(ControlCharSanitizer),
        }
    }
}

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
///
/// SEC-015: Custom Debug impl masks credential-bearing headers to prevent
/// secret leakage in logs, error messages, and debug output.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// User agent override. `None` sends the built-in identifying agent.
    pub user_agent: Option<String>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Whether the transport follows same-scheme redirects.
    pub follow_redirects: bool,

    /// HTTP to HTTPS upgrade hops followed before giving up.
    pub max_redirects: usize,

    /// Sanitizer applied to `sanitize_fields`.
    pub sanitizer: SanitizerKind,

    /// Item fields passed through the sanitizer on read.
    pub sanitize_fields: Vec<ItemField>,

    /// Extra request headers.
    pub headers: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout_secs: 30,
            follow_redirects: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            sanitizer: SanitizerKind::default(),
            sanitize_fields: vec![ItemField::Content],
            headers: BTreeMap::new(),
        }
    }
}

/// Header names whose values are never printed.
const SENSITIVE_HEADERS: [&str; 3] = ["authorization", "cookie", "proxy-authorization"];

/// SEC-015: Mask credential headers in Debug output to prevent secret leakage.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let headers: BTreeMap<&str, &str> = self
            .headers
            .iter()
            .map(|(name, value)| {
                let sensitive = SENSITIVE_HEADERS
                    .iter()
                    .any(|s| s.eq_ignore_ascii_case(name));
                (name.as_str(), if sensitive { "[REDACTED]" } else { value.as_str() })
            })
            .collect();

        f.debug_struct("Config")
            .field("user_agent", &self.user_agent)
            .field("timeout_secs", &self.timeout_secs)
            .field("follow_redirects", &self.follow_redirects)
            .field("max_redirects", &self.max_redirects)
            .field("sanitizer", &self.sanitizer)
            .field("sanitize_fields", &self.sanitize_fields)
            .field("headers", &headers)
            .finish()
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "user_agent",
        "timeout_secs",
        "follow_redirects",
        "max_redirects",
        "sanitizer",
        "sanitize_fields",
        "headers",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading to prevent memory exhaustion
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content)
    }

    /// Parses configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!("Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(
            sanitizer = ?config.sanitizer,
            max_redirects = config.max_redirects,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// HTTP options layer described by this config.
    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            user_agent: self.user_agent.clone(),
            basic_auth: None,
            follow_redirects: Some(self.follow_redirects),
            timeout: Some(Duration::from_secs(self.timeout_secs)),
            headers: self.headers.clone(),
        }
    }

    /// Applies this config to `options`, replacing HTTP, sanitization and
    /// redirect settings but keeping the source.
    pub fn apply(&self, options: ParserOptions) -> ParserOptions {
        options
            .with_http(self.http_options())
            .with_sanitizer(self.sanitizer.build())
            .with_sanitize_fields(self.sanitize_fields.iter().copied())
            .with_max_redirects(self.max_redirects)
    }
}

// ============================================================================
// Tests
// ============================================================================
