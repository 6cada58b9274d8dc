//! Read-time sanitization of item fields.
//!
//! Extraction always stores the raw values. A [`SanitizationPolicy`] decides,
//! per field, whether an accessor hands out the raw value or the output of the
//! policy's [`Sanitizer`]. The policy belongs to one `FeedParser` and is shared
//! (read-only) by every item that parser produces.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transforms untrusted feed text.
pub trait Sanitizer: Send + Sync {
    fn sanitize(&self, input: &str) -> String;
}

/// The default sanitizer: hands text back unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelfSanitizer;

impl Sanitizer for SelfSanitizer {
    fn sanitize(&self, input: &str) -> String {
        input.to_owned()
    }
}

/// SEC-001: Removes terminal control characters and ANSI escape sequences.
///
/// Tab, newline and carriage return are kept. CSI (`ESC [` ... final byte),
/// OSC (`ESC ]` ... BEL or `ESC \`) and bare `ESC` are dropped along with the
/// other C0 controls and DEL.
#[derive(Debug, Default, Clone, Copy)]
pub struct ControlCharSanitizer;

impl Sanitizer for ControlCharSanitizer {
    fn sanitize(&self, input: &str) -> String {
        strip_control_chars(input).into_owned()
    }
}

fn is_stripped_control(c: char) -> bool {
    c == '\x7f' || (c < ' ' && !matches!(c, '\t' | '\n' | '\r'))
}

enum Escape {
    None,
    /// Saw ESC, waiting for the introducer
    Pending,
    /// Inside `ESC [`, until a byte in `@`..=`~`
    Csi,
    /// Inside `ESC ]`, until BEL or `ESC \`
    Osc,
    /// Inside OSC, just saw ESC
    OscEscape,
}

/// Strips control characters; borrows when there is nothing to strip.
pub fn strip_control_chars(input: &str) -> Cow<'_, str> {
    if !input.chars().any(is_stripped_control) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut state = Escape::None;
    for c in input.chars() {
        state = match (state, c) {
            (Escape::None, '\x1b') => Escape::Pending,
            (Escape::None, c) => {
                if !is_stripped_control(c) {
                    out.push(c);
                }
                Escape::None
            }
            (Escape::Pending, '[') => Escape::Csi,
            (Escape::Pending, ']') => Escape::Osc,
            (Escape::Pending, '\x1b') => Escape::Pending,
            (Escape::Pending, c) => {
                // Bare ESC: drop it, keep what follows
                if !is_stripped_control(c) {
                    out.push(c);
                }
                Escape::None
            }
            (Escape::Csi, '@'..='~') => Escape::None,
            (Escape::Csi, _) => Escape::Csi,
            (Escape::Osc, '\x07') => Escape::None,
            (Escape::Osc, '\x1b') => Escape::OscEscape,
            (Escape::Osc, _) => Escape::Osc,
            (Escape::OscEscape, '\\') => Escape::None,
            (Escape::OscEscape, _) => Escape::Osc,
        };
    }
    Cow::Owned(out)
}

/// Item fields a policy can target.
///
/// Timestamps are not text and cannot be sanitized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemField {
    Guid,
    Link,
    Title,
    Author,
    Description,
    Content,
    /// Applied to each category individually
    Categories,
}

impl ItemField {
    pub const ALL: [ItemField; 7] = [
        ItemField::Guid,
        ItemField::Link,
        ItemField::Title,
        ItemField::Author,
        ItemField::Description,
        ItemField::Content,
        ItemField::Categories,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ItemField::Guid => "guid",
            ItemField::Link => "link",
            ItemField::Title => "title",
            ItemField::Author => "author",
            ItemField::Description => "description",
            ItemField::Content => "content",
            ItemField::Categories => "categories",
        }
    }
}

impl fmt::Display for ItemField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown item field `{0}` (expected one of: guid, link, title, author, description, content, categories)")]
pub struct UnknownItemField(String);

impl FromStr for ItemField {
    type Err = UnknownItemField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ItemField::ALL
            .into_iter()
            .find(|field| field.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownItemField(s.to_owned()))
    }
}

/// Which sanitizer runs, and on which fields.
#[derive(Clone)]
pub struct SanitizationPolicy {
    sanitizer: Arc<dyn Sanitizer>,
    fields: HashSet<ItemField>,
}

impl SanitizationPolicy {
    pub fn new(sanitizer: Arc<dyn Sanitizer>, fields: impl IntoIterator<Item = ItemField>) -> Self {
        Self {
            sanitizer,
            fields: fields.into_iter().collect(),
        }
    }

    /// The field set used when the caller does not choose one.
    pub fn default_fields() -> HashSet<ItemField> {
        HashSet::from([ItemField::Content])
    }

    pub fn applies_to(&self, field: ItemField) -> bool {
        self.fields.contains(&field)
    }

    pub fn fields(&self) -> &HashSet<ItemField> {
        &self.fields
    }

    /// Returns `raw` untouched unless `field` is covered by the policy.
    pub fn read<'a>(&self, field: ItemField, raw: &'a str) -> Cow<'a, str> {
        if self.applies_to(field) {
            Cow::Owned(self.sanitizer.sanitize(raw))
        } else {
            Cow::Borrowed(raw)
        }
    }
}

impl Default for SanitizationPolicy {
    fn default() -> Self {
        Self::new(Arc::new(SelfSanitizer), Self::default_fields())
    }
}

impl fmt::Debug for SanitizationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields: Vec<_> = self.fields.iter().map(|field| field.as_str()).collect();
        fields.sort_unstable();
        f.debug_struct("SanitizationPolicy")
            .field("sanitizer", &"<dyn Sanitizer>")
            .field("fields", &fields)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Shouting;

    impl Sanitizer for Shouting {
        fn sanitize(&self, input: &str) -> String {
            input.to_uppercase()
        }
    }

    #[test]
    fn test_default_policy_covers_content_only() {
        let policy = SanitizationPolicy::default();
        assert!(policy.applies_to(ItemField::Content));
        for field in ItemField::ALL.into_iter().filter(|f| *f != ItemField::Content) {
            assert!(!policy.applies_to(field), "{field}");
        }
    }

    #[test]
    fn test_read_sanitizes_only_policy_fields() {
        let policy = SanitizationPolicy::new(Arc::new(Shouting), [ItemField::Author]);
        assert_eq!(policy.read(ItemField::Author, "otto"), "OTTO");
        let raw = policy.read(ItemField::Title, "otto");
        assert!(matches!(raw, Cow::Borrowed("otto")));
    }

    #[test]
    fn test_self_sanitizer_is_identity() {
        assert_eq!(SelfSanitizer.sanitize("<p>a & b</p>"), "<p>a & b</p>");
    }

    #[test]
    fn test_item_field_from_str() {
        assert_eq!("content".parse::<ItemField>().unwrap(), ItemField::Content);
        assert_eq!(" Author ".parse::<ItemField>().unwrap(), ItemField::Author);
        let err = "published".parse::<ItemField>().unwrap_err();
        assert!(err.to_string().contains("published"));
    }

    #[test]
    fn test_item_field_deserializes_lowercase() {
        let fields: Vec<ItemField> = serde_json::from_str(r#"["guid","categories"]"#).unwrap();
        assert_eq!(fields, vec![ItemField::Guid, ItemField::Categories]);
    }

    #[test]
    fn test_debug_lists_fields_sorted() {
        let policy = SanitizationPolicy::new(
            Arc::new(SelfSanitizer),
            [ItemField::Title, ItemField::Author],
        );
        let debug = format!("{:?}", policy);
        assert!(debug.contains(r#"["author", "title"]"#), "{debug}");
    }

    #[test]
    fn test_strip_clean_text_borrows() {
        let input = "line1\nline2\ttabbed\r\n日本語";
        assert!(matches!(strip_control_chars(input), Cow::Borrowed(_)));
    }

    #[test]
    fn test_strip_c0_controls_and_del() {
        assert_eq!(strip_control_chars("he\x00ll\x07o\x08 w\x0bor\x7fld"), "hello world");
    }

    #[test]
    fn test_strip_csi_sequences() {
        assert_eq!(strip_control_chars("\x1b[31mRed\x1b[0m up\x1b[2A!"), "Red up!");
    }

    #[test]
    fn test_strip_osc_sequences() {
        assert_eq!(strip_control_chars("\x1b]0;title\x07safe"), "safe");
        assert_eq!(strip_control_chars("\x1b]0;title\x1b\\safe"), "safe");
    }

    #[test]
    fn test_strip_bare_escape_keeps_following_text() {
        assert_eq!(strip_control_chars("before\x1bafter"), "beforeafter");
    }

    #[test]
    fn test_control_char_sanitizer() {
        assert_eq!(
            ControlCharSanitizer.sanitize("Evil\x1b[31m Feed \u{1F389}"),
            "Evil Feed \u{1F389}"
        );
    }
}
