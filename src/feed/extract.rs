use std::sync::{Arc, OnceLock};

use serde::Serialize;

use crate::error::FeedError;
use crate::feed::detect::detect;
use crate::feed::item::{FeedItem, ItemRecord};
use crate::feed::sanitize::SanitizationPolicy;
use crate::feed::schema::{self, FeedDialect, Field};
use crate::xml::Document;

/// A parsed feed: dialect, metadata and items.
///
/// Items are extracted when the feed is built. Title and url are read from the
/// retained document on first access and cached.
#[derive(Debug)]
pub struct Feed {
    dialect: FeedDialect,
    document: Document,
    title: OnceLock<String>,
    url: OnceLock<String>,
    items: Vec<FeedItem>,
}

/// Serializable snapshot of a [`Feed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedRecord {
    pub dialect: FeedDialect,
    pub title: String,
    pub url: String,
    pub items: Vec<ItemRecord>,
}

impl Feed {
    /// Detects the dialect of `document` and extracts its items in document
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::UnrecognizedFeedFormat`] when the root element is
    /// neither `<rss>` nor `<feed>`.
    pub fn extract(document: Document, policy: Arc<SanitizationPolicy>) -> Result<Self, FeedError> {
        let dialect = detect(&document)?;

        let container = schema::require(dialect, Field::ItemContainer).path();
        let items: Vec<FeedItem> = document
            .select(container)
            .into_iter()
            .map(|node| FeedItem::extract(node, dialect, Arc::clone(&policy)))
            .collect();

        tracing::debug!(dialect = %dialect, items = items.len(), "Extracted feed");

        Ok(Self {
            dialect,
            document,
            title: OnceLock::new(),
            url: OnceLock::new(),
            items,
        })
    }

    pub fn dialect(&self) -> FeedDialect {
        self.dialect
    }

    /// Channel (RSS) or feed (Atom) title; `""` when absent.
    pub fn title(&self) -> &str {
        self.title.get_or_init(|| self.read(Field::Title))
    }

    /// The feed's own URL.
    ///
    /// RSS: the first non-blank `<channel><link>` (an `<atom:link>` in the
    /// channel shares the local name and is usually empty). Atom: the
    /// `rel="self"` link, then the `rel="alternate"` link, then a link with no
    /// `rel` at all, skipping blank ones. `""` when none is present.
    pub fn url(&self) -> &str {
        self.url.get_or_init(|| {
            [
                Field::FeedUrl,
                Field::AlternateFeedUrl,
                Field::UnrelatedFeedUrl,
            ]
            .into_iter()
            .filter_map(|field| schema::lookup(self.dialect, field))
            .flat_map(|entry| {
                self.document
                    .select(entry.path())
                    .into_iter()
                    .map(move |element| entry.read(element))
            })
            .map(|url| url.trim().to_owned())
            .find(|url| !url.is_empty())
            .unwrap_or_default()
        })
    }

    /// Items in document order.
    pub fn items(&self) -> &[FeedItem] {
        &self.items
    }

    pub fn as_record(&self) -> FeedRecord {
        FeedRecord {
            dialect: self.dialect,
            title: self.title().to_owned(),
            url: self.url().to_owned(),
            items: self.items.iter().map(FeedItem::as_record).collect(),
        }
    }

    fn read(&self, field: Field) -> String {
        let entry = schema::require(self.dialect, field);
        entry.read_first(&self.document.select(entry.path()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn extract(xml: &str) -> Result<Feed, FeedError> {
        let document = Document::parse(xml.as_bytes()).unwrap();
        Feed::extract(document, Arc::new(SanitizationPolicy::default()))
    }

    #[test]
    fn test_rss_metadata_and_items() {
        let feed = extract(
            r#"<rss version="2.0"><channel>
                <title>Nodeta</title>
                <link>http://blog.nodeta.fi</link>
                <item><guid>1</guid></item>
                <item><guid>2</guid></item>
                <item><guid>3</guid></item>
            </channel></rss>"#,
        )
        .unwrap();
        assert_eq!(feed.dialect(), FeedDialect::Rss);
        assert_eq!(feed.title(), "Nodeta");
        assert_eq!(feed.url(), "http://blog.nodeta.fi");
        let guids: Vec<_> = feed.items().iter().map(|i| i.guid().into_owned()).collect();
        assert_eq!(guids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_rss_url_uses_first_channel_link() {
        let feed = extract(
            r#"<rss><channel>
                <link>http://first.example</link>
                <link>http://second.example</link>
            </channel></rss>"#,
        )
        .unwrap();
        assert_eq!(feed.url(), "http://first.example");
    }

    #[test]
    fn test_rss_url_skips_blank_atom_link() {
        let feed = extract(
            r#"<rss xmlns:atom="http://www.w3.org/2005/Atom"><channel>
                <atom:link href="http://blog.example.com/feed/" rel="self"/>
                <link>http://blog.example.com</link>
            </channel></rss>"#,
        )
        .unwrap();
        assert_eq!(feed.url(), "http://blog.example.com");
    }

    #[test]
    fn test_atom_url_prefers_self_link() {
        let feed = extract(
            r#"<feed xmlns="http://www.w3.org/2005/Atom">
                <title>Example</title>
                <link rel="alternate" href="https://example.com/"/>
                <link rel="self" href="https://example.com/atom.xml"/>
            </feed>"#,
        )
        .unwrap();
        assert_eq!(feed.dialect(), FeedDialect::Atom);
        assert_eq!(feed.title(), "Example");
        assert_eq!(feed.url(), "https://example.com/atom.xml");
        assert!(feed.items().is_empty());
    }

    #[test]
    fn test_atom_url_falls_back_to_alternate_when_self_blank() {
        let feed = extract(
            r#"<feed>
                <link rel="self" href=""/>
                <link rel="alternate" href="https://example.com/feed"/>
            </feed>"#,
        )
        .unwrap();
        assert_eq!(feed.url(), "https://example.com/feed");
    }

    #[test]
    fn test_atom_url_falls_back_to_alternate_when_self_missing() {
        let feed = extract(r#"<feed><link rel="alternate" href="https://example.com/"/></feed>"#)
            .unwrap();
        assert_eq!(feed.url(), "https://example.com/");
    }

    #[test]
    fn test_atom_url_falls_back_to_link_without_rel() {
        let feed = extract(
            r#"<feed xmlns="http://www.w3.org/2005/Atom">
                <link rel="related" href="https://other.example/"/>
                <link href="http://example.org/"/>
            </feed>"#,
        )
        .unwrap();
        assert_eq!(feed.url(), "http://example.org/");
    }

    #[test]
    fn test_missing_metadata_is_empty() {
        let feed = extract("<feed/>").unwrap();
        assert_eq!(feed.title(), "");
        assert_eq!(feed.url(), "");
    }

    #[test]
    fn test_unrecognized_root() {
        let err = extract("<html><body/></html>").unwrap_err();
        assert!(matches!(err, FeedError::UnrecognizedFeedFormat(ref root) if root == "html"));
    }

    #[test]
    fn test_metadata_is_cached() {
        let feed = extract("<rss><channel><title>T</title></channel></rss>").unwrap();
        assert!(std::ptr::eq(feed.title(), feed.title()));
    }

    #[test]
    fn test_record_shape() {
        let feed = extract(
            r#"<rss><channel><title>T</title><link>http://t</link>
                <item><title>A</title><category>x</category></item>
            </channel></rss>"#,
        )
        .unwrap();
        let json = serde_json::to_value(feed.as_record()).unwrap();
        assert_eq!(json["dialect"], "rss");
        assert_eq!(json["url"], "http://t");
        assert_eq!(json["items"][0]["title"], "A");
        assert_eq!(json["items"][0]["categories"][0], "x");
        assert!(json["items"][0]["published"].is_null());
    }
}
