use std::borrow::Cow;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::feed::content;
use crate::feed::sanitize::{ItemField, SanitizationPolicy};
use crate::feed::schema::{self, FeedDialect, Field};
use crate::xml::Element;

/// One normalized feed entry.
///
/// Values are stored exactly as extracted. Every text accessor runs the value
/// through the owning parser's [`SanitizationPolicy`] on each call, so two
/// reads of the same field always agree.
#[derive(Debug, Clone)]
pub struct FeedItem {
    guid: String,
    link: String,
    title: String,
    author: String,
    description: String,
    content: String,
    categories: Vec<String>,
    published: Option<DateTime<Utc>>,
    updated: Option<DateTime<Utc>>,
    policy: Arc<SanitizationPolicy>,
}

/// Serializable snapshot of a [`FeedItem`], with sanitization applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemRecord {
    pub guid: String,
    pub link: String,
    pub title: String,
    pub author: String,
    pub description: String,
    pub content: String,
    pub categories: Vec<String>,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

impl FeedItem {
    /// Extracts an item from its container element (`<item>` or `<entry>`).
    ///
    /// Never fails: absent fields become `""`, `[]` or `None`.
    ///
    /// - RSS: `link`, `guid` and categories are element text.
    /// - Atom: `link` is the first link's `href`, categories are `term`
    ///   attributes, and a missing `published` falls back to `updated`.
    pub fn extract(node: &Element, dialect: FeedDialect, policy: Arc<SanitizationPolicy>) -> Self {
        let first = |field: Field| {
            let entry = schema::require(dialect, field);
            entry.read_first(&node.select(entry.path()))
        };
        let decoded = |field: Field| {
            let entry = schema::require(dialect, field);
            content::decode(&node.select(entry.path()))
        };

        let categories_entry = schema::require(dialect, Field::ItemCategories);
        let categories = node
            .select(categories_entry.path())
            .into_iter()
            .map(|element| categories_entry.read(element))
            .collect();

        let published = parse_timestamp(&first(Field::ItemPublished));
        let updated = schema::lookup(dialect, Field::ItemUpdated)
            .and_then(|entry| parse_timestamp(&entry.read_first(&node.select(entry.path()))));

        FeedItem {
            guid: first(Field::ItemGuid).trim().to_owned(),
            link: first(Field::ItemLink).trim().to_owned(),
            title: first(Field::ItemTitle),
            author: first(Field::ItemAuthor),
            description: decoded(Field::ItemDescription),
            content: decoded(Field::ItemContent),
            categories,
            published: published.or(updated),
            updated,
            policy,
        }
    }

    pub fn guid(&self) -> Cow<'_, str> {
        self.policy.read(ItemField::Guid, &self.guid)
    }

    pub fn link(&self) -> Cow<'_, str> {
        self.policy.read(ItemField::Link, &self.link)
    }

    pub fn title(&self) -> Cow<'_, str> {
        self.policy.read(ItemField::Title, &self.title)
    }

    pub fn author(&self) -> Cow<'_, str> {
        self.policy.read(ItemField::Author, &self.author)
    }

    pub fn description(&self) -> Cow<'_, str> {
        self.policy.read(ItemField::Description, &self.description)
    }

    pub fn content(&self) -> Cow<'_, str> {
        self.policy.read(ItemField::Content, &self.content)
    }

    pub fn categories(&self) -> Vec<Cow<'_, str>> {
        self.categories
            .iter()
            .map(|category| self.policy.read(ItemField::Categories, category))
            .collect()
    }

    /// Publication time; for Atom entries without `<published>`, the
    /// `<updated>` time. `None` when neither is present or parseable.
    pub fn published(&self) -> Option<DateTime<Utc>> {
        self.published
    }

    /// Atom `<updated>`; always `None` for RSS.
    pub fn updated(&self) -> Option<DateTime<Utc>> {
        self.updated
    }

    pub fn as_record(&self) -> ItemRecord {
        ItemRecord {
            guid: self.guid().into_owned(),
            link: self.link().into_owned(),
            title: self.title().into_owned(),
            author: self.author().into_owned(),
            description: self.description().into_owned(),
            content: self.content().into_owned(),
            categories: self
                .categories()
                .into_iter()
                .map(Cow::into_owned)
                .collect(),
            published: self.published,
            updated: self.updated,
        }
    }
}

/// Parses RFC 3339 (Atom) or RFC 2822 (RSS `pubDate`) timestamps.
///
/// Feeds mix the two often enough that both are always tried. Unparseable
/// values are logged and treated as absent.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match DateTime::parse_from_rfc3339(raw).or_else(|_| DateTime::parse_from_rfc2822(raw)) {
        Ok(timestamp) => Some(timestamp.with_timezone(&Utc)),
        Err(e) => {
            tracing::debug!(value = %raw, error = %e, "Ignoring unparseable feed timestamp");
            None
        }
    }
}
