//! Per-dialect schema registry.
//!
//! Every field the extractors read is described here once, as a path
//! expression plus an extraction mode. The extraction code itself is shared by
//! both dialects; only this table knows where RSS and Atom keep things.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Serialize;

use crate::xml::{Element, Path};

/// The two supported syndication dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedDialect {
    /// RSS 2.0 (`<rss><channel>...`)
    Rss,
    /// Atom 1.0 (`<feed>...`)
    Atom,
}

impl std::fmt::Display for FeedDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedDialect::Rss => f.write_str("rss"),
            FeedDialect::Atom => f.write_str("atom"),
        }
    }
}

/// Semantic names for the values the extractors look up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Document element that identifies the dialect
    Root,
    Title,
    FeedUrl,
    /// Atom only: the `rel="alternate"` link used when `self` is missing
    AlternateFeedUrl,
    /// Atom only: a link without `rel`, which defaults to `alternate`
    UnrelatedFeedUrl,
    ItemContainer,
    ItemGuid,
    ItemLink,
    ItemTitle,
    ItemAuthor,
    ItemCategories,
    ItemPublished,
    /// Atom only
    ItemUpdated,
    ItemDescription,
    ItemContent,
}

impl Field {
    pub const ALL: [Field; 15] = [
        Field::Root,
        Field::Title,
        Field::FeedUrl,
        Field::AlternateFeedUrl,
        Field::UnrelatedFeedUrl,
        Field::ItemContainer,
        Field::ItemGuid,
        Field::ItemLink,
        Field::ItemTitle,
        Field::ItemAuthor,
        Field::ItemCategories,
        Field::ItemPublished,
        Field::ItemUpdated,
        Field::ItemDescription,
        Field::ItemContent,
    ];
}

/// How a value is read from a matched element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extract {
    /// Character data of the element
    Text,
    /// Value of the named attribute
    Attribute(&'static str),
}

/// Where a field lives in one dialect, with its path already compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    pub expr: &'static str,
    pub extract: Extract,
    path: Path,
}

type Definition = (&'static str, Extract);

const fn text(expr: &'static str) -> Definition {
    (expr, Extract::Text)
}

const fn attr(expr: &'static str, name: &'static str) -> Definition {
    (expr, Extract::Attribute(name))
}

fn definition(dialect: FeedDialect, field: Field) -> Option<Definition> {
    use FeedDialect::{Atom, Rss};

    let entry = match (dialect, field) {
        (Rss, Field::Root) => text("/rss"),
        (Rss, Field::Title) => text("/rss/channel/title"),
        (Rss, Field::FeedUrl) => text("/rss/channel/link"),
        (Rss, Field::ItemContainer) => text("/rss/channel/item"),
        (Rss, Field::ItemGuid) => text("guid"),
        (Rss, Field::ItemLink) => text("link"),
        (Rss, Field::ItemTitle) => text("title"),
        (Rss, Field::ItemAuthor) => text("creator"),
        (Rss, Field::ItemCategories) => text("category"),
        (Rss, Field::ItemPublished) => text("pubDate"),
        (Rss, Field::ItemDescription) => text("description"),
        (Rss, Field::ItemContent) => text("encoded"),
        (Rss, Field::AlternateFeedUrl | Field::UnrelatedFeedUrl | Field::ItemUpdated) => {
            return None;
        }

        (Atom, Field::Root) => text("/feed"),
        (Atom, Field::Title) => text("/feed/title"),
        (Atom, Field::FeedUrl) => attr("/feed/link[@rel='self']", "href"),
        (Atom, Field::AlternateFeedUrl) => attr("/feed/link[@rel='alternate']", "href"),
        (Atom, Field::UnrelatedFeedUrl) => attr("/feed/link[not(@rel)]", "href"),
        (Atom, Field::ItemContainer) => text("/feed/entry"),
        (Atom, Field::ItemGuid) => text("id"),
        (Atom, Field::ItemLink) => attr("link", "href"),
        (Atom, Field::ItemTitle) => text("title"),
        (Atom, Field::ItemAuthor) => text("author/name"),
        (Atom, Field::ItemCategories) => attr("category", "term"),
        (Atom, Field::ItemPublished) => text("published"),
        (Atom, Field::ItemUpdated) => text("updated"),
        (Atom, Field::ItemDescription) => text("summary"),
        (Atom, Field::ItemContent) => text("content"),
    };
    Some(entry)
}

/// Every defined entry, compiled on first use.
///
/// # Panics
///
/// Panics if the table holds an expression the path engine rejects; the
/// schema tests compile every entry.
fn registry() -> &'static HashMap<(FeedDialect, Field), FieldPath> {
    static REGISTRY: OnceLock<HashMap<(FeedDialect, Field), FieldPath>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut entries = HashMap::new();
        for dialect in [FeedDialect::Rss, FeedDialect::Atom] {
            for field in Field::ALL {
                let Some((expr, extract)) = definition(dialect, field) else {
                    continue;
                };
                let path = match Path::parse(expr) {
                    Ok(path) => path,
                    Err(e) => panic!("schema path `{expr}` does not compile: {e}"),
                };
                entries.insert((dialect, field), FieldPath { expr, extract, path });
            }
        }
        entries
    })
}

/// Returns the schema entry for `field` in `dialect`, if the dialect has one.
///
/// RSS has no `ItemUpdated`, `AlternateFeedUrl` or `UnrelatedFeedUrl`.
pub fn lookup(dialect: FeedDialect, field: Field) -> Option<&'static FieldPath> {
    registry().get(&(dialect, field))
}

/// Like [`lookup`], for pairs the caller knows are defined.
///
/// # Panics
///
/// Panics if `dialect` has no entry for `field`. That is a bug in the calling
/// extractor (asking RSS for an Atom-only field), never a property of the
/// input document.
pub fn require(dialect: FeedDialect, field: Field) -> &'static FieldPath {
    match lookup(dialect, field) {
        Some(entry) => entry,
        None => panic!("schema has no {field:?} entry for {dialect}"),
    }
}

impl FieldPath {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the value of a single element according to the extraction mode.
    ///
    /// A missing attribute reads as an empty string.
    pub fn read(&self, element: &Element) -> String {
        match self.extract {
            Extract::Text => element.text(),
            Extract::Attribute(name) => element.attr(name).unwrap_or_default().to_owned(),
        }
    }

    /// Reads the first of `elements`, or `""` when there are none.
    pub fn read_first(&self, elements: &[&Element]) -> String {
        elements
            .first()
            .map(|element| self.read(element))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_entry_compiles() {
        for dialect in [FeedDialect::Rss, FeedDialect::Atom] {
            for field in Field::ALL {
                if let Some(entry) = lookup(dialect, field) {
                    let path = entry.path();
                    assert_eq!(path.as_str(), entry.expr);
                }
            }
        }
    }

    #[test]
    fn test_atom_defines_every_field() {
        for field in Field::ALL {
            assert!(lookup(FeedDialect::Atom, field).is_some(), "{field:?}");
        }
    }

    #[test]
    fn test_rss_lacks_atom_only_fields() {
        assert!(lookup(FeedDialect::Rss, Field::ItemUpdated).is_none());
        assert!(lookup(FeedDialect::Rss, Field::AlternateFeedUrl).is_none());
        assert!(lookup(FeedDialect::Rss, Field::UnrelatedFeedUrl).is_none());
        assert!(lookup(FeedDialect::Rss, Field::ItemPublished).is_some());
    }

    #[test]
    fn test_container_and_metadata_paths_are_absolute() {
        for dialect in [FeedDialect::Rss, FeedDialect::Atom] {
            for field in [Field::Root, Field::Title, Field::FeedUrl, Field::ItemContainer] {
                assert!(require(dialect, field).path().is_absolute());
            }
            assert!(!require(dialect, Field::ItemGuid).path().is_absolute());
        }
    }

    #[test]
    fn test_atom_link_and_category_use_attributes() {
        assert_eq!(
            require(FeedDialect::Atom, Field::ItemLink).extract,
            Extract::Attribute("href")
        );
        assert_eq!(
            require(FeedDialect::Atom, Field::ItemCategories).extract,
            Extract::Attribute("term")
        );
        assert_eq!(
            require(FeedDialect::Rss, Field::ItemCategories).extract,
            Extract::Text
        );
    }

    #[test]
    fn test_entries_are_compiled_once() {
        let first = require(FeedDialect::Atom, Field::ItemAuthor);
        let second = require(FeedDialect::Atom, Field::ItemAuthor);
        assert!(std::ptr::eq(first, second));
        assert!(std::ptr::eq(first.path(), second.path()));
    }

    #[test]
    #[should_panic(expected = "schema has no ItemUpdated entry for rss")]
    fn test_require_undefined_pair_panics() {
        require(FeedDialect::Rss, Field::ItemUpdated);
    }

    #[test]
    fn test_dialect_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&FeedDialect::Atom).unwrap(), "\"atom\"");
    }
}
