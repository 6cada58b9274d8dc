use crate::error::FeedError;
use crate::feed::schema::{self, FeedDialect, Field};
use crate::xml::Document;

/// Classifies a parsed document as RSS or Atom.
///
/// The RSS root path is checked first, then the Atom root path. There is no
/// default dialect: any other root element is rejected.
///
/// # Errors
///
/// Returns [`FeedError::UnrecognizedFeedFormat`] naming the root element when
/// neither root path matches.
pub fn detect(document: &Document) -> Result<FeedDialect, FeedError> {
    for dialect in [FeedDialect::Rss, FeedDialect::Atom] {
        let root = schema::require(dialect, Field::Root).path();
        if !document.select(root).is_empty() {
            tracing::debug!(dialect = %dialect, "Detected feed dialect");
            return Ok(dialect);
        }
    }
    Err(FeedError::UnrecognizedFeedFormat(
        document.root().name().to_owned(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect_str(xml: &str) -> Result<FeedDialect, FeedError> {
        detect(&Document::parse(xml.as_bytes()).unwrap())
    }

    #[test]
    fn test_detect_rss() {
        let xml = r#"<?xml version="1.0"?><rss version="2.0"><channel/></rss>"#;
        assert_eq!(detect_str(xml).unwrap(), FeedDialect::Rss);
    }

    #[test]
    fn test_detect_atom_with_namespace() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>x</title></feed>"#;
        assert_eq!(detect_str(xml).unwrap(), FeedDialect::Atom);
    }

    #[test]
    fn test_detect_prefixed_atom_root() {
        let xml = r#"<atom:feed xmlns:atom="http://www.w3.org/2005/Atom"/>"#;
        assert_eq!(detect_str(xml).unwrap(), FeedDialect::Atom);
    }

    #[test]
    fn test_unknown_root_rejected() {
        let result = detect_str("<html><body>Hello</body></html>");
        match result {
            Err(FeedError::UnrecognizedFeedFormat(root)) => assert_eq!(root, "html"),
            other => panic!("Expected UnrecognizedFeedFormat, got {:?}", other),
        }
    }

    #[test]
    fn test_rss_nested_below_other_root_rejected() {
        let result = detect_str("<wrapper><rss><channel/></rss></wrapper>");
        assert!(matches!(result, Err(FeedError::UnrecognizedFeedFormat(_))));
    }
}
