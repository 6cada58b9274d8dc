use crate::xml::{unescape, Element, Node};

/// Decodes a text-bearing node according to its declared `type` attribute.
///
/// Rules, in order:
///
/// 1. No node: `""`.
/// 2. No `type` attribute: plain character data.
/// 3. `type="html"` or `type="text/html"`: the node's inner markup with HTML
///    entities resolved, so pre-escaped `&lt;p&gt;` becomes literal `<p>`.
/// 4. `type="xhtml"`: the child elements serialized as markup, verbatim.
/// 5. Anything else (`text`, `text/plain`, ...): plain character data.
///
/// Only the first node of the set is considered.
pub fn decode(nodes: &[&Element]) -> String {
    let Some(node) = nodes.first() else {
        return String::new();
    };

    match node.attr("type") {
        None => node.text(),
        Some("html" | "text/html") => unescaped_markup(node),
        Some("xhtml") => child_markup(node),
        Some(_) => node.text(),
    }
}

/// Inner markup with one level of entity escaping removed.
///
/// CDATA sections are already literal, so their contents pass through as-is.
fn unescaped_markup(node: &Element) -> String {
    let mut out = String::new();
    for child in node.nodes() {
        match child {
            Node::Text(raw) => out.push_str(&unescape(raw)),
            Node::CData(data) => out.push_str(data),
            Node::Element(element) => out.push_str(&unescape(&element.outer_markup())),
        }
    }
    out
}

fn child_markup(node: &Element) -> String {
    let mut out = String::new();
    for element in node.children() {
        element.write_markup(&mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::Document;
    use proptest::prelude::*;

    fn decode_str(xml: &str) -> String {
        let doc = Document::parse(xml.as_bytes()).unwrap();
        decode(&[doc.root()])
    }

    #[test]
    fn test_empty_node_set() {
        assert_eq!(decode(&[]), "");
    }

    #[test]
    fn test_untyped_is_plain_text() {
        assert_eq!(decode_str("<c>Fish &amp; chips</c>"), "Fish & chips");
    }

    #[test]
    fn test_untyped_does_not_interpret_markup() {
        // Escaped markup stays literal text, child elements are flattened
        assert_eq!(decode_str("<c>&lt;b&gt;x&lt;/b&gt;</c>"), "<b>x</b>");
        assert_eq!(decode_str("<c><b>x</b> y</c>"), "x y");
    }

    #[test]
    fn test_untyped_cdata_kept_verbatim() {
        assert_eq!(
            decode_str("<c><![CDATA[<p>It&#8217;s</p>\n]]></c>"),
            "<p>It&#8217;s</p>\n"
        );
    }

    #[test]
    fn test_html_unescapes_escaped_markup() {
        assert_eq!(
            decode_str(r#"<content type="html">&lt;p&gt;Hello &amp;amp; bye&lt;/p&gt;</content>"#),
            "<p>Hello &amp; bye</p>"
        );
    }

    #[test]
    fn test_text_html_alias() {
        assert_eq!(
            decode_str(r#"<summary type="text/html">&lt;em&gt;hi&lt;/em&gt;</summary>"#),
            "<em>hi</em>"
        );
    }

    #[test]
    fn test_html_passes_cdata_markup_through() {
        assert_eq!(
            decode_str(r#"<content type="html"><![CDATA[<p>caf&eacute;</p>]]></content>"#),
            "<p>caf&eacute;</p>"
        );
    }

    #[test]
    fn test_html_keeps_unescaped_child_elements_as_markup() {
        assert_eq!(
            decode_str(r#"<content type="html"><p>a &amp;lt; b</p></content>"#),
            "<p>a &lt; b</p>"
        );
    }

    #[test]
    fn test_xhtml_serializes_children_without_unescaping() {
        let xml = r#"<content type="xhtml">
            <div xmlns="http://www.w3.org/1999/xhtml"><p>Fish &amp; <b>chips</b></p></div>
        </content>"#;
        assert_eq!(decode_str(xml), "<div><p>Fish &amp; <b>chips</b></p></div>");
    }

    #[test]
    fn test_xhtml_keeps_empty_elements_unmodified() {
        let xml = r#"<content type="xhtml"><div><p></p><script src="x.js"></script><a name="top"></a><hr/></div></content>"#;
        assert_eq!(
            decode_str(xml),
            r#"<div><p></p><script src="x.js"></script><a name="top"></a><hr/></div>"#
        );
    }

    #[test]
    fn test_xhtml_and_html_differ_on_same_markup() {
        let html = decode_str(r#"<c type="html"><p>&amp;lt;</p></c>"#);
        let xhtml = decode_str(r#"<c type="xhtml"><p>&amp;lt;</p></c>"#);
        assert_eq!(html, "<p>&lt;</p>");
        assert_eq!(xhtml, "<p>&amp;lt;</p>");
    }

    #[test]
    fn test_unknown_type_is_plain_text() {
        assert_eq!(
            decode_str(r#"<title type="text">&lt;b&gt; <i>x</i></title>"#),
            "<b> x"
        );
    }

    #[test]
    fn test_only_first_node_decoded() {
        let doc = Document::parse(b"<r><c>one</c><c>two</c></r>").unwrap();
        let nodes: Vec<_> = doc.root().children().collect();
        assert_eq!(decode(&nodes), "one");
    }

    proptest! {
        #[test]
        fn prop_untyped_text_round_trips(text in "[a-zA-Z0-9 <>&\"']{0,64}") {
            let xml = format!("<c>{}</c>", quick_xml::escape::escape(text.as_str()));
            prop_assert_eq!(decode_str(&xml), text);
        }
    }
}
