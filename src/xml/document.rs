use std::borrow::Cow;

use quick_xml::escape::{self, resolve_html5_entity};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use super::path::Path;

/// SEC-003: Maximum allowed element nesting depth.
/// Prevents runaway memory use from maliciously crafted, deeply nested feeds.
const MAX_XML_DEPTH: usize = 256;

/// Longest entity reference (`&...;`) considered during lenient unescaping.
const MAX_ENTITY_LEN: usize = 40;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Errors that can occur while reading a document into a tree.
#[derive(Debug, Error)]
pub enum XmlError {
    /// The XML reader rejected the input.
    #[error("XML parse error: {0}")]
    Malformed(String),

    /// The input contained no root element.
    #[error("XML document has no root element")]
    Empty,

    /// SEC-003: Nesting depth exceeds safety limit.
    #[error("XML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),
}

fn malformed(err: impl std::fmt::Display) -> XmlError {
    XmlError::Malformed(err.to_string())
}

/// A child of an [`Element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Character data exactly as written in the source, entities still escaped.
    Text(String),
    /// Contents of a `<![CDATA[...]]>` section (literal, never escaped).
    CData(String),
}

/// An element with its namespace prefix removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
    /// Written as `<name/>` in the source rather than `<name></name>`
    self_closing: bool,
}

/// A fully materialized XML document.
///
/// Built in one pass over the input; there is no streaming access. Namespace
/// declarations are discarded and every element/attribute name is stored by its
/// local part, so `<dc:creator>` is addressed as `creator` and
/// `<content:encoded>` as `encoded`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Element,
}

impl Document {
    /// Parses `bytes` into a tree.
    ///
    /// Input is UTF-8 (optional BOM) unless the XML declaration names another
    /// ASCII-compatible encoding such as `ISO-8859-1` or `windows-1252`; names,
    /// attributes and character data are then decoded from that encoding.
    ///
    /// # Errors
    ///
    /// - [`XmlError::Malformed`] for syntax errors, mismatched or unclosed tags
    /// - [`XmlError::Empty`] when no root element is present
    /// - [`XmlError::MaxDepthExceeded`] when nesting exceeds the safety limit
    ///
    /// # Security
    ///
    /// SEC-002: `quick-xml` never expands `<!ENTITY>` declarations from a DOCTYPE.
    /// Entity references are resolved only against the fixed XML/HTML5 tables in
    /// [`unescape`], at read time.
    pub fn parse(bytes: &[u8]) -> Result<Self, XmlError> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let mut reader = Reader::from_reader(bytes);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => {
                    if stack.len() >= MAX_XML_DEPTH {
                        return Err(XmlError::MaxDepthExceeded(MAX_XML_DEPTH));
                    }
                    stack.push(Element::from_start(&start, &reader, false)?);
                }
                Ok(Event::Empty(start)) => {
                    let element = Element::from_start(&start, &reader, true)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| XmlError::Malformed("unexpected closing tag".into()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(text)) => {
                    // Whitespace and stray text outside the root element is ignored
                    if let Some(parent) = stack.last_mut() {
                        let raw = reader.decoder().decode(&text).map_err(malformed)?;
                        parent.children.push(Node::Text(raw.into_owned()));
                    }
                }
                Ok(Event::CData(data)) => {
                    if let Some(parent) = stack.last_mut() {
                        let raw = reader.decoder().decode(&data).map_err(malformed)?;
                        parent.children.push(Node::CData(raw.into_owned()));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(XmlError::Malformed(format!(
                        "{e} (at byte {})",
                        reader.buffer_position()
                    )))
                }
                // Declarations, comments, processing instructions, DOCTYPE
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(XmlError::Malformed(format!(
                "unclosed element <{}>",
                open.name
            )));
        }

        root.map(|root| Document { root }).ok_or(XmlError::Empty)
    }

    /// The document element.
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Evaluates `path` against the document.
    ///
    /// The first step of the path is matched against the root element itself,
    /// whether or not the expression starts with `/`.
    pub fn select(&self, path: &Path) -> Vec<&Element> {
        path.select_from_document(&self.root)
    }
}

/// Places a completed element under its parent, or makes it the root.
fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(XmlError::Malformed(format!(
            "multiple root elements (found <{}>)",
            element.name
        ))),
    }
}

impl Element {
    fn from_start(
        start: &BytesStart<'_>,
        reader: &Reader<&[u8]>,
        self_closing: bool,
    ) -> Result<Self, XmlError> {
        let decoder = reader.decoder();
        let name = decoder
            .decode(start.local_name().as_ref())
            .map_err(malformed)?
            .into_owned();

        let mut attributes = Vec::new();
        for attr_result in start.attributes() {
            let attr = match attr_result {
                Ok(attr) => attr,
                Err(e) => {
                    tracing::warn!(element = %name, error = %e, "Skipping malformed XML attribute");
                    continue;
                }
            };

            // Namespace bindings carry no data once prefixes are stripped
            let qualified = attr.key.as_ref();
            if qualified == b"xmlns" || qualified.starts_with(b"xmlns:") {
                continue;
            }

            let key = decoder
                .decode(attr.key.local_name().as_ref())
                .map_err(malformed)?
                .into_owned();
            let raw = decoder.decode(&attr.value).map_err(malformed)?;
            attributes.push((key, unescape(&raw).into_owned()));
        }

        Ok(Element {
            name,
            attributes,
            children: Vec::new(),
            self_closing,
        })
    }

    /// Local element name (namespace prefix removed).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unescaped value of the attribute with local name `name`.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// All child nodes, in document order.
    pub fn nodes(&self) -> &[Node] {
        &self.children
    }

    /// Child elements, in document order.
    pub fn children(&self) -> impl Iterator<Item = &Element> + '_ {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// Evaluates a relative `path` with this element as context.
    pub fn select(&self, path: &Path) -> Vec<&Element> {
        path.select_from(self)
    }

    /// Concatenated character data of all descendants, entities resolved.
    ///
    /// Markup is dropped: `<b>bold</b> text` yields `bold text`.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                Node::Element(child) => child.collect_text(out),
                Node::Text(raw) => out.push_str(&unescape(raw)),
                Node::CData(data) => out.push_str(data),
            }
        }
    }

    /// Serializes this element and its subtree as XML.
    ///
    /// Empty elements keep the form they had in the source: `<br/>` stays
    /// self-closing and `<p></p>` keeps its end tag.
    pub fn outer_markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }

    /// Serializes the children of this element (text and elements) as XML.
    pub fn inner_markup(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            write_node(node, &mut out);
        }
        out
    }

    pub(crate) fn write_markup(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape::escape(value.as_str()));
            out.push('"');
        }
        if self.self_closing && self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for node in &self.children {
            write_node(node, out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Element(element) => element.write_markup(out),
        // Raw text is still escaped, so it can be emitted verbatim
        Node::Text(raw) => out.push_str(raw),
        Node::CData(data) => {
            out.push_str("<![CDATA[");
            out.push_str(data);
            out.push_str("]]>");
        }
    }
}

/// Resolves character and entity references in `raw`.
///
/// Numeric references (`&#8217;`, `&#x2019;`), the XML builtins and the HTML5
/// named-entity table are recognized. Unlike a strict XML unescape this never
/// fails: a bare `&` or an unknown reference is kept literally, which is what
/// real-world feeds containing `Q&A` in their titles need.
///
/// Returns `Cow::Borrowed` when the input contains no `&` (common case).
pub fn unescape(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }
    if let Ok(text) = escape::unescape_with(raw, resolve_html5_entity) {
        return text;
    }

    // Slow path: resolve reference by reference, keeping anything unrecognized
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let reference = tail
            .find(';')
            .filter(|&end| end <= MAX_ENTITY_LEN)
            .map(|end| &tail[..=end]);
        match reference.and_then(|r| {
            escape::unescape_with(r, resolve_html5_entity)
                .ok()
                .map(|decoded| (r.len(), decoded))
        }) {
            Some((consumed, decoded)) => {
                out.push_str(&decoded);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> Document {
        Document::parse(xml.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_builds_nested_tree() {
        let doc = parse("<rss><channel><title>Hi</title><item/><item/></channel></rss>");
        assert_eq!(doc.root().name(), "rss");
        let channel = doc.root().children().next().unwrap();
        assert_eq!(channel.name(), "channel");
        let names: Vec<_> = channel.children().map(Element::name).collect();
        assert_eq!(names, vec!["title", "item", "item"]);
    }

    #[test]
    fn test_namespaces_are_stripped() {
        let doc = parse(
            r#"<rss xmlns:dc="http://purl.org/dc/elements/1.1/" version="2.0">
                <dc:creator xml:lang="en">Otto</dc:creator>
            </rss>"#,
        );
        let root = doc.root();
        assert_eq!(root.attr("version"), Some("2.0"));
        assert_eq!(root.attr("dc"), None);
        assert_eq!(root.attr("xmlns"), None);
        let creator = root.children().next().unwrap();
        assert_eq!(creator.name(), "creator");
        assert_eq!(creator.attr("lang"), Some("en"));
    }

    #[test]
    fn test_default_namespace_attribute_dropped() {
        let doc = parse(r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>T</title></feed>"#);
        assert_eq!(doc.root().name(), "feed");
        assert_eq!(doc.root().attr("xmlns"), None);
    }

    #[test]
    fn test_text_resolves_entities_and_cdata() {
        let doc = parse("<t>a &amp; b &lt;p&gt; &#8217; <![CDATA[<i>&#8217;</i>]]></t>");
        assert_eq!(doc.root().text(), "a & b <p> \u{2019} <i>&#8217;</i>");
    }

    #[test]
    fn test_text_drops_markup() {
        let doc = parse("<t><b>bold</b> text</t>");
        assert_eq!(doc.root().text(), "bold text");
    }

    #[test]
    fn test_inner_markup_keeps_raw_text() {
        let doc = parse(r#"<c><div class="x">Fish &amp; chips<br/></div></c>"#);
        assert_eq!(
            doc.root().inner_markup(),
            r#"<div class="x">Fish &amp; chips<br/></div>"#
        );
    }

    #[test]
    fn test_markup_keeps_empty_element_form() {
        let doc = parse(r#"<c><p></p><script src="x.js"></script><br/><a name="top"></a></c>"#);
        assert_eq!(
            doc.root().inner_markup(),
            r#"<p></p><script src="x.js"></script><br/><a name="top"></a>"#
        );
    }

    #[test]
    fn test_outer_markup_escapes_attribute_values() {
        let doc = parse(r#"<a title="x &amp; &quot;y&quot;"/>"#);
        assert_eq!(doc.root().attr("title"), Some("x & \"y\""));
        assert_eq!(doc.root().outer_markup(), r#"<a title="x &amp; &quot;y&quot;"/>"#);
    }

    #[test]
    fn test_bom_is_skipped() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"<rss/>");
        let doc = Document::parse(&bytes).unwrap();
        assert_eq!(doc.root().name(), "rss");
    }

    #[test]
    fn test_declared_latin1_encoding_decoded() {
        let bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\
            <rss version=\"2.0\"><channel><title lang=\"fr\xE9\">Caf\xE9</title></channel></rss>";
        let doc = Document::parse(bytes).unwrap();
        let title = doc.root().children().next().unwrap().children().next().unwrap();
        assert_eq!(title.text(), "Caf\u{e9}");
        assert_eq!(title.attr("lang"), Some("fr\u{e9}"));
    }

    #[test]
    fn test_undeclared_encoding_must_be_utf8() {
        let result = Document::parse(b"<rss><title>Caf\xE9</title></rss>");
        assert!(matches!(result, Err(XmlError::Malformed(_))));
    }

    #[test]
    fn test_empty_document_rejected() {
        let result = Document::parse(b"<?xml version=\"1.0\"?>\n<!-- nothing -->");
        assert!(matches!(result, Err(XmlError::Empty)));
    }

    #[test]
    fn test_mismatched_tags_rejected() {
        let result = Document::parse(b"<rss><channel></rss>");
        assert!(matches!(result, Err(XmlError::Malformed(_))));
    }

    #[test]
    fn test_unclosed_root_rejected() {
        let result = Document::parse(b"<rss><channel></channel>");
        assert!(matches!(result, Err(XmlError::Malformed(_))));
    }

    #[test]
    fn test_excessive_depth_rejected() {
        let xml = "<a>".repeat(MAX_XML_DEPTH + 1);
        let result = Document::parse(xml.as_bytes());
        assert!(matches!(result, Err(XmlError::MaxDepthExceeded(_))));
    }

    #[test]
    fn test_unescape_borrows_when_clean() {
        assert!(matches!(unescape("plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn test_unescape_html5_named_entities() {
        assert_eq!(unescape("caf&eacute; &nbsp;&mdash;"), "café \u{a0}\u{2014}");
    }

    #[test]
    fn test_unescape_keeps_bare_ampersand() {
        assert_eq!(unescape("Q&A &amp; more &bogus; &lt;"), "Q&A & more &bogus; <");
    }
}
