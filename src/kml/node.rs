//! Typed XML element tree with a one-pass serializer.
//!
//! Documents are assembled as plain values and only turned into text at the
//! very end, so the builders never deal with escaping or indentation.

use std::fmt::Write;

/// A child of an [`Element`].
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// Escaped on output
    Text(String),
    /// Written verbatim inside `<![CDATA[ ... ]]>`
    CData(String),
}

/// An XML element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Element holding a single text node.
    pub fn leaf(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name).text(text)
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn child(mut self, element: Element) -> Self {
        self.children.push(Node::Element(element));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn cdata(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::CData(text.into()));
        self
    }

    pub fn push(&mut self, element: Element) {
        self.children.push(Node::Element(element));
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Direct child elements with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter_map(move |node| match node {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    /// First direct child element with the given name.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|node| match node {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    /// Follow a path of child names, e.g. `["Link", "href"]`.
    pub fn find_path(&self, path: &[&str]) -> Option<&Element> {
        path.iter().try_fold(self, |element, name| element.find(name))
    }

    /// Concatenated text and CDATA of the direct children.
    pub fn text_content(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(t) | Node::CData(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    fn has_element_children(&self) -> bool {
        self.children
            .iter()
            .any(|node| matches!(node, Node::Element(_)))
    }

    fn write_open_tag(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            let _ = write!(out, " {}=\"{}\"", key, xml_escape(value));
        }
    }

    fn write(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        out.push_str(&indent);
        self.write_open_tag(out);

        if self.children.is_empty() {
            out.push_str("/>\n");
            return;
        }

        if !self.has_element_children() {
            out.push('>');
            for node in &self.children {
                write_inline(node, out);
            }
            let _ = writeln!(out, "</{}>", self.name);
            return;
        }

        out.push_str(">\n");
        for node in &self.children {
            match node {
                Node::Element(e) => e.write(out, depth + 1),
                other => {
                    out.push_str(&"  ".repeat(depth + 1));
                    write_inline(other, out);
                    out.push('\n');
                }
            }
        }
        let _ = writeln!(out, "{}</{}>", indent, self.name);
    }
}

fn write_inline(node: &Node, out: &mut String) {
    match node {
        Node::Text(t) => out.push_str(&xml_escape(t)),
        Node::CData(t) => {
            out.push_str("<![CDATA[");
            out.push_str(&t.replace("]]>", "]]]]><![CDATA[>"));
            out.push_str("]]>");
        }
        Node::Element(e) => {
            let mut nested = String::new();
            e.write(&mut nested, 0);
            out.push_str(nested.trim_end());
        }
    }
}

/// Escape the five XML special characters for element text and attribute
/// values. `&` must go first.
pub fn xml_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// Serialize a whole document: XML declaration followed by the root element.
pub fn to_xml(root: &Element) -> String {
    let mut out = String::new();
    let _ = writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    root.write(&mut out, 0);
    out
}

/// Serialize an element without a declaration (e.g. an HTML page).
pub fn to_fragment(root: &Element) -> String {
    let mut out = String::new();
    root.write(&mut out, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(xml_escape(r#"a<b>&"c'"#), "a&lt;b&gt;&amp;&quot;c&apos;");
        assert_eq!(xml_escape("plain"), "plain");
    }

    #[test]
    fn test_serialize_nested() {
        let root = Element::new("kml")
            .attr("xmlns", "http://www.opengis.net/kml/2.2")
            .child(Element::new("Document").attr("id", "doc").child(Element::leaf("name", "A & B")))
            .child(Element::new("empty"));

        let xml = to_xml(&root);
        let expected = concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<kml xmlns=\"http://www.opengis.net/kml/2.2\">\n",
            "  <Document id=\"doc\">\n",
            "    <name>A &amp; B</name>\n",
            "  </Document>\n",
            "  <empty/>\n",
            "</kml>\n",
        );
        assert_eq!(xml, expected);
    }

    #[test]
    fn test_cdata_is_not_escaped() {
        let href = Element::new("href").cdata("http://host/x?a=1&b=2");
        let xml = to_xml(&href);
        assert!(xml.contains("<href><![CDATA[http://host/x?a=1&b=2]]></href>"));
    }

    #[test]
    fn test_cdata_terminator_split() {
        let node = Element::new("x").cdata("a]]>b");
        let xml = to_xml(&node);
        assert!(xml.contains("<![CDATA[a]]]]><![CDATA[>b]]>"));
    }

    #[test]
    fn test_find_path_and_text() {
        let root = Element::new("NetworkLink")
            .child(Element::new("Link").child(Element::leaf("refreshInterval", "4")));
        let interval = root.find_path(&["Link", "refreshInterval"]).unwrap();
        assert_eq!(interval.text_content(), "4");
        assert!(root.find_path(&["Link", "href"]).is_none());
    }

    #[test]
    fn test_find_outlives_name() {
        let root = Element::new("Document")
            .child(Element::leaf("name", "first"))
            .child(Element::leaf("name", "second"));
        let found = {
            let key = String::from("name");
            root.find(&key)
        };
        assert_eq!(found.map(|e| e.text_content()), Some("first".to_string()));
        assert_eq!(root.children_named("name").count(), 2);
    }

    #[test]
    fn test_attribute_escaping() {
        let el = Element::new("a").attr("title", "\"quoted\"");
        assert_eq!(el.attribute("title"), Some("\"quoted\""));
        assert!(to_xml(&el).contains("title=\"&quot;quoted&quot;\""));
    }
}
