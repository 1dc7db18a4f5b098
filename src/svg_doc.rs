use anyhow::{Context, Result};
use std::{fmt::Write as _, fs, path::Path};

pub const SVG_NS: &str = "http://www.w3.org/2000/svg";
pub const SODIPODI_NS: &str = "http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd";
const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Owned, mutable copy of a `roxmltree` parse. Only the root element and its
/// descendants are kept; the XML declaration is regenerated on write and a
/// DOCTYPE is dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub root: Element,
}

/// A qualified name: namespace URI, the prefix it was written with, and the local part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub namespace: Option<String>,
    pub prefix: Option<String>,
    pub local: String,
}

/// A namespace declaration introduced on an element (`xmlns` or `xmlns:prefix`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    pub prefix: Option<String>,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: QName,
    pub namespaces: Vec<NamespaceDecl>,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

impl QName {
    /// An unqualified name, as used by plain SVG attributes like `fill`
    pub fn local(local: &str) -> Self {
        Self {
            namespace: None,
            prefix: None,
            local: local.to_string(),
        }
    }

    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.namespace.as_deref() == Some(namespace) && self.local == local
    }

    fn write_to(&self, out: &mut String) {
        if let Some(prefix) = &self.prefix {
            out.push_str(prefix);
            out.push(':');
        }
        out.push_str(&self.local);
    }
}

impl Element {
    /// Create an element in the same namespace, and with the same prefix, as `sibling_of`
    pub fn new_like(sibling_of: &QName, local: &str) -> Self {
        Self {
            name: QName {
                namespace: sibling_of.namespace.clone(),
                prefix: sibling_of.prefix.clone(),
                local: local.to_string(),
            },
            namespaces: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Value of an attribute that has no namespace
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.namespace.is_none() && a.name.local == local)
            .map(|a| a.value.as_str())
    }

    /// Set an attribute that has no namespace, replacing any existing value in place
    pub fn set_attr(&mut self, local: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|a| a.name.namespace.is_none() && a.name.local == local)
        {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute {
                name: QName::local(local),
                value,
            }),
        }
    }

    pub fn remove_attr(&mut self, local: &str) {
        self.attributes
            .retain(|a| !(a.name.namespace.is_none() && a.name.local == local));
    }

    /// Visit this element and every descendant element, depth first
    pub fn for_each_element_mut(&mut self, f: &mut impl FnMut(&mut Element)) {
        f(self);
        for child in &mut self.children {
            if let Node::Element(element) = child {
                element.for_each_element_mut(f);
            }
        }
    }

    #[cfg(test)]
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }
}

impl Document {
    pub fn open(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let options = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..roxmltree::ParsingOptions::default()
        };
        let doc = roxmltree::Document::parse_with_options(text, options)?;

        Ok(Self {
            root: convert_element(doc.root_element()),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_xml_string())
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn to_xml_string(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        write_element(&self.root, &mut out);
        out.push('\n');
        out
    }
}

fn convert_element(node: roxmltree::Node) -> Element {
    let tag = node.tag_name();
    let name = QName {
        namespace: tag.namespace().map(str::to_string),
        prefix: tag
            .namespace()
            .and_then(|uri| element_prefix(node, uri))
            .map(str::to_string),
        local: tag.name().to_string(),
    };

    // roxmltree reports every namespace in scope; only keep the ones this element introduced
    let parent = node.parent_element();
    let namespaces = node
        .namespaces()
        .filter(|ns| ns.uri() != XML_NS)
        .filter(|ns| {
            parent.map_or(true, |p| {
                !p.namespaces()
                    .any(|pns| pns.name() == ns.name() && pns.uri() == ns.uri())
            })
        })
        .map(|ns| NamespaceDecl {
            prefix: ns.name().map(str::to_string),
            uri: ns.uri().to_string(),
        })
        .collect();

    let attributes = node
        .attributes()
        .map(|attr| Attribute {
            name: QName {
                namespace: attr.namespace().map(str::to_string),
                prefix: attr
                    .namespace()
                    .and_then(|uri| attribute_prefix(node, uri))
                    .map(str::to_string),
                local: attr.name().to_string(),
            },
            value: attr.value().to_string(),
        })
        .collect();

    let children = node
        .children()
        .filter_map(|child| {
            if child.is_element() {
                Some(Node::Element(convert_element(child)))
            } else if child.is_text() {
                child.text().map(|t| Node::Text(t.to_string()))
            } else if child.is_comment() {
                child.text().map(|t| Node::Comment(t.to_string()))
            } else {
                None
            }
        })
        .collect();

    Element {
        name,
        namespaces,
        attributes,
        children,
    }
}

/// Prefix to write an element in `uri` with; `None` when the default namespace covers it
fn element_prefix<'a>(node: roxmltree::Node<'a, '_>, uri: &str) -> Option<&'a str> {
    if node.default_namespace() == Some(uri) {
        return None;
    }
    node.lookup_prefix(uri)
}

/// Attributes never pick up the default namespace, so a namespaced one always needs a prefix
fn attribute_prefix<'a>(node: roxmltree::Node<'a, '_>, uri: &str) -> Option<&'a str> {
    if uri == XML_NS {
        return Some("xml");
    }
    node.namespaces()
        .find(|ns| ns.uri() == uri && ns.name().is_some())
        .and_then(|ns| ns.name())
}

fn write_element(element: &Element, out: &mut String) {
    out.push('<');
    element.name.write_to(out);

    for ns in &element.namespaces {
        match &ns.prefix {
            Some(prefix) => {
                let _ = write!(out, " xmlns:{prefix}=\"");
            }
            None => out.push_str(" xmlns=\""),
        }
        escape_into(&ns.uri, true, out);
        out.push('"');
    }

    for attr in &element.attributes {
        out.push(' ');
        attr.name.write_to(out);
        out.push_str("=\"");
        escape_into(&attr.value, true, out);
        out.push('"');
    }

    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }

    out.push('>');
    for child in &element.children {
        match child {
            Node::Element(child) => write_element(child, out),
            Node::Text(text) => escape_into(text, false, out),
            Node::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
        }
    }
    out.push_str("</");
    element.name.write_to(out);
    out.push('>');
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\n' if attribute => out.push_str("&#10;"),
            '\t' if attribute => out.push_str("&#9;"),
            _ => out.push(c),
        }
    }
}
