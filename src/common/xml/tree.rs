//! Lossless, mutable XML element tree.
//!
//! Parts that the crate rewrites (document bodies, headers, footers, numbering,
//! comments, charts) are loaded into this tree with `quick-xml`. Text and
//! attribute values are stored in their escaped source form, so content the
//! crate never touches is written back exactly as it was read.

use super::escape::{escape_xml, unescape_xml};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use smallvec::SmallVec;
use std::borrow::Cow;
use std::fmt::{self, Write as _};

/// Standard declaration written in front of every serialized part.
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Errors raised while building an element tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlTreeError(pub String);

impl fmt::Display for XmlTreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for XmlTreeError {}

/// Path from the root element to a node, as child indices.
///
/// Indices count every child node (elements, text, comments), so a path is
/// only valid until the containing element's children are modified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath(SmallVec<[usize; 8]>);

impl NodePath {
    /// The root element itself.
    #[inline]
    pub fn root() -> Self {
        Self(SmallVec::new())
    }

    #[inline]
    pub fn from_indices(indices: &[usize]) -> Self {
        Self(SmallVec::from_slice(indices))
    }

    #[inline]
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn push(&mut self, index: usize) {
        self.0.push(index);
    }

    #[inline]
    pub fn pop(&mut self) -> Option<usize> {
        self.0.pop()
    }

    /// Index of the node within its parent, `None` for the root.
    #[inline]
    pub fn last(&self) -> Option<usize> {
        self.0.last().copied()
    }

    /// Path of the parent node, `None` for the root.
    pub fn parent(&self) -> Option<NodePath> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(SmallVec::from_slice(&self.0[..self.0.len() - 1])))
    }

    /// Path of a child of this node.
    pub fn child(&self, index: usize) -> NodePath {
        let mut path = self.clone();
        path.push(index);
        path
    }

    /// Whether `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &NodePath) -> bool {
        other.0.len() > self.0.len() && other.0.starts_with(&self.0)
    }
}

/// A single attribute; the value is kept escaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    name: String,
    raw_value: String,
}

impl Attribute {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// The unescaped attribute value.
    #[inline]
    pub fn value(&self) -> Cow<'_, str> {
        unescape_xml(&self.raw_value)
    }

    #[inline]
    pub fn raw_value(&self) -> &str {
        &self.raw_value
    }
}

/// A node in the element tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    /// Character data in escaped form.
    Text(String),
    CData(String),
    Comment(String),
}

impl XmlNode {
    #[inline]
    pub fn as_element(&self) -> Option<&XmlElement> {
        match self {
            XmlNode::Element(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub fn as_element_mut(&mut self) -> Option<&mut XmlElement> {
        match self {
            XmlNode::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Build a text node from unescaped text.
    pub fn text(text: &str) -> Self {
        XmlNode::Text(escape_xml(text))
    }
}

impl From<XmlElement> for XmlNode {
    fn from(element: XmlElement) -> Self {
        XmlNode::Element(element)
    }
}

/// Control flow for [`XmlElement::walk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    Continue,
    SkipChildren,
}

/// An XML element with its attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    name: String,
    attributes: Vec<Attribute>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    /// Create an empty element with a qualified name such as `w:p`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder form of [`set_attr`](Self::set_attr).
    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder form of [`push`](Self::push).
    pub fn with_child(mut self, child: impl Into<XmlNode>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Builder that appends an unescaped text child.
    pub fn with_text(mut self, text: &str) -> Self {
        self.children.push(XmlNode::text(text));
        self
    }

    /// Parse a standalone fragment such as `<w:p>...</w:p>`.
    pub fn parse_fragment(xml: &str) -> Result<Self, XmlTreeError> {
        XmlDocument::parse(xml.as_bytes()).map(|doc| doc.root)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without the namespace prefix.
    #[inline]
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// Namespace prefix, if any.
    #[inline]
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(p, _)| p)
    }

    #[inline]
    pub fn is(&self, local: &str) -> bool {
        self.local_name() == local
    }

    #[inline]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Unescaped value of the attribute with this exact qualified name.
    pub fn attr(&self, name: &str) -> Option<Cow<'_, str>> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(Attribute::value)
    }

    /// Unescaped value of the first attribute whose local name matches.
    pub fn attr_local(&self, local: &str) -> Option<Cow<'_, str>> {
        self.attributes
            .iter()
            .find(|a| a.local_name() == local)
            .map(Attribute::value)
    }

    /// Integer value of the first attribute whose local name matches.
    pub fn attr_u32(&self, local: &str) -> Option<u32> {
        self.attr_local(local)
            .and_then(|v| atoi_simd::parse::<u32, false, false>(v.trim().as_bytes()).ok())
    }

    /// Set (or replace) an attribute from an unescaped value.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        self.set_attr_raw(name, escape_xml(value));
    }

    /// Set an attribute whose value is already escaped.
    pub fn set_attr_raw(&mut self, name: &str, raw_value: String) {
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(attr) => attr.raw_value = raw_value,
            None => self.attributes.push(Attribute {
                name: name.to_string(),
                raw_value,
            }),
        }
    }

    /// Replace the value of the first attribute with this local name.
    ///
    /// Returns `false` when no such attribute exists.
    pub fn set_attr_local(&mut self, local: &str, value: &str) -> bool {
        match self.attributes.iter_mut().find(|a| a.local_name() == local) {
            Some(attr) => {
                attr.raw_value = escape_xml(value);
                true
            },
            None => false,
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<Attribute> {
        let pos = self.attributes.iter().position(|a| a.name == name)?;
        Some(self.attributes.remove(pos))
    }

    #[inline]
    pub fn children(&self) -> &[XmlNode] {
        &self.children
    }

    #[inline]
    pub fn children_mut(&mut self) -> &mut Vec<XmlNode> {
        &mut self.children
    }

    #[inline]
    pub fn push(&mut self, child: impl Into<XmlNode>) {
        self.children.push(child.into());
    }

    #[inline]
    pub fn insert(&mut self, index: usize, child: impl Into<XmlNode>) {
        self.children.insert(index, child.into());
    }

    #[inline]
    pub fn remove(&mut self, index: usize) -> XmlNode {
        self.children.remove(index)
    }

    /// Iterate over child elements, skipping text and comments.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(XmlNode::as_element)
    }

    /// Iterate over child elements together with their index in `children`.
    pub fn indexed_elements(&self) -> impl Iterator<Item = (usize, &XmlElement)> {
        self.children
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_element().map(|e| (i, e)))
    }

    /// Iterate over child elements with the given local name.
    pub fn elements_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |e| e.is(local))
    }

    pub fn child(&self, local: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.is(local))
    }

    pub fn child_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        self.children
            .iter_mut()
            .filter_map(XmlNode::as_element_mut)
            .find(|e| e.is(local))
    }

    /// Index in `children` of the first child element with this local name.
    pub fn position(&self, local: &str) -> Option<usize> {
        self.indexed_elements().find(|(_, e)| e.is(local)).map(|(i, _)| i)
    }

    /// Resolve a path relative to this element.
    pub fn node_at(&self, path: &NodePath) -> Option<&XmlNode> {
        let (first, rest) = path.indices().split_first()?;
        let mut node = self.children.get(*first)?;
        for &i in rest {
            node = node.as_element()?.children.get(i)?;
        }
        Some(node)
    }

    pub fn node_at_mut(&mut self, path: &NodePath) -> Option<&mut XmlNode> {
        let (first, rest) = path.indices().split_first()?;
        let mut node = self.children.get_mut(*first)?;
        for &i in rest {
            node = node.as_element_mut()?.children.get_mut(i)?;
        }
        Some(node)
    }

    /// Resolve a path to an element; the empty path is `self`.
    pub fn element_at(&self, path: &NodePath) -> Option<&XmlElement> {
        if path.depth() == 0 {
            return Some(self);
        }
        self.node_at(path).and_then(XmlNode::as_element)
    }

    pub fn element_at_mut(&mut self, path: &NodePath) -> Option<&mut XmlElement> {
        if path.depth() == 0 {
            return Some(self);
        }
        self.node_at_mut(path).and_then(XmlNode::as_element_mut)
    }

    /// Depth-first pre-order walk over descendant elements.
    ///
    /// The visitor receives each element's path (relative to `self`) and may
    /// skip its subtree.
    pub fn walk<'a, F>(&'a self, visit: &mut F)
    where
        F: FnMut(&NodePath, &'a XmlElement) -> Walk,
    {
        let mut path = NodePath::root();
        self.walk_inner(&mut path, visit);
    }

    fn walk_inner<'a, F>(&'a self, path: &mut NodePath, visit: &mut F)
    where
        F: FnMut(&NodePath, &'a XmlElement) -> Walk,
    {
        for (i, child) in self.children.iter().enumerate() {
            if let XmlNode::Element(e) = child {
                path.push(i);
                if visit(path, e) == Walk::Continue {
                    e.walk_inner(path, visit);
                }
                path.pop();
            }
        }
    }

    /// Collect paths of every descendant element with this local name.
    pub fn find_all(&self, local: &str) -> Vec<NodePath> {
        let mut found = Vec::new();
        self.walk(&mut |path, e| {
            if e.is(local) {
                found.push(path.clone());
            }
            Walk::Continue
        });
        found
    }

    /// First descendant element with this local name (document order).
    pub fn find(&self, local: &str) -> Option<&XmlElement> {
        for child in self.elements() {
            if child.is(local) {
                return Some(child);
            }
            if let Some(found) = child.find(local) {
                return Some(found);
            }
        }
        None
    }

    /// Whether any descendant element has this local name.
    #[inline]
    pub fn contains(&self, local: &str) -> bool {
        self.find(local).is_some()
    }

    /// Concatenated, unescaped text of all descendant text nodes.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                XmlNode::Text(t) => out.push_str(&unescape_xml(t)),
                XmlNode::CData(t) => out.push_str(t),
                XmlNode::Element(e) => e.collect_text(out),
                XmlNode::Comment(_) => {},
            }
        }
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, text: &str) {
        self.children.clear();
        if !text.is_empty() {
            self.children.push(XmlNode::text(text));
        }
    }

    /// Serialize this element (without declaration).
    pub fn to_xml(&self) -> String {
        let mut out = String::with_capacity(256);
        self.write_to(&mut out);
        out
    }

    pub fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for attr in &self.attributes {
            let _ = write!(out, r#" {}="{}""#, attr.name, attr.raw_value);
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                XmlNode::Element(e) => e.write_to(out),
                XmlNode::Text(t) => out.push_str(t),
                XmlNode::CData(t) => {
                    out.push_str("<![CDATA[");
                    out.push_str(t);
                    out.push_str("]]>");
                },
                XmlNode::Comment(t) => {
                    out.push_str("<!--");
                    out.push_str(t);
                    out.push_str("-->");
                },
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

/// A parsed XML part: the root element plus any top-level comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    leading_comments: Vec<String>,
    root: XmlElement,
}

impl XmlDocument {
    pub fn new(root: XmlElement) -> Self {
        Self {
            leading_comments: Vec::new(),
            root,
        }
    }

    /// Parse a complete XML document.
    pub fn parse(xml: &[u8]) -> Result<Self, XmlTreeError> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(false);

        let mut stack: Vec<XmlElement> = Vec::with_capacity(16);
        let mut root: Option<XmlElement> = None;
        let mut leading_comments = Vec::new();
        let mut buf = Vec::with_capacity(1024);

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    stack.push(element_from_start(e)?);
                },
                Ok(Event::Empty(ref e)) => {
                    let element = element_from_start(e)?;
                    attach(&mut stack, &mut root, element)?;
                },
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| XmlTreeError("unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                },
                Ok(Event::Text(ref e)) => {
                    if let Some(parent) = stack.last_mut() {
                        push_text(parent, utf8(e.as_ref())?);
                    }
                },
                Ok(Event::GeneralRef(ref e)) => {
                    if let Some(parent) = stack.last_mut() {
                        let name = utf8(e.as_ref())?;
                        push_text(parent, &format!("&{};", name));
                    }
                },
                Ok(Event::CData(ref e)) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlNode::CData(utf8(e.as_ref())?.to_string()));
                    }
                },
                Ok(Event::Comment(ref e)) => {
                    let text = utf8(e.as_ref())?.to_string();
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(XmlNode::Comment(text)),
                        None if root.is_none() => leading_comments.push(text),
                        None => {},
                    }
                },
                Ok(Event::Eof) => break,
                // Declarations, processing instructions and doctypes are regenerated or dropped
                Ok(_) => {},
                Err(e) => {
                    return Err(XmlTreeError(format!(
                        "XML parse error at {}: {}",
                        reader.buffer_position(),
                        e
                    )));
                },
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(XmlTreeError("unexpected end of document".to_string()));
        }
        let root = root.ok_or_else(|| XmlTreeError("document has no root element".to_string()))?;
        Ok(Self {
            leading_comments,
            root,
        })
    }

    #[inline]
    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    #[inline]
    pub fn root_mut(&mut self) -> &mut XmlElement {
        &mut self.root
    }

    /// Serialize with the standard declaration.
    pub fn to_xml(&self) -> String {
        let mut out = String::with_capacity(4096);
        out.push_str(XML_DECLARATION);
        out.push_str("\r\n");
        for comment in &self.leading_comments {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->");
        }
        self.root.write_to(&mut out);
        out
    }

    #[inline]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_xml().into_bytes()
    }
}

#[inline]
fn local_part(name: &str) -> &str {
    match name.rfind(':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

#[inline]
fn utf8(bytes: &[u8]) -> Result<&str, XmlTreeError> {
    std::str::from_utf8(bytes).map_err(|e| XmlTreeError(format!("invalid UTF-8: {}", e)))
}

fn element_from_start(e: &BytesStart<'_>) -> Result<XmlElement, XmlTreeError> {
    let mut element = XmlElement::new(utf8(e.name().as_ref())?);
    for attr in e.attributes() {
        let attr = attr.map_err(|err| XmlTreeError(format!("attribute error: {}", err)))?;
        let name = utf8(attr.key.as_ref())?.to_string();
        let raw = utf8(&attr.value)?;
        // Values read from single-quoted attributes may hold a bare double quote
        let raw_value = if raw.contains('"') {
            raw.replace('"', "&quot;")
        } else {
            raw.to_string()
        };
        element.attributes.push(Attribute { name, raw_value });
    }
    Ok(element)
}

fn push_text(parent: &mut XmlElement, raw: &str) {
    if let Some(XmlNode::Text(prev)) = parent.children.last_mut() {
        prev.push_str(raw);
    } else {
        parent.children.push(XmlNode::Text(raw.to_string()));
    }
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), XmlTreeError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(XmlNode::Element(element));
            Ok(())
        },
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        },
        None => Err(XmlTreeError("multiple root elements".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t xml:space="preserve">R&amp;D &lt;ok&gt; </w:t></w:r></w:p><w:sectPr/></w:body></w:document>"#;

    #[test]
    fn test_parse_and_navigate() {
        let doc = XmlDocument::parse(SAMPLE.as_bytes()).unwrap();
        let body = doc.root().child("body").unwrap();
        assert_eq!(body.elements().count(), 2);
        let t = body.find("t").unwrap();
        assert_eq!(t.text_content(), "R&D <ok> ");
        assert_eq!(t.attr("xml:space").as_deref(), Some("preserve"));
    }

    #[test]
    fn test_round_trip_keeps_escapes() {
        let doc = XmlDocument::parse(SAMPLE.as_bytes()).unwrap();
        let xml = doc.to_xml();
        assert!(xml.contains("R&amp;D &lt;ok&gt; "));
        let again = XmlDocument::parse(xml.as_bytes()).unwrap();
        assert_eq!(doc, again);
    }

    #[test]
    fn test_paths_resolve() {
        let doc = XmlDocument::parse(SAMPLE.as_bytes()).unwrap();
        let paths = doc.root().find_all("r");
        assert_eq!(paths.len(), 1);
        let run = doc.root().element_at(&paths[0]).unwrap();
        assert_eq!(run.name(), "w:r");
        let parent = doc.root().element_at(&paths[0].parent().unwrap()).unwrap();
        assert_eq!(parent.name(), "w:p");
    }

    #[test]
    fn test_single_quoted_attribute() {
        let el = XmlElement::parse_fragment(r#"<a title='say "hi"'/>"#).unwrap();
        assert_eq!(el.attr("title").as_deref(), Some(r#"say "hi""#));
        assert_eq!(el.to_xml(), r#"<a title="say &quot;hi&quot;"/>"#);
    }

    #[test]
    fn test_set_attr_escapes() {
        let mut el = XmlElement::new("wp:docPr").with_attr("id", "1");
        el.set_attr("name", "A & B");
        assert!(el.set_attr_local("id", "7"));
        assert_eq!(el.attr_u32("id"), Some(7));
        assert_eq!(el.to_xml(), r#"<wp:docPr id="7" name="A &amp; B"/>"#);
    }

    #[test]
    fn test_malformed_input() {
        assert!(XmlDocument::parse(b"<a><b></a>").is_err());
        assert!(XmlDocument::parse(b"").is_err());
    }
}
