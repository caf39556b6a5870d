/// Comment support.
///
/// The comments part (`/word/comments.xml`) is optional. A document only
/// gets one the first time a comment is added; until then
/// [`Document::comments`](crate::ooxml::docx::Document::comments) returns
/// `None`, which is different from a comments part that exists but holds no
/// comments.
use crate::common::xml::{Walk, XmlDocument, XmlElement, XmlNode};
use crate::ooxml::docx::template;
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::constants::{content_type as ct, relationship_type as rt};
use crate::ooxml::opc::{PackURI, Relationships};

/// A comment in a Word document.
///
/// Represents a `<w:comment>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    id: u32,
    author: String,
    initials: Option<String>,
    date: Option<String>,
    text: String,
}

impl Comment {
    fn from_element(element: &XmlElement) -> Option<Self> {
        let id = element.attr_u32("id")?;
        Some(Self {
            id,
            author: element
                .attr_local("author")
                .map(|v| v.into_owned())
                .unwrap_or_default(),
            initials: element.attr_local("initials").map(|v| v.into_owned()),
            date: element.attr_local("date").map(|v| v.into_owned()),
            text: paragraph_texts(element).join("\n"),
        })
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn author(&self) -> &str {
        &self.author
    }

    #[inline]
    pub fn initials(&self) -> Option<&str> {
        self.initials.as_deref()
    }

    /// Creation date as written in the part (ISO 8601).
    #[inline]
    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    /// Plain text, one line per paragraph.
    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }
}

fn paragraph_texts(element: &XmlElement) -> Vec<String> {
    let mut texts = Vec::new();
    element.walk(&mut |_, e| {
        if e.is("p") {
            let mut text = String::new();
            e.walk(&mut |_, t| {
                if t.is("t") {
                    text.push_str(&t.text_content());
                }
                Walk::Continue
            });
            texts.push(text);
            return Walk::SkipChildren;
        }
        Walk::Continue
    });
    texts
}

/// Relationship descriptor for the comments part.
///
/// Built once per document from
/// [`LoadOptions::comments_partname`](crate::ooxml::docx::LoadOptions) and
/// passed to whatever needs to create the part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartDescriptor {
    reltype: &'static str,
    content_type: &'static str,
    partname: PackURI,
}

impl PartDescriptor {
    /// The comments descriptor for a part name such as `/word/comments.xml`.
    pub fn comments(partname: &str) -> Result<Self> {
        let partname = PackURI::new(partname)
            .map_err(|e| OoxmlError::RelationInit(format!("comments part name: {}", e)))?;
        if partname.ext() != "xml" {
            return Err(OoxmlError::RelationInit(format!(
                "comments part name '{}' is not an XML part",
                partname
            )));
        }
        Ok(Self {
            reltype: rt::COMMENTS,
            content_type: ct::WML_COMMENTS,
            partname,
        })
    }

    #[inline]
    pub fn reltype(&self) -> &'static str {
        self.reltype
    }

    #[inline]
    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    #[inline]
    pub fn partname(&self) -> &PackURI {
        &self.partname
    }

    /// Relationship id for a new relationship of this type from `rels`.
    ///
    /// Counts the relationships of the same type and proposes the next
    /// number. Falls back to the lowest free id when that one is taken.
    pub fn relationship_id(&self, rels: &Relationships) -> String {
        let candidate = format!("rId{}", rels.iter_by_type(self.reltype).count() + 1);
        if rels.get(&candidate).is_none() {
            candidate
        } else {
            rels.next_r_id()
        }
    }
}

/// Mutable comments part.
#[derive(Debug, Clone)]
pub struct CommentStore {
    partname: PackURI,
    xml: XmlDocument,
    dirty: bool,
}

impl CommentStore {
    pub fn from_document(partname: PackURI, xml: XmlDocument) -> Self {
        Self {
            partname,
            xml,
            dirty: false,
        }
    }

    /// A store for a comments part that does not exist yet.
    pub fn empty(partname: PackURI) -> Result<Self> {
        Ok(Self {
            partname,
            xml: XmlDocument::parse(template::EMPTY_COMMENTS_XML.as_bytes())?,
            dirty: true,
        })
    }

    #[inline]
    pub fn partname(&self) -> &PackURI {
        &self.partname
    }

    #[inline]
    pub fn xml(&self) -> &XmlDocument {
        &self.xml
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// All comments, in document order.
    pub fn comments(&self) -> Vec<Comment> {
        self.xml
            .root()
            .elements_named("comment")
            .filter_map(Comment::from_element)
            .collect()
    }

    pub fn get(&self, id: u32) -> Option<Comment> {
        self.element(id).and_then(Comment::from_element)
    }

    pub fn element(&self, id: u32) -> Option<&XmlElement> {
        self.xml
            .root()
            .elements_named("comment")
            .find(|e| e.attr_u32("id") == Some(id))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.xml.root().elements_named("comment").count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Max existing id plus one, or zero.
    pub fn next_id(&self) -> u32 {
        self.xml
            .root()
            .elements_named("comment")
            .filter_map(|e| e.attr_u32("id"))
            .max()
            .map_or(0, |max| max + 1)
    }

    /// Add a comment dated now and return its id.
    ///
    /// # Arguments
    ///
    /// * `author` - Author name
    /// * `initials` - Author initials, omitted from the XML when `None`
    /// * `text` - Comment body; each line becomes a paragraph
    pub fn add(&mut self, author: &str, initials: Option<&str>, text: &str) -> u32 {
        let id = self.next_id();
        let date = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();

        let mut comment = XmlElement::new("w:comment")
            .with_attr("w:id", &id.to_string())
            .with_attr("w:author", author)
            .with_attr("w:date", &date);
        if let Some(initials) = initials {
            comment.set_attr("w:initials", initials);
        }
        for line in text.split('\n') {
            comment.push(text_paragraph(line));
        }

        self.xml.root_mut().push(comment);
        self.dirty = true;
        id
    }

    /// Copy a `w:comment` from another document under a fresh id.
    pub fn import(&mut self, foreign: &XmlElement) -> u32 {
        let id = self.next_id();
        let mut copy = foreign.clone();
        copy.set_attr_local("id", &id.to_string());
        self.xml.root_mut().push(copy);
        self.dirty = true;
        id
    }
}

fn text_paragraph(text: &str) -> XmlElement {
    let mut t = XmlElement::new("w:t");
    if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
        t.set_attr("xml:space", "preserve");
    }
    if !text.is_empty() {
        t.push(XmlNode::text(text));
    }
    XmlElement::new("w:p").with_child(XmlElement::new("w:r").with_child(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CommentStore {
        CommentStore::empty(PackURI::new("/word/comments.xml").unwrap()).unwrap()
    }

    #[test]
    fn test_add_and_read_back() {
        let mut store = store();
        assert!(store.is_empty());
        let first = store.add("Ada", Some("AL"), "first line\nsecond line");
        let second = store.add("Grace", None, "  padded ");
        assert_eq!((first, second), (0, 1));
        assert!(store.is_dirty());

        let comments = store.comments();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].author(), "Ada");
        assert_eq!(comments[0].initials(), Some("AL"));
        assert_eq!(comments[0].text(), "first line\nsecond line");
        assert_eq!(comments[1].text(), "  padded ");
        assert!(comments[1].date().is_some_and(|d| d.ends_with('Z')));
        assert!(store.xml().to_xml().contains(r#"xml:space="preserve""#));
    }

    #[test]
    fn test_parse_existing_part() {
        let xml = r#"<w:comments xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:comment w:id="3" w:author="Test Author" w:initials="TA" w:date="2024-01-01"><w:p><w:r><w:t>Test comment text</w:t></w:r></w:p></w:comment></w:comments>"#;
        let store = CommentStore::from_document(
            PackURI::new("/word/comments.xml").unwrap(),
            XmlDocument::parse(xml.as_bytes()).unwrap(),
        );
        let comment = store.get(3).unwrap();
        assert_eq!(comment.author(), "Test Author");
        assert_eq!(comment.date(), Some("2024-01-01"));
        assert_eq!(comment.text(), "Test comment text");
        assert_eq!(store.next_id(), 4);
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_import_assigns_fresh_id() {
        let mut store = store();
        store.add("Ada", None, "x");
        let foreign = XmlElement::parse_fragment(
            r#"<w:comment xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" w:id="0" w:author="Guest"><w:p/></w:comment>"#,
        )
        .unwrap();
        let id = store.import(&foreign);
        assert_eq!(id, 1);
        assert_eq!(store.get(1).unwrap().author(), "Guest");
    }

    #[test]
    fn test_descriptor() {
        assert!(PartDescriptor::comments("/word/comments.xml").is_ok());
        assert!(matches!(
            PartDescriptor::comments("word/comments.xml"),
            Err(OoxmlError::RelationInit(_))
        ));

        let descriptor = PartDescriptor::comments("/word/comments.xml").unwrap();
        let mut rels = Relationships::new("/word".to_string());
        assert_eq!(descriptor.relationship_id(&rels), "rId1");
        rels.add_relationship(rt::STYLES.to_string(), "styles.xml".to_string(), "rId1".to_string(), false);
        assert_eq!(descriptor.relationship_id(&rels), "rId2");
    }
}
