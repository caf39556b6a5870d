/// Paragraph and Run views for Word documents.
///
/// Views borrow the parsed body part they come from. Each one also carries
/// the [`PartId`] and [`NodePath`] of its element so that callers can turn a
/// view back into a handle for mutation, such as a [`RunAnchor`].
use crate::common::xml::{NodePath, Walk, XmlElement};
use crate::ooxml::docx::document::PartId;
use crate::ooxml::docx::drawing::Drawing;
use crate::ooxml::docx::table::Table;
use smallvec::SmallVec;
use std::borrow::Cow;

/// Handle to a run inside one of a document's body parts.
///
/// A path is positional: inserting or removing content before the run in
/// the same container invalidates it. Operations that take an anchor check
/// that it still points at a `w:r` and report
/// [`InvalidTarget`](crate::ooxml::error::OoxmlError::InvalidTarget)
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunAnchor {
    part: PartId,
    path: NodePath,
}

impl RunAnchor {
    pub fn new(part: PartId, path: NodePath) -> Self {
        Self { part, path }
    }

    #[inline]
    pub fn part(&self) -> PartId {
        self.part
    }

    /// Path of the `w:r` element relative to the part's root element.
    #[inline]
    pub fn path(&self) -> &NodePath {
        &self.path
    }
}

/// A paragraph in a Word document.
///
/// Represents a `<w:p>` element. Paragraphs contain runs which in turn
/// contain the actual text and drawings.
///
/// # Example
///
/// ```rust,no_run
/// use rambutan::ooxml::docx::Document;
///
/// let doc = Document::open("document.docx")?;
/// for para in doc.paragraphs() {
///     println!("Paragraph text: {}", para.text());
///     for run in para.runs() {
///         println!("  Run: {}", run.text());
///     }
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct Paragraph<'a> {
    element: &'a XmlElement,
    part: PartId,
    path: NodePath,
}

impl<'a> Paragraph<'a> {
    pub(crate) fn new(element: &'a XmlElement, part: PartId, path: NodePath) -> Self {
        Self {
            element,
            part,
            path,
        }
    }

    #[inline]
    pub fn element(&self) -> &'a XmlElement {
        self.element
    }

    #[inline]
    pub fn part(&self) -> PartId {
        self.part
    }

    #[inline]
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Get the text content of this paragraph.
    ///
    /// Concatenates the text of every run, including runs nested in
    /// hyperlinks, fields and content controls.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for run in self.runs() {
            text.push_str(&run.text());
        }
        text
    }

    /// Runs in document order.
    ///
    /// Runs inside drawings (text boxes) belong to the drawing and are not
    /// listed.
    pub fn runs(&self) -> SmallVec<[Run<'a>; 8]> {
        let mut runs = SmallVec::new();
        let element: &'a XmlElement = self.element;
        element.walk(&mut |path, e| {
            if e.is("r") {
                runs.push(Run::new(e, self.part, concat_path(&self.path, path)));
                return Walk::SkipChildren;
            }
            Walk::Continue
        });
        runs
    }

    /// `w:pStyle` of the paragraph, if any.
    pub fn style(&self) -> Option<Cow<'a, str>> {
        self.element
            .child("pPr")
            .and_then(|ppr| ppr.child("pStyle"))
            .and_then(|style| style.attr_local("val"))
    }

    /// `(numId, ilvl)` from the paragraph's numbering properties.
    pub fn numbering(&self) -> Option<(u32, u32)> {
        let num_pr = self.element.child("pPr")?.child("numPr")?;
        let num_id = num_pr.child("numId")?.attr_u32("val")?;
        let ilvl = num_pr
            .child("ilvl")
            .and_then(|e| e.attr_u32("val"))
            .unwrap_or(0);
        Some((num_id, ilvl))
    }

    /// Whether any run holds a DrawingML drawing or a VML picture.
    pub fn has_pictures(&self) -> bool {
        self.element.contains("drawing") || self.element.contains("pict")
    }

    /// Whether the paragraph ends a section (`w:pPr/w:sectPr`).
    pub fn has_section_break(&self) -> bool {
        self.element
            .child("pPr")
            .is_some_and(|ppr| ppr.child("sectPr").is_some())
    }
}

/// A run of content within a paragraph.
///
/// Represents a `<w:r>` element.
#[derive(Debug, Clone)]
pub struct Run<'a> {
    element: &'a XmlElement,
    part: PartId,
    path: NodePath,
}

impl<'a> Run<'a> {
    pub(crate) fn new(element: &'a XmlElement, part: PartId, path: NodePath) -> Self {
        Self {
            element,
            part,
            path,
        }
    }

    #[inline]
    pub fn element(&self) -> &'a XmlElement {
        self.element
    }

    /// Handle for mutating or merging at this run.
    pub fn anchor(&self) -> RunAnchor {
        RunAnchor::new(self.part, self.path.clone())
    }

    /// Text of the run: `w:t` content, tabs as `\t` and breaks as `\n`.
    pub fn text(&self) -> String {
        run_text(self.element)
    }

    pub fn has_drawing(&self) -> bool {
        self.element.contains("drawing")
    }

    /// Drawings held by this run, including alternate content choices.
    pub fn drawings(&self) -> Vec<Drawing<'a>> {
        let mut drawings = Vec::new();
        let element: &'a XmlElement = self.element;
        element.walk(&mut |path, e| {
            if e.is("inline") || e.is("anchor") {
                drawings.push(Drawing::new(e, self.part, concat_path(&self.path, path)));
                return Walk::SkipChildren;
            }
            Walk::Continue
        });
        drawings
    }
}

/// A block-level item of a body: a paragraph or a table.
#[derive(Debug, Clone)]
pub enum Block<'a> {
    Paragraph(Paragraph<'a>),
    Table(Table<'a>),
}

impl<'a> Block<'a> {
    pub fn element(&self) -> &'a XmlElement {
        match self {
            Block::Paragraph(p) => p.element(),
            Block::Table(t) => t.element(),
        }
    }

    pub fn path(&self) -> &NodePath {
        match self {
            Block::Paragraph(p) => p.path(),
            Block::Table(t) => t.path(),
        }
    }
}

/// Paragraphs and tables directly inside a container (`w:body`, `w:tc`,
/// `w:hdr`, `w:ftr`), looking through content controls and custom XML.
pub(crate) fn collect_blocks<'a>(
    container: &'a XmlElement,
    part: PartId,
    path: &NodePath,
    out: &mut Vec<Block<'a>>,
) {
    for (i, child) in container.indexed_elements() {
        let child_path = path.child(i);
        match child.local_name() {
            "p" => out.push(Block::Paragraph(Paragraph::new(child, part, child_path))),
            "tbl" => out.push(Block::Table(Table::new(child, part, child_path))),
            "sdt" => {
                if let Some(j) = child.position("sdtContent") {
                    if let Some(content) = child.element_at(&NodePath::from_indices(&[j])) {
                        collect_blocks(content, part, &child_path.child(j), out);
                    }
                }
            },
            "customXml" => collect_blocks(child, part, &child_path, out),
            _ => {},
        }
    }
}

pub(crate) fn run_text(run: &XmlElement) -> String {
    let mut text = String::new();
    for child in run.elements() {
        match child.local_name() {
            "t" => text.push_str(&child.text_content()),
            "tab" | "ptab" => text.push('\t'),
            "br" | "cr" => text.push('\n'),
            "noBreakHyphen" => text.push('-'),
            _ => {},
        }
    }
    text
}

/// `base` followed by the indices of `relative`.
pub(crate) fn concat_path(base: &NodePath, relative: &NodePath) -> NodePath {
    let mut path = base.clone();
    for &i in relative.indices() {
        path.push(i);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAGRAPH: &str = r#"<w:p xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:pPr><w:pStyle w:val="Heading1"/><w:numPr><w:ilvl w:val="1"/><w:numId w:val="3"/></w:numPr></w:pPr><w:r><w:t>Hello</w:t></w:r><w:hyperlink><w:r><w:tab/><w:t xml:space="preserve">wide &amp; world</w:t></w:r></w:hyperlink></w:p>"#;

    #[test]
    fn test_paragraph_view() {
        let element = XmlElement::parse_fragment(PARAGRAPH).unwrap();
        let para = Paragraph::new(&element, PartId::MAIN, NodePath::from_indices(&[0, 2]));
        assert_eq!(para.text(), "Hello\twide & world");
        assert_eq!(para.style().as_deref(), Some("Heading1"));
        assert_eq!(para.numbering(), Some((3, 1)));
        assert!(!para.has_pictures());
        assert!(!para.has_section_break());

        let runs = para.runs();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].anchor().path().indices(), &[0, 2, 2, 0]);
        assert_eq!(runs[1].text(), "\twide & world");
    }

    #[test]
    fn test_collect_blocks_through_sdt() {
        let body = XmlElement::parse_fragment(
            r#"<w:body xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:p/><w:sdt><w:sdtPr/><w:sdtContent><w:tbl/><w:p/></w:sdtContent></w:sdt><w:sectPr/></w:body>"#,
        )
        .unwrap();
        let mut blocks = Vec::new();
        collect_blocks(&body, PartId::MAIN, &NodePath::from_indices(&[0]), &mut blocks);
        assert_eq!(blocks.len(), 3);
        assert!(matches!(blocks[1], Block::Table(_)));
        assert_eq!(blocks[2].path().indices(), &[0, 1, 1, 1]);
    }
}
