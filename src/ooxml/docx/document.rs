//! The document object graph.
//!
//! [`Document`] wraps a [`Package`] and keeps every body part (main document,
//! headers, footers) parsed in memory, together with flat indexes of the
//! tables and drawings they contain and the package-wide stores: media,
//! drawing ids, numbering and comments. All edits go through the parsed
//! trees; they are written back into the package when the document is
//! serialized.

use crate::common::xml::{NodePath, Walk, XmlDocument, XmlElement, XmlNode};
use crate::ooxml::docx::chart::ChartRegistry;
use crate::ooxml::docx::comment::{Comment, CommentStore, PartDescriptor};
use crate::ooxml::docx::drawing::{self, Drawing};
use crate::ooxml::docx::format::{PictureData, PictureFormat};
use crate::ooxml::docx::identifier::IdentifierManager;
use crate::ooxml::docx::media::{ContentStore, Interned, MediaItem};
use crate::ooxml::docx::numbering::{NumberingAllocation, NumberingFormat, NumberingStore};
use crate::ooxml::docx::options::LoadOptions;
use crate::ooxml::docx::package::Package;
use crate::ooxml::docx::paragraph::{Block, Paragraph, Run, RunAnchor, collect_blocks};
use crate::ooxml::docx::table::Table;
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::constants::{content_type as ct, namespace as ns, relationship_type as rt};
use crate::ooxml::opc::{BlobPart, OpcPackage, PackURI, Part, XmlPart};
use std::io::{Read, Seek, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default part name of a numbering part created on demand.
const NUMBERING_PARTNAME: &str = "/word/numbering.xml";

/// Index of a body part within a [`Document`]. The main document is always
/// [`PartId::MAIN`]; headers and footers follow in the order the main
/// document's relationships declare them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartId(pub(crate) usize);

impl PartId {
    pub const MAIN: PartId = PartId(0);

    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Main,
    Header,
    Footer,
}

/// A parsed body part.
#[derive(Debug, Clone)]
pub(crate) struct BodyPart {
    pub(crate) kind: PartKind,
    pub(crate) partname: PackURI,
    pub(crate) xml: XmlDocument,
    pub(crate) dirty: bool,
}

impl BodyPart {
    fn parse(kind: PartKind, part: &dyn Part) -> Result<Self> {
        Ok(Self {
            kind,
            partname: part.partname().clone(),
            xml: XmlDocument::parse(part.blob())?,
            dirty: false,
        })
    }

    /// Path of the element holding the part's blocks: `w:body` for the main
    /// document, the root for headers and footers.
    pub(crate) fn container_path(&self) -> Option<NodePath> {
        match self.kind {
            PartKind::Main => self
                .xml
                .root()
                .position("body")
                .map(|i| NodePath::from_indices(&[i])),
            PartKind::Header | PartKind::Footer => Some(NodePath::root()),
        }
    }
}

/// A Word document loaded into memory.
///
/// # Examples
///
/// ```rust,no_run
/// use rambutan::ooxml::docx::{Document, NumberingFormat};
///
/// let mut doc = Document::open("report.docx")?;
/// println!("{} tables, {} drawings", doc.tables().len(), doc.drawings().len());
///
/// let list = doc.allocate_numbering(&[NumberingFormat::DECIMAL, NumberingFormat::LOWER_LETTER])?;
/// let anchor = doc.append_run()?;
/// doc.set_run_text(&anchor, "first item")?;
/// doc.set_numbering(&anchor, list.num_id, 0)?;
/// doc.save("report-out.docx")?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct Document {
    pub(crate) package: Package,
    pub(crate) options: LoadOptions,
    pub(crate) parts: Vec<BodyPart>,
    tables: Vec<(PartId, NodePath)>,
    drawings: Vec<(PartId, NodePath)>,
    pub(crate) ids: IdentifierManager,
    pub(crate) media: ContentStore,
    pub(crate) numbering: Option<NumberingStore>,
    pub(crate) comments: Option<CommentStore>,
    comments_descriptor: std::result::Result<PartDescriptor, String>,
    pub(crate) charts: ChartRegistry,
}

impl Document {
    /// A new, empty document.
    pub fn new() -> Result<Self> {
        Self::load(Package::new()?, LoadOptions::default())
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load(Package::open(path)?, LoadOptions::default())
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::load(Package::from_bytes(data)?, LoadOptions::default())
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        Self::load(Package::from_reader(reader)?, LoadOptions::default())
    }

    /// Build the graph for a package.
    ///
    /// Walks the main document and every header and footer, records each
    /// drawing id with the identifier manager and, when
    /// [`LoadOptions::adjust_drawing_ids`] is set, rewrites ids that collide
    /// with one seen earlier. Drawings without a usable id are logged and
    /// skipped.
    pub fn load(package: Package, options: LoadOptions) -> Result<Self> {
        let main = package.main_partname()?;
        let main_part = package.part(&main)?;
        let main_rels = main_part.rels().clone();
        let mut parts = vec![BodyPart::parse(PartKind::Main, main_part)?];

        for rel in main_rels.iter() {
            let kind = match rel.reltype() {
                rt::HEADER => PartKind::Header,
                rt::FOOTER => PartKind::Footer,
                _ => continue,
            };
            if rel.is_external() {
                continue;
            }
            let partname = rel.target_partname()?;
            if parts.iter().any(|p| p.partname == partname) {
                continue;
            }
            match package.part(&partname) {
                Ok(part) => parts.push(BodyPart::parse(kind, part)?),
                Err(e) => warn!(%partname, error = %e, "skipping missing header or footer"),
            }
        }

        let numbering = match main_rels.iter_by_type(rt::NUMBERING).next() {
            Some(rel) => {
                let partname = rel.target_partname()?;
                let xml = XmlDocument::parse(package.part(&partname)?.blob())?;
                Some(NumberingStore::from_document(partname, xml))
            },
            None => None,
        };

        let comments = match main_rels.iter_by_type(rt::COMMENTS).next() {
            Some(rel) => {
                let partname = rel.target_partname()?;
                let xml = XmlDocument::parse(package.part(&partname)?.blob())?;
                Some(CommentStore::from_document(partname, xml))
            },
            None => None,
        };

        let comments_descriptor = PartDescriptor::comments(&options.comments_partname)
            .map_err(|e| {
                warn!(error = %e, "comment creation unavailable");
                e.to_string()
            });

        let mut media = ContentStore::new();
        for part in package.opc_package().iter_parts() {
            if let Some(format) = PictureFormat::from_content_type(part.content_type()) {
                media.register(MediaItem::new(
                    Arc::from(part.blob()),
                    format,
                    part.partname().clone(),
                ));
            }
        }

        let ids = if options.track_drawing_ids {
            IdentifierManager::new()
        } else {
            IdentifierManager::disabled()
        };

        let mut document = Self {
            package,
            options,
            parts,
            tables: Vec::new(),
            drawings: Vec::new(),
            ids,
            media,
            numbering,
            comments,
            comments_descriptor,
            charts: ChartRegistry::default(),
        };
        document.reserve_loaded_drawings();
        document.reindex();

        debug!(
            parts = document.parts.len(),
            tables = document.tables.len(),
            drawings = document.drawings.len(),
            media = document.media.len(),
            "indexed document"
        );
        Ok(document)
    }

    /// Record every drawing id, rewriting collisions in adjust mode.
    ///
    /// Ids are collected in one read-only pass and rewritten in a second.
    /// All ids are observed before any is reserved, so a replacement id never
    /// takes one that a later drawing already uses.
    fn reserve_loaded_drawings(&mut self) {
        let mut found: Vec<(usize, NodePath, u32)> = Vec::new();
        for (index, part) in self.parts.iter().enumerate() {
            let root = part.xml.root();
            for path in drawing_paths(root) {
                let id = root
                    .element_at(&path)
                    .and_then(|d| d.child("docPr"))
                    .and_then(|pr| pr.attr_u32("id"));
                match id {
                    Some(id) => found.push((index, path, id)),
                    None => warn!(
                        partname = %part.partname,
                        "skipping drawing without a numeric docPr id"
                    ),
                }
            }
        }

        for (_, _, id) in &found {
            self.ids.observe(*id);
        }
        let mut adjusted = 0usize;
        for (index, path, id) in found {
            let effective = self.ids.reserve(id);
            if !self.options.adjust_drawing_ids || effective == id {
                continue;
            }
            let part = &mut self.parts[index];
            if let Some(pr) = part
                .xml
                .root_mut()
                .element_at_mut(&path)
                .and_then(|d| d.child_mut("docPr"))
            {
                pr.set_attr_local("id", &effective.to_string());
                part.dirty = true;
                adjusted += 1;
            }
        }
        if adjusted > 0 {
            debug!(adjusted, "rewrote duplicate drawing ids");
        }
    }

    /// Rebuild the table and drawing indexes after a structural change.
    pub(crate) fn reindex(&mut self) {
        let mut tables = Vec::new();
        let mut drawings = Vec::new();
        for (index, part) in self.parts.iter().enumerate() {
            let id = PartId(index);
            part.xml.root().walk(&mut |path, e| {
                if e.is("tbl") {
                    tables.push((id, path.clone()));
                } else if e.is("drawing") {
                    for (i, child) in e.indexed_elements() {
                        if child.is("inline") || child.is("anchor") {
                            drawings.push((id, path.child(i)));
                        }
                    }
                    return Walk::SkipChildren;
                }
                Walk::Continue
            });
        }
        self.tables = tables;
        self.drawings = drawings;
    }

    #[inline]
    pub fn package(&self) -> &Package {
        &self.package
    }

    #[inline]
    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Ids of all body parts: the main document first, then headers and
    /// footers in declaration order.
    pub fn part_ids(&self) -> impl Iterator<Item = PartId> + '_ {
        (0..self.parts.len()).map(PartId)
    }

    pub fn headers(&self) -> Vec<PartId> {
        self.parts_of_kind(PartKind::Header)
    }

    pub fn footers(&self) -> Vec<PartId> {
        self.parts_of_kind(PartKind::Footer)
    }

    fn parts_of_kind(&self, kind: PartKind) -> Vec<PartId> {
        self.parts
            .iter()
            .enumerate()
            .filter(|(_, p)| p.kind == kind)
            .map(|(i, _)| PartId(i))
            .collect()
    }

    pub fn part_kind(&self, id: PartId) -> Option<PartKind> {
        self.parts.get(id.0).map(|p| p.kind)
    }

    pub fn partname(&self, id: PartId) -> Option<&PackURI> {
        self.parts.get(id.0).map(|p| &p.partname)
    }

    /// The parsed XML of a body part.
    pub fn part_xml(&self, id: PartId) -> Option<&XmlDocument> {
        self.parts.get(id.0).map(|p| &p.xml)
    }

    /// Top-level paragraphs and tables of a body part.
    pub fn blocks(&self, id: PartId) -> Vec<Block<'_>> {
        let mut blocks = Vec::new();
        if let Some(part) = self.parts.get(id.0) {
            if let Some(path) = part.container_path() {
                if let Some(container) = part.xml.root().element_at(&path) {
                    collect_blocks(container, id, &path, &mut blocks);
                }
            }
        }
        blocks
    }

    /// Every table in every body part, nested tables included, in document
    /// order.
    pub fn tables(&self) -> Vec<Table<'_>> {
        self.tables
            .iter()
            .filter_map(|(id, path)| {
                self.parts[id.0]
                    .xml
                    .root()
                    .element_at(path)
                    .map(|e| Table::new(e, *id, path.clone()))
            })
            .collect()
    }

    /// Every `wp:inline` and `wp:anchor` in every body part.
    pub fn drawings(&self) -> Vec<Drawing<'_>> {
        self.drawings
            .iter()
            .filter_map(|(id, path)| {
                self.parts[id.0]
                    .xml
                    .root()
                    .element_at(path)
                    .map(|e| Drawing::new(e, *id, path.clone()))
            })
            .collect()
    }

    /// Drawings whose graphic is a picture.
    pub fn pictures(&self) -> Vec<Drawing<'_>> {
        self.drawings()
            .into_iter()
            .filter(Drawing::is_picture)
            .collect()
    }

    /// Every paragraph in every body part, including paragraphs in table
    /// cells, in document order.
    pub fn paragraphs(&self) -> Vec<Paragraph<'_>> {
        let mut paragraphs = Vec::new();
        for (index, part) in self.parts.iter().enumerate() {
            part.xml.root().walk(&mut |path, e| {
                if e.is("p") {
                    paragraphs.push(Paragraph::new(e, PartId(index), path.clone()));
                    return Walk::SkipChildren;
                }
                if e.is("drawing") || e.is("pict") {
                    return Walk::SkipChildren;
                }
                Walk::Continue
            });
        }
        paragraphs
    }

    /// Every run of every paragraph, in document order.
    pub fn runs(&self) -> Vec<Run<'_>> {
        self.paragraphs()
            .iter()
            .flat_map(|p| p.runs().into_iter())
            .collect()
    }

    /// The first run matching a predicate.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use rambutan::ooxml::docx::Document;
    ///
    /// let doc = Document::open("template.docx")?;
    /// let anchor = doc.find_run(|run| run.text().contains("{{+chapter}}"));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn find_run<F>(&self, mut predicate: F) -> Option<RunAnchor>
    where
        F: FnMut(&Run<'_>) -> bool,
    {
        self.runs().iter().find(|r| predicate(r)).map(Run::anchor)
    }

    /// The run an anchor points at.
    pub fn run(&self, anchor: &RunAnchor) -> Option<Run<'_>> {
        let element = self.parts.get(anchor.part().0)?.xml.root().element_at(anchor.path())?;
        element
            .is("r")
            .then(|| Run::new(element, anchor.part(), anchor.path().clone()))
    }

    /// The paragraph holding an anchored run.
    pub fn paragraph_of(&self, anchor: &RunAnchor) -> Option<Paragraph<'_>> {
        let path = self.enclosing(anchor.part(), anchor.path(), "p")?;
        let element = self.parts[anchor.part().0].xml.root().element_at(&path)?;
        Some(Paragraph::new(element, anchor.part(), path))
    }

    #[inline]
    pub fn media(&self) -> &ContentStore {
        &self.media
    }

    #[inline]
    pub fn identifiers(&self) -> &IdentifierManager {
        &self.ids
    }

    #[inline]
    pub fn numbering(&self) -> Option<&NumberingStore> {
        self.numbering.as_ref()
    }

    /// The comments part, `None` when the document has none.
    #[inline]
    pub fn comment_store(&self) -> Option<&CommentStore> {
        self.comments.as_ref()
    }

    /// All comments, `None` when the document has no comments part.
    pub fn comments(&self) -> Option<Vec<Comment>> {
        self.comments.as_ref().map(CommentStore::comments)
    }

    /// Nearest ancestor-or-self of `path` with the given local name.
    pub(crate) fn enclosing(&self, part: PartId, path: &NodePath, local: &str) -> Option<NodePath> {
        let root = self.parts.get(part.0)?.xml.root();
        let mut current = Some(path.clone());
        while let Some(candidate) = current {
            if candidate.depth() == 0 {
                return None;
            }
            if root.element_at(&candidate).is_some_and(|e| e.is(local)) {
                return Some(candidate);
            }
            current = candidate.parent();
        }
        None
    }

    /// Fail with `InvalidTarget` unless the anchor points at a `w:r`.
    pub(crate) fn check_run(&self, anchor: &RunAnchor) -> Result<()> {
        match self.run(anchor) {
            Some(_) => Ok(()),
            None => Err(OoxmlError::InvalidTarget(format!(
                "no run at {:?} in part {}",
                anchor.path().indices(),
                anchor.part().0
            ))),
        }
    }

    fn run_element_mut(&mut self, anchor: &RunAnchor) -> Result<&mut XmlElement> {
        self.check_run(anchor)?;
        let part = &mut self.parts[anchor.part().0];
        part.dirty = true;
        part.xml
            .root_mut()
            .element_at_mut(anchor.path())
            .ok_or_else(|| OoxmlError::InvalidTarget("run vanished".to_string()))
    }

    pub(crate) fn part_partname(&self, id: PartId) -> Result<PackURI> {
        self.parts
            .get(id.0)
            .map(|p| p.partname.clone())
            .ok_or_else(|| OoxmlError::InvalidTarget(format!("no body part {}", id.0)))
    }

    /// Append an empty paragraph holding one empty run to the main body,
    /// before the trailing section properties.
    pub fn append_run(&mut self) -> Result<RunAnchor> {
        let part = &mut self.parts[PartId::MAIN.0];
        let body_path = part
            .container_path()
            .ok_or_else(|| OoxmlError::MalformedInput("document has no w:body".to_string()))?;
        let body = part
            .xml
            .root_mut()
            .element_at_mut(&body_path)
            .ok_or_else(|| OoxmlError::MalformedInput("document has no w:body".to_string()))?;

        let index = match body.indexed_elements().last() {
            Some((i, e)) if e.is("sectPr") => i,
            _ => body.children().len(),
        };
        body.insert(index, XmlElement::new("w:p").with_child(XmlElement::new("w:r")));
        part.dirty = true;
        self.reindex();
        Ok(RunAnchor::new(PartId::MAIN, body_path.child(index).child(0)))
    }

    /// Replace the text of a run, keeping its properties and drawings.
    pub fn set_run_text(&mut self, anchor: &RunAnchor, text: &str) -> Result<()> {
        let run = self.run_element_mut(anchor)?;
        run.children_mut().retain(|n| {
            !matches!(n, XmlNode::Element(e) if matches!(e.local_name(), "t" | "tab" | "br" | "cr"))
        });
        if !text.is_empty() {
            let mut t = XmlElement::new("w:t");
            if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
                t.set_attr("xml:space", "preserve");
            }
            t.push(XmlNode::text(text));
            let index = usize::from(run.position("rPr") == Some(0));
            run.insert(index, t);
        }
        self.reindex();
        Ok(())
    }

    /// Intern media bytes and make sure the package holds their part.
    ///
    /// Returns the part name and whether an identical blob was already
    /// stored.
    pub(crate) fn intern_media(&mut self, data: Arc<[u8]>, format: PictureFormat) -> Result<(PackURI, bool)> {
        let opc = self.package.opc_package();
        let interned = self
            .media
            .intern(data, format, |format| media_partname(opc, format))?;

        let item = self
            .media
            .get(interned.id())
            .ok_or_else(|| OoxmlError::Other("interned media missing".to_string()))?;
        let partname = item.partname().clone();
        if let Interned::New(_) = interned {
            let part = BlobPart::new(
                partname.clone(),
                item.format().mime_type().to_string(),
                item.shared_data(),
            );
            self.package.opc_package_mut().add_part(Box::new(part));
        }
        Ok((partname, !interned.is_new()))
    }

    /// Next free drawing id, reserved with the identifier manager.
    pub(crate) fn next_drawing_id(&mut self) -> u32 {
        let indexed_max = self
            .drawings()
            .iter()
            .filter_map(Drawing::id)
            .max()
            .unwrap_or(0);
        let candidate = self.ids.max_id().max(indexed_max) + 1;
        self.ids.reserve(candidate)
    }

    /// Insert a picture at the end of a run as an inline drawing.
    ///
    /// Identical picture bytes are stored once per package. Returns the
    /// drawing's `docPr` id.
    pub fn insert_picture(&mut self, anchor: &RunAnchor, picture: &PictureData) -> Result<u32> {
        self.check_run(anchor)?;
        let (media, reused) = self.intern_media(picture.shared_bytes(), picture.format())?;

        let source = self.part_partname(anchor.part())?;
        let r_id = self
            .package
            .part_mut(&source)?
            .relate_to(&media, rt::IMAGE);

        let id = self.next_drawing_id();
        let (cx, cy) = picture.extent_emu();
        let drawing = drawing::inline_picture(id, &r_id, media.filename(), cx, cy);

        let part = &mut self.parts[anchor.part().0];
        ensure_namespace(part.xml.root_mut(), "wp", ns::DML_WORDPROCESSING_DRAWING);
        ensure_namespace(part.xml.root_mut(), "r", ns::OFC_RELATIONSHIPS);
        self.run_element_mut(anchor)?.push(drawing);
        self.reindex();

        debug!(id, %media, reused, "inserted picture");
        Ok(id)
    }

    /// Set `w:numPr` on the paragraph holding an anchored run.
    ///
    /// Adding `w:pPr` to a paragraph shifts its runs, so the run's anchor is
    /// returned again.
    pub fn set_numbering(&mut self, anchor: &RunAnchor, num_id: u32, ilvl: u32) -> Result<RunAnchor> {
        self.check_run(anchor)?;
        let path = self
            .enclosing(anchor.part(), anchor.path(), "p")
            .ok_or_else(|| OoxmlError::InvalidTarget("run is not inside a paragraph".to_string()))?;
        let part = &mut self.parts[anchor.part().0];
        let paragraph = part
            .xml
            .root_mut()
            .element_at_mut(&path)
            .ok_or_else(|| OoxmlError::InvalidTarget("paragraph vanished".to_string()))?;

        let mut run_path = anchor.path().clone();
        if paragraph.position("pPr") != Some(0) {
            paragraph.insert(0, XmlElement::new("w:pPr"));
            run_path = shifted(&run_path, path.depth());
        }
        let ppr = paragraph
            .child_mut("pPr")
            .ok_or_else(|| OoxmlError::Other("missing w:pPr".to_string()))?;
        ppr.children_mut()
            .retain(|n| !matches!(n, XmlNode::Element(e) if e.is("numPr")));
        // numPr follows pStyle and keep/page flags
        let index = ppr
            .indexed_elements()
            .filter(|(_, e)| {
                matches!(
                    e.local_name(),
                    "pStyle" | "keepNext" | "keepLines" | "pageBreakBefore" | "framePr" | "widowControl"
                )
            })
            .map(|(i, _)| i + 1)
            .last()
            .unwrap_or(0);
        ppr.insert(
            index,
            XmlElement::new("w:numPr")
                .with_child(XmlElement::new("w:ilvl").with_attr("w:val", &ilvl.to_string()))
                .with_child(XmlElement::new("w:numId").with_attr("w:val", &num_id.to_string())),
        );
        part.dirty = true;
        self.reindex();
        Ok(RunAnchor::new(anchor.part(), run_path))
    }

    /// The numbering store, creating `numbering.xml` when the document has
    /// none.
    pub fn numbering_mut(&mut self) -> Result<&mut NumberingStore> {
        if self.numbering.is_none() {
            let partname = self.free_partname(NUMBERING_PARTNAME, "/word/numbering%d.xml")?;
            let store = NumberingStore::empty(partname.clone())?;
            self.attach_xml_part(&partname, ct::WML_NUMBERING, rt::NUMBERING, store.xml(), None)?;
            debug!(%partname, "created numbering part");
            self.numbering = Some(store);
        }
        self.numbering
            .as_mut()
            .ok_or_else(|| OoxmlError::Other("numbering store unavailable".to_string()))
    }

    /// Create a multi-level list definition and a numbering instance bound
    /// to it.
    pub fn allocate_numbering(&mut self, levels: &[NumberingFormat]) -> Result<NumberingAllocation> {
        self.numbering_mut()?.allocate(levels)
    }

    /// The comments store, creating the comments part on first use.
    ///
    /// Fails with `RelationInit` when the comments descriptor could not be
    /// built from [`LoadOptions::comments_partname`].
    pub fn comments_mut(&mut self) -> Result<&mut CommentStore> {
        if self.comments.is_none() {
            let descriptor = self
                .comments_descriptor
                .as_ref()
                .map_err(|e| OoxmlError::RelationInit(e.clone()))?
                .clone();
            let partname = descriptor.partname().clone();
            if self.package.opc_package().contains_part(&partname) {
                return Err(OoxmlError::RelationInit(format!(
                    "part {} already exists",
                    partname
                )));
            }
            let store = CommentStore::empty(partname.clone())?;
            let main = self.part_partname(PartId::MAIN)?;
            let r_id = descriptor.relationship_id(self.package.part(&main)?.rels());
            self.attach_xml_part(
                &partname,
                descriptor.content_type(),
                descriptor.reltype(),
                store.xml(),
                Some(r_id),
            )?;
            debug!(%partname, "created comments part");
            self.comments = Some(store);
        }
        self.comments
            .as_mut()
            .ok_or_else(|| OoxmlError::RelationInit("comments store unavailable".to_string()))
    }

    /// Add a comment and return its id. Use [`comment_run`](Self::comment_run)
    /// to attach it to content.
    pub fn add_comment(&mut self, author: &str, initials: Option<&str>, text: &str) -> Result<u32> {
        Ok(self.comments_mut()?.add(author, initials, text))
    }

    /// Mark a run as the range of a comment.
    ///
    /// The run gets a `w:commentRangeStart` before it and a
    /// `w:commentRangeEnd` plus a reference run after it. Returns the run's
    /// new anchor.
    pub fn comment_run(&mut self, anchor: &RunAnchor, comment_id: u32) -> Result<RunAnchor> {
        let exists = self
            .comments
            .as_ref()
            .is_some_and(|store| store.element(comment_id).is_some());
        if !exists {
            return Err(OoxmlError::InvalidTarget(format!(
                "no comment with id {}",
                comment_id
            )));
        }
        self.check_run(anchor)?;

        let (parent_path, index) = match (anchor.path().parent(), anchor.path().last()) {
            (Some(parent), Some(index)) => (parent, index),
            _ => return Err(OoxmlError::InvalidTarget("run has no parent".to_string())),
        };
        let id = comment_id.to_string();
        let part = &mut self.parts[anchor.part().0];
        let parent = part
            .xml
            .root_mut()
            .element_at_mut(&parent_path)
            .ok_or_else(|| OoxmlError::InvalidTarget("run has no parent".to_string()))?;

        parent.insert(index + 1, XmlElement::new("w:commentRangeEnd").with_attr("w:id", &id));
        parent.insert(
            index + 2,
            XmlElement::new("w:r")
                .with_child(XmlElement::new("w:commentReference").with_attr("w:id", &id)),
        );
        parent.insert(index, XmlElement::new("w:commentRangeStart").with_attr("w:id", &id));
        part.dirty = true;
        self.reindex();
        Ok(RunAnchor::new(anchor.part(), parent_path.child(index + 1)))
    }

    /// `preferred` when free, otherwise the first free name from `template`.
    fn free_partname(&self, preferred: &str, template: &str) -> Result<PackURI> {
        let preferred = PackURI::new(preferred)?;
        let opc = self.package.opc_package();
        if !opc.contains_part(&preferred) {
            return Ok(preferred);
        }
        Ok(opc.next_partname(template, 1)?)
    }

    /// Add an XML part holding `xml` and relate it from the main document.
    fn attach_xml_part(
        &mut self,
        partname: &PackURI,
        content_type: &str,
        reltype: &str,
        xml: &XmlDocument,
        r_id: Option<String>,
    ) -> Result<()> {
        let part = XmlPart::new(partname.clone(), content_type.to_string(), xml.to_bytes());
        self.package.opc_package_mut().add_part(Box::new(part));

        let main = self.part_partname(PartId::MAIN)?;
        let main_part = self.package.part_mut(&main)?;
        match r_id {
            Some(r_id) => {
                let target_ref = partname.relative_ref(main.base_uri());
                main_part
                    .rels_mut()
                    .add_relationship(reltype.to_string(), target_ref, r_id, false);
            },
            None => {
                main_part.relate_to(partname, reltype);
            },
        }
        Ok(())
    }

    /// Write every modified tree back into its part.
    pub fn commit(&mut self) -> Result<()> {
        for part in self.parts.iter_mut().filter(|p| p.dirty) {
            self.package
                .part_mut(&part.partname)?
                .set_blob(part.xml.to_bytes());
            part.dirty = false;
        }
        if let Some(store) = self.numbering.as_mut().filter(|s| s.is_dirty()) {
            self.package
                .part_mut(store.partname())?
                .set_blob(store.xml().to_bytes());
            store.mark_clean();
        }
        if let Some(store) = self.comments.as_mut().filter(|s| s.is_dirty()) {
            self.package
                .part_mut(store.partname())?
                .set_blob(store.xml().to_bytes());
            store.mark_clean();
        }
        Ok(())
    }

    /// Serialize the document into a .docx byte buffer.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        self.commit()?;
        Ok(self.package.opc_package().to_bytes()?)
    }

    /// Save the document. The file is written only after the whole archive
    /// has been built.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.commit()?;
        self.package.opc_package().save(path)?;
        Ok(())
    }

    pub fn write_to<W: Write>(&mut self, writer: W) -> Result<()> {
        self.commit()?;
        self.package.opc_package().write_to(writer)?;
        Ok(())
    }

    /// Serialize and load the result into a fresh graph.
    ///
    /// This is the immutable counterpart of editing in place: the returned
    /// document is rebuilt from bytes with its own indexes and stores.
    pub fn generate(&mut self, options: LoadOptions) -> Result<Document> {
        let bytes = self.to_bytes()?;
        Document::load(Package::from_bytes(bytes)?, options)
    }
}

/// Paths of every `wp:inline` / `wp:anchor` directly under a `w:drawing`.
pub(crate) fn drawing_paths(root: &XmlElement) -> Vec<NodePath> {
    let mut paths = Vec::new();
    root.walk(&mut |path, e| {
        if e.is("drawing") {
            for (i, child) in e.indexed_elements() {
                if child.is("inline") || child.is("anchor") {
                    paths.push(path.child(i));
                }
            }
            return Walk::SkipChildren;
        }
        Walk::Continue
    });
    paths
}

/// `path` with the index at `depth` moved one sibling to the right.
fn shifted(path: &NodePath, depth: usize) -> NodePath {
    let mut indices = path.indices().to_vec();
    if let Some(i) = indices.get_mut(depth) {
        *i += 1;
    }
    NodePath::from_indices(&indices)
}

/// Declare `xmlns:prefix` on `root` unless it already is.
pub(crate) fn ensure_namespace(root: &mut XmlElement, prefix: &str, uri: &str) {
    let name = format!("xmlns:{}", prefix);
    if root.attr(&name).is_none() {
        root.set_attr(&name, uri);
    }
}

fn media_partname(opc: &OpcPackage, format: PictureFormat) -> Result<PackURI> {
    let template = format!("/word/media/image%d.{}", format.extension());
    Ok(opc.next_partname(&template, 1)?)
}
