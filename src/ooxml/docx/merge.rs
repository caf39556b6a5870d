//! Merging whole documents into a host document.
//!
//! Guest documents are spliced into the host at a run. Every block of a
//! guest's body is deep-copied into the anchor paragraph's container, and
//! everything the copied XML refers to is rebuilt on the host side:
//!
//! - relationships (`r:*` attributes) point at host copies of their targets,
//!   with pictures going through the content store and charts through
//!   [`Document::add_chart`];
//! - drawing ids go through the host's identifier manager;
//! - numbering instances are rebound to an equivalent host definition or
//!   imported under fresh ids;
//! - comments are copied into the host comments part under fresh ids.
//!
//! Guests are consumed one at a time, in iterator order.

use crate::common::xml::{NodePath, XmlDocument, XmlElement, XmlNode};
use crate::ooxml::docx::document::{BodyPart, Document, PartId, PartKind, drawing_paths};
use crate::ooxml::docx::format::PictureFormat;
use crate::ooxml::docx::options::{BlankRule, LoadOptions, MergeOptions};
use crate::ooxml::docx::paragraph::{Paragraph, RunAnchor};
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::constants::{content_type as ct, namespace as ns, relationship_type as rt};
use crate::ooxml::opc::{PackURI, PartFactory, Relationships};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

const COMMENT_MARKERS: [&str; 3] = ["commentRangeStart", "commentRangeEnd", "commentReference"];

/// What a merge did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Number of guest documents merged
    pub guests: usize,
    /// Top-level paragraphs and tables inserted
    pub blocks: usize,
    /// Guest drawings whose `docPr` id was changed
    pub renumbered_drawings: usize,
    /// Guest pictures that reused media already in the host
    pub reused_media: usize,
    /// Abstract numbering definitions copied into the host
    pub imported_numberings: usize,
    pub imported_comments: usize,
}

impl Document {
    /// Splice guest documents into this one at `anchor`.
    ///
    /// When the anchor's paragraph holds other non-blank text (as judged by
    /// [`MergeOptions::blank_rule`]), a picture or a section break, guest
    /// content goes after that paragraph and the paragraph is kept.
    /// Otherwise the anchor paragraph is a placeholder: guest content takes
    /// its place and it is removed.
    ///
    /// Fails with `InvalidTarget`, leaving the document untouched, when the
    /// anchor does not point at a run inside a paragraph. An empty iterator
    /// changes nothing. When a guest fails to import, the error is returned
    /// and the guests before it stay merged; the graph is reindexed either
    /// way. The anchor, and any other anchor after it in the same container,
    /// is stale once the merge returns.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use rambutan::ooxml::docx::{Document, MergeOptions};
    ///
    /// let mut host = Document::open("template.docx")?;
    /// let anchor = host
    ///     .find_run(|run| run.text() == "{{+chapters}}")
    ///     .ok_or("no placeholder")?;
    /// let chapters = ["one.docx", "two.docx"]
    ///     .iter()
    ///     .map(|path| Document::open(path))
    ///     .collect::<Result<Vec<_>, _>>()?;
    /// let report = host.merge(chapters, &anchor, &MergeOptions::default())?;
    /// println!("merged {} blocks", report.blocks);
    /// host.save("book.docx")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn merge<I>(&mut self, guests: I, anchor: &RunAnchor, options: &MergeOptions) -> Result<MergeReport>
    where
        I: IntoIterator<Item = Document>,
    {
        self.check_run(anchor)?;
        let paragraph = self
            .paragraph_of(anchor)
            .ok_or_else(|| OoxmlError::InvalidTarget("run is not inside a paragraph".to_string()))?;
        let occupied = is_occupied(&paragraph, anchor, options.blank_rule);
        let paragraph_path = paragraph.path().clone();
        let (container_path, paragraph_index) = match (paragraph_path.parent(), paragraph_path.last()) {
            (Some(parent), Some(index)) => (parent, index),
            _ => return Err(OoxmlError::InvalidTarget("paragraph has no container".to_string())),
        };

        let mut guests = guests.into_iter().peekable();
        if guests.peek().is_none() {
            return Ok(MergeReport::default());
        }

        let part = anchor.part();
        let placeholder = if occupied {
            self.container_mut(part, &container_path)?
                .insert(paragraph_index + 1, XmlElement::new("w:p"));
            paragraph_index + 1
        } else {
            paragraph_index
        };

        let mut report = MergeReport::default();
        let mut cursor = placeholder;
        let outcome = self.splice_guests(guests, part, &container_path, &mut cursor, &mut report);

        // Guests spliced before a failure stay applied
        let spliced = outcome.is_ok() || report.blocks > 0;
        let container = self.container_mut(part, &container_path)?;
        if !spliced {
            if occupied {
                container.remove(cursor);
            }
        } else {
            if cell_needs_paragraph(container, cursor) {
                container.children_mut()[cursor] = XmlNode::from(XmlElement::new("w:p"));
            } else {
                container.remove(cursor);
            }
            self.parts[part.0].dirty = true;
        }
        self.reindex();

        match outcome {
            Ok(()) => {
                debug!(?report, "merge finished");
                Ok(report)
            },
            Err(e) => {
                warn!(?report, error = %e, "merge stopped on a failing guest");
                Err(e)
            },
        }
    }

    /// Insert the blocks of each guest before `cursor`, advancing it.
    fn splice_guests<I>(
        &mut self,
        guests: I,
        part: PartId,
        container_path: &NodePath,
        cursor: &mut usize,
        report: &mut MergeReport,
    ) -> Result<()>
    where
        I: Iterator<Item = Document>,
    {
        for guest in guests {
            let blocks = self.import_guest(&guest, part, report)?;
            if !blocks.is_empty() {
                self.parts[part.0].dirty = true;
            }
            report.blocks += blocks.len();
            let container = self.container_mut(part, container_path)?;
            for block in blocks {
                container.insert(*cursor, block);
                *cursor += 1;
            }
            report.guests += 1;
            debug!(guest = report.guests, blocks = report.blocks, "merged guest document");
        }
        Ok(())
    }

    /// Merge, then serialize and reload the result.
    pub fn merged<I>(
        mut self,
        guests: I,
        anchor: &RunAnchor,
        options: &MergeOptions,
        load: LoadOptions,
    ) -> Result<Document>
    where
        I: IntoIterator<Item = Document>,
    {
        self.merge(guests, anchor, options)?;
        self.generate(load)
    }

    /// Merge one document at the end of the body.
    pub fn append_document(&mut self, guest: Document) -> Result<MergeReport> {
        let anchor = self.append_run()?;
        self.merge(std::iter::once(guest), &anchor, &MergeOptions::default())
    }

    fn container_mut(&mut self, part: PartId, path: &NodePath) -> Result<&mut XmlElement> {
        self.parts
            .get_mut(part.0)
            .and_then(|p| p.xml.root_mut().element_at_mut(path))
            .ok_or_else(|| OoxmlError::InvalidTarget("insertion container vanished".to_string()))
    }

    /// Copy the blocks of a guest body, rewritten for this document.
    fn import_guest(&mut self, guest: &Document, part: PartId, report: &mut MergeReport) -> Result<Vec<XmlElement>> {
        let guest_main = &guest.parts[PartId::MAIN.0];
        let Some(body) = guest_main
            .container_path()
            .and_then(|path| guest_main.xml.root().element_at(&path))
        else {
            warn!(partname = %guest_main.partname, "guest document has no body");
            return Ok(Vec::new());
        };

        let mut blocks: Vec<XmlElement> = body
            .elements()
            .filter(|e| !e.is("sectPr"))
            .cloned()
            .collect();
        if blocks.is_empty() {
            return Ok(blocks);
        }

        let guest_root = guest_main.xml.root();
        union_namespaces(self.parts[part.0].xml.root_mut(), guest_root);
        let rel_prefix = namespace_prefix(guest_root, ns::OFC_RELATIONSHIPS).unwrap_or("r");

        self.remap_relationships(guest, &guest_main.partname, rel_prefix, part, &mut blocks, report)?;
        self.remap_drawing_ids(&mut blocks, report);
        self.remap_numbering(guest, &mut blocks, report)?;
        self.remap_comments(guest, &mut blocks, report);
        Ok(blocks)
    }

    fn remap_relationships(
        &mut self,
        guest: &Document,
        guest_source: &PackURI,
        prefix: &str,
        part: PartId,
        blocks: &mut [XmlElement],
        report: &mut MergeReport,
    ) -> Result<()> {
        let is_rel_attr = |name: &str| name.split_once(':').is_some_and(|(p, _)| p == prefix);

        let mut r_ids: Vec<String> = Vec::new();
        for block in blocks.iter() {
            visit(block, &mut |e| {
                for attr in e.attributes().iter().filter(|a| is_rel_attr(a.name())) {
                    let value = attr.value();
                    if !r_ids.iter().any(|r| *r == value) {
                        r_ids.push(value.into_owned());
                    }
                }
            });
        }
        if r_ids.is_empty() {
            return Ok(());
        }

        let mut map: HashMap<String, String> = HashMap::new();
        let mut copied: HashMap<PackURI, PackURI> = HashMap::new();
        for r_id in r_ids {
            if let Some(host_r_id) = self.import_relationship(guest, guest_source, &r_id, part, &mut copied, report)? {
                map.insert(r_id, host_r_id);
            }
        }

        for block in blocks.iter_mut() {
            visit_mut(block, &mut |e| {
                let updates: Vec<(String, String)> = e
                    .attributes()
                    .iter()
                    .filter(|a| is_rel_attr(a.name()))
                    .filter_map(|a| map.get(a.value().as_ref()).map(|v| (a.name().to_string(), v.clone())))
                    .collect();
                for (name, value) in updates {
                    e.set_attr(&name, &value);
                }
            });
        }
        Ok(())
    }

    /// Recreate one guest relationship on the host part, returning the new
    /// id. `None` when the guest relationship does not exist.
    fn import_relationship(
        &mut self,
        guest: &Document,
        guest_source: &PackURI,
        r_id: &str,
        part: PartId,
        copied: &mut HashMap<PackURI, PackURI>,
        report: &mut MergeReport,
    ) -> Result<Option<String>> {
        let guest_part = guest.package.part(guest_source)?;
        let Some(rel) = guest_part.rels().get(r_id) else {
            warn!(%guest_source, r_id, "imported content references an unknown relationship");
            return Ok(None);
        };
        let host_source = self.part_partname(part)?;

        if rel.is_external() {
            let new_id = self
                .package
                .part_mut(&host_source)?
                .relate_to_ext(rel.target_ref(), rel.reltype());
            return Ok(Some(new_id));
        }

        let target = rel.target_partname()?;
        let new_id = match rel.reltype() {
            rt::CHART => {
                let source = guest.chart_source(&target)?;
                self.add_chart(part, &source)?.r_id
            },
            reltype => {
                let copy = self.import_part(guest, &target, copied, report)?;
                self.package.part_mut(&host_source)?.relate_to(&copy, reltype)
            },
        };
        Ok(Some(new_id))
    }

    /// Copy a guest part and everything it relates to. Pictures are
    /// interned instead of copied.
    fn import_part(
        &mut self,
        guest: &Document,
        source: &PackURI,
        copied: &mut HashMap<PackURI, PackURI>,
        report: &mut MergeReport,
    ) -> Result<PackURI> {
        if let Some(copy) = copied.get(source) {
            return Ok(copy.clone());
        }
        let part = guest.package.part(source)?;

        if let Some(format) = PictureFormat::from_content_type(part.content_type()) {
            let (partname, reused) = self.intern_media(Arc::from(part.blob()), format)?;
            if reused {
                report.reused_media += 1;
            }
            copied.insert(source.clone(), partname.clone());
            return Ok(partname);
        }

        let opc = self.package.opc_package();
        let partname = if opc.contains_part(source) {
            opc.next_partname(&partname_template(source), 1)?
        } else {
            source.clone()
        };
        // Added before its targets so that cycles resolve to this copy
        let copy = PartFactory::load(partname.clone(), part.content_type().to_string(), part.blob().to_vec())?;
        self.package.opc_package_mut().add_part(copy);
        copied.insert(source.clone(), partname.clone());

        let mut rels = Relationships::new(partname.base_uri().to_string());
        for rel in part.rels().iter() {
            if rel.is_external() {
                rels.add_relationship(
                    rel.reltype().to_string(),
                    rel.target_ref().to_string(),
                    rel.r_id().to_string(),
                    true,
                );
                continue;
            }
            let target = self.import_part(guest, &rel.target_partname()?, copied, report)?;
            rels.add_relationship(
                rel.reltype().to_string(),
                target.relative_ref(partname.base_uri()),
                rel.r_id().to_string(),
                false,
            );
        }
        *self.package.part_mut(&partname)?.rels_mut() = rels;

        let kind = match part.content_type() {
            ct::WML_HEADER => Some(PartKind::Header),
            ct::WML_FOOTER => Some(PartKind::Footer),
            _ => None,
        };
        if let Some(kind) = kind {
            self.adopt_body_part(guest, kind, &partname, report)?;
        }

        debug!(%source, %partname, "copied guest part");
        Ok(partname)
    }

    /// Index a header or footer copied from a guest, after passing its
    /// drawing ids, numbering and comments through the host stores.
    fn adopt_body_part(
        &mut self,
        guest: &Document,
        kind: PartKind,
        partname: &PackURI,
        report: &mut MergeReport,
    ) -> Result<()> {
        let mut xml = XmlDocument::parse(self.package.part(partname)?.blob())?;
        let root = std::slice::from_mut(xml.root_mut());
        self.remap_drawing_ids(root, report);
        self.remap_numbering(guest, root, report)?;
        self.remap_comments(guest, root, report);
        self.parts.push(BodyPart {
            kind,
            partname: partname.clone(),
            xml,
            dirty: true,
        });
        Ok(())
    }

    /// Pass every imported drawing id through the identifier manager.
    ///
    /// All guest ids are observed first so that an id minted for one
    /// colliding drawing is never one a later guest drawing holds.
    fn remap_drawing_ids(&mut self, blocks: &mut [XmlElement], report: &mut MergeReport) {
        let mut found: Vec<(usize, NodePath, u32)> = Vec::new();
        for (index, block) in blocks.iter().enumerate() {
            for path in drawing_paths(block) {
                let id = block
                    .element_at(&path)
                    .and_then(|d| d.child("docPr"))
                    .and_then(|pr| pr.attr_u32("id"));
                match id {
                    Some(id) => found.push((index, path, id)),
                    None => warn!("skipping imported drawing without a numeric docPr id"),
                }
            }
        }

        for (_, _, id) in &found {
            self.ids.observe(*id);
        }
        for (index, path, id) in found {
            let effective = self.ids.reserve(id);
            if effective == id {
                continue;
            }
            if let Some(pr) = blocks[index]
                .element_at_mut(&path)
                .and_then(|d| d.child_mut("docPr"))
            {
                pr.set_attr_local("id", &effective.to_string());
                report.renumbered_drawings += 1;
            }
        }
    }

    /// Rebind guest `w:numId` references to host numbering instances.
    fn remap_numbering(&mut self, guest: &Document, blocks: &mut [XmlElement], report: &mut MergeReport) -> Result<()> {
        let mut num_ids: Vec<u32> = Vec::new();
        for block in blocks.iter() {
            visit(block, &mut |e| {
                if !e.is("numPr") {
                    return;
                }
                // numId 0 removes numbering and needs no definition
                if let Some(id) = e.child("numId").and_then(|n| n.attr_u32("val")) {
                    if id != 0 && !num_ids.contains(&id) {
                        num_ids.push(id);
                    }
                }
            });
        }
        if num_ids.is_empty() {
            return Ok(());
        }
        let Some(guest_store) = guest.numbering() else {
            warn!("imported content uses numbering but the guest has no numbering part");
            return Ok(());
        };

        let mut map: HashMap<u32, u32> = HashMap::new();
        for num_id in num_ids {
            let Some(foreign) = guest_store
                .abstract_num_id_of(num_id)
                .and_then(|id| guest_store.abstract_num(id))
            else {
                warn!(num_id, "guest numbering instance has no definition");
                continue;
            };

            let store = self.numbering_mut()?;
            let host_num = match store.find_equivalent(foreign) {
                Some(abstract_id) => {
                    let existing = store
                        .num_ids()
                        .into_iter()
                        .find(|n| store.abstract_num_id_of(*n) == Some(abstract_id));
                    match existing {
                        Some(num) => num,
                        None => store.add_num(abstract_id),
                    }
                },
                None => {
                    let abstract_id = store.import_abstract_num(foreign);
                    report.imported_numberings += 1;
                    store.add_num(abstract_id)
                },
            };
            map.insert(num_id, host_num);
        }

        for block in blocks.iter_mut() {
            visit_mut(block, &mut |e| {
                if !e.is("numPr") {
                    return;
                }
                if let Some(num) = e.child_mut("numId") {
                    if let Some(mapped) = num.attr_u32("val").and_then(|id| map.get(&id)) {
                        num.set_attr_local("val", &mapped.to_string());
                    }
                }
            });
        }
        Ok(())
    }

    /// Copy referenced guest comments and renumber their markers.
    ///
    /// Markers of comments that cannot be imported are removed.
    fn remap_comments(&mut self, guest: &Document, blocks: &mut [XmlElement], report: &mut MergeReport) {
        let mut ids: Vec<u32> = Vec::new();
        for block in blocks.iter() {
            visit(block, &mut |e| {
                if is_comment_marker(e) {
                    if let Some(id) = e.attr_u32("id") {
                        if !ids.contains(&id) {
                            ids.push(id);
                        }
                    }
                }
            });
        }
        if ids.is_empty() {
            return;
        }

        let mut map: HashMap<u32, u32> = HashMap::new();
        for id in ids {
            let Some(foreign) = guest.comment_store().and_then(|store| store.element(id)) else {
                warn!(id, "imported content references a missing comment");
                continue;
            };
            match self.comments_mut() {
                Ok(store) => {
                    map.insert(id, store.import(foreign));
                    report.imported_comments += 1;
                },
                Err(e) => {
                    warn!(error = %e, "dropping imported comment markers");
                    break;
                },
            }
        }

        for block in blocks.iter_mut() {
            visit_mut(block, &mut |e| {
                e.children_mut().retain(|n| match n {
                    XmlNode::Element(c) if is_comment_marker(c) => {
                        c.attr_u32("id").is_some_and(|id| map.contains_key(&id))
                    },
                    _ => true,
                });
                if is_comment_marker(e) {
                    if let Some(mapped) = e.attr_u32("id").and_then(|id| map.get(&id)) {
                        e.set_attr_local("id", &mapped.to_string());
                    }
                }
            });
        }
    }
}

fn is_occupied(paragraph: &Paragraph<'_>, anchor: &RunAnchor, rule: BlankRule) -> bool {
    if paragraph.has_pictures() || paragraph.has_section_break() {
        return true;
    }
    paragraph
        .runs()
        .iter()
        .filter(|run| run.anchor() != *anchor)
        .any(|run| !rule.is_blank(&run.text()))
}

/// A table cell must end with a paragraph, so a placeholder that would
/// leave one ending with a table is emptied instead of removed.
fn cell_needs_paragraph(container: &XmlElement, placeholder: usize) -> bool {
    if !container.is("tc") {
        return false;
    }
    let is_last = container
        .indexed_elements()
        .last()
        .is_some_and(|(i, _)| i == placeholder);
    let after_paragraph = container
        .indexed_elements()
        .filter(|(i, _)| *i < placeholder)
        .last()
        .is_some_and(|(_, e)| e.is("p"));
    is_last && !after_paragraph
}

fn is_comment_marker(e: &XmlElement) -> bool {
    COMMENT_MARKERS.contains(&e.local_name())
}

/// Declare on `host` the guest namespaces it lacks and union the
/// `mc:Ignorable` prefix lists.
fn union_namespaces(host: &mut XmlElement, guest: &XmlElement) {
    for attr in guest.attributes() {
        if attr.name().starts_with("xmlns:") && host.attr(attr.name()).is_none() {
            host.set_attr(attr.name(), &attr.value());
        }
    }

    let Some(ignorable) = guest.attr("mc:Ignorable") else {
        return;
    };
    let mut prefixes: Vec<String> = host
        .attr("mc:Ignorable")
        .map(|v| v.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    let before = prefixes.len();
    for prefix in ignorable.split_whitespace() {
        let declared = host.attr(&format!("xmlns:{}", prefix)).is_some();
        if declared && !prefixes.iter().any(|p| p == prefix) {
            prefixes.push(prefix.to_string());
        }
    }
    if prefixes.len() > before {
        host.set_attr("mc:Ignorable", &prefixes.join(" "));
    }
}

/// Prefix bound to `uri` on `root`.
fn namespace_prefix<'a>(root: &'a XmlElement, uri: &str) -> Option<&'a str> {
    root.attributes()
        .iter()
        .find(|a| a.name().starts_with("xmlns:") && a.value() == uri)
        .map(|a| &a.name()["xmlns:".len()..])
}

/// `%d` template for copies of a part: `/word/diagrams/data1.xml` gives
/// `/word/diagrams/data%d.xml`.
fn partname_template(partname: &PackURI) -> String {
    let ext = partname.ext();
    let filename = partname.filename();
    let stem = filename
        .strip_suffix(ext)
        .and_then(|s| s.strip_suffix('.'))
        .unwrap_or(filename)
        .trim_end_matches(|c: char| c.is_ascii_digit());
    let base = partname.base_uri().trim_end_matches('/');
    if ext.is_empty() {
        format!("{}/{}%d", base, stem)
    } else {
        format!("{}/{}%d.{}", base, stem, ext)
    }
}

fn visit(element: &XmlElement, f: &mut dyn FnMut(&XmlElement)) {
    f(element);
    for child in element.elements() {
        visit(child, f);
    }
}

fn visit_mut(element: &mut XmlElement, f: &mut dyn FnMut(&mut XmlElement)) {
    f(element);
    for child in element.children_mut() {
        if let XmlNode::Element(e) = child {
            visit_mut(e, f);
        }
    }
}
