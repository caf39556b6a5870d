/// Chart embedding.
///
/// A chart lives in its own part (`/word/charts/chartN.xml`) related from
/// the body part whose drawing shows it. The data behind the chart is an
/// embedded workbook referenced by `c:externalData`. Embedding a chart from
/// another document copies the chart part, copies the workbook once per
/// distinct content and points `c:externalData` at the copy.
use crate::common::xml::{XmlDocument, XmlElement, XmlNode};
use crate::ooxml::docx::document::{Document, PartId, ensure_namespace};
use crate::ooxml::docx::media::checksum;
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::constants::{content_type as ct, namespace as ns, relationship_type as rt};
use crate::ooxml::opc::{BlobPart, PackURI, Part, Relationships, XmlPart};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

const CHART_TEMPLATE: &str = "/word/charts/chart%d.xml";
const WORKBOOK_TEMPLATE: &str = "/word/embeddings/Microsoft_Excel_Worksheet%d.xlsx";

/// Where a chart was first loaded from.
///
/// Charts embedded into a document keep the origin of their source, so
/// copying an already embedded chart again still reports the first part.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChartOrigin {
    partname: Option<PackURI>,
    checksum: u32,
}

impl ChartOrigin {
    /// Part name in the source document, `None` for charts built in memory.
    #[inline]
    pub fn partname(&self) -> Option<&PackURI> {
        self.partname.as_ref()
    }

    /// CRC-32 of the chart part as first loaded.
    #[inline]
    pub fn checksum(&self) -> u32 {
        self.checksum
    }
}

/// A chart ready to be embedded: chart space XML plus its workbook.
#[derive(Debug, Clone)]
pub struct ChartSource {
    xml: XmlDocument,
    workbook: Option<Arc<[u8]>>,
    origin: ChartOrigin,
}

impl ChartSource {
    /// A chart built in memory.
    pub fn new(xml: XmlDocument, workbook: Option<Vec<u8>>) -> Self {
        let checksum = checksum(&xml.to_bytes());
        Self {
            xml,
            workbook: workbook.map(Arc::from),
            origin: ChartOrigin {
                partname: None,
                checksum,
            },
        }
    }

    #[inline]
    pub fn xml(&self) -> &XmlDocument {
        &self.xml
    }

    /// Bytes of the embedded workbook, if the chart has one.
    #[inline]
    pub fn workbook(&self) -> Option<&[u8]> {
        self.workbook.as_deref()
    }

    #[inline]
    pub fn origin(&self) -> &ChartOrigin {
        &self.origin
    }
}

/// Returned by [`Document::add_chart`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartHandle {
    /// Relationship id to use in `c:chart/@r:id`
    pub r_id: String,
    pub partname: PackURI,
}

/// Side table of embedded charts.
#[derive(Debug, Default)]
pub(crate) struct ChartRegistry {
    origins: HashMap<PackURI, ChartOrigin>,
    workbooks: HashMap<u32, SmallVec<[PackURI; 1]>>,
}

impl Document {
    /// Extract a chart of this document for embedding elsewhere.
    pub fn chart_source(&self, partname: &PackURI) -> Result<ChartSource> {
        let part = self.package.part(partname)?;
        if part.content_type() != ct::DML_CHART {
            return Err(OoxmlError::InvalidContentType {
                expected: ct::DML_CHART.to_string(),
                got: part.content_type().to_string(),
            });
        }
        let xml = XmlDocument::parse(part.blob())?;

        let workbook = match xml.root().child("externalData").and_then(|e| e.attr_local("id")) {
            Some(r_id) => match part.rels().get(&r_id) {
                Some(rel) if !rel.is_external() => {
                    let target = rel.target_partname()?;
                    match self.package.part(&target) {
                        Ok(workbook) => Some(Arc::from(workbook.blob())),
                        Err(e) => {
                            warn!(%partname, error = %e, "chart workbook missing");
                            None
                        },
                    }
                },
                Some(_) => None,
                None => {
                    warn!(%partname, %r_id, "chart references an unknown workbook relationship");
                    None
                },
            },
            None => None,
        };

        let origin = self
            .charts
            .origins
            .get(partname)
            .cloned()
            .unwrap_or_else(|| ChartOrigin {
                partname: Some(partname.clone()),
                checksum: checksum(part.blob()),
            });

        Ok(ChartSource {
            xml,
            workbook,
            origin,
        })
    }

    /// Origin of a chart embedded with [`add_chart`](Self::add_chart).
    pub fn chart_origin(&self, partname: &PackURI) -> Option<&ChartOrigin> {
        self.charts.origins.get(partname)
    }

    /// Copy a chart into this document and relate it from `part`.
    ///
    /// The chart's workbook is copied unless an identical one was embedded
    /// before. Without a workbook, `c:externalData` is removed so the chart
    /// does not point outside the package. Parts the chart relates to other
    /// than its workbook (styles, colors, user shapes) are not copied.
    pub fn add_chart(&mut self, part: PartId, source: &ChartSource) -> Result<ChartHandle> {
        let host = self.part_partname(part)?;
        let opc = self.package.opc_package();
        let existing = opc
            .iter_parts()
            .filter(|p| p.content_type() == ct::DML_CHART)
            .count() as u32;
        let partname = opc.next_partname(CHART_TEMPLATE, existing + 1)?;

        let mut xml = source.xml().clone();
        let mut rels = Relationships::new(partname.base_uri().to_string());
        let root = xml.root_mut();
        root.children_mut()
            .retain(|n| !matches!(n, XmlNode::Element(e) if e.is("userShapes")));

        match &source.workbook {
            Some(bytes) => {
                let workbook = self.embed_workbook(bytes)?;
                let r_id = rels.get_or_add(rt::PACKAGE, &workbook);
                ensure_namespace(root, "r", ns::OFC_RELATIONSHIPS);
                point_external_data(root, &r_id);
            },
            None => {
                root.children_mut()
                    .retain(|n| !matches!(n, XmlNode::Element(e) if e.is("externalData")));
            },
        }

        let mut chart_part = XmlPart::new(partname.clone(), ct::DML_CHART.to_string(), xml.to_bytes());
        *chart_part.rels_mut() = rels;
        self.package.opc_package_mut().add_part(Box::new(chart_part));

        let r_id = self.package.part_mut(&host)?.relate_to(&partname, rt::CHART);
        self.charts
            .origins
            .insert(partname.clone(), source.origin().clone());

        debug!(%partname, %r_id, "embedded chart");
        Ok(ChartHandle { r_id, partname })
    }

    /// Part holding these workbook bytes, added on first use.
    fn embed_workbook(&mut self, bytes: &Arc<[u8]>) -> Result<PackURI> {
        let sum = checksum(bytes);
        if let Some(candidates) = self.charts.workbooks.get(&sum) {
            for candidate in candidates {
                if self
                    .package
                    .part(candidate)
                    .is_ok_and(|p| p.blob() == &bytes[..])
                {
                    return Ok(candidate.clone());
                }
            }
        }

        let partname = self.package.opc_package().next_partname(WORKBOOK_TEMPLATE, 1)?;
        self.package.opc_package_mut().add_part(Box::new(BlobPart::new(
            partname.clone(),
            ct::SML_SHEET.to_string(),
            Arc::clone(bytes),
        )));
        self.charts
            .workbooks
            .entry(sum)
            .or_default()
            .push(partname.clone());
        Ok(partname)
    }
}

/// Point `c:externalData` at `r_id` and drop its `c:autoUpdate` flag,
/// creating the element when the chart has none.
fn point_external_data(chart_space: &mut XmlElement, r_id: &str) {
    if let Some(external) = chart_space.child_mut("externalData") {
        if !external.set_attr_local("id", r_id) {
            external.set_attr("r:id", r_id);
        }
        external
            .children_mut()
            .retain(|n| !matches!(n, XmlNode::Element(e) if e.is("autoUpdate")));
        return;
    }

    let prefix = chart_space.prefix().unwrap_or("c").to_string();
    let external = XmlElement::new(format!("{}:externalData", prefix)).with_attr("r:id", r_id);
    // externalData precedes printSettings, userShapes and extLst
    let index = chart_space
        .indexed_elements()
        .find(|(_, e)| matches!(e.local_name(), "printSettings" | "userShapes" | "extLst"))
        .map_or(chart_space.children().len(), |(i, _)| i);
    chart_space.insert(index, external);
}
