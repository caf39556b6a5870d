/// DrawingML objects placed in runs.
///
/// Word places pictures, charts and shapes with a `wp:inline` (in the text
/// flow) or a `wp:anchor` (floating) element. Both carry a `wp:docPr` whose
/// `id` must be unique across the package.
use crate::common::xml::{NodePath, XmlElement};
use crate::ooxml::docx::document::PartId;
use std::borrow::Cow;

/// Graphic data URI of pictures.
pub const PICTURE_URI: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
/// Graphic data URI of charts.
pub const CHART_URI: &str = "http://schemas.openxmlformats.org/drawingml/2006/chart";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// `wp:inline`
    Inline,
    /// `wp:anchor`
    Floating,
}

/// A `wp:inline` or `wp:anchor` element.
#[derive(Debug, Clone)]
pub struct Drawing<'a> {
    element: &'a XmlElement,
    part: PartId,
    path: NodePath,
}

impl<'a> Drawing<'a> {
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

    pub fn placement(&self) -> Placement {
        if self.element.is("anchor") {
            Placement::Floating
        } else {
            Placement::Inline
        }
    }

    /// The `wp:docPr` id, `None` when missing or not a number.
    pub fn id(&self) -> Option<u32> {
        self.element.child("docPr").and_then(|pr| pr.attr_u32("id"))
    }

    pub fn name(&self) -> Option<Cow<'a, str>> {
        self.element.child("docPr").and_then(|pr| pr.attr_local("name"))
    }

    pub fn description(&self) -> Option<Cow<'a, str>> {
        self.element.child("docPr").and_then(|pr| pr.attr_local("descr"))
    }

    /// `(cx, cy)` in EMUs.
    pub fn extent(&self) -> Option<(i64, i64)> {
        let extent = self.element.child("extent")?;
        let cx = extent.attr_local("cx")?.trim().parse().ok()?;
        let cy = extent.attr_local("cy")?.trim().parse().ok()?;
        Some((cx, cy))
    }

    fn graphic_data_uri(&self) -> Option<Cow<'a, str>> {
        self.element
            .child("graphic")
            .and_then(|g| g.child("graphicData"))
            .and_then(|d| d.attr_local("uri"))
    }

    pub fn is_picture(&self) -> bool {
        self.graphic_data_uri().as_deref() == Some(PICTURE_URI)
    }

    pub fn is_chart(&self) -> bool {
        self.graphic_data_uri().as_deref() == Some(CHART_URI)
    }

    /// Relationship id of the picture's image part (`a:blip/@r:embed`).
    pub fn image_rel_id(&self) -> Option<Cow<'a, str>> {
        self.element.find("blip").and_then(|blip| blip.attr_local("embed"))
    }

    /// Relationship id of the chart part (`c:chart/@r:id`).
    pub fn chart_rel_id(&self) -> Option<Cow<'a, str>> {
        self.element
            .child("graphic")
            .and_then(|g| g.child("graphicData"))
            .and_then(|d| d.child("chart"))
            .and_then(|chart| chart.attr_local("id"))
    }
}

/// An inline picture drawing referencing the image relationship `r_id`.
pub(crate) fn inline_picture(id: u32, r_id: &str, filename: &str, cx: i64, cy: i64) -> XmlElement {
    let (cx, cy) = (cx.to_string(), cy.to_string());
    let id_str = id.to_string();

    let pic = XmlElement::new("pic:pic")
        .with_attr("xmlns:pic", PICTURE_URI)
        .with_child(
            XmlElement::new("pic:nvPicPr")
                .with_child(
                    XmlElement::new("pic:cNvPr")
                        .with_attr("id", "0")
                        .with_attr("name", filename),
                )
                .with_child(XmlElement::new("pic:cNvPicPr")),
        )
        .with_child(
            XmlElement::new("pic:blipFill")
                .with_child(XmlElement::new("a:blip").with_attr("r:embed", r_id))
                .with_child(XmlElement::new("a:stretch").with_child(XmlElement::new("a:fillRect"))),
        )
        .with_child(
            XmlElement::new("pic:spPr")
                .with_child(
                    XmlElement::new("a:xfrm")
                        .with_child(XmlElement::new("a:off").with_attr("x", "0").with_attr("y", "0"))
                        .with_child(XmlElement::new("a:ext").with_attr("cx", &cx).with_attr("cy", &cy)),
                )
                .with_child(
                    XmlElement::new("a:prstGeom")
                        .with_attr("prst", "rect")
                        .with_child(XmlElement::new("a:avLst")),
                ),
        );

    let inline = XmlElement::new("wp:inline")
        .with_attr("distT", "0")
        .with_attr("distB", "0")
        .with_attr("distL", "0")
        .with_attr("distR", "0")
        .with_child(XmlElement::new("wp:extent").with_attr("cx", &cx).with_attr("cy", &cy))
        .with_child(
            XmlElement::new("wp:effectExtent")
                .with_attr("l", "0")
                .with_attr("t", "0")
                .with_attr("r", "0")
                .with_attr("b", "0"),
        )
        .with_child(
            XmlElement::new("wp:docPr")
                .with_attr("id", &id_str)
                .with_attr("name", &format!("Picture {}", id)),
        )
        .with_child(
            XmlElement::new("wp:cNvGraphicFramePr").with_child(
                XmlElement::new("a:graphicFrameLocks")
                    .with_attr("xmlns:a", crate::ooxml::opc::constants::namespace::DML_MAIN)
                    .with_attr("noChangeAspect", "1"),
            ),
        )
        .with_child(
            XmlElement::new("a:graphic")
                .with_attr("xmlns:a", crate::ooxml::opc::constants::namespace::DML_MAIN)
                .with_child(
                    XmlElement::new("a:graphicData")
                        .with_attr("uri", PICTURE_URI)
                        .with_child(pic),
                ),
        );

    XmlElement::new("w:drawing").with_child(inline)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_picture_view() {
        let drawing = inline_picture(7, "rId4", "image1.png", 952_500, 476_250);
        let inline = drawing.child("inline").unwrap();
        let view = Drawing::new(inline, PartId::MAIN, NodePath::from_indices(&[0]));

        assert_eq!(view.placement(), Placement::Inline);
        assert_eq!(view.id(), Some(7));
        assert_eq!(view.name().as_deref(), Some("Picture 7"));
        assert_eq!(view.extent(), Some((952_500, 476_250)));
        assert!(view.is_picture());
        assert!(!view.is_chart());
        assert_eq!(view.image_rel_id().as_deref(), Some("rId4"));
    }

    #[test]
    fn test_floating_chart() {
        let xml = format!(
            r#"<wp:anchor xmlns:wp="{wp}" xmlns:a="{a}" xmlns:c="{c}" xmlns:r="{r}"><wp:docPr id="x"/><a:graphic><a:graphicData uri="{c}"><c:chart r:id="rId9"/></a:graphicData></a:graphic></wp:anchor>"#,
            wp = crate::ooxml::opc::constants::namespace::DML_WORDPROCESSING_DRAWING,
            a = crate::ooxml::opc::constants::namespace::DML_MAIN,
            c = CHART_URI,
            r = crate::ooxml::opc::constants::namespace::OFC_RELATIONSHIPS,
        );
        let anchor = XmlElement::parse_fragment(&xml).unwrap();
        let view = Drawing::new(&anchor, PartId::MAIN, NodePath::root());
        assert_eq!(view.placement(), Placement::Floating);
        assert_eq!(view.id(), None);
        assert!(view.is_chart());
        assert_eq!(view.chart_rel_id().as_deref(), Some("rId9"));
    }
}
