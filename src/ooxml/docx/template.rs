//! Minimal parts for new documents and for stores created on demand.

/// Namespace declarations Word writes on the `w:document` root.
pub const DOCUMENT_NAMESPACES: &[(&str, &str)] = &[
    ("wpc", "http://schemas.microsoft.com/office/word/2010/wordprocessingCanvas"),
    ("mc", "http://schemas.openxmlformats.org/markup-compatibility/2006"),
    ("o", "urn:schemas-microsoft-com:office:office"),
    ("r", "http://schemas.openxmlformats.org/officeDocument/2006/relationships"),
    ("m", "http://schemas.openxmlformats.org/officeDocument/2006/math"),
    ("v", "urn:schemas-microsoft-com:vml"),
    ("wp14", "http://schemas.microsoft.com/office/word/2010/wordprocessingDrawing"),
    ("wp", "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing"),
    ("w10", "urn:schemas-microsoft-com:office:word"),
    ("w", "http://schemas.openxmlformats.org/wordprocessingml/2006/main"),
    ("w14", "http://schemas.microsoft.com/office/word/2010/wordml"),
    ("wpg", "http://schemas.microsoft.com/office/word/2010/wordprocessingGroup"),
    ("wpi", "http://schemas.microsoft.com/office/word/2010/wordprocessingInk"),
    ("wne", "http://schemas.microsoft.com/office/word/2006/wordml"),
    ("wps", "http://schemas.microsoft.com/office/word/2010/wordprocessingShape"),
];

pub const MC_IGNORABLE: &str = "w14 wp14";

/// An empty body with a single A4 section.
pub fn default_document_xml() -> String {
    let mut xml = String::with_capacity(2048);
    xml.push_str(crate::common::xml::XML_DECLARATION);
    xml.push_str("\r\n<w:document");
    for (prefix, uri) in DOCUMENT_NAMESPACES {
        xml.push_str(" xmlns:");
        xml.push_str(prefix);
        xml.push_str("=\"");
        xml.push_str(uri);
        xml.push('"');
    }
    xml.push_str(" mc:Ignorable=\"");
    xml.push_str(MC_IGNORABLE);
    xml.push_str("\">");
    xml.push_str(concat!(
        "<w:body>",
        "<w:sectPr>",
        r#"<w:pgSz w:w="11906" w:h="16838"/>"#,
        r#"<w:pgMar w:top="1440" w:right="1800" w:bottom="1440" w:left="1800" w:header="851" w:footer="992" w:gutter="0"/>"#,
        r#"<w:cols w:space="425"/>"#,
        "</w:sectPr>",
        "</w:body>",
        "</w:document>",
    ));
    xml
}

pub const EMPTY_NUMBERING_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\r\n",
    r#"<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"/>"#,
);

pub const EMPTY_COMMENTS_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\r\n",
    r#"<w:comments xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"/>"#,
);
