/// Relationships between parts of an OPC package.
///
/// Each source (a part or the package itself) owns one `Relationships`
/// collection, serialized as its `.rels` part. Declaration order is kept so
/// that consumers can visit related parts in the order the source lists them.
use crate::common::xml::{escape_xml, unescape_xml};
use crate::ooxml::opc::constants::target_mode;
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::packuri::PackURI;
use quick_xml::Reader;
use quick_xml::events::Event;

/// A single relationship from a source part to a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    r_id: String,
    reltype: String,
    /// Part reference relative to the source's directory, or an external URL
    target_ref: String,
    base_uri: String,
    is_external: bool,
}

impl Relationship {
    pub fn new(
        r_id: String,
        reltype: String,
        target_ref: String,
        base_uri: String,
        is_external: bool,
    ) -> Self {
        Self {
            r_id,
            reltype,
            target_ref,
            base_uri,
            is_external,
        }
    }

    #[inline]
    pub fn r_id(&self) -> &str {
        &self.r_id
    }

    #[inline]
    pub fn reltype(&self) -> &str {
        &self.reltype
    }

    #[inline]
    pub fn target_ref(&self) -> &str {
        &self.target_ref
    }

    #[inline]
    pub fn is_external(&self) -> bool {
        self.is_external
    }

    /// Absolute target part name of an internal relationship.
    pub fn target_partname(&self) -> Result<PackURI> {
        if self.is_external {
            return Err(OpcError::InvalidRelationship(format!(
                "relationship '{}' targets external '{}'",
                self.r_id, self.target_ref
            )));
        }
        PackURI::from_rel_ref(&self.base_uri, &self.target_ref)
    }
}

/// Ordered collection of relationships from a single source.
#[derive(Debug, Clone)]
pub struct Relationships {
    base_uri: String,
    rels: Vec<Relationship>,
}

impl Relationships {
    pub fn new(base_uri: String) -> Self {
        Self {
            base_uri,
            rels: Vec::new(),
        }
    }

    /// Parse a `.rels` part. Targets are resolved against `base_uri`.
    pub fn from_xml(base_uri: String, xml: &[u8]) -> Result<Self> {
        let mut rels = Self::new(base_uri);
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::with_capacity(512);

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Empty(ref e) | Event::Start(ref e)
                    if e.local_name().as_ref() == b"Relationship" =>
                {
                    let mut r_id = None;
                    let mut reltype = None;
                    let mut target = None;
                    let mut is_external = false;

                    for attr in e.attributes() {
                        let attr = attr?;
                        let value = unescape_xml(std::str::from_utf8(&attr.value)?).into_owned();
                        match attr.key.as_ref() {
                            b"Id" => r_id = Some(value),
                            b"Type" => reltype = Some(value),
                            b"Target" => target = Some(value),
                            b"TargetMode" => is_external = value == target_mode::EXTERNAL,
                            _ => {},
                        }
                    }

                    match (r_id, reltype, target) {
                        (Some(r_id), Some(reltype), Some(target)) => {
                            rels.add_relationship(reltype, target, r_id, is_external);
                        },
                        _ => {
                            return Err(OpcError::InvalidRelationship(
                                "relationship without Id, Type or Target".to_string(),
                            ));
                        },
                    }
                },
                Event::Eof => break,
                _ => {},
            }
            buf.clear();
        }

        Ok(rels)
    }

    #[inline]
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Add a relationship, replacing any existing one with the same id.
    pub fn add_relationship(
        &mut self,
        reltype: String,
        target_ref: String,
        r_id: String,
        is_external: bool,
    ) -> &Relationship {
        let rel = Relationship::new(r_id, reltype, target_ref, self.base_uri.clone(), is_external);
        let index = match self.rels.iter().position(|r| r.r_id == rel.r_id) {
            Some(i) => {
                self.rels[i] = rel;
                i
            },
            None => {
                self.rels.push(rel);
                self.rels.len() - 1
            },
        };
        &self.rels[index]
    }

    #[inline]
    pub fn get(&self, r_id: &str) -> Option<&Relationship> {
        self.rels.iter().find(|r| r.r_id == r_id)
    }

    /// Relationship id of an internal relationship of `reltype` to `target`,
    /// created with the next free id when none exists yet.
    pub fn get_or_add(&mut self, reltype: &str, target: &PackURI) -> String {
        let target_ref = target.relative_ref(&self.base_uri);
        if let Some(rel) = self
            .rels
            .iter()
            .find(|r| !r.is_external && r.reltype == reltype && r.target_ref == target_ref)
        {
            return rel.r_id.clone();
        }

        let r_id = self.next_r_id();
        self.add_relationship(reltype.to_string(), target_ref, r_id.clone(), false);
        r_id
    }

    /// Like [`get_or_add`](Self::get_or_add) for external targets such as URLs.
    pub fn get_or_add_ext_rel(&mut self, reltype: &str, target_ref: &str) -> String {
        if let Some(rel) = self
            .rels
            .iter()
            .find(|r| r.is_external && r.reltype == reltype && r.target_ref == target_ref)
        {
            return rel.r_id.clone();
        }

        let r_id = self.next_r_id();
        self.add_relationship(reltype.to_string(), target_ref.to_string(), r_id.clone(), true);
        r_id
    }

    /// The lowest free id of the form `rIdN`, N starting at 1.
    pub fn next_r_id(&self) -> String {
        let mut used: Vec<u32> = self
            .rels
            .iter()
            .filter_map(|r| r.r_id.strip_prefix("rId"))
            .filter_map(|n| atoi_simd::parse::<u32, false, false>(n.as_bytes()).ok())
            .collect();
        used.sort_unstable();
        used.dedup();

        let mut next = 1u32;
        for n in used {
            if n == next {
                next += 1;
            } else if n > next {
                break;
            }
        }
        format!("rId{}", next)
    }

    /// The single relationship of a type.
    ///
    /// Errors when there is none or when the type is ambiguous.
    pub fn part_with_reltype(&self, reltype: &str) -> Result<&Relationship> {
        let mut matching = self.iter_by_type(reltype);
        match (matching.next(), matching.next()) {
            (Some(rel), None) => Ok(rel),
            (None, _) => Err(OpcError::RelationshipNotFound(format!(
                "No relationship of type '{}'",
                reltype
            ))),
            (Some(_), Some(_)) => Err(OpcError::InvalidRelationship(format!(
                "Multiple relationships of type '{}'",
                reltype
            ))),
        }
    }

    /// Relationships of one type, in declaration order.
    pub fn iter_by_type<'a, 'b>(&'a self, reltype: &'b str) -> impl Iterator<Item = &'a Relationship> + use<'a, 'b> {
        self.rels.iter().filter(move |r| r.reltype == reltype)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    pub fn remove(&mut self, r_id: &str) -> Option<Relationship> {
        let pos = self.rels.iter().position(|r| r.r_id == r_id)?;
        Some(self.rels.remove(pos))
    }

    /// Serialize as a `.rels` part, in declaration order.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(256 + self.rels.len() * 160);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );

        for rel in &self.rels {
            xml.push_str(r#"<Relationship Id=""#);
            xml.push_str(&escape_xml(&rel.r_id));
            xml.push_str(r#"" Type=""#);
            xml.push_str(&escape_xml(&rel.reltype));
            xml.push_str(r#"" Target=""#);
            xml.push_str(&escape_xml(&rel.target_ref));
            xml.push('"');
            if rel.is_external {
                xml.push_str(r#" TargetMode="External""#);
            }
            xml.push_str("/>");
        }

        xml.push_str("</Relationships>");
        xml
    }
}

impl Default for Relationships {
    fn default() -> Self {
        Self::new("/".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::opc::constants::relationship_type as RT;

    #[test]
    fn test_next_r_id_fills_gaps() {
        let mut rels = Relationships::new("/word".to_string());
        assert_eq!(rels.next_r_id(), "rId1");

        rels.add_relationship("t".to_string(), "a.xml".to_string(), "rId1".to_string(), false);
        rels.add_relationship("t".to_string(), "b.xml".to_string(), "rId3".to_string(), false);
        assert_eq!(rels.next_r_id(), "rId2");
    }

    #[test]
    fn test_get_or_add() {
        let mut rels = Relationships::new("/word".to_string());
        let image = PackURI::new("/word/media/image1.png").unwrap();

        let r1 = rels.get_or_add(RT::IMAGE, &image);
        assert_eq!(r1, "rId1");
        assert_eq!(rels.get(&r1).unwrap().target_ref(), "media/image1.png");
        assert_eq!(rels.get_or_add(RT::IMAGE, &image), "rId1");

        let url = rels.get_or_add_ext_rel(RT::HYPERLINK, "https://example.com");
        assert_eq!(url, "rId2");
        assert_eq!(rels.get_or_add_ext_rel(RT::HYPERLINK, "https://example.com"), "rId2");
    }

    #[test]
    fn test_parse_keeps_declaration_order() {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId9" Type="{h}" Target="header2.xml"/>
<Relationship Id="rId2" Type="{h}" Target="header1.xml"/>
<Relationship Id="rId5" Type="{l}" Target="https://a.example/?x=1&amp;y=2" TargetMode="External"/>
</Relationships>"#,
            h = RT::HEADER,
            l = RT::HYPERLINK
        );
        let rels = Relationships::from_xml("/word".to_string(), xml.as_bytes()).unwrap();

        let headers: Vec<_> = rels.iter_by_type(RT::HEADER).map(|r| r.r_id()).collect();
        assert_eq!(headers, ["rId9", "rId2"]);
        assert_eq!(
            rels.get("rId2").unwrap().target_partname().unwrap().as_str(),
            "/word/header1.xml"
        );

        let link = rels.get("rId5").unwrap();
        assert!(link.is_external());
        assert_eq!(link.target_ref(), "https://a.example/?x=1&y=2");
        assert!(link.target_partname().is_err());
        assert!(rels.to_xml().contains("x=1&amp;y=2"));
        assert!(rels.part_with_reltype(RT::HEADER).is_err());
    }
}
