//! Reading a serialized OPC package.
//!
//! [`PackageReader`] parses `[Content_Types].xml`, then walks the
//! relationship graph from the package root and loads every reachable part
//! together with its relationships.

use crate::common::xml::unescape_xml;
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::packuri::PackURI;
use crate::ooxml::opc::phys_pkg::PhysPkgReader;
use crate::ooxml::opc::rel::Relationships;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{Read, Seek};
use tracing::warn;

/// A part as stored in the archive, before it becomes a `Part` object.
#[derive(Debug)]
pub struct SerializedPart {
    pub partname: PackURI,
    pub content_type: String,
    pub blob: Vec<u8>,
    pub rels: Relationships,
}

/// Content type lookup built from `Default` and `Override` entries.
#[derive(Debug, Default)]
pub(crate) struct ContentTypeMap {
    defaults: HashMap<String, String>,
    overrides: HashMap<String, String>,
}

impl ContentTypeMap {
    pub(crate) fn from_xml(xml: &[u8]) -> Result<Self> {
        let mut map = Self::default();
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::with_capacity(256);

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    let (key_name, is_default): (&[u8], bool) = match e.local_name().as_ref() {
                        b"Default" => (b"Extension", true),
                        b"Override" => (b"PartName", false),
                        _ => {
                            buf.clear();
                            continue;
                        },
                    };

                    let mut key = None;
                    let mut content_type = None;
                    for attr in e.attributes() {
                        let attr = attr?;
                        let value = unescape_xml(std::str::from_utf8(&attr.value)?).into_owned();
                        if attr.key.as_ref() == key_name {
                            key = Some(value);
                        } else if attr.key.as_ref() == b"ContentType" {
                            content_type = Some(value);
                        }
                    }

                    if let (Some(key), Some(ct)) = (key, content_type) {
                        if is_default {
                            map.defaults.insert(key.to_ascii_lowercase(), ct);
                        } else {
                            map.overrides.insert(key.to_ascii_lowercase(), ct);
                        }
                    }
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(OpcError::XmlError(format!(
                        "Content types parse error: {}",
                        e
                    )));
                },
                _ => {},
            }
            buf.clear();
        }

        Ok(map)
    }

    /// Override first, then the default for the extension. Part names are
    /// compared case-insensitively.
    pub(crate) fn get(&self, pack_uri: &PackURI) -> Result<String> {
        if let Some(ct) = self.overrides.get(&pack_uri.as_str().to_ascii_lowercase()) {
            return Ok(ct.clone());
        }
        if let Some(ct) = self.defaults.get(&pack_uri.ext().to_ascii_lowercase()) {
            return Ok(ct.clone());
        }
        Err(OpcError::ContentTypeNotFound(pack_uri.to_string()))
    }
}

/// Every part reachable from the package relationships.
pub struct PackageReader {
    pkg_rels: Relationships,
    parts: Vec<SerializedPart>,
}

impl PackageReader {
    pub fn from_phys_reader<R: Read + Seek>(phys: &mut PhysPkgReader<R>) -> Result<Self> {
        let content_types = ContentTypeMap::from_xml(&phys.content_types_xml()?)?;
        let package_uri = PackURI::package();
        let pkg_rels = Self::load_rels(phys, &package_uri)?;

        let mut parts = Vec::with_capacity(32);
        let mut visited: HashSet<PackURI> = HashSet::with_capacity(32);
        let mut queue: VecDeque<PackURI> = VecDeque::new();
        Self::enqueue_targets(&pkg_rels, &mut visited, &mut queue);

        // Breadth first, so parts come out in relationship declaration order
        while let Some(partname) = queue.pop_front() {
            if !phys.contains(&partname) {
                warn!(part = %partname, "relationship targets a part missing from the archive");
                continue;
            }
            let rels = Self::load_rels(phys, &partname)?;
            Self::enqueue_targets(&rels, &mut visited, &mut queue);

            let blob = phys.blob_for(&partname)?;
            let content_type = content_types.get(&partname)?;
            parts.push(SerializedPart {
                partname,
                content_type,
                blob,
                rels,
            });
        }

        Ok(Self { pkg_rels, parts })
    }

    fn load_rels<R: Read + Seek>(
        phys: &mut PhysPkgReader<R>,
        source: &PackURI,
    ) -> Result<Relationships> {
        let base_uri = source.base_uri().to_string();
        match phys.rels_xml_for(source)? {
            Some(xml) => Relationships::from_xml(base_uri, &xml),
            None => Ok(Relationships::new(base_uri)),
        }
    }

    fn enqueue_targets(
        rels: &Relationships,
        visited: &mut HashSet<PackURI>,
        queue: &mut VecDeque<PackURI>,
    ) {
        for rel in rels.iter().filter(|r| !r.is_external()) {
            match rel.target_partname() {
                Ok(partname) => {
                    if visited.insert(partname.clone()) {
                        queue.push_back(partname);
                    }
                },
                Err(e) => warn!(r_id = rel.r_id(), error = %e, "unresolvable relationship target"),
            }
        }
    }

    pub fn into_parts(self) -> (Relationships, Vec<SerializedPart>) {
        (self.pkg_rels, self.parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_map() {
        let xml = br#"<?xml version="1.0"?>
            <Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
                <Default Extension="xml" ContentType="application/xml"/>
                <Default Extension="PNG" ContentType="image/png"/>
                <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
            </Types>"#;

        let ct_map = ContentTypeMap::from_xml(xml).unwrap();

        let uri = PackURI::new("/test.xml").unwrap();
        assert_eq!(ct_map.get(&uri).unwrap(), "application/xml");
        let uri = PackURI::new("/word/media/image1.png").unwrap();
        assert_eq!(ct_map.get(&uri).unwrap(), "image/png");
        let uri = PackURI::new("/word/document.xml").unwrap();
        assert_eq!(
            ct_map.get(&uri).unwrap(),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"
        );
        let uri = PackURI::new("/word/media/image1.emf").unwrap();
        assert!(ct_map.get(&uri).is_err());
    }
}
