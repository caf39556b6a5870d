/// In-memory OPC package.
///
/// [`OpcPackage`] owns every part and the package-level relationships.
/// Parts keep the order in which they were loaded or added, and that order is
/// used when the package is written.
use crate::ooxml::opc::constants::relationship_type;
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::packuri::{PACKAGE_URI, PackURI};
use crate::ooxml::opc::part::{Part, PartFactory};
use crate::ooxml::opc::phys_pkg::PhysPkgReader;
use crate::ooxml::opc::pkgreader::PackageReader;
use crate::ooxml::opc::pkgwriter::PackageWriter;
use crate::ooxml::opc::rel::Relationships;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

#[derive(Debug)]
pub struct OpcPackage {
    rels: Relationships,
    parts: Vec<Box<dyn Part>>,
    index: HashMap<PackURI, usize>,
}

impl OpcPackage {
    /// Create a new empty package.
    pub fn new() -> Self {
        Self {
            rels: Relationships::new(PACKAGE_URI.to_string()),
            parts: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Open a package file.
    ///
    /// The file is read into memory and closed before parsing starts.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(data)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_reader(Cursor::new(data))
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut phys_reader = PhysPkgReader::new(reader)?;
        let pkg_reader = PackageReader::from_phys_reader(&mut phys_reader)?;
        drop(phys_reader);
        Self::unmarshal(pkg_reader)
    }

    fn unmarshal(pkg_reader: PackageReader) -> Result<Self> {
        let (rels, sparts) = pkg_reader.into_parts();
        let mut package = Self::new();
        package.rels = rels;

        for spart in sparts {
            let mut part = PartFactory::load(spart.partname, spart.content_type, spart.blob)?;
            *part.rels_mut() = spart.rels;
            package.add_part(part);
        }

        Ok(package)
    }

    /// The part the package's `officeDocument` relationship points to.
    pub fn main_document_partname(&self) -> Result<PackURI> {
        self.rels
            .part_with_reltype(relationship_type::OFFICE_DOCUMENT)?
            .target_partname()
    }

    pub fn main_document_part(&self) -> Result<&dyn Part> {
        let partname = self.main_document_partname()?;
        self.get_part(&partname)
    }

    pub fn get_part(&self, partname: &PackURI) -> Result<&dyn Part> {
        self.index
            .get(partname)
            .map(|&i| &*self.parts[i])
            .ok_or_else(|| OpcError::PartNotFound(partname.to_string()))
    }

    pub fn get_part_mut(&mut self, partname: &PackURI) -> Result<&mut dyn Part> {
        match self.index.get(partname) {
            Some(&i) => Ok(&mut *self.parts[i]),
            None => Err(OpcError::PartNotFound(partname.to_string())),
        }
    }

    /// Target part of `source`'s relationship `r_id`.
    pub fn related_part(&self, source: &PackURI, r_id: &str) -> Result<&dyn Part> {
        let partname = self.get_part(source)?.related_partname(r_id)?;
        self.get_part(&partname)
    }

    /// Add a part, replacing any part with the same name.
    pub fn add_part(&mut self, part: Box<dyn Part>) {
        let partname = part.partname().clone();
        match self.index.get(&partname) {
            Some(&i) => self.parts[i] = part,
            None => {
                self.index.insert(partname, self.parts.len());
                self.parts.push(part);
            },
        }
    }

    /// Remove a part. Relationships pointing at it are left to the caller.
    pub fn remove_part(&mut self, partname: &PackURI) -> Option<Box<dyn Part>> {
        let i = self.index.remove(partname)?;
        let part = self.parts.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(part)
    }

    pub fn iter_parts(&self) -> impl Iterator<Item = &dyn Part> {
        self.parts.iter().map(|b| &**b)
    }

    #[inline]
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    #[inline]
    pub fn contains_part(&self, partname: &PackURI) -> bool {
        self.index.contains_key(partname)
    }

    #[inline]
    pub fn rels(&self) -> &Relationships {
        &self.rels
    }

    #[inline]
    pub fn rels_mut(&mut self) -> &mut Relationships {
        &mut self.rels
    }

    /// Relate the package itself to a part, returning the rId.
    pub fn relate_to(&mut self, partname: &PackURI, reltype: &str) -> String {
        self.rels.get_or_add(reltype, partname)
    }

    /// First free part name for a `%d` template, counting from `start`.
    ///
    /// # Example
    /// ```
    /// use rambutan::ooxml::opc::OpcPackage;
    ///
    /// let pkg = OpcPackage::new();
    /// let next = pkg.next_partname("/word/media/image%d.png", 1).unwrap();
    /// assert_eq!(next.as_str(), "/word/media/image1.png");
    /// ```
    pub fn next_partname(&self, template: &str, start: u32) -> Result<PackURI> {
        let start = start.max(1);
        let limit = start.saturating_add(self.parts.len() as u32);
        for n in start..=limit {
            let candidate = PackURI::from_template(template, n)?;
            if !self.contains_part(&candidate) {
                return Ok(candidate);
            }
        }
        Err(OpcError::InvalidPackUri(format!(
            "no free partname for template '{}'",
            template
        )))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        PackageWriter::to_bytes(self)
    }

    /// Write the package to a file. The file is only created once the
    /// archive has been fully built in memory.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.to_bytes()?)?;
        Ok(())
    }
}

impl Default for OpcPackage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::opc::constants::content_type as ct;
    use crate::ooxml::opc::part::{BlobPart, XmlPart};
    use std::io::Cursor;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn create_minimal_docx() -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();

        writer.start_file("[Content_Types].xml", options).unwrap();
        writer.write_all(br#"<?xml version="1.0"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Default Extension="xml" ContentType="application/xml"/>
    <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
</Types>"#).unwrap();

        writer.start_file("_rels/.rels", options).unwrap();
        writer.write_all(br#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#).unwrap();

        writer.start_file("word/document.xml", options).unwrap();
        writer.write_all(br#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p/></w:body></w:document>"#).unwrap();

        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_open_package() {
        let pkg = OpcPackage::from_bytes(create_minimal_docx()).unwrap();
        assert_eq!(pkg.part_count(), 1);
        let main_part = pkg.main_document_part().unwrap();
        assert_eq!(main_part.content_type(), ct::WML_DOCUMENT_MAIN);
    }

    #[test]
    fn test_round_trip_with_media() {
        let mut pkg = OpcPackage::from_bytes(create_minimal_docx()).unwrap();
        let image = pkg.next_partname("/word/media/image%d.png", 1).unwrap();
        pkg.add_part(Box::new(BlobPart::new(image.clone(), ct::PNG.to_string(), vec![1u8, 2, 3])));
        let main = pkg.main_document_partname().unwrap();
        let r_id = pkg
            .get_part_mut(&main)
            .unwrap()
            .relate_to(&image, relationship_type::IMAGE);

        let reloaded = OpcPackage::from_bytes(pkg.to_bytes().unwrap()).unwrap();
        assert_eq!(reloaded.part_count(), 2);
        let media = reloaded.related_part(&main, &r_id).unwrap();
        assert_eq!(media.blob(), &[1, 2, 3]);
        assert_eq!(media.content_type(), ct::PNG);
    }

    #[test]
    fn test_remove_part_keeps_index() {
        let mut pkg = OpcPackage::new();
        for n in 1..=3 {
            let name = PackURI::from_template("/word/header%d.xml", n).unwrap();
            pkg.add_part(Box::new(XmlPart::new(name, ct::WML_HEADER.to_string(), b"<w:hdr/>".to_vec())));
        }
        let second = PackURI::new("/word/header2.xml").unwrap();
        assert!(pkg.remove_part(&second).is_some());
        assert!(!pkg.contains_part(&second));
        assert!(pkg.get_part(&PackURI::new("/word/header3.xml").unwrap()).is_ok());
        assert_eq!(pkg.next_partname("/word/header%d.xml", 1).unwrap(), second);
    }

    #[test]
    fn test_open_missing_file() {
        assert!(matches!(
            OpcPackage::open("/definitely/not/here.docx"),
            Err(OpcError::IoError(_))
        ));
    }
}
