/// Package implementation for Word documents.
use crate::ooxml::docx::template;
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::constants::{content_type as ct, relationship_type as rt};
use crate::ooxml::opc::{OpcPackage, PackURI, Part, XmlPart};
use std::io::{Read, Seek};
use std::path::Path;

/// Part name of the main document in packages this crate creates.
pub const DOCUMENT_PARTNAME: &str = "/word/document.xml";

/// A Word (.docx) package.
///
/// Wraps an OPC package whose main part is a WordprocessingML document.
/// [`Document`](crate::ooxml::docx::Document) builds its graph on top of
/// this wrapper rather than extending the OPC package itself.
///
/// # Examples
///
/// ```rust,no_run
/// use rambutan::ooxml::docx::Package;
///
/// let pkg = Package::open("document.docx")?;
/// println!("main part: {}", pkg.main_partname()?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct Package {
    opc: OpcPackage,
}

impl Package {
    /// A package holding an empty document.
    pub fn new() -> Result<Self> {
        let mut opc = OpcPackage::new();
        let partname = PackURI::new(DOCUMENT_PARTNAME)?;
        opc.add_part(Box::new(XmlPart::new(
            partname.clone(),
            ct::WML_DOCUMENT_MAIN.to_string(),
            template::default_document_xml().into_bytes(),
        )));
        opc.relate_to(&partname, rt::OFFICE_DOCUMENT);
        Ok(Self { opc })
    }

    /// Open a .docx package from a file path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_opc(OpcPackage::open(path)?)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_opc(OpcPackage::from_bytes(data)?)
    }

    /// Create a .docx package from a reader.
    ///
    /// # Arguments
    ///
    /// * `reader` - A reader containing the .docx file data (must implement Read + Seek)
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        Self::from_opc(OpcPackage::from_reader(reader)?)
    }

    /// Wrap an OPC package after checking its main part's content type.
    pub fn from_opc(opc: OpcPackage) -> Result<Self> {
        let main_part = opc
            .main_document_part()
            .map_err(|e| OoxmlError::PartNotFound(format!("main document part: {}", e)))?;

        let content_type = main_part.content_type();
        if content_type != ct::WML_DOCUMENT_MAIN {
            return Err(OoxmlError::InvalidContentType {
                expected: ct::WML_DOCUMENT_MAIN.to_string(),
                got: content_type.to_string(),
            });
        }

        Ok(Self { opc })
    }

    pub fn main_partname(&self) -> Result<PackURI> {
        Ok(self.opc.main_document_partname()?)
    }

    pub fn part(&self, partname: &PackURI) -> Result<&dyn Part> {
        Ok(self.opc.get_part(partname)?)
    }

    pub fn part_mut(&mut self, partname: &PackURI) -> Result<&mut dyn Part> {
        Ok(self.opc.get_part_mut(partname)?)
    }

    /// Get the underlying OPC package.
    #[inline]
    pub fn opc_package(&self) -> &OpcPackage {
        &self.opc
    }

    #[inline]
    pub fn opc_package_mut(&mut self) -> &mut OpcPackage {
        &mut self.opc
    }

    #[inline]
    pub fn into_opc(self) -> OpcPackage {
        self.opc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_package_round_trip() {
        let pkg = Package::new().unwrap();
        assert_eq!(pkg.main_partname().unwrap().as_str(), DOCUMENT_PARTNAME);

        let bytes = pkg.opc_package().to_bytes().unwrap();
        let reopened = Package::from_bytes(bytes).unwrap();
        let main = reopened.main_partname().unwrap();
        assert_eq!(reopened.part(&main).unwrap().content_type(), ct::WML_DOCUMENT_MAIN);
    }

    #[test]
    fn test_rejects_other_main_content_type() {
        let mut opc = OpcPackage::new();
        let partname = PackURI::new("/xl/workbook.xml").unwrap();
        opc.add_part(Box::new(XmlPart::new(
            partname.clone(),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml".to_string(),
            b"<workbook/>".to_vec(),
        )));
        opc.relate_to(&partname, rt::OFFICE_DOCUMENT);
        assert!(matches!(
            Package::from_opc(opc),
            Err(OoxmlError::InvalidContentType { .. })
        ));
    }
}
