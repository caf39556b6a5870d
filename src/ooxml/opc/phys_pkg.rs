//! Physical (ZIP) container access for OPC packages.
//!
//! The reader and writer are short lived: a package is read completely when
//! it is opened and written completely when it is saved, and the archive
//! handle is dropped on every exit path.

use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::packuri::{CONTENT_TYPES_URI, PackURI};
use std::io::{Cursor, Read, Seek, Write};
use zip::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};

/// Read access to the members of a ZIP-based package.
pub struct PhysPkgReader<R: Read + Seek> {
    archive: ZipArchive<R>,
}

impl PhysPkgReader<Cursor<Vec<u8>>> {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::new(Cursor::new(data))
    }
}

impl<R: Read + Seek> PhysPkgReader<R> {
    pub fn new(reader: R) -> Result<Self> {
        Ok(Self {
            archive: ZipArchive::new(reader)?,
        })
    }

    /// Content of the member backing a part.
    pub fn blob_for(&mut self, pack_uri: &PackURI) -> Result<Vec<u8>> {
        let mut file = self
            .archive
            .by_name(pack_uri.membername())
            .map_err(|_| OpcError::PartNotFound(pack_uri.to_string()))?;
        let mut blob = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut blob)?;
        Ok(blob)
    }

    pub fn content_types_xml(&mut self) -> Result<Vec<u8>> {
        let uri = PackURI::new(CONTENT_TYPES_URI)?;
        self.blob_for(&uri)
    }

    /// The `.rels` member of a source, `None` when it has no relationships.
    pub fn rels_xml_for(&mut self, source_uri: &PackURI) -> Result<Option<Vec<u8>>> {
        let rels_uri = source_uri.rels_uri()?;
        if !self.contains(&rels_uri) {
            return Ok(None);
        }
        self.blob_for(&rels_uri).map(Some)
    }

    #[inline]
    pub fn contains(&self, pack_uri: &PackURI) -> bool {
        self.archive.index_for_name(pack_uri.membername()).is_some()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }
}

/// Writes package members into a ZIP archive.
pub struct PhysPkgWriter<W: Write + Seek> {
    zip_writer: ZipWriter<W>,
}

impl PhysPkgWriter<Cursor<Vec<u8>>> {
    /// A writer that builds the archive in memory.
    pub fn in_memory() -> Self {
        Self::new(Cursor::new(Vec::new()))
    }
}

impl<W: Write + Seek> PhysPkgWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            zip_writer: ZipWriter::new(writer),
        }
    }

    /// Write a member, deflate compressed.
    pub fn write(&mut self, pack_uri: &PackURI, blob: &[u8]) -> Result<()> {
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        self.zip_writer.start_file(pack_uri.membername(), options)?;
        self.zip_writer.write_all(blob)?;
        Ok(())
    }

    /// Finish the central directory and hand back the underlying writer.
    pub fn finish(self) -> Result<W> {
        Ok(self.zip_writer.finish()?)
    }
}
