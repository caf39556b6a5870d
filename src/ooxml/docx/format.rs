//! Picture input types.
//!
//! Pictures reach the document as a [`PictureData`]: pixel size, format and
//! the raw bytes. Constructors accept bytes, a file path or a reader.

use crate::common::unit::px_to_emu_96;
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::constants::content_type as ct;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Picture formats that can be embedded in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PictureFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Tiff,
    Emf,
    Wmf,
    Svg,
}

impl PictureFormat {
    /// Detect the format from the byte signature.
    pub fn detect_from_bytes(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }
        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some(Self::Gif);
        }
        if data.starts_with(b"BM") && data.len() >= 14 {
            return Some(Self::Bmp);
        }
        if data.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || data.starts_with(&[0x4D, 0x4D, 0x00, 0x2A])
        {
            return Some(Self::Tiff);
        }
        // " EMF" signature of the EMR_HEADER record
        if data.len() >= 44 && data[40..44] == [0x20, 0x45, 0x4D, 0x46] {
            return Some(Self::Emf);
        }
        if data.starts_with(&[0xD7, 0xCD, 0xC6, 0x9A]) || data.starts_with(&[0x01, 0x00, 0x09, 0x00])
        {
            return Some(Self::Wmf);
        }
        let head = &data[..data.len().min(256)];
        if memchr::memmem::find(head, b"<svg").is_some() {
            return Some(Self::Svg);
        }
        None
    }

    /// Suggest a format from a file extension (case-insensitive, with or
    /// without the leading period).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" | "jpe" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "bmp" | "dib" => Some(Self::Bmp),
            "tif" | "tiff" => Some(Self::Tiff),
            "emf" => Some(Self::Emf),
            "wmf" => Some(Self::Wmf),
            "svg" => Some(Self::Svg),
            _ => None,
        }
    }

    /// Format of an existing media part, from its content type.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type {
            ct::PNG => Some(Self::Png),
            ct::JPEG | "image/jpg" => Some(Self::Jpeg),
            ct::GIF => Some(Self::Gif),
            ct::BMP => Some(Self::Bmp),
            ct::TIFF => Some(Self::Tiff),
            ct::X_EMF => Some(Self::Emf),
            ct::X_WMF => Some(Self::Wmf),
            ct::SVG => Some(Self::Svg),
            _ => None,
        }
    }

    /// Extension used for media part names.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
            Self::Emf => "emf",
            Self::Wmf => "wmf",
            Self::Svg => "svg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => ct::PNG,
            Self::Jpeg => ct::JPEG,
            Self::Gif => ct::GIF,
            Self::Bmp => ct::BMP,
            Self::Tiff => ct::TIFF,
            Self::Emf => ct::X_EMF,
            Self::Wmf => ct::X_WMF,
            Self::Svg => ct::SVG,
        }
    }
}

/// A picture ready to be inserted: size in pixels, format and content.
#[derive(Debug, Clone)]
pub struct PictureData {
    width: u32,
    height: u32,
    format: PictureFormat,
    bytes: Arc<[u8]>,
}

impl PictureData {
    /// Build from raw bytes, detecting the format from the signature.
    pub fn from_bytes(width: u32, height: u32, bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        let bytes = bytes.into();
        let format = PictureFormat::detect_from_bytes(&bytes).ok_or_else(|| {
            OoxmlError::InvalidFormat("unrecognized picture signature".to_string())
        })?;
        Ok(Self {
            width,
            height,
            format,
            bytes,
        })
    }

    /// Build from raw bytes with an explicit format.
    pub fn with_format(
        width: u32,
        height: u32,
        format: PictureFormat,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            width,
            height,
            format,
            bytes: bytes.into(),
        }
    }

    /// Read a picture file. The format is suggested by the extension and
    /// falls back to the byte signature.
    pub fn from_path<P: AsRef<Path>>(width: u32, height: u32, path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let suggested = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(PictureFormat::from_extension);
        match suggested {
            Some(format) => Ok(Self::with_format(width, height, format, bytes)),
            None => Self::from_bytes(width, height, bytes),
        }
    }

    /// Drain a stream. The format comes from the byte signature.
    pub fn from_reader<R: Read>(width: u32, height: u32, mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(width, height, bytes)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn format(&self) -> PictureFormat {
        self.format
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub(crate) fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    /// Extent in EMUs at 96 DPI.
    #[inline]
    pub fn extent_emu(&self) -> (i64, i64) {
        (px_to_emu_96(self.width), px_to_emu_96(self.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_detect_from_bytes() {
        assert_eq!(PictureFormat::detect_from_bytes(&PNG_HEADER), Some(PictureFormat::Png));
        assert_eq!(
            PictureFormat::detect_from_bytes(b"GIF89a\x01\x00"),
            Some(PictureFormat::Gif)
        );
        assert_eq!(
            PictureFormat::detect_from_bytes(b"<?xml version=\"1.0\"?><svg/>"),
            Some(PictureFormat::Svg)
        );
        assert_eq!(PictureFormat::detect_from_bytes(b"plain"), None);
    }

    #[test]
    fn test_extension_suggestion() {
        assert_eq!(PictureFormat::from_extension(".JPG"), Some(PictureFormat::Jpeg));
        assert_eq!(PictureFormat::from_extension("tif"), Some(PictureFormat::Tiff));
        assert_eq!(PictureFormat::from_extension("docx"), None);
        assert_eq!(PictureFormat::Jpeg.mime_type(), "image/jpeg");
    }

    #[test]
    fn test_picture_sources() {
        let pic = PictureData::from_reader(96, 48, Cursor::new(PNG_HEADER.to_vec())).unwrap();
        assert_eq!(pic.format(), PictureFormat::Png);
        assert_eq!(pic.extent_emu(), (914_400, 457_200));
        assert!(PictureData::from_bytes(1, 1, b"nope".to_vec()).is_err());

        let mut file = tempfile::Builder::new().suffix(".gif").tempfile().unwrap();
        file.write_all(&PNG_HEADER).unwrap();
        let pic = PictureData::from_path(10, 10, file.path()).unwrap();
        assert_eq!(pic.format(), PictureFormat::Gif);
        assert_eq!(pic.bytes(), &PNG_HEADER);
    }
}
