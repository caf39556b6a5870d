/// Errors raised while reading, editing or writing an OPC package.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpcError {
    /// A part name that is not an absolute, slash-separated URI
    #[error("invalid part name: {0}")]
    InvalidPackUri(String),

    #[error("no part named {0} in the package")]
    PartNotFound(String),

    /// No relationship with the requested id or type on a part
    #[error("relationship not found: {0}")]
    RelationshipNotFound(String),

    /// Neither an override nor an extension default covers the part
    #[error("no content type for {0}")]
    ContentTypeNotFound(String),

    #[error("invalid relationship: {0}")]
    InvalidRelationship(String),

    #[error("malformed package XML: {0}")]
    XmlError(String),

    #[error("ZIP container: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("I/O: {0}")]
    IoError(#[from] std::io::Error),

    #[error("malformed package XML: {0}")]
    QuickXmlError(#[from] quick_xml::Error),

    #[error("part is not valid UTF-8: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),

    #[error("malformed XML attribute: {0}")]
    AttrError(String),
}

impl From<quick_xml::events::attributes::AttrError> for OpcError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        OpcError::AttrError(err.to_string())
    }
}

impl From<crate::common::xml::XmlTreeError> for OpcError {
    fn from(err: crate::common::xml::XmlTreeError) -> Self {
        OpcError::XmlError(err.0)
    }
}

pub type Result<T> = std::result::Result<T, OpcError>;
