/// Error types for document-level operations.
use thiserror::Error;

/// Result type for document-level operations.
pub type Result<T> = std::result::Result<T, OoxmlError>;

#[derive(Error, Debug)]
pub enum OoxmlError {
    /// OPC package error
    #[error("OPC error: {0}")]
    Opc(#[from] crate::ooxml::opc::error::OpcError),

    /// XML parsing error
    #[error("XML error: {0}")]
    Xml(String),

    /// An XML fragment that could not be interpreted, such as a drawing
    /// without a numeric `docPr` id
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// A merge or insertion was asked to target a run that does not exist
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// The relationship needed by an optional feature could not be built
    #[error("Relationship initialization failed: {0}")]
    RelationInit(String),

    #[error("Part not found: {0}")]
    PartNotFound(String),

    #[error("Invalid content type: expected {expected}, got {got}")]
    InvalidContentType { expected: String, got: String },

    #[error("Invalid relationship: {0}")]
    InvalidRelationship(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<quick_xml::Error> for OoxmlError {
    fn from(err: quick_xml::Error) -> Self {
        OoxmlError::Xml(err.to_string())
    }
}

impl From<crate::common::xml::XmlTreeError> for OoxmlError {
    fn from(err: crate::common::xml::XmlTreeError) -> Self {
        OoxmlError::Xml(err.0)
    }
}
