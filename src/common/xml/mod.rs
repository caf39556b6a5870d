//! XML helpers shared by every part handler.

pub mod escape;
pub mod tree;

pub use escape::{escape_xml, unescape_xml};
pub use tree::{
    Attribute, NodePath, Walk, XML_DECLARATION, XmlDocument, XmlElement, XmlNode, XmlTreeError,
};
