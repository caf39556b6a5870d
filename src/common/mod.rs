//! Utilities shared by the package and document layers.

pub mod unit;
pub mod xml;

pub use xml::{NodePath, XmlDocument, XmlElement, XmlNode};
