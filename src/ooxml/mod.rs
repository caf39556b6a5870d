//! Office Open XML (OOXML) format implementation.
//!
//! The module is organized into two layers:
//!
//! 1. **OPC Layer** (`opc`): package handling (ZIP container, parts,
//!    relationships, content types)
//! 2. **WordprocessingML** (`docx`): the document graph, its stores and the
//!    merge engine
//!
//! # Example
//!
//! ```rust,no_run
//! use rambutan::ooxml::docx::Document;
//!
//! let doc = Document::open("document.docx")?;
//! for para in doc.paragraphs() {
//!     println!("{}", para.text());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
pub mod docx;
pub mod error;
pub mod opc;

// Re-export commonly used types from OPC layer
pub use opc::{OpcPackage, PackURI};

// Re-export error types
pub use error::{OoxmlError, Result};
