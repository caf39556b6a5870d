//! Rambutan - document graph management and structural merge for Word
//! (.docx) packages
//!
//! This library loads WordprocessingML packages into an indexed, mutable
//! object graph and performs the edits that are unsafe to do by hand on the
//! XML:
//!
//! - allocating multi-level numbering definitions without id collisions
//! - keeping drawing object ids unique across the whole package
//! - storing identical media once
//! - creating the comments part on demand
//! - embedding charts together with their workbooks
//! - merging whole documents into a host document at any run
//!
//! # Example - Merging documents
//!
//! ```no_run
//! use rambutan::{Document, MergeOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut host = Document::open("template.docx")?;
//! let anchor = host
//!     .find_run(|run| run.text().trim() == "{{+body}}")
//!     .ok_or("placeholder not found")?;
//!
//! let guests = vec![Document::open("a.docx")?, Document::open("b.docx")?];
//! let report = host.merge(guests, &anchor, &MergeOptions::default())?;
//! println!(
//!     "{} blocks, {} drawings renumbered, {} pictures reused",
//!     report.blocks, report.renumbered_drawings, report.reused_media
//! );
//! host.save("merged.docx")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Numbering
//!
//! ```no_run
//! use rambutan::{Document, NumberingFormat};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut doc = Document::new()?;
//! let list = doc.allocate_numbering(&[NumberingFormat::DECIMAL, NumberingFormat::LOWER_LETTER])?;
//! for (text, level) in [("first", 0), ("nested", 1), ("second", 0)] {
//!     let run = doc.append_run()?;
//!     doc.set_run_text(&run, text)?;
//!     doc.set_numbering(&run, list.num_id, level)?;
//! }
//! doc.save("list.docx")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Logging
//!
//! Indexing and merge progress is reported through `tracing` (`debug!`),
//! skipped malformed content through `warn!`. The library never installs a
//! subscriber.

pub mod common;
pub mod ooxml;

pub use ooxml::docx::{
    BlankRule, Document, LoadOptions, MergeOptions, MergeReport, NumberingFormat, PictureData,
    RunAnchor,
};
pub use ooxml::{OoxmlError, Result};
