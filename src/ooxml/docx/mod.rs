/// Word (.docx) document graph and merge support.
///
/// A [`Document`] is a [`Package`] plus parsed body parts and the
/// package-wide stores that keep cross references consistent while the
/// document is edited:
///
/// - `ContentStore`: embedded media, deduplicated by content
/// - `IdentifierManager`: collision-free drawing (`wp:docPr`) ids
/// - `NumberingStore`: list definitions and numbering instances
/// - `CommentStore`: the comments part, created on first use
///
/// Documents can be merged into each other at any run with
/// [`Document::merge`], which rebuilds relationships, media, drawing ids,
/// numbering and comments of the imported content on the host side.
///
/// # Example
///
/// ```rust,no_run
/// use rambutan::ooxml::docx::{Document, MergeOptions, PictureData};
///
/// let mut doc = Document::open("template.docx")?;
///
/// for table in doc.tables() {
///     println!("table with {} rows", table.row_count());
/// }
///
/// let anchor = doc.append_run()?;
/// let logo = PictureData::from_path(120, 40, "logo.png")?;
/// doc.insert_picture(&anchor, &logo)?;
///
/// let appendix = Document::open("appendix.docx")?;
/// doc.append_document(appendix)?;
/// doc.save("out.docx")?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub mod chart;
pub mod comment;
pub mod document;
pub mod drawing;
pub mod format;
pub mod identifier;
pub mod media;
pub mod merge;
pub mod numbering;
pub mod options;
pub mod package;
pub mod paragraph;
pub mod table;
pub mod template;

pub use chart::{ChartHandle, ChartOrigin, ChartSource};
pub use comment::{Comment, CommentStore, PartDescriptor};
pub use document::{Document, PartId, PartKind};
pub use drawing::{Drawing, Placement};
pub use format::{PictureData, PictureFormat};
pub use identifier::IdentifierManager;
pub use media::{ContentStore, Interned, MediaId, MediaItem};
pub use merge::MergeReport;
pub use numbering::{LevelInfo, NumberFormat, NumberingAllocation, NumberingFormat, NumberingStore};
pub use options::{BlankRule, LoadOptions, MergeOptions};
pub use package::Package;
pub use paragraph::{Block, Paragraph, Run, RunAnchor};
pub use table::{Cell, Row, Table};
