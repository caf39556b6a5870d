/// Table, Row and Cell views for Word documents.
use crate::common::xml::{NodePath, XmlElement};
use crate::ooxml::docx::document::PartId;
use crate::ooxml::docx::paragraph::{Block, Paragraph, collect_blocks};
use smallvec::SmallVec;

/// A table in a Word document.
///
/// Represents a `<w:tbl>` element.
///
/// # Example
///
/// ```rust,no_run
/// use rambutan::ooxml::docx::Document;
///
/// let doc = Document::open("document.docx")?;
/// for table in doc.tables() {
///     for row in table.rows() {
///         for cell in row.cells() {
///             println!("Cell: {}", cell.text());
///         }
///     }
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct Table<'a> {
    element: &'a XmlElement,
    part: PartId,
    path: NodePath,
}

impl<'a> Table<'a> {
    pub(crate) fn new(element: &'a XmlElement, part: PartId, path: NodePath) -> Self {
        Self {
            element,
            part,
            path,
        }
    }

    #[inline]
    pub fn element(&self) -> &'a XmlElement {
        self.element
    }

    #[inline]
    pub fn part(&self) -> PartId {
        self.part
    }

    #[inline]
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Rows in order, including rows wrapped in content controls.
    pub fn rows(&self) -> SmallVec<[Row<'a>; 16]> {
        let mut rows = SmallVec::new();
        collect_named(self.element, "tr", &self.path, &mut |e, path| {
            rows.push(Row {
                element: e,
                part: self.part,
                path,
            })
        });
        rows
    }

    #[inline]
    pub fn row_count(&self) -> usize {
        self.rows().len()
    }

    /// Number of grid columns (`w:tblGrid/w:gridCol`), falling back to the
    /// cell count of the first row.
    pub fn column_count(&self) -> usize {
        match self.element.child("tblGrid") {
            Some(grid) => grid.elements_named("gridCol").count(),
            None => self.rows().first().map_or(0, |row| row.cells().len()),
        }
    }

    pub fn cell(&self, row_idx: usize, col_idx: usize) -> Option<Cell<'a>> {
        self.rows()
            .get(row_idx)
            .and_then(|row| row.cells().get(col_idx).cloned())
    }
}

/// A row in a table (`<w:tr>`).
#[derive(Debug, Clone)]
pub struct Row<'a> {
    element: &'a XmlElement,
    part: PartId,
    path: NodePath,
}

impl<'a> Row<'a> {
    #[inline]
    pub fn element(&self) -> &'a XmlElement {
        self.element
    }

    pub fn cells(&self) -> SmallVec<[Cell<'a>; 16]> {
        let mut cells = SmallVec::new();
        collect_named(self.element, "tc", &self.path, &mut |e, path| {
            cells.push(Cell {
                element: e,
                part: self.part,
                path,
            })
        });
        cells
    }
}

/// A cell in a table row (`<w:tc>`).
///
/// A cell is a body-like container holding paragraphs and nested tables.
#[derive(Debug, Clone)]
pub struct Cell<'a> {
    element: &'a XmlElement,
    part: PartId,
    path: NodePath,
}

impl<'a> Cell<'a> {
    #[inline]
    pub fn element(&self) -> &'a XmlElement {
        self.element
    }

    #[inline]
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Columns spanned by this cell (`w:gridSpan`), 1 by default.
    pub fn grid_span(&self) -> usize {
        self.element
            .child("tcPr")
            .and_then(|pr| pr.child("gridSpan"))
            .and_then(|span| span.attr_u32("val"))
            .map_or(1, |v| v as usize)
    }

    pub fn blocks(&self) -> Vec<Block<'a>> {
        let mut blocks = Vec::new();
        collect_blocks(self.element, self.part, &self.path, &mut blocks);
        blocks
    }

    pub fn paragraphs(&self) -> SmallVec<[Paragraph<'a>; 8]> {
        self.blocks()
            .into_iter()
            .filter_map(|b| match b {
                Block::Paragraph(p) => Some(p),
                Block::Table(_) => None,
            })
            .collect()
    }

    pub fn tables(&self) -> Vec<Table<'a>> {
        self.blocks()
            .into_iter()
            .filter_map(|b| match b {
                Block::Table(t) => Some(t),
                Block::Paragraph(_) => None,
            })
            .collect()
    }

    /// Text of the cell's paragraphs, one line per paragraph.
    pub fn text(&self) -> String {
        self.paragraphs()
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Children named `local`, looking through `w:sdt/w:sdtContent` and
/// `w:customXml` wrappers.
fn collect_named<'a, F>(parent: &'a XmlElement, local: &str, path: &NodePath, push: &mut F)
where
    F: FnMut(&'a XmlElement, NodePath),
{
    for (i, child) in parent.indexed_elements() {
        let child_path = path.child(i);
        if child.is(local) {
            push(child, child_path);
        } else if child.is("sdt") {
            if let Some(j) = child.position("sdtContent") {
                if let Some(content) = child.child("sdtContent") {
                    collect_named(content, local, &child_path.child(j), push);
                }
            }
        } else if child.is("customXml") {
            collect_named(child, local, &child_path, push);
        }
    }
}
