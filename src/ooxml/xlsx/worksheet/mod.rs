//! Streaming worksheet codec.
//!
//! A worksheet part is never held in memory as a whole. [`WorksheetReader`]
//! is a pull cursor over the cells of `<sheetData>`, and [`WorksheetWriter`]
//! emits rows and cells as they are added. Both are explicit state machines:
//!
//! ```text
//! reader:  BeforeWorksheet -> InRow <-> AtCell -> AfterWorksheet
//! writer:  BeforeWorksheet -> WritingRow -> AfterWorksheet
//! ```
//!
//! # Example
//!
//! ```rust
//! use loquat::ooxml::xlsx::{SharedStrings, Stylesheet};
//! use loquat::ooxml::xlsx::worksheet::{WorksheetReader, WorksheetWriter};
//!
//! let mut styles = Stylesheet::default();
//! let mut strings = SharedStrings::new();
//! let mut part = Vec::new();
//! {
//!     let mut sheet = WorksheetWriter::new(&mut part, &mut styles, &mut strings, true)?;
//!     sheet.add_cell("A1".parse()?, "id")?;
//!     sheet.add_cell("A2".parse()?, 7.0)?;
//!     sheet.close()?;
//! }
//!
//! let mut sheet = WorksheetReader::new(part.as_slice(), &strings)?;
//! let first = sheet.read_cell()?;
//! assert_eq!(first.value.as_str(), Some("id"));
//! let second = sheet.read_cell()?;
//! assert_eq!(second.value.as_number(), Some(7.0));
//! assert!(!sheet.has_cell()?);
//! assert!(sheet.end_worksheet()?.tab_selected);
//! # Ok::<(), loquat::ooxml::error::OoxmlError>(())
//! ```

mod reader;
mod writer;

pub use reader::WorksheetReader;
pub use writer::{PartSink, WorksheetWriter};

use super::cell::{CellReference, RangeReference};

/// What the reader saw around the cell data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorksheetMetadata {
    /// The `<dimension>` range, when the part declares one
    pub dimension: Option<RangeReference>,
    /// Top-left cell of the scrollable pane of a frozen split
    pub freeze_panes: Option<CellReference>,
    /// Whether the sheet tab is selected in the first view
    pub tab_selected: bool,
    pub merged_cells: Vec<RangeReference>,
    /// Relationship ids of the parts the worksheet draws on
    pub references: PartReferences,
}

/// Elements of a worksheet that point at other parts through the
/// worksheet's relationships, by relationship id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartReferences {
    pub drawing: Option<String>,
    /// VML drawing, which also anchors cell comments
    pub legacy_drawing: Option<String>,
    pub legacy_drawing_header_footer: Option<String>,
    /// Background picture
    pub picture: Option<String>,
    pub table_parts: Vec<String>,
}

impl PartReferences {
    pub fn is_empty(&self) -> bool {
        self.ids().next().is_none()
    }

    /// Every id referred to, in element order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        [
            &self.drawing,
            &self.legacy_drawing,
            &self.legacy_drawing_header_footer,
            &self.picture,
        ]
        .into_iter()
        .filter_map(|id| id.as_deref())
        .chain(self.table_parts.iter().map(String::as_str))
    }

    /// Drop the references whose id fails `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        for id in [
            &mut self.drawing,
            &mut self.legacy_drawing,
            &mut self.legacy_drawing_header_footer,
            &mut self.picture,
        ] {
            if id.as_deref().is_some_and(|id| !keep(id)) {
                *id = None;
            }
        }
        self.table_parts.retain(|id| keep(id));
    }
}
