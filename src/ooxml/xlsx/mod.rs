//! SpreadsheetML (.xlsx) parts and the package assembler.
//!
//! - [`cell`]: references, values and the data a writer needs per cell
//! - [`number`]: locale-independent numeric text
//! - [`styles`]: the stylesheet interning store
//! - [`shared_strings`]: the shared string table
//! - [`workbook`]: the workbook part (sheet list, defined names)
//! - [`worksheet`]: streaming worksheet reader and writer
//! - [`package`]: opening and saving whole packages
//!
//! # Example
//!
//! ```rust
//! use loquat::ooxml::xlsx::{CellData, CellStyle, FormatDelta, SaveOptions, WorkbookWriter};
//! use loquat::ooxml::xlsx::styles::Font;
//!
//! let mut book = WorkbookWriter::new(Vec::new(), SaveOptions::default())?;
//! {
//!     let mut sheet = book.add_worksheet("Totals")?;
//!     let bold = FormatDelta::new().with_font(Font::default().with_bold(true));
//!     let header = CellData::new("Amount").with_style(CellStyle::Delta { base: None, delta: bold });
//!     sheet.add_cell_with("A1".parse()?, header)?;
//!     sheet.add_cell("A2".parse()?, 99.5)?;
//!     sheet.add_cell_with("A3".parse()?, CellData::new(99.5).with_formula("=SUM(A2)"))?;
//!     sheet.close()?;
//! }
//! assert_eq!(book.stylesheet().format_count(), 2);
//! let bytes = book.into_inner()?;
//! assert!(bytes.starts_with(b"PK"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cell;
pub mod number;
pub mod package;
pub mod shared_strings;
pub mod styles;
pub mod workbook;
pub mod worksheet;

pub use cell::{Cell, CellData, CellReference, CellStyle, CellType, CellValue, RangeReference};
pub use package::{
    LoadOptions, PreservedPart, SaveOptions, Sheet, Workbook, WorkbookReader, WorkbookWriter,
};
pub use shared_strings::SharedStrings;
pub use styles::{Format, FormatDelta, Stylesheet};
pub use workbook::{SheetState, WorkbookPart};
pub use worksheet::{PartReferences, WorksheetMetadata, WorksheetReader, WorksheetWriter};
