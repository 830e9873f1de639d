//! Workbook package assembly and disassembly.
//!
//! [`WorkbookReader`] opens a package (decrypting it first when it is a
//! password-protected compound file), resolves the manifest, and loads the
//! stylesheet, shared strings and sheet list. Worksheets are then streamed
//! one at a time. [`WorkbookWriter`] does the reverse: worksheets stream
//! straight into ZIP entries, and everything they depend on is written when
//! the writer is closed, `[Content_Types].xml` last.
//!
//! Parts the engine does not interpret (theme, document properties, and
//! the drawings, comments and tables of worksheets) are carried as
//! [`PreservedPart`]s together with the relationships that pointed to them.
//! A worksheet's references to them and its merged ranges travel in its
//! [`WorksheetMetadata`](crate::ooxml::xlsx::WorksheetMetadata).
//!
//! [`Workbook`] is an in-memory model built on both.
//!
//! ```rust
//! use loquat::ooxml::xlsx::{LoadOptions, SaveOptions, Workbook, WorkbookReader, WorkbookWriter};
//! use std::io::Cursor;
//!
//! let mut writer = WorkbookWriter::new(Vec::new(), SaveOptions::default())?;
//! {
//!     let mut sheet = writer.add_worksheet("Data")?;
//!     sheet.add_cell("A1".parse()?, "total")?;
//!     sheet.add_cell("B1".parse()?, 12.5)?;
//!     sheet.close()?;
//! }
//! let bytes = writer.into_inner()?;
//!
//! let mut reader = WorkbookReader::open(Cursor::new(bytes.as_slice()), LoadOptions::default())?;
//! assert_eq!(reader.sheet_titles().collect::<Vec<_>>(), ["Data"]);
//! let mut sheet = reader.begin_worksheet("data")?;
//! assert_eq!(sheet.read_cell()?.value.as_str(), Some("total"));
//! assert_eq!(sheet.read_cell()?.value.as_number(), Some(12.5));
//! drop(sheet);
//!
//! let book = Workbook::load(&bytes, LoadOptions::default())?;
//! assert_eq!(book.sheets[0].cells.len(), 2);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod model;
mod options;
mod reader;
mod writer;

pub use model::{Sheet, Workbook};
pub use options::{DEFAULT_COMPRESSION_LEVEL, LoadOptions, SaveOptions};
pub use reader::{PackageSource, WorkbookReader};
pub use writer::{PackageSink, WorkbookWriter};

use crate::ooxml::opc::PackURI;

/// Part that owns a relationship to a preserved part.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelationshipSource {
    /// `/_rels/.rels`
    Package,
    /// The workbook part's relationships
    Workbook,
    /// The relationships of the worksheet with this title
    Worksheet(String),
}

impl RelationshipSource {
    /// Whether this is the worksheet titled `title`, ignoring case.
    pub fn is_worksheet(&self, title: &str) -> bool {
        matches!(self, RelationshipSource::Worksheet(t) if same_title(t, title))
    }
}

pub(crate) fn same_title(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}

/// A relationship to a preserved part, re-created when the package is saved.
/// The id is kept unless something else already took it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingRelationship {
    pub source: RelationshipSource,
    pub id: String,
    pub reltype: String,
}

/// A part carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreservedPart {
    pub name: PackURI,
    pub content_type: String,
    pub data: Vec<u8>,
    /// Root, workbook and worksheet relationships that target this part.
    /// Parts only reachable through another preserved part's `.rels` have
    /// none.
    pub incoming: Vec<IncomingRelationship>,
}

impl PreservedPart {
    pub fn new(name: PackURI, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name,
            content_type: content_type.into(),
            data,
            incoming: Vec::new(),
        }
    }

    /// Add a relationship from `source` to this part.
    pub fn with_relationship(
        mut self,
        source: RelationshipSource,
        id: impl Into<String>,
        reltype: impl Into<String>,
    ) -> Self {
        self.incoming.push(IncomingRelationship {
            source,
            id: id.into(),
            reltype: reltype.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests;
