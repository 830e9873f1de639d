//! Loquat - streaming reader and writer for OOXML spreadsheet packages
//!
//! The crate turns `.xlsx` packages into cells and styles and back without
//! ever building an XML tree. The layers stack the way the file does:
//!
//! - **ZIP codec** (`kumquat-zip`): random-access reading, streamed writing
//! - **Compound file** ([`cfb`]): the container of password-protected packages
//! - **Encryption** ([`ooxml::crypto`]): Agile and Standard, with a seekable
//!   decrypting reader
//! - **Manifest** ([`ooxml::opc`]): content types and relationships
//! - **Spreadsheet parts** ([`ooxml::xlsx`]): stylesheet interning store,
//!   shared strings, streaming worksheet cursors and the package assembler
//!
//! # Example - Writing and reading a workbook
//!
//! ```no_run
//! use loquat::ooxml::xlsx::{LoadOptions, SaveOptions, WorkbookReader, WorkbookWriter};
//! use std::fs::File;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut writer = WorkbookWriter::new(File::create("report.xlsx")?, SaveOptions::default())?;
//! {
//!     let mut sheet = writer.add_worksheet("Summary")?;
//!     sheet.add_cell("A1".parse()?, "Hello")?;
//!     sheet.add_cell("B1".parse()?, 42.0)?;
//!     sheet.close()?;
//! }
//! writer.close()?;
//!
//! let mut reader = WorkbookReader::open(File::open("report.xlsx")?, LoadOptions::default())?;
//! let mut sheet = reader.begin_worksheet("Summary")?;
//! while sheet.has_cell()? {
//!     let cell = sheet.read_cell()?;
//!     println!("{} = {:?}", cell.reference, cell.value);
//! }
//! let metadata = sheet.end_worksheet()?;
//! println!("dimension: {:?}", metadata.dimension);
//! # Ok(())
//! # }
//! ```

/// Compound File Binary container
///
/// Holds the `EncryptionInfo` and `EncryptedPackage` streams of
/// password-protected packages.
#[cfg(feature = "ole")]
pub mod cfb;

/// OOXML (Office Open XML) spreadsheet packages
#[cfg(feature = "ooxml")]
pub mod ooxml;

#[cfg(feature = "ooxml")]
pub use ooxml::error::{OoxmlError, Result};
