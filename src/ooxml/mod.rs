//! Office Open XML (OOXML) spreadsheet packages.
//!
//! The module is organized into layers:
//!
//! 1. **OPC Layer** (`opc`): part names, relationships and content types
//! 2. **Encryption** (`crypto`): password-protected packages, behind the
//!    `ooxml_encryption` feature
//! 3. **SpreadsheetML** (`xlsx`): stylesheet, shared strings, worksheets and
//!    the package assembler
//!
//! `error` and `xml` are shared by all of them.
//!
//! # Example: Streaming a worksheet
//!
//! ```rust,no_run
//! use loquat::ooxml::xlsx::{LoadOptions, WorkbookReader};
//!
//! let file = std::fs::File::open("book.xlsx")?;
//! let mut book = WorkbookReader::open(file, LoadOptions::new().with_password("secret"))?;
//! for title in book.sheet_titles() {
//!     println!("sheet {title}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
pub mod error;
pub mod opc;
pub mod xlsx;
pub mod xml;

#[cfg(feature = "ooxml_encryption")]
pub mod crypto;

pub use error::{OoxmlError, Result};
pub use opc::{Manifest, PackURI};
