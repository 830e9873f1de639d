//! Compound File Binary (CFB) container.
//!
//! Encrypted OOXML packages are not ZIP archives: they are compound files
//! holding an `EncryptionInfo` stream, an `EncryptedPackage` stream and a
//! `\x06DataSpaces` storage tree. This module reads and writes that container.
//!
//! # Example
//!
//! ```rust
//! use loquat::cfb::{CompoundFile, CompoundFileWriter};
//! use std::io::Cursor;
//!
//! let mut writer = CompoundFileWriter::new();
//! writer.create_stream(&["EncryptionInfo"], b"\x04\x00\x04\x00")?;
//! let bytes = writer.to_bytes()?;
//!
//! let mut file = CompoundFile::open(Cursor::new(bytes))?;
//! assert_eq!(file.open_stream(&["EncryptionInfo"])?, b"\x04\x00\x04\x00");
//! # Ok::<(), loquat::cfb::CfbError>(())
//! ```

pub mod consts;
mod reader;
mod writer;

use std::fmt;
use std::io;

pub use reader::{CompoundFile, DirectoryEntry, is_compound_file};
pub use writer::CompoundFileWriter;

/// Error type for compound file parsing and writing
#[derive(Debug)]
pub enum CfbError {
    Io(io::Error),
    /// The input does not start with the compound file signature.
    NotCompoundFile,
    InvalidFormat(String),
    CorruptedFile(String),
    /// Path does not name a stream in the directory.
    StreamNotFound(String),
}

impl From<io::Error> for CfbError {
    fn from(err: io::Error) -> Self {
        CfbError::Io(err)
    }
}

impl fmt::Display for CfbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CfbError::Io(e) => write!(f, "IO error: {}", e),
            CfbError::NotCompoundFile => write!(f, "Not a compound file"),
            CfbError::InvalidFormat(s) => write!(f, "Invalid format: {}", s),
            CfbError::CorruptedFile(s) => write!(f, "Corrupted file: {}", s),
            CfbError::StreamNotFound(s) => write!(f, "Stream not found: {}", s),
        }
    }
}

impl std::error::Error for CfbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CfbError::Io(e) => Some(e),
            _ => None,
        }
    }
}
