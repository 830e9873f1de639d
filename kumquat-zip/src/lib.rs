//! Streaming ZIP codec for OOXML packages.
//!
//! Reading locates the central directory from the end of the source and
//! inflates entries on demand; writing streams DEFLATE output and finalizes
//! each entry with a data descriptor. Only Store and Deflate are supported,
//! which covers every Office package in practice.
//!
//! ```rust
//! use kumquat_zip::{ArchiveWriter, CompressionMethod, ZipArchive};
//! use std::io::Write;
//!
//! let mut writer = ArchiveWriter::new(Vec::new());
//! let mut entry = writer.start_entry("xl/workbook.xml", CompressionMethod::Deflate)?;
//! entry.write_all(b"<workbook/>")?;
//! entry.finish()?;
//! let bytes = writer.finish()?;
//!
//! let mut archive = ZipArchive::from_slice(&bytes)?;
//! assert_eq!(archive.read("xl/workbook.xml")?, b"<workbook/>");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
#![forbid(unsafe_code)]

mod archive;
mod crc;
mod errors;
mod headers;
mod locator;
mod mode;
mod writer;

pub use archive::{EntryInfo, EntryReader, ReadOptions, ZipArchive};
pub use crc::crc32;
pub use errors::{Error, ErrorKind};
pub use mode::CompressionMethod;
pub use writer::{ArchiveWriter, EntryWriter};
