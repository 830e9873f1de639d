/// Error types for spreadsheet package operations.
use std::sync::Arc;

use thiserror::Error;

/// Result type for package operations.
pub type Result<T> = std::result::Result<T, OoxmlError>;

/// Every failure the package engine reports.
///
/// Lower layers (ZIP codec, compound file, OPC manifest) have their own error
/// types; they convert into these flat variants so callers can match on the
/// condition regardless of where it was detected.
#[derive(Error, Debug)]
pub enum OoxmlError {
    /// The ZIP or compound file structure is malformed
    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),

    /// A named archive entry does not exist
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// An entry's CRC-32 or length does not match the central directory
    #[error("Checksum mismatch in {name}: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    /// The password verifier did not match
    #[error("Invalid password")]
    InvalidPassword,

    /// A required part is missing or unusable
    #[error("Invalid package: {0}")]
    InvalidPackage(String),

    /// No default or override content type covers the part
    #[error("Unknown content type for part {0}")]
    UnknownContentType(String),

    #[error("Relationship not found: {0}")]
    RelationshipNotFound(String),

    /// More than one relationship of a type where exactly one was expected
    #[error("Ambiguous relationship: {count} relationships of type {rel_type} from {source_part}")]
    AmbiguousRelationship {
        source_part: String,
        rel_type: String,
        count: usize,
    },

    /// Cells must be written in strictly increasing row, then column order
    #[error("Cell {attempted} written after {previous}")]
    OutOfOrderCell { previous: String, attempted: String },

    /// A style lookup used an index past the end of its table
    #[error("Invalid style index {index} into {table} (length {len})")]
    InvalidStyleIndex {
        table: &'static str,
        index: usize,
        len: usize,
    },

    /// Encryption version or algorithm this build cannot handle
    #[error("Unsupported encryption: {0}")]
    UnsupportedEncryption(String),

    /// A call that the current state does not allow
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("IO error: {0}")]
    Io(#[source] std::io::Error),
}

impl From<std::io::Error> for OoxmlError {
    fn from(err: std::io::Error) -> Self {
        // Entry readers report checksum failures through `Read`.
        if err.get_ref().is_some_and(|inner| inner.is::<kumquat_zip::Error>()) {
            return kumquat_zip::Error::from(err).into();
        }
        OoxmlError::Io(err)
    }
}

impl From<quick_xml::Error> for OoxmlError {
    fn from(err: quick_xml::Error) -> Self {
        match err {
            quick_xml::Error::Io(shared) => match Arc::try_unwrap(shared) {
                Ok(io) => io.into(),
                Err(shared) => match shared.get_ref().and_then(|e| e.downcast_ref::<kumquat_zip::Error>()) {
                    Some(zip) => zip_error_ref(zip),
                    None => OoxmlError::Io(std::io::Error::new(shared.kind(), shared.to_string())),
                },
            },
            other => OoxmlError::Xml(other.to_string()),
        }
    }
}

/// Same mapping as the `From` conversion, for an error still owned elsewhere.
fn zip_error_ref(err: &kumquat_zip::Error) -> OoxmlError {
    use kumquat_zip::ErrorKind;
    match err.kind() {
        ErrorKind::ChecksumMismatch {
            name,
            expected,
            actual,
        } => OoxmlError::ChecksumMismatch {
            name: name.clone(),
            expected: *expected,
            actual: *actual,
        },
        ErrorKind::FileNotFound(name) => OoxmlError::EntryNotFound(name.clone()),
        ErrorKind::Io(e) => OoxmlError::Io(std::io::Error::new(e.kind(), e.to_string())),
        _ => OoxmlError::CorruptArchive(err.to_string()),
    }
}

impl From<quick_xml::events::attributes::AttrError> for OoxmlError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        OoxmlError::Xml(err.to_string())
    }
}

impl From<quick_xml::encoding::EncodingError> for OoxmlError {
    fn from(err: quick_xml::encoding::EncodingError) -> Self {
        OoxmlError::Xml(err.to_string())
    }
}

impl From<kumquat_zip::Error> for OoxmlError {
    fn from(err: kumquat_zip::Error) -> Self {
        use kumquat_zip::ErrorKind;
        match err.into_kind() {
            ErrorKind::FileNotFound(name) => OoxmlError::EntryNotFound(name),
            ErrorKind::ChecksumMismatch {
                name,
                expected,
                actual,
            } => OoxmlError::ChecksumMismatch {
                name,
                expected,
                actual,
            },
            ErrorKind::Io(e) => OoxmlError::Io(e),
            ErrorKind::InvalidSignature { expected, actual } => OoxmlError::CorruptArchive(
                format!("bad signature {actual:#010x}, expected {expected:#010x}"),
            ),
            ErrorKind::CorruptArchive(msg) => OoxmlError::CorruptArchive(msg),
            ErrorKind::UnsupportedCompressionMethod(id) => {
                OoxmlError::CorruptArchive(format!("unsupported compression method {id}"))
            },
            other => OoxmlError::CorruptArchive(kumquat_zip::Error::from(other).to_string()),
        }
    }
}

impl From<super::opc::OpcError> for OoxmlError {
    fn from(err: super::opc::OpcError) -> Self {
        use super::opc::OpcError;
        match err {
            OpcError::PartNotFound(name) => OoxmlError::EntryNotFound(name),
            OpcError::ContentTypeNotFound(name) => OoxmlError::UnknownContentType(name),
            OpcError::RelationshipNotFound(msg) => OoxmlError::RelationshipNotFound(msg),
            OpcError::AmbiguousRelationship {
                source_part,
                rel_type,
                count,
            } => OoxmlError::AmbiguousRelationship {
                source_part,
                rel_type,
                count,
            },
            OpcError::InvalidPackUri(msg) | OpcError::InvalidRelationship(msg) => {
                OoxmlError::InvalidPackage(msg)
            },
            OpcError::XmlError(msg) => OoxmlError::Xml(msg),
        }
    }
}

#[cfg(feature = "ole")]
impl From<crate::cfb::CfbError> for OoxmlError {
    fn from(err: crate::cfb::CfbError) -> Self {
        use crate::cfb::CfbError;
        match err {
            CfbError::Io(e) => OoxmlError::Io(e),
            CfbError::StreamNotFound(path) => OoxmlError::EntryNotFound(path),
            other => OoxmlError::CorruptArchive(other.to_string()),
        }
    }
}

impl OoxmlError {
    /// Format and container errors, as opposed to usage or password errors.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            OoxmlError::CorruptArchive(_)
                | OoxmlError::InvalidPackage(_)
                | OoxmlError::UnknownContentType(_)
                | OoxmlError::RelationshipNotFound(_)
                | OoxmlError::InvalidFormat(_)
                | OoxmlError::Xml(_)
        )
    }
}
