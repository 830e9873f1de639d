use std::fmt;

/// Error produced by the ZIP codec.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
}

/// The kind of a ZIP codec error.
#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A record did not start with the signature it must carry.
    InvalidSignature { expected: u32, actual: u32 },
    /// The archive structure is inconsistent or truncated.
    CorruptArchive(String),
    /// No entry with the given name exists.
    FileNotFound(String),
    /// The CRC-32 of the decompressed data does not match the directory.
    ChecksumMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },
    /// The entry uses a compression method other than Store or Deflate.
    UnsupportedCompressionMethod(u16),
    /// An error from the underlying byte source or sink.
    Io(std::io::Error),
}

impl Error {
    /// The kind of this error.
    #[inline]
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Consume the error and return its kind.
    #[inline]
    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        ErrorKind::CorruptArchive(msg.into()).into()
    }

    /// True for errors that mean the bytes are not a valid archive.
    pub fn is_corrupt(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::InvalidSignature { .. } | ErrorKind::CorruptArchive(_)
        )
    }
}

impl From<ErrorKind> for Error {
    #[inline]
    fn from(kind: ErrorKind) -> Self {
        Self { kind }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        // Checksum failures surface through `Read` as io errors; unwrap them again.
        if err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            if let Some(inner) = err.into_inner() {
                if let Ok(zip_err) = inner.downcast::<Error>() {
                    return *zip_err;
                }
            }
            return ErrorKind::CorruptArchive("unreadable entry".to_string()).into();
        }
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            return ErrorKind::CorruptArchive("unexpected end of archive".to_string()).into();
        }
        ErrorKind::Io(err).into()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::InvalidSignature { expected, actual } => write!(
                f,
                "invalid signature: expected 0x{expected:08x}, found 0x{actual:08x}"
            ),
            ErrorKind::CorruptArchive(msg) => write!(f, "corrupt archive: {msg}"),
            ErrorKind::FileNotFound(name) => write!(f, "entry not found: {name}"),
            ErrorKind::ChecksumMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "checksum mismatch in {name}: expected 0x{expected:08x}, computed 0x{actual:08x}"
            ),
            ErrorKind::UnsupportedCompressionMethod(method) => {
                write!(f, "unsupported compression method {method}")
            },
            ErrorKind::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_wrapped_checksum_error_is_recovered() {
        let original: Error = ErrorKind::ChecksumMismatch {
            name: "a.xml".to_string(),
            expected: 1,
            actual: 2,
        }
        .into();
        let io = std::io::Error::new(std::io::ErrorKind::InvalidData, original);
        let back = Error::from(io);
        assert!(matches!(back.kind(), ErrorKind::ChecksumMismatch { .. }));
    }

    #[test]
    fn eof_becomes_corrupt() {
        let io = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
        assert!(Error::from(io).is_corrupt());
    }
}
