use std::io::{self, Read, Write};

use crate::errors::{Error, ErrorKind};

/// Compute the CRC-32 (IEEE) of a byte slice.
#[inline]
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Reader adapter that hashes everything passing through it and checks the
/// result against the central directory once the inner reader is exhausted.
pub(crate) struct CrcReader<R> {
    inner: R,
    hasher: crc32fast::Hasher,
    expected: u32,
    expected_len: u64,
    read_len: u64,
    verify: bool,
    name: String,
}

impl<R: Read> CrcReader<R> {
    pub(crate) fn new(inner: R, name: &str, expected: u32, expected_len: u64, verify: bool) -> Self {
        Self {
            inner,
            hasher: crc32fast::Hasher::new(),
            expected,
            expected_len,
            read_len: 0,
            verify,
            name: name.to_string(),
        }
    }

    fn check(&self) -> io::Result<()> {
        if !self.verify {
            return Ok(());
        }
        if self.read_len != self.expected_len {
            let err = Error::corrupt(format!(
                "{}: expected {} bytes, inflated {}",
                self.name, self.expected_len, self.read_len
            ));
            return Err(io::Error::new(io::ErrorKind::InvalidData, err));
        }
        let actual = self.hasher.clone().finalize();
        if actual != self.expected {
            let err: Error = ErrorKind::ChecksumMismatch {
                name: self.name.clone(),
                expected: self.expected,
                actual,
            }
            .into();
            return Err(io::Error::new(io::ErrorKind::InvalidData, err));
        }
        Ok(())
    }
}

impl<R: Read> Read for CrcReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = self.inner.read(buf)?;
        if n == 0 {
            self.check()?;
            return Ok(0);
        }
        self.hasher.update(&buf[..n]);
        self.read_len += n as u64;
        Ok(n)
    }
}

/// Writer adapter that tracks the CRC-32 and byte count of the plaintext it
/// forwards.
pub(crate) struct CrcWriter<W> {
    inner: W,
    hasher: crc32fast::Hasher,
    written: u64,
}

impl<W: Write> CrcWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: crc32fast::Hasher::new(),
            written: 0,
        }
    }

    pub(crate) fn crc(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    pub(crate) fn written(&self) -> u64 {
        self.written
    }

    pub(crate) fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub(crate) fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CrcWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
