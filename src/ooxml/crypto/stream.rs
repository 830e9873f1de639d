//! Seekable plaintext view over an `EncryptedPackage` stream.

use std::io::{self, Read, Seek, SeekFrom};

use super::SEGMENT_LEN;
use super::agile::{self, KeyData};
use super::primitives::AES_BLOCK_SIZE;
use super::standard;
use crate::ooxml::error::{OoxmlError, Result};

/// How segments of one package are decrypted.
#[derive(Clone)]
pub(crate) enum SegmentCipher {
    Agile { key_data: KeyData, key: Vec<u8> },
    Standard { key: Vec<u8> },
}

impl SegmentCipher {
    fn decrypt(&self, index: u32, segment: &mut [u8]) -> Result<()> {
        match self {
            SegmentCipher::Agile { key_data, key } => {
                agile::decrypt_segment(key_data, key, index, segment)
            },
            SegmentCipher::Standard { key } => standard::decrypt_segment(key, segment),
        }
    }
}

impl std::fmt::Debug for SegmentCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Keys stay out of debug output.
        match self {
            SegmentCipher::Agile { .. } => f.write_str("SegmentCipher::Agile"),
            SegmentCipher::Standard { .. } => f.write_str("SegmentCipher::Standard"),
        }
    }
}

/// Plaintext ZIP bytes of an encrypted package, decrypted one 4096-byte
/// segment at a time.
///
/// Seeking only moves the cursor; the segment under the cursor is decrypted
/// on the next read, and one decrypted segment is cached.
#[derive(Debug)]
pub struct DecryptingReader<R> {
    inner: R,
    cipher: SegmentCipher,
    /// Declared plaintext length from the stream prefix
    plain_len: u64,
    /// Ciphertext bytes after the prefix
    cipher_len: u64,
    pos: u64,
    cached: Option<(u64, Vec<u8>)>,
}

impl<R: Read + Seek> DecryptingReader<R> {
    /// Wrap the `EncryptedPackage` stream, which starts with the 8-byte
    /// plaintext length.
    pub(crate) fn new(mut inner: R, cipher: SegmentCipher) -> Result<Self> {
        let total = inner.seek(SeekFrom::End(0))?;
        if total < 8 {
            return Err(OoxmlError::CorruptArchive(
                "EncryptedPackage stream is shorter than its size prefix".to_string(),
            ));
        }
        inner.seek(SeekFrom::Start(0))?;
        let mut prefix = [0u8; 8];
        inner.read_exact(&mut prefix)?;
        let plain_len = u64::from_le_bytes(prefix);
        let cipher_len = total - 8;
        if cipher_len < plain_len {
            return Err(OoxmlError::CorruptArchive(format!(
                "EncryptedPackage declares {} bytes but holds {}",
                plain_len, cipher_len
            )));
        }
        log::debug!("decrypting package of {} bytes", plain_len);
        Ok(Self {
            inner,
            cipher,
            plain_len,
            cipher_len,
            pos: 0,
            cached: None,
        })
    }

    /// Plaintext length.
    #[inline]
    pub fn len(&self) -> u64 {
        self.plain_len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.plain_len == 0
    }

    fn load_segment(&mut self, index: u64) -> Result<()> {
        if self.cached.as_ref().is_some_and(|(i, _)| *i == index) {
            return Ok(());
        }
        let start = index * SEGMENT_LEN as u64;
        let available = (self.cipher_len - start).min(SEGMENT_LEN as u64) as usize;
        // Trailing bytes beyond the last whole block carry no plaintext.
        let len = available - available % AES_BLOCK_SIZE;
        let mut segment = vec![0u8; len];
        self.inner.seek(SeekFrom::Start(8 + start))?;
        self.inner.read_exact(&mut segment)?;

        let index_u32 = u32::try_from(index)
            .map_err(|_| OoxmlError::CorruptArchive("segment index overflow".to_string()))?;
        self.cipher.decrypt(index_u32, &mut segment)?;
        log::trace!("decrypted segment {}", index);
        self.cached = Some((index, segment));
        Ok(())
    }

    /// Give back the ciphertext source.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

fn to_io(err: OoxmlError) -> io::Error {
    match err {
        OoxmlError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

impl<R: Read + Seek> Read for DecryptingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.pos >= self.plain_len {
            return Ok(0);
        }
        let index = self.pos / SEGMENT_LEN as u64;
        self.load_segment(index).map_err(to_io)?;
        let Some((_, segment)) = self.cached.as_ref() else {
            return Ok(0);
        };

        let offset = (self.pos % SEGMENT_LEN as u64) as usize;
        let in_segment = segment.len().saturating_sub(offset);
        let remaining = (self.plain_len - self.pos).min(in_segment as u64) as usize;
        let n = remaining.min(buf.len());
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "EncryptedPackage ends inside a segment",
            ));
        }
        buf[..n].copy_from_slice(&segment[offset..offset + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: Read + Seek> Seek for DecryptingReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(delta) => self.plain_len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        match target {
            Some(p) => {
                self.pos = p;
                Ok(p)
            },
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of decrypted package",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn standard_reader(plain: &[u8]) -> DecryptingReader<Cursor<Vec<u8>>> {
        let (info, stream) = standard::encrypt(plain, "pw").unwrap();
        let info = standard::StandardInfo::parse(&info).unwrap();
        let key = standard::secret_key(&info, "pw").unwrap();
        DecryptingReader::new(Cursor::new(stream), SegmentCipher::Standard { key }).unwrap()
    }

    fn agile_reader(plain: &[u8]) -> DecryptingReader<Cursor<Vec<u8>>> {
        let (info, stream) = agile::encrypt(plain, "pw", 1).unwrap();
        let info = agile::AgileInfo::parse(&info[8..]).unwrap();
        let key = agile::secret_key(&info, "pw").unwrap();
        let cipher = SegmentCipher::Agile {
            key_data: info.key_data,
            key,
        };
        DecryptingReader::new(Cursor::new(stream), cipher).unwrap()
    }

    fn sample() -> Vec<u8> {
        (0..3 * SEGMENT_LEN as u32 + 123).map(|i| (i * 7 % 256) as u8).collect()
    }

    #[test]
    fn sequential_read_returns_plaintext() {
        let plain = sample();
        for mut reader in [standard_reader(&plain), agile_reader(&plain)] {
            assert_eq!(reader.len(), plain.len() as u64);
            let mut out = Vec::new();
            reader.read_to_end(&mut out).unwrap();
            assert_eq!(out, plain);
        }
    }

    #[test]
    fn random_access_across_segments() {
        let plain = sample();
        let mut reader = agile_reader(&plain);

        // Read the tail first, the way a ZIP reader looks for its directory.
        reader.seek(SeekFrom::End(-22)).unwrap();
        let mut tail = [0u8; 22];
        reader.read_exact(&mut tail).unwrap();
        assert_eq!(&tail[..], &plain[plain.len() - 22..]);

        let start = SEGMENT_LEN as u64 - 10;
        reader.seek(SeekFrom::Start(start)).unwrap();
        let mut straddle = [0u8; 20];
        reader.read_exact(&mut straddle).unwrap();
        assert_eq!(&straddle[..], &plain[start as usize..start as usize + 20]);

        reader.seek(SeekFrom::Current(-5)).unwrap();
        let mut again = [0u8; 5];
        reader.read_exact(&mut again).unwrap();
        assert_eq!(&again[..], &plain[start as usize + 15..start as usize + 20]);

        assert!(reader.seek(SeekFrom::Current(-100_000)).is_err());
        reader.seek(SeekFrom::Start(plain.len() as u64 + 5)).unwrap();
        assert_eq!(reader.read(&mut again).unwrap(), 0);
    }

    #[test]
    fn truncated_stream_is_corrupt() {
        let plain = sample();
        let (_, mut stream) = standard::encrypt(&plain, "pw").unwrap();
        stream.truncate(100);
        let err = DecryptingReader::new(
            Cursor::new(stream),
            SegmentCipher::Standard { key: vec![0; 16] },
        )
        .unwrap_err();
        assert!(matches!(err, OoxmlError::CorruptArchive(_)));
    }
}
