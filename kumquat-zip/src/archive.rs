//! Random-access reading of a ZIP archive.
//!
//! The central directory is located from the end of the source, indexed once,
//! and entries are then inflated on demand. Reading one entry never requires
//! touching any other.

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom, Take};

use flate2::read::DeflateDecoder;

use crate::crc::CrcReader;
use crate::errors::{Error, ErrorKind};
use crate::headers::{
    CENTRAL_DIRECTORY_HEADER_LEN, CentralDirectoryHeader, FLAG_DATA_DESCRIPTOR,
    LOCAL_FILE_HEADER_LEN, LocalFileHeader,
};
use crate::locator::locate_eocd;
use crate::mode::CompressionMethod;

/// Options controlling how entries are verified while reading.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    /// Fail with `ChecksumMismatch` when an entry's CRC-32 or length does not
    /// match the central directory. Disable to read slightly damaged files.
    pub verify_checksums: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            verify_checksums: true,
        }
    }
}

impl ReadOptions {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }
}

/// Directory information about one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Entry name as stored (forward slashes, no leading slash).
    pub name: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub local_header_offset: u64,
    /// Whether the entry was written with a trailing data descriptor.
    pub has_data_descriptor: bool,
}

impl EntryInfo {
    /// True if the name denotes a directory rather than a file.
    #[inline]
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }
}

/// A ZIP archive opened over any seekable byte source.
pub struct ZipArchive<R> {
    reader: R,
    entries: Vec<EntryInfo>,
    index: HashMap<String, usize>,
    options: ReadOptions,
}

impl<'data> ZipArchive<std::io::Cursor<&'data [u8]>> {
    /// Open an archive held in memory.
    pub fn from_slice(data: &'data [u8]) -> Result<Self, Error> {
        Self::new(std::io::Cursor::new(data))
    }
}

impl<R: Read + Seek> ZipArchive<R> {
    /// Open an archive, reading its central directory.
    pub fn new(reader: R) -> Result<Self, Error> {
        Self::with_options(reader, ReadOptions::default())
    }

    /// Open an archive with explicit read options.
    pub fn with_options(mut reader: R, options: ReadOptions) -> Result<Self, Error> {
        let locator = locate_eocd(&mut reader)?;
        let eocd = locator.eocd;

        reader.seek(SeekFrom::Start(eocd.directory_offset as u64))?;
        let mut directory = vec![0u8; eocd.directory_size as usize];
        reader.read_exact(&mut directory)?;

        let mut entries = Vec::with_capacity(eocd.entries as usize);
        let mut index = HashMap::with_capacity(eocd.entries as usize);
        let mut pos = 0usize;
        while pos + CENTRAL_DIRECTORY_HEADER_LEN <= directory.len() {
            let header = CentralDirectoryHeader::parse(&directory[pos..])?;
            pos += header.record_len;

            let name = String::from_utf8(header.name.clone())
                .unwrap_or_else(|_| String::from_utf8_lossy(&header.name).into_owned())
                .replace('\\', "/");
            if header.local_header_offset as u64 >= locator.eocd_offset {
                return Err(Error::corrupt(format!(
                    "{name}: local header offset beyond central directory"
                )));
            }
            let info = EntryInfo {
                name: name.clone(),
                compression_method: header.compression_method(),
                compressed_size: header.compressed_size as u64,
                uncompressed_size: header.uncompressed_size as u64,
                crc32: header.crc32,
                local_header_offset: header.local_header_offset as u64,
                has_data_descriptor: header.flags & FLAG_DATA_DESCRIPTOR != 0,
            };
            index.insert(name, entries.len());
            entries.push(info);
        }

        if entries.len() != eocd.entries as usize {
            return Err(Error::corrupt(format!(
                "central directory lists {} entries, end record declares {}",
                entries.len(),
                eocd.entries
            )));
        }

        Ok(Self {
            reader,
            entries,
            index,
            options,
        })
    }

    /// All entries in central directory order.
    #[inline]
    pub fn entries(&self) -> &[EntryInfo] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry; a leading `/` is ignored.
    pub fn entry(&self, name: &str) -> Option<&EntryInfo> {
        let normalized = name.strip_prefix('/').unwrap_or(name);
        self.index.get(normalized).map(|&i| &self.entries[i])
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// Open a streaming reader over the decompressed contents of an entry.
    pub fn read_entry(&mut self, name: &str) -> Result<EntryReader<'_, R>, Error> {
        let info = self
            .entry(name)
            .cloned()
            .ok_or_else(|| Error::from(ErrorKind::FileNotFound(name.to_string())))?;
        open_entry(&mut self.reader, &info, self.options)
    }

    /// Open an entry with options other than the archive's own.
    pub fn read_entry_with(
        &mut self,
        name: &str,
        options: ReadOptions,
    ) -> Result<EntryReader<'_, R>, Error> {
        let info = self
            .entry(name)
            .cloned()
            .ok_or_else(|| Error::from(ErrorKind::FileNotFound(name.to_string())))?;
        open_entry(&mut self.reader, &info, options)
    }

    /// Read and decompress a whole entry.
    pub fn read(&mut self, name: &str) -> Result<Vec<u8>, Error> {
        self.read_with(name, self.options)
    }

    /// Read a whole entry with explicit options.
    pub fn read_with(&mut self, name: &str, options: ReadOptions) -> Result<Vec<u8>, Error> {
        let capacity = self
            .entry(name)
            .map(|e| e.uncompressed_size as usize)
            .unwrap_or(0);
        let mut reader = self.read_entry_with(name, options)?;
        let mut out = Vec::with_capacity(capacity);
        reader.read_to_end(&mut out)?;
        Ok(out)
    }

    /// Read an entry as UTF-8 text.
    pub fn read_string(&mut self, name: &str) -> Result<String, Error> {
        let bytes = self.read(name)?;
        String::from_utf8(bytes).map_err(|_| Error::corrupt(format!("{name} is not valid UTF-8")))
    }

    /// Current read options.
    #[inline]
    pub fn options(&self) -> ReadOptions {
        self.options
    }

    /// Give back the byte source.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Position `reader` at the data of `info` and wrap it in the matching decoder.
pub(crate) fn open_entry<'a, R: Read + Seek>(
    reader: &'a mut R,
    info: &EntryInfo,
    options: ReadOptions,
) -> Result<EntryReader<'a, R>, Error> {
    reader.seek(SeekFrom::Start(info.local_header_offset))?;
    let mut fixed = [0u8; LOCAL_FILE_HEADER_LEN];
    reader.read_exact(&mut fixed)?;
    let variable = LocalFileHeader::variable_len(&fixed)?;
    reader.seek(SeekFrom::Current(variable as i64))?;

    let raw = reader.take(info.compressed_size);
    let decoder = match info.compression_method {
        CompressionMethod::Store => Decoder::Stored(raw),
        CompressionMethod::Deflate => Decoder::Deflated(DeflateDecoder::new(raw)),
        CompressionMethod::Other(id) => {
            return Err(ErrorKind::UnsupportedCompressionMethod(id).into());
        },
    };
    Ok(EntryReader {
        inner: CrcReader::new(
            decoder,
            &info.name,
            info.crc32,
            info.uncompressed_size,
            options.verify_checksums,
        ),
    })
}

enum Decoder<'a, R> {
    Stored(Take<&'a mut R>),
    Deflated(DeflateDecoder<Take<&'a mut R>>),
}

impl<R: Read> Read for Decoder<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Decoder::Stored(r) => r.read(buf),
            Decoder::Deflated(r) => r.read(buf),
        }
    }
}

/// Streaming reader over one decompressed entry.
///
/// The checksum is verified when the reader reaches end of data; a mismatch
/// surfaces as an `io::Error` that converts back into [`ErrorKind::ChecksumMismatch`].
pub struct EntryReader<'a, R> {
    inner: CrcReader<Decoder<'a, R>>,
}

impl<R: Read> Read for EntryReader<'_, R> {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}
