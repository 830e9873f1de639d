//! Streaming ZIP writer.
//!
//! Entries opened with [`ArchiveWriter::start_entry`] are compressed while they
//! are written; the CRC-32 and sizes follow the data in a data descriptor, so
//! the sink never needs to seek. One-shot helpers write sizes up front.

use std::collections::HashSet;
use std::io::{self, Write};

use flate2::Compression;
use flate2::write::DeflateEncoder;

use crate::crc::{CrcWriter, crc32};
use crate::errors::Error;
use crate::headers::{
    CentralDirectoryHeader, DataDescriptor, EndOfCentralDirectory, FLAG_DATA_DESCRIPTOR,
    FLAG_UTF8, LocalFileHeader,
};
use crate::mode::CompressionMethod;

/// Sink wrapper that counts bytes to know entry offsets.
struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Writes a ZIP archive to any byte sink.
pub struct ArchiveWriter<W: Write> {
    out: CountingWriter<W>,
    directory: Vec<CentralDirectoryHeader>,
    names: HashSet<String>,
    level: Compression,
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: CountingWriter {
                inner: out,
                count: 0,
            },
            directory: Vec::new(),
            names: HashSet::new(),
            level: Compression::default(),
        }
    }

    /// Set the DEFLATE level (0-9) for subsequent entries.
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.level = Compression::new(level.min(9));
        self
    }

    /// Number of entries written so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.directory.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.directory.is_empty()
    }

    fn claim_name(&mut self, name: &str) -> Result<Vec<u8>, Error> {
        let normalized = name.strip_prefix('/').unwrap_or(name);
        if normalized.is_empty() {
            return Err(Error::corrupt("entry name must not be empty"));
        }
        if normalized.len() > u16::MAX as usize {
            return Err(Error::corrupt("entry name too long"));
        }
        if !self.names.insert(normalized.to_string()) {
            return Err(Error::corrupt(format!("duplicate entry {normalized}")));
        }
        Ok(normalized.as_bytes().to_vec())
    }

    fn offset_u32(&self) -> Result<u32, Error> {
        u32::try_from(self.out.count).map_err(|_| Error::corrupt("archive exceeds 4 GiB"))
    }

    /// Open an entry for streaming. Data written to the returned sink is
    /// compressed on the fly; call [`EntryWriter::finish`] to close it.
    pub fn start_entry(
        &mut self,
        name: &str,
        method: CompressionMethod,
    ) -> Result<EntryWriter<'_, W>, Error> {
        if let CompressionMethod::Other(id) = method {
            return Err(crate::ErrorKind::UnsupportedCompressionMethod(id).into());
        }
        let name = self.claim_name(name)?;
        let local_header_offset = self.offset_u32()?;
        let mut flags = FLAG_DATA_DESCRIPTOR;
        if !name.is_ascii() {
            flags |= FLAG_UTF8;
        }
        LocalFileHeader {
            flags,
            method: method.as_u16(),
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            name: &name,
        }
        .write(&mut self.out)?;

        let data_start = self.out.count;
        let level = self.level;
        let sink = match method {
            CompressionMethod::Deflate => {
                EntrySink::Deflated(DeflateEncoder::new(&mut self.out, level))
            },
            _ => EntrySink::Stored(&mut self.out),
        };
        Ok(EntryWriter {
            sink: Some(CrcWriter::new(sink)),
            directory: &mut self.directory,
            header: CentralDirectoryHeader {
                flags,
                method: method.as_u16(),
                crc32: 0,
                compressed_size: 0,
                uncompressed_size: 0,
                local_header_offset,
                name,
                record_len: 0,
            },
            data_start,
        })
    }

    /// Compress and write a complete entry.
    pub fn write_deflated(&mut self, name: &str, data: &[u8]) -> Result<(), Error> {
        let mut entry = self.start_entry(name, CompressionMethod::Deflate)?;
        entry.write_all(data)?;
        entry.finish()
    }

    /// Write a complete entry without compression; sizes go in the local header.
    pub fn write_stored(&mut self, name: &str, data: &[u8]) -> Result<(), Error> {
        let name = self.claim_name(name)?;
        let size = u32::try_from(data.len()).map_err(|_| Error::corrupt("entry exceeds 4 GiB"))?;
        let local_header_offset = self.offset_u32()?;
        let flags = if name.is_ascii() { 0 } else { FLAG_UTF8 };
        let crc = crc32(data);
        LocalFileHeader {
            flags,
            method: CompressionMethod::Store.as_u16(),
            crc32: crc,
            compressed_size: size,
            uncompressed_size: size,
            name: &name,
        }
        .write(&mut self.out)?;
        self.out.write_all(data)?;
        self.directory.push(CentralDirectoryHeader {
            flags,
            method: CompressionMethod::Store.as_u16(),
            crc32: crc,
            compressed_size: size,
            uncompressed_size: size,
            local_header_offset,
            name,
            record_len: 0,
        });
        Ok(())
    }

    /// Write the central directory and return the sink.
    pub fn finish(mut self) -> Result<W, Error> {
        if self.directory.len() > u16::MAX as usize {
            return Err(Error::corrupt("too many entries for a non-ZIP64 archive"));
        }
        let directory_offset = self.offset_u32()?;
        for header in &self.directory {
            header.write(&mut self.out)?;
        }
        let directory_size = (self.out.count - directory_offset as u64) as u32;
        EndOfCentralDirectory {
            entries: self.directory.len() as u16,
            directory_size,
            directory_offset,
            comment_len: 0,
        }
        .write(&mut self.out)?;
        self.out.flush()?;
        Ok(self.out.inner)
    }
}

enum EntrySink<'a, W: Write> {
    Stored(&'a mut CountingWriter<W>),
    Deflated(DeflateEncoder<&'a mut CountingWriter<W>>),
}

impl<W: Write> Write for EntrySink<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            EntrySink::Stored(w) => w.write(buf),
            EntrySink::Deflated(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            EntrySink::Stored(w) => w.flush(),
            EntrySink::Deflated(w) => w.flush(),
        }
    }
}

/// Byte sink for one archive entry.
///
/// Dropping an unfinished writer finishes it; use [`finish`](Self::finish) to
/// observe errors.
pub struct EntryWriter<'a, W: Write> {
    sink: Option<CrcWriter<EntrySink<'a, W>>>,
    directory: &'a mut Vec<CentralDirectoryHeader>,
    header: CentralDirectoryHeader,
    data_start: u64,
}

impl<W: Write> EntryWriter<'_, W> {
    /// Flush compressed data, write the data descriptor and record the entry.
    pub fn finish(mut self) -> Result<(), Error> {
        self.finish_in_place()
    }

    fn finish_in_place(&mut self) -> Result<(), Error> {
        let Some(crc_writer) = self.sink.take() else {
            return Ok(());
        };
        let crc = crc_writer.crc();
        let uncompressed = crc_writer.written();
        let out = match crc_writer.into_inner() {
            EntrySink::Stored(out) => out,
            EntrySink::Deflated(encoder) => encoder.finish()?,
        };
        let compressed = out.count - self.data_start;

        let too_large = || Error::corrupt("entry exceeds 4 GiB");
        self.header.crc32 = crc;
        self.header.compressed_size = u32::try_from(compressed).map_err(|_| too_large())?;
        self.header.uncompressed_size = u32::try_from(uncompressed).map_err(|_| too_large())?;

        DataDescriptor {
            crc32: crc,
            compressed_size: self.header.compressed_size,
            uncompressed_size: self.header.uncompressed_size,
        }
        .write(out)?;
        self.directory.push(self.header.clone());
        Ok(())
    }
}

impl<W: Write> Write for EntryWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.sink.as_mut() {
            Some(sink) => sink.write(buf),
            None => Err(io::Error::other("entry already finished")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.sink.as_mut() {
            Some(sink) => sink.get_mut().flush(),
            None => Ok(()),
        }
    }
}

impl<W: Write> Drop for EntryWriter<'_, W> {
    fn drop(&mut self) {
        if let Err(e) = self.finish_in_place() {
            log::warn!(
                "entry {} was dropped unfinished and could not be closed: {}",
                String::from_utf8_lossy(&self.header.name),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ZipArchive;
    use std::io::Cursor;

    #[test]
    fn streamed_entry_roundtrip() {
        let mut writer = ArchiveWriter::new(Vec::new());
        {
            let mut entry = writer
                .start_entry("xl/worksheets/sheet1.xml", CompressionMethod::Deflate)
                .unwrap();
            for i in 0..1000 {
                write!(entry, "<row r=\"{i}\"/>").unwrap();
            }
            entry.finish().unwrap();
        }
        let data = writer.finish().unwrap();

        let mut archive = ZipArchive::from_slice(&data).unwrap();
        let info = archive.entry("xl/worksheets/sheet1.xml").unwrap().clone();
        assert!(info.has_data_descriptor);
        assert!(info.compressed_size < info.uncompressed_size);
        let text = archive.read_string("xl/worksheets/sheet1.xml").unwrap();
        assert!(text.starts_with("<row r=\"0\"/>"));
        assert!(text.ends_with("<row r=\"999\"/>"));
    }

    #[test]
    fn dropped_entry_is_finished() {
        let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()));
        {
            let mut entry = writer.start_entry("a.txt", CompressionMethod::Store).unwrap();
            entry.write_all(b"abc").unwrap();
        }
        assert_eq!(writer.len(), 1);
        let data = writer.finish().unwrap().into_inner();
        let mut archive = ZipArchive::from_slice(&data).unwrap();
        assert_eq!(archive.read("a.txt").unwrap(), b"abc");
    }

    /// Accepts `room` bytes, then fails every write.
    struct Cramped {
        data: Vec<u8>,
        room: usize,
    }

    impl Write for Cramped {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.room - self.data.len());
            if n == 0 && !buf.is_empty() {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "full"));
            }
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn dropped_entry_that_cannot_finish_is_not_recorded() {
        // Local header (30 + 5 name bytes) and the data fit; the descriptor does not.
        let mut writer = ArchiveWriter::new(Cramped { data: Vec::new(), room: 38 });
        {
            let mut entry = writer.start_entry("a.txt", CompressionMethod::Store).unwrap();
            entry.write_all(b"abc").unwrap();
        }
        assert!(writer.is_empty());
        assert!(writer.finish().is_err());
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut writer = ArchiveWriter::new(Vec::new());
        writer.write_stored("a.txt", b"1").unwrap();
        assert!(writer.write_deflated("/a.txt", b"2").is_err());
    }

    #[test]
    fn output_is_deterministic() {
        let build = || {
            let mut writer = ArchiveWriter::new(Vec::new());
            writer.write_deflated("x.xml", b"<x/>").unwrap();
            writer.finish().unwrap()
        };
        assert_eq!(build(), build());
    }
}
