//! On-disk ZIP records.
//!
//! Only the fields the codec needs are decoded; everything is little-endian
//! per APPNOTE 4.3.

use std::io::Write;

use crate::errors::{Error, ErrorKind};
use crate::mode::CompressionMethod;

pub(crate) const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x0403_4b50;
pub(crate) const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0201_4b50;
pub(crate) const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0605_4b50;
pub(crate) const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x0807_4b50;

pub(crate) const LOCAL_FILE_HEADER_LEN: usize = 30;
pub(crate) const CENTRAL_DIRECTORY_HEADER_LEN: usize = 46;
pub(crate) const END_OF_CENTRAL_DIRECTORY_LEN: usize = 22;

/// General purpose flag: sizes and CRC follow the data in a descriptor.
pub(crate) const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
/// General purpose flag: file name is UTF-8.
pub(crate) const FLAG_UTF8: u16 = 1 << 11;

/// "Version needed to extract" for deflate without ZIP64.
pub(crate) const VERSION_NEEDED: u16 = 20;
/// "Version made by": MS-DOS attributes, version 2.0.
pub(crate) const VERSION_MADE_BY: u16 = 20;

/// DOS time 00:00:00.
pub(crate) const DOS_TIME: u16 = 0;
/// DOS date 1980-01-01.
pub(crate) const DOS_DATE: u16 = (1 << 5) | 1;

#[inline]
pub(crate) fn le_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

#[inline]
pub(crate) fn le_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

pub(crate) fn expect_signature(buf: &[u8], expected: u32) -> Result<(), Error> {
    let actual = le_u32(buf, 0);
    if actual != expected {
        return Err(ErrorKind::InvalidSignature { expected, actual }.into());
    }
    Ok(())
}

/// End of central directory record.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EndOfCentralDirectory {
    pub entries: u16,
    pub directory_size: u32,
    pub directory_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub(crate) fn parse(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < END_OF_CENTRAL_DIRECTORY_LEN {
            return Err(Error::corrupt("truncated end of central directory"));
        }
        expect_signature(buf, END_OF_CENTRAL_DIRECTORY_SIGNATURE)?;
        let disk = le_u16(buf, 4);
        let directory_disk = le_u16(buf, 6);
        if disk != 0 || directory_disk != 0 {
            return Err(Error::corrupt("multi-disk archives are not supported"));
        }
        Ok(Self {
            entries: le_u16(buf, 10),
            directory_size: le_u32(buf, 12),
            directory_offset: le_u32(buf, 16),
            comment_len: le_u16(buf, 20),
        })
    }

    pub(crate) fn write<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        let mut buf = [0u8; END_OF_CENTRAL_DIRECTORY_LEN];
        buf[0..4].copy_from_slice(&END_OF_CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes());
        buf[8..10].copy_from_slice(&self.entries.to_le_bytes());
        buf[10..12].copy_from_slice(&self.entries.to_le_bytes());
        buf[12..16].copy_from_slice(&self.directory_size.to_le_bytes());
        buf[16..20].copy_from_slice(&self.directory_offset.to_le_bytes());
        buf[20..22].copy_from_slice(&self.comment_len.to_le_bytes());
        out.write_all(&buf)
    }
}

/// Central directory file header, decoded.
#[derive(Debug, Clone)]
pub(crate) struct CentralDirectoryHeader {
    pub flags: u16,
    pub method: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub local_header_offset: u32,
    pub name: Vec<u8>,
    /// Total length of this record including variable fields.
    pub record_len: usize,
}

impl CentralDirectoryHeader {
    pub(crate) fn parse(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < CENTRAL_DIRECTORY_HEADER_LEN {
            return Err(Error::corrupt("truncated central directory header"));
        }
        expect_signature(buf, CENTRAL_DIRECTORY_SIGNATURE)?;
        let name_len = le_u16(buf, 28) as usize;
        let extra_len = le_u16(buf, 30) as usize;
        let comment_len = le_u16(buf, 32) as usize;
        let record_len = CENTRAL_DIRECTORY_HEADER_LEN + name_len + extra_len + comment_len;
        if buf.len() < record_len {
            return Err(Error::corrupt("central directory header overruns directory"));
        }
        let name_start = CENTRAL_DIRECTORY_HEADER_LEN;
        Ok(Self {
            flags: le_u16(buf, 8),
            method: le_u16(buf, 10),
            crc32: le_u32(buf, 16),
            compressed_size: le_u32(buf, 20),
            uncompressed_size: le_u32(buf, 24),
            local_header_offset: le_u32(buf, 42),
            name: buf[name_start..name_start + name_len].to_vec(),
            record_len,
        })
    }

    pub(crate) fn write<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        let mut buf = [0u8; CENTRAL_DIRECTORY_HEADER_LEN];
        buf[0..4].copy_from_slice(&CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes());
        buf[4..6].copy_from_slice(&VERSION_MADE_BY.to_le_bytes());
        buf[6..8].copy_from_slice(&VERSION_NEEDED.to_le_bytes());
        buf[8..10].copy_from_slice(&self.flags.to_le_bytes());
        buf[10..12].copy_from_slice(&self.method.to_le_bytes());
        buf[12..14].copy_from_slice(&DOS_TIME.to_le_bytes());
        buf[14..16].copy_from_slice(&DOS_DATE.to_le_bytes());
        buf[16..20].copy_from_slice(&self.crc32.to_le_bytes());
        buf[20..24].copy_from_slice(&self.compressed_size.to_le_bytes());
        buf[24..28].copy_from_slice(&self.uncompressed_size.to_le_bytes());
        buf[28..30].copy_from_slice(&(self.name.len() as u16).to_le_bytes());
        // extra, comment, disk start, internal and external attributes stay zero
        buf[42..46].copy_from_slice(&self.local_header_offset.to_le_bytes());
        out.write_all(&buf)?;
        out.write_all(&self.name)
    }

    pub(crate) fn compression_method(&self) -> CompressionMethod {
        CompressionMethod::from_id(self.method)
    }
}

/// Local file header; only the variable-length tail matters when reading.
pub(crate) struct LocalFileHeader<'a> {
    pub flags: u16,
    pub method: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub name: &'a [u8],
}

impl LocalFileHeader<'_> {
    /// Length of name plus extra field following the fixed header.
    pub(crate) fn variable_len(fixed: &[u8]) -> Result<usize, Error> {
        if fixed.len() < LOCAL_FILE_HEADER_LEN {
            return Err(Error::corrupt("truncated local file header"));
        }
        expect_signature(fixed, LOCAL_FILE_HEADER_SIGNATURE)?;
        Ok(le_u16(fixed, 26) as usize + le_u16(fixed, 28) as usize)
    }

    pub(crate) fn write<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        let mut buf = [0u8; LOCAL_FILE_HEADER_LEN];
        buf[0..4].copy_from_slice(&LOCAL_FILE_HEADER_SIGNATURE.to_le_bytes());
        buf[4..6].copy_from_slice(&VERSION_NEEDED.to_le_bytes());
        buf[6..8].copy_from_slice(&self.flags.to_le_bytes());
        buf[8..10].copy_from_slice(&self.method.to_le_bytes());
        buf[10..12].copy_from_slice(&DOS_TIME.to_le_bytes());
        buf[12..14].copy_from_slice(&DOS_DATE.to_le_bytes());
        buf[14..18].copy_from_slice(&self.crc32.to_le_bytes());
        buf[18..22].copy_from_slice(&self.compressed_size.to_le_bytes());
        buf[22..26].copy_from_slice(&self.uncompressed_size.to_le_bytes());
        buf[26..28].copy_from_slice(&(self.name.len() as u16).to_le_bytes());
        out.write_all(&buf)?;
        out.write_all(self.name)
    }
}

/// Trailing data descriptor written after streamed entry data.
pub(crate) struct DataDescriptor {
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
}

impl DataDescriptor {
    pub(crate) fn write<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        let mut buf = [0u8; 16];
        buf[0..4].copy_from_slice(&DATA_DESCRIPTOR_SIGNATURE.to_le_bytes());
        buf[4..8].copy_from_slice(&self.crc32.to_le_bytes());
        buf[8..12].copy_from_slice(&self.compressed_size.to_le_bytes());
        buf[12..16].copy_from_slice(&self.uncompressed_size.to_le_bytes());
        out.write_all(&buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eocd_roundtrip() {
        let eocd = EndOfCentralDirectory {
            entries: 3,
            directory_size: 150,
            directory_offset: 1024,
            comment_len: 0,
        };
        let mut buf = Vec::new();
        eocd.write(&mut buf).unwrap();
        assert_eq!(buf.len(), END_OF_CENTRAL_DIRECTORY_LEN);
        let parsed = EndOfCentralDirectory::parse(&buf).unwrap();
        assert_eq!(parsed.entries, 3);
        assert_eq!(parsed.directory_offset, 1024);
    }

    #[test]
    fn central_header_rejects_bad_signature() {
        let buf = [0u8; CENTRAL_DIRECTORY_HEADER_LEN];
        let err = CentralDirectoryHeader::parse(&buf).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn central_header_parses_name() {
        let header = CentralDirectoryHeader {
            flags: FLAG_UTF8,
            method: 8,
            crc32: 0xdead_beef,
            compressed_size: 10,
            uncompressed_size: 20,
            local_header_offset: 0,
            name: b"xl/workbook.xml".to_vec(),
            record_len: 0,
        };
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        let parsed = CentralDirectoryHeader::parse(&buf).unwrap();
        assert_eq!(parsed.name, b"xl/workbook.xml");
        assert_eq!(parsed.crc32, 0xdead_beef);
        assert_eq!(parsed.record_len, buf.len());
    }
}
