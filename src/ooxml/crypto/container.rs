//! The compound file that carries an encrypted package.
//!
//! Besides `EncryptionInfo` and `EncryptedPackage`, Office expects a
//! `\x06DataSpaces` storage declaring that `EncryptedPackage` is transformed
//! by the strong encryption data space.

use std::io::Cursor;

use crate::cfb::{CompoundFile, CompoundFileWriter};
use crate::ooxml::error::{OoxmlError, Result};

pub(crate) const ENCRYPTION_INFO: &str = "EncryptionInfo";
pub(crate) const ENCRYPTED_PACKAGE: &str = "EncryptedPackage";
const DATA_SPACES: &str = "\u{0006}DataSpaces";
const DATA_SPACE_NAME: &str = "StrongEncryptionDataSpace";
const TRANSFORM_NAME: &str = "StrongEncryptionTransform";

/// The two streams that matter for decryption.
pub(crate) struct EncryptedContainer {
    pub encryption_info: Vec<u8>,
    pub encrypted_package: Vec<u8>,
}

impl EncryptedContainer {
    /// Read both streams from compound-file bytes.
    pub(crate) fn read(data: &[u8]) -> Result<Self> {
        let mut cfb = CompoundFile::open(Cursor::new(data))?;
        if !cfb.exists(&[ENCRYPTION_INFO]) || !cfb.exists(&[ENCRYPTED_PACKAGE]) {
            return Err(OoxmlError::InvalidPackage(
                "compound file is not an encrypted OOXML package".to_string(),
            ));
        }
        let encryption_info = cfb.open_stream(&[ENCRYPTION_INFO])?;
        let encrypted_package = cfb.open_stream(&[ENCRYPTED_PACKAGE])?;
        if cfb.exists(&[DATA_SPACES]) {
            log::debug!("encrypted container declares DataSpaces");
        }
        Ok(Self {
            encryption_info,
            encrypted_package,
        })
    }

    /// Serialize as a compound file with the DataSpaces tree.
    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = CompoundFileWriter::new();
        writer.create_stream(&[ENCRYPTION_INFO], &self.encryption_info)?;
        writer.create_stream(&[ENCRYPTED_PACKAGE], &self.encrypted_package)?;

        writer.create_stream(&[DATA_SPACES, "Version"], &version_stream())?;
        writer.create_stream(&[DATA_SPACES, "DataSpaceMap"], &data_space_map())?;
        writer.create_stream(&[DATA_SPACES, "DataSpaceInfo", DATA_SPACE_NAME], &data_space_definition())?;
        writer.create_stream(
            &[DATA_SPACES, "TransformInfo", TRANSFORM_NAME, "\u{0006}Primary"],
            &transform_primary(),
        )?;
        Ok(writer.to_bytes()?)
    }
}

/// Length-prefixed UTF-16LE string padded to four bytes.
fn write_unicode_lpp4(buf: &mut Vec<u8>, s: &str) {
    let units: Vec<u8> = s.encode_utf16().flat_map(u16::to_le_bytes).collect();
    buf.extend_from_slice(&(units.len() as u32).to_le_bytes());
    buf.extend_from_slice(&units);
    if units.len() % 4 == 2 {
        buf.extend_from_slice(&[0, 0]);
    }
}

/// Reader, updater and writer versions, each 1.0.
fn push_versions(buf: &mut Vec<u8>) {
    for _ in 0..3 {
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
    }
}

fn version_stream() -> Vec<u8> {
    let mut buf = Vec::new();
    write_unicode_lpp4(&mut buf, "Microsoft.Container.DataSpaces");
    push_versions(&mut buf);
    buf
}

fn data_space_map() -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&8u32.to_le_bytes()); // header length
    buf.extend_from_slice(&1u32.to_le_bytes()); // entry count

    let entry_start = buf.len();
    buf.extend_from_slice(&0u32.to_le_bytes()); // entry length, patched below
    buf.extend_from_slice(&1u32.to_le_bytes()); // reference components
    buf.extend_from_slice(&0u32.to_le_bytes()); // component type: stream
    write_unicode_lpp4(&mut buf, ENCRYPTED_PACKAGE);
    write_unicode_lpp4(&mut buf, DATA_SPACE_NAME);
    let entry_len = (buf.len() - entry_start) as u32;
    buf[entry_start..entry_start + 4].copy_from_slice(&entry_len.to_le_bytes());
    buf
}

fn data_space_definition() -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&8u32.to_le_bytes());
    buf.extend_from_slice(&1u32.to_le_bytes());
    write_unicode_lpp4(&mut buf, TRANSFORM_NAME);
    buf
}

fn transform_primary() -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&0u32.to_le_bytes()); // header length, patched below
    buf.extend_from_slice(&1u32.to_le_bytes()); // transform type
    write_unicode_lpp4(&mut buf, "{FF9A3F03-56EF-4613-BDD5-5A41C1D07246}");
    let header_len = buf.len() as u32;
    buf[..4].copy_from_slice(&header_len.to_le_bytes());

    write_unicode_lpp4(&mut buf, "Microsoft.Container.EncryptionTransform");
    push_versions(&mut buf);
    buf.extend_from_slice(&0u32.to_le_bytes()); // EncryptionTransformInfo name (empty)
    buf.extend_from_slice(&0u32.to_le_bytes()); // block size
    buf.extend_from_slice(&0u32.to_le_bytes()); // cipher mode
    buf.extend_from_slice(&4u32.to_le_bytes()); // reserved
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfb::is_compound_file;

    #[test]
    fn container_roundtrip_with_data_spaces() {
        let container = EncryptedContainer {
            encryption_info: vec![4, 0, 4, 0, 0x40, 0, 0, 0],
            encrypted_package: vec![0xAB; 9000],
        };
        let bytes = container.to_bytes().unwrap();
        assert!(is_compound_file(&bytes));

        let cfb = CompoundFile::open(Cursor::new(&bytes[..])).unwrap();
        assert!(cfb.exists(&[DATA_SPACES, "DataSpaceMap"]));
        assert!(cfb.exists(&[DATA_SPACES, "TransformInfo", TRANSFORM_NAME, "\u{0006}Primary"]));

        let read = EncryptedContainer::read(&bytes).unwrap();
        assert_eq!(read.encryption_info, container.encryption_info);
        assert_eq!(read.encrypted_package, container.encrypted_package);
    }

    #[test]
    fn plain_compound_file_is_not_a_package() {
        let mut writer = CompoundFileWriter::new();
        writer.create_stream(&["WordDocument"], b"doc").unwrap();
        let bytes = writer.to_bytes().unwrap();
        assert!(matches!(
            EncryptedContainer::read(&bytes),
            Err(OoxmlError::InvalidPackage(_))
        ));
    }

    #[test]
    fn lpp4_strings_are_padded() {
        let mut buf = Vec::new();
        write_unicode_lpp4(&mut buf, "abc");
        assert_eq!(buf.len(), 4 + 6 + 2);
        assert_eq!(&buf[..4], &6u32.to_le_bytes());
    }
}
