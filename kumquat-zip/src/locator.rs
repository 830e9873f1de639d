use std::io::{Read, Seek, SeekFrom};

use crate::errors::Error;
use crate::headers::{
    END_OF_CENTRAL_DIRECTORY_LEN, END_OF_CENTRAL_DIRECTORY_SIGNATURE, EndOfCentralDirectory,
};

/// Largest distance the EOCD record can sit from the end: fixed part plus a
/// maximal comment.
const MAX_EOCD_SEARCH: u64 = END_OF_CENTRAL_DIRECTORY_LEN as u64 + u16::MAX as u64;

/// Located end of central directory.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Locator {
    pub eocd: EndOfCentralDirectory,
    /// Absolute offset of the EOCD signature.
    pub eocd_offset: u64,
}

/// Scan backwards from the end of `reader` for the end of central directory
/// signature.
pub(crate) fn locate_eocd<R: Read + Seek>(reader: &mut R) -> Result<Locator, Error> {
    let len = reader.seek(SeekFrom::End(0))?;
    if len < END_OF_CENTRAL_DIRECTORY_LEN as u64 {
        return Err(Error::corrupt("input is too short to be a ZIP archive"));
    }

    let window = len.min(MAX_EOCD_SEARCH);
    let start = len - window;
    reader.seek(SeekFrom::Start(start))?;
    let mut tail = vec![0u8; window as usize];
    reader.read_exact(&mut tail)?;

    let signature = END_OF_CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes();
    let last_candidate = tail.len() - END_OF_CENTRAL_DIRECTORY_LEN;
    for pos in (0..=last_candidate).rev() {
        if tail[pos..pos + 4] != signature {
            continue;
        }
        let Ok(eocd) = EndOfCentralDirectory::parse(&tail[pos..]) else {
            continue;
        };
        // The comment must end exactly at the end of input, otherwise the
        // signature bytes were part of some payload.
        if pos + END_OF_CENTRAL_DIRECTORY_LEN + eocd.comment_len as usize != tail.len() {
            continue;
        }
        let eocd_offset = start + pos as u64;
        if eocd.directory_offset as u64 + eocd.directory_size as u64 > eocd_offset {
            return Err(Error::corrupt(
                "central directory extends past the end of central directory record",
            ));
        }
        return Ok(Locator { eocd, eocd_offset });
    }

    Err(Error::corrupt("end of central directory signature not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn empty_archive(comment: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        EndOfCentralDirectory {
            entries: 0,
            directory_size: 0,
            directory_offset: 0,
            comment_len: comment.len() as u16,
        }
        .write(&mut buf)
        .unwrap();
        buf.extend_from_slice(comment);
        buf
    }

    #[test]
    fn finds_eocd_without_comment() {
        let data = empty_archive(b"");
        let loc = locate_eocd(&mut Cursor::new(data)).unwrap();
        assert_eq!(loc.eocd_offset, 0);
        assert_eq!(loc.eocd.entries, 0);
    }

    #[test]
    fn finds_eocd_behind_comment_containing_signature() {
        let mut comment = b"PK\x05\x06".to_vec();
        comment.extend_from_slice(&[0u8; 30]);
        let mut data = vec![0xAA; 10];
        data.extend(empty_archive(&comment));
        let loc = locate_eocd(&mut Cursor::new(data)).unwrap();
        assert_eq!(loc.eocd_offset, 10);
    }

    #[test]
    fn garbage_is_corrupt() {
        let err = locate_eocd(&mut Cursor::new(vec![0u8; 100])).unwrap_err();
        assert!(err.is_corrupt());
        let err = locate_eocd(&mut Cursor::new(vec![0u8; 3])).unwrap_err();
        assert!(err.is_corrupt());
    }
}
