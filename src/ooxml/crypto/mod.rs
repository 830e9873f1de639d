//! Password encryption of OOXML packages.
//!
//! An encrypted package is a compound file holding two streams:
//! `EncryptionInfo` (the version header and key descriptor) and
//! `EncryptedPackage` (the plaintext length followed by the ciphertext of the
//! ZIP bytes). Agile (4.4) and Standard (3.2 / 4.2) descriptors are read;
//! packages are written with Agile AES-256 / SHA-512 unless Standard is asked
//! for.
//!
//! ```rust
//! use loquat::ooxml::crypto;
//!
//! let zip = b"PK\x03\x04 not really a zip".to_vec();
//! let sealed = crypto::encrypt_with(&zip, "pw", crypto::EncryptionScheme::Agile, 1000)?;
//! assert!(crypto::detect(&sealed));
//! assert_eq!(crypto::decrypt_to_vec(&sealed, "pw", true)?, zip);
//! # Ok::<(), loquat::ooxml::error::OoxmlError>(())
//! ```

mod agile;
mod container;
mod primitives;
mod standard;
mod stream;

use std::io::{Cursor, Read};

use serde::{Deserialize, Serialize};

use crate::cfb;
use crate::ooxml::error::{OoxmlError, Result};
use container::EncryptedContainer;
use stream::SegmentCipher;

pub use primitives::HashAlgorithm;
pub use stream::DecryptingReader;

/// Plaintext bytes per encrypted segment.
pub(crate) const SEGMENT_LEN: usize = 4096;

/// Spin count used for new Agile packages.
pub const DEFAULT_SPIN_COUNT: u32 = 100_000;

/// Encryption flavour used when saving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EncryptionScheme {
    /// XML descriptor, per-segment CBC, HMAC integrity.
    #[default]
    Agile,
    /// Binary descriptor, AES-128 ECB.
    Standard,
}

/// True if `data` is a compound file carrying an `EncryptionInfo` stream.
pub fn detect(data: &[u8]) -> bool {
    if !cfb::is_compound_file(data) {
        return false;
    }
    cfb::CompoundFile::open(Cursor::new(data))
        .map(|file| file.exists(&[container::ENCRYPTION_INFO]))
        .unwrap_or(false)
}

fn version(info: &[u8]) -> Result<(u16, u16)> {
    match info {
        [a, b, c, d, ..] => Ok((u16::from_le_bytes([*a, *b]), u16::from_le_bytes([*c, *d]))),
        _ => Err(OoxmlError::CorruptArchive(
            "EncryptionInfo stream is truncated".to_string(),
        )),
    }
}

/// Open an encrypted package and return a seekable reader over its plaintext
/// ZIP bytes.
///
/// Fails with [`OoxmlError::InvalidPassword`] when the verifier does not
/// match. With `verify_integrity`, an Agile package whose HMAC does not match
/// is rejected as corrupt.
pub fn decrypt(
    data: &[u8],
    password: &str,
    verify_integrity: bool,
) -> Result<DecryptingReader<Cursor<Vec<u8>>>> {
    let container = EncryptedContainer::read(data)?;
    let info = &container.encryption_info;
    let cipher = match version(info)? {
        (agile::VERSION_MAJOR, agile::VERSION_MINOR) => {
            log::debug!("agile encryption descriptor");
            let descriptor = agile::AgileInfo::parse(&info[8..])?;
            let key = agile::secret_key(&descriptor, password)?;
            if verify_integrity {
                agile::verify_integrity(&descriptor, &key, &container.encrypted_package)?;
            }
            SegmentCipher::Agile {
                key_data: descriptor.key_data,
                key,
            }
        },
        (2..=4, 2) => {
            log::debug!("standard encryption descriptor");
            let descriptor = standard::StandardInfo::parse(info)?;
            let key = standard::secret_key(&descriptor, password)?;
            SegmentCipher::Standard { key }
        },
        (major, minor) => {
            return Err(OoxmlError::UnsupportedEncryption(format!(
                "EncryptionInfo version {}.{}",
                major, minor
            )));
        },
    };
    DecryptingReader::new(Cursor::new(container.encrypted_package), cipher)
}

/// Decrypt a whole package into memory.
pub fn decrypt_to_vec(data: &[u8], password: &str, verify_integrity: bool) -> Result<Vec<u8>> {
    let mut reader = decrypt(data, password, verify_integrity)?;
    let mut out = Vec::with_capacity(reader.len() as usize);
    reader.read_to_end(&mut out)?;
    Ok(out)
}

/// Encrypt plaintext ZIP bytes with the Agile scheme.
pub fn encrypt(plain: &[u8], password: &str) -> Result<Vec<u8>> {
    encrypt_with(plain, password, EncryptionScheme::Agile, DEFAULT_SPIN_COUNT)
}

/// Encrypt plaintext ZIP bytes into a compound file. `spin_count` only
/// applies to Agile; Standard always uses 50,000 rounds.
pub fn encrypt_with(
    plain: &[u8],
    password: &str,
    scheme: EncryptionScheme,
    spin_count: u32,
) -> Result<Vec<u8>> {
    let (encryption_info, encrypted_package) = match scheme {
        EncryptionScheme::Agile => agile::encrypt(plain, password, spin_count)?,
        EncryptionScheme::Standard => standard::encrypt(plain, password)?,
    };
    EncryptedContainer {
        encryption_info,
        encrypted_package,
    }
    .to_bytes()
}
