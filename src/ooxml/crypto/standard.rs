//! Standard encryption (EncryptionInfo version 3.2 / 4.2).
//!
//! A binary header and verifier; SHA-1 key derivation with a fixed spin count
//! and AES-ECB over the whole package stream.

use sha1::{Digest, Sha1};

use super::primitives::{
    AES_BLOCK_SIZE, HashAlgorithm, aes_ecb_decrypt, aes_ecb_encrypt, ct_eq, iterated_hash,
    pad_to_block, random_bytes,
};
use crate::ooxml::error::{OoxmlError, Result};

const SPIN_COUNT: u32 = 50_000;
const SHA1_LEN: usize = 20;

const FLAG_CRYPTOAPI: u32 = 0x04;
const FLAG_AES: u32 = 0x20;
const ALG_AES_128: u32 = 0x660E;
const ALG_AES_192: u32 = 0x660F;
const ALG_AES_256: u32 = 0x6610;
const ALG_HASH_SHA1: u32 = 0x8004;
const PROVIDER_AES: u32 = 0x18;
const CSP_NAME: &str = "Microsoft Enhanced RSA and AES Cryptographic Provider";

/// Parsed header and verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StandardInfo {
    pub key_bits: u32,
    pub salt: [u8; 16],
    pub encrypted_verifier: [u8; 16],
    pub encrypted_verifier_hash: Vec<u8>,
}

fn read_u32(buf: &[u8], offset: usize) -> Result<u32> {
    buf.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| OoxmlError::CorruptArchive("EncryptionInfo stream is truncated".to_string()))
}

impl StandardInfo {
    /// Parse a whole `EncryptionInfo` stream (including the version header).
    pub(crate) fn parse(info: &[u8]) -> Result<Self> {
        let flags = read_u32(info, 4)?;
        if flags & FLAG_AES == 0 {
            return Err(OoxmlError::UnsupportedEncryption(
                "Standard encryption without AES (RC4 CryptoAPI)".to_string(),
            ));
        }

        let header_size = read_u32(info, 8)? as usize;
        let header_start = 12usize;
        let alg_id = read_u32(info, header_start + 8)?;
        let hash_id = read_u32(info, header_start + 12)?;
        let key_bits = read_u32(info, header_start + 16)?;
        if hash_id != 0 && hash_id != ALG_HASH_SHA1 {
            return Err(OoxmlError::UnsupportedEncryption(format!(
                "Standard hash algorithm {:#x}",
                hash_id
            )));
        }
        let expected_bits = match alg_id {
            ALG_AES_128 | 0 => 128,
            ALG_AES_192 => 192,
            ALG_AES_256 => 256,
            other => {
                return Err(OoxmlError::UnsupportedEncryption(format!(
                    "Standard cipher {:#x}",
                    other
                )));
            },
        };
        let key_bits = if key_bits == 0 { expected_bits } else { key_bits };
        if key_bits != expected_bits {
            return Err(OoxmlError::CorruptArchive(format!(
                "key size {} does not match cipher {:#x}",
                key_bits, alg_id
            )));
        }

        let mut offset = header_start
            .checked_add(header_size)
            .ok_or_else(|| OoxmlError::CorruptArchive("header size overflow".to_string()))?;
        let salt_size = read_u32(info, offset)?;
        if salt_size != 16 {
            return Err(OoxmlError::CorruptArchive(format!(
                "unexpected salt size {}",
                salt_size
            )));
        }
        offset += 4;
        let verifier = info
            .get(offset..offset + 32)
            .ok_or_else(|| OoxmlError::CorruptArchive("verifier is truncated".to_string()))?;
        let mut salt = [0u8; 16];
        salt.copy_from_slice(&verifier[..16]);
        let mut encrypted_verifier = [0u8; 16];
        encrypted_verifier.copy_from_slice(&verifier[16..]);
        offset += 32;

        let hash_size = read_u32(info, offset)? as usize;
        if hash_size != SHA1_LEN {
            return Err(OoxmlError::CorruptArchive(format!(
                "unexpected verifier hash size {}",
                hash_size
            )));
        }
        offset += 4;
        // The hash is stored AES-padded to 32 bytes.
        let encrypted_verifier_hash = info
            .get(offset..offset + 32)
            .ok_or_else(|| OoxmlError::CorruptArchive("verifier hash is truncated".to_string()))?
            .to_vec();

        Ok(StandardInfo {
            key_bits,
            salt,
            encrypted_verifier,
            encrypted_verifier_hash,
        })
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(&3u16.to_le_bytes());
        buf.extend_from_slice(&2u16.to_le_bytes());
        buf.extend_from_slice(&(FLAG_CRYPTOAPI | FLAG_AES).to_le_bytes());

        let header_start = buf.len();
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&(FLAG_CRYPTOAPI | FLAG_AES).to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes()); // SizeExtra
        let alg_id = match self.key_bits {
            192 => ALG_AES_192,
            256 => ALG_AES_256,
            _ => ALG_AES_128,
        };
        buf.extend_from_slice(&alg_id.to_le_bytes());
        buf.extend_from_slice(&ALG_HASH_SHA1.to_le_bytes());
        buf.extend_from_slice(&self.key_bits.to_le_bytes());
        buf.extend_from_slice(&PROVIDER_AES.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        for unit in CSP_NAME.encode_utf16().chain(std::iter::once(0)) {
            buf.extend_from_slice(&unit.to_le_bytes());
        }
        let header_size = (buf.len() - header_start - 4) as u32;
        buf[header_start..header_start + 4].copy_from_slice(&header_size.to_le_bytes());

        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&self.salt);
        buf.extend_from_slice(&self.encrypted_verifier);
        buf.extend_from_slice(&(SHA1_LEN as u32).to_le_bytes());
        buf.extend_from_slice(&self.encrypted_verifier_hash);
        buf
    }
}

fn xor_fill_sha1(input: &[u8], fill: u8) -> [u8; SHA1_LEN] {
    let mut block = [fill; 64];
    for (b, i) in block.iter_mut().zip(input) {
        *b ^= i;
    }
    Sha1::digest(block).into()
}

/// Password to AES key: iterated SHA-1, block 0, then the X1/X2 expansion.
pub(crate) fn derive_key(salt: &[u8], password: &str, key_bits: u32) -> Result<Vec<u8>> {
    let key_len = (key_bits / 8) as usize;
    if key_len == 0 || key_len > 2 * SHA1_LEN {
        return Err(OoxmlError::UnsupportedEncryption(format!(
            "Standard key of {} bits",
            key_bits
        )));
    }
    let hash = iterated_hash(HashAlgorithm::Sha1, salt, password, SPIN_COUNT);
    let final_hash = HashAlgorithm::Sha1.digest(&[&hash, &0u32.to_le_bytes()]);

    let mut key = Vec::with_capacity(2 * SHA1_LEN);
    key.extend_from_slice(&xor_fill_sha1(&final_hash, 0x36));
    key.extend_from_slice(&xor_fill_sha1(&final_hash, 0x5c));
    key.truncate(key_len);
    Ok(key)
}

/// Check a derived key against the stored verifier.
pub(crate) fn verify_key(info: &StandardInfo, key: &[u8]) -> Result<()> {
    let mut verifier = info.encrypted_verifier;
    aes_ecb_decrypt(key, &mut verifier)?;
    let expected = Sha1::digest(verifier);

    let mut verifier_hash = info.encrypted_verifier_hash.clone();
    aes_ecb_decrypt(key, &mut verifier_hash)?;
    if !ct_eq(&verifier_hash[..SHA1_LEN], &expected) {
        return Err(OoxmlError::InvalidPassword);
    }
    Ok(())
}

/// Key for `password`, verified.
pub(crate) fn secret_key(info: &StandardInfo, password: &str) -> Result<Vec<u8>> {
    let key = derive_key(&info.salt, password, info.key_bits)?;
    verify_key(info, &key)?;
    Ok(key)
}

/// Decrypt a block-aligned slice of the package stream in place.
pub(crate) fn decrypt_segment(key: &[u8], segment: &mut [u8]) -> Result<()> {
    aes_ecb_decrypt(key, segment)
}

/// Encrypt a plaintext package with AES-128. Returns the `EncryptionInfo`
/// and `EncryptedPackage` stream contents.
pub(crate) fn encrypt(plain: &[u8], password: &str) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut salt = [0u8; 16];
    salt.copy_from_slice(&random_bytes(16)?);
    let mut verifier = [0u8; 16];
    verifier.copy_from_slice(&random_bytes(16)?);

    let key = derive_key(&salt, password, 128)?;
    let mut encrypted_verifier = verifier;
    aes_ecb_encrypt(&key, &mut encrypted_verifier)?;
    let mut encrypted_verifier_hash = pad_to_block(&Sha1::digest(verifier));
    aes_ecb_encrypt(&key, &mut encrypted_verifier_hash)?;

    let info = StandardInfo {
        key_bits: 128,
        salt,
        encrypted_verifier,
        encrypted_verifier_hash,
    };

    let mut stream = Vec::with_capacity(8 + plain.len() + AES_BLOCK_SIZE);
    stream.extend_from_slice(&(plain.len() as u64).to_le_bytes());
    let mut body = pad_to_block(plain);
    aes_ecb_encrypt(&key, &mut body)?;
    stream.extend_from_slice(&body);

    Ok((info.to_bytes(), stream))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let (info, stream) = encrypt(b"hello package", "pw").unwrap();
        assert_eq!(&info[..4], &[3, 0, 2, 0]);
        let parsed = StandardInfo::parse(&info).unwrap();
        assert_eq!(parsed.key_bits, 128);
        assert_eq!(parsed.to_bytes(), info);
        assert_eq!(stream.len(), 8 + 16);
    }

    #[test]
    fn password_check_and_decryption() {
        let plain = b"PK\x03\x04 standard encrypted package body".repeat(10);
        let (info, stream) = encrypt(&plain, "Password1").unwrap();
        let info = StandardInfo::parse(&info).unwrap();

        assert!(matches!(secret_key(&info, "password1"), Err(OoxmlError::InvalidPassword)));
        let key = secret_key(&info, "Password1").unwrap();
        let mut body = stream[8..].to_vec();
        decrypt_segment(&key, &mut body).unwrap();
        body.truncate(plain.len());
        assert_eq!(body, plain);
    }

    #[test]
    fn rc4_is_unsupported() {
        let mut info = encrypt(b"x", "pw").unwrap().0;
        info[4..8].copy_from_slice(&FLAG_CRYPTOAPI.to_le_bytes());
        assert!(matches!(
            StandardInfo::parse(&info),
            Err(OoxmlError::UnsupportedEncryption(_))
        ));
    }
}
