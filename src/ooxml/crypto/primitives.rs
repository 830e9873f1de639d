//! Hash and block-cipher helpers shared by both encryption schemes.

use aes::cipher::block_padding::NoPadding;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit};
use aes::{Aes128, Aes192, Aes256};
use hmac::{Hmac, Mac};
use rand::TryRngCore;
use rand::rngs::OsRng;
use sha2::Digest;

use crate::ooxml::error::{OoxmlError, Result};

pub(crate) const AES_BLOCK_SIZE: usize = 16;

/// Hash algorithms an Agile descriptor may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub(crate) fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "SHA1" | "SHA-1" => Ok(HashAlgorithm::Sha1),
            "SHA256" | "SHA-256" => Ok(HashAlgorithm::Sha256),
            "SHA384" | "SHA-384" => Ok(HashAlgorithm::Sha384),
            "SHA512" | "SHA-512" => Ok(HashAlgorithm::Sha512),
            other => Err(OoxmlError::UnsupportedEncryption(format!(
                "hash algorithm {}",
                other
            ))),
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "SHA1",
            HashAlgorithm::Sha256 => "SHA256",
            HashAlgorithm::Sha384 => "SHA384",
            HashAlgorithm::Sha512 => "SHA512",
        }
    }

    /// Digest length in bytes.
    pub(crate) fn output_len(self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    /// Hash of the concatenation of `parts`.
    pub(crate) fn digest(self, parts: &[&[u8]]) -> Vec<u8> {
        fn run<D: Digest>(parts: &[&[u8]]) -> Vec<u8> {
            let mut hasher = D::new();
            for part in parts {
                hasher.update(*part);
            }
            hasher.finalize().to_vec()
        }
        match self {
            HashAlgorithm::Sha1 => run::<sha1::Sha1>(parts),
            HashAlgorithm::Sha256 => run::<sha2::Sha256>(parts),
            HashAlgorithm::Sha384 => run::<sha2::Sha384>(parts),
            HashAlgorithm::Sha512 => run::<sha2::Sha512>(parts),
        }
    }

    pub(crate) fn hmac(self, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        fn run<M: Mac + KeyInit>(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
            let mut mac = <M as KeyInit>::new_from_slice(key)
                .map_err(|e| OoxmlError::InvalidFormat(format!("HMAC key: {}", e)))?;
            mac.update(data);
            Ok(mac.finalize().into_bytes().to_vec())
        }
        match self {
            HashAlgorithm::Sha1 => run::<Hmac<sha1::Sha1>>(key, data),
            HashAlgorithm::Sha256 => run::<Hmac<sha2::Sha256>>(key, data),
            HashAlgorithm::Sha384 => run::<Hmac<sha2::Sha384>>(key, data),
            HashAlgorithm::Sha512 => run::<Hmac<sha2::Sha512>>(key, data),
        }
    }
}

/// Password as the UTF-16LE bytes every key derivation hashes.
pub(crate) fn password_to_utf16le(password: &str) -> Vec<u8> {
    password.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

/// `H0 = H(salt || password)`, then `Hn = H(LE32(n) || Hn-1)` for `spin_count` rounds.
pub(crate) fn iterated_hash(
    alg: HashAlgorithm,
    salt: &[u8],
    password: &str,
    spin_count: u32,
) -> Vec<u8> {
    let mut hash = alg.digest(&[salt, &password_to_utf16le(password)]);
    for i in 0..spin_count {
        hash = alg.digest(&[&i.to_le_bytes(), &hash]);
    }
    hash
}

/// Truncate `bytes` to `len`, or extend it with `pad`.
pub(crate) fn fit(mut bytes: Vec<u8>, len: usize, pad: u8) -> Vec<u8> {
    bytes.resize(len, pad);
    bytes
}

/// Extend with zeros to a whole number of AES blocks.
pub(crate) fn pad_to_block(input: &[u8]) -> Vec<u8> {
    let len = input.len().div_ceil(AES_BLOCK_SIZE).max(1) * AES_BLOCK_SIZE;
    fit(input.to_vec(), len, 0)
}

/// Equality that does not stop at the first differing byte.
pub(crate) fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub(crate) fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut out = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut out)
        .map_err(|e| OoxmlError::Io(std::io::Error::other(format!("random source: {e}"))))?;
    Ok(out)
}

fn bad_length(what: &str, len: usize) -> OoxmlError {
    OoxmlError::InvalidFormat(format!("{} of {} bytes is not usable with AES", what, len))
}

/// AES-CBC decryption in place without padding; `buf` must be block aligned.
pub(crate) fn aes_cbc_decrypt(key: &[u8], iv: &[u8], buf: &mut [u8]) -> Result<()> {
    if buf.len() % AES_BLOCK_SIZE != 0 {
        return Err(bad_length("ciphertext", buf.len()));
    }
    let len = buf.len();
    let decrypted = match key.len() {
        16 => cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(|_| bad_length("key or IV", key.len()))?
            .decrypt_padded_mut::<NoPadding>(buf)
            .is_ok(),
        24 => cbc::Decryptor::<Aes192>::new_from_slices(key, iv)
            .map_err(|_| bad_length("key or IV", key.len()))?
            .decrypt_padded_mut::<NoPadding>(buf)
            .is_ok(),
        32 => cbc::Decryptor::<Aes256>::new_from_slices(key, iv)
            .map_err(|_| bad_length("key or IV", key.len()))?
            .decrypt_padded_mut::<NoPadding>(buf)
            .is_ok(),
        n => return Err(bad_length("key", n)),
    };
    if !decrypted {
        return Err(bad_length("ciphertext", len));
    }
    Ok(())
}

/// AES-CBC encryption without padding; `plain` must be block aligned.
pub(crate) fn aes_cbc_encrypt(key: &[u8], iv: &[u8], plain: &[u8]) -> Result<Vec<u8>> {
    if plain.len() % AES_BLOCK_SIZE != 0 {
        return Err(bad_length("plaintext", plain.len()));
    }
    let out = match key.len() {
        16 => cbc::Encryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(|_| bad_length("key or IV", key.len()))?
            .encrypt_padded_vec_mut::<NoPadding>(plain),
        24 => cbc::Encryptor::<Aes192>::new_from_slices(key, iv)
            .map_err(|_| bad_length("key or IV", key.len()))?
            .encrypt_padded_vec_mut::<NoPadding>(plain),
        32 => cbc::Encryptor::<Aes256>::new_from_slices(key, iv)
            .map_err(|_| bad_length("key or IV", key.len()))?
            .encrypt_padded_vec_mut::<NoPadding>(plain),
        n => return Err(bad_length("key", n)),
    };
    Ok(out)
}

/// AES-ECB decryption in place; `buf` must be block aligned.
pub(crate) fn aes_ecb_decrypt(key: &[u8], buf: &mut [u8]) -> Result<()> {
    fn run<C: BlockDecrypt + KeyInit>(key: &[u8], buf: &mut [u8]) -> Result<()> {
        let cipher = C::new_from_slice(key).map_err(|_| bad_length("key", key.len()))?;
        for block in buf.chunks_mut(AES_BLOCK_SIZE) {
            cipher.decrypt_block(GenericArray::from_mut_slice(block));
        }
        Ok(())
    }
    if buf.len() % AES_BLOCK_SIZE != 0 {
        return Err(bad_length("ciphertext", buf.len()));
    }
    match key.len() {
        16 => run::<Aes128>(key, buf),
        24 => run::<Aes192>(key, buf),
        32 => run::<Aes256>(key, buf),
        n => Err(bad_length("key", n)),
    }
}

/// AES-ECB encryption in place; `buf` must be block aligned.
pub(crate) fn aes_ecb_encrypt(key: &[u8], buf: &mut [u8]) -> Result<()> {
    fn run<C: BlockEncrypt + KeyInit>(key: &[u8], buf: &mut [u8]) -> Result<()> {
        let cipher = C::new_from_slice(key).map_err(|_| bad_length("key", key.len()))?;
        for block in buf.chunks_mut(AES_BLOCK_SIZE) {
            cipher.encrypt_block(GenericArray::from_mut_slice(block));
        }
        Ok(())
    }
    if buf.len() % AES_BLOCK_SIZE != 0 {
        return Err(bad_length("plaintext", buf.len()));
    }
    match key.len() {
        16 => run::<Aes128>(key, buf),
        24 => run::<Aes192>(key, buf),
        32 => run::<Aes256>(key, buf),
        n => Err(bad_length("key", n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_lengths_match() {
        for alg in [
            HashAlgorithm::Sha1,
            HashAlgorithm::Sha256,
            HashAlgorithm::Sha384,
            HashAlgorithm::Sha512,
        ] {
            assert_eq!(alg.digest(&[b"abc"]).len(), alg.output_len());
            assert_eq!(HashAlgorithm::from_name(alg.name()).unwrap(), alg);
        }
        assert!(matches!(
            HashAlgorithm::from_name("MD5"),
            Err(OoxmlError::UnsupportedEncryption(_))
        ));
    }

    #[test]
    fn digest_concatenates_parts() {
        let alg = HashAlgorithm::Sha256;
        assert_eq!(alg.digest(&[b"ab", b"c"]), alg.digest(&[b"abc"]));
    }

    #[test]
    fn cbc_and_ecb_roundtrip_for_every_key_size() {
        let plain: Vec<u8> = (0u8..64).collect();
        let iv = [7u8; 16];
        for key_len in [16, 24, 32] {
            let key = vec![0x42u8; key_len];
            let mut buf = aes_cbc_encrypt(&key, &iv, &plain).unwrap();
            assert_ne!(buf, plain);
            aes_cbc_decrypt(&key, &iv, &mut buf).unwrap();
            assert_eq!(buf, plain);

            let mut buf = plain.clone();
            aes_ecb_encrypt(&key, &mut buf).unwrap();
            aes_ecb_decrypt(&key, &mut buf).unwrap();
            assert_eq!(buf, plain);
        }
        assert!(aes_cbc_decrypt(&[0u8; 16], &iv, &mut [0u8; 15]).is_err());
        assert!(aes_ecb_decrypt(&[0u8; 20], &mut [0u8; 16]).is_err());
    }

    #[test]
    fn helpers() {
        assert_eq!(password_to_utf16le("Ab"), [0x41, 0, 0x62, 0]);
        assert_eq!(fit(vec![1, 2], 4, 0x36), [1, 2, 0x36, 0x36]);
        assert_eq!(fit(vec![1, 2, 3], 2, 0x36), [1, 2]);
        assert_eq!(pad_to_block(&[1u8; 20]).len(), 32);
        assert_eq!(pad_to_block(&[]).len(), 16);
        assert!(ct_eq(b"abc", b"abc"));
        assert!(!ct_eq(b"abc", b"abd"));
        assert!(!ct_eq(b"abc", b"ab"));
    }
}
