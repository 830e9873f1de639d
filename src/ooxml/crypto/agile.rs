//! Agile encryption (EncryptionInfo version 4.4).
//!
//! The descriptor is an XML document naming independent parameters for the
//! package key (`keyData`) and for the password key encryptor. The package
//! is encrypted in 4096-byte segments, each with its own IV.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::primitives::{
    AES_BLOCK_SIZE, HashAlgorithm, aes_cbc_decrypt, aes_cbc_encrypt, ct_eq, fit, iterated_hash,
    pad_to_block, random_bytes,
};
use super::SEGMENT_LEN;
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::constants::namespace;

pub(crate) const VERSION_MAJOR: u16 = 4;
pub(crate) const VERSION_MINOR: u16 = 4;
const FLAGS: u32 = 0x0000_0040;

const BLOCK_VERIFIER_INPUT: [u8; 8] = [0xfe, 0xa7, 0xd2, 0x76, 0x3b, 0x4b, 0x9e, 0x79];
const BLOCK_VERIFIER_VALUE: [u8; 8] = [0xd7, 0xaa, 0x0f, 0x6d, 0x30, 0x61, 0x34, 0x4e];
const BLOCK_KEY_VALUE: [u8; 8] = [0x14, 0x6e, 0x0b, 0xe7, 0xab, 0xac, 0xd0, 0xd6];
const BLOCK_INTEGRITY_KEY: [u8; 8] = [0x5f, 0xb2, 0xad, 0x01, 0x0c, 0xb9, 0xe1, 0xf6];
const BLOCK_INTEGRITY_VALUE: [u8; 8] = [0xa0, 0x67, 0x7f, 0x02, 0xb2, 0x2c, 0x84, 0x33];

/// Parameters of the package key (`keyData`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeyData {
    pub salt: Vec<u8>,
    pub hash: HashAlgorithm,
    pub block_size: usize,
    pub key_bits: usize,
}

/// The password key encryptor (`p:encryptedKey`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PasswordKey {
    pub spin_count: u32,
    pub salt: Vec<u8>,
    pub hash: HashAlgorithm,
    pub block_size: usize,
    pub key_bits: usize,
    pub encrypted_verifier_input: Vec<u8>,
    pub encrypted_verifier_value: Vec<u8>,
    pub encrypted_key_value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DataIntegrity {
    pub encrypted_hmac_key: Vec<u8>,
    pub encrypted_hmac_value: Vec<u8>,
}

/// Parsed Agile descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AgileInfo {
    pub key_data: KeyData,
    pub password: PasswordKey,
    pub integrity: Option<DataIntegrity>,
}

fn block_key(alg: HashAlgorithm, hash: &[u8], block: &[u8], key_len: usize) -> Vec<u8> {
    fit(alg.digest(&[hash, block]), key_len, 0x36)
}

/// IV for segment `index` of the package stream.
pub(crate) fn segment_iv(key_data: &KeyData, index: u32) -> Vec<u8> {
    fit(
        key_data.hash.digest(&[&key_data.salt, &index.to_le_bytes()]),
        key_data.block_size,
        0x36,
    )
}

fn integrity_iv(key_data: &KeyData, block: &[u8]) -> Vec<u8> {
    fit(key_data.hash.digest(&[&key_data.salt, block]), key_data.block_size, 0x36)
}

/// Decrypt the package key, verifying the password first.
pub(crate) fn secret_key(info: &AgileInfo, password: &str) -> Result<Vec<u8>> {
    let pk = &info.password;
    if pk.key_bits == 0 || pk.key_bits % 8 != 0 {
        return Err(OoxmlError::UnsupportedEncryption(format!(
            "password key of {} bits",
            pk.key_bits
        )));
    }
    let key_len = pk.key_bits / 8;
    let iv = fit(pk.salt.clone(), pk.block_size, 0x36);
    let hash = iterated_hash(pk.hash, &pk.salt, password, pk.spin_count);

    let decrypt = |block: &[u8], data: &[u8]| -> Result<Vec<u8>> {
        let mut buf = data.to_vec();
        aes_cbc_decrypt(&block_key(pk.hash, &hash, block, key_len), &iv, &mut buf)?;
        Ok(buf)
    };

    let verifier_input = decrypt(&BLOCK_VERIFIER_INPUT, &pk.encrypted_verifier_input)?;
    let verifier_value = decrypt(&BLOCK_VERIFIER_VALUE, &pk.encrypted_verifier_value)?;
    let salt_len = pk.salt.len().min(verifier_input.len());
    let expected = pk.hash.digest(&[&verifier_input[..salt_len]]);
    let matches = verifier_value
        .get(..expected.len())
        .is_some_and(|actual| ct_eq(actual, &expected));
    if !matches {
        return Err(OoxmlError::InvalidPassword);
    }

    let key = decrypt(&BLOCK_KEY_VALUE, &pk.encrypted_key_value)?;
    let package_key_len = info.key_data.key_bits / 8;
    key.get(..package_key_len)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| OoxmlError::CorruptArchive("encryptedKeyValue is truncated".to_string()))
}

/// Check the HMAC over the whole `EncryptedPackage` stream.
pub(crate) fn verify_integrity(info: &AgileInfo, key: &[u8], package_stream: &[u8]) -> Result<()> {
    let integrity = info.integrity.as_ref().ok_or_else(|| {
        OoxmlError::CorruptArchive("descriptor has no dataIntegrity element".to_string())
    })?;
    let kd = &info.key_data;
    let hash_len = kd.hash.output_len();

    let mut hmac_key = integrity.encrypted_hmac_key.clone();
    aes_cbc_decrypt(key, &integrity_iv(kd, &BLOCK_INTEGRITY_KEY), &mut hmac_key)?;
    let mut hmac_value = integrity.encrypted_hmac_value.clone();
    aes_cbc_decrypt(key, &integrity_iv(kd, &BLOCK_INTEGRITY_VALUE), &mut hmac_value)?;
    if hmac_key.len() < hash_len || hmac_value.len() < hash_len {
        return Err(OoxmlError::CorruptArchive("dataIntegrity values are truncated".to_string()));
    }

    let computed = kd.hash.hmac(&hmac_key[..hash_len], package_stream)?;
    if !ct_eq(&computed, &hmac_value[..hash_len]) {
        return Err(OoxmlError::CorruptArchive(
            "EncryptedPackage failed its integrity check".to_string(),
        ));
    }
    log::debug!("agile data integrity verified");
    Ok(())
}

/// Decrypt one segment in place.
pub(crate) fn decrypt_segment(
    key_data: &KeyData,
    key: &[u8],
    index: u32,
    segment: &mut [u8],
) -> Result<()> {
    aes_cbc_decrypt(key, &segment_iv(key_data, index), segment)
}

/// Settings for writing: AES-256 with SHA-512 throughout.
fn write_params(spin_count: u32) -> Result<(KeyData, PasswordKey)> {
    let key_data = KeyData {
        salt: random_bytes(16)?,
        hash: HashAlgorithm::Sha512,
        block_size: AES_BLOCK_SIZE,
        key_bits: 256,
    };
    let password = PasswordKey {
        spin_count,
        salt: random_bytes(16)?,
        hash: HashAlgorithm::Sha512,
        block_size: AES_BLOCK_SIZE,
        key_bits: 256,
        encrypted_verifier_input: Vec::new(),
        encrypted_verifier_value: Vec::new(),
        encrypted_key_value: Vec::new(),
    };
    Ok((key_data, password))
}

/// Encrypt a plaintext package. Returns the `EncryptionInfo` and
/// `EncryptedPackage` stream contents.
pub(crate) fn encrypt(plain: &[u8], password: &str, spin_count: u32) -> Result<(Vec<u8>, Vec<u8>)> {
    let (key_data, mut pk) = write_params(spin_count)?;
    let key_len = key_data.key_bits / 8;
    let package_key = random_bytes(key_len)?;

    // Password key encryptor
    let hash = iterated_hash(pk.hash, &pk.salt, password, pk.spin_count);
    let iv = fit(pk.salt.clone(), pk.block_size, 0x36);
    let pk_key_len = pk.key_bits / 8;
    let verifier_input = random_bytes(pk.salt.len())?;
    let verifier_value = pk.hash.digest(&[&verifier_input]);
    pk.encrypted_verifier_input = aes_cbc_encrypt(
        &block_key(pk.hash, &hash, &BLOCK_VERIFIER_INPUT, pk_key_len),
        &iv,
        &pad_to_block(&verifier_input),
    )?;
    pk.encrypted_verifier_value = aes_cbc_encrypt(
        &block_key(pk.hash, &hash, &BLOCK_VERIFIER_VALUE, pk_key_len),
        &iv,
        &pad_to_block(&verifier_value),
    )?;
    pk.encrypted_key_value = aes_cbc_encrypt(
        &block_key(pk.hash, &hash, &BLOCK_KEY_VALUE, pk_key_len),
        &iv,
        &pad_to_block(&package_key),
    )?;

    // Package stream: plaintext length, then segments
    let mut stream = Vec::with_capacity(8 + plain.len() + AES_BLOCK_SIZE);
    stream.extend_from_slice(&(plain.len() as u64).to_le_bytes());
    for (index, chunk) in plain.chunks(SEGMENT_LEN).enumerate() {
        let iv = segment_iv(&key_data, index as u32);
        stream.extend_from_slice(&aes_cbc_encrypt(&package_key, &iv, &pad_to_block(chunk))?);
    }

    // Data integrity
    let hash_len = key_data.hash.output_len();
    let hmac_key = random_bytes(hash_len)?;
    let hmac_value = key_data.hash.hmac(&hmac_key, &stream)?;
    let integrity = DataIntegrity {
        encrypted_hmac_key: aes_cbc_encrypt(
            &package_key,
            &integrity_iv(&key_data, &BLOCK_INTEGRITY_KEY),
            &pad_to_block(&hmac_key),
        )?,
        encrypted_hmac_value: aes_cbc_encrypt(
            &package_key,
            &integrity_iv(&key_data, &BLOCK_INTEGRITY_VALUE),
            &pad_to_block(&hmac_value),
        )?,
    };

    let info = AgileInfo {
        key_data,
        password: pk,
        integrity: Some(integrity),
    };
    let xml = info.to_xml();
    let mut encryption_info = Vec::with_capacity(8 + xml.len());
    encryption_info.extend_from_slice(&VERSION_MAJOR.to_le_bytes());
    encryption_info.extend_from_slice(&VERSION_MINOR.to_le_bytes());
    encryption_info.extend_from_slice(&FLAGS.to_le_bytes());
    encryption_info.extend_from_slice(xml.as_bytes());

    Ok((encryption_info, stream))
}

fn b64(bytes: &[u8]) -> String {
    BASE64_STANDARD.encode(bytes)
}

impl AgileInfo {
    fn to_xml(&self) -> String {
        let kd = &self.key_data;
        let pk = &self.password;
        let integrity = self
            .integrity
            .as_ref()
            .map(|d| {
                format!(
                    r#"<dataIntegrity encryptedHmacKey="{}" encryptedHmacValue="{}"/>"#,
                    b64(&d.encrypted_hmac_key),
                    b64(&d.encrypted_hmac_value)
                )
            })
            .unwrap_or_default();

        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                "\r\n",
                r#"<encryption xmlns="{ns}" xmlns:p="{pns}">"#,
                r#"<keyData saltSize="{kd_salt_len}" blockSize="{kd_block}" keyBits="{kd_bits}" hashSize="{kd_hash_len}" cipherAlgorithm="AES" cipherChaining="ChainingModeCBC" hashAlgorithm="{kd_hash}" saltValue="{kd_salt}"/>"#,
                "{integrity}",
                r#"<keyEncryptors><keyEncryptor uri="{pns}">"#,
                r#"<p:encryptedKey spinCount="{spin}" saltSize="{pk_salt_len}" blockSize="{pk_block}" keyBits="{pk_bits}" hashSize="{pk_hash_len}" cipherAlgorithm="AES" cipherChaining="ChainingModeCBC" hashAlgorithm="{pk_hash}" saltValue="{pk_salt}" encryptedVerifierHashInput="{vin}" encryptedVerifierHashValue="{vval}" encryptedKeyValue="{kval}"/>"#,
                "</keyEncryptor></keyEncryptors></encryption>"
            ),
            ns = namespace::ENCRYPTION,
            pns = namespace::PASSWORD_KEY_ENCRYPTOR,
            kd_salt_len = kd.salt.len(),
            kd_block = kd.block_size,
            kd_bits = kd.key_bits,
            kd_hash_len = kd.hash.output_len(),
            kd_hash = kd.hash.name(),
            kd_salt = b64(&kd.salt),
            integrity = integrity,
            spin = pk.spin_count,
            pk_salt_len = pk.salt.len(),
            pk_block = pk.block_size,
            pk_bits = pk.key_bits,
            pk_hash_len = pk.hash.output_len(),
            pk_hash = pk.hash.name(),
            pk_salt = b64(&pk.salt),
            vin = b64(&pk.encrypted_verifier_input),
            vval = b64(&pk.encrypted_verifier_value),
            kval = b64(&pk.encrypted_key_value),
        )
    }

    /// Parse the XML that follows the 8-byte version header.
    pub(crate) fn parse(xml: &[u8]) -> Result<Self> {
        let xml = std::str::from_utf8(xml)
            .map_err(|_| OoxmlError::CorruptArchive("Agile descriptor is not UTF-8".to_string()))?;
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();

        let mut key_data = None;
        let mut password = None;
        let mut integrity = None;
        let mut in_password_encryptor = false;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                    b"keyData" => key_data = Some(parse_key_data(e)?),
                    b"dataIntegrity" => {
                        let attrs = Attrs::collect(e)?;
                        integrity = Some(DataIntegrity {
                            encrypted_hmac_key: attrs.base64("encryptedHmacKey")?,
                            encrypted_hmac_value: attrs.base64("encryptedHmacValue")?,
                        });
                    },
                    b"keyEncryptor" => {
                        let attrs = Attrs::collect(e)?;
                        in_password_encryptor =
                            attrs.get("uri") == Some(namespace::PASSWORD_KEY_ENCRYPTOR);
                    },
                    b"encryptedKey" if in_password_encryptor && password.is_none() => {
                        password = Some(parse_password_key(e)?);
                    },
                    _ => {},
                },
                Event::End(ref e) if e.local_name().as_ref() == b"keyEncryptor" => {
                    in_password_encryptor = false;
                },
                Event::Eof => break,
                _ => {},
            }
            buf.clear();
        }

        let key_data = key_data
            .ok_or_else(|| OoxmlError::CorruptArchive("Agile descriptor lacks keyData".into()))?;
        let password = password.ok_or_else(|| {
            OoxmlError::UnsupportedEncryption("no password key encryptor".to_string())
        })?;
        Ok(AgileInfo {
            key_data,
            password,
            integrity,
        })
    }
}

/// Attributes of one element as owned strings.
struct Attrs(Vec<(String, String)>);

impl Attrs {
    fn collect(e: &BytesStart<'_>) -> Result<Self> {
        let mut out = Vec::new();
        for attr in e.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            out.push((key, attr.unescape_value()?.into_owned()));
        }
        Ok(Attrs(out))
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn required(&self, name: &str) -> Result<&str> {
        self.get(name).ok_or_else(|| {
            OoxmlError::CorruptArchive(format!("Agile descriptor lacks attribute {}", name))
        })
    }

    fn number(&self, name: &str) -> Result<usize> {
        let value = self.required(name)?;
        atoi_simd::parse::<usize, false, false>(value.trim().as_bytes()).map_err(|_| {
            OoxmlError::CorruptArchive(format!("attribute {}=\"{}\" is not a number", name, value))
        })
    }

    fn base64(&self, name: &str) -> Result<Vec<u8>> {
        let value: String = self
            .required(name)?
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        BASE64_STANDARD.decode(value).map_err(|_| {
            OoxmlError::CorruptArchive(format!("attribute {} is not valid base64", name))
        })
    }

    fn cipher(&self) -> Result<()> {
        let cipher = self.required("cipherAlgorithm")?;
        if !cipher.eq_ignore_ascii_case("AES") {
            return Err(OoxmlError::UnsupportedEncryption(format!("cipher {}", cipher)));
        }
        match self.get("cipherChaining") {
            None | Some("ChainingModeCBC") => Ok(()),
            Some(other) => Err(OoxmlError::UnsupportedEncryption(format!("chaining {}", other))),
        }
    }
}

fn parse_key_data(e: &BytesStart<'_>) -> Result<KeyData> {
    let attrs = Attrs::collect(e)?;
    attrs.cipher()?;
    Ok(KeyData {
        salt: attrs.base64("saltValue")?,
        hash: HashAlgorithm::from_name(attrs.required("hashAlgorithm")?)?,
        block_size: attrs.number("blockSize")?,
        key_bits: attrs.number("keyBits")?,
    })
}

fn parse_password_key(e: &BytesStart<'_>) -> Result<PasswordKey> {
    let attrs = Attrs::collect(e)?;
    attrs.cipher()?;
    let spin_count = u32::try_from(attrs.number("spinCount")?)
        .map_err(|_| OoxmlError::CorruptArchive("spinCount out of range".to_string()))?;
    Ok(PasswordKey {
        spin_count,
        salt: attrs.base64("saltValue")?,
        hash: HashAlgorithm::from_name(attrs.required("hashAlgorithm")?)?,
        block_size: attrs.number("blockSize")?,
        key_bits: attrs.number("keyBits")?,
        encrypted_verifier_input: attrs.base64("encryptedVerifierHashInput")?,
        encrypted_verifier_value: attrs.base64("encryptedVerifierHashValue")?,
        encrypted_key_value: attrs.base64("encryptedKeyValue")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(encryption_info: &[u8]) -> AgileInfo {
        assert_eq!(&encryption_info[..4], &[4, 0, 4, 0]);
        AgileInfo::parse(&encryption_info[8..]).unwrap()
    }

    #[test]
    fn descriptor_roundtrips_through_xml() {
        let (info, _) = encrypt(b"PK\x03\x04 payload", "pw", 10).unwrap();
        let parsed = descriptor(&info);
        assert_eq!(parsed.password.spin_count, 10);
        assert_eq!(parsed.key_data.hash, HashAlgorithm::Sha512);
        assert_eq!(parsed.key_data.key_bits, 256);
        assert!(parsed.integrity.is_some());
        assert_eq!(AgileInfo::parse(parsed.to_xml().as_bytes()).unwrap(), parsed);
    }

    #[test]
    fn correct_password_recovers_package_key_and_data() {
        let plain: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let (info, stream) = encrypt(&plain, "secret", 5).unwrap();
        let info = descriptor(&info);

        let key = secret_key(&info, "secret").unwrap();
        assert_eq!(key.len(), 32);
        verify_integrity(&info, &key, &stream).unwrap();

        let declared = u64::from_le_bytes(stream[..8].try_into().unwrap()) as usize;
        assert_eq!(declared, plain.len());
        let mut out = Vec::new();
        for (i, chunk) in stream[8..].chunks(SEGMENT_LEN).enumerate() {
            let mut seg = chunk.to_vec();
            decrypt_segment(&info.key_data, &key, i as u32, &mut seg).unwrap();
            out.extend_from_slice(&seg);
        }
        out.truncate(declared);
        assert_eq!(out, plain);
    }

    #[test]
    fn wrong_password_is_rejected() {
        let (info, _) = encrypt(b"data", "right", 3).unwrap();
        let info = descriptor(&info);
        assert!(matches!(secret_key(&info, "wrong"), Err(OoxmlError::InvalidPassword)));
        assert!(matches!(secret_key(&info, ""), Err(OoxmlError::InvalidPassword)));
    }

    #[test]
    fn tampering_fails_integrity() {
        let (info, mut stream) = encrypt(&[7u8; 5000], "pw", 2).unwrap();
        let info = descriptor(&info);
        let key = secret_key(&info, "pw").unwrap();
        let last = stream.len() - 1;
        stream[last] ^= 1;
        assert!(matches!(
            verify_integrity(&info, &key, &stream),
            Err(OoxmlError::CorruptArchive(_))
        ));
    }

    #[test]
    fn sha1_aes128_descriptors_are_accepted() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<encryption xmlns="http://schemas.microsoft.com/office/2006/encryption" xmlns:p="http://schemas.microsoft.com/office/2006/keyEncryptor/password">
  <keyData saltSize="16" blockSize="16" keyBits="128" hashSize="20" cipherAlgorithm="AES" cipherChaining="ChainingModeCBC" hashAlgorithm="SHA1" saltValue="AAAAAAAAAAAAAAAAAAAAAA=="/>
  <keyEncryptors>
    <keyEncryptor uri="http://schemas.microsoft.com/office/2006/keyEncryptor/certificate">
      <c:encryptedKey xmlns:c="http://schemas.microsoft.com/office/2006/keyEncryptor/certificate" encryptedKeyValue="AA=="/>
    </keyEncryptor>
    <keyEncryptor uri="http://schemas.microsoft.com/office/2006/keyEncryptor/password">
      <p:encryptedKey spinCount="100000" saltSize="16" blockSize="16" keyBits="128" hashSize="20" cipherAlgorithm="AES" cipherChaining="ChainingModeCBC" hashAlgorithm="SHA1" saltValue="AQEBAQEBAQEBAQEBAQEBAQ==" encryptedVerifierHashInput="AAAAAAAAAAAAAAAAAAAAAA==" encryptedVerifierHashValue="AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=" encryptedKeyValue="AAAAAAAAAAAAAAAAAAAAAA=="/>
    </keyEncryptor>
  </keyEncryptors>
</encryption>"#;
        let info = AgileInfo::parse(xml.as_bytes()).unwrap();
        assert_eq!(info.key_data.hash, HashAlgorithm::Sha1);
        assert_eq!(info.password.key_bits, 128);
        assert_eq!(info.password.salt, vec![1u8; 16]);
        assert!(info.integrity.is_none());
    }

    #[test]
    fn unknown_cipher_is_unsupported() {
        let xml = r#"<encryption><keyData saltSize="16" blockSize="8" keyBits="168" cipherAlgorithm="3DES" hashAlgorithm="SHA1" saltValue="AA=="/></encryption>"#;
        assert!(matches!(
            AgileInfo::parse(xml.as_bytes()),
            Err(OoxmlError::UnsupportedEncryption(_))
        ));
    }
}
