//! Options for opening and saving workbook packages.

use std::fmt;

use serde::{Deserialize, Serialize};

#[cfg(feature = "ooxml_encryption")]
use crate::ooxml::crypto::{DEFAULT_SPIN_COUNT, EncryptionScheme};

#[cfg(not(feature = "ooxml_encryption"))]
const DEFAULT_SPIN_COUNT: u32 = 100_000;

/// DEFLATE level used when none is given.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// How a package is opened.
///
/// The password is never printed by the `Debug` implementation.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Password of an encrypted package. Without one, the empty password is
    /// tried, which opens packages that are only "protected for viewing".
    pub password: Option<String>,
    /// Fail on a CRC-32 mismatch instead of logging it and reading on
    pub verify_checksums: bool,
    /// Check the HMAC of Agile packages before decrypting
    pub verify_integrity: bool,
    /// Keep parts the engine does not interpret so they survive a save
    pub preserve_unknown_parts: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            password: None,
            verify_checksums: false,
            verify_integrity: false,
            preserve_unknown_parts: true,
        }
    }
}

impl LoadOptions {
    /// Create a new `LoadOptions` with default values.
    ///
    /// ```rust
    /// use loquat::ooxml::xlsx::LoadOptions;
    ///
    /// let options = LoadOptions::new().with_password("secret").with_verify_checksums(true);
    /// assert!(options.verify_checksums);
    /// assert!(options.preserve_unknown_parts);
    /// ```
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    pub fn with_verify_integrity(mut self, verify: bool) -> Self {
        self.verify_integrity = verify;
        self
    }

    pub fn with_preserve_unknown_parts(mut self, preserve: bool) -> Self {
        self.preserve_unknown_parts = preserve;
        self
    }
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("verify_checksums", &self.verify_checksums)
            .field("verify_integrity", &self.verify_integrity)
            .field("preserve_unknown_parts", &self.preserve_unknown_parts)
            .finish()
    }
}

/// How a package is written.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveOptions {
    /// Encrypt the finished package with this password
    pub password: Option<String>,
    #[cfg(feature = "ooxml_encryption")]
    pub encryption: EncryptionScheme,
    /// Hash iterations of the Agile key derivation
    pub spin_count: u32,
    /// DEFLATE level, 0 (store speed) to 9 (smallest)
    pub compression_level: u32,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            password: None,
            #[cfg(feature = "ooxml_encryption")]
            encryption: EncryptionScheme::default(),
            spin_count: DEFAULT_SPIN_COUNT,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl SaveOptions {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    #[cfg(feature = "ooxml_encryption")]
    pub fn with_encryption(mut self, scheme: EncryptionScheme) -> Self {
        self.encryption = scheme;
        self
    }

    /// Set the Agile spin count. Lower values save faster and protect less.
    pub fn with_spin_count(mut self, spin_count: u32) -> Self {
        self.spin_count = spin_count;
        self
    }

    /// Set the DEFLATE level; values above 9 are clamped.
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }
}

impl fmt::Debug for SaveOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("SaveOptions");
        s.field("password", &self.password.as_ref().map(|_| "<redacted>"));
        #[cfg(feature = "ooxml_encryption")]
        s.field("encryption", &self.encryption);
        s.field("spin_count", &self.spin_count)
            .field("compression_level", &self.compression_level)
            .finish()
    }
}
