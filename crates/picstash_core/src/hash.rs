//! Content fingerprinting.

use picstash_error::{LibraryError, LibraryErrorKind};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// SHA-256 fingerprint of a blob's bytes, as 64 lowercase hex characters.
///
/// Two records with equal hashes are treated as holding identical bytes.
///
/// # Examples
///
/// ```
/// use picstash_core::ContentHash;
///
/// let a = ContentHash::compute(b"rubber chicken");
/// let b = ContentHash::compute(b"rubber chicken");
/// assert_eq!(a, b);
/// assert_eq!(a.as_str().len(), 64);
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl TryFrom<String> for ContentHash {
    type Error = LibraryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

impl ContentHash {
    /// Compute the fingerprint of `data`.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Accept an externally supplied fingerprint.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` unless the value is exactly 64 hex digits.
    pub fn parse(value: &str) -> Result<Self, LibraryError> {
        if value.len() != 64 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(LibraryError::new(LibraryErrorKind::InvalidInput(format!(
                "not a SHA-256 hex digest: {}",
                value
            ))));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
