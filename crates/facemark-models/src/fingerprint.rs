//! Content fingerprint used as the result cache key.
//!
//! A fingerprint is the first [`FINGERPRINT_BYTES`] bytes of a SHA-256 digest
//! over the exact image bytes, lowercase hex encoded (32 characters). Hashing
//! itself lives in `facemark-media`; this type only carries and validates it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of digest bytes kept (128 bits).
pub const FINGERPRINT_BYTES: usize = 16;

/// Hex-encoded content fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Encode raw digest bytes, keeping only the first [`FINGERPRINT_BYTES`].
    pub fn from_digest(digest: &[u8]) -> Self {
        let hex = digest
            .iter()
            .take(FINGERPRINT_BYTES)
            .map(|b| format!("{:02x}", b))
            .collect();
        Self(hex)
    }

    /// Validate a fingerprint string (32 lowercase hex characters).
    pub fn parse(s: &str) -> Result<Self, FingerprintParseError> {
        let valid = s.len() == FINGERPRINT_BYTES * 2
            && s.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(FingerprintParseError(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = FingerprintParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.0
    }
}

#[derive(Debug, Error)]
#[error("Invalid fingerprint: {0}")]
pub struct FingerprintParseError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_digest_truncates() {
        let digest: Vec<u8> = (0u8..32).collect();
        let fp = Fingerprint::from_digest(&digest);
        assert_eq!(fp.as_str(), "000102030405060708090a0b0c0d0e0f");
        assert_eq!(fp.as_str().len(), 32);
    }

    #[test]
    fn test_parse_validation() {
        assert!(Fingerprint::parse("000102030405060708090a0b0c0d0e0f").is_ok());
        assert!(Fingerprint::parse("000102030405060708090A0B0C0D0E0F").is_err());
        assert!(Fingerprint::parse("abc").is_err());
        assert!(Fingerprint::parse("zz0102030405060708090a0b0c0d0e0f").is_err());
    }

    #[test]
    fn test_serde_is_transparent_string() {
        let fp = Fingerprint::parse("ffffffffffffffffffffffffffffffff").unwrap();
        let json = serde_json::to_string(&fp).unwrap();
        assert_eq!(json, r#""ffffffffffffffffffffffffffffffff""#);

        let bad: Result<Fingerprint, _> = serde_json::from_str(r#""nope""#);
        assert!(bad.is_err());
    }
}
