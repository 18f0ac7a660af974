//! Content hashing
//!
//! Content-addressed records are identified by the SHA3-512 digest of their
//! canonical serialization.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_512};
use std::fmt;

/// SHA3-512 digest of a record's canonical bytes
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 64]);

impl ContentHash {
    /// Hash `bytes`
    pub fn of(bytes: &[u8]) -> Self {
        let digest = Sha3_512::digest(bytes);
        let mut out = [0u8; 64];
        out.copy_from_slice(&digest);
        ContentHash(out)
    }

    /// Raw digest
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Lowercase hex, as used in identity values
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse lowercase or uppercase hex
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let out: [u8; 64] = bytes.try_into().ok()?;
        Some(ContentHash(out))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..16])
    }
}

impl Serialize for ContentHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ContentHash::from_hex(&s).ok_or_else(|| serde::de::Error::custom("invalid SHA3-512 hex digest"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        // SHA3-512 of the empty string
        let hash = ContentHash::of(b"");
        assert!(hash.to_hex().starts_with("a69f73cca23a9ac5c8b567dc185a756e97c982164fe25859e0d1dcc1475c80a6"));
    }

    #[test]
    fn test_hex_round_trip() {
        let hash = ContentHash::of(b"{\"t_\":\"Blob\"}");
        assert_eq!(ContentHash::from_hex(&hash.to_hex()), Some(hash));
        assert_eq!(ContentHash::from_hex("abcd"), None);
        assert_eq!(hash.to_hex().len(), 128);
    }

    #[test]
    fn test_serde_as_hex() {
        let hash = ContentHash::of(b"x");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash.to_hex()));
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
