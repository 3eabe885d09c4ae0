//! 128-bit content digests stored in the entry table.
//!
//! Every entry carries the MD5 of its exact data bytes.  MD5 is used as a
//! corruption check only; it is not a security boundary.

use std::fmt;
use std::str::FromStr;

use md5::{Digest, Md5};
use serde::{Serialize, Serializer};

/// Raw digest length on disk.
pub const HASH_LEN: usize = 16;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContentHash(pub [u8; HASH_LEN]);

impl ContentHash {
    pub const ZERO: ContentHash = ContentHash([0u8; HASH_LEN]);

    /// Digest `data`.
    pub fn of(data: &[u8]) -> Self {
        let digest = Md5::digest(data);
        let mut out = [0u8; HASH_LEN];
        out.copy_from_slice(&digest);
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn matches(&self, data: &[u8]) -> bool {
        Self::of(data) == *self
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; HASH_LEN]> for ContentHash {
    fn from(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl FromStr for ContentHash {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u8; HASH_LEN];
        hex::decode_to_slice(s, &mut out)?;
        Ok(Self(out))
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_md5_vectors() {
        assert_eq!(ContentHash::of(b"").to_hex(), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            ContentHash::of(b"Hello, World!").to_hex(),
            "65a8e27d8879283831b664bd8b7f0ad4"
        );
    }

    #[test]
    fn hex_parse_and_display_agree() {
        let h = ContentHash::of(b"abc");
        let parsed: ContentHash = h.to_string().parse().unwrap();
        assert_eq!(parsed, h);
        assert!("not-hex".parse::<ContentHash>().is_err());
        assert!("00".parse::<ContentHash>().is_err());
    }

    #[test]
    fn serializes_as_hex_string() {
        let json = serde_json::to_string(&ContentHash::of(b"")).unwrap();
        assert_eq!(json, "\"d41d8cd98f00b204e9800998ecf8427e\"");
    }
}
