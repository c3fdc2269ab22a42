//! 32-byte hash values used as session and peering identifiers.

use std::fmt;

use sha2::{Digest, Sha256};

/// Length of a [`HashValue`] in bytes.
pub const HASH_SIZE: usize = 32;

/// A 32-byte SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct HashValue([u8; HASH_SIZE]);

impl HashValue {
    pub const fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    /// Hash arbitrary data.
    pub fn hash_data(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// A uniformly random value. Not a digest of anything.
    pub fn random() -> Self {
        Self(rand::random())
    }

    /// Hash of this value's own bytes. Used to derive a fresh identifier
    /// when a candidate collides with one already in use.
    pub fn rehash(&self) -> Self {
        Self::hash_data(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// First 4 bytes as hex, for log lines.
    pub fn short_string(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl AsRef<[u8]> for HashValue {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for HashValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for HashValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashValue({}...)", self.short_string())
    }
}

impl serde::Serialize for HashValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for HashValue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut bytes = [0u8; HASH_SIZE];
        hex::decode_to_slice(&s, &mut bytes).map_err(serde::de::Error::custom)?;
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(HashValue::hash_data(b"abc"), HashValue::hash_data(b"abc"));
        assert_ne!(HashValue::hash_data(b"abc"), HashValue::hash_data(b"abd"));
    }

    #[test]
    fn known_sha256_vector() {
        let h = HashValue::hash_data(b"abc");
        assert_eq!(
            h.to_string(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn rehash_changes_value() {
        let h = HashValue::hash_data(&[0]);
        assert_ne!(h, h.rehash());
        assert_eq!(h.rehash(), HashValue::hash_data(h.as_bytes()));
    }

    #[test]
    fn random_values_differ() {
        assert_ne!(HashValue::random(), HashValue::random());
    }
}
