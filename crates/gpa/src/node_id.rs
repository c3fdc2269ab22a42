use std::fmt;

use crate::hashing::{HashValue, HASH_SIZE};
use crate::keys::PublicKey;

/// Identity of a protocol participant, derived from its public key.
///
/// `NodeId::from_public_key` is a pure function: the same key always yields the
/// same id, and distinct keys collide only with negligible probability.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId([u8; HASH_SIZE]);

impl NodeId {
    pub fn from_public_key(pub_key: &PublicKey) -> Self {
        Self(*HashValue::hash_data(pub_key.as_bytes()).as_bytes())
    }

    pub const fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// First 4 bytes as hex, for log lines.
    pub fn short_string(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl From<&PublicKey> for NodeId {
    fn from(pub_key: &PublicKey) -> Self {
        Self::from_public_key(pub_key)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}...)", self.short_string())
    }
}

impl serde::Serialize for NodeId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for NodeId {
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
    use crate::keys::KeyPair;

    #[test]
    fn derivation_is_pure() {
        let pk = KeyPair::from_seed(&[7; 32]).public_key();
        assert_eq!(NodeId::from_public_key(&pk), NodeId::from_public_key(&pk));
        assert_eq!(NodeId::from(&pk), NodeId::from_public_key(&pk));
    }

    #[test]
    fn distinct_keys_distinct_ids() {
        let a = KeyPair::from_seed(&[1; 32]).public_key();
        let b = KeyPair::from_seed(&[2; 32]).public_key();
        assert_ne!(NodeId::from_public_key(&a), NodeId::from_public_key(&b));
    }

    #[test]
    fn debug_is_short() {
        let id = NodeId::from_bytes([0xAB; 32]);
        assert_eq!(format!("{id:?}"), "NodeId(abababab...)");
    }

    #[test]
    fn serde_roundtrip() {
        let id = NodeId::from_public_key(&KeyPair::from_seed(&[9; 32]).public_key());
        let json = serde_json::to_string(&id).unwrap();
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
