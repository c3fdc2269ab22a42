//! Ed25519 identities.
//!
//! A [`KeyPair`] is a node's signing identity; a [`PublicKey`] identifies a
//! peer on the wire (32 raw bytes) and verifies its statements.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};

use crate::error::GpaError;

pub use ed25519_dalek::Signature;

/// Length of a serialized [`PublicKey`].
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Length of a serialized [`Signature`].
pub const SIGNATURE_SIZE: usize = 64;

/// An Ed25519 public key.
#[derive(Clone, Copy)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Parse 32 raw bytes. Fails if they are not a valid curve point.
    pub fn from_bytes(bytes: &[u8; PUBLIC_KEY_SIZE]) -> Result<Self, GpaError> {
        VerifyingKey::from_bytes(bytes)
            .map(Self)
            .map_err(|_| GpaError::InvalidPublicKey)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        self.0.as_bytes()
    }

    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0.to_bytes()
    }

    /// Strict Ed25519 verification (rejects non-canonical signatures).
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        self.0.verify_strict(message, signature).is_ok()
    }

    /// First 4 bytes as hex, for log lines.
    pub fn short_string(&self) -> String {
        hex::encode(&self.as_bytes()[..4])
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for PublicKey {}

impl Hash for PublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl PartialOrd for PublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PublicKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.as_bytes()))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}...)", self.short_string())
    }
}

impl FromStr for PublicKey {
    type Err = GpaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; PUBLIC_KEY_SIZE];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| GpaError::InvalidPublicKey)?;
        Self::from_bytes(&bytes)
    }
}

impl serde::Serialize for PublicKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for PublicKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// An Ed25519 signing identity.
#[derive(Clone)]
pub struct KeyPair {
    signing: SigningKey,
}

impl KeyPair {
    /// Fresh key pair from a random seed.
    pub fn generate() -> Self {
        Self::from_seed(&rand::random())
    }

    /// Deterministic key pair from a 32-byte secret seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing.verifying_key())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing.sign(message)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public_key())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair(seed: u8) -> KeyPair {
        KeyPair::from_seed(&[seed; 32])
    }

    #[test]
    fn sign_and_verify() {
        let kp = keypair(1);
        let sig = kp.sign(b"hello");
        assert!(kp.public_key().verify(b"hello", &sig));
        assert!(!kp.public_key().verify(b"hellO", &sig));
        assert!(!keypair(2).public_key().verify(b"hello", &sig));
    }

    #[test]
    fn public_key_bytes_roundtrip() {
        let pk = keypair(3).public_key();
        let parsed = PublicKey::from_bytes(&pk.to_bytes()).unwrap();
        assert_eq!(pk, parsed);
    }

    #[test]
    fn public_key_hex_and_serde() {
        let pk = keypair(4).public_key();
        let parsed: PublicKey = pk.to_string().parse().unwrap();
        assert_eq!(pk, parsed);

        let json = serde_json::to_string(&pk).unwrap();
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(pk, back);
    }

    #[test]
    fn bad_hex_is_rejected() {
        assert!("zz".parse::<PublicKey>().is_err());
        assert!("abcd".parse::<PublicKey>().is_err());
    }

    #[test]
    fn generated_keys_differ() {
        assert_ne!(KeyPair::generate().public_key(), KeyPair::generate().public_key());
    }

    #[test]
    fn debug_hides_secret() {
        let dbg = format!("{:?}", keypair(5));
        assert!(dbg.starts_with("KeyPair { public: PublicKey("));
    }
}
