//! Generic protocol actors.
//!
//! A [`Gpa`] is a per-node state machine driven by local inputs and inbound
//! messages. It returns the messages it wants sent as [`OutMessages`] and
//! leaves transport, timers and trust policy to whoever hosts it.
//!
//! Wire format: little-endian fixed-width fields ([`WireWriter`],
//! [`WireReader`]), leading one-byte message tag.
//! Identity: Ed25519 keys, `NodeId = SHA-256(public key)`.

pub mod actor;
pub mod envelope;
pub mod error;
pub mod hashing;
pub mod keys;
pub mod node_id;
pub mod out_messages;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod wire;

pub use actor::Gpa;
pub use envelope::{Envelope, Message};
pub use error::GpaError;
pub use hashing::{HashValue, HASH_SIZE};
pub use keys::{KeyPair, PublicKey, Signature, PUBLIC_KEY_SIZE, SIGNATURE_SIZE};
pub use node_id::NodeId;
pub use out_messages::OutMessages;
pub use wire::{WireReader, WireWriter};
