use std::fmt;

use gpa::{HashValue, PublicKey};
use serde::{Deserialize, Serialize};

/// Receiver id of the connectivity checker. Receiver ids partition the
/// messages of one peering id between local components.
pub const PEER_MESSAGE_RECEIVER_CLIQUE: u8 = 1;

/// Identifies a group of nodes talking about one thing (a chain, a DKG run,
/// the connectivity checker, ...).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeeringId(HashValue);

impl PeeringId {
    pub const fn new(hash: HashValue) -> Self {
        Self(hash)
    }

    /// Peering id for a well-known service name: `SHA-256(name)`.
    pub fn from_name(name: &str) -> Self {
        Self(HashValue::hash_data(name.as_bytes()))
    }

    pub fn hash(&self) -> &HashValue {
        &self.0
    }
}

impl fmt::Display for PeeringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for PeeringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeeringId({}...)", self.0.short_string())
    }
}

/// Handle returned by [`crate::NetworkProvider::attach`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttachId(pub u64);

/// Outbound message as handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerMessageData {
    pub peering_id: PeeringId,
    pub receiver: u8,
    pub msg_type: u8,
    pub msg_data: Vec<u8>,
}

/// Inbound message, tagged with the authenticated sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerMessageIn {
    pub sender_pub_key: PublicKey,
    pub message: PeerMessageData,
}

/// Entry of the trusted-peer registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedPeer {
    pub pub_key: PublicKey,
    pub name: String,
}

impl TrustedPeer {
    pub fn new(pub_key: PublicKey, name: impl Into<String>) -> Self {
        Self {
            pub_key,
            name: name.into(),
        }
    }
}
