//! Peering interfaces for GPA runtimes.
//!
//! A runtime needs two collaborators: a [`NetworkProvider`] that moves opaque
//! byte messages between nodes identified by public key, and a
//! [`TrustedNetworkManager`] that tells it which peers are trusted. With the
//! `test-utils` feature this crate also ships in-memory implementations of
//! both ([`local::LocalNetwork`], [`local::LocalTrustManager`]).

pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod local;
pub mod traits;
pub mod types;

pub use error::PeeringError;
pub use traits::{
    ListenerHandle, MessageHandler, NetworkProvider, TrustedNetworkManager, TrustedPeersCallback,
};
pub use types::{
    AttachId, PeerMessageData, PeerMessageIn, PeeringId, TrustedPeer,
    PEER_MESSAGE_RECEIVER_CLIQUE,
};
