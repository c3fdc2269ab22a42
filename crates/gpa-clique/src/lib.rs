//! Peer connectivity check.
//!
//! [`dist`] is the protocol itself: a [`gpa::Gpa`] state machine that
//! verifies pairwise links among a set of peers through a two-level
//! query/response tree, tolerating silent and untrusted peers.
//! [`runtime`] hosts it on tokio, wired to a [`gpa_peering::NetworkProvider`]
//! and a [`gpa_peering::TrustedNetworkManager`].
//!
//! Wire format: little-endian, one-byte message tag (`0x00` query,
//! `0x01` response). Link statuses carry Ed25519 signatures.

pub mod config;
pub mod dist;
pub mod error;
pub mod runtime;

pub use config::CliqueConfig;
pub use dist::{CliqueDist, CliqueInput, CliqueMessage, LinkFailure, LinkStatus, SessionId};
pub use error::CliqueError;
pub use runtime::{
    CheckContext, Clique, LinkMatrix, LinkResult, RuntimeMetrics, RuntimeMetricsSnapshot,
    MSG_TYPE_CLIQUE_CHECKER,
};
