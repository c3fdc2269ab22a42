use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use gpa::{NodeId, PublicKey};

use super::link_status::LinkStatus;
use super::SessionId;

/// Completion hook of a locally initiated check. Called once, with the id the
/// session actually ran under and every link status gathered for it.
pub type Callback = Box<dyn FnOnce(SessionId, Vec<LinkStatus>) + Send>;

/// Local events driving a [`super::CliqueDist`].
pub enum CliqueInput {
    /// Start a check over `nodes` with this node as the root.
    Check {
        session_id: SessionId,
        nodes: Vec<PublicKey>,
        timeout: Duration,
        callback: Callback,
    },
    /// The clock moved on.
    TimeTick(Instant),
    /// New trusted-peer set, replacing the previous one.
    TrustedPeers(BTreeMap<NodeId, PublicKey>),
}

impl CliqueInput {
    pub fn check(
        session_id: SessionId,
        nodes: Vec<PublicKey>,
        timeout: Duration,
        callback: impl FnOnce(SessionId, Vec<LinkStatus>) + Send + 'static,
    ) -> Self {
        Self::Check {
            session_id,
            nodes,
            timeout,
            callback: Box::new(callback),
        }
    }

    pub fn time_tick(now: Instant) -> Self {
        Self::TimeTick(now)
    }

    pub fn trusted_peers(peers: impl IntoIterator<Item = PublicKey>) -> Self {
        Self::TrustedPeers(
            peers
                .into_iter()
                .map(|pk| (NodeId::from_public_key(&pk), pk))
                .collect(),
        )
    }
}

impl fmt::Debug for CliqueInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Check {
                session_id,
                nodes,
                timeout,
                ..
            } => f
                .debug_struct("Check")
                .field("session_id", session_id)
                .field("nodes", &nodes.len())
                .field("timeout", timeout)
                .finish_non_exhaustive(),
            Self::TimeTick(now) => f.debug_tuple("TimeTick").field(now).finish(),
            Self::TrustedPeers(peers) => f.debug_tuple("TrustedPeers").field(&peers.len()).finish(),
        }
    }
}
