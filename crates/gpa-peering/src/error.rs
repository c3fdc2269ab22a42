use gpa::PublicKey;

/// Transport and trust-registry errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeeringError {
    #[error("no receiver attached at peer {0:?}")]
    NoReceiver(PublicKey),

    #[error("peer {0:?} is unreachable")]
    Unreachable(PublicKey),

    #[error("send failed: {0}")]
    SendFailed(String),
}
