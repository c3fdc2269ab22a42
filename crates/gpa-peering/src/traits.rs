use gpa::PublicKey;
use tokio_util::sync::CancellationToken;

use crate::error::PeeringError;
use crate::types::{AttachId, PeerMessageData, PeerMessageIn, PeeringId, TrustedPeer};

/// Sink for inbound messages. Called once per message, from the transport's
/// own task, so it must not block.
pub type MessageHandler = Box<dyn Fn(PeerMessageIn) + Send + Sync>;

/// Called with the full trusted-peer list.
pub type TrustedPeersCallback = Box<dyn Fn(Vec<TrustedPeer>) + Send + Sync>;

/// Byte transport between nodes addressed by public key.
///
/// Production: the node's peering layer.
/// Tests: [`crate::local::LocalNetwork`].
#[async_trait::async_trait]
pub trait NetworkProvider: Send + Sync {
    /// Register `handler` for messages with this peering id and receiver.
    fn attach(&self, peering_id: PeeringId, receiver: u8, handler: MessageHandler) -> AttachId;

    fn detach(&self, attach_id: AttachId);

    /// Best effort. A successful return does not mean the peer got it.
    async fn send_by_pub_key(
        &self,
        to: &PublicKey,
        msg: PeerMessageData,
    ) -> Result<(), PeeringError>;
}

/// Source of the trusted-peer list.
pub trait TrustedNetworkManager: Send + Sync {
    fn trusted_peers(&self) -> Vec<TrustedPeer>;

    /// Subscribe to trust changes. The callback runs once right away with the
    /// current list, then after every change, until the handle is cancelled.
    fn trusted_peers_listener(&self, callback: TrustedPeersCallback) -> ListenerHandle;
}

/// Subscription returned by [`TrustedNetworkManager::trusted_peers_listener`].
///
/// Dropping the handle does not unsubscribe; call [`ListenerHandle::cancel`].
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    token: CancellationToken,
}

impl ListenerHandle {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}
