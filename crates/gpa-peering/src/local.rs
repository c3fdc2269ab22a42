//! In-memory transport and trust registry.
//!
//! Every node gets its own [`LocalNetworkProvider`] from one shared
//! [`LocalNetwork`]. Sends are delivered synchronously to the recipient's
//! attached handlers. Nodes can be silenced to simulate crashed peers.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use gpa::PublicKey;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::PeeringError;
use crate::traits::{
    ListenerHandle, MessageHandler, NetworkProvider, TrustedNetworkManager, TrustedPeersCallback,
};
use crate::types::{AttachId, PeerMessageData, PeerMessageIn, PeeringId, TrustedPeer};

struct Attachment {
    owner: PublicKey,
    peering_id: PeeringId,
    receiver: u8,
    handler: Arc<MessageHandler>,
}

#[derive(Default)]
struct NetworkState {
    attachments: HashMap<AttachId, Attachment>,
    next_attach_id: u64,
    silenced: HashSet<PublicKey>,
    sent: u64,
    delivered: u64,
    dropped: u64,
}

/// Shared in-memory network.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Transport endpoint for the node owning `me`.
    pub fn provider(&self, me: PublicKey) -> LocalNetworkProvider {
        LocalNetworkProvider {
            me,
            net: self.clone(),
        }
    }

    /// Messages from and to `node` are dropped from now on.
    pub fn silence(&self, node: PublicKey) {
        self.lock().silenced.insert(node);
    }

    pub fn unsilence(&self, node: &PublicKey) {
        self.lock().silenced.remove(node);
    }

    pub fn sent_count(&self) -> u64 {
        self.lock().sent
    }

    pub fn delivered_count(&self) -> u64 {
        self.lock().delivered
    }

    pub fn dropped_count(&self) -> u64 {
        self.lock().dropped
    }

    pub fn attachment_count(&self) -> usize {
        self.lock().attachments.len()
    }

    fn deliver(&self, from: PublicKey, to: &PublicKey, msg: PeerMessageData) -> Result<(), PeeringError> {
        let handlers: Vec<Arc<MessageHandler>> = {
            let mut state = self.lock();
            state.sent += 1;
            if state.silenced.contains(&from) || state.silenced.contains(to) {
                state.dropped += 1;
                trace!(from = %from.short_string(), to = %to.short_string(), "silenced, dropping");
                return Ok(());
            }
            let handlers: Vec<_> = state
                .attachments
                .values()
                .filter(|a| {
                    a.owner == *to && a.peering_id == msg.peering_id && a.receiver == msg.receiver
                })
                .map(|a| Arc::clone(&a.handler))
                .collect();
            if handlers.is_empty() {
                state.dropped += 1;
                return Err(PeeringError::NoReceiver(*to));
            }
            state.delivered += 1;
            handlers
        };
        // Handlers run without the lock held: they may send in turn.
        for handler in handlers {
            handler(PeerMessageIn {
                sender_pub_key: from,
                message: msg.clone(),
            });
        }
        Ok(())
    }
}

/// One node's view of a [`LocalNetwork`].
#[derive(Clone)]
pub struct LocalNetworkProvider {
    me: PublicKey,
    net: LocalNetwork,
}

impl LocalNetworkProvider {
    pub fn pub_key(&self) -> PublicKey {
        self.me
    }
}

#[async_trait::async_trait]
impl NetworkProvider for LocalNetworkProvider {
    fn attach(&self, peering_id: PeeringId, receiver: u8, handler: MessageHandler) -> AttachId {
        let mut state = self.net.lock();
        let id = AttachId(state.next_attach_id);
        state.next_attach_id += 1;
        state.attachments.insert(
            id,
            Attachment {
                owner: self.me,
                peering_id,
                receiver,
                handler: Arc::new(handler),
            },
        );
        id
    }

    fn detach(&self, attach_id: AttachId) {
        self.net.lock().attachments.remove(&attach_id);
    }

    async fn send_by_pub_key(
        &self,
        to: &PublicKey,
        msg: PeerMessageData,
    ) -> Result<(), PeeringError> {
        self.net.deliver(self.me, to, msg)
    }
}

struct Listener {
    token: CancellationToken,
    callback: Arc<TrustedPeersCallback>,
}

#[derive(Default)]
struct TrustState {
    peers: BTreeMap<PublicKey, TrustedPeer>,
    listeners: Vec<Listener>,
}

/// Mutable trusted-peer registry.
#[derive(Clone, Default)]
pub struct LocalTrustManager {
    state: Arc<Mutex<TrustState>>,
}

impl LocalTrustManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_peers(peers: impl IntoIterator<Item = TrustedPeer>) -> Self {
        let mgr = Self::new();
        {
            let mut state = mgr.lock();
            for peer in peers {
                state.peers.insert(peer.pub_key, peer);
            }
        }
        mgr
    }

    fn lock(&self) -> MutexGuard<'_, TrustState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn trust_peer(&self, pub_key: PublicKey, name: impl Into<String>) {
        self.lock()
            .peers
            .insert(pub_key, TrustedPeer::new(pub_key, name));
        self.notify();
    }

    pub fn distrust_peer(&self, pub_key: &PublicKey) {
        let removed = self.lock().peers.remove(pub_key).is_some();
        if removed {
            self.notify();
        }
    }

    fn notify(&self) {
        let (peers, callbacks) = {
            let mut state = self.lock();
            state.listeners.retain(|l| !l.token.is_cancelled());
            let peers: Vec<TrustedPeer> = state.peers.values().cloned().collect();
            let callbacks: Vec<_> = state
                .listeners
                .iter()
                .map(|l| Arc::clone(&l.callback))
                .collect();
            (peers, callbacks)
        };
        for callback in callbacks {
            callback(peers.clone());
        }
    }
}

impl TrustedNetworkManager for LocalTrustManager {
    fn trusted_peers(&self) -> Vec<TrustedPeer> {
        self.lock().peers.values().cloned().collect()
    }

    fn trusted_peers_listener(&self, callback: TrustedPeersCallback) -> ListenerHandle {
        let token = CancellationToken::new();
        let callback = Arc::new(callback);
        let peers = {
            let mut state = self.lock();
            state.listeners.push(Listener {
                token: token.clone(),
                callback: Arc::clone(&callback),
            });
            state.peers.values().cloned().collect()
        };
        callback(peers);
        ListenerHandle::new(token)
    }
}
