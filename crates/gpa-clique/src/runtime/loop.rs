//! The Clique event loop.
//!
//! A single task owns the state machine, the pending requests and the trust
//! snapshot. It multiplexes over every input source plus cancellation.
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use gpa::{Gpa, Message, NodeId, OutMessages, PublicKey};
use gpa_peering::{
    AttachId, ListenerHandle, NetworkProvider, PeerMessageData, PeerMessageIn, PeeringId,
    TrustedPeer, PEER_MESSAGE_RECEIVER_CLIQUE,
};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::request::CheckRequest;
use super::{RuntimeMetrics, MSG_TYPE_CLIQUE_CHECKER};
use crate::dist::{CliqueDist, CliqueInput, CliqueMessage, LinkStatus, SessionId};

type Completion = (SessionId, Vec<LinkStatus>);

/// Queues feeding the loop from other tasks.
pub(super) struct Inbound {
    pub(super) requests: mpsc::UnboundedReceiver<CheckRequest>,
    pub(super) trusted: mpsc::UnboundedReceiver<Vec<TrustedPeer>>,
    pub(super) net: mpsc::UnboundedReceiver<PeerMessageIn>,
}

pub(super) struct EventLoop {
    dist: CliqueDist,
    net: Arc<dyn NetworkProvider>,
    peering_id: PeeringId,
    peer_pubs: BTreeMap<NodeId, PublicKey>,
    /// Keyed by the session id the request was started with.
    requests: HashMap<SessionId, CheckRequest>,
    done_tx: mpsc::UnboundedSender<Completion>,
    done_rx: mpsc::UnboundedReceiver<Completion>,
    metrics: Arc<RuntimeMetrics>,
}

impl EventLoop {
    pub(super) fn new(
        dist: CliqueDist,
        net: Arc<dyn NetworkProvider>,
        peering_id: PeeringId,
        metrics: Arc<RuntimeMetrics>,
    ) -> Self {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        Self {
            dist,
            net,
            peering_id,
            peer_pubs: BTreeMap::new(),
            requests: HashMap::new(),
            done_tx,
            done_rx,
            metrics,
        }
    }

    pub(super) async fn run(
        mut self,
        mut inbound: Inbound,
        attach_id: AttachId,
        trust_listener: ListenerHandle,
        time_tick: Duration,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(time_tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the immediate first tick
        ticker.tick().await;

        info!("clique runtime started");
        loop {
            tokio::select! {
                // Trust updates are applied before any queued request.
                biased;

                _ = cancel.cancelled() => {
                    self.net.detach(attach_id);
                    trust_listener.cancel();
                    let abandoned = self.abandon_pending(&mut inbound.requests);
                    info!(abandoned, "clique runtime stopped");
                    return;
                }

                // ── 1. Trust updates ────────────────────────────────
                Some(peers) = inbound.trusted.recv() => {
                    self.handle_trusted(peers).await;
                }

                // ── 2. Time ─────────────────────────────────────────
                now = ticker.tick() => {
                    self.handle_tick(now).await;
                }

                // ── 3. Sessions finished by the state machine ───────
                Some(done) = self.done_rx.recv() => {
                    self.handle_done(done);
                }

                // ── 4. Network messages ─────────────────────────────
                Some(recv) = inbound.net.recv() => {
                    self.handle_net_message(recv).await;
                }

                // ── 5. Local check requests ─────────────────────────
                Some(request) = inbound.requests.recv() => {
                    self.handle_request(request).await;
                }
            }
        }
    }

    async fn handle_request(&mut self, request: CheckRequest) {
        let mut session_id = SessionId::random();
        while self.requests.contains_key(&session_id) {
            session_id = session_id.rehash();
        }
        debug!(
            session = %session_id.short_string(),
            nodes = request.nodes.len(),
            timeout = ?request.timeout,
            "check requested"
        );
        let done_tx = self.done_tx.clone();
        let input = CliqueInput::check(
            session_id,
            request.nodes.clone(),
            request.timeout,
            move |_, statuses| {
                let _ = done_tx.send((session_id, statuses));
            },
        );
        self.requests.insert(session_id, request);
        self.metrics.pending_requests.inc();
        let out = self.dist.input(input);
        self.send_messages(out).await;
    }

    async fn handle_trusted(&mut self, peers: Vec<TrustedPeer>) {
        self.peer_pubs = peers
            .iter()
            .map(|p| (NodeId::from_public_key(&p.pub_key), p.pub_key))
            .collect();
        debug!(trusted = self.peer_pubs.len(), "trusted peers updated");
        let out = self
            .dist
            .input(CliqueInput::TrustedPeers(self.peer_pubs.clone()));
        self.send_messages(out).await;
    }

    async fn handle_net_message(&mut self, recv: PeerMessageIn) {
        self.metrics.messages_received.inc();
        let mut msg = match self.dist.unmarshal_message(&recv.message.msg_data) {
            Ok(msg) => msg,
            Err(e) => {
                self.metrics.messages_malformed.inc();
                warn!(from = %recv.sender_pub_key.short_string(), "cannot parse message: {e}");
                return;
            }
        };
        msg.set_sender(NodeId::from_public_key(&recv.sender_pub_key));
        let out = self.dist.message(msg);
        self.send_messages(out).await;
    }

    fn handle_done(&mut self, (session_id, statuses): Completion) {
        match self.requests.remove(&session_id) {
            Some(request) => {
                debug!(
                    session = %session_id.short_string(),
                    statuses = statuses.len(),
                    elapsed = ?request.started.elapsed(),
                    "check completed"
                );
                self.metrics.pending_requests.dec();
                self.metrics.checks_completed.inc();
                request.complete(&statuses);
            }
            None => {
                debug!(session = %session_id.short_string(), "result for an abandoned check");
            }
        }
    }

    async fn handle_tick(&mut self, now: Instant) {
        let out = self.dist.input(CliqueInput::time_tick(now.into_std()));
        self.send_messages(out).await;

        // Results produced by this tick win over context expiry.
        while let Ok(done) = self.done_rx.try_recv() {
            self.handle_done(done);
        }

        let expired: Vec<SessionId> = self
            .requests
            .iter()
            .filter(|(_, r)| r.ctx.is_done(now))
            .map(|(id, _)| *id)
            .collect();
        for session_id in expired {
            if let Some(request) = self.requests.remove(&session_id) {
                debug!(session = %session_id.short_string(), "caller gave up, reporting unknown");
                self.metrics.pending_requests.dec();
                self.metrics.checks_expired.inc();
                request.complete(&[]);
            }
        }
    }

    /// Complete every pending and queued check with an unknown matrix.
    /// Returns how many were completed.
    fn abandon_pending(&mut self, queued: &mut mpsc::UnboundedReceiver<CheckRequest>) -> usize {
        // Later `Clique::check` calls now fail to send and complete inline.
        queued.close();
        let mut abandoned = 0;
        for (_, request) in self.requests.drain() {
            self.metrics.pending_requests.dec();
            self.metrics.checks_expired.inc();
            request.complete(&[]);
            abandoned += 1;
        }
        while let Ok(request) = queued.try_recv() {
            self.metrics.checks_expired.inc();
            request.complete(&[]);
            abandoned += 1;
        }
        abandoned
    }

    async fn send_messages(&mut self, out: OutMessages<CliqueMessage>) {
        for msg in out {
            let data = match msg.marshal_binary() {
                Ok(data) => data,
                Err(e) => {
                    self.metrics.messages_dropped.inc();
                    warn!("failed to marshal message: {e}");
                    continue;
                }
            };
            let recipient = msg.recipient();
            let Some(pub_key) = self.peer_pubs.get(&recipient).copied() else {
                self.metrics.messages_dropped.inc();
                warn!(to = ?recipient, "dropping message, public key not known");
                continue;
            };
            let pm = PeerMessageData {
                peering_id: self.peering_id,
                receiver: PEER_MESSAGE_RECEIVER_CLIQUE,
                msg_type: MSG_TYPE_CLIQUE_CHECKER,
                msg_data: data,
            };
            match self.net.send_by_pub_key(&pub_key, pm).await {
                Ok(()) => self.metrics.messages_sent.inc(),
                Err(e) => {
                    self.metrics.messages_dropped.inc();
                    debug!(to = ?recipient, "send failed: {e}");
                }
            }
        }
    }
}
