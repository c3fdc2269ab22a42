//! Clique runtime: hosts one [`CliqueDist`] and connects it to the network,
//! the trust registry and a clock.
//!
//! All state lives in a single event-loop task. The public handle only pushes
//! requests into an unbounded queue, so [`Clique::check`] never blocks.
mod r#loop;
mod request;

use std::sync::Arc;

use gpa::{KeyPair, PublicKey};
use gpa_metrics::{Counter, Gauge};
use gpa_peering::{
    NetworkProvider, PeeringId, TrustedNetworkManager, PEER_MESSAGE_RECEIVER_CLIQUE,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{warn, Instrument};

use crate::config::CliqueConfig;
use crate::dist::CliqueDist;
use crate::error::CliqueError;

pub use request::{CheckCallback, CheckContext, LinkMatrix, LinkResult};

use r#loop::EventLoop;
use request::CheckRequest;

/// Message type of connectivity-check traffic under the Clique peering id.
pub const MSG_TYPE_CLIQUE_CHECKER: u8 = 0;

/// Name hashed into the peering id. There is one checker per node.
pub const CLIQUE_PEERING_NAME: &str = "CliqueChecker";

// ── Metrics ───────────────────────────────────────────────────────────

/// Counters describing runtime activity.
#[derive(Debug, Default, Serialize)]
pub struct RuntimeMetrics {
    pub checks_requested: Counter,
    pub checks_completed: Counter,
    pub checks_expired: Counter,
    pub messages_sent: Counter,
    pub messages_dropped: Counter,
    pub messages_received: Counter,
    pub messages_malformed: Counter,
    pub pending_requests: Gauge,
}

/// Plain copy of [`RuntimeMetrics`] at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeMetricsSnapshot {
    pub checks_requested: u64,
    pub checks_completed: u64,
    pub checks_expired: u64,
    pub messages_sent: u64,
    pub messages_dropped: u64,
    pub messages_received: u64,
    pub messages_malformed: u64,
    pub pending_requests: i64,
}

impl RuntimeMetrics {
    pub fn snapshot(&self) -> RuntimeMetricsSnapshot {
        RuntimeMetricsSnapshot {
            checks_requested: self.checks_requested.get(),
            checks_completed: self.checks_completed.get(),
            checks_expired: self.checks_expired.get(),
            messages_sent: self.messages_sent.get(),
            messages_dropped: self.messages_dropped.get(),
            messages_received: self.messages_received.get(),
            messages_malformed: self.messages_malformed.get(),
            pending_requests: self.pending_requests.get(),
        }
    }
}

// ── Handle ────────────────────────────────────────────────────────────

/// Checks connectivity between sets of nodes. A clique is a fully connected
/// subgraph.
///
/// The event loop runs until `cancel` (given to [`Clique::new`]) fires;
/// dropping the handle does not stop it.
#[derive(Clone)]
pub struct Clique {
    request_tx: mpsc::UnboundedSender<CheckRequest>,
    config: CliqueConfig,
    metrics: Arc<RuntimeMetrics>,
}

impl Clique {
    /// Attach to `net`, subscribe to `trust` and spawn the event loop on the
    /// current tokio runtime.
    pub fn new(
        cancel: CancellationToken,
        identity: KeyPair,
        net: Arc<dyn NetworkProvider>,
        trust: Arc<dyn TrustedNetworkManager>,
        config: CliqueConfig,
    ) -> Result<Self, CliqueError> {
        config.validate()?;
        let metrics = Arc::new(RuntimeMetrics::default());
        let peering_id = PeeringId::from_name(CLIQUE_PEERING_NAME);
        let me = identity.public_key();

        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (trusted_tx, trusted_rx) = mpsc::unbounded_channel();
        let (net_tx, net_rx) = mpsc::unbounded_channel();

        let attach_id = net.attach(
            peering_id,
            PEER_MESSAGE_RECEIVER_CLIQUE,
            Box::new(move |recv| {
                if recv.message.msg_type != MSG_TYPE_CLIQUE_CHECKER {
                    warn!(msg_type = recv.message.msg_type, "unexpected message type, dropping");
                    return;
                }
                let _ = net_tx.send(recv);
            }),
        );
        let trust_listener = trust.trusted_peers_listener(Box::new(move |peers| {
            let _ = trusted_tx.send(peers);
        }));

        let dist = CliqueDist::new(identity, Instant::now().into_std());
        let event_loop = EventLoop::new(dist, net, peering_id, Arc::clone(&metrics));
        let span = tracing::info_span!("clique", node = %me.short_string());
        tokio::spawn(
            event_loop
                .run(
                    r#loop::Inbound {
                        requests: request_rx,
                        trusted: trusted_rx,
                        net: net_rx,
                    },
                    attach_id,
                    trust_listener,
                    config.time_tick,
                    cancel,
                )
                .instrument(span),
        );

        Ok(Self {
            request_tx,
            config,
            metrics,
        })
    }

    /// Check the links between every pair of `nodes`. Returns immediately.
    ///
    /// The timeout is the time left until `ctx`'s deadline, or the
    /// configured default. `callback` runs exactly once on the event-loop
    /// task: with the collected results, or with an all-unknown matrix if
    /// `ctx` is cancelled or expires first or the runtime is stopped.
    pub fn check(
        &self,
        ctx: &CheckContext,
        nodes: Vec<PublicKey>,
        callback: impl FnOnce(LinkMatrix) + Send + 'static,
    ) {
        let now = Instant::now();
        let timeout = match ctx.deadline() {
            Some(deadline) => deadline.saturating_duration_since(now),
            None => self.config.default_timeout,
        };
        self.metrics.checks_requested.inc();
        let request = CheckRequest {
            ctx: ctx.clone(),
            nodes,
            started: now,
            timeout,
            callback: Box::new(callback),
        };
        if let Err(mpsc::error::SendError(request)) = self.request_tx.send(request) {
            warn!("event loop has stopped, check abandoned");
            self.metrics.checks_expired.inc();
            request.complete(&[]);
        }
    }

    /// [`Clique::check`] as a future.
    pub async fn check_async(&self, ctx: &CheckContext, nodes: Vec<PublicKey>) -> LinkMatrix {
        let (tx, rx) = oneshot::channel();
        let fallback = LinkMatrix::unknown(&nodes);
        self.check(ctx, nodes, move |matrix| {
            let _ = tx.send(matrix);
        });
        rx.await.unwrap_or(fallback)
    }

    pub fn metrics(&self) -> &Arc<RuntimeMetrics> {
        &self.metrics
    }

    pub fn config(&self) -> &CliqueConfig {
        &self.config
    }
}
