//! The tokio runtime driven over the in-memory network, with paused time.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gpa::KeyPair;
use gpa_clique::runtime::CLIQUE_PEERING_NAME;
use gpa_clique::{CheckContext, Clique, CliqueConfig, LinkFailure, LinkMatrix, MSG_TYPE_CLIQUE_CHECKER};
use gpa_peering::local::{LocalNetwork, LocalTrustManager};
use gpa_peering::{
    NetworkProvider, PeerMessageData, PeeringId, TrustedPeer, PEER_MESSAGE_RECEIVER_CLIQUE,
};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use common::{init_tracing, peers, pub_keys, Peer};

fn trust_all(peers: &[Peer]) -> LocalTrustManager {
    LocalTrustManager::with_peers(
        peers
            .iter()
            .enumerate()
            .map(|(i, p)| TrustedPeer::new(p.pub_key, format!("n{i}"))),
    )
}

fn start(
    net: &LocalNetwork,
    trust: &LocalTrustManager,
    peer: &Peer,
    cancel: &CancellationToken,
) -> Clique {
    Clique::new(
        cancel.child_token(),
        peer.key.clone(),
        Arc::new(net.provider(peer.pub_key)),
        Arc::new(trust.clone()),
        CliqueConfig::default(),
    )
    .expect("start clique")
}

/// Let the loops drain their queues without reaching the next tick.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn healthy_check_completes_before_first_tick() {
    init_tracing();
    let peers = peers(4);
    let pubs = pub_keys(&peers);
    let net = LocalNetwork::new();
    let trust = trust_all(&peers);
    let cancel = CancellationToken::new();
    let nodes: Vec<Clique> = peers
        .iter()
        .map(|p| start(&net, &trust, p, &cancel))
        .collect();

    let started = Instant::now();
    let matrix = nodes[0]
        .check_async(&CheckContext::with_timeout(Duration::from_secs(5)), pubs.clone())
        .await;
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(matrix.len(), 16);
    assert!(matrix.is_healthy(), "{:?}", matrix.failures().collect::<Vec<_>>());

    let snap = nodes[0].metrics().snapshot();
    assert_eq!(snap.checks_requested, 1);
    assert_eq!(snap.checks_completed, 1);
    assert_eq!(snap.pending_requests, 0);
    assert_eq!(snap.messages_sent, 3);
    assert_eq!(snap.messages_received, 3);
    cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn missing_node_reported_as_timeout() {
    init_tracing();
    let peers = peers(4);
    let pubs = pub_keys(&peers);
    let net = LocalNetwork::new();
    let trust = trust_all(&peers);
    let cancel = CancellationToken::new();
    // Node 3 is trusted but runs nothing.
    let nodes: Vec<Clique> = peers[..3]
        .iter()
        .map(|p| start(&net, &trust, p, &cancel))
        .collect();

    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let counter = Arc::clone(&calls);
    let started = Instant::now();
    nodes[0].check(
        &CheckContext::with_timeout(Duration::from_secs(5)),
        pubs.clone(),
        move |matrix| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(matrix);
        },
    );
    let matrix: LinkMatrix = rx.recv().await.expect("callback fired");
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(1), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(30), "{elapsed:?}");

    for a in &pubs[..3] {
        for b in &pubs[..3] {
            assert_eq!(matrix.get(a, b), Some(&Ok(())), "{} -> {}", a.short_string(), b.short_string());
        }
        assert_eq!(matrix.get(a, &pubs[3]), Some(&Err(LinkFailure::Timeout)));
    }

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let snap = nodes[0].metrics().snapshot();
    assert_eq!(snap.checks_completed, 1);
    assert_eq!(snap.checks_expired, 0);
    assert!(snap.messages_dropped >= 1);
    cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn cancelled_context_reports_unknown_once() {
    let peers = peers(3);
    let pubs = pub_keys(&peers);
    let net = LocalNetwork::new();
    let trust = trust_all(&peers);
    let cancel = CancellationToken::new();
    // Only node 0 runs, so the check cannot finish on its own early.
    let node = start(&net, &trust, &peers[0], &cancel);

    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let counter = Arc::clone(&calls);
    let ctx = CheckContext::with_timeout(Duration::from_secs(5));
    node.check(&ctx, pubs.clone(), move |matrix| {
        counter.fetch_add(1, Ordering::SeqCst);
        let _ = tx.send(matrix);
    });
    settle().await;
    ctx.cancel();

    let matrix = rx.recv().await.expect("callback fired");
    assert!(matrix
        .iter()
        .all(|(_, _, r)| r == &Err(LinkFailure::Unknown)));
    assert_eq!(node.metrics().snapshot().checks_expired, 1);

    // The state machine's own timeout later is swallowed.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let snap = node.metrics().snapshot();
    assert_eq!(snap.checks_completed, 0);
    assert_eq!(snap.pending_requests, 0);
    cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn stopping_runtime_completes_checks_in_flight() {
    let peers = peers(2);
    let pubs = pub_keys(&peers);
    let net = LocalNetwork::new();
    let trust = trust_all(&peers);
    let cancel = CancellationToken::new();
    // Node 1 runs nothing, so the check stays pending.
    let node = start(&net, &trust, &peers[0], &cancel);

    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let counter = Arc::clone(&calls);
    node.check(
        &CheckContext::with_timeout(Duration::from_secs(5)),
        pubs.clone(),
        move |matrix| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(matrix);
        },
    );
    settle().await;
    assert_eq!(node.metrics().snapshot().pending_requests, 1);

    cancel.cancel();
    let matrix = rx.recv().await.expect("callback fired on shutdown");
    assert_eq!(matrix, LinkMatrix::unknown(&pubs));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let snap = node.metrics().snapshot();
    assert_eq!(snap.checks_expired, 1);
    assert_eq!(snap.checks_completed, 0);
    assert_eq!(snap.pending_requests, 0);
}

#[tokio::test(start_paused = true)]
async fn stopped_runtime_detaches_and_answers_unknown() {
    let peers = peers(2);
    let pubs = pub_keys(&peers);
    let net = LocalNetwork::new();
    let trust = trust_all(&peers);
    let cancel = CancellationToken::new();
    let node = start(&net, &trust, &peers[0], &cancel);
    assert_eq!(net.attachment_count(), 1);

    cancel.cancel();
    settle().await;
    assert_eq!(net.attachment_count(), 0);

    let result = Arc::new(std::sync::Mutex::new(None));
    let slot = Arc::clone(&result);
    node.check(&CheckContext::new(), pubs.clone(), move |matrix| {
        *slot.lock().unwrap() = Some(matrix);
    });
    let matrix = result.lock().unwrap().take().expect("completed inline");
    assert_eq!(matrix, LinkMatrix::unknown(&pubs));
    assert_eq!(node.metrics().snapshot().checks_expired, 1);
}

#[tokio::test(start_paused = true)]
async fn foreign_and_malformed_traffic_is_dropped() {
    let peers = peers(2);
    let net = LocalNetwork::new();
    let trust = trust_all(&peers);
    let cancel = CancellationToken::new();
    let node = start(&net, &trust, &peers[0], &cancel);
    let outsider = net.provider(KeyPair::from_seed(&[99; 32]).public_key());
    let peering_id = PeeringId::from_name(CLIQUE_PEERING_NAME);

    outsider
        .send_by_pub_key(
            &peers[0].pub_key,
            PeerMessageData {
                peering_id,
                receiver: PEER_MESSAGE_RECEIVER_CLIQUE,
                msg_type: MSG_TYPE_CLIQUE_CHECKER + 7,
                msg_data: vec![0; 8],
            },
        )
        .await
        .expect("delivered to the handler");
    settle().await;
    assert_eq!(node.metrics().snapshot().messages_received, 0);

    outsider
        .send_by_pub_key(
            &peers[0].pub_key,
            PeerMessageData {
                peering_id,
                receiver: PEER_MESSAGE_RECEIVER_CLIQUE,
                msg_type: MSG_TYPE_CLIQUE_CHECKER,
                msg_data: vec![0x01, 0xff],
            },
        )
        .await
        .expect("delivered to the handler");
    settle().await;
    let snap = node.metrics().snapshot();
    assert_eq!(snap.messages_received, 1);
    assert_eq!(snap.messages_malformed, 1);
    cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn distrust_takes_effect_on_next_check() {
    let peers = peers(3);
    let pubs = pub_keys(&peers);
    let net = LocalNetwork::new();
    let shared = trust_all(&peers);
    let own = trust_all(&peers);
    let cancel = CancellationToken::new();
    let root = start(&net, &own, &peers[0], &cancel);
    let _others: Vec<Clique> = peers[1..]
        .iter()
        .map(|p| start(&net, &shared, p, &cancel))
        .collect();

    let ctx = CheckContext::with_timeout(Duration::from_secs(5));
    assert!(root.check_async(&ctx, pubs.clone()).await.is_healthy());

    own.distrust_peer(&pubs[2]);
    settle().await;
    let matrix = root
        .check_async(&CheckContext::with_timeout(Duration::from_secs(5)), pubs.clone())
        .await;
    assert_eq!(
        matrix.get(&pubs[0], &pubs[2]),
        Some(&Err(LinkFailure::NonTrusted))
    );
    assert_eq!(matrix.get(&pubs[0], &pubs[1]), Some(&Ok(())));
    assert_eq!(matrix.get(&pubs[1], &pubs[2]), Some(&Ok(())));
    cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn replies_never_go_to_untrusted_peers() {
    let peers = peers(3);
    let pubs = pub_keys(&peers);
    let net = LocalNetwork::new();
    let shared = trust_all(&peers);
    let picky = trust_all(&peers[1..]);
    let cancel = CancellationToken::new();
    let root = start(&net, &shared, &peers[0], &cancel);
    let _n1 = start(&net, &shared, &peers[1], &cancel);
    // Node 2 does not trust the root: it handles the root's query but has no
    // key to send the answer to.
    let n2 = start(&net, &picky, &peers[2], &cancel);

    let matrix = root
        .check_async(&CheckContext::with_timeout(Duration::from_secs(4)), pubs.clone())
        .await;
    assert_eq!(
        matrix.get(&pubs[0], &pubs[2]),
        Some(&Err(LinkFailure::Timeout))
    );
    assert_eq!(matrix.get(&pubs[0], &pubs[1]), Some(&Ok(())));
    assert_eq!(matrix.get(&pubs[1], &pubs[2]), Some(&Ok(())));

    let snap = n2.metrics().snapshot();
    assert!(snap.messages_received >= 1);
    assert!(snap.messages_dropped >= 1);
    cancel.cancel();
}
