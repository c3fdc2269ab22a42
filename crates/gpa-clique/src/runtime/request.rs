use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use gpa::PublicKey;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::dist::{LinkFailure, LinkStatus};

/// Completion hook of [`super::Clique::check`].
pub type CheckCallback = Box<dyn FnOnce(LinkMatrix) + Send>;

/// Deadline and cancellation of one check, as seen by the caller.
#[derive(Debug, Clone, Default)]
pub struct CheckContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl CheckContext {
    /// No deadline; the runtime's default timeout applies.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancel: CancellationToken::new(),
        }
    }

    /// Same deadline, cancelled together with `parent`.
    pub fn child_of(&self, parent: &CancellationToken) -> Self {
        Self {
            deadline: self.deadline,
            cancel: parent.child_token(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancelled, or past the deadline.
    pub fn is_done(&self, now: Instant) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| d <= now)
    }
}

/// A check waiting for its result. Owned by the event loop.
pub(crate) struct CheckRequest {
    pub(crate) ctx: CheckContext,
    pub(crate) nodes: Vec<PublicKey>,
    pub(crate) started: Instant,
    pub(crate) timeout: Duration,
    pub(crate) callback: CheckCallback,
}

impl CheckRequest {
    /// Deliver the result. Consumes the request, so it happens at most once.
    pub(crate) fn complete(self, statuses: &[LinkStatus]) {
        let matrix = LinkMatrix::collect(&self.nodes, statuses);
        (self.callback)(matrix);
    }
}

impl fmt::Debug for CheckRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckRequest")
            .field("nodes", &self.nodes.len())
            .field("started", &self.started)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

pub type LinkResult = Result<(), LinkFailure>;

/// Health of every ordered pair of the checked nodes: `src -> dst -> result`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkMatrix {
    links: BTreeMap<PublicKey, BTreeMap<PublicKey, LinkResult>>,
}

impl LinkMatrix {
    /// Build the full matrix over `nodes` from the statuses a check
    /// produced.
    ///
    /// A reported failure is kept as is. A positive status for `src -> dst`
    /// also counts for `dst -> src` unless that direction was reported on
    /// its own. A node's link to itself is fine if the node shows up in any
    /// status. Everything else is [`LinkFailure::Unknown`].
    pub fn collect(nodes: &[PublicKey], statuses: &[LinkStatus]) -> Self {
        let mut direct: BTreeMap<(PublicKey, PublicKey), LinkResult> = BTreeMap::new();
        let mut seen: BTreeSet<PublicKey> = BTreeSet::new();
        for ls in statuses {
            let (src, dst) = (*ls.src_pub_key(), *ls.dst_pub_key());
            seen.insert(src);
            seen.insert(dst);
            let result = match ls.failure() {
                None => Ok(()),
                Some(reason) => Err(reason.clone()),
            };
            // A failure beats a positive report for the same pair.
            let entry = direct.entry((src, dst)).or_insert(Ok(()));
            if entry.is_ok() {
                *entry = result;
            }
        }

        let implied: Vec<(PublicKey, PublicKey)> = direct
            .iter()
            .filter(|(_, r)| r.is_ok())
            .map(|((src, dst), _)| (*dst, *src))
            .filter(|pair| !direct.contains_key(pair))
            .collect();
        let mut reported = direct;
        for pair in implied {
            reported.insert(pair, Ok(()));
        }

        let mut links = BTreeMap::new();
        for src in nodes {
            let row: &mut BTreeMap<PublicKey, LinkResult> = links.entry(*src).or_default();
            for dst in nodes {
                let result = if src == dst && seen.contains(src) {
                    Ok(())
                } else {
                    reported
                        .get(&(*src, *dst))
                        .cloned()
                        .unwrap_or(Err(LinkFailure::Unknown))
                };
                row.insert(*dst, result);
            }
        }
        Self { links }
    }

    /// All pairs unknown. Used when a check is abandoned.
    pub fn unknown(nodes: &[PublicKey]) -> Self {
        Self::collect(nodes, &[])
    }

    pub fn get(&self, src: &PublicKey, dst: &PublicKey) -> Option<&LinkResult> {
        self.links.get(src).and_then(|row| row.get(dst))
    }

    pub fn row(&self, src: &PublicKey) -> Option<&BTreeMap<PublicKey, LinkResult>> {
        self.links.get(src)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PublicKey, &PublicKey, &LinkResult)> {
        self.links
            .iter()
            .flat_map(|(src, row)| row.iter().map(move |(dst, r)| (src, dst, r)))
    }

    /// Number of ordered pairs.
    pub fn len(&self) -> usize {
        self.links.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_healthy(&self) -> bool {
        self.iter().all(|(_, _, r)| r.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&PublicKey, &PublicKey, &LinkFailure)> {
        self.iter()
            .filter_map(|(src, dst, r)| r.as_ref().err().map(|e| (src, dst, e)))
    }
}
