use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};

use gpa::{KeyPair, NodeId, PublicKey};
use tracing::warn;

use super::input::Callback;
use super::link_status::{LinkFailure, LinkStatus};
use super::msg_query::MsgQuery;
use super::msg_response::MsgResponse;
use super::{SessionId, MAX_STEP_TIMEOUT};

/// Where a session's results go.
pub(crate) enum SessionRole {
    /// Started locally; results go to the callback.
    Root { callback: Option<Callback> },
    /// Started by a query; results go back to the querier.
    Intermediate { parent_pub: PublicKey, parent_id: NodeId },
}

/// Bookkeeping for one check round on this node.
pub(crate) struct Session {
    id: SessionId,
    me: NodeId,
    my_pub: PublicKey,
    role: SessionRole,
    started: Instant,
    timeout: Duration,
    node_pubs: Vec<PublicKey>,
    node_ids: HashMap<NodeId, PublicKey>,
    required: BTreeSet<NodeId>,
    collected: BTreeMap<NodeId, BTreeMap<NodeId, LinkStatus>>,
}

impl Session {
    /// Everyone in `node_pubs` except this node and the querier must answer.
    /// Untrusted peers are recorded as failed right away and never asked.
    pub(crate) fn new(
        id: SessionId,
        me: &KeyPair,
        role: SessionRole,
        now: Instant,
        timeout: Duration,
        node_pubs: Vec<PublicKey>,
        trusted: &BTreeMap<NodeId, PublicKey>,
    ) -> Self {
        let my_pub = me.public_key();
        let my_id = NodeId::from_public_key(&my_pub);
        let parent_id = match &role {
            SessionRole::Root { .. } => None,
            SessionRole::Intermediate { parent_id, .. } => Some(*parent_id),
        };
        let node_ids: HashMap<NodeId, PublicKey> = node_pubs
            .iter()
            .map(|pk| (NodeId::from_public_key(pk), *pk))
            .collect();

        let mut required = BTreeSet::new();
        let mut own = BTreeMap::new();
        for (node_id, pub_key) in &node_ids {
            if *node_id == my_id || Some(*node_id) == parent_id {
                continue;
            }
            if !trusted.contains_key(node_id) {
                own.insert(
                    *node_id,
                    LinkStatus::failed(&id, me, *pub_key, LinkFailure::NonTrusted),
                );
                continue;
            }
            required.insert(*node_id);
        }
        let mut collected = BTreeMap::new();
        collected.insert(my_id, own);

        Self {
            id,
            me: my_id,
            my_pub,
            role,
            started: now,
            timeout: timeout.min(MAX_STEP_TIMEOUT),
            node_pubs,
            node_ids,
            required,
            collected,
        }
    }

    pub(crate) fn id(&self) -> &SessionId {
        &self.id
    }

    pub(crate) fn is_root(&self) -> bool {
        matches!(self.role, SessionRole::Root { .. })
    }

    pub(crate) fn required_count(&self) -> usize {
        self.required.len()
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.required.is_empty()
    }

    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        self.started + self.timeout <= now
    }

    /// One query per required peer. The root asks each peer to check the
    /// whole set; intermediates only ask for the direct link.
    pub(crate) fn make_queries(&self) -> Vec<MsgQuery> {
        let sub_query = match self.role {
            SessionRole::Root { .. } => self.node_pubs.clone(),
            SessionRole::Intermediate { .. } => Vec::new(),
        };
        self.required
            .iter()
            .map(|node_id| {
                MsgQuery::new(
                    *node_id,
                    self.id,
                    self.my_pub,
                    sub_query.clone(),
                    self.timeout / 2,
                )
            })
            .collect()
    }

    /// Record a response from `sender`. Returns `false` if it was rejected.
    pub(crate) fn add_response(&mut self, sender: NodeId, msg: &MsgResponse) -> bool {
        let Some(sender_pub) = self.node_ids.get(&sender).copied() else {
            warn!(session = %self.id.short_string(), sender = ?sender, "response from a peer outside the session");
            return false;
        };
        if !self.required.contains(&sender) {
            warn!(session = %self.id.short_string(), sender = ?sender, "unsolicited response");
            return false;
        }
        let direct = msg.response();
        if *direct.src_pub_key() != self.my_pub {
            warn!(session = %self.id.short_string(), sender = ?sender, "response src is not us");
            return false;
        }
        if *direct.dst_pub_key() != sender_pub {
            warn!(session = %self.id.short_string(), sender = ?sender, "response dst is not the sender");
            return false;
        }
        if !direct.validate(&self.id) {
            warn!(session = %self.id.short_string(), sender = ?sender, "response signature invalid");
            return false;
        }
        self.required.remove(&sender);
        self.add_link_status(self.me, sender, direct.clone());

        for sub in msg.sub_responses() {
            if *sub.src_pub_key() != sender_pub {
                continue;
            }
            let dst = NodeId::from_public_key(sub.dst_pub_key());
            if !self.node_ids.contains_key(&dst) {
                continue;
            }
            if !sub.validate(&self.id) {
                continue;
            }
            self.add_link_status(sender, dst, sub.clone());
        }
        true
    }

    fn add_link_status(&mut self, src: NodeId, dst: NodeId, status: LinkStatus) {
        self.collected
            .entry(src)
            .or_default()
            .entry(dst)
            .or_insert(status);
    }

    /// Close the session. Peers still outstanding are reported as timed out.
    pub(crate) fn finish(self, me: &KeyPair) -> Finished {
        let mut statuses: Vec<LinkStatus> = self
            .required
            .iter()
            .filter_map(|node_id| self.node_ids.get(node_id))
            .map(|pk| LinkStatus::failed(&self.id, me, *pk, LinkFailure::Timeout))
            .collect();
        statuses.extend(self.collected.into_values().flat_map(BTreeMap::into_values));

        match self.role {
            SessionRole::Root { callback } => Finished::Root {
                session: self.id,
                callback,
                statuses,
            },
            SessionRole::Intermediate {
                parent_pub,
                parent_id,
            } => Finished::Intermediate(MsgResponse::new(
                parent_id,
                self.id,
                LinkStatus::ok(&self.id, parent_pub, me),
                statuses,
            )),
        }
    }

    pub(crate) fn status_string(&self) -> String {
        format!(
            "{{session {}, root: {}, |required|: {}}}",
            self.id.short_string(),
            self.is_root(),
            self.required.len()
        )
    }
}

/// Result of [`Session::finish`].
pub(crate) enum Finished {
    Root {
        session: SessionId,
        callback: Option<Callback>,
        statuses: Vec<LinkStatus>,
    },
    Intermediate(MsgResponse),
}
