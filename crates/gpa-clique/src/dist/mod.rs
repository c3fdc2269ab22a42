//! The connectivity check as a pure state machine.
//!
//! The initiating node (root) asks every peer to check its links to every
//! other peer. Each asked peer (intermediate) sends leaf queries to the rest,
//! collects their signed answers and reports them upward together with its own
//! direct status. Peers that do not answer before the deadline are reported
//! as timed out; peers that are not trusted are never contacted.

mod input;
mod link_status;
mod msg;
mod msg_query;
mod msg_response;
mod session;

use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::time::{Duration, Instant};

use gpa::{Gpa, GpaError, HashValue, KeyPair, Message, NodeId, OutMessages, PublicKey};
use tracing::{debug, warn};

pub use input::{Callback, CliqueInput};
pub use link_status::{LinkFailure, LinkStatus};
pub use msg::CliqueMessage;
pub use msg_query::MsgQuery;
pub use msg_response::MsgResponse;

use session::{Finished, Session, SessionRole};

/// Identifies one check round across all participating nodes.
pub type SessionId = HashValue;

/// Upper bound for the timeout of any session, whatever the caller asks for.
pub const MAX_STEP_TIMEOUT: Duration = Duration::from_secs(30);

/// One node's instance of the connectivity check.
pub struct CliqueDist {
    me: NodeId,
    key_pair: KeyPair,
    now: Instant,
    trusted: BTreeMap<NodeId, PublicKey>,
    sessions: HashMap<SessionId, Session>,
}

impl CliqueDist {
    /// New instance with an empty trust set. Nothing is contacted until a
    /// [`CliqueInput::TrustedPeers`] input arrives.
    pub fn new(key_pair: KeyPair, now: Instant) -> Self {
        Self {
            me: NodeId::from_public_key(&key_pair.public_key()),
            key_pair,
            now,
            trusted: BTreeMap::new(),
            sessions: HashMap::new(),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.me
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn handle_check(
        &mut self,
        mut session_id: SessionId,
        nodes: Vec<PublicKey>,
        timeout: Duration,
        callback: Callback,
    ) -> OutMessages<CliqueMessage> {
        while self.sessions.contains_key(&session_id) {
            session_id = session_id.rehash();
        }
        let session = Session::new(
            session_id,
            &self.key_pair,
            SessionRole::Root {
                callback: Some(callback),
            },
            self.now,
            timeout,
            nodes,
            &self.trusted,
        );
        debug!(session = %session_id.short_string(), required = session.required_count(), "check started");
        self.start_session(session)
    }

    fn handle_time_tick(&mut self, now: Instant) -> OutMessages<CliqueMessage> {
        self.now = now;
        let expired: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|s| s.is_expired(now))
            .map(|s| *s.id())
            .collect();
        let mut out = OutMessages::new();
        for session_id in expired {
            if let Some(session) = self.sessions.remove(&session_id) {
                debug!(
                    session = %session_id.short_string(),
                    missing = session.required_count(),
                    "session timed out"
                );
                out.add_all(self.close_session(session));
            }
        }
        out
    }

    fn handle_query(&mut self, msg: MsgQuery) -> OutMessages<CliqueMessage> {
        if let Err(e) = msg.validate() {
            warn!("dropping query: {e}");
            return OutMessages::none();
        }
        let Some(sender) = msg.sender() else {
            return OutMessages::none();
        };
        if msg.is_leaf() {
            let status = LinkStatus::ok(msg.session(), *msg.sender_pub_key(), &self.key_pair);
            return OutMessages::single(
                MsgResponse::new(sender, *msg.session(), status, Vec::new()).into(),
            );
        }
        if self.sessions.contains_key(msg.session()) {
            debug!(session = %msg.session().short_string(), "duplicate query ignored");
            return OutMessages::none();
        }
        let session = Session::new(
            *msg.session(),
            &self.key_pair,
            SessionRole::Intermediate {
                parent_pub: *msg.sender_pub_key(),
                parent_id: sender,
            },
            self.now,
            msg.timeout(),
            msg.sub_query().to_vec(),
            &self.trusted,
        );
        self.start_session(session)
    }

    fn handle_response(&mut self, msg: MsgResponse) -> OutMessages<CliqueMessage> {
        let Some(sender) = msg.sender() else {
            return OutMessages::none();
        };
        let Some(session) = self.sessions.get_mut(msg.session()) else {
            warn!(session = %msg.session().short_string(), "session not found, dropping response");
            return OutMessages::none();
        };
        if !session.add_response(sender, &msg) || !session.is_complete() {
            return OutMessages::none();
        }
        match self.sessions.remove(msg.session()) {
            Some(session) => self.close_session(session),
            None => OutMessages::none(),
        }
    }

    /// Send the session's queries, or close it right away if nobody needs to
    /// be asked.
    fn start_session(&mut self, session: Session) -> OutMessages<CliqueMessage> {
        if session.is_complete() {
            return self.close_session(session);
        }
        let out = session
            .make_queries()
            .into_iter()
            .map(CliqueMessage::from)
            .collect();
        self.sessions.insert(*session.id(), session);
        out
    }

    fn close_session(&self, session: Session) -> OutMessages<CliqueMessage> {
        match session.finish(&self.key_pair) {
            Finished::Root {
                session,
                callback,
                statuses,
            } => {
                debug!(session = %session.short_string(), statuses = statuses.len(), "check done");
                if let Some(callback) = callback {
                    callback(session, statuses);
                }
                OutMessages::none()
            }
            Finished::Intermediate(response) => OutMessages::single(response.into()),
        }
    }
}

impl Gpa for CliqueDist {
    type Input = CliqueInput;
    type Message = CliqueMessage;
    type Output = Infallible;

    fn input(&mut self, input: CliqueInput) -> OutMessages<CliqueMessage> {
        match input {
            CliqueInput::Check {
                session_id,
                nodes,
                timeout,
                callback,
            } => self.handle_check(session_id, nodes, timeout, callback),
            CliqueInput::TimeTick(now) => self.handle_time_tick(now),
            CliqueInput::TrustedPeers(trusted) => {
                self.trusted = trusted;
                OutMessages::none()
            }
        }
    }

    fn message(&mut self, msg: CliqueMessage) -> OutMessages<CliqueMessage> {
        match msg {
            CliqueMessage::Query(m) => self.handle_query(m),
            CliqueMessage::Response(m) => self.handle_response(m),
        }
    }

    fn output(&self) -> Option<Infallible> {
        None
    }

    fn unmarshal_message(&self, data: &[u8]) -> Result<CliqueMessage, GpaError> {
        CliqueMessage::unmarshal(self.me, data)
    }

    fn status_string(&self) -> String {
        let sessions: Vec<String> = self.sessions.values().map(Session::status_string).collect();
        format!(
            "{{Clique {}, trusted: {}, sessions: [{}]}}",
            self.me.short_string(),
            self.trusted.len(),
            sessions.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Results = Arc<Mutex<Vec<(SessionId, Vec<LinkStatus>)>>>;

    fn kp(seed: u8) -> KeyPair {
        KeyPair::from_seed(&[seed; 32])
    }

    fn id_of(kp: &KeyPair) -> NodeId {
        NodeId::from_public_key(&kp.public_key())
    }

    fn recording() -> (Results, impl FnOnce(SessionId, Vec<LinkStatus>) + Send + 'static) {
        let results: Results = Arc::default();
        let sink = Arc::clone(&results);
        (results, move |sid, ls| sink.lock().unwrap().push((sid, ls)))
    }

    fn dist(k: &KeyPair, trusted: &[&KeyPair]) -> CliqueDist {
        let mut d = CliqueDist::new(k.clone(), Instant::now());
        d.input(CliqueInput::trusted_peers(trusted.iter().map(|k| k.public_key())));
        d
    }

    fn delivered(mut msg: CliqueMessage, from: &KeyPair) -> CliqueMessage {
        msg.set_sender(id_of(from));
        msg
    }

    #[test]
    fn check_with_only_self_completes_immediately() {
        let a = kp(1);
        let mut d = dist(&a, &[&a]);
        let (results, cb) = recording();
        let out = d.input(CliqueInput::check(
            SessionId::hash_data(b"s"),
            vec![a.public_key()],
            Duration::from_secs(5),
            cb,
        ));
        assert!(out.is_empty());
        assert_eq!(d.session_count(), 0);
        let results = results.lock().unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].1.is_empty());
    }

    #[test]
    fn untrusted_targets_are_never_contacted() {
        let (a, b) = (kp(1), kp(2));
        let mut d = dist(&a, &[&a]);
        let (results, cb) = recording();
        let sid = SessionId::hash_data(b"s");
        let out = d.input(CliqueInput::check(
            sid,
            vec![a.public_key(), b.public_key()],
            Duration::from_secs(5),
            cb,
        ));
        assert!(out.is_empty());
        let results = results.lock().unwrap();
        let statuses = &results[0].1;
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].failure(), Some(&LinkFailure::NonTrusted));
        assert_eq!(*statuses[0].src_pub_key(), a.public_key());
        assert!(statuses[0].validate(&sid));
    }

    #[test]
    fn leaf_query_is_answered_immediately() {
        let (a, b) = (kp(1), kp(2));
        let mut d = dist(&b, &[&a, &b]);
        let sid = SessionId::hash_data(b"s");
        let q = MsgQuery::new(id_of(&b), sid, a.public_key(), vec![], Duration::from_secs(1));
        let out = d.message(delivered(q.into(), &a)).into_vec();
        assert_eq!(out.len(), 1);
        let CliqueMessage::Response(resp) = &out[0] else {
            panic!("expected a response");
        };
        assert_eq!(resp.recipient(), id_of(&a));
        assert_eq!(*resp.response().src_pub_key(), a.public_key());
        assert_eq!(*resp.response().dst_pub_key(), b.public_key());
        assert!(resp.response().validate(&sid));
        assert!(resp.sub_responses().is_empty());
        assert_eq!(d.session_count(), 0);
    }

    #[test]
    fn forged_sender_key_is_dropped() {
        let (a, b, c) = (kp(1), kp(2), kp(3));
        let mut d = dist(&b, &[&a, &b, &c]);
        // c claims to be a.
        let q = MsgQuery::new(
            id_of(&b),
            SessionId::hash_data(b"s"),
            a.public_key(),
            vec![],
            Duration::from_secs(1),
        );
        assert!(d.message(delivered(q.into(), &c)).is_empty());
    }

    #[test]
    fn query_from_untrusted_sender_is_answered() {
        let (a, b, c) = (kp(1), kp(2), kp(3));
        // b trusts c but not a.
        let mut d = dist(&b, &[&b, &c]);
        let sid = SessionId::hash_data(b"s");
        let leaf = MsgQuery::new(id_of(&b), sid, a.public_key(), vec![], Duration::from_secs(1));
        let out = d.message(delivered(leaf.into(), &a)).into_vec();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].recipient(), id_of(&a));

        // As an intermediate, b still only asks peers it trusts.
        let q = MsgQuery::new(
            id_of(&b),
            sid,
            a.public_key(),
            vec![a.public_key(), b.public_key(), c.public_key()],
            Duration::from_secs(2),
        );
        let out = d.message(delivered(q.into(), &a)).into_vec();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].recipient(), id_of(&c));
    }

    #[test]
    fn duplicate_query_is_ignored() {
        let (a, b, c) = (kp(1), kp(2), kp(3));
        let mut d = dist(&b, &[&a, &b, &c]);
        let sid = SessionId::hash_data(b"s");
        let q = MsgQuery::new(
            id_of(&b),
            sid,
            a.public_key(),
            vec![a.public_key(), b.public_key(), c.public_key()],
            Duration::from_secs(2),
        );
        let first = d.message(delivered(q.clone().into(), &a));
        assert_eq!(first.count(), 1);
        assert_eq!(d.session_count(), 1);
        assert!(d.message(delivered(q.into(), &a)).is_empty());
        assert_eq!(d.session_count(), 1);
    }

    #[test]
    fn two_node_intermediate_answers_without_waiting() {
        let (a, b) = (kp(1), kp(2));
        let mut d = dist(&b, &[&a, &b]);
        let sid = SessionId::hash_data(b"s");
        let q = MsgQuery::new(
            id_of(&b),
            sid,
            a.public_key(),
            vec![a.public_key(), b.public_key()],
            Duration::from_secs(2),
        );
        let out = d.message(delivered(q.into(), &a)).into_vec();
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], CliqueMessage::Response(_)));
        assert_eq!(d.session_count(), 0);
    }

    #[test]
    fn response_for_unknown_session_is_dropped() {
        let (a, b) = (kp(1), kp(2));
        let mut d = dist(&a, &[&a, &b]);
        let sid = SessionId::hash_data(b"s");
        let resp = MsgResponse::new(id_of(&a), sid, LinkStatus::ok(&sid, a.public_key(), &b), vec![]);
        assert!(d.message(delivered(resp.into(), &b)).is_empty());
    }

    #[test]
    fn tick_expires_root_with_timeouts() {
        let (a, b) = (kp(1), kp(2));
        let start = Instant::now();
        let mut d = CliqueDist::new(a.clone(), start);
        d.input(CliqueInput::trusted_peers([a.public_key(), b.public_key()]));
        let (results, cb) = recording();
        let out = d.input(CliqueInput::check(
            SessionId::hash_data(b"s"),
            vec![a.public_key(), b.public_key()],
            Duration::from_secs(5),
            cb,
        ));
        assert_eq!(out.count(), 1);

        d.input(CliqueInput::time_tick(start + Duration::from_secs(4)));
        assert!(results.lock().unwrap().is_empty());
        d.input(CliqueInput::time_tick(start + Duration::from_secs(5)));

        let results = results.lock().unwrap();
        assert_eq!(results.len(), 1);
        let statuses = &results[0].1;
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].failure(), Some(&LinkFailure::Timeout));
        assert_eq!(*statuses[0].dst_pub_key(), b.public_key());
        assert_eq!(d.session_count(), 0);
    }

    #[test]
    fn trust_update_replaces_previous_set() {
        let (a, b) = (kp(1), kp(2));
        let mut d = dist(&a, &[&a, &b]);
        d.input(CliqueInput::trusted_peers([a.public_key()]));
        let (results, cb) = recording();
        d.input(CliqueInput::check(
            SessionId::hash_data(b"s"),
            vec![a.public_key(), b.public_key()],
            Duration::from_secs(5),
            cb,
        ));
        let results = results.lock().unwrap();
        assert_eq!(results[0].1[0].failure(), Some(&LinkFailure::NonTrusted));
    }

    #[test]
    fn status_string_lists_sessions() {
        let (a, b) = (kp(1), kp(2));
        let mut d = dist(&a, &[&a, &b]);
        d.input(CliqueInput::check(
            SessionId::hash_data(b"s"),
            vec![a.public_key(), b.public_key()],
            Duration::from_secs(5),
            |_, _| {},
        ));
        let status = d.status_string();
        assert!(status.contains("trusted: 2"), "{status}");
        assert!(status.contains("root: true, |required|: 1"), "{status}");
    }

    #[test]
    fn unmarshal_addresses_message_to_self() {
        let (a, b) = (kp(1), kp(2));
        let d = dist(&b, &[]);
        let q = MsgQuery::new(
            id_of(&b),
            SessionId::hash_data(b"s"),
            a.public_key(),
            vec![],
            Duration::from_secs(1),
        );
        let bytes = q.marshal_binary().unwrap();
        let msg = d.unmarshal_message(&bytes).unwrap();
        assert_eq!(msg.recipient(), id_of(&b));
        assert!(d.unmarshal_message(&[9]).is_err());
    }
}
