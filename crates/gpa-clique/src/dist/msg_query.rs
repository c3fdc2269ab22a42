use std::fmt;
use std::time::Duration;

use gpa::{Envelope, GpaError, Message, NodeId, PublicKey, WireReader, WireWriter};

use super::msg::MSG_TYPE_QUERY;
use super::SessionId;

/// Asks the recipient to confirm its link with the sender and, when
/// `sub_query` is non-empty, to check its own links to those peers.
#[derive(Clone, PartialEq, Eq)]
pub struct MsgQuery {
    envelope: Envelope,
    session: SessionId,
    sender_pub_key: PublicKey,
    sub_query: Vec<PublicKey>,
    timeout: Duration,
}

impl MsgQuery {
    pub fn new(
        recipient: NodeId,
        session: SessionId,
        sender_pub_key: PublicKey,
        sub_query: Vec<PublicKey>,
        timeout: Duration,
    ) -> Self {
        Self {
            envelope: Envelope::new(recipient),
            session,
            sender_pub_key,
            sub_query,
            timeout,
        }
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn sender_pub_key(&self) -> &PublicKey {
        &self.sender_pub_key
    }

    pub fn sub_query(&self) -> &[PublicKey] {
        &self.sub_query
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// A leaf query only asks for the direct link.
    pub fn is_leaf(&self) -> bool {
        self.sub_query.is_empty()
    }

    /// The claimed sender key must belong to whoever actually sent the
    /// message.
    pub fn validate(&self) -> Result<(), GpaError> {
        let claimed = NodeId::from_public_key(&self.sender_pub_key);
        match self.sender() {
            Some(sender) if sender == claimed => Ok(()),
            _ => Err(GpaError::InvalidField {
                field: "query.sender_pub_key",
                reason: format!("does not match sender {:?}", self.sender()),
            }),
        }
    }

    pub(crate) fn unmarshal(recipient: NodeId, data: &[u8]) -> Result<Self, GpaError> {
        let mut r = WireReader::new(data);
        let tag = r.read_u8()?;
        if tag != MSG_TYPE_QUERY {
            return Err(GpaError::UnexpectedMessageType {
                expected: MSG_TYPE_QUERY,
                got: tag,
            });
        }
        let session = r.read_hash()?;
        let sender_pub_key = r.read_public_key()?;
        let count = r.read_u16()?;
        let sub_query = (0..count)
            .map(|_| r.read_public_key())
            .collect::<Result<Vec<_>, _>>()?;
        let timeout_ms = r.read_i64()?;
        let timeout_ms = u64::try_from(timeout_ms).map_err(|_| GpaError::InvalidField {
            field: "query.timeout",
            reason: format!("negative: {timeout_ms}"),
        })?;
        r.finish()?;
        Ok(Self {
            envelope: Envelope::new(recipient),
            session,
            sender_pub_key,
            sub_query,
            timeout: Duration::from_millis(timeout_ms),
        })
    }
}

impl Message for MsgQuery {
    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    fn marshal_binary(&self) -> Result<Vec<u8>, GpaError> {
        let mut w = WireWriter::with_capacity(1 + 32 + 32 + 2 + 32 * self.sub_query.len() + 8);
        w.write_u8(MSG_TYPE_QUERY)
            .write_hash(&self.session)
            .write_public_key(&self.sender_pub_key)
            .write_len("query.sub_query", self.sub_query.len())?;
        for pk in &self.sub_query {
            w.write_public_key(pk);
        }
        let timeout_ms = i64::try_from(self.timeout.as_millis()).unwrap_or(i64::MAX);
        w.write_i64(timeout_ms);
        Ok(w.into_vec())
    }
}

impl fmt::Debug for MsgQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MsgQuery{{session: {}, sender: {:?}, recipient: {:?}, |sub_query|: {}, timeout: {:?}}}",
            self.session.short_string(),
            self.sender(),
            self.recipient(),
            self.sub_query.len(),
            self.timeout,
        )
    }
}
