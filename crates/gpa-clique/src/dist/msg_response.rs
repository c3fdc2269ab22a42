use std::fmt;

use gpa::{Envelope, GpaError, Message, NodeId, WireReader, WireWriter};

use super::link_status::LinkStatus;
use super::msg::MSG_TYPE_RESPONSE;
use super::SessionId;

/// Answer to a query: the responder's own status for the link from the
/// querier, plus everything it collected from the peers it asked in turn.
#[derive(Clone, PartialEq, Eq)]
pub struct MsgResponse {
    envelope: Envelope,
    session: SessionId,
    response: LinkStatus,
    sub_responses: Vec<LinkStatus>,
}

impl MsgResponse {
    pub fn new(
        recipient: NodeId,
        session: SessionId,
        response: LinkStatus,
        sub_responses: Vec<LinkStatus>,
    ) -> Self {
        Self {
            envelope: Envelope::new(recipient),
            session,
            response,
            sub_responses,
        }
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn response(&self) -> &LinkStatus {
        &self.response
    }

    pub fn sub_responses(&self) -> &[LinkStatus] {
        &self.sub_responses
    }

    pub(crate) fn unmarshal(recipient: NodeId, data: &[u8]) -> Result<Self, GpaError> {
        let mut r = WireReader::new(data);
        let tag = r.read_u8()?;
        if tag != MSG_TYPE_RESPONSE {
            return Err(GpaError::UnexpectedMessageType {
                expected: MSG_TYPE_RESPONSE,
                got: tag,
            });
        }
        let session = r.read_hash()?;
        let response = LinkStatus::read(&mut r)?;
        let count = r.read_u16()?;
        let sub_responses = (0..count)
            .map(|_| LinkStatus::read(&mut r))
            .collect::<Result<Vec<_>, _>>()?;
        r.finish()?;
        Ok(Self {
            envelope: Envelope::new(recipient),
            session,
            response,
            sub_responses,
        })
    }
}

impl Message for MsgResponse {
    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    fn marshal_binary(&self) -> Result<Vec<u8>, GpaError> {
        let mut w = WireWriter::new();
        w.write_u8(MSG_TYPE_RESPONSE).write_hash(&self.session);
        self.response.write(&mut w)?;
        w.write_len("response.sub_responses", self.sub_responses.len())?;
        for sub in &self.sub_responses {
            sub.write(&mut w)?;
        }
        Ok(w.into_vec())
    }
}

impl fmt::Debug for MsgResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MsgResponse{{session: {}, sender: {:?}, recipient: {:?}, response: {}, |sub_responses|: {}}}",
            self.session.short_string(),
            self.sender(),
            self.recipient(),
            self.response.short_string(),
            self.sub_responses.len(),
        )
    }
}
