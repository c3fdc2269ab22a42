use std::fmt;

use gpa::{Envelope, GpaError, Message, NodeId};

use super::msg_query::MsgQuery;
use super::msg_response::MsgResponse;

pub(crate) const MSG_TYPE_QUERY: u8 = 0;
pub(crate) const MSG_TYPE_RESPONSE: u8 = 1;

/// Wire messages of the connectivity check.
#[derive(Clone, PartialEq, Eq)]
pub enum CliqueMessage {
    Query(MsgQuery),
    Response(MsgResponse),
}

impl CliqueMessage {
    /// Decode a message received by `recipient`. The first byte selects the
    /// message type.
    pub fn unmarshal(recipient: NodeId, data: &[u8]) -> Result<Self, GpaError> {
        match data.first() {
            None => Err(GpaError::Truncated {
                needed: 1,
                remaining: 0,
            }),
            Some(&MSG_TYPE_QUERY) => MsgQuery::unmarshal(recipient, data).map(Self::Query),
            Some(&MSG_TYPE_RESPONSE) => MsgResponse::unmarshal(recipient, data).map(Self::Response),
            Some(_) => Err(GpaError::unknown_message_type(data)),
        }
    }
}

impl From<MsgQuery> for CliqueMessage {
    fn from(msg: MsgQuery) -> Self {
        Self::Query(msg)
    }
}

impl From<MsgResponse> for CliqueMessage {
    fn from(msg: MsgResponse) -> Self {
        Self::Response(msg)
    }
}

impl Message for CliqueMessage {
    fn envelope(&self) -> &Envelope {
        match self {
            Self::Query(m) => m.envelope(),
            Self::Response(m) => m.envelope(),
        }
    }

    fn envelope_mut(&mut self) -> &mut Envelope {
        match self {
            Self::Query(m) => m.envelope_mut(),
            Self::Response(m) => m.envelope_mut(),
        }
    }

    fn marshal_binary(&self) -> Result<Vec<u8>, GpaError> {
        match self {
            Self::Query(m) => m.marshal_binary(),
            Self::Response(m) => m.marshal_binary(),
        }
    }
}

impl fmt::Debug for CliqueMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query(m) => fmt::Debug::fmt(m, f),
            Self::Response(m) => fmt::Debug::fmt(m, f),
        }
    }
}
