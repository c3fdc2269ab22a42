use crate::error::GpaError;
use crate::node_id::NodeId;

/// Addressing shared by every GPA message.
///
/// The producer fixes the `recipient`. The `sender` is filled in by whoever
/// delivers the message (the runtime or the test driver), never by the
/// producer, so a protocol can trust it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    recipient: NodeId,
    sender: Option<NodeId>,
}

impl Envelope {
    pub fn new(recipient: NodeId) -> Self {
        Self {
            recipient,
            sender: None,
        }
    }

    pub fn recipient(&self) -> NodeId {
        self.recipient
    }

    pub fn sender(&self) -> Option<NodeId> {
        self.sender
    }

    pub fn set_sender(&mut self, sender: NodeId) {
        self.sender = Some(sender);
    }
}

/// A protocol message that can be routed and put on the wire.
///
/// Implementors only expose their embedded [`Envelope`] and a codec; the
/// addressing accessors come for free.
pub trait Message {
    fn envelope(&self) -> &Envelope;

    fn envelope_mut(&mut self) -> &mut Envelope;

    /// Binary encoding, starting with the message type tag.
    fn marshal_binary(&self) -> Result<Vec<u8>, GpaError>;

    fn recipient(&self) -> NodeId {
        self.envelope().recipient()
    }

    /// `None` until the message has been delivered.
    fn sender(&self) -> Option<NodeId> {
        self.envelope().sender()
    }

    fn set_sender(&mut self, sender: NodeId) {
        self.envelope_mut().set_sender(sender);
    }
}
