use crate::envelope::Message;
use crate::error::GpaError;
use crate::out_messages::OutMessages;

/// A generic protocol actor: one node's deterministic view of a distributed
/// protocol.
///
/// Implementations never perform I/O and never read a clock. Time advances
/// only through inputs, and messages are returned to the caller rather than
/// sent. Given the same sequence of calls, an instance always produces the
/// same outputs.
pub trait Gpa {
    /// Locally originated events (start a protocol run, time advanced, ...).
    type Input;
    /// Messages exchanged between instances of the same protocol.
    type Message: Message;
    /// Terminal result. Protocols that report completion some other way use
    /// an uninhabited type.
    type Output;

    fn input(&mut self, input: Self::Input) -> OutMessages<Self::Message>;

    /// Handle one message whose recipient is this node and whose sender has
    /// been set by the delivering party.
    fn message(&mut self, msg: Self::Message) -> OutMessages<Self::Message>;

    fn output(&self) -> Option<Self::Output>;

    /// Decode a message from the wire. The leading byte selects the message
    /// type.
    fn unmarshal_message(&self, data: &[u8]) -> Result<Self::Message, GpaError>;

    /// One-line summary of internal state, for debugging.
    fn status_string(&self) -> String;
}
