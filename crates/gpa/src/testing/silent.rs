use std::marker::PhantomData;

use crate::actor::Gpa;
use crate::envelope::Message;
use crate::error::GpaError;
use crate::out_messages::OutMessages;

/// A node that accepts everything and never answers. Stands in for a
/// crashed or Byzantine peer.
pub struct SilentNode<I, M, O> {
    received: usize,
    _marker: PhantomData<fn(I, M) -> O>,
}

impl<I, M, O> SilentNode<I, M, O> {
    pub fn new() -> Self {
        Self {
            received: 0,
            _marker: PhantomData,
        }
    }
}

impl<I, M, O> Default for SilentNode<I, M, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, M: Message, O> Gpa for SilentNode<I, M, O> {
    type Input = I;
    type Message = M;
    type Output = O;

    fn input(&mut self, _input: I) -> OutMessages<M> {
        OutMessages::none()
    }

    fn message(&mut self, _msg: M) -> OutMessages<M> {
        self.received += 1;
        OutMessages::none()
    }

    fn output(&self) -> Option<O> {
        None
    }

    fn unmarshal_message(&self, data: &[u8]) -> Result<M, GpaError> {
        Err(GpaError::unknown_message_type(data))
    }

    fn status_string(&self) -> String {
        format!("Silent{{received: {}}}", self.received)
    }
}
