use std::collections::{BTreeMap, VecDeque};

use tracing::{debug, info, warn};

use crate::actor::Gpa;
use crate::envelope::Message;
use crate::node_id::NodeId;
use crate::out_messages::OutMessages;

pub type BoxedGpa<I, M, O> = Box<dyn Gpa<Input = I, Message = M, Output = O>>;

/// Runs a set of GPA instances against each other without a network.
///
/// Pending inputs are applied first, in the order they were added. Messages
/// are then delivered round-robin: each round visits the nodes in `NodeId`
/// order and hands every node at most one message from its queue. The loop
/// ends when no input and no message is pending.
pub struct TestContext<I, M, O> {
    nodes: BTreeMap<NodeId, BoxedGpa<I, M, O>>,
    inputs: VecDeque<(NodeId, I)>,
    queues: BTreeMap<NodeId, VecDeque<M>>,
    delivered: usize,
}

impl<I, M: Message, O> TestContext<I, M, O> {
    pub fn new(nodes: impl IntoIterator<Item = (NodeId, BoxedGpa<I, M, O>)>) -> Self {
        let nodes: BTreeMap<_, _> = nodes.into_iter().collect();
        let queues = nodes.keys().map(|id| (*id, VecDeque::new())).collect();
        Self {
            nodes,
            inputs: VecDeque::new(),
            queues,
            delivered: 0,
        }
    }

    pub fn with_input(&mut self, node: NodeId, input: I) -> &mut Self {
        self.inputs.push_back((node, input));
        self
    }

    pub fn with_inputs(&mut self, inputs: impl IntoIterator<Item = (NodeId, I)>) -> &mut Self {
        self.inputs.extend(inputs);
        self
    }

    /// Queue a message as if `from` had produced it.
    pub fn with_message(&mut self, from: NodeId, msg: M) -> &mut Self {
        self.enqueue(from, OutMessages::single(msg));
        self
    }

    /// Drive everything to quiescence. Returns the number of messages
    /// delivered during this call.
    pub fn run_all(&mut self) -> usize {
        let before = self.delivered;
        loop {
            let applied = self.apply_inputs();
            let delivered = self.deliver_round();
            if applied == 0 && delivered == 0 {
                break;
            }
        }
        let n = self.delivered - before;
        debug!(delivered = n, "test context quiescent");
        n
    }

    /// Apply all pending inputs. Returns how many were applied.
    pub fn apply_inputs(&mut self) -> usize {
        let mut applied = 0;
        while let Some((id, input)) = self.inputs.pop_front() {
            let node = self
                .nodes
                .get_mut(&id)
                .unwrap_or_else(|| panic!("input for unknown node {id:?}"));
            let out = node.input(input);
            self.enqueue(id, out);
            applied += 1;
        }
        applied
    }

    /// One round-robin pass. Returns how many messages were delivered.
    pub fn deliver_round(&mut self) -> usize {
        let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        let mut delivered = 0;
        for id in ids {
            let Some(msg) = self.queues.get_mut(&id).and_then(VecDeque::pop_front) else {
                continue;
            };
            assert_eq!(
                msg.recipient(),
                id,
                "message queued for {id:?} is addressed to {:?}",
                msg.recipient()
            );
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            let out = node.message(msg);
            self.enqueue(id, out);
            delivered += 1;
        }
        self.delivered += delivered;
        delivered
    }

    fn enqueue(&mut self, from: NodeId, out: OutMessages<M>) {
        for mut msg in out {
            msg.set_sender(from);
            let to = msg.recipient();
            match self.queues.get_mut(&to) {
                Some(queue) => queue.push_back(msg),
                None => warn!(from = ?from, to = ?to, "dropping message for unknown node"),
            }
        }
    }

    pub fn pending_messages(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    pub fn delivered(&self) -> usize {
        self.delivered
    }

    pub fn node(&self, id: &NodeId) -> Option<&BoxedGpa<I, M, O>> {
        self.nodes.get(id)
    }

    pub fn outputs(&self) -> BTreeMap<NodeId, Option<O>> {
        self.nodes.iter().map(|(id, n)| (*id, n.output())).collect()
    }

    pub fn status_strings(&self) -> BTreeMap<NodeId, String> {
        self.nodes
            .iter()
            .map(|(id, n)| (*id, n.status_string()))
            .collect()
    }

    pub fn print_status(&self) {
        for (id, status) in self.status_strings() {
            info!(node = %id.short_string(), "{status}");
        }
    }
}
