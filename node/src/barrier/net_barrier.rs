use std::sync::Arc;

use lattice_shared::ObjectId;

use crate::{
    barrier::barrier_cm::BarrierCm, error::NodeError, local_node::node_inner::NodeInner,
    object::object_cm::ObjectCm,
};

/// A barrier shared by threads on several nodes.
///
/// Created on one node with [`LocalNode::create_barrier`] and mapped by the
/// others with [`LocalNode::map_barrier`]. Every participant enters each
/// round once; nobody leaves a round before `height` participants entered it.
///
/// A handle is one participant. Rounds are numbered by the handle, so
/// entering takes `&mut self` and threads that each count towards `height`
/// need handles of their own, which means one per node.
///
/// [`LocalNode::create_barrier`]: crate::LocalNode::create_barrier
/// [`LocalNode::map_barrier`]: crate::LocalNode::map_barrier
pub struct NetBarrier {
    cm: Arc<BarrierCm>,
    node: Arc<NodeInner>,
    round: u32,
}

impl NetBarrier {
    pub(crate) fn new(cm: Arc<BarrierCm>, node: Arc<NodeInner>) -> Self {
        Self {
            cm,
            node,
            round: 0,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.cm.object_id()
    }

    pub fn height(&self) -> u32 {
        self.cm.height()
    }

    /// Enters the next round, waiting up to `timeout_ms` for the others
    pub fn enter(&mut self, timeout_ms: u32) -> Result<(), NodeError> {
        self.round = self.round.wrapping_add(1);
        self.cm.enter(self.round, timeout_ms)
    }

    /// The last round this handle entered
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Enters the next round with the node's configured barrier timeout
    pub fn enter_default(&mut self) -> Result<(), NodeError> {
        self.enter(self.node.config().barrier_timeout_ms)
    }
}
