use lattice_shared::{NodeId, ObjectId, Version};

/// Instance data pushed to this node for an object it holds no instance of
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushEvent {
    pub origin: NodeId,
    pub object_id: ObjectId,
    pub group: u128,
    pub type_id: u128,
    pub version: Version,
    pub data: Vec<u8>,
}

pub(crate) type PushHandler = dyn Fn(&PushEvent) + Send + Sync;
