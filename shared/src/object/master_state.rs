use std::{
    collections::{HashMap, VecDeque},
    iter,
};

use log::debug;

use crate::ids::{NodeId, ObjectId};

use super::{error::ObjectError, version::Version};

/// The serialized data of one committed version
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionRecord {
    pub version: Version,
    /// Full snapshot at this version
    pub instance: Vec<u8>,
    /// What a slave at the previous version needs to reach this one
    pub delta: Vec<u8>,
}

/// A change a slave committed, waiting to be applied by the master
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlaveDelta {
    pub node_id: NodeId,
    pub sequence: u32,
    pub data: Vec<u8>,
}

struct SlaveRecord {
    acknowledged: Version,
    next_sequence: u32,
}

/// Version bookkeeping for the master copy of a distributed object.
///
/// Keeps the head version plus older versions still needed, either because
/// the auto-obsolete window retains them or because a slave has not
/// acknowledged them yet. Does no I/O; the caller sends whatever commands
/// the returned data calls for.
pub struct MasterState {
    object_id: ObjectId,
    head: VersionRecord,
    // older versions, oldest first
    retained: VecDeque<VersionRecord>,
    auto_obsolete: u32,
    slaves: HashMap<NodeId, SlaveRecord>,
    slave_deltas: VecDeque<SlaveDelta>,
}

impl MasterState {
    /// Creates the state of a freshly registered master at [`Version::NONE`]
    pub fn new(object_id: ObjectId, instance: Vec<u8>, auto_obsolete: u32) -> Self {
        Self {
            object_id,
            head: VersionRecord {
                version: Version::NONE,
                delta: instance.clone(),
                instance,
            },
            retained: VecDeque::new(),
            auto_obsolete,
            slaves: HashMap::new(),
            slave_deltas: VecDeque::new(),
        }
    }

    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    pub fn head_version(&self) -> Version {
        self.head.version
    }

    pub fn head(&self) -> &VersionRecord {
        &self.head
    }

    pub fn oldest_version(&self) -> Version {
        self.retained
            .front()
            .map(|record| record.version)
            .unwrap_or(self.head.version)
    }

    /// Records a new head version and returns its number
    pub fn commit(&mut self, instance: Vec<u8>, delta: Vec<u8>) -> Result<Version, ObjectError> {
        let version = self.head.version.next()?;
        let previous = std::mem::replace(
            &mut self.head,
            VersionRecord {
                version,
                instance,
                delta,
            },
        );
        self.retained.push_back(previous);
        self.prune();
        Ok(version)
    }

    /// Registers a slave which starts out at `version`
    pub fn add_slave(&mut self, node_id: NodeId, version: Version) {
        self.slaves.insert(
            node_id,
            SlaveRecord {
                acknowledged: version,
                next_sequence: 0,
            },
        );
    }

    /// Forgets a slave. Changes it committed stay queued, they were
    /// already acknowledged.
    pub fn remove_slave(&mut self, node_id: &NodeId) -> bool {
        let removed = self.slaves.remove(node_id).is_some();
        if removed {
            self.prune();
        }
        removed
    }

    pub fn has_slave(&self, node_id: &NodeId) -> bool {
        self.slaves.contains_key(node_id)
    }

    pub fn slaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slaves.keys().copied()
    }

    pub fn slave_count(&self) -> usize {
        self.slaves.len()
    }

    /// Notes that `node_id` no longer needs versions older than `version`
    pub fn acknowledge(&mut self, node_id: &NodeId, version: Version) -> Result<(), ObjectError> {
        let slave = self
            .slaves
            .get_mut(node_id)
            .ok_or(ObjectError::UnknownSlave {
                object_id: self.object_id,
                node_id: *node_id,
            })?;
        if version > slave.acknowledged {
            slave.acknowledged = version;
            self.prune();
        }
        Ok(())
    }

    /// Whether every slave has acknowledged the head version
    pub fn all_acknowledged(&self) -> bool {
        self.slaves
            .values()
            .all(|slave| slave.acknowledged >= self.head.version)
    }

    /// Keeps `count` versions before head in addition to the ones slaves
    /// still need
    pub fn set_auto_obsolete(&mut self, count: u32) {
        self.auto_obsolete = count;
        self.prune();
    }

    pub fn auto_obsolete(&self) -> u32 {
        self.auto_obsolete
    }

    /// The retained version closest to `version`. Requests older than the
    /// oldest retained version get the oldest, newer ones get head.
    pub fn instance_at(&self, version: Version) -> &VersionRecord {
        if version >= self.head.version {
            return &self.head;
        }
        self.retained
            .iter()
            .find(|record| record.version >= version)
            .unwrap_or(&self.head)
    }

    /// All retained versions newer than `version`, oldest first
    pub fn deltas_after(&self, version: Version) -> impl Iterator<Item = &VersionRecord> + '_ {
        self.retained
            .iter()
            .chain(iter::once(&self.head))
            .filter(move |record| record.version > version)
    }

    /// Queues a change committed by a slave. Each slave's changes must
    /// arrive with consecutive sequence numbers starting at 0. Returns false
    /// for a change that was already queued, which is ignored.
    pub fn queue_slave_delta(
        &mut self,
        node_id: NodeId,
        sequence: u32,
        data: Vec<u8>,
    ) -> Result<bool, ObjectError> {
        let slave = self
            .slaves
            .get_mut(&node_id)
            .ok_or(ObjectError::UnknownSlave {
                object_id: self.object_id,
                node_id,
            })?;
        if sequence < slave.next_sequence {
            debug!(
                "MasterState: object {} ignored change {} from {} again",
                self.object_id, sequence, node_id
            );
            return Ok(false);
        }
        if sequence != slave.next_sequence {
            return Err(ObjectError::SlaveDeltaOutOfOrder {
                node_id,
                expected: slave.next_sequence,
                received: sequence,
            });
        }
        slave.next_sequence = slave.next_sequence.wrapping_add(1);
        self.slave_deltas.push_back(SlaveDelta {
            node_id,
            sequence,
            data,
        });
        Ok(true)
    }

    /// Removes and returns all queued slave changes in arrival order
    pub fn take_slave_deltas(&mut self) -> Vec<SlaveDelta> {
        self.slave_deltas.drain(..).collect()
    }

    pub fn has_slave_deltas(&self) -> bool {
        !self.slave_deltas.is_empty()
    }

    fn prune(&mut self) {
        let window = Version::new(
            self.head
                .version
                .value()
                .saturating_sub(u64::from(self.auto_obsolete)),
        );
        let needed = self
            .slaves
            .values()
            .map(|slave| slave.acknowledged)
            .min()
            .unwrap_or(self.head.version);
        let keep_from = window.min(needed);

        let mut pruned = 0;
        while self
            .retained
            .front()
            .map_or(false, |record| record.version < keep_from)
        {
            self.retained.pop_front();
            pruned += 1;
        }
        if pruned > 0 {
            debug!(
                "MasterState: object {} pruned {} versions, oldest now {}",
                self.object_id,
                pruned,
                self.oldest_version()
            );
        }
    }
}
