use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

use log::{debug, warn};
use parking_lot::Mutex;

use lattice_shared::{
    Command, CommandKind, CommandResult, DataIStream, DataOStream, Handler, Monitor, NodeId,
    ObjectCommand, ObjectId, Version,
};

use crate::{
    error::NodeError,
    object::object_cm::ObjectCm,
    packets::{self, BarrierEnterPayload, BarrierEnterReplyPayload, InstancePayload},
    peer::Peer,
};

enum BarrierRole {
    /// Entrants per open round, `None` standing for this node
    Master {
        rounds: HashMap<u32, Vec<Option<Arc<Peer>>>>,
    },
    Slave {
        master: Arc<Peer>,
    },
}

/// Change manager of a distributed barrier. The master collects entrants
/// per round and releases them all once `height` have arrived.
pub(crate) struct BarrierCm {
    id: ObjectId,
    height: AtomicU32,
    role: Mutex<BarrierRole>,
    released: Monitor<u32>,
}

impl BarrierCm {
    pub fn new_master(id: ObjectId, height: u32) -> Self {
        Self::new(
            id,
            height,
            BarrierRole::Master {
                rounds: HashMap::new(),
            },
        )
    }

    pub fn new_slave(id: ObjectId, master: Arc<Peer>) -> Self {
        Self::new(id, 0, BarrierRole::Slave { master })
    }

    fn new(id: ObjectId, height: u32, role: BarrierRole) -> Self {
        Self {
            id,
            height: AtomicU32::new(height),
            role: Mutex::new(role),
            released: Monitor::new(0),
        }
    }

    pub fn height(&self) -> u32 {
        self.height.load(Ordering::Acquire)
    }

    /// Enters `round` and blocks until every participant entered it
    pub fn enter(&self, round: u32, timeout_ms: u32) -> Result<(), NodeError> {
        if self.height() <= 1 {
            self.release(round);
            return Ok(());
        }

        let master = match &*self.role.lock() {
            BarrierRole::Master { .. } => None,
            BarrierRole::Slave { master } => Some(master.clone()),
        };
        match master {
            None => self.arrive(round, None)?,
            Some(master) => master.send(&packets::command(
                ObjectCommand::BarrierEnter,
                self.id.as_u128(),
                &BarrierEnterPayload { round, timeout_ms },
            ))?,
        }

        if self.released.timed_wait_ge(round, timeout_ms) {
            Ok(())
        } else {
            Err(NodeError::BarrierTimeout {
                barrier_id: self.id,
                round,
                timeout_ms,
            })
        }
    }

    fn arrive(&self, round: u32, entrant: Option<Arc<Peer>>) -> Result<(), NodeError> {
        let height = self.height() as usize;
        let complete = {
            let mut role = self.role.lock();
            let BarrierRole::Master { rounds } = &mut *role else {
                return Ok(());
            };

            let entrants = rounds.entry(round).or_default();
            entrants.push(entrant);
            if entrants.len() < height {
                return Ok(());
            }

            let complete = rounds.remove(&round).unwrap_or_default();
            rounds.retain(|open, entrants| {
                let stale = *open < round;
                if stale {
                    warn!(
                        "BarrierCm: {} dropping round {} with {} of {} entrants",
                        self.id,
                        open,
                        entrants.len(),
                        height
                    );
                }
                !stale
            });
            complete
        };

        debug!("BarrierCm: {} releasing round {}", self.id, round);
        let reply = packets::command(
            ObjectCommand::BarrierEnterReply,
            self.id.as_u128(),
            &BarrierEnterReplyPayload { round },
        );
        for peer in complete.iter().flatten() {
            if let Err(error) = peer.send(&reply) {
                warn!("BarrierCm: could not release {}: {}", peer.node_id(), error);
            }
        }
        self.release(round);
        Ok(())
    }

    fn release(&self, round: u32) {
        self.released.update(|released| {
            if *released < round {
                *released = round;
            }
        });
    }

    fn handle(&self, peer: &Arc<Peer>, command: &Command) -> Result<CommandResult, NodeError> {
        match command.kind() {
            CommandKind::Object(ObjectCommand::BarrierEnter) => {
                let payload: BarrierEnterPayload = packets::read(command)?;
                self.arrive(payload.round, Some(peer.clone()))?;
                Ok(CommandResult::Handled)
            }
            CommandKind::Object(ObjectCommand::BarrierEnterReply) => {
                let payload: BarrierEnterReplyPayload = packets::read(command)?;
                self.release(payload.round);
                Ok(CommandResult::Handled)
            }
            CommandKind::Object(ObjectCommand::Instance) => {
                let payload: InstancePayload = packets::read(command)?;
                let height: u32 = DataIStream::new(&payload.data).read()?;
                self.height.store(height, Ordering::Release);
                Ok(CommandResult::Handled)
            }
            _ => Ok(CommandResult::Discard),
        }
    }
}

impl Handler<Arc<Peer>> for BarrierCm {
    fn dispatch(&self, peer: &Arc<Peer>, command: &Command) -> CommandResult {
        self.handle(peer, command).unwrap_or_else(|error| {
            warn!(
                "BarrierCm: {} failed to handle {}: {}",
                self.id,
                command.kind(),
                error
            );
            CommandResult::Error
        })
    }
}

impl ObjectCm for BarrierCm {
    fn object_id(&self) -> ObjectId {
        self.id
    }

    fn is_master(&self) -> bool {
        matches!(&*self.role.lock(), BarrierRole::Master { .. })
    }

    fn add_slave(&self, peer: &Arc<Peer>, _version: Option<Version>) -> Result<Version, NodeError> {
        if !self.is_master() {
            return Err(NodeError::NotMaster { object_id: self.id });
        }

        let mut writer = DataOStream::new();
        writer.write(&self.height());
        peer.send(&packets::command(
            ObjectCommand::Instance,
            self.id.as_u128(),
            &InstancePayload {
                version: Version::NONE,
                data: writer.into_bytes(),
            },
        ))?;
        Ok(Version::NONE)
    }

    fn remove_slave(&self, _node_id: &NodeId) {}

    fn peer_lost(&self, node_id: &NodeId) {
        if let BarrierRole::Master { rounds } = &mut *self.role.lock() {
            for entrants in rounds.values_mut() {
                entrants.retain(|entrant| {
                    entrant
                        .as_ref()
                        .map_or(true, |peer| peer.node_id() != *node_id)
                });
            }
        }
    }
}
