use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use parking_lot::{Condvar, Mutex, RwLock};

use lattice_shared::{
    ChangeType, Command, CommandKind, CommandResult, DataIStream, DataOStream, DeltaOutcome,
    Distributable, Handler, MasterState, NodeCommand, NodeId, ObjectCommand, ObjectError,
    ObjectId, PendingVersion, SlaveDelta, SlaveState, SyncTarget, Version,
};

use crate::{
    error::NodeError,
    object::object_cm::ObjectCm,
    packets::{
        self, CommitPayload, DeltaPayload, InstancePayload, ObsoletePayload, PushPayload,
        SlaveDeltaPayload, UnmapObjectPayload,
    },
    peer::Peer,
};

struct MasterRole {
    state: MasterState,
    slaves: HashMap<NodeId, Arc<Peer>>,
}

struct SlaveRole {
    state: SlaveState,
    master: Arc<Peer>,
}

enum Role {
    Master(MasterRole),
    Slave(SlaveRole),
    /// Unregistered, or lost its master. Keeps the last version.
    Detached(Version),
}

/// One registered or mapped distributed object: the application's data plus
/// the master or slave version state that keeps it consistent.
///
/// Lock order is `commit_lock`, then `role`, then `data`. Commits serialize
/// under `data` alone and take `role` afterwards.
pub(crate) struct ObjectInstance<T> {
    id: ObjectId,
    change_type: ChangeType,
    data: RwLock<T>,
    role: Mutex<Role>,
    changed: Condvar,
    commit_lock: Mutex<()>,
}

impl<T: Distributable> ObjectInstance<T> {
    pub fn new_master(id: ObjectId, data: T, auto_obsolete: u32) -> Self {
        let mut writer = DataOStream::new();
        data.get_instance_data(&mut writer);
        let state = MasterState::new(id, writer.into_bytes(), auto_obsolete);

        Self::new(
            id,
            data,
            Role::Master(MasterRole {
                state,
                slaves: HashMap::new(),
            }),
        )
    }

    pub fn new_slave(id: ObjectId, data: T, master: Arc<Peer>) -> Self {
        Self::new(
            id,
            data,
            Role::Slave(SlaveRole {
                state: SlaveState::new(),
                master,
            }),
        )
    }

    fn new(id: ObjectId, data: T, role: Role) -> Self {
        Self {
            id,
            change_type: data.change_type(),
            data: RwLock::new(data),
            role: Mutex::new(role),
            changed: Condvar::new(),
            commit_lock: Mutex::new(()),
        }
    }

    pub fn data(&self) -> &RwLock<T> {
        &self.data
    }

    pub fn version(&self) -> Version {
        match &*self.role.lock() {
            Role::Master(master) => master.state.head_version(),
            Role::Slave(slave) => slave.state.version(),
            Role::Detached(version) => *version,
        }
    }

    pub fn head_version(&self) -> Version {
        match &*self.role.lock() {
            Role::Master(master) => master.state.head_version(),
            Role::Slave(slave) => slave.state.head_version(),
            Role::Detached(version) => *version,
        }
    }

    /// Serializes the current changes. A master records them as a new
    /// version and sends them to every slave, a slave sends them to its
    /// master. Returns the object's version afterwards.
    pub fn commit(&self) -> Result<Version, NodeError> {
        if self.change_type == ChangeType::Static {
            return Err(ObjectError::StaticObject { object_id: self.id }.into());
        }
        let _commit = self.commit_lock.lock();

        let serialized = {
            let mut data = self.data.write();
            if data.is_dirty() {
                let mut instance = DataOStream::new();
                data.get_instance_data(&mut instance);
                let delta = match self.change_type {
                    ChangeType::Delta => {
                        let mut delta = DataOStream::new();
                        data.pack(&mut delta);
                        delta.into_bytes()
                    }
                    _ => instance.as_bytes().to_vec(),
                };
                data.clear_dirty();
                Some((instance.into_bytes(), delta))
            } else {
                None
            }
        };

        // a clean object, or one that wrote nothing, creates no version
        let Some((instance, delta)) = serialized.filter(|(_, delta)| !delta.is_empty()) else {
            return Ok(self.version());
        };

        let mut role = self.role.lock();
        match &mut *role {
            Role::Master(master) => {
                let version = master.state.commit(instance, delta.clone())?;
                let command = packets::command(
                    ObjectCommand::Delta,
                    self.id.as_u128(),
                    &DeltaPayload {
                        version,
                        is_instance: self.change_type != ChangeType::Delta,
                        data: delta,
                    },
                );
                for peer in master.slaves.values() {
                    if let Err(error) = peer.send(&command) {
                        warn!(
                            "ObjectInstance: could not send {} of {} to {}: {}",
                            version,
                            self.id,
                            peer.node_id(),
                            error
                        );
                    }
                }
                debug!("ObjectInstance: {} committed {}", self.id, version);
                Ok(version)
            }
            Role::Slave(slave) => {
                let sequence = slave.state.begin_commit();
                slave.master.send(&packets::command(
                    ObjectCommand::SlaveDelta,
                    self.id.as_u128(),
                    &SlaveDeltaPayload {
                        sequence,
                        data: delta,
                    },
                ))?;
                Ok(slave.state.version())
            }
            Role::Detached(_) => Err(NodeError::Detached { object_id: self.id }),
        }
    }

    /// Applies received versions according to `target`. On a master this
    /// applies the changes slaves committed.
    pub fn sync(&self, target: SyncTarget, timeout: Duration) -> Result<Version, NodeError> {
        let deadline = Instant::now() + timeout;
        let mut role = self.role.lock();
        if matches!(&*role, Role::Master(_)) {
            drop(role);
            return self.sync_master();
        }
        let mut applied = 0usize;
        let mut timed_out = false;

        loop {
            let slave = match &mut *role {
                // nothing turns back into a master
                Role::Master(master) => return Ok(master.state.head_version()),
                Role::Slave(slave) => slave,
                Role::Detached(_) => return Err(NodeError::Detached { object_id: self.id }),
            };

            let reached = match target {
                SyncTarget::Head => slave.state.next_ready().is_none(),
                SyncTarget::Next => applied > 0,
                SyncTarget::Version(version) => slave.state.version() >= version,
            };
            if reached {
                break;
            }

            match slave.state.apply(|pending| self.apply_pending(pending)) {
                Some(Ok(_)) => {
                    applied += 1;
                    continue;
                }
                Some(Err(error)) => {
                    warn!(
                        "ObjectInstance: {} could not apply a received version, resyncing: {}",
                        self.id, error
                    );
                    let resync = Command::new(ObjectCommand::Resync, self.id.as_u128(), Vec::new());
                    if let Err(send_error) = slave.master.send(&resync) {
                        warn!("ObjectInstance: could not resync {}: {}", self.id, send_error);
                    }
                    return Err(error);
                }
                None => {}
            }

            if timed_out {
                let version = match target {
                    SyncTarget::Version(version) => version,
                    _ => slave.state.version().next()?,
                };
                return Err(NodeError::SyncTimeout {
                    object_id: self.id,
                    version,
                });
            }
            timed_out = self.changed.wait_until(&mut role, deadline).timed_out();
        }

        let Role::Slave(slave) = &*role else {
            return Err(NodeError::Detached { object_id: self.id });
        };
        let version = slave.state.version();
        if applied > 0 {
            let obsolete = packets::command(
                ObjectCommand::Obsolete,
                self.id.as_u128(),
                &ObsoletePayload { version },
            );
            if let Err(error) = slave.master.send(&obsolete) {
                warn!("ObjectInstance: could not acknowledge {} of {}: {}", version, self.id, error);
            }
        }
        Ok(version)
    }

    pub fn set_auto_obsolete(&self, count: u32) -> Result<(), NodeError> {
        match &mut *self.role.lock() {
            Role::Master(master) => {
                master.state.set_auto_obsolete(count);
                Ok(())
            }
            _ => Err(NodeError::NotMaster { object_id: self.id }),
        }
    }

    /// The current data as a push payload
    pub fn push_payload(&self, group: u128, type_id: u128) -> PushPayload {
        let version = self.version();
        let mut writer = DataOStream::new();
        self.data.read().get_instance_data(&mut writer);
        PushPayload {
            group,
            type_id,
            version,
            data: writer.into_bytes(),
        }
    }

    /// Detaches a master from its slaves. Waits up to `timeout` for every
    /// slave to acknowledge the head version first.
    pub fn unregister(&self, timeout: Duration) -> Result<(), NodeError> {
        let deadline = Instant::now() + timeout;
        let mut role = self.role.lock();
        loop {
            match &*role {
                Role::Master(master) if !master.state.all_acknowledged() => {}
                Role::Master(_) => break,
                _ => return Err(NodeError::NotMaster { object_id: self.id }),
            }
            if self.changed.wait_until(&mut role, deadline).timed_out() {
                warn!(
                    "ObjectInstance: unregistering {} before all slaves acknowledged it",
                    self.id
                );
                break;
            }
        }

        let previous = std::mem::replace(&mut *role, Role::Detached(Version::NONE));
        if let Role::Master(master) = previous {
            *role = Role::Detached(master.state.head_version());
            let detach = Command::new(ObjectCommand::Detach, self.id.as_u128(), Vec::new());
            for peer in master.slaves.values() {
                if let Err(error) = peer.send(&detach) {
                    debug!("ObjectInstance: could not detach {} from {}: {}", self.id, peer.node_id(), error);
                }
            }
        }
        self.changed.notify_all();
        info!("ObjectInstance: unregistered {}", self.id);
        Ok(())
    }

    /// Detaches a slave from its master. Waits up to `timeout` for the
    /// master to acknowledge this slave's outstanding commits first.
    pub fn unmap(&self, timeout: Duration) -> Result<(), NodeError> {
        let deadline = Instant::now() + timeout;
        let mut role = self.role.lock();
        loop {
            match &*role {
                Role::Slave(slave) if slave.state.has_outstanding_commits() => {}
                Role::Slave(_) | Role::Detached(_) => break,
                Role::Master(_) => return Err(NodeError::NotSlave { object_id: self.id }),
            }
            if self.changed.wait_until(&mut role, deadline).timed_out() {
                warn!(
                    "ObjectInstance: unmapping {} with unacknowledged commits",
                    self.id
                );
                break;
            }
        }

        if let Role::Slave(slave) = &*role {
            let version = slave.state.version();
            let unmap = packets::command(
                NodeCommand::UnmapObject,
                slave.master.node_id().as_u128(),
                &UnmapObjectPayload { object_id: self.id },
            );
            if let Err(error) = slave.master.send(&unmap) {
                debug!("ObjectInstance: could not unmap {}: {}", self.id, error);
            }
            *role = Role::Detached(version);
        }
        self.changed.notify_all();
        Ok(())
    }

    // Each change a slave committed becomes a version of its own, sent to
    // every slave. The author already has the change and gets the full
    // instance so applying it again is harmless.
    fn sync_master(&self) -> Result<Version, NodeError> {
        let _commit = self.commit_lock.lock();
        let mut role = self.role.lock();
        let Role::Master(master) = &mut *role else {
            return Err(NodeError::Detached { object_id: self.id });
        };
        for delta in master.state.take_slave_deltas() {
            self.apply_slave_delta(master, delta)?;
        }
        Ok(master.state.head_version())
    }

    fn apply_slave_delta(&self, master: &mut MasterRole, delta: SlaveDelta) -> Result<(), NodeError> {
        let is_instance = self.change_type != ChangeType::Delta;
        let pending = PendingVersion {
            version: master.state.head_version().next()?,
            is_instance,
            data: delta.data,
        };
        self.apply_pending(&pending)?;

        let mut writer = DataOStream::new();
        self.data.read().get_instance_data(&mut writer);
        let instance = writer.into_bytes();
        let changes = if is_instance {
            instance.clone()
        } else {
            pending.data
        };

        let version = master.state.commit(instance.clone(), changes.clone())?;
        let target = self.id.as_u128();
        let to_others = packets::command(
            ObjectCommand::Delta,
            target,
            &DeltaPayload {
                version,
                is_instance,
                data: changes,
            },
        );
        let to_author = packets::command(
            ObjectCommand::Delta,
            target,
            &DeltaPayload {
                version,
                is_instance: true,
                data: instance,
            },
        );
        for peer in master.slaves.values() {
            let command = if peer.node_id() == delta.node_id {
                &to_author
            } else {
                &to_others
            };
            if let Err(error) = peer.send(command) {
                warn!(
                    "ObjectInstance: could not send {} of {} to {}: {}",
                    version,
                    self.id,
                    peer.node_id(),
                    error
                );
            }
        }
        debug!(
            "ObjectInstance: {} committed {} from {}",
            self.id, version, delta.node_id
        );
        Ok(())
    }

    fn apply_pending(&self, pending: &PendingVersion) -> Result<(), NodeError> {
        let mut data = self.data.write();
        let mut reader = DataIStream::new(&pending.data);
        if pending.is_instance {
            data.apply_instance_data(&mut reader)?;
        } else {
            data.unpack(&mut reader)?;
        }
        if let Err(error) = reader.expect_end() {
            warn!(
                "ObjectInstance: {} did not read all data of {}: {}",
                self.id, pending.version, error
            );
        }
        Ok(())
    }

    fn handle_instance(&self, peer: &Arc<Peer>, command: &Command) -> Result<CommandResult, NodeError> {
        let payload: InstancePayload = packets::read(command)?;
        let mut role = self.role.lock();
        let Role::Slave(slave) = &mut *role else {
            return Ok(CommandResult::Discard);
        };
        if slave.master.node_id() != peer.node_id() {
            return Ok(CommandResult::Discard);
        }
        if !slave.state.receive_instance(payload.version, payload.data) {
            return Ok(CommandResult::Discard);
        }
        self.changed.notify_all();
        Ok(CommandResult::Handled)
    }

    fn handle_delta(&self, peer: &Arc<Peer>, command: &Command) -> Result<CommandResult, NodeError> {
        let payload: DeltaPayload = packets::read(command)?;
        let mut role = self.role.lock();
        let Role::Slave(slave) = &mut *role else {
            return Ok(CommandResult::Discard);
        };
        if slave.master.node_id() != peer.node_id() {
            return Ok(CommandResult::Discard);
        }

        match slave
            .state
            .receive_delta(payload.version, payload.is_instance, payload.data)
        {
            DeltaOutcome::Queued => {
                self.changed.notify_all();
                Ok(CommandResult::Handled)
            }
            DeltaOutcome::Gap { expected, received } => {
                warn!(
                    "ObjectInstance: {} expected {} but received {}, resyncing",
                    self.id, expected, received
                );
                slave.master.send(&Command::new(
                    ObjectCommand::Resync,
                    self.id.as_u128(),
                    Vec::new(),
                ))?;
                Ok(CommandResult::Handled)
            }
            DeltaOutcome::Duplicate | DeltaOutcome::Resyncing => Ok(CommandResult::Discard),
        }
    }

    fn handle_slave_delta(&self, peer: &Arc<Peer>, command: &Command) -> Result<CommandResult, NodeError> {
        let payload: SlaveDeltaPayload = packets::read(command)?;
        let mut role = self.role.lock();
        let Role::Master(master) = &mut *role else {
            return Ok(CommandResult::Discard);
        };

        match master
            .state
            .queue_slave_delta(peer.node_id(), payload.sequence, payload.data)
        {
            Ok(true) => {}
            Ok(false) | Err(ObjectError::UnknownSlave { .. }) => {
                return Ok(CommandResult::Discard)
            }
            Err(error) => return Err(error.into()),
        }
        peer.send(&packets::command(
            ObjectCommand::Commit,
            self.id.as_u128(),
            &CommitPayload {
                sequence: payload.sequence,
            },
        ))?;
        self.changed.notify_all();
        Ok(CommandResult::Handled)
    }

    fn handle_commit(&self, command: &Command) -> Result<CommandResult, NodeError> {
        let payload: CommitPayload = packets::read(command)?;
        let mut role = self.role.lock();
        let Role::Slave(slave) = &mut *role else {
            return Ok(CommandResult::Discard);
        };
        if !slave.state.acknowledge_commit(payload.sequence) {
            return Ok(CommandResult::Discard);
        }
        self.changed.notify_all();
        Ok(CommandResult::Handled)
    }

    fn handle_push(&self, command: &Command) -> Result<CommandResult, NodeError> {
        let payload: PushPayload = packets::read(command)?;
        let mut role = self.role.lock();
        let Role::Slave(slave) = &mut *role else {
            return Ok(CommandResult::Discard);
        };
        if !slave.state.receive_instance(payload.version, payload.data) {
            return Ok(CommandResult::Discard);
        }
        self.changed.notify_all();
        Ok(CommandResult::Handled)
    }

    fn handle_obsolete(&self, peer: &Arc<Peer>, command: &Command) -> Result<CommandResult, NodeError> {
        let payload: ObsoletePayload = packets::read(command)?;
        let mut role = self.role.lock();
        let Role::Master(master) = &mut *role else {
            return Ok(CommandResult::Discard);
        };
        if master.state.acknowledge(&peer.node_id(), payload.version).is_err() {
            return Ok(CommandResult::Discard);
        }
        self.changed.notify_all();
        Ok(CommandResult::Handled)
    }

    fn handle_resync(&self, peer: &Arc<Peer>) -> Result<CommandResult, NodeError> {
        let role = self.role.lock();
        let Role::Master(master) = &*role else {
            return Ok(CommandResult::Discard);
        };
        if !master.state.has_slave(&peer.node_id()) {
            return Ok(CommandResult::Discard);
        }

        let head = master.state.head();
        info!(
            "ObjectInstance: resyncing {} on {} at {}",
            self.id,
            peer.node_id(),
            head.version
        );
        peer.send(&packets::command(
            ObjectCommand::Instance,
            self.id.as_u128(),
            &InstancePayload {
                version: head.version,
                data: head.instance.clone(),
            },
        ))?;
        Ok(CommandResult::Handled)
    }

    fn handle_detach(&self, peer: &Arc<Peer>) -> CommandResult {
        let mut role = self.role.lock();
        let version = match &*role {
            Role::Slave(slave) if slave.master.node_id() == peer.node_id() => slave.state.version(),
            _ => return CommandResult::Discard,
        };
        *role = Role::Detached(version);
        self.changed.notify_all();
        info!("ObjectInstance: master of {} unregistered it", self.id);
        CommandResult::Handled
    }
}

impl<T: Distributable> Handler<Arc<Peer>> for ObjectInstance<T> {
    fn dispatch(&self, peer: &Arc<Peer>, command: &Command) -> CommandResult {
        let CommandKind::Object(object_command) = command.kind() else {
            return CommandResult::Error;
        };

        let result = match object_command {
            ObjectCommand::Instance => self.handle_instance(peer, command),
            ObjectCommand::Delta => self.handle_delta(peer, command),
            ObjectCommand::SlaveDelta => self.handle_slave_delta(peer, command),
            ObjectCommand::Commit => self.handle_commit(command),
            ObjectCommand::Push => self.handle_push(command),
            ObjectCommand::Obsolete => self.handle_obsolete(peer, command),
            ObjectCommand::Resync => self.handle_resync(peer),
            ObjectCommand::Detach => Ok(self.handle_detach(peer)),
            ObjectCommand::BarrierEnter | ObjectCommand::BarrierEnterReply => {
                warn!("ObjectInstance: {} is not a barrier", self.id);
                return CommandResult::Error;
            }
        };

        result.unwrap_or_else(|error| {
            warn!(
                "ObjectInstance: {} failed to handle {} from {}: {}",
                self.id,
                command.kind(),
                peer.node_id(),
                error
            );
            CommandResult::Error
        })
    }
}

impl<T: Distributable> ObjectCm for ObjectInstance<T> {
    fn object_id(&self) -> ObjectId {
        self.id
    }

    fn is_master(&self) -> bool {
        matches!(&*self.role.lock(), Role::Master(_))
    }

    fn add_slave(&self, peer: &Arc<Peer>, version: Option<Version>) -> Result<Version, NodeError> {
        let mut role = self.role.lock();
        let Role::Master(master) = &mut *role else {
            return Err(NodeError::NotMaster { object_id: self.id });
        };

        let target = self.id.as_u128();
        let requested = version.unwrap_or(master.state.head_version());
        let record = master.state.instance_at(requested);
        let start = record.version;

        let mut commands = vec![packets::command(
            ObjectCommand::Instance,
            target,
            &InstancePayload {
                version: start,
                data: record.instance.clone(),
            },
        )];
        for record in master.state.deltas_after(start) {
            commands.push(packets::command(
                ObjectCommand::Delta,
                target,
                &DeltaPayload {
                    version: record.version,
                    is_instance: self.change_type != ChangeType::Delta,
                    data: record.delta.clone(),
                },
            ));
        }
        for command in &commands {
            peer.send(command)?;
        }

        master.state.add_slave(peer.node_id(), start);
        master.slaves.insert(peer.node_id(), peer.clone());
        info!(
            "ObjectInstance: {} mapped by {} at {}",
            self.id,
            peer.node_id(),
            start
        );
        Ok(start)
    }

    fn remove_slave(&self, node_id: &NodeId) {
        let mut role = self.role.lock();
        if let Role::Master(master) = &mut *role {
            master.state.remove_slave(node_id);
            master.slaves.remove(node_id);
            self.changed.notify_all();
        }
    }

    fn peer_lost(&self, node_id: &NodeId) {
        let mut role = self.role.lock();
        let detached = match &mut *role {
            Role::Master(master) => {
                master.state.remove_slave(node_id);
                master.slaves.remove(node_id);
                None
            }
            Role::Slave(slave) if slave.master.node_id() == *node_id => Some(slave.state.version()),
            _ => None,
        };
        if let Some(version) = detached {
            warn!("ObjectInstance: lost the master of {}", self.id);
            *role = Role::Detached(version);
        }
        self.changed.notify_all();
    }
}
