use std::fmt;

use super::error::CommandError;

const NODE_TARGET: u32 = 1;
const OBJECT_TARGET: u32 = 2;

/// Commands addressed to a node as a whole
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeCommand {
    Connect,
    ConnectReply,
    Disconnect,
    FindMaster,
    FindMasterReply,
    MapObject,
    MapObjectReply,
    UnmapObject,
}

impl NodeCommand {
    fn code(&self) -> u16 {
        match self {
            NodeCommand::Connect => 1,
            NodeCommand::ConnectReply => 2,
            NodeCommand::Disconnect => 3,
            NodeCommand::FindMaster => 4,
            NodeCommand::FindMasterReply => 5,
            NodeCommand::MapObject => 6,
            NodeCommand::MapObjectReply => 7,
            NodeCommand::UnmapObject => 8,
        }
    }

    fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            1 => NodeCommand::Connect,
            2 => NodeCommand::ConnectReply,
            3 => NodeCommand::Disconnect,
            4 => NodeCommand::FindMaster,
            5 => NodeCommand::FindMasterReply,
            6 => NodeCommand::MapObject,
            7 => NodeCommand::MapObjectReply,
            8 => NodeCommand::UnmapObject,
            _ => return None,
        })
    }
}

/// Commands addressed to one distributed object
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjectCommand {
    /// Full snapshot at a version
    Instance,
    /// One committed version, master to slave
    Delta,
    /// A slave's change, slave to master
    SlaveDelta,
    /// Acknowledges a slave delta
    Commit,
    /// Unsolicited instance data
    Push,
    /// Slave reports the versions it no longer needs
    Obsolete,
    /// Slave detected a gap and asks for a new instance
    Resync,
    /// Master unregistered the object
    Detach,
    BarrierEnter,
    BarrierEnterReply,
}

impl ObjectCommand {
    pub const ALL: [ObjectCommand; 10] = [
        ObjectCommand::Instance,
        ObjectCommand::Delta,
        ObjectCommand::SlaveDelta,
        ObjectCommand::Commit,
        ObjectCommand::Push,
        ObjectCommand::Obsolete,
        ObjectCommand::Resync,
        ObjectCommand::Detach,
        ObjectCommand::BarrierEnter,
        ObjectCommand::BarrierEnterReply,
    ];

    fn code(&self) -> u16 {
        match self {
            ObjectCommand::Instance => 1,
            ObjectCommand::Delta => 2,
            ObjectCommand::SlaveDelta => 3,
            ObjectCommand::Commit => 4,
            ObjectCommand::Push => 5,
            ObjectCommand::Obsolete => 6,
            ObjectCommand::Resync => 7,
            ObjectCommand::Detach => 8,
            ObjectCommand::BarrierEnter => 9,
            ObjectCommand::BarrierEnterReply => 10,
        }
    }

    fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            1 => ObjectCommand::Instance,
            2 => ObjectCommand::Delta,
            3 => ObjectCommand::SlaveDelta,
            4 => ObjectCommand::Commit,
            5 => ObjectCommand::Push,
            6 => ObjectCommand::Obsolete,
            7 => ObjectCommand::Resync,
            8 => ObjectCommand::Detach,
            9 => ObjectCommand::BarrierEnter,
            10 => ObjectCommand::BarrierEnterReply,
            _ => return None,
        })
    }
}

/// The type of a command, scoped by the kind of target it addresses.
///
/// On the wire the tag carries the target kind in its upper 16 bits and the
/// command code in its lower 16 bits, so node and object codes never collide.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Node(NodeCommand),
    Object(ObjectCommand),
}

impl CommandKind {
    pub fn tag(&self) -> u32 {
        match self {
            CommandKind::Node(command) => (NODE_TARGET << 16) | u32::from(command.code()),
            CommandKind::Object(command) => (OBJECT_TARGET << 16) | u32::from(command.code()),
        }
    }

    pub fn from_tag(tag: u32) -> Result<Self, CommandError> {
        let code = (tag & 0xffff) as u16;
        let kind = match tag >> 16 {
            NODE_TARGET => NodeCommand::from_code(code).map(CommandKind::Node),
            OBJECT_TARGET => ObjectCommand::from_code(code).map(CommandKind::Object),
            _ => None,
        };
        kind.ok_or(CommandError::UnknownCommand { tag })
    }

    pub fn is_object_command(&self) -> bool {
        matches!(self, CommandKind::Object(_))
    }
}

impl From<NodeCommand> for CommandKind {
    fn from(command: NodeCommand) -> Self {
        CommandKind::Node(command)
    }
}

impl From<ObjectCommand> for CommandKind {
    fn from(command: ObjectCommand) -> Self {
        CommandKind::Object(command)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Node(command) => write!(f, "Node::{:?}", command),
            CommandKind::Object(command) => write!(f, "Object::{:?}", command),
        }
    }
}
