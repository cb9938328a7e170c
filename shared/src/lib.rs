//! # Lattice Shared
//! Connections, command dispatch, object version state machines and
//! synchronization primitives shared by every lattice node.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

#[macro_use]
extern crate cfg_if;

pub use lattice_serde::{ConstByteLength, DataIStream, DataOStream, Serde, SerdeErr};

mod bits;
mod command;
mod connection;
mod ids;
mod object;
mod request;
mod sync;

pub use bits::index_of_last_bit;
pub use command::{
    command::Command,
    command_header::{CommandHeader, MAX_COMMAND_SIZE},
    command_kind::{CommandKind, NodeCommand, ObjectCommand},
    dispatcher::{CommandResult, Dispatcher, Handler},
    error::CommandError,
};
pub use connection::{
    connection::{create_connection, create_connection_with_config, Connection, ConnectionState},
    connection_config::ConnectionConfig,
    connection_description::ConnectionDescription,
    connection_type::ConnectionType,
    error::ConnectionError,
    socket_connection::SocketConnection,
};
pub use ids::{NodeId, ObjectId};
pub use object::{
    change_type::ChangeType,
    distributable::Distributable,
    error::ObjectError,
    master_state::{MasterState, SlaveDelta, VersionRecord},
    slave_state::{DeltaOutcome, PendingVersion, SlaveState},
    version::{SyncTarget, Version},
};
pub use request::{error::RequestError, request_cache::RequestCache};
pub use sync::{
    barrier::Barrier, clock::Clock, deadline_after, error::SyncError, monitor::Monitor,
    timed_lock::{TimedLock, TimedLockGuard}, TIMEOUT_INDEFINITE,
};
