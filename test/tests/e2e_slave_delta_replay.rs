/// End-to-end test of a master receiving the same slave change twice.
///
/// The test plays a slave by hand over a raw TCP connection:
/// 1. The fake slave connects and maps a counter
/// 2. It sends change 0 twice, then change 1
/// 3. The master acknowledges 0 and 1 once each and keeps the connection

use std::sync::Arc;

use lattice_shared::{
    create_connection, Command, CommandKind, Connection, ConnectionDescription, ConnectionType,
    DataOStream, NodeCommand, NodeId, ObjectCommand, SyncTarget, Version,
};
use lattice_test::{init_logging, listening_node, Counter};

fn send<K: Into<CommandKind>, F: FnOnce(&mut DataOStream)>(
    connection: &Arc<dyn Connection>,
    kind: K,
    target: u128,
    write: F,
) {
    Command::build(kind, target, write)
        .write_to(connection.as_ref())
        .unwrap();
}

fn counter_data(value: u64) -> Vec<u8> {
    let mut writer = DataOStream::new();
    writer.write(&value);
    writer.into_bytes()
}

/// Reads commands until one of `kind` arrives
fn receive<K: Into<CommandKind>>(connection: &Arc<dyn Connection>, kind: K) -> Command {
    let kind = kind.into();
    loop {
        let command = Command::read_from(connection.as_ref()).unwrap();
        if command.kind() == kind {
            return command;
        }
    }
}

#[test]
fn master_ignores_a_replayed_slave_change() {
    init_logging();

    let node = listening_node();
    let master = node.register_object(Counter::new(1)).unwrap();
    let object_id = master.id();
    let slave_id = NodeId::new();

    // Handshake
    let connection = create_connection(ConnectionType::TcpIp).unwrap();
    connection
        .connect(&node.listen_descriptions().remove(0))
        .unwrap();
    send(&connection, NodeCommand::Connect, slave_id.as_u128(), |writer| {
        writer.write(&ConnectionDescription::serialize_list(&[]));
    });
    let reply = receive(&connection, NodeCommand::ConnectReply);
    assert_eq!(reply.target(), node.node_id().as_u128());
    assert!(reply.payload_reader().read::<bool>().unwrap());

    // Map at head
    send(&connection, NodeCommand::MapObject, node.node_id().as_u128(), |writer| {
        writer.write(&7u32).write(&object_id).write(&None::<Version>);
    });
    receive(&connection, ObjectCommand::Instance);
    let mapped = receive(&connection, NodeCommand::MapObjectReply);
    let mut reader = mapped.payload_reader();
    assert_eq!(reader.read::<u32>().unwrap(), 7);
    assert_eq!(reader.read::<Option<Version>>().unwrap(), Some(Version::NONE));

    // Change 0 twice, then change 1
    for (sequence, value) in [(0u32, 5u64), (0, 5), (1, 9)] {
        send(&connection, ObjectCommand::SlaveDelta, object_id.as_u128(), |writer| {
            writer.write(&sequence).write(&counter_data(value));
        });
    }
    let acknowledged: Vec<u32> = (0..2)
        .map(|_| {
            receive(&connection, ObjectCommand::Commit)
                .payload_reader()
                .read()
                .unwrap()
        })
        .collect();
    assert_eq!(acknowledged, vec![0, 1]);
    assert!(node.peer(&slave_id).is_some());

    master.sync(SyncTarget::Head).unwrap();
    assert_eq!(master.get().value(), 9);

    connection.close();
    node.close();
}
