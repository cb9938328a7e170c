/// End-to-end test of a slave recovering from a lost version.
///
/// The test plays the master side by hand, speaking the wire protocol over
/// a raw TCP connection, so it can skip a version:
/// 1. The node connects and maps an object at v1
/// 2. The fake master sends v3, skipping v2
/// 3. The slave asks for a resync
/// 4. The fake master answers with the instance at v3

use std::{sync::Arc, thread};

use lattice_node::{LocalNode, NodeConfig};
use lattice_shared::{
    create_connection, Command, CommandKind, Connection, ConnectionDescription, ConnectionType,
    DataOStream, NodeCommand, NodeId, ObjectCommand, ObjectId, SyncTarget, Version,
};
use lattice_test::{init_logging, test_config, Counter};

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
fn receive(connection: &Arc<dyn Connection>, kind: ObjectCommand) -> Command {
    loop {
        let command = Command::read_from(connection.as_ref()).unwrap();
        if command.kind() == CommandKind::Object(kind) {
            return command;
        }
    }
}

#[test]
fn slave_requests_resync_after_version_gap() {
    init_logging();

    let listener = create_connection(ConnectionType::TcpIp).unwrap();
    listener
        .listen(&ConnectionDescription::tcp("127.0.0.1", 0))
        .unwrap();
    let description = listener.description();
    let master_id = NodeId::new();
    let object_id = ObjectId::new();

    let node = LocalNode::new(NodeConfig {
        listen: Vec::new(),
        ..test_config()
    });
    let node_target = node.node_id().as_u128();

    thread::scope(|scope| {
        // Handshake
        let connecting = scope.spawn(|| node.connect(&description));
        let connection = listener.accept().unwrap();
        let connect = Command::read_from(connection.as_ref()).unwrap();
        assert_eq!(connect.kind(), CommandKind::Node(NodeCommand::Connect));
        assert_eq!(connect.target(), node_target);
        send(&connection, NodeCommand::ConnectReply, master_id.as_u128(), |writer| {
            writer.write(&true);
        });
        let peer = connecting.join().unwrap().unwrap();
        assert_eq!(peer.node_id(), master_id);

        // Map at v1
        let mapping = scope.spawn(|| node.map_object_from(&master_id, object_id, Counter::default()));
        let map = Command::read_from(connection.as_ref()).unwrap();
        assert_eq!(map.kind(), CommandKind::Node(NodeCommand::MapObject));
        assert_eq!(map.target(), master_id.as_u128());
        let mut reader = map.payload_reader();
        let request_id: u32 = reader.read().unwrap();
        let mapped: ObjectId = reader.read().unwrap();
        let requested: Option<Version> = reader.read().unwrap();
        assert_eq!(mapped, object_id);
        assert_eq!(requested, None);

        send(&connection, ObjectCommand::Instance, object_id.as_u128(), |writer| {
            writer.write(&Version::new(1)).write(&counter_data(10));
        });
        send(&connection, NodeCommand::MapObjectReply, node_target, |writer| {
            writer.write(&request_id).write(&Some(Version::new(1)));
        });
        let object = mapping.join().unwrap().unwrap();
        assert_eq!(object.version(), Version::new(1));
        assert_eq!(object.get().value(), 10);

        // Skip v2
        send(&connection, ObjectCommand::Delta, object_id.as_u128(), |writer| {
            writer
                .write(&Version::new(3))
                .write(&true)
                .write(&counter_data(30));
        });
        let resync = receive(&connection, ObjectCommand::Resync);
        assert_eq!(resync.target(), object_id.as_u128());
        assert!(resync.payload().is_empty());
        assert_eq!(object.head_version(), Version::new(1));

        send(&connection, ObjectCommand::Instance, object_id.as_u128(), |writer| {
            writer.write(&Version::new(3)).write(&counter_data(30));
        });
        assert_eq!(
            object.sync(SyncTarget::Version(Version::new(3))).unwrap(),
            Version::new(3)
        );
        assert_eq!(object.get().value(), 30);

        node.close();
        listener.close();
    });
}
