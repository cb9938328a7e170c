/// Integration tests for connecting, disconnecting and tearing down peers

use std::time::{Duration, Instant};

use lattice_node::{LocalNode, NodeConfig, NodeError};
use lattice_shared::{ConnectionDescription, ConnectionType, SyncTarget};
use lattice_test::{init_logging, listening_node, pipe_pair, tcp_pair, test_config, wait_until, Counter};

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn handshake_registers_both_peers() {
    let (server, client) = tcp_pair();

    let server_peer = client.peer(&server.node_id()).unwrap();
    assert!(server_peer.is_connected());
    assert_eq!(
        server_peer.listen_descriptions(),
        server.listen_descriptions().as_slice()
    );

    let client_peer = server.peer(&client.node_id()).unwrap();
    assert_eq!(client_peer.node_id(), client.node_id());
    let advertised = client_peer.listen_descriptions();
    assert_eq!(advertised.len(), 1);
    assert_eq!(advertised[0].connection_type, ConnectionType::TcpIp);
    assert_eq!(advertised[0].port, client.listen_descriptions()[0].port);
}

#[test]
fn listen_reports_the_bound_port() {
    init_logging();
    let node = listening_node();

    let descriptions = node.listen_descriptions();
    assert_eq!(descriptions.len(), 1);
    assert_ne!(descriptions[0].port, 0);
}

#[test]
fn two_concurrent_connections_close_independently() {
    init_logging();
    let server = listening_node();
    let first = listening_node();
    let second = listening_node();
    let description = server.listen_descriptions().remove(0);
    first.connect(&description).unwrap();
    second.connect(&description).unwrap();
    assert_eq!(server.peers().len(), 2);

    let master = server.register_object(Counter::new(1)).unwrap();
    let first_slave = first.map_object(master.id(), Counter::default()).unwrap();
    let second_slave = second.map_object(master.id(), Counter::default()).unwrap();

    first.disconnect(&server.node_id()).unwrap();
    assert!(wait_until(WAIT, || server.peers().len() == 1));
    assert!(server.peer(&second.node_id()).is_some());

    master.get_mut().set(2);
    let version = master.commit().unwrap();
    assert_eq!(
        second_slave.sync(SyncTarget::Version(version)).unwrap(),
        version
    );
    assert_eq!(second_slave.get().value(), 2);

    // the disconnected node lost its master
    assert!(matches!(
        first_slave.sync(SyncTarget::Head),
        Err(NodeError::Detached { .. })
    ));
}

#[test]
fn duplicate_connection_is_rejected() {
    let (server, client) = tcp_pair();

    let description = server.listen_descriptions().remove(0);
    let result = client.connect(&description);
    assert_eq!(
        result.err(),
        Some(NodeError::AlreadyConnected {
            node_id: server.node_id()
        })
    );
    assert!(client.peer(&server.node_id()).unwrap().is_connected());
}

#[test]
fn connecting_to_a_closed_node_fails() {
    init_logging();
    let server = listening_node();
    let description = server.listen_descriptions().remove(0);
    server.close();

    let client = LocalNode::new(test_config());
    let result = client.connect(&description);
    assert!(matches!(result, Err(NodeError::Connection(_))));
    assert!(client.peers().is_empty());
}

#[test]
fn sdp_connections_are_unsupported() {
    init_logging();
    let mut description = ConnectionDescription::tcp("127.0.0.1", 4242);
    description.connection_type = ConnectionType::Sdp;

    let node = LocalNode::new(NodeConfig {
        listen: vec![description.clone()],
        ..test_config()
    });
    assert!(matches!(node.listen(), Err(NodeError::Connection(_))));
    assert!(matches!(
        node.connect(&description),
        Err(NodeError::Connection(_))
    ));
}

#[test]
fn closed_node_refuses_work() {
    let (server, client) = pipe_pair();
    client.close();

    assert!(client.is_closed());
    assert!(client.peers().is_empty());
    assert!(matches!(
        client.register_object(Counter::new(0)),
        Err(NodeError::Closed)
    ));
    assert!(wait_until(WAIT, || server.peers().is_empty()));
}

#[test]
fn master_forgets_slaves_of_a_lost_peer() {
    init_logging();
    let config = NodeConfig {
        request_timeout: Duration::from_secs(2),
        ..test_config()
    };
    let server = LocalNode::new(config);
    server.listen().unwrap();
    let client = listening_node();
    client
        .connect(&server.listen_descriptions().remove(0))
        .unwrap();

    let master = server.register_object(Counter::new(1)).unwrap();
    let _slave = client.map_object(master.id(), Counter::default()).unwrap();
    master.get_mut().set(2);
    master.commit().unwrap();

    drop(client);
    assert!(wait_until(WAIT, || server.peers().is_empty()));

    // no slave is left to wait for
    let start = Instant::now();
    server.unregister_object(&master).unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn slaves_detach_when_their_master_node_closes() {
    let (server, client) = tcp_pair();

    let master = server.register_object(Counter::new(7)).unwrap();
    let slave = client.map_object(master.id(), Counter::default()).unwrap();

    server.close();
    assert!(wait_until(WAIT, || matches!(
        slave.sync(SyncTarget::Head),
        Err(NodeError::Detached { .. })
    )));
    assert_eq!(slave.get().value(), 7);
    assert!(matches!(slave.commit(), Err(NodeError::Detached { .. })));
}
