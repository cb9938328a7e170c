/// Integration tests for pushing instance data outside of commits

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use lattice_node::{NodeError, PushEvent};
use lattice_shared::{DataIStream, NodeId, SyncTarget, Version};
use lattice_test::{pipe_pair, tcp_pair, wait_until, Counter};

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn push_reaches_handler_of_node_without_instance() {
    let (server, client) = tcp_pair();

    let received: Arc<Mutex<Vec<PushEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    client.set_push_handler(move |event| sink.lock().unwrap().push(event.clone()));

    let master = server.register_object(Counter::new(9)).unwrap();
    master.push(3, 77, &[client.node_id()]).unwrap();

    assert!(wait_until(WAIT, || !received.lock().unwrap().is_empty()));
    let events = received.lock().unwrap();
    let event = &events[0];
    assert_eq!(event.origin, server.node_id());
    assert_eq!(event.object_id, master.id());
    assert_eq!(event.group, 3);
    assert_eq!(event.type_id, 77);
    assert_eq!(event.version, Version::NONE);

    let mut reader = DataIStream::new(&event.data);
    assert_eq!(reader.read::<u64>().unwrap(), 9);
    assert!(reader.is_empty());
}

#[test]
fn push_replaces_slave_state() {
    let (server, client) = pipe_pair();

    let master = server.register_object(Counter::new(1)).unwrap();
    let slave = client.map_object(master.id(), Counter::default()).unwrap();

    // uncommitted, so only the push carries it
    master.get_mut().set(5);
    master.push(0, 0, &[client.node_id()]).unwrap();

    assert!(wait_until(WAIT, || {
        slave.sync(SyncTarget::Head).unwrap();
        slave.get().value() == 5
    }));
}

#[test]
fn push_without_handler_is_discarded() {
    let (server, client) = pipe_pair();

    let master = server.register_object(Counter::new(1)).unwrap();
    master.push(0, 0, &[client.node_id()]).unwrap();

    // the connection survives the discarded command
    let slave = client.map_object(master.id(), Counter::default()).unwrap();
    assert_eq!(slave.get().value(), 1);
}

#[test]
fn push_to_unknown_node_fails() {
    let (server, _client) = pipe_pair();

    let master = server.register_object(Counter::new(1)).unwrap();
    let stranger = NodeId::new();
    assert_eq!(
        master.push(0, 0, &[stranger]),
        Err(NodeError::UnknownPeer { node_id: stranger })
    );
}
