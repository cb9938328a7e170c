/// Integration tests for unregistering masters and unmapping slaves

use std::{
    thread,
    time::{Duration, Instant},
};

use lattice_node::{LocalNode, NodeConfig, NodeError};
use lattice_shared::{SyncTarget, Version};
use lattice_test::{init_logging, tcp_pair, test_config, wait_until, Counter};

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn unregister_waits_for_slaves_to_acknowledge_head() {
    let (server, client) = tcp_pair();

    let master = server.register_object(Counter::new(1)).unwrap();
    let slave = client.map_object(master.id(), Counter::default()).unwrap();
    master.get_mut().set(2);
    let head = master.commit().unwrap();

    thread::scope(|scope| {
        scope.spawn(|| {
            thread::sleep(Duration::from_millis(100));
            slave.sync(SyncTarget::Version(head)).unwrap();
        });

        let start = Instant::now();
        server.unregister_object(&master).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    });

    assert_eq!(slave.get().value(), 2);
    assert!(wait_until(WAIT, || matches!(
        slave.sync(SyncTarget::Head),
        Err(NodeError::Detached { .. })
    )));
    master.get_mut().set(3);
    assert!(matches!(master.commit(), Err(NodeError::Detached { .. })));
}

#[test]
fn unregister_gives_up_after_request_timeout() {
    init_logging();
    let server = LocalNode::new(NodeConfig {
        request_timeout: Duration::from_millis(200),
        ..test_config()
    });
    server.listen().unwrap();
    let client = LocalNode::new(test_config());
    client
        .connect(&server.listen_descriptions().remove(0))
        .unwrap();

    let master = server.register_object(Counter::new(1)).unwrap();
    let slave = client.map_object(master.id(), Counter::default()).unwrap();
    master.get_mut().set(2);
    master.commit().unwrap();

    let start = Instant::now();
    server.unregister_object(&master).unwrap();
    assert!(start.elapsed() >= Duration::from_millis(150));
    assert!(wait_until(WAIT, || matches!(
        slave.sync(SyncTarget::Head),
        Err(NodeError::Detached { .. })
    )));
}

#[test]
fn unmap_waits_for_commit_acknowledgement() {
    let (server, client) = tcp_pair();

    let master = server.register_object(Counter::new(1)).unwrap();
    let slave = client.map_object(master.id(), Counter::default()).unwrap();

    slave.get_mut().set(10);
    slave.commit().unwrap();
    client.unmap_object(&slave).unwrap();

    // acknowledged means queued on the master, even after the unmap
    assert_eq!(master.sync(SyncTarget::Head).unwrap(), Version::FIRST);
    assert_eq!(master.get().value(), 10);

    // the slave is gone, so unregister does not wait
    master.get_mut().set(11);
    master.commit().unwrap();
    let start = Instant::now();
    server.unregister_object(&master).unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn unregistered_object_can_not_be_mapped() {
    let (server, client) = tcp_pair();

    let master = server.register_object(Counter::new(1)).unwrap();
    server.unregister_object(&master).unwrap();

    let result = client.map_object_from(&server.node_id(), master.id(), Counter::default());
    assert!(matches!(result, Err(NodeError::MapFailed { .. })));
}

#[test]
fn unregister_requires_the_master_instance() {
    let (server, client) = tcp_pair();

    let master = server.register_object(Counter::new(1)).unwrap();
    let slave = client.map_object(master.id(), Counter::default()).unwrap();

    assert!(matches!(
        client.unregister_object(&slave),
        Err(NodeError::NotMaster { .. })
    ));
    assert!(matches!(
        server.unmap_object(&master),
        Err(NodeError::NotSlave { .. })
    ));
}
