/// End-to-end tests for committing and mapping versioned objects between
/// two nodes

use std::time::Duration;

use lattice_node::{LocalNode, NodeError};
use lattice_shared::{
    DataIStream, DataOStream, Distributable, ObjectError, SerdeErr, SyncTarget, Version,
};
use lattice_test::{
    listening_node, pipe_pair, tcp_pair, wait_until, Counter, Journal, Settings,
};

/// A counter whose copies refuse values above 100
#[derive(Default)]
struct Bounded {
    value: u64,
}

impl Distributable for Bounded {
    fn get_instance_data(&self, writer: &mut DataOStream) {
        writer.write(&self.value);
    }

    fn apply_instance_data(&mut self, reader: &mut DataIStream) -> Result<(), SerdeErr> {
        let value: u64 = reader.read()?;
        if value > 100 {
            return Err(SerdeErr::InvalidValue {
                type_name: "Bounded",
                value,
            });
        }
        self.value = value;
        Ok(())
    }
}

/// A master node plus `slaves` nodes connected to it over TCP
fn star(slaves: usize) -> (LocalNode, Vec<LocalNode>) {
    let (server, first) = tcp_pair();
    let description = server.listen_descriptions().remove(0);
    let mut nodes = vec![first];
    for _ in 1..slaves {
        let node = listening_node();
        node.connect(&description).unwrap();
        nodes.push(node);
    }
    (server, nodes)
}

#[test]
fn slave_maps_head_after_two_commits() {
    let (server, client) = tcp_pair();

    let master = server.register_object(Counter::new(1)).unwrap();
    master.get_mut().set(2);
    assert_eq!(master.commit().unwrap(), Version::new(1));
    master.get_mut().set(3);
    assert_eq!(master.commit().unwrap(), Version::new(2));

    let slave = client.map_object(master.id(), Counter::default()).unwrap();
    assert!(!slave.is_master());
    assert_eq!(slave.version(), Version::new(2));
    assert_eq!(slave.head_version(), Version::new(2));
    assert_eq!(slave.get().value(), 3);
}

#[test]
fn slave_sees_commits_after_sync() {
    let (server, client) = pipe_pair();

    let master = server.register_object(Counter::new(5)).unwrap();
    let slave = client
        .map_object_from(&server.node_id(), master.id(), Counter::default())
        .unwrap();
    assert_eq!(slave.version(), Version::NONE);
    assert_eq!(slave.get().value(), 5);

    master.get_mut().add(1);
    let version = master.commit().unwrap();

    assert_eq!(slave.sync(SyncTarget::Next).unwrap(), version);
    assert_eq!(slave.get().value(), 6);

    // nothing queued, so head returns immediately
    assert_eq!(slave.sync(SyncTarget::Head).unwrap(), version);
}

#[test]
fn received_versions_stay_invisible_until_sync() {
    let (server, client) = pipe_pair();

    let master = server.register_object(Counter::new(0)).unwrap();
    let slave = client.map_object(master.id(), Counter::default()).unwrap();

    for value in 1..=3 {
        master.get_mut().set(value);
        master.commit().unwrap();
    }

    assert!(wait_until(Duration::from_secs(5), || {
        slave.head_version() == Version::new(3)
    }));
    assert_eq!(slave.version(), Version::NONE);
    assert_eq!(slave.get().value(), 0);

    assert_eq!(slave.sync(SyncTarget::Head).unwrap(), Version::new(3));
    assert_eq!(slave.get().value(), 3);
}

#[test]
fn delta_objects_apply_changes_in_order() {
    let (server, client) = tcp_pair();

    let master = server.register_object(Journal::default()).unwrap();
    master.get_mut().append("a");
    master.commit().unwrap();
    master.get_mut().append("b");
    master.commit().unwrap();

    let slave = client.map_object(master.id(), Journal::default()).unwrap();
    assert_eq!(slave.get().entries(), ["a", "b"]);

    master.get_mut().append("c");
    master.commit().unwrap();
    master.get_mut().append("d");
    let head = master.commit().unwrap();

    assert_eq!(slave.sync(SyncTarget::Version(head)).unwrap(), head);
    assert_eq!(slave.get().entries(), ["a", "b", "c", "d"]);
}

#[test]
fn map_object_at_starts_from_retained_version() {
    let (server, client) = tcp_pair();

    let master = server.register_object(Counter::new(0)).unwrap();
    master.set_auto_obsolete(10).unwrap();
    for value in [10, 20, 30] {
        master.get_mut().set(value);
        master.commit().unwrap();
    }

    let slave = client
        .map_object_at(master.id(), Version::new(1), Counter::default())
        .unwrap();
    assert_eq!(slave.version(), Version::new(1));
    assert_eq!(slave.get().value(), 10);
    assert_eq!(slave.head_version(), Version::new(3));

    assert_eq!(
        slave.sync(SyncTarget::Version(Version::new(3))).unwrap(),
        Version::new(3)
    );
    assert_eq!(slave.get().value(), 30);
}

#[test]
fn map_object_at_pruned_version_maps_oldest_retained() {
    let (server, client) = tcp_pair();

    let master = server.register_object(Counter::new(0)).unwrap();
    for value in [10, 20, 30] {
        master.get_mut().set(value);
        master.commit().unwrap();
    }

    let slave = client
        .map_object_at(master.id(), Version::new(1), Counter::default())
        .unwrap();
    assert_eq!(slave.version(), Version::new(3));
    assert_eq!(slave.get().value(), 30);
}

#[test]
fn clean_object_commit_creates_no_version() {
    let (server, _client) = pipe_pair();

    let master = server.register_object(Counter::new(4)).unwrap();
    assert_eq!(master.commit().unwrap(), Version::NONE);

    master.get_mut().set(4);
    assert_eq!(master.commit().unwrap(), Version::FIRST);
    assert_eq!(master.commit().unwrap(), Version::FIRST);
}

#[test]
fn static_objects_map_but_never_commit() {
    let (server, client) = pipe_pair();

    let settings = Settings {
        name: "wall".to_string(),
        width: 1920,
        height: 1080,
    };
    let master = server.register_object(settings.clone()).unwrap();

    let result = master.commit();
    assert_eq!(
        result,
        Err(NodeError::Object(ObjectError::StaticObject {
            object_id: master.id()
        }))
    );

    let slave = client.map_object(master.id(), Settings::default()).unwrap();
    assert_eq!(*slave.get(), settings);
}

#[test]
fn slave_commit_is_applied_by_master_sync() {
    let (server, client) = tcp_pair();

    let master = server.register_object(Counter::new(1)).unwrap();
    let slave = client.map_object(master.id(), Counter::default()).unwrap();

    slave.get_mut().set(42);
    slave.commit().unwrap();

    assert!(
        wait_until(Duration::from_secs(5), || {
            master.sync(SyncTarget::Head).unwrap();
            master.get().value() == 42
        }),
        "master should apply the slave's change on sync"
    );
}

#[test]
fn slave_commit_reaches_every_slave() {
    let (server, nodes) = star(3);

    let master = server.register_object(Counter::new(1)).unwrap();
    let author = nodes[0].map_object(master.id(), Counter::default()).unwrap();
    let other = nodes[1].map_object(master.id(), Counter::default()).unwrap();

    author.get_mut().set(42);
    author.commit().unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        master.sync(SyncTarget::Head).unwrap() == Version::FIRST
    }));
    assert_eq!(master.get().value(), 42);
    // the slave's change is already published
    assert_eq!(master.commit().unwrap(), Version::FIRST);

    for slave in [&author, &other] {
        assert_eq!(
            slave.sync(SyncTarget::Version(Version::FIRST)).unwrap(),
            Version::FIRST
        );
        assert_eq!(slave.get().value(), 42);
    }

    let late = nodes[2].map_object(master.id(), Counter::default()).unwrap();
    assert_eq!(late.version(), Version::FIRST);
    assert_eq!(late.get().value(), 42);
}

#[test]
fn slave_delta_commit_is_not_applied_twice_by_its_author() {
    let (server, nodes) = star(2);

    let master = server.register_object(Journal::default()).unwrap();
    master.get_mut().append("a");
    assert_eq!(master.commit().unwrap(), Version::FIRST);
    let author = nodes[0].map_object(master.id(), Journal::default()).unwrap();
    let other = nodes[1].map_object(master.id(), Journal::default()).unwrap();

    author.get_mut().append("b");
    author.commit().unwrap();
    let head = Version::new(2);
    assert!(wait_until(Duration::from_secs(5), || {
        master.sync(SyncTarget::Head).unwrap() == head
    }));

    let expected = vec!["a".to_string(), "b".to_string()];
    assert_eq!(master.get().entries(), expected.as_slice());
    for slave in [&author, &other] {
        assert_eq!(slave.sync(SyncTarget::Version(head)).unwrap(), head);
        assert_eq!(slave.get().entries(), expected.as_slice());
    }
}

#[test]
fn rejected_version_keeps_slave_at_its_data() {
    let (server, client) = tcp_pair();

    let master = server.register_object(Bounded { value: 1 }).unwrap();
    let slave = client.map_object(master.id(), Bounded::default()).unwrap();
    assert_eq!(slave.get().value, 1);

    master.get_mut().value = 500;
    assert_eq!(master.commit().unwrap(), Version::FIRST);
    assert!(wait_until(Duration::from_secs(5), || {
        slave.head_version() == Version::FIRST
    }));

    assert!(matches!(
        slave.sync(SyncTarget::Head),
        Err(NodeError::Serde(SerdeErr::InvalidValue { value: 500, .. }))
    ));
    assert_eq!(slave.version(), Version::NONE);
    assert_eq!(slave.get().value, 1);

    // the slave asked for a fresh instance and picks up the next good one
    master.get_mut().value = 50;
    let head = master.commit().unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        slave.sync(SyncTarget::Head).is_ok() && slave.version() == head
    }));
    assert_eq!(slave.get().value, 50);
}

#[test]
fn mapping_an_object_twice_on_one_node_fails() {
    let (server, client) = pipe_pair();

    let master = server.register_object(Counter::new(1)).unwrap();
    let _slave = client.map_object(master.id(), Counter::default()).unwrap();

    let result = client.map_object(master.id(), Counter::default());
    assert!(matches!(result, Err(NodeError::AlreadyMapped { .. })));
}

#[test]
fn mapping_without_master_fails() {
    let (_server, client) = pipe_pair();

    let master = client.register_object(Counter::new(1)).unwrap();
    client.unregister_object(&master).unwrap();

    let result = client.map_object(master.id(), Counter::default());
    assert_eq!(
        result.err(),
        Some(NodeError::MasterNotFound {
            object_id: master.id()
        })
    );
}
