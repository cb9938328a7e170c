/// Integration tests for barriers shared by several nodes

use std::thread;

use lattice_node::{LocalNode, NodeError};
use lattice_test::{init_logging, listening_node};

fn cluster(size: usize) -> Vec<LocalNode> {
    init_logging();
    let nodes: Vec<LocalNode> = (0..size).map(|_| listening_node()).collect();
    let description = nodes[0].listen_descriptions().remove(0);
    for node in &nodes[1..] {
        node.connect(&description).unwrap();
    }
    nodes
}

#[test]
fn barrier_releases_every_participant_each_round() {
    let nodes = cluster(3);

    let master = nodes[0].create_barrier(3).unwrap();
    let mut mapped: Vec<_> = nodes[1..]
        .iter()
        .map(|node| node.map_barrier(master.id()).unwrap())
        .collect();
    for barrier in &mapped {
        assert_eq!(barrier.id(), master.id());
        assert_eq!(barrier.height(), 3);
    }

    mapped.push(master);
    thread::scope(|scope| {
        let handles: Vec<_> = mapped
            .iter_mut()
            .map(|barrier| {
                scope.spawn(move || {
                    for _ in 0..3 {
                        barrier.enter(5_000)?;
                    }
                    Ok::<(), NodeError>(())
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Ok(()));
        }
    });
    assert!(mapped.iter().all(|barrier| barrier.round() == 3));
}

#[test]
fn barrier_of_height_one_never_blocks() {
    init_logging();
    let node = listening_node();

    let mut barrier = node.create_barrier(1).unwrap();
    barrier.enter(0).unwrap();
    barrier.enter_default().unwrap();
}

#[test]
fn barrier_times_out_without_enough_participants() {
    let nodes = cluster(2);

    let mut master = nodes[0].create_barrier(2).unwrap();
    let _slave = nodes[1].map_barrier(master.id()).unwrap();

    let result = master.enter(50);
    assert_eq!(
        result,
        Err(NodeError::BarrierTimeout {
            barrier_id: master.id(),
            round: 1,
            timeout_ms: 50,
        })
    );
}

#[test]
fn late_participant_completes_the_round() {
    let nodes = cluster(2);

    let mut master = nodes[0].create_barrier(2).unwrap();
    let mut slave = nodes[1].map_barrier(master.id()).unwrap();

    thread::scope(|scope| {
        let waiting = scope.spawn(|| master.enter(5_000));
        thread::sleep(std::time::Duration::from_millis(50));
        slave.enter(5_000).unwrap();
        assert_eq!(waiting.join().unwrap(), Ok(()));
    });
}

#[test]
fn each_handle_numbers_its_own_rounds() {
    let nodes = cluster(2);

    let mut master = nodes[0].create_barrier(2).unwrap();
    let mut slave = nodes[1].map_barrier(master.id()).unwrap();
    let barrier_id = master.id();

    // a round this handle gave up on still counts for it
    assert!(master.enter(20).is_err());
    assert_eq!(master.round(), 1);
    assert_eq!(
        master.enter(20),
        Err(NodeError::BarrierTimeout {
            barrier_id,
            round: 2,
            timeout_ms: 20,
        })
    );
    assert_eq!(slave.round(), 0);
    slave.enter(0).ok();
    assert_eq!(slave.round(), 1);
}

#[test]
fn mapping_an_unknown_barrier_fails() {
    let nodes = cluster(2);

    let master = nodes[0].create_barrier(2).unwrap();
    nodes[0].close();

    let result = nodes[1].map_barrier(master.id());
    assert!(matches!(result, Err(NodeError::MasterNotFound { .. })));
}
