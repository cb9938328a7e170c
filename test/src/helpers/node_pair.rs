use std::time::Duration;

use log::debug;

use lattice_node::{LocalNode, NodeConfig};
use lattice_shared::ConnectionDescription;

/// Routes `log` output through the test harness. Safe to call from every
/// test.
pub fn init_logging() {
    env_logger::builder().is_test(true).try_init().ok();
}

/// Listens on a free loopback port and gives up on peers quickly
pub fn test_config() -> NodeConfig {
    NodeConfig {
        listen: vec![ConnectionDescription::tcp("127.0.0.1", 0)],
        request_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

pub fn listening_node() -> LocalNode {
    let node = LocalNode::new(test_config());
    node.listen().expect("node should listen on loopback");
    node
}

/// Two listening nodes, the second connected to the first over TCP
pub fn tcp_pair() -> (LocalNode, LocalNode) {
    init_logging();
    let server = listening_node();
    let client = listening_node();
    let description = server.listen_descriptions().remove(0);
    client
        .connect(&description)
        .expect("client should connect to server");
    debug!("tcp_pair: {} connected to {} at {}", client.node_id(), server.node_id(), description);
    (server, client)
}

/// Two nodes that do not listen, connected over an anonymous pipe
pub fn pipe_pair() -> (LocalNode, LocalNode) {
    init_logging();
    let config = NodeConfig {
        listen: Vec::new(),
        ..test_config()
    };
    let server = LocalNode::new(config.clone());
    let client = LocalNode::new(config);
    client
        .connect_local(&server)
        .expect("client should connect to server");
    debug!("pipe_pair: {} connected to {}", client.node_id(), server.node_id());
    (server, client)
}
