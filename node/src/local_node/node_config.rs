use std::{default::Default, time::Duration};

use lattice_shared::{ConnectionConfig, ConnectionDescription, TIMEOUT_INDEFINITE};

/// Contains Config properties which will be used by a LocalNode
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Endpoints the node accepts peers on. Port 0 picks a free port.
    pub listen: Vec<ConnectionDescription>,
    /// Used to configure the connections to peers
    pub connection: ConnectionConfig,
    /// How long map, master discovery and unregister wait for peers to
    /// answer
    pub request_timeout: Duration,
    /// Timeout used by `NetBarrier::enter_default`
    pub barrier_timeout_ms: u32,
    /// Number of versions before head a newly registered master retains
    pub auto_obsolete: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen: vec![ConnectionDescription::tcp("", 0)],
            connection: ConnectionConfig::default(),
            request_timeout: Duration::from_secs(10),
            barrier_timeout_ms: TIMEOUT_INDEFINITE,
            auto_obsolete: 0,
        }
    }
}
