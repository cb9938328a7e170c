use std::{default::Default, time::Duration};

/// Contains Config properties which will be used by every Connection
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// How long an outbound connect may take before failing with a timeout
    pub connect_timeout: Duration,
    /// How often a listening connection checks whether it was closed while
    /// waiting for peers in `accept`
    pub accept_poll_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            accept_poll_interval: Duration::from_millis(10),
        }
    }
}
