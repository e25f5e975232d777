use std::time::Duration;

use super::socket::DEFAULT_REQUEST_TIMEOUT;

#[derive(Debug, Clone)]
/// Transport configurations
pub struct Config {
    /// Explicit port to listen on.
    ///
    /// Defaults to None, where [super::DEFAULT_PORT] is tried first,
    /// falling back to a random port.
    pub port: Option<u16>,
    /// UDP socket request timeout duration.
    ///
    /// A peer that doesn't answer within this duration is considered
    /// unreachable and removed from the routing table.
    ///
    /// Defaults to [DEFAULT_REQUEST_TIMEOUT]
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}
