//! Runtime configuration for [`RepServer`](super::RepServer).

use std::time::Duration;

use crate::endpoint::{DEFAULT_SEND_TIMEOUT, EndpointAddress};

/// Address bound when none is configured.
pub const DEFAULT_ADDRESS: &str = "tcp://*:5555";

/// Server configuration.
///
/// # Default Values
/// - `address`: `tcp://*:5555`
/// - `poll_interval`: 500 milliseconds
/// - `error_threshold`: 3
/// - `handler_timeout`: none
/// - `send_timeout`: 5 seconds
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the endpoint binds to, and rebinds to on recovery.
    pub address: EndpointAddress,
    /// Interval between polls of the endpoint.
    pub poll_interval: Duration,
    /// Counted consecutive receive failures that trigger endpoint recreation.
    ///
    /// The first failure of a run is not counted, so recreation happens on
    /// failure number `error_threshold + 1`.
    pub error_threshold: u32,
    /// Upper bound on a single handler call.
    pub handler_timeout: Option<Duration>,
    /// Upper bound on writing one reply. A peer that stalls the write longer
    /// is disconnected and the reply dropped.
    pub send_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: EndpointAddress::from(std::net::SocketAddr::from(([0, 0, 0, 0], 5555))),
            poll_interval: Duration::from_millis(500),
            error_threshold: 3,
            handler_timeout: None,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Clamp values to usable bounds.
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use repframe::server::ServerConfig;
    ///
    /// let cfg = ServerConfig {
    ///     poll_interval: Duration::ZERO,
    ///     error_threshold: 0,
    ///     ..ServerConfig::default()
    /// }
    /// .normalized();
    /// assert_eq!(cfg.poll_interval, Duration::from_millis(1));
    /// assert_eq!(cfg.error_threshold, 1);
    /// ```
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.poll_interval = self.poll_interval.max(Duration::from_millis(1));
        self.error_threshold = self.error_threshold.max(1);
        self.send_timeout = self.send_timeout.max(Duration::from_millis(1));
        self
    }
}
