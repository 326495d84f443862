//! Configuration for the Bellhop client

use std::time::Duration;

/// Configuration for connecting to a notification server
#[derive(Debug, Clone)]
pub struct BellhopConfig {
    /// Server URL (e.g., "wss://hr.example.com/ws")
    pub url: String,

    /// Maximum number of automatic reconnection attempts before giving up
    pub max_reconnect_attempts: u32,

    /// Base delay before the first reconnection attempt; doubles each attempt
    pub reconnect_delay: Duration,

    /// Cap on the delay between reconnection attempts
    pub max_reconnect_delay: Duration,

    /// Interval between outbound heartbeat frames
    pub heartbeat_interval: Duration,

    /// How long the link may stay silent before it is declared dead
    pub liveness_timeout: Duration,

    /// Capacity of the offline outbound queue; enqueues past this are dropped
    pub queue_capacity: usize,

    /// Timeout for establishing the initial transport connection
    pub connect_timeout: Duration,
}

impl BellhopConfig {
    /// Create a new configuration with the given server URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(30),
            liveness_timeout: Duration::from_secs(90),
            queue_capacity: 100,
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Set the maximum number of automatic reconnection attempts
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the reconnection delay range
    pub fn reconnect_delay(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_delay = initial;
        self.max_reconnect_delay = max;
        self
    }

    /// Set the heartbeat interval
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the silence window after which the link is declared dead.
    /// Should be a small multiple of the heartbeat interval.
    pub fn liveness_timeout(mut self, timeout: Duration) -> Self {
        self.liveness_timeout = timeout;
        self
    }

    /// Set the offline outbound queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the transport connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}
