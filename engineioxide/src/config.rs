//! Engine.IO server configuration.

use std::time::Duration;

/// Configuration shared by every [`Socket`](crate::socket::Socket) accepted by
/// an [`EngineIoService`](crate::service::EngineIoService).
#[derive(Debug, Clone)]
pub struct EngineIoConfig {
    /// Gap of quiet time after which the server sends a `PING`.
    pub ping_interval: Duration,
    /// Grace period after a `PING` for the matching `PONG` before the session
    /// is closed with `ping timeout`.
    pub ping_timeout: Duration,
    /// Grace period between a session reaching `OPEN` and the first CONNECT
    /// packet arriving (enforced by the `socketioxide` layer, threaded through
    /// here so it can be part of one config object).
    pub connect_timeout: Duration,
    /// Advisory max payload size communicated to the client in the `OPEN`
    /// frame, and enforced on frames received from it.
    pub max_payload: u64,
    /// High-water mark, in bytes of buffered-but-unsent data, above which
    /// `Socket::send` starts returning `false` instead of queuing more.
    pub backpressure_limit: usize,
    /// Capacity of the per-session outgoing packet channel. A slow consumer
    /// that fills this channel causes further `send`s to fail rather than
    /// growing memory without bound.
    pub max_buffer_size: usize,
    /// Optional message sent once, right after `OPEN`, before any
    /// application traffic.
    pub initial_packet: Option<String>,
}

impl Default for EngineIoConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_millis(25_000),
            ping_timeout: Duration::from_millis(20_000),
            connect_timeout: Duration::from_millis(45_000),
            max_payload: 1e6 as u64,
            backpressure_limit: 1024 * 1024,
            max_buffer_size: 128,
            initial_packet: None,
        }
    }
}

impl EngineIoConfig {
    /// Starts building a config from defaults.
    pub fn builder() -> EngineIoConfigBuilder {
        EngineIoConfigBuilder::new()
    }
}

/// Builder for [`EngineIoConfig`].
#[derive(Debug, Clone, Default)]
pub struct EngineIoConfigBuilder {
    config: EngineIoConfig,
}

impl EngineIoConfigBuilder {
    /// Creates a new builder seeded with [`EngineIoConfig::default`].
    pub fn new() -> Self {
        Self {
            config: EngineIoConfig::default(),
        }
    }

    /// Sets [`EngineIoConfig::ping_interval`].
    pub fn ping_interval(mut self, ping_interval: Duration) -> Self {
        self.config.ping_interval = ping_interval;
        self
    }

    /// Sets [`EngineIoConfig::ping_timeout`].
    pub fn ping_timeout(mut self, ping_timeout: Duration) -> Self {
        self.config.ping_timeout = ping_timeout;
        self
    }

    /// Sets [`EngineIoConfig::connect_timeout`].
    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.config.connect_timeout = connect_timeout;
        self
    }

    /// Sets [`EngineIoConfig::max_payload`].
    pub fn max_payload(mut self, max_payload: u64) -> Self {
        self.config.max_payload = max_payload;
        self
    }

    /// Sets [`EngineIoConfig::backpressure_limit`].
    pub fn backpressure_limit(mut self, backpressure_limit: usize) -> Self {
        self.config.backpressure_limit = backpressure_limit;
        self
    }

    /// Sets [`EngineIoConfig::max_buffer_size`].
    pub fn max_buffer_size(mut self, max_buffer_size: usize) -> Self {
        self.config.max_buffer_size = max_buffer_size;
        self
    }

    /// Sets [`EngineIoConfig::initial_packet`].
    pub fn initial_packet(mut self, initial_packet: impl Into<String>) -> Self {
        self.config.initial_packet = Some(initial_packet.into());
        self
    }

    /// Finalizes the builder.
    pub fn build(self) -> EngineIoConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = EngineIoConfig::builder()
            .ping_interval(Duration::from_millis(300))
            .ping_timeout(Duration::from_millis(200))
            .max_payload(1e6 as u64)
            .build();
        assert_eq!(config.ping_interval, Duration::from_millis(300));
        assert_eq!(config.ping_timeout, Duration::from_millis(200));
        assert_eq!(config.max_payload, 1e6 as u64);
        assert_eq!(config.connect_timeout, EngineIoConfig::default().connect_timeout);
    }
}
