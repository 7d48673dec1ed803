//! Socket.IO server configuration, layered on top of
//! [`EngineIoConfig`](engineioxide::EngineIoConfig). Mirrors the builder
//! pattern in `engineioxide::config`.

use std::time::Duration;

use engineioxide::EngineIoConfig;

/// Configuration shared by every [`Socket`](crate::socket::Socket) created by
/// a [`SocketIo`](crate::io::SocketIo) instance.
#[derive(Debug, Clone)]
pub struct SocketIoConfig {
    /// How long an [`emit_with_ack`](crate::socket::Socket::emit_with_ack)
    /// call waits for the client's response before resolving to
    /// [`AckError::Timeout`](crate::errors::AckError::Timeout) (spec.md §4.6
    /// "ACK resolution").
    pub ack_timeout: Duration,
    /// Grace period between a transport reaching `OPEN` and the first
    /// Socket.IO CONNECT packet arriving for a namespace (spec.md §4.5 step
    /// 1). Threaded through from [`EngineIoConfig::connect_timeout`].
    pub connect_timeout: Duration,
    /// The underlying Engine.IO transport/heartbeat configuration.
    pub engine_config: EngineIoConfig,
}

impl Default for SocketIoConfig {
    fn default() -> Self {
        let engine_config = EngineIoConfig::default();
        Self {
            ack_timeout: Duration::from_secs(5),
            connect_timeout: engine_config.connect_timeout,
            engine_config,
        }
    }
}

impl SocketIoConfig {
    /// Starts building a config from defaults.
    pub fn builder() -> SocketIoConfigBuilder {
        SocketIoConfigBuilder::new()
    }
}

/// Builder for [`SocketIoConfig`].
#[derive(Debug, Clone, Default)]
pub struct SocketIoConfigBuilder {
    config: SocketIoConfig,
}

impl SocketIoConfigBuilder {
    /// Creates a new builder seeded with [`SocketIoConfig::default`].
    pub fn new() -> Self {
        Self {
            config: SocketIoConfig::default(),
        }
    }

    /// Sets [`SocketIoConfig::ack_timeout`].
    pub fn ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.config.ack_timeout = ack_timeout;
        self
    }

    /// Sets [`SocketIoConfig::connect_timeout`], keeping the embedded
    /// [`EngineIoConfig::connect_timeout`] in sync.
    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.config.connect_timeout = connect_timeout;
        self.config.engine_config.connect_timeout = connect_timeout;
        self
    }

    /// Replaces the embedded [`EngineIoConfig`] wholesale, e.g. to tune
    /// `ping_interval`/`max_payload`.
    pub fn engine_config(mut self, engine_config: EngineIoConfig) -> Self {
        self.config.connect_timeout = engine_config.connect_timeout;
        self.config.engine_config = engine_config;
        self
    }

    /// Finalizes the builder.
    pub fn build(self) -> SocketIoConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = SocketIoConfig::builder().ack_timeout(Duration::from_millis(500)).build();
        assert_eq!(config.ack_timeout, Duration::from_millis(500));
        assert_eq!(config.connect_timeout, SocketIoConfig::default().connect_timeout);
    }

    #[test]
    fn connect_timeout_stays_in_sync_with_engine_config() {
        let config = SocketIoConfig::builder().connect_timeout(Duration::from_secs(1)).build();
        assert_eq!(config.engine_config.connect_timeout, Duration::from_secs(1));
    }
}
