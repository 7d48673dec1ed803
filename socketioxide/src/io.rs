//! The facade applications actually hold: [`SocketIo`], built through
//! [`SocketIoBuilder`], wrapping a [`Client`] and the `tower::Layer`/
//! `tower::Service` plumbing it installs over `engineioxide` (spec.md §4.2's
//! "Server" entity).

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use engineioxide::layer::EngineIoLayer;
use engineioxide::service::{EngineIoService, NotFound};
use engineioxide::EngineIoConfig;
use serde::Serialize;

use crate::adapter::{Adapter, LocalAdapter};
use crate::client::Client;
use crate::config::SocketIoConfig;
use crate::errors::SendError;
use crate::handler::ConnectHandler;
use crate::ns::Namespace;
use crate::operators::{Operators, RemoteSocket};

/// Type alias for the [`tower::Layer`] produced by [`SocketIoBuilder::build_layer`].
pub type SocketIoLayer<A = LocalAdapter> = EngineIoLayer<Client<A>>;

/// A handle to a running (or about-to-run) Socket.IO server: registers
/// namespaces, and is the entry point for server-initiated broadcasts to the
/// default namespace. Cheap to clone — every clone shares the same
/// namespace table.
pub struct SocketIo<A: Adapter = LocalAdapter> {
    client: Client<A>,
}

impl<A: Adapter> Clone for SocketIo<A> {
    fn clone(&self) -> Self {
        Self { client: self.client.clone() }
    }
}

impl SocketIo<LocalAdapter> {
    /// Starts building a server with the in-memory adapter.
    pub fn builder() -> SocketIoBuilder<LocalAdapter> {
        SocketIoBuilder::new()
    }
}

impl<A: Adapter> SocketIo<A> {
    /// Registers `path`'s `connection` handler, creating the namespace if it
    /// doesn't already exist (spec.md §4.5 step 4). See
    /// [`crate::handler::ConnectHandler`] for the extractor-tuple closures
    /// this accepts.
    pub fn ns<H, T>(&self, path: impl Into<String>, handler: H) -> Arc<Namespace<A>>
    where
        H: ConnectHandler<A, T>,
        T: Send + Sync + 'static,
    {
        let ns = self.client.of(path);
        ns.on_connect(handler);
        ns
    }

    /// Returns the namespace at `path`, creating it with no connect handler
    /// registered if it doesn't exist yet.
    pub fn of(&self, path: impl Into<String>) -> Arc<Namespace<A>> {
        self.client.of(path)
    }

    /// All currently registered namespaces.
    pub fn namespaces(&self) -> Vec<Arc<Namespace<A>>> {
        self.client.namespaces()
    }

    /// A broadcast operator over every socket in the default (`/`)
    /// namespace, with no sender to exclude (spec.md §4.7).
    pub fn sockets(&self) -> Operators<A> {
        Operators::new(self.client.of("/"), None)
    }

    /// Shorthand for `self.sockets().emit(...)`.
    pub fn emit(&self, event: impl Into<Cow<'static, str>>, data: impl Serialize) -> Result<(), SendError> {
        self.sockets().emit(event, data)
    }

    /// Shorthand for `self.sockets().fetch_sockets()`.
    pub fn fetch_sockets(&self) -> Vec<RemoteSocket> {
        self.sockets().fetch_sockets()
    }

    /// Disconnects every socket in every namespace.
    pub async fn close(&self) {
        self.client.close().await;
    }
}

/// Builder for [`SocketIo`], paired with either [`build_layer`](Self::build_layer)
/// (to compose into an existing `tower` stack, e.g. axum) or
/// [`build_svc`](Self::build_svc) (a standalone service with a plain 404
/// fallback, used by this crate's own integration tests and by minimal
/// deployments with no other HTTP routes).
pub struct SocketIoBuilder<A: Adapter = LocalAdapter> {
    config: SocketIoConfig,
    _marker: std::marker::PhantomData<A>,
}

impl<A: Adapter> Default for SocketIoBuilder<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Adapter> SocketIoBuilder<A> {
    pub fn new() -> Self {
        Self {
            config: SocketIoConfig::default(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Sets [`SocketIoConfig::ack_timeout`].
    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.config.ack_timeout = timeout;
        self
    }

    /// Sets [`SocketIoConfig::connect_timeout`], keeping the embedded
    /// [`EngineIoConfig::connect_timeout`] in sync.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self.config.engine_config.connect_timeout = timeout;
        self
    }

    /// Replaces the embedded [`EngineIoConfig`] wholesale, e.g. to tune
    /// `ping_interval`/`max_payload`.
    pub fn engine_config(mut self, engine_config: EngineIoConfig) -> Self {
        self.config.connect_timeout = engine_config.connect_timeout;
        self.config.engine_config = engine_config;
        self
    }

    /// Builds a [`tower::Layer`] for composing into an existing router.
    pub fn build_layer(self) -> (SocketIoLayer<A>, SocketIo<A>) {
        let config = Arc::new(self.config);
        let client = Client::new(config.clone());
        let io = SocketIo { client: client.clone() };
        let layer = EngineIoLayer::from_config(client, config.engine_config.clone());
        (layer, io)
    }

    /// Builds a standalone `tower::Service` with a `404` fallback for
    /// anything that isn't the Engine.IO upgrade path.
    pub fn build_svc(self) -> (EngineIoService<Client<A>, NotFound>, SocketIo<A>) {
        let config = Arc::new(self.config);
        let client = Client::new(config.clone());
        let io = SocketIo { client: client.clone() };
        let svc = EngineIoService::with_config(client, config.engine_config.clone());
        (svc, io)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::extract::SocketRef;

    #[test]
    fn ns_registers_and_reuses_the_namespace() {
        let (_layer, io) = SocketIo::builder().build_layer();
        io.ns("/chat", |_socket: SocketRef| {});
        assert_eq!(io.namespaces().len(), 1);
        io.of("/chat");
        assert_eq!(io.namespaces().len(), 1);
    }

    #[test]
    fn builder_threads_ack_timeout_into_config() {
        let (_layer, io) = SocketIo::builder().ack_timeout(Duration::from_millis(10)).build_layer();
        io.of("/");
        assert_eq!(io.namespaces().len(), 1);
    }
}
