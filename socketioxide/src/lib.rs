//! Namespace / room / socket / broadcast layer implementing the Socket.IO v5
//! wire protocol on top of the sibling `engineioxide` crate.
//!
//! `engineioxide` owns the transport, heartbeat, and session; this crate
//! owns everything spec.md calls "the core": the packet codec, the
//! namespace-attach handshake, the in-memory room index and its broadcast
//! selector algebra, the ack correlation engine, and the per-socket/
//! per-namespace middleware pipelines. [`io::SocketIo`] is the facade
//! application code actually holds; [`client::Client`] is the
//! [`engineioxide::EngineIoHandler`] it installs underneath.

pub mod ack;
pub mod adapter;
pub mod binary_registry;
pub mod client;
pub mod config;
pub mod errors;
#[cfg(feature = "extensions")]
pub mod extensions;
pub mod extract;
pub mod handler;
pub mod io;
pub mod ns;
pub mod operators;
pub mod packet;
pub mod socket;

pub use adapter::{Adapter, LocalAdapter, Room};
pub use config::{SocketIoConfig, SocketIoConfigBuilder};
pub use errors::Error;
pub use io::{SocketIo, SocketIoBuilder, SocketIoLayer};
pub use ns::Namespace;
pub use operators::{Operators, RemoteSocket};
pub use socket::{DisconnectReason, Sid, Socket};
