//! Engine.IO transport + heartbeat layer.
//!
//! This crate implements the parts of the realtime event bus that sit below
//! the Socket.IO packet semantics: the WebSocket carrier, the ping/pong
//! heartbeat state machine, session ids, and the per-session write buffer. It
//! is mounted as an ordinary [`tower::Layer`] so it composes with any
//! `tower`/axum-based HTTP stack; everything above it (namespaces, rooms,
//! acks) lives in the sibling `socketioxide` crate, which implements
//! [`handler::EngineIoHandler`] to receive decoded frames.
//!
//! See `tests/fixture.rs` for a minimal end-to-end harness.

pub mod config;
pub mod errors;
pub mod handler;
pub mod layer;
pub mod packet;
pub mod service;
pub mod sid;
pub mod socket;
pub mod transport;

pub use config::EngineIoConfig;
pub use errors::Error;
pub use handler::{async_trait, EngineIoHandler};
pub use layer::EngineIoLayer;
pub use service::EngineIoService;
pub use sid::Sid;
pub use socket::{DisconnectReason, ReadyState, Socket};
