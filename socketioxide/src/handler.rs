//! Type-erased storage for registered handlers, and the traits
//! ([`MessageHandler`], [`DisconnectHandler`], [`ConnectHandler`]) that let
//! `Socket::on`/`on_disconnect` and `Namespace::on_connect` accept ordinary
//! closures over typed extractors (see [`crate::extract`]), the idiomatic
//! Rust realization of spec.md §4.6's "registered listeners for `eventName`"
//! with no prescribed call signature.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::adapter::Adapter;
use crate::extract::FromMessageParts;
use crate::socket::{DisconnectReason, Socket};

type BoxFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// A fully erased message handler: event name lookup resolves to one of
/// these, and dispatch calls it with the raw decoded parts.
pub trait ErasedMessageHandler<A: Adapter>: Send + Sync {
    fn call(&self, socket: Arc<Socket<A>>, data: Value, bin: Vec<Vec<u8>>, ack: Option<i64>);
}

pub type BoxedMessageHandler<A> = Box<dyn ErasedMessageHandler<A>>;

/// A fully erased disconnect handler.
pub trait ErasedDisconnectHandler<A: Adapter>: Send + Sync {
    fn call(&self, socket: Arc<Socket<A>>, reason: DisconnectReason);
}

pub type BoxedDisconnectHandler<A> = Box<dyn ErasedDisconnectHandler<A>>;

/// A fully erased namespace connect handler.
pub trait ErasedConnectHandler<A: Adapter>: Send + Sync {
    fn call(&self, socket: Arc<Socket<A>>, auth: Value);
}

pub type BoxedConnectHandler<A> = Box<dyn ErasedConnectHandler<A>>;

/// Implemented for anything that can be registered with [`Socket::on`].
/// `T` is the tuple of extractors the closure asks for; the blanket impls
/// below cover sync and async closures over 0-4 extractor arguments, which
/// is as far as the teacher's own handler module goes.
pub trait MessageHandler<A: Adapter, T>: Send + Sync + 'static {
    fn make_erased(self) -> BoxedMessageHandler<A>;
}

pub trait DisconnectHandler<A: Adapter, T>: Send + Sync + 'static {
    fn make_erased(self) -> BoxedDisconnectHandler<A>;
}

pub trait ConnectHandler<A: Adapter, T>: Send + Sync + 'static {
    fn make_erased(self) -> BoxedConnectHandler<A>;
}

/// Entry point used by `Socket::on`/`on_disconnect`/`Namespace::on_connect`.
pub struct MakeErasedHandler;

impl MakeErasedHandler {
    pub fn new_message_boxed<A, H, T>(handler: H) -> BoxedMessageHandler<A>
    where
        A: Adapter,
        H: MessageHandler<A, T>,
        T: Send + Sync + 'static,
    {
        handler.make_erased()
    }

    pub fn new_disconnect_boxed<A, H, T>(handler: H) -> BoxedDisconnectHandler<A>
    where
        A: Adapter,
        H: DisconnectHandler<A, T>,
        T: Send + Sync + 'static,
    {
        handler.make_erased()
    }

    pub fn new_connect_boxed<A, H, T>(handler: H) -> BoxedConnectHandler<A>
    where
        A: Adapter,
        H: ConnectHandler<A, T>,
        T: Send + Sync + 'static,
    {
        handler.make_erased()
    }
}

/// Shared context handed to an extractor while a message/connect handler is
/// being invoked.
pub struct MessageParts {
    pub data: Value,
    pub bin: Vec<Vec<u8>>,
    pub ack: Option<i64>,
}

struct ErasedMessage<A: Adapter, H, T> {
    handler: H,
    _marker: std::marker::PhantomData<fn(A, T)>,
}

macro_rules! impl_message_handler {
    ($($ty:ident),*) => {
        #[allow(non_snake_case, unused)]
        impl<A, F, Fut, $($ty),*> MessageHandler<A, ($($ty,)*)> for F
        where
            A: Adapter,
            F: Fn(Arc<Socket<A>>, $($ty),*) -> Fut + Send + Sync + 'static,
            Fut: IntoHandlerFuture + Send + 'static,
            $($ty: FromMessageParts<A> + Send + Sync + 'static),*
        {
            fn make_erased(self) -> BoxedMessageHandler<A> {
                Box::new(ErasedMessage::<A, F, ($($ty,)*)> {
                    handler: self,
                    _marker: std::marker::PhantomData,
                })
            }
        }

        impl<A, F, Fut, $($ty),*> ErasedMessageHandler<A> for ErasedMessage<A, F, ($($ty,)*)>
        where
            A: Adapter,
            F: Fn(Arc<Socket<A>>, $($ty),*) -> Fut + Send + Sync + 'static,
            Fut: IntoHandlerFuture + Send + 'static,
            $($ty: FromMessageParts<A> + Send + Sync + 'static),*
        {
            fn call(&self, socket: Arc<Socket<A>>, data: Value, bin: Vec<Vec<u8>>, ack: Option<i64>) {
                let parts = MessageParts { data, bin, ack };
                $(
                    let $ty = match $ty::from_message_parts(&socket, &parts) {
                        Ok(v) => v,
                        Err(_) => return,
                    };
                )*
                let fut = (self.handler)(socket, $($ty),*);
                tokio::spawn(fut.into_handler_future());
            }
        }
    };
}

impl_message_handler!();
impl_message_handler!(T1);
impl_message_handler!(T1, T2);
impl_message_handler!(T1, T2, T3);
impl_message_handler!(T1, T2, T3, T4);

/// Lets a handler closure return either `()` (a sync handler) or a future (an
/// async handler), matching the teacher's `socket.on("test", |socket| { .. })`
/// vs `socket.on("test", |socket| async move { .. })` ergonomics.
pub trait IntoHandlerFuture {
    fn into_handler_future(self) -> BoxFuture<'static>;
}

impl IntoHandlerFuture for () {
    fn into_handler_future(self) -> BoxFuture<'static> {
        Box::pin(async {})
    }
}

impl<Fut> IntoHandlerFuture for Fut
where
    Fut: Future<Output = ()> + Send + 'static,
{
    fn into_handler_future(self) -> BoxFuture<'static> {
        Box::pin(self)
    }
}

struct ErasedDisconnect<A: Adapter, H> {
    handler: H,
    _marker: std::marker::PhantomData<fn(A)>,
}

impl<A, F, Fut> DisconnectHandler<A, ()> for F
where
    A: Adapter,
    F: Fn(Arc<Socket<A>>, DisconnectReason) -> Fut + Send + Sync + 'static,
    Fut: IntoHandlerFuture + Send + 'static,
{
    fn make_erased(self) -> BoxedDisconnectHandler<A> {
        Box::new(ErasedDisconnect {
            handler: self,
            _marker: std::marker::PhantomData,
        })
    }
}

impl<A, F, Fut> ErasedDisconnectHandler<A> for ErasedDisconnect<A, F>
where
    A: Adapter,
    F: Fn(Arc<Socket<A>>, DisconnectReason) -> Fut + Send + Sync + 'static,
    Fut: IntoHandlerFuture + Send + 'static,
{
    fn call(&self, socket: Arc<Socket<A>>, reason: DisconnectReason) {
        let fut = (self.handler)(socket, reason);
        tokio::spawn(fut.into_handler_future());
    }
}

struct ErasedConnect<A: Adapter, H, T> {
    handler: H,
    _marker: std::marker::PhantomData<fn(A, T)>,
}

/// Connect handlers accept the same extractor tuples as message handlers
/// (`SocketRef`, `Data<T>`, `TryData<T>`, ...), built by wrapping the raw
/// auth payload in a [`MessageParts`] with no binary attachments and no ack
/// id. This lets `io.ns("/", |s: SocketRef, Data::<Auth>(auth)| ...)` read
/// naturally, mirroring `Socket::on`'s ergonomics (spec.md §4.5 step 4).
macro_rules! impl_connect_handler {
    ($($ty:ident),*) => {
        #[allow(non_snake_case, unused)]
        impl<A, F, Fut, $($ty),*> ConnectHandler<A, ($($ty,)*)> for F
        where
            A: Adapter,
            F: Fn(Arc<Socket<A>>, $($ty),*) -> Fut + Send + Sync + 'static,
            Fut: IntoHandlerFuture + Send + 'static,
            $($ty: FromMessageParts<A> + Send + Sync + 'static),*
        {
            fn make_erased(self) -> BoxedConnectHandler<A> {
                Box::new(ErasedConnect::<A, F, ($($ty,)*)> {
                    handler: self,
                    _marker: std::marker::PhantomData,
                })
            }
        }

        impl<A, F, Fut, $($ty),*> ErasedConnectHandler<A> for ErasedConnect<A, F, ($($ty,)*)>
        where
            A: Adapter,
            F: Fn(Arc<Socket<A>>, $($ty),*) -> Fut + Send + Sync + 'static,
            Fut: IntoHandlerFuture + Send + 'static,
            $($ty: FromMessageParts<A> + Send + Sync + 'static),*
        {
            fn call(&self, socket: Arc<Socket<A>>, auth: Value) {
                let parts = MessageParts { data: auth, bin: Vec::new(), ack: None };
                $(
                    let $ty = match $ty::from_message_parts(&socket, &parts) {
                        Ok(v) => v,
                        Err(_) => return,
                    };
                )*
                let fut = (self.handler)(socket, $($ty),*);
                tokio::spawn(fut.into_handler_future());
            }
        }
    };
}

impl_connect_handler!();
impl_connect_handler!(T1);
impl_connect_handler!(T1, T2);
impl_connect_handler!(T1, T2, T3);
impl_connect_handler!(T1, T2, T3, T4);
