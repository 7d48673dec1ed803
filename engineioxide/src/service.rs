//! The [`tower::Service`] that accepts HTTP requests, upgrades the ones that
//! look like an Engine.IO websocket handshake, and otherwise falls through to
//! an inner service (so the whole thing composes as ordinary middleware).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use hyper::upgrade::Upgraded;
use hyper_util::rt::TokioIo;
use tower::Service;

use crate::config::EngineIoConfig;
use crate::handler::EngineIoHandler;
use crate::transport::run_socket;

/// Default mount path matching the real Engine.IO/Socket.IO client defaults.
pub const DEFAULT_ENGINE_PATH: &str = "/engine.io";

/// A [`tower::Service`] wrapping an inner service `S`. Requests that match
/// the Engine.IO upgrade shape (`EIO=4&transport=websocket`, with a
/// `Connection: Upgrade` header) are intercepted and handed off to
/// [`run_socket`]; everything else is forwarded to `S` unchanged.
pub struct EngineIoService<H: EngineIoHandler, S> {
    engine_path: Arc<str>,
    handler: Arc<H>,
    config: Arc<EngineIoConfig>,
    inner: S,
}

impl<H: EngineIoHandler, S: Clone> Clone for EngineIoService<H, S> {
    fn clone(&self) -> Self {
        Self {
            engine_path: self.engine_path.clone(),
            handler: self.handler.clone(),
            config: self.config.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<H: EngineIoHandler + Clone> EngineIoService<H, NotFound> {
    /// Builds a standalone service (no inner fallback — unmatched requests
    /// get a plain 404) with the default config.
    pub fn new(handler: H) -> Self {
        Self::with_config(handler, EngineIoConfig::default())
    }

    /// Builds a standalone service with a custom config.
    pub fn with_config(handler: H, config: EngineIoConfig) -> Self {
        Self::with_config_inner(NotFound, handler, config)
    }
}

impl<H: EngineIoHandler, S> EngineIoService<H, S> {
    /// Builds a service wrapping `inner`, used by [`EngineIoLayer`](crate::layer::EngineIoLayer).
    pub fn with_config_inner(inner: S, handler: H, config: EngineIoConfig) -> Self {
        Self {
            engine_path: Arc::from(DEFAULT_ENGINE_PATH),
            handler: Arc::new(handler),
            config: Arc::new(config),
            inner,
        }
    }

    /// Overrides the mount path (default `/engine.io`).
    pub fn with_engine_path(mut self, path: impl Into<Arc<str>>) -> Self {
        self.engine_path = path.into();
        self
    }

    fn matches_upgrade<B>(&self, req: &Request<B>) -> bool {
        if req.uri().path() != &*self.engine_path {
            return false;
        }
        let query = req.uri().query().unwrap_or_default();
        let is_v4 = query.split('&').any(|kv| kv == "EIO=4");
        let wants_ws = query.split('&').any(|kv| kv == "transport=websocket");
        let has_upgrade_header = req
            .headers()
            .get(http::header::UPGRADE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("websocket"))
            .unwrap_or(false);
        is_v4 && wants_ws && has_upgrade_header
    }
}

type BoxBody = http_body_util::combinators::UnsyncBoxBody<Bytes, std::convert::Infallible>;

impl<H, S, ReqBody> Service<Request<ReqBody>> for EngineIoService<H, S>
where
    H: EngineIoHandler + Clone,
    S: Service<Request<ReqBody>, Response = Response<BoxBody>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Send,
    ReqBody: http_body::Body + Send + Unpin + 'static,
{
    type Response = Response<BoxBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        if !self.matches_upgrade(&req) {
            let fut = self.inner.call(req);
            return Box::pin(fut);
        }

        let handler = self.handler.clone();
        let config = self.config.clone();
        let req_parts = Arc::new(req_parts_snapshot(&req));
        let remote_addr = remote_addr_of(&req);

        Box::pin(async move {
            let upgrade_result = hyper::upgrade::on(&mut req).await;
            let response = match upgrade_result {
                Ok(upgraded) => {
                    tokio::spawn(async move {
                        let io = TokioIo::new(upgraded);
                        drive_upgraded(io, handler, config, req_parts, remote_addr).await;
                    });
                    switching_protocols_response()
                }
                Err(_) => Response::builder()
                    .status(StatusCode::BAD_REQUEST)
                    .body(empty_body())
                    .unwrap(),
            };
            Ok(response)
        })
    }
}

async fn drive_upgraded<H: EngineIoHandler>(
    io: TokioIo<Upgraded>,
    handler: Arc<H>,
    config: Arc<EngineIoConfig>,
    req_parts: Arc<http::request::Parts>,
    remote_addr: std::net::SocketAddr,
) {
    use tokio_tungstenite::tungstenite::protocol::Role;
    let ws = tokio_tungstenite::WebSocketStream::from_raw_socket(io, Role::Server, None).await;
    run_socket(ws, handler, config, req_parts, remote_addr).await;
}

fn switching_protocols_response() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(http::header::CONNECTION, "Upgrade")
        .header(http::header::UPGRADE, "websocket")
        .body(empty_body())
        .unwrap()
}

fn empty_body() -> BoxBody {
    use http_body_util::BodyExt;
    Full::new(Bytes::new())
        .map_err(|never: std::convert::Infallible| match never {})
        .boxed_unsync()
}

fn req_parts_snapshot<B>(req: &Request<B>) -> http::request::Parts {
    let mut builder = Request::builder().method(req.method()).uri(req.uri().clone());
    for (name, value) in req.headers() {
        builder = builder.header(name, value);
    }
    builder.body(()).unwrap().into_parts().0
}

fn remote_addr_of<B>(req: &Request<B>) -> std::net::SocketAddr {
    req.extensions()
        .get::<std::net::SocketAddr>()
        .copied()
        .unwrap_or_else(|| std::net::SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), 0))
}

/// A trivial inner service returning `404 Not Found`, used when
/// [`EngineIoService`] is constructed standalone rather than layered over an
/// application router.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFound;

impl<ReqBody> Service<Request<ReqBody>> for NotFound {
    type Response = Response<BoxBody>;
    type Error = std::convert::Infallible;
    type Future = std::future::Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: Request<ReqBody>) -> Self::Future {
        std::future::ready(Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(empty_body())
            .unwrap()))
    }
}

#[cfg(feature = "hyper-v1")]
mod hyper_v1_compat {
    //! Lets a raw `hyper::server::conn::http1` loop (with no `tower`/axum
    //! router involved) drive an [`EngineIoService`] directly, matching the
    //! pattern used in `tests/fixture.rs`.
    use super::*;

    impl<H, S, ReqBody> hyper::service::Service<Request<ReqBody>> for EngineIoService<H, S>
    where
        H: EngineIoHandler + Clone,
        S: Service<Request<ReqBody>, Response = Response<BoxBody>> + Clone + Send + 'static,
        S::Future: Send,
        S::Error: Send,
        ReqBody: http_body::Body + Send + Unpin + 'static,
    {
        type Response = Response<BoxBody>;
        type Error = S::Error;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

        fn call(&self, req: Request<ReqBody>) -> Self::Future {
            let mut this = self.clone();
            Service::call(&mut this, req)
        }
    }
}
