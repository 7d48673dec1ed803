//! Shared harness for the websocket-path integration tests below. Unlike the
//! upstream crate this is forked from, there is no long-polling transport to
//! exercise here (see `SPEC_FULL.md` §5 Non-goals) — every helper here only
//! ever speaks the websocket upgrade path.
use std::time::Duration;

use engineioxide::{config::EngineIoConfig, handler::EngineIoHandler, service::EngineIoService};
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub async fn create_ws_connection(port: u16) -> WebSocketStream<MaybeTlsStream<TcpStream>> {
    tokio_tungstenite::connect_async(format!(
        "ws://127.0.0.1:{port}/engine.io/?EIO=4&transport=websocket"
    ))
    .await
    .unwrap()
    .0
}

pub async fn create_server<H: EngineIoHandler + Clone>(handler: H, port: u16) {
    let config = EngineIoConfig::builder()
        .ping_interval(Duration::from_millis(300))
        .ping_timeout(Duration::from_millis(200))
        .max_payload(1e6 as u64)
        .build();

    let svc = EngineIoService::with_config(handler, config);
    let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();

    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let io = TokioIo::new(stream);
            let svc = svc.clone();

            tokio::task::spawn(async move {
                if let Err(err) = hyper::server::conn::http1::Builder::new()
                    .serve_connection(io, svc)
                    .with_upgrades()
                    .await
                {
                    eprintln!("error serving connection: {err:?}");
                }
            });
        }
    });
    // give the listener task a moment to actually bind before returning.
    tokio::task::yield_now().await;
}
