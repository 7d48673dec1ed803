//! Shared harness for end-to-end tests: stands up a real [`SocketIo`] server
//! over a bound TCP listener and speaks the raw Socket.IO wire protocol from
//! the client side (there is no JS client library available here, so
//! connecting/CONNECT-ing/event framing is done by hand).

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use socketioxide::adapter::LocalAdapter;
use socketioxide::SocketIo;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Builds and starts serving a `SocketIo` server on `port`, returning the
/// handle used to register namespaces/emit broadcasts.
pub async fn create_server(port: u16, configure: impl FnOnce(SocketIo<LocalAdapter>)) {
    create_server_with(port, |b| b, configure).await;
}

/// Like [`create_server`] but lets the test tune the builder (e.g. a short
/// `ack_timeout`) before the namespaces are registered.
pub async fn create_server_with(
    port: u16,
    build: impl FnOnce(socketioxide::SocketIoBuilder<LocalAdapter>) -> socketioxide::SocketIoBuilder<LocalAdapter>,
    configure: impl FnOnce(SocketIo<LocalAdapter>),
) {
    let (svc, io) = build(SocketIo::builder()).build_svc();
    configure(io);

    let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let io = TokioIo::new(stream);
            let svc = svc.clone();
            tokio::task::spawn(async move {
                let _ = hyper::server::conn::http1::Builder::new()
                    .serve_connection(io, svc)
                    .with_upgrades()
                    .await;
            });
        }
    });
    tokio::task::yield_now().await;
}

/// Opens the websocket transport and completes the Engine.IO handshake,
/// returning the raw stream positioned right after the `OPEN` frame.
pub async fn connect_transport(port: u16) -> Ws {
    tokio_tungstenite::connect_async(format!(
        "ws://127.0.0.1:{port}/engine.io/?EIO=4&transport=websocket"
    ))
    .await
    .unwrap()
    .0
}

/// Connects the transport and completes the Socket.IO `CONNECT` handshake for
/// `ns` (pass `"/"` for the default namespace), returning the stream and the
/// server-assigned socket id.
pub async fn connect(port: u16, ns: &str, auth: Value) -> (Ws, String) {
    let mut ws = connect_transport(port).await;
    ws.next().await.unwrap().unwrap(); // engine.io OPEN

    let payload = if auth.is_null() {
        String::new()
    } else {
        auth.to_string()
    };
    let ns_prefix = if ns == "/" { String::new() } else { format!("{ns},") };
    ws.send(Message::Text(format!("40{ns_prefix}{payload}")))
        .await
        .unwrap();

    let reply = tokio::time::timeout(Duration::from_secs(1), ws.next())
        .await
        .expect("CONNECT reply should arrive")
        .unwrap()
        .unwrap();
    let Message::Text(text) = reply else { panic!("expected a text frame, got {reply:?}") };
    let body = text.strip_prefix('4').expect("engine.io MESSAGE prefix");
    let body = body.strip_prefix('0').expect("socket.io CONNECT prefix");
    let body = strip_ns_prefix(body, ns);
    let sid = serde_json::from_str::<Value>(body).unwrap()["sid"]
        .as_str()
        .unwrap()
        .to_string();
    (ws, sid)
}

fn strip_ns_prefix<'a>(body: &'a str, ns: &str) -> &'a str {
    if ns == "/" {
        body
    } else {
        body.strip_prefix(&format!("{ns},")).unwrap_or(body)
    }
}

/// Sends a Socket.IO `EVENT` packet with no ack id.
pub async fn send_event(ws: &mut Ws, ns: &str, event: &str, data: Value) {
    let ns_prefix = if ns == "/" { String::new() } else { format!("{ns},") };
    let payload = serde_json::json!([event, data]);
    ws.send(Message::Text(format!("42{ns_prefix}{payload}")))
        .await
        .unwrap();
}

/// Sends an `EVENT` packet carrying an ack id.
pub async fn send_event_with_ack(ws: &mut Ws, ns: &str, event: &str, data: Value, ack_id: i64) {
    let ns_prefix = if ns == "/" { String::new() } else { format!("{ns},") };
    let payload = serde_json::json!([event, data]);
    ws.send(Message::Text(format!("42{ns_prefix}{ack_id}{payload}")))
        .await
        .unwrap();
}

/// Reads the next frame and parses it as an `EVENT`, returning `(event, data)`.
/// Skips over engine.io `PING` frames (answering them) so tests don't need to
/// special-case heartbeat traffic.
pub async fn next_event(ws: &mut Ws, ns: &str) -> (String, Value) {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("a frame should arrive")
            .unwrap()
            .unwrap();
        let Message::Text(text) = msg else { continue };
        if text == "2" {
            ws.send(Message::Text("3".into())).await.unwrap();
            continue;
        }
        let Some(body) = text.strip_prefix('4') else { continue };
        let Some(rest) = body.strip_prefix('2') else { continue };
        let rest = strip_ns_prefix(rest, ns);
        let digit_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let rest = &rest[digit_end..];
        let mut arr = serde_json::from_str::<Value>(rest).unwrap();
        let Value::Array(arr) = &mut arr else { panic!("expected array payload") };
        let event = arr.remove(0).as_str().unwrap().to_string();
        let data = if arr.is_empty() { Value::Null } else { arr.remove(0) };
        return (event, data);
    }
}

/// Reads the next frame and parses it as an `ACK`, returning `(ack_id, data)`.
pub async fn next_ack(ws: &mut Ws, ns: &str) -> (i64, Value) {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("an ack should arrive")
            .unwrap()
            .unwrap();
        let Message::Text(text) = msg else { continue };
        if text == "2" {
            ws.send(Message::Text("3".into())).await.unwrap();
            continue;
        }
        let Some(body) = text.strip_prefix('4') else { continue };
        let Some(rest) = body.strip_prefix('3') else { continue };
        let rest = strip_ns_prefix(rest, ns);
        let digit_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let ack_id: i64 = rest[..digit_end].parse().unwrap();
        let rest = &rest[digit_end..];
        let mut arr = serde_json::from_str::<Value>(rest).unwrap();
        let Value::Array(arr) = &mut arr else { panic!("expected array payload") };
        let data = if arr.is_empty() { Value::Null } else { arr.remove(0) };
        return (ack_id, data);
    }
}
