//! Drives a single accepted WebSocket to completion: Engine.IO framing,
//! heartbeat scheduling, and dispatch into an [`EngineIoHandler`].

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use http::request::Parts;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;

use crate::config::EngineIoConfig;
use crate::handler::EngineIoHandler;
use crate::packet::{OpenPacket, Packet};
use crate::socket::{DisconnectReason, OutgoingFrame, Socket};

/// Runs one Engine.IO session to completion over an already-established
/// WebSocket. Returns once the connection is fully closed (either side).
pub async fn run_socket<H, S>(
    ws: WebSocketStream<S>,
    handler: Arc<H>,
    config: Arc<EngineIoConfig>,
    req_parts: Arc<Parts>,
    remote_addr: SocketAddr,
) where
    H: EngineIoHandler,
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (tx, mut outgoing) = mpsc::channel::<OutgoingFrame>(config.max_buffer_size);

    let socket = Arc::new(Socket::<H::Data>::new(
        req_parts,
        remote_addr,
        tx,
        config.backpressure_limit,
    ));

    let open = Packet::Open(OpenPacket {
        sid: socket.id,
        upgrades: vec!["websocket".into()],
        ping_interval: config.ping_interval.as_millis() as u64,
        ping_timeout: config.ping_timeout.as_millis() as u64,
        max_payload: config.max_payload,
    });
    if ws_tx.send(WsMessage::Text(open.encode())).await.is_err() {
        return;
    }
    if let Some(initial) = &config.initial_packet {
        let _ = ws_tx
            .send(WsMessage::Text(Packet::Message(initial.clone()).encode()))
            .await;
    }
    socket.set_open();

    #[cfg(feature = "tracing")]
    tracing::debug!(sid = %socket.id, "engine.io session open");

    handler.on_connect(socket.clone());

    let ping_interval = config.ping_interval;
    let ping_timeout = config.ping_timeout;

    // Two-phase heartbeat timer, reused across the whole loop rather than
    // rebuilt every iteration: `AwaitingInterval` counts down to the next
    // `PING`, `AwaitingPong` counts down the grace window for the client's
    // reply. Recv arms keep being polled the whole time either way, so a
    // `PONG` read while we're mid-wait is never missed.
    enum Heartbeat {
        AwaitingInterval,
        AwaitingPong,
    }
    let mut heartbeat = Heartbeat::AwaitingInterval;
    let deadline = tokio::time::sleep(ping_interval);
    tokio::pin!(deadline);

    let reason = loop {
        tokio::select! {
            biased;

            reason = socket.close_requested() => {
                break reason;
            }

            frame = outgoing.recv() => {
                match frame {
                    Some(frame) => {
                        socket.note_flushed(&frame);
                        let msg = match frame {
                            OutgoingFrame::Text(t) => WsMessage::Text(t),
                            OutgoingFrame::Binary(b) => WsMessage::Binary(b),
                        };
                        if ws_tx.send(msg).await.is_err() {
                            break DisconnectReason::TransportError;
                        }
                    }
                    None => break DisconnectReason::ClosingServer,
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) if text.len() as u64 > config.max_payload => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(sid = %socket.id, len = text.len(), max = config.max_payload, "payload exceeds max_payload");
                        break DisconnectReason::PacketParsingError;
                    }
                    Some(Ok(WsMessage::Binary(data))) if data.len() as u64 > config.max_payload => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(sid = %socket.id, len = data.len(), max = config.max_payload, "payload exceeds max_payload");
                        break DisconnectReason::PacketParsingError;
                    }
                    Some(Ok(WsMessage::Text(text))) => {
                        match Packet::decode(&text) {
                            Ok(Packet::Ping) => {
                                if ws_tx.send(WsMessage::Text(Packet::Pong.encode())).await.is_err() {
                                    break DisconnectReason::TransportError;
                                }
                            }
                            Ok(Packet::Pong) => {
                                if matches!(heartbeat, Heartbeat::AwaitingPong) {
                                    heartbeat = Heartbeat::AwaitingInterval;
                                    deadline.as_mut().reset(tokio::time::Instant::now() + ping_interval);
                                }
                            }
                            Ok(Packet::Close) => break DisconnectReason::TransportClose,
                            Ok(Packet::Message(m)) => handler.on_message(m, socket.clone()),
                            Ok(Packet::Open(_)) | Ok(Packet::Noop) => {}
                            Err(_) => break DisconnectReason::PacketParsingError,
                        }
                    }
                    Some(Ok(WsMessage::Binary(data))) => handler.on_binary(data, socket.clone()),
                    Some(Ok(WsMessage::Close(_))) | None => break DisconnectReason::TransportClose,
                    Some(Ok(_)) => {} // ping/pong/frame control handled by tungstenite itself
                    Some(Err(_)) => break DisconnectReason::TransportError,
                }
            }

            _ = &mut deadline => {
                match heartbeat {
                    Heartbeat::AwaitingInterval => {
                        if ws_tx.send(WsMessage::Text(Packet::Ping.encode())).await.is_err() {
                            break DisconnectReason::TransportError;
                        }
                        heartbeat = Heartbeat::AwaitingPong;
                        deadline.as_mut().reset(tokio::time::Instant::now() + ping_timeout);
                    }
                    Heartbeat::AwaitingPong => break DisconnectReason::HeartbeatTimeout,
                }
            }
        }
    };

    socket.close(reason);
    let _ = ws_tx.send(WsMessage::Close(None)).await;
    let _ = ws_tx.close().await;

    #[cfg(feature = "tracing")]
    tracing::debug!(sid = %socket.id, %reason, "engine.io session closed");

    handler.on_disconnect(socket.clone(), reason);
    socket.mark_fully_closed(reason);
}
