//! End-to-end wire-level scenarios, each driving a real server over a real
//! TCP socket with the raw Socket.IO protocol spoken by hand on the client
//! side (spec.md §8).

mod fixture;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use socketioxide::adapter::LocalAdapter;
use socketioxide::extract::{AckSender, Data};
use socketioxide::socket::Socket;

/// Scenario 1: connect, then an `echo` event comes straight back with the
/// same payload.
#[tokio::test]
async fn connect_then_echo() {
    let port = 9200;
    fixture::create_server(port, |io| {
        io.ns("/", |socket: Arc<Socket<LocalAdapter>>| {
            socket.on("echo", |socket: Arc<Socket<LocalAdapter>>, Data(v): Data<Value>| {
                let _ = socket.emit("echo", v);
            });
        });
    })
    .await;

    let (mut ws, _sid) = fixture::connect(port, "/", Value::Null).await;
    fixture::send_event(&mut ws, "/", "echo", json!("hello")).await;
    let (event, data) = fixture::next_event(&mut ws, "/").await;
    assert_eq!(event, "echo");
    assert_eq!(data, json!("hello"));
}

/// Scenario 2: client asks for an ack, server answers it, client sees the
/// computed sum.
#[tokio::test]
async fn ack_resolves_with_server_computed_value() {
    let port = 9201;
    fixture::create_server(port, |io| {
        io.ns("/", |socket: Arc<Socket<LocalAdapter>>| {
            socket.on(
                "sum",
                |_socket: Arc<Socket<LocalAdapter>>, Data((a, b)): Data<(i64, i64)>, ack: AckSender<LocalAdapter>| {
                    let _ = ack.send(a + b);
                },
            );
        });
    })
    .await;

    let (mut ws, _sid) = fixture::connect(port, "/", Value::Null).await;
    fixture::send_event_with_ack(&mut ws, "/", "sum", json!([2, 40]), 1).await;
    let (ack_id, data) = fixture::next_ack(&mut ws, "/").await;
    assert_eq!(ack_id, 1);
    assert_eq!(data, json!(42));
}

/// Scenario 3: the server emits with an ack to a client that never answers;
/// the ack future resolves to a timeout rather than hanging.
#[tokio::test]
async fn server_side_ack_times_out_when_client_never_answers() {
    let port = 9202;
    let (tx, rx) = tokio::sync::oneshot::channel();
    let tx = std::sync::Mutex::new(Some(tx));
    fixture::create_server_with(
        port,
        |b| b.ack_timeout(Duration::from_millis(50)),
        |io| {
            io.ns("/", move |socket: Arc<Socket<LocalAdapter>>| {
                if let Some(tx) = tx.lock().unwrap().take() {
                    let _ = tx.send(socket);
                }
            });
        },
    )
    .await;

    let (_ws, _sid) = fixture::connect(port, "/", Value::Null).await;
    let socket = tokio::time::timeout(Duration::from_secs(1), rx)
        .await
        .expect("connect handler should have fired")
        .unwrap();

    let result = socket.emit_with_ack::<Value>("never-answered", Value::Null).await;
    assert!(matches!(result, Err(socketioxide::errors::AckError::Timeout)));
}

/// Scenario 4: two sockets join `room1`; a broadcast from one of them to
/// `room1` excludes the sender by default and only the other socket sees it.
#[tokio::test]
async fn room_broadcast_excludes_sender_by_default() {
    let port = 9203;
    fixture::create_server(port, |io| {
        io.ns("/", |socket: Arc<Socket<LocalAdapter>>| {
            socket.on("join", |socket: Arc<Socket<LocalAdapter>>, Data(room): Data<String>| {
                let _ = socket.join(room);
            });
            socket.on("shout", |socket: Arc<Socket<LocalAdapter>>, Data(room): Data<String>| {
                let _ = socket.to(room).emit("shout", "hi");
            });
        });
    })
    .await;

    let (mut a, _) = fixture::connect(port, "/", Value::Null).await;
    let (mut b, _) = fixture::connect(port, "/", Value::Null).await;
    fixture::send_event(&mut a, "/", "join", json!("room1")).await;
    fixture::send_event(&mut b, "/", "join", json!("room1")).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    fixture::send_event(&mut a, "/", "shout", json!("room1")).await;

    let (event, _) = fixture::next_event(&mut b, "/").await;
    assert_eq!(event, "shout");

    let no_echo = tokio::time::timeout(Duration::from_millis(150), fixture::next_event(&mut a, "/")).await;
    assert!(no_echo.is_err(), "the sender should not receive its own broadcast");
}

/// Scenario 5: broadcasting to the union of two rooms while excepting a
/// third reaches every member of the union minus the excepted room's member.
#[tokio::test]
async fn multi_room_union_with_except() {
    let port = 9204;
    fixture::create_server(port, |io| {
        io.ns("/", |socket: Arc<Socket<LocalAdapter>>| {
            socket.on("join", |socket: Arc<Socket<LocalAdapter>>, Data(room): Data<String>| {
                let _ = socket.join(room);
            });
            socket.on(
                "announce",
                |socket: Arc<Socket<LocalAdapter>>, Data(_): Data<Value>| {
                    let _ = socket
                        .to(vec!["room1".to_string(), "room2".to_string()])
                        .except("roomE".to_string())
                        .emit("announce", "hi");
                },
            );
        });
    })
    .await;

    let (mut r1, _) = fixture::connect(port, "/", Value::Null).await;
    let (mut r2, _) = fixture::connect(port, "/", Value::Null).await;
    let (mut excepted, _) = fixture::connect(port, "/", Value::Null).await;
    let (mut sender, _) = fixture::connect(port, "/", Value::Null).await;

    fixture::send_event(&mut r1, "/", "join", json!("room1")).await;
    fixture::send_event(&mut r2, "/", "join", json!("room2")).await;
    fixture::send_event(&mut excepted, "/", "join", json!("room1")).await;
    fixture::send_event(&mut excepted, "/", "join", json!("roomE")).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    fixture::send_event(&mut sender, "/", "announce", json!(null)).await;

    let (e1, _) = fixture::next_event(&mut r1, "/").await;
    assert_eq!(e1, "announce");
    let (e2, _) = fixture::next_event(&mut r2, "/").await;
    assert_eq!(e2, "announce");

    let no_echo = tokio::time::timeout(Duration::from_millis(150), fixture::next_event(&mut excepted, "/")).await;
    assert!(no_echo.is_err(), "the excepted room's member must not receive the broadcast");
}

/// Scenario 6: a middleware chain observed end-to-end over the wire — the
/// middleware inserts a marker argument ahead of the event's own payload,
/// and the listener sees the rewritten argument tuple.
#[tokio::test]
async fn middleware_chain_mutation_observed_over_the_wire() {
    let port = 9205;
    fixture::create_server(port, |io| {
        io.ns("/", |socket: Arc<Socket<LocalAdapter>>| {
            socket.add_middleware(|tuple| {
                tuple.insert(1, Value::String("tagged".into()));
                Ok(())
            });
            socket.on(
                "annotate",
                |socket: Arc<Socket<LocalAdapter>>, Data((tag, payload)): Data<(String, String)>| {
                    let _ = socket.emit("annotated", json!({ "tag": tag, "payload": payload }));
                },
            );
        });
    })
    .await;

    let (mut ws, _sid) = fixture::connect(port, "/", Value::Null).await;
    fixture::send_event(&mut ws, "/", "annotate", json!("hello")).await;
    let (event, data) = fixture::next_event(&mut ws, "/").await;
    assert_eq!(event, "annotated");
    assert_eq!(data, json!({ "tag": "tagged", "payload": "hello" }));
}
