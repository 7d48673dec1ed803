//! Futures/streams over a pending acknowledgement, with a timeout (spec.md
//! §4.6 "ACK resolution"/§8 "Timeout liveness").

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_core::Stream;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Sleep;

use crate::errors::{AckError, SocketError};

/// The raw data carried by an ACK response, before it has been deserialized
/// into the caller's requested type.
#[derive(Debug, Clone)]
pub struct AckResponse {
    pub data: Value,
    pub binary: Vec<Vec<u8>>,
}

pub type AckResult = Result<AckResponse, SocketError>;

/// A single-ack future with a deadline, built by [`AckInnerStream::send`].
pub(crate) struct AckInnerStream {
    rx: oneshot::Receiver<AckResult>,
    deadline: Option<Pin<Box<Sleep>>>,
    done: bool,
}

impl AckInnerStream {
    pub(crate) fn send(rx: oneshot::Receiver<AckResult>, timeout: Duration) -> Self {
        Self {
            rx,
            deadline: Some(Box::pin(tokio::time::sleep(timeout))),
            done: false,
        }
    }
}

impl Stream for AckInnerStream {
    type Item = Result<AckResponse, AckError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        if let Poll::Ready(res) = Pin::new(&mut self.rx).poll(cx) {
            self.done = true;
            return Poll::Ready(Some(match res {
                Ok(Ok(ack)) => Ok(ack),
                Ok(Err(e)) => Err(AckError::Socket(e)),
                Err(_) => Err(AckError::SocketClosed),
            }));
        }
        if let Some(deadline) = self.deadline.as_mut() {
            if deadline.as_mut().poll(cx).is_ready() {
                self.done = true;
                return Poll::Ready(Some(Err(AckError::Timeout)));
            }
        }
        Poll::Pending
    }
}

impl Future for AckInnerStream {
    type Output = Result<AckResponse, AckError>;
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Stream::poll_next(self, cx) {
            Poll::Ready(Some(item)) => Poll::Ready(item),
            Poll::Ready(None) => Poll::Ready(Err(AckError::SocketClosed)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// A typed view over [`AckInnerStream`]: deserializes the raw JSON payload
/// into `V` as it resolves. Usable both as a `Future` (awaits the single
/// response) and as a `Stream` (yields exactly one item then ends), matching
/// the teacher's dual future/stream ergonomics for `emit_with_ack`.
pub struct AckStream<V = Value> {
    inner: Result<AckInnerStream, Option<AckError>>,
    _marker: PhantomData<V>,
}

impl<V> From<AckInnerStream> for AckStream<V> {
    fn from(inner: AckInnerStream) -> Self {
        Self {
            inner: Ok(inner),
            _marker: PhantomData,
        }
    }
}

impl<V> From<serde_json::Error> for AckStream<V> {
    fn from(e: serde_json::Error) -> Self {
        Self {
            inner: Err(Some(AckError::Deserialize(e))),
            _marker: PhantomData,
        }
    }
}

impl<V: DeserializeOwned + Unpin> Stream for AckStream<V> {
    type Item = Result<V, AckError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match &mut self.inner {
            Err(err) => Poll::Ready(err.take().map(Err)),
            Ok(inner) => match Pin::new(inner).poll_next(cx) {
                Poll::Ready(Some(Ok(ack))) => {
                    Poll::Ready(Some(serde_json::from_value(ack.data).map_err(AckError::from)))
                }
                Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => Poll::Ready(None),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

impl<V: DeserializeOwned + Unpin> std::future::Future for AckStream<V> {
    type Output = Result<V, AckError>;
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Stream::poll_next(self, cx) {
            Poll::Ready(Some(item)) => Poll::Ready(item),
            Poll::Ready(None) => Poll::Ready(Err(AckError::SocketClosed)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn resolves_with_ack_value() {
        let (tx, rx) = oneshot::channel();
        tx.send(Ok(AckResponse { data: Value::from(42), binary: vec![] })).unwrap();
        let inner = AckInnerStream::send(rx, Duration::from_secs(1));
        let stream: AckStream<i32> = inner.into();
        assert_eq!(stream.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn times_out_when_nothing_arrives() {
        let (_tx, rx) = oneshot::channel();
        let inner = AckInnerStream::send(rx, Duration::from_millis(10));
        let stream: AckStream<Value> = inner.into();
        let err = stream.await.unwrap_err();
        assert!(matches!(err, AckError::Timeout));
    }
}
