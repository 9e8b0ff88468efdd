//! Transport seam between the state machine and the wire
//!
//! The manager drives a [`StreamTransport`], not a socket. Production uses
//! [`WebSocketTransport`]; tests swap in scripted transports to exercise the
//! state machine without a network.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::StreamError;

/// Write half of an established connection.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, text: &str) -> Result<(), StreamError>;

    /// Best-effort close; errors here are not actionable.
    async fn close(&mut self);
}

/// Read half of an established connection.
///
/// `None` means the peer closed the connection; `Some(Err(_))` is an I/O
/// failure, after which the source must not be polled again.
#[async_trait]
pub trait FrameSource: Send {
    async fn next_frame(&mut self) -> Option<Result<String, StreamError>>;
}

/// Dials one connection and hands back its two halves.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameSource>), StreamError>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production transport over `tokio-tungstenite`.
pub struct WebSocketTransport;

#[async_trait]
impl StreamTransport for WebSocketTransport {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameSource>), StreamError> {
        let (socket, _response) = connect_async(url)
            .await
            .map_err(|err| StreamError::Connect(err.to_string()))?;
        let (sink, source) = socket.split();
        Ok((Box::new(WsSink(sink)), Box::new(WsSource(source))))
    }
}

struct WsSink(SplitSink<WsStream, Message>);

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, text: &str) -> Result<(), StreamError> {
        self.0
            .send(Message::Text(text.into()))
            .await
            .map_err(|err| StreamError::Transport(err.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.0.send(Message::Close(None)).await;
    }
}

struct WsSource(SplitStream<WsStream>);

#[async_trait]
impl FrameSource for WsSource {
    async fn next_frame(&mut self) -> Option<Result<String, StreamError>> {
        while let Some(item) = self.0.next().await {
            match item {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                // Control frames and binary payloads are not part of the
                // protocol; skip them rather than fail the stream.
                Ok(Message::Ping(_))
                | Ok(Message::Pong(_))
                | Ok(Message::Binary(_))
                | Ok(Message::Frame(_)) => continue,
                Ok(Message::Close(_)) => return None,
                Err(err) => return Some(Err(StreamError::Transport(err.to_string()))),
            }
        }
        None
    }
}
