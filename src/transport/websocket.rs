// src/transport/websocket.rs

//! WebSocket transport implementation.
//!
//! Connects to the kernel's channel endpoint and adapts the socket to the
//! domain `Transport` trait. A pump task forwards inbound messages into
//! the frame inbox in arrival order; outbound frames are written as text
//! messages under a sink lock. Ping/pong keepalive is handled by the
//! WebSocket library itself and never surfaces as frames.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::{
    // ---
    log_debug,
    log_warn,
    Error,
    FrameInbox,
    KernelConfig,
    Result,
    Transport,
    TransportPtr,
};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

struct WebSocketTransport {
    // ---
    sink: Mutex<WsSink>,
    frames: Mutex<Option<FrameInbox>>,

    /// Inbound pump handle; the task ends when the socket closes or the
    /// inbox is dropped.
    _pump: JoinHandle<()>,
}

/// Connect to the kernel channel endpoint described by `config`.
///
/// # Errors
///
/// Returns `Error::InvalidUrl` if the endpoint cannot be built and
/// `Error::Connect` if dialing or the WebSocket handshake fails.
pub async fn create_transport(config: &KernelConfig) -> Result<TransportPtr> {
    // ---
    let url = config.channels_url()?;

    log_debug!("connecting to {url}");

    let (socket, _response) = connect_async(url.as_str())
        .await
        .map_err(|err| Error::Connect(err.to_string()))?;

    let (sink, mut stream) = socket.split();
    let (inbound_tx, inbound_rx) = mpsc::channel(64);

    let pump = tokio::spawn(async move {
        // ---
        while let Some(message) = stream.next().await {
            let frame = match message {
                Ok(Message::Text(text)) => Bytes::from(text),
                Ok(Message::Binary(raw)) => Bytes::from(raw),
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(_err) => {
                    log_warn!("websocket read failed: {_err}");
                    break;
                }
            };

            // A dropped inbox means the client is gone; stop pumping.
            if inbound_tx.send(frame).await.is_err() {
                break;
            }
        }

        log_debug!("websocket pump finished");
    });

    Ok(Arc::new(WebSocketTransport {
        sink: Mutex::new(sink),
        frames: Mutex::new(Some(FrameInbox { inbox: inbound_rx })),
        _pump: pump,
    }))
}

#[async_trait::async_trait]
impl Transport for WebSocketTransport {
    // ---

    async fn send(&self, frame: Bytes) -> Result<()> {
        // ---
        // Frames are JSON; the backend expects text messages.
        let text =
            String::from_utf8(frame.to_vec()).map_err(|err| Error::Send(err.to_string()))?;

        self.sink
            .lock()
            .await
            .send(Message::Text(text))
            .await
            .map_err(|err| Error::Send(err.to_string()))
    }

    async fn frames(&self) -> Result<FrameInbox> {
        // ---
        self.frames
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::Transport("inbound half already claimed".to_string()))
    }

    async fn close(&self) -> Result<()> {
        // ---
        self.sink
            .lock()
            .await
            .close()
            .await
            .map_err(|err| Error::Transport(err.to_string()))
    }
}
