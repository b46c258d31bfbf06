//! WebSocket connector on tokio-tungstenite

use std::borrow::Cow;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use crate::event_loop::{LoopHandle, SocketEvent};
use crate::transport::state::ABNORMAL_CLOSE_CODE;
use crate::transport::Connector;

/// Close code reported when the peer's close frame had no status
const NO_STATUS_CODE: u16 = 1005;

/// Handshake limit used unless the session configures one
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

struct ActiveSocket {
    generation: u64,
    outbound: mpsc::UnboundedSender<Message>,
    task: JoinHandle<()>,
}

/// Connector that runs each socket in its own tokio task.
///
/// The task only reads and writes the socket; everything it observes is
/// posted back to the loop tagged with the socket's generation.
pub struct WsConnector {
    handle: LoopHandle,
    connect_timeout: Duration,
    active: Option<ActiveSocket>,
}

impl WsConnector {
    pub fn new(handle: LoopHandle) -> Self {
        Self {
            handle,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            active: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Connector for WsConnector {
    fn open(&mut self, url: &str, generation: u64) {
        if let Some(previous) = self.active.take() {
            tracing::debug!("Replacing socket generation {}", previous.generation);
            previous.task.abort();
        }

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_socket(
            url.to_string(),
            generation,
            self.connect_timeout,
            self.handle.clone(),
            outbound_rx,
        ));
        self.active = Some(ActiveSocket {
            generation,
            outbound,
            task,
        });
    }

    fn send(&mut self, text: String) -> bool {
        match &self.active {
            Some(socket) => socket.outbound.send(Message::Text(text)).is_ok(),
            None => false,
        }
    }

    fn close(&mut self, code: u16, reason: &str) {
        let Some(socket) = self.active.take() else {
            return;
        };
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: Cow::Owned(reason.to_string()),
        };
        // The task exits after writing the close frame
        if socket.outbound.send(Message::Close(Some(frame))).is_err() {
            socket.task.abort();
        }
    }
}

impl Drop for WsConnector {
    fn drop(&mut self) {
        if let Some(socket) = self.active.take() {
            socket.task.abort();
        }
    }
}

async fn run_socket(
    url: String,
    generation: u64,
    connect_timeout: Duration,
    handle: LoopHandle,
    mut outbound: mpsc::UnboundedReceiver<Message>,
) {
    let post = |event: SocketEvent| {
        handle.post_socket(generation, event);
    };

    let ws = match tokio::time::timeout(connect_timeout, connect_async(url.as_str())).await {
        Ok(Ok((ws, _response))) => ws,
        Ok(Err(e)) => {
            tracing::warn!("Connecting to {} failed: {}", url, e);
            post(SocketEvent::Error(format!("connect failed: {}", e)));
            post(abnormal_close());
            return;
        }
        Err(_) => {
            tracing::warn!("Connecting to {} timed out after {:?}", url, connect_timeout);
            post(SocketEvent::Error(format!(
                "connect timed out after {:?}",
                connect_timeout
            )));
            post(abnormal_close());
            return;
        }
    };
    post(SocketEvent::Opened);

    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            msg = outbound.recv() => {
                match msg {
                    Some(Message::Close(frame)) => {
                        let _ = sink.send(Message::Close(frame)).await;
                        break;
                    }
                    Some(msg) => {
                        if let Err(e) = sink.send(msg).await {
                            post(SocketEvent::Error(format!("write failed: {}", e)));
                            post(abnormal_close());
                            break;
                        }
                    }
                    // Connector dropped without closing
                    None => {
                        let _ = sink.close().await;
                        break;
                    }
                }
            }

            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => post(SocketEvent::Message(text)),
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                        Ok(text) => post(SocketEvent::Message(text)),
                        Err(_) => tracing::debug!("Dropping non-UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = match frame {
                            Some(f) => (u16::from(f.code), f.reason.into_owned()),
                            None => (NO_STATUS_CODE, String::new()),
                        };
                        post(SocketEvent::Closed { code, reason });
                        // flush the queued close reply before dropping the socket
                        let _ = sink.close().await;
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        post(SocketEvent::Error(e.to_string()));
                        post(abnormal_close());
                        break;
                    }
                    None => {
                        post(abnormal_close());
                        break;
                    }
                }
            }
        }
    }
}

fn abnormal_close() -> SocketEvent {
    SocketEvent::Closed {
        code: ABNORMAL_CLOSE_CODE,
        reason: String::new(),
    }
}
