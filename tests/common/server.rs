//! Scripted WebSocket broadcaster
//!
//! Accepts any number of clients and applies each command to every
//! connection that is open when the command is issued.

use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone)]
enum Command {
    Broadcast(String),
    /// Drop the TCP stream without a close handshake
    Sever,
    Close(u16, String),
}

pub struct BroadcastServer {
    addr: SocketAddr,
    commands: broadcast::Sender<Command>,
    accepted: Arc<AtomicUsize>,
    close_replies: Arc<AtomicUsize>,
    received: Arc<std::sync::Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl BroadcastServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test server");
        let addr = listener.local_addr().expect("No local addr");
        let (commands, _) = broadcast::channel(64);
        let accepted = Arc::new(AtomicUsize::new(0));
        let close_replies = Arc::new(AtomicUsize::new(0));
        let received = Arc::new(std::sync::Mutex::new(Vec::new()));

        let task = {
            let commands = commands.clone();
            let accepted = accepted.clone();
            let close_replies = close_replies.clone();
            let received = received.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    // Subscribe before the handshake so nothing issued after
                    // the client sees Open is missed
                    let rx = commands.subscribe();
                    accepted.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve(stream, rx, received.clone(), close_replies.clone()));
                }
            })
        };

        Self {
            addr,
            commands,
            accepted,
            close_replies,
            received,
            task,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Connections accepted so far
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Close frames clients sent back after a server-initiated close
    pub fn close_replies(&self) -> usize {
        self.close_replies.load(Ordering::SeqCst)
    }

    /// Text frames received from clients
    pub fn received(&self) -> Vec<String> {
        self.received.lock().expect("poisoned").clone()
    }

    pub fn broadcast(&self, text: impl Into<String>) {
        let _ = self.commands.send(Command::Broadcast(text.into()));
    }

    pub fn sever(&self) {
        let _ = self.commands.send(Command::Sever);
    }

    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.commands.send(Command::Close(code, reason.to_string()));
    }

    /// Wait until `count` connections have been accepted
    pub async fn wait_for_connections(&self, count: usize, limit: Duration) {
        let deadline = tokio::time::Instant::now() + limit;
        while self.accepted() < count {
            if tokio::time::Instant::now() >= deadline {
                panic!("Expected {} connections, saw {}", count, self.accepted());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for BroadcastServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    stream: TcpStream,
    mut commands: broadcast::Receiver<Command>,
    received: Arc<std::sync::Mutex<Vec<String>>>,
    close_replies: Arc<AtomicUsize>,
) {
    let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };
    let (mut sink, mut source) = ws.split();

    loop {
        tokio::select! {
            command = commands.recv() => {
                match command {
                    Ok(Command::Broadcast(text)) => {
                        if sink.send(Message::Text(text)).await.is_err() {
                            return;
                        }
                    }
                    Ok(Command::Sever) => return,
                    Ok(Command::Close(code, reason)) => {
                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: Cow::Owned(reason),
                        };
                        let _ = sink.send(Message::Close(Some(frame))).await;
                        // drain until the client goes away
                        while let Some(Ok(msg)) = source.next().await {
                            if msg.is_close() {
                                close_replies.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                        return;
                    }
                    Err(_) => return,
                }
            }
            msg = source.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        received.lock().expect("poisoned").push(text);
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}
