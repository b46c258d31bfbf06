//! Single-consumer event loop plumbing
//!
//! Socket tasks and timer tasks never touch client state. They post
//! [`LoopEvent`]s into one unbounded channel, and the owner of the session
//! applies them one at a time, in arrival order.

use tokio::sync::mpsc;

use crate::scheduler::TimerId;

/// Something that happened to a socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Opened,
    Message(String),
    Closed { code: u16, reason: String },
    Error(String),
}

/// Input to the client's state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    /// Event from the socket opened with this generation
    Socket { generation: u64, event: SocketEvent },
    /// A scheduled reconnect delay elapsed
    Timer(TimerId),
}

/// Sending side, cloned into socket and timer tasks
#[derive(Debug, Clone)]
pub struct LoopHandle {
    tx: mpsc::UnboundedSender<LoopEvent>,
}

impl LoopHandle {
    /// Post an event; returns `false` once the loop has been dropped
    pub fn post(&self, event: LoopEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn post_socket(&self, generation: u64, event: SocketEvent) -> bool {
        self.post(LoopEvent::Socket { generation, event })
    }
}

/// Receiving side, owned by whoever drives the session
#[derive(Debug)]
pub struct LoopEvents {
    rx: mpsc::UnboundedReceiver<LoopEvent>,
}

impl LoopEvents {
    pub async fn next(&mut self) -> Option<LoopEvent> {
        self.rx.recv().await
    }

    pub fn try_next(&mut self) -> Option<LoopEvent> {
        self.rx.try_recv().ok()
    }
}

pub fn channel() -> (LoopHandle, LoopEvents) {
    let (tx, rx) = mpsc::unbounded_channel();
    (LoopHandle { tx }, LoopEvents { rx })
}
