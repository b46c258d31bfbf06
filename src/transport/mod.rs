//! Transport connection
//!
//! Owns one logical socket and drives it through the table in [`state`].
//! The socket itself is behind [`Connector`] and timers behind
//! [`Scheduler`], so the lifecycle can be replayed deterministically.
//!
//! Every socket gets a fresh generation number and every reconnect delay a
//! fresh [`TimerId`]. Events carrying an older generation or a timer that is
//! no longer pending are dropped before they reach the table.

pub mod state;
pub mod ws;

use std::time::Duration;

use crate::backoff::ReconnectPolicy;
use crate::event_loop::{LoopEvent, SocketEvent};
use crate::scheduler::{Scheduler, TimerId};

pub use state::{
    transition, ConnectionState, Effect, Step, Trigger, ABNORMAL_CLOSE_CODE, MANUAL_CLOSE_CODE,
};
pub use ws::WsConnector;

/// Reason sent with a client-initiated close
pub const MANUAL_CLOSE_REASON: &str = "client disconnect";

/// Opens, writes to, and closes the underlying socket.
///
/// Implementations report what happens to the socket by posting
/// [`LoopEvent::Socket`] events tagged with the generation passed to `open`.
pub trait Connector {
    fn open(&mut self, url: &str, generation: u64);

    /// Write one text frame; `false` if no socket is open
    fn send(&mut self, text: String) -> bool;

    fn close(&mut self, code: u16, reason: &str);
}

/// Lifecycle notification produced by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Open,
    Close { code: u16, reason: String },
    Error(String),
    Message(String),
    Reconnecting { attempt: u32, delay: Duration },
    Failed { attempts: u32 },
}

pub struct TransportConnection<C: Connector, S: Scheduler> {
    url: String,
    policy: ReconnectPolicy,
    connector: C,
    scheduler: S,
    state: ConnectionState,
    attempts: u32,
    generation: u64,
    pending_timer: Option<TimerId>,
    next_timer: u64,
}

#[derive(Default)]
struct Detail {
    code: Option<u16>,
    reason: String,
    error: Option<String>,
}

impl<C: Connector, S: Scheduler> TransportConnection<C, S> {
    pub fn new(url: impl Into<String>, policy: ReconnectPolicy, connector: C, scheduler: S) -> Self {
        Self {
            url: url.into(),
            policy,
            connector,
            scheduler,
            state: ConnectionState::Disconnected,
            attempts: 0,
            generation: 0,
            pending_timer: None,
            next_timer: 0,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Failed connections since the last successful open
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Generation of the most recently opened socket
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn connect(&mut self) -> Vec<TransportEvent> {
        self.fire(Trigger::Connect, Detail::default())
    }

    /// Cancel any pending reconnect and close the socket with
    /// [`MANUAL_CLOSE_CODE`]. Always ends in `Disconnected`.
    pub fn disconnect(&mut self) -> Vec<TransportEvent> {
        self.fire(
            Trigger::Disconnect,
            Detail {
                code: Some(MANUAL_CLOSE_CODE),
                reason: MANUAL_CLOSE_REASON.to_string(),
                error: None,
            },
        )
    }

    /// Fire-and-forget write. Returns `false` unless connected; nothing is
    /// buffered for later.
    pub fn send(&mut self, text: String) -> bool {
        if self.state != ConnectionState::Connected {
            tracing::debug!("Dropping outbound frame while {}", self.state);
            return false;
        }
        self.connector.send(text)
    }

    /// Apply one loop event
    pub fn handle(&mut self, event: LoopEvent) -> Vec<TransportEvent> {
        match event {
            LoopEvent::Timer(timer) => {
                if self.pending_timer != Some(timer) {
                    tracing::debug!("Ignoring stale timer {:?}", timer);
                    return Vec::new();
                }
                self.pending_timer = None;
                self.fire(Trigger::DelayElapsed, Detail::default())
            }
            LoopEvent::Socket { generation, event } => {
                if generation != self.generation {
                    tracing::debug!(
                        "Ignoring {:?} from stale socket generation {} (current {})",
                        event,
                        generation,
                        self.generation
                    );
                    return Vec::new();
                }
                match event {
                    SocketEvent::Opened => self.fire(Trigger::Opened, Detail::default()),
                    SocketEvent::Closed { code, reason } => self.fire(
                        Trigger::Closed { code },
                        Detail {
                            code: Some(code),
                            reason,
                            error: None,
                        },
                    ),
                    SocketEvent::Error(message) => self.fire(
                        Trigger::Errored,
                        Detail {
                            error: Some(message),
                            ..Detail::default()
                        },
                    ),
                    SocketEvent::Message(raw) => {
                        if self.state == ConnectionState::Connected {
                            vec![TransportEvent::Message(raw)]
                        } else {
                            tracing::debug!("Ignoring message received while {}", self.state);
                            Vec::new()
                        }
                    }
                }
            }
        }
    }

    fn fire(&mut self, trigger: Trigger, detail: Detail) -> Vec<TransportEvent> {
        let step = transition(self.state, trigger, self.policy.allows(self.attempts));
        if step.next != self.state {
            tracing::info!("Transport {} -> {} on {:?}", self.state, step.next, trigger);
        }
        self.state = step.next;

        let mut out = Vec::new();
        for effect in step.effects {
            match effect {
                Effect::ResetAttempts => self.attempts = 0,
                Effect::OpenSocket => {
                    self.generation += 1;
                    tracing::info!("Opening {} (generation {})", self.url, self.generation);
                    self.connector.open(&self.url, self.generation);
                }
                Effect::CloseSocket => {
                    self.connector.close(MANUAL_CLOSE_CODE, MANUAL_CLOSE_REASON);
                }
                Effect::ScheduleReconnect => {
                    let delay = self.policy.delay(self.attempts);
                    self.attempts += 1;
                    let timer = TimerId(self.next_timer);
                    self.next_timer += 1;
                    self.scheduler.schedule(timer, delay);
                    self.pending_timer = Some(timer);
                    tracing::info!(
                        "Reconnecting in {}ms (attempt {}/{})",
                        delay.as_millis(),
                        self.attempts,
                        self.policy.max_attempts()
                    );
                    out.push(TransportEvent::Reconnecting {
                        attempt: self.attempts,
                        delay,
                    });
                }
                Effect::CancelReconnect => {
                    if let Some(timer) = self.pending_timer.take() {
                        self.scheduler.cancel(timer);
                    }
                }
                Effect::EmitOpen => out.push(TransportEvent::Open),
                Effect::EmitClose => out.push(TransportEvent::Close {
                    code: detail.code.unwrap_or(ABNORMAL_CLOSE_CODE),
                    reason: detail.reason.clone(),
                }),
                Effect::EmitError => {
                    let message = detail.error.clone().unwrap_or_default();
                    tracing::warn!("Socket error: {}", message);
                    out.push(TransportEvent::Error(message));
                }
                Effect::GiveUp => {
                    tracing::warn!(
                        "Giving up on {} after {} reconnect attempt(s)",
                        self.url,
                        self.attempts
                    );
                    out.push(TransportEvent::Failed {
                        attempts: self.attempts,
                    });
                }
            }
        }
        out
    }
}
