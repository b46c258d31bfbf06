//! Consumer-facing client
//!
//! [`LiveClient`] owns one [`TransportConnection`] and fans its lifecycle
//! out to observers registered with `subscribe`/`on_*`. Observers are
//! removed explicitly with [`LiveClient::unsubscribe`] and all at once when
//! the client is dropped, which also disconnects and cancels any pending
//! reconnect.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::event_loop::LoopEvent;
use crate::protocol::Frame;
use crate::scheduler::Scheduler;
use crate::transport::{ConnectionState, Connector, TransportConnection, TransportEvent};

/// Lifecycle and message notifications delivered to observers
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Open,
    Close { code: u16, reason: String },
    Error(String),
    Message(Frame),
    Reconnecting { attempt: u32, delay: Duration },
    /// Reconnect attempts exhausted; only an explicit `connect()` retries
    Failed { attempts: u32 },
}

/// Handle returned by observer registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(&ClientEvent)>;

#[derive(Default)]
struct Observers {
    next_id: u64,
    entries: Vec<(SubscriptionId, Observer)>,
}

impl Observers {
    fn add(&mut self, observer: Observer) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, observer));
        id
    }

    fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    fn notify(&mut self, event: &ClientEvent) {
        for (id, observer) in self.entries.iter_mut() {
            if catch_unwind(AssertUnwindSafe(|| observer(event))).is_err() {
                tracing::error!("Observer {:?} panicked on {:?}", id, event);
            }
        }
    }
}

pub struct LiveClient<C: Connector, S: Scheduler> {
    client_id: String,
    transport: TransportConnection<C, S>,
    observers: Observers,
    last_message: Option<Frame>,
}

impl<C: Connector, S: Scheduler> fmt::Debug for LiveClient<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveClient")
            .field("client_id", &self.client_id)
            .field("url", &self.transport.url())
            .field("state", &self.transport.state())
            .field("observers", &self.observers.entries.len())
            .finish()
    }
}

impl<C: Connector, S: Scheduler> LiveClient<C, S> {
    /// Build a client from config. Connects immediately when
    /// `auto_connect` is set.
    pub fn new(config: &SyncConfig, connector: C, scheduler: S) -> Result<Self> {
        let url = config.resolve_url()?;
        let client_id = format!(
            "live_{}",
            uuid::Uuid::new_v4().to_string().split('-').next().unwrap_or_default()
        );
        tracing::info!("Client {} targeting {}", client_id, url);

        let mut client = Self {
            client_id,
            transport: TransportConnection::new(url, config.reconnect_policy(), connector, scheduler),
            observers: Observers::default(),
            last_message: None,
        };
        if config.auto_connect {
            client.connect();
        }
        Ok(client)
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn url(&self) -> &str {
        self.transport.url()
    }

    pub fn connect(&mut self) {
        let events = self.transport.connect();
        self.publish(events);
    }

    pub fn disconnect(&mut self) {
        let events = self.transport.disconnect();
        self.publish(events);
    }

    /// Send a `{type, payload, timestamp}` frame. Returns `false` when not
    /// connected; the frame is dropped, not queued.
    pub fn send(&mut self, kind: &str, payload: Value) -> bool {
        if !self.is_connected() {
            tracing::debug!("Not connected; dropping outbound '{}'", kind);
            return false;
        }
        let frame = Frame::stamped(kind, payload, Utc::now());
        match frame.to_json() {
            Ok(text) => self.transport.send(text),
            Err(e) => {
                tracing::warn!("Cannot encode outbound '{}': {}", kind, e);
                false
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.state() == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        self.transport.state()
    }

    /// Generation of the current socket; changes on every (re)connect
    pub fn generation(&self) -> u64 {
        self.transport.generation()
    }

    pub fn last_message(&self) -> Option<&Frame> {
        self.last_message.as_ref()
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&ClientEvent) + 'static) -> SubscriptionId {
        self.observers.add(Box::new(observer))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.remove(id)
    }

    pub fn on_open(&mut self, mut f: impl FnMut() + 'static) -> SubscriptionId {
        self.subscribe(move |event| {
            if let ClientEvent::Open = event {
                f();
            }
        })
    }

    pub fn on_close(&mut self, mut f: impl FnMut(u16, &str) + 'static) -> SubscriptionId {
        self.subscribe(move |event| {
            if let ClientEvent::Close { code, reason } = event {
                f(*code, reason);
            }
        })
    }

    pub fn on_error(&mut self, mut f: impl FnMut(&str) + 'static) -> SubscriptionId {
        self.subscribe(move |event| {
            if let ClientEvent::Error(message) = event {
                f(message);
            }
        })
    }

    pub fn on_message(&mut self, mut f: impl FnMut(&Frame) + 'static) -> SubscriptionId {
        self.subscribe(move |event| {
            if let ClientEvent::Message(frame) = event {
                f(frame);
            }
        })
    }

    pub fn on_failed(&mut self, mut f: impl FnMut(u32) + 'static) -> SubscriptionId {
        self.subscribe(move |event| {
            if let ClientEvent::Failed { attempts } = event {
                f(*attempts);
            }
        })
    }

    /// Apply one loop event. Returns the parsed frame when the event
    /// delivered a valid message.
    pub fn handle(&mut self, event: LoopEvent) -> Option<Frame> {
        let events = self.transport.handle(event);
        self.publish(events)
    }

    fn publish(&mut self, events: Vec<TransportEvent>) -> Option<Frame> {
        let mut delivered = None;
        for event in events {
            let event = match event {
                TransportEvent::Open => ClientEvent::Open,
                TransportEvent::Close { code, reason } => ClientEvent::Close { code, reason },
                TransportEvent::Error(message) => ClientEvent::Error(message),
                TransportEvent::Reconnecting { attempt, delay } => {
                    ClientEvent::Reconnecting { attempt, delay }
                }
                TransportEvent::Failed { attempts } => ClientEvent::Failed { attempts },
                TransportEvent::Message(raw) => match Frame::parse(&raw) {
                    Ok(frame) => {
                        self.last_message = Some(frame.clone());
                        delivered = Some(frame.clone());
                        ClientEvent::Message(frame)
                    }
                    Err(e) => {
                        tracing::warn!("Dropping frame: {}", e);
                        continue;
                    }
                },
            };
            self.observers.notify(&event);
        }
        delivered
    }
}

impl<C: Connector, S: Scheduler> Drop for LiveClient<C, S> {
    fn drop(&mut self) {
        self.observers.entries.clear();
        if self.transport.state() != ConnectionState::Disconnected {
            tracing::info!("Client {} dropped; disconnecting", self.client_id);
            self.transport.disconnect();
        }
    }
}
