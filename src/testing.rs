//! In-memory doubles for driving a client without sockets or timers.
//!
//! Both types are cheap handles over shared state: keep a clone, hand the
//! other to the client, and inspect or script from the test.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::event_loop::{LoopEvent, SocketEvent};
use crate::scheduler::{Scheduler, TimerId};
use crate::transport::Connector;

#[derive(Debug, Default)]
struct ManualTimers {
    pending: Vec<(TimerId, Duration)>,
    scheduled: Vec<Duration>,
    cancelled: Vec<TimerId>,
}

/// Scheduler whose timers only fire when the test says so
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    inner: Rc<RefCell<ManualTimers>>,
}

impl ManualScheduler {
    pub fn pending(&self) -> Vec<(TimerId, Duration)> {
        self.inner.borrow().pending.clone()
    }

    /// Every delay ever scheduled, in order
    pub fn scheduled_delays(&self) -> Vec<Duration> {
        self.inner.borrow().scheduled.clone()
    }

    pub fn cancelled(&self) -> Vec<TimerId> {
        self.inner.borrow().cancelled.clone()
    }

    /// Remove the oldest pending timer and return the event it would post
    pub fn fire_next(&self) -> Option<LoopEvent> {
        let mut timers = self.inner.borrow_mut();
        if timers.pending.is_empty() {
            return None;
        }
        let (timer, _) = timers.pending.remove(0);
        Some(LoopEvent::Timer(timer))
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, timer: TimerId, delay: Duration) {
        let mut timers = self.inner.borrow_mut();
        timers.pending.push((timer, delay));
        timers.scheduled.push(delay);
    }

    fn cancel(&mut self, timer: TimerId) {
        let mut timers = self.inner.borrow_mut();
        timers.pending.retain(|(id, _)| *id != timer);
        timers.cancelled.push(timer);
    }
}

#[derive(Debug, Default)]
struct Script {
    opens: Vec<(String, u64)>,
    sent: Vec<String>,
    closes: Vec<(u16, String)>,
    open: bool,
}

/// Connector that records calls and builds the events a real socket would
/// post for the most recently opened generation
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    inner: Rc<RefCell<Script>>,
}

impl ScriptedConnector {
    pub fn open_count(&self) -> usize {
        self.inner.borrow().opens.len()
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.inner.borrow().opens.iter().map(|(url, _)| url.clone()).collect()
    }

    pub fn generation(&self) -> u64 {
        self.inner.borrow().opens.last().map(|(_, g)| *g).unwrap_or(0)
    }

    pub fn sent(&self) -> Vec<String> {
        self.inner.borrow().sent.clone()
    }

    pub fn closes(&self) -> Vec<(u16, String)> {
        self.inner.borrow().closes.clone()
    }

    fn event(&self, event: SocketEvent) -> LoopEvent {
        LoopEvent::Socket {
            generation: self.generation(),
            event,
        }
    }

    pub fn opened(&self) -> LoopEvent {
        self.event(SocketEvent::Opened)
    }

    pub fn message(&self, raw: &str) -> LoopEvent {
        self.event(SocketEvent::Message(raw.to_string()))
    }

    pub fn closed(&self, code: u16) -> LoopEvent {
        self.event(SocketEvent::Closed {
            code,
            reason: String::new(),
        })
    }

    pub fn error(&self, message: &str) -> LoopEvent {
        self.event(SocketEvent::Error(message.to_string()))
    }
}

impl Connector for ScriptedConnector {
    fn open(&mut self, url: &str, generation: u64) {
        let mut script = self.inner.borrow_mut();
        script.opens.push((url.to_string(), generation));
        script.open = true;
    }

    fn send(&mut self, text: String) -> bool {
        let mut script = self.inner.borrow_mut();
        if !script.open {
            return false;
        }
        script.sent.push(text);
        true
    }

    fn close(&mut self, code: u16, reason: &str) {
        let mut script = self.inner.borrow_mut();
        script.closes.push((code, reason.to_string()));
        script.open = false;
    }
}
