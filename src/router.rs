//! Inbound frame routing
//!
//! Handlers are registered per frame `type` and receive a mutable context
//! (the view state they reconcile into) plus the parsed frame. Nothing that
//! arrives over the wire can make routing fail: malformed frames, unknown
//! types, handler errors, and handler panics are all logged and dropped.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::Result;
use crate::protocol::{Frame, MessageKind};

type Handler<Ctx> = Box<dyn FnMut(&mut Ctx, &Frame) -> Result<()>>;

/// What happened to one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Handlers ran; `failed` of them returned an error or panicked
    Dispatched { handled: usize, failed: usize },
    /// No handler registered for the frame's type
    Unhandled,
    /// Sequence number at or below one already seen on this connection
    Duplicate,
    /// Not a valid frame
    Malformed,
}

pub struct MessageRouter<Ctx> {
    handlers: HashMap<String, Vec<Handler<Ctx>>>,
    last_seq: Option<u64>,
}

impl<Ctx> Default for MessageRouter<Ctx> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
            last_seq: None,
        }
    }
}

impl<Ctx> MessageRouter<Ctx> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a frame type. Handlers for the same type run
    /// in registration order.
    pub fn on<F>(&mut self, kind: impl Into<String>, handler: F) -> &mut Self
    where
        F: FnMut(&mut Ctx, &Frame) -> Result<()> + 'static,
    {
        self.handlers
            .entry(kind.into())
            .or_default()
            .push(Box::new(handler));
        self
    }

    pub fn on_kind<F>(&mut self, kind: MessageKind, handler: F) -> &mut Self
    where
        F: FnMut(&mut Ctx, &Frame) -> Result<()> + 'static,
    {
        self.on(kind.as_str(), handler)
    }

    pub fn handles(&self, kind: &str) -> bool {
        self.handlers.get(kind).is_some_and(|h| !h.is_empty())
    }

    /// Forget the last sequence number; call when a new connection opens
    pub fn reset_sequence(&mut self) {
        self.last_seq = None;
    }

    /// Parse a raw frame and dispatch it
    pub fn route(&mut self, ctx: &mut Ctx, raw: &str) -> RouteOutcome {
        match Frame::parse(raw) {
            Ok(frame) => self.dispatch(ctx, &frame),
            Err(e) => {
                tracing::warn!("Dropping frame: {}", e);
                RouteOutcome::Malformed
            }
        }
    }

    /// Dispatch an already-parsed frame
    pub fn dispatch(&mut self, ctx: &mut Ctx, frame: &Frame) -> RouteOutcome {
        if let Some(seq) = frame.seq {
            if self.last_seq.is_some_and(|last| seq <= last) {
                tracing::debug!("Dropping replayed '{}' frame (seq {})", frame.kind, seq);
                return RouteOutcome::Duplicate;
            }
            self.last_seq = Some(seq);
        }

        let Some(handlers) = self.handlers.get_mut(&frame.kind) else {
            tracing::debug!("No handler for '{}' frame", frame.kind);
            return RouteOutcome::Unhandled;
        };

        let mut failed = 0;
        for handler in handlers.iter_mut() {
            match catch_unwind(AssertUnwindSafe(|| handler(ctx, frame))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failed += 1;
                    tracing::warn!("Handler for '{}' failed: {}", frame.kind, e);
                }
                Err(_) => {
                    failed += 1;
                    tracing::error!("Handler for '{}' panicked", frame.kind);
                }
            }
        }

        RouteOutcome::Dispatched {
            handled: handlers.len(),
            failed,
        }
    }
}
