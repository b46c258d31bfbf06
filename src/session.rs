//! Live session: one client, one router, and the view state they keep in sync
//!
//! A [`LiveSession`] is the single owner of everything mutable. Whoever runs
//! the event loop pulls [`LoopEvent`]s and feeds them to
//! [`LiveSession::handle`]; frames that survive the transport are routed into
//! [`LiveState`] by the handlers installed in [`default_router`].

use crate::activity::ActivityLog;
use crate::client::LiveClient;
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::event_loop::{self, LoopEvent, LoopEvents};
use crate::protocol::{
    ActivityAction, ActivityEntityType, ActivityEntry, DeletedPayload, Frame, MessageKind,
    Question,
};
use crate::reconcile::{Applied, EntityCollection, EntityEvent};
use crate::router::{MessageRouter, RouteOutcome};
use crate::scheduler::{Scheduler, TokioScheduler};
use crate::transport::{Connector, WsConnector};

/// View state reconciled from the live feed
#[derive(Debug, Default)]
pub struct LiveState {
    pub questions: EntityCollection<Question>,
    pub activity: ActivityLog,
}

impl LiveState {
    pub fn new(max_activity_entries: usize) -> Self {
        Self {
            questions: EntityCollection::new(),
            activity: ActivityLog::new(max_activity_entries),
        }
    }
}

/// Router with handlers for every frame type the broadcaster sends
pub fn default_router() -> MessageRouter<LiveState> {
    let mut router = MessageRouter::new();

    router.on_kind(MessageKind::QuestionCreated, |state: &mut LiveState, frame: &Frame| {
        let question: Question = frame.decode()?;
        log_applied(frame, state.questions.apply(EntityEvent::Created(question)));
        Ok(())
    });

    router.on_kind(MessageKind::QuestionUpdated, |state: &mut LiveState, frame: &Frame| {
        let question: Question = frame.decode()?;
        log_applied(frame, state.questions.apply(EntityEvent::Updated(question)));
        Ok(())
    });

    router.on_kind(MessageKind::QuestionDeleted, |state: &mut LiveState, frame: &Frame| {
        let DeletedPayload { id } = frame.decode()?;
        log_applied(frame, state.questions.apply(EntityEvent::Deleted(id)));
        Ok(())
    });

    router.on_kind(MessageKind::UserActivity, |state: &mut LiveState, frame: &Frame| {
        state.activity.append(decode_entry(frame)?);
        Ok(())
    });

    router.on_kind(MessageKind::Activity, |state: &mut LiveState, frame: &Frame| {
        let entry = decode_entry(frame)?;
        let event = legacy_question_event(&entry);
        // the feed line stands even when the attached question is unusable
        state.activity.append(entry);
        if let Some(event) = event? {
            log_applied(frame, state.questions.apply(event));
        }
        Ok(())
    });

    router
}

/// Decode an activity payload. An entry sent without a timestamp is dated
/// by the frame's own send time.
fn decode_entry(frame: &Frame) -> Result<ActivityEntry> {
    let mut entry: ActivityEntry = frame.decode()?;
    let undated = frame.payload.get("timestamp").map_or(true, |ts| ts.is_null());
    if entry.timestamp.is_none() && undated {
        entry.timestamp = frame.sent_at();
    }
    Ok(entry)
}

/// Legacy `activity` frames about questions may carry the question itself in
/// `metadata.entity`; turn those into a collection event.
fn legacy_question_event(entry: &ActivityEntry) -> Result<Option<EntityEvent<Question>>> {
    if entry.entity_type != ActivityEntityType::Question {
        return Ok(None);
    }
    let Some(entity) = entry.metadata.as_ref().and_then(|m| m.get("entity")) else {
        return Ok(None);
    };
    if !entity.is_object() {
        return Ok(None);
    }

    let event = match entry.action {
        ActivityAction::Create | ActivityAction::Edit => {
            let question: Question = serde_json::from_value(entity.clone())
                .map_err(|e| SyncError::payload(MessageKind::Activity.as_str(), e))?;
            if entry.action == ActivityAction::Create {
                EntityEvent::Created(question)
            } else {
                EntityEvent::Updated(question)
            }
        }
        ActivityAction::Delete => {
            let DeletedPayload { id } = serde_json::from_value(entity.clone())
                .map_err(|e| SyncError::payload(MessageKind::Activity.as_str(), e))?;
            EntityEvent::Deleted(id)
        }
        ActivityAction::View | ActivityAction::Export => return Ok(None),
    };
    Ok(Some(event))
}

fn log_applied(frame: &Frame, applied: Applied) {
    tracing::debug!("Applied '{}': {:?}", frame.kind, applied);
}

pub struct LiveSession<C: Connector, S: Scheduler> {
    client: LiveClient<C, S>,
    router: MessageRouter<LiveState>,
    state: LiveState,
    seen_generation: u64,
}

impl<C: Connector, S: Scheduler> LiveSession<C, S> {
    pub fn new(config: &SyncConfig, connector: C, scheduler: S) -> Result<Self> {
        let client = LiveClient::new(config, connector, scheduler)?;
        Ok(Self {
            seen_generation: client.generation(),
            client,
            router: default_router(),
            state: LiveState::new(config.max_activity_entries),
        })
    }

    /// Seed the question list, e.g. from the initial REST load
    pub fn with_questions(mut self, questions: impl IntoIterator<Item = Question>) -> Self {
        self.state.questions.replace_all(questions);
        self
    }

    /// Apply one loop event; a delivered frame is routed into the view state
    pub fn handle(&mut self, event: LoopEvent) -> Option<RouteOutcome> {
        let frame = self.client.handle(event)?;
        let generation = self.client.generation();
        if generation != self.seen_generation {
            // sequence numbers restart with every connection
            self.router.reset_sequence();
            self.seen_generation = generation;
        }
        Some(self.router.dispatch(&mut self.state, &frame))
    }

    pub fn client(&self) -> &LiveClient<C, S> {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut LiveClient<C, S> {
        &mut self.client
    }

    /// Register extra handlers alongside the built-in ones
    pub fn router_mut(&mut self) -> &mut MessageRouter<LiveState> {
        &mut self.router
    }

    pub fn state(&self) -> &LiveState {
        &self.state
    }

    pub fn questions(&self) -> &EntityCollection<Question> {
        &self.state.questions
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.state.activity
    }

    pub fn connect(&mut self) {
        self.client.connect();
    }

    pub fn disconnect(&mut self) {
        self.client.disconnect();
    }
}

impl LiveSession<WsConnector, TokioScheduler> {
    /// Build a session on real sockets and tokio timers.
    ///
    /// Must be called inside a tokio runtime. The returned [`LoopEvents`]
    /// must be pumped into [`LiveSession::handle`].
    pub fn start(config: &SyncConfig) -> Result<(Self, LoopEvents)> {
        let (handle, events) = event_loop::channel();
        let session = Self::new(
            config,
            WsConnector::new(handle.clone()).with_connect_timeout(config.connect_timeout()),
            TokioScheduler::new(handle),
        )?;
        Ok((session, events))
    }
}
