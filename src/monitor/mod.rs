//! Text rendering for the `trivia-live-monitor` binary
//!
//! Kept in the library so the formatting is testable without a socket.

use crate::client::ClientEvent;
use crate::protocol::{ActivityAction, ActivityEntry};
use crate::router::RouteOutcome;
use crate::session::LiveState;

/// Placeholder for entries whose timestamp could not be parsed
const UNDATED: &str = "--";

fn verb(action: ActivityAction) -> &'static str {
    match action {
        ActivityAction::Create => "created",
        ActivityAction::Edit => "edited",
        ActivityAction::Delete => "deleted",
        ActivityAction::View => "viewed",
        ActivityAction::Export => "exported",
    }
}

/// One activity feed line, e.g.
/// `[2024-05-01 10:00:00] Dana (editor) edited question #42: fixed typo`
pub fn feed_line(entry: &ActivityEntry) -> String {
    let when = entry
        .timestamp
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| UNDATED.to_string());
    let actor = if entry.actor_name.is_empty() {
        format!("user {}", entry.actor_id)
    } else {
        entry.actor_name.clone()
    };

    let mut line = format!("[{}] {}", when, actor);
    if !entry.actor_role.is_empty() {
        line.push_str(&format!(" ({})", entry.actor_role));
    }
    line.push_str(&format!(" {} {}", verb(entry.action), entry.entity_type.as_str()));
    if let Some(id) = &entry.entity_id {
        line.push_str(&format!(" #{}", id));
    }
    if !entry.details.is_empty() {
        line.push_str(&format!(": {}", entry.details));
    }
    line
}

/// Human-readable lifecycle line; `None` for plain messages
pub fn event_line(event: &ClientEvent) -> Option<String> {
    match event {
        ClientEvent::Open => Some("connected".to_string()),
        ClientEvent::Close { code, reason } if reason.is_empty() => {
            Some(format!("closed ({})", code))
        }
        ClientEvent::Close { code, reason } => Some(format!("closed ({}: {})", code, reason)),
        ClientEvent::Error(message) => Some(format!("error: {}", message)),
        ClientEvent::Reconnecting { attempt, delay } => Some(format!(
            "reconnecting in {}ms (attempt {})",
            delay.as_millis(),
            attempt
        )),
        ClientEvent::Failed { attempts } => Some(format!(
            "gave up after {} reconnect attempt(s)",
            attempts
        )),
        ClientEvent::Message(_) => None,
    }
}

pub fn outcome_label(outcome: RouteOutcome) -> &'static str {
    match outcome {
        RouteOutcome::Dispatched { failed: 0, .. } => "applied",
        RouteOutcome::Dispatched { .. } => "partially applied",
        RouteOutcome::Unhandled => "unhandled",
        RouteOutcome::Duplicate => "duplicate",
        RouteOutcome::Malformed => "malformed",
    }
}

/// Short state summary followed by the newest `feed_limit` feed lines
pub fn snapshot(state: &LiveState, feed_limit: usize) -> Vec<String> {
    let mut lines = vec![format!(
        "{} question(s), {} activity entr{}",
        state.questions.len(),
        state.activity.len(),
        if state.activity.len() == 1 { "y" } else { "ies" }
    )];
    lines.extend(state.activity.iter().take(feed_limit).map(feed_line));
    lines
}
