//! Frame routing through a live session

use serde_json::json;

use trivia_live_sync::{Frame, RouteOutcome, SyncConfig, SyncError};

use crate::common::*;

fn feed_and_questions(session: &ScriptedSession) -> (usize, usize) {
    (session.activity().len(), session.questions().len())
}

#[test]
fn test_unknown_type_changes_nothing() {
    let (mut session, conn, _) = connected_session(SyncConfig::default());
    session.handle(conn.message(&question_created(1, "q")));
    session.handle(conn.message(&user_activity("a", "2024-05-01T10:00:00Z")));
    let before = feed_and_questions(&session);

    let outcome = session.handle(conn.message(&frame("question_archived", json!({ "id": 1 }))));
    assert_eq!(outcome, Some(RouteOutcome::Unhandled));
    assert_eq!(feed_and_questions(&session), before);
}

#[test]
fn test_malformed_frames_are_dropped() {
    let (mut session, conn, _) = connected_session(SyncConfig::default());
    for raw in [
        "not json",
        "[1, 2]",
        r#"{"payload": {"id": 1}}"#,
        r#"{"type": 7, "payload": {}}"#,
        r#"{"type": "question_created", "payload": "oops"}"#,
    ] {
        // the client rejects these before they reach the router
        assert_eq!(session.handle(conn.message(raw)), None, "{}", raw);
    }
    assert_eq!(feed_and_questions(&session), (0, 0));
    assert!(session.client().is_connected());
}

#[test]
fn test_missing_payload_reaches_handler_as_empty_object() {
    let (mut session, conn, _) = connected_session(SyncConfig::default());
    let outcome = session.handle(conn.message(r#"{"type": "question_deleted"}"#));
    // `{}` has no id, so the handler reports a failure
    assert_eq!(outcome, Some(RouteOutcome::Dispatched { handled: 1, failed: 1 }));
}

#[test]
fn test_extra_handlers_run_after_builtin_ones() {
    let (mut session, conn, _) = connected_session(SyncConfig::default());
    session
        .router_mut()
        .on("question_created", |_, frame: &Frame| {
            Err(SyncError::Handler {
                kind: frame.kind.clone(),
                message: "audit sink offline".to_string(),
            })
        })
        .on("question_created", |_, _: &Frame| -> trivia_live_sync::Result<()> {
            panic!("broken plugin")
        });

    let outcome = session.handle(conn.message(&question_created(1, "q")));
    assert_eq!(outcome, Some(RouteOutcome::Dispatched { handled: 3, failed: 2 }));
    assert_eq!(session.questions().len(), 1);

    // later frames still dispatch
    session.handle(conn.message(&question_deleted(1)));
    assert!(session.questions().is_empty());
}

#[test]
fn test_sequenced_replays_dropped() {
    let (mut session, conn, _) = connected_session(SyncConfig::default());
    let created = seq_frame("question_created", json!({ "id": 1, "text": "v1" }), 10);
    let updated = seq_frame("question_updated", json!({ "id": 1, "text": "v2" }), 11);

    session.handle(conn.message(&created));
    session.handle(conn.message(&updated));
    // a stale create arriving late must not roll the text back
    assert_eq!(session.handle(conn.message(&created)), Some(RouteOutcome::Duplicate));

    let text = session.questions().iter().next().map(|q| q.text.clone());
    assert_eq!(text.as_deref(), Some("v2"));
}

#[test]
fn test_messages_before_open_are_ignored() {
    let connector = trivia_live_sync::testing::ScriptedConnector::default();
    let config = SyncConfig::default().with_url("ws://127.0.0.1:3001/ws");
    let mut session = trivia_live_sync::LiveSession::new(
        &config,
        connector.clone(),
        trivia_live_sync::testing::ManualScheduler::default(),
    )
    .unwrap();

    assert_eq!(session.handle(connector.message(&question_created(1, "q"))), None);
    assert!(session.questions().is_empty());
    assert!(session.client().last_message().is_none());
}
