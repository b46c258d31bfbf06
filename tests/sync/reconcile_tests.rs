//! Question collection reconciliation through a live session

use trivia_live_sync::reconcile::{EntityCollection, EntityEvent};
use trivia_live_sync::{EntityId, Question, RouteOutcome, SyncConfig};

use crate::common::*;

fn texts(session: &ScriptedSession) -> Vec<(EntityId, String)> {
    session
        .questions()
        .iter()
        .map(|q| (q.id.clone(), q.text.clone()))
        .collect()
}

#[test]
fn test_created_then_updated_then_deleted() {
    let (mut session, conn, _) = connected_session(SyncConfig::default());

    session.handle(conn.message(&question_created(5, "Q?")));
    assert_eq!(texts(&session), vec![(EntityId::Int(5), "Q?".to_string())]);

    session.handle(conn.message(&question_created(6, "Other")));
    session.handle(conn.message(&question_updated(5, "Q2?")));
    assert_eq!(
        texts(&session),
        vec![
            (EntityId::Int(6), "Other".to_string()),
            (EntityId::Int(5), "Q2?".to_string()),
        ],
        "update keeps the entry's position"
    );

    session.handle(conn.message(&question_deleted(5)));
    assert!(!session.questions().contains(&EntityId::Int(5)));
    assert_eq!(session.questions().len(), 1);
}

#[test]
fn test_new_questions_go_first() {
    let (mut session, conn, _) = connected_session(SyncConfig::default());
    for id in 1..=3 {
        session.handle(conn.message(&question_created(id, "q")));
    }
    assert_eq!(
        session.questions().ids(),
        vec![EntityId::Int(3), EntityId::Int(2), EntityId::Int(1)]
    );
}

#[test]
fn test_replays_never_duplicate() {
    let (mut session, conn, _) = connected_session(SyncConfig::default());
    session.handle(conn.message(&question_created(5, "Q?")));
    session.handle(conn.message(&question_created(5, "Q?")));
    session.handle(conn.message(&question_updated(5, "Q?")));
    assert_eq!(session.questions().len(), 1);

    session.handle(conn.message(&question_deleted(5)));
    session.handle(conn.message(&question_deleted(5)));
    assert!(session.questions().is_empty());
}

#[test]
fn test_update_for_unknown_question_inserts() {
    let (mut session, conn, _) = connected_session(SyncConfig::default());
    session.handle(conn.message(&question_created(1, "first")));
    session.handle(conn.message(&question_updated(9, "late")));
    assert_eq!(session.questions().ids(), vec![EntityId::Int(9), EntityId::Int(1)]);
}

#[test]
fn test_string_ids_and_extra_fields_survive() {
    let (mut session, conn, _) = connected_session(SyncConfig::default());
    let raw = frame(
        "question_created",
        serde_json::json!({
            "id": "q-77",
            "text": "Largest ocean?",
            "categoryId": 3,
            "answers": ["Pacific", "Atlantic"],
        }),
    );
    session.handle(conn.message(&raw));

    let question = session
        .questions()
        .get(&EntityId::from("q-77"))
        .expect("question inserted");
    assert_eq!(question.category_id, Some(EntityId::Int(3)));
    assert_eq!(question.extra["answers"][0], "Pacific");
}

#[test]
fn test_invalid_question_payload_is_contained() {
    let (mut session, conn, _) = connected_session(SyncConfig::default());
    let outcome = session.handle(conn.message(&frame(
        "question_created",
        serde_json::json!({ "text": "no id" }),
    )));
    assert_eq!(outcome, Some(RouteOutcome::Dispatched { handled: 1, failed: 1 }));
    assert!(session.questions().is_empty());

    // the session keeps working
    session.handle(conn.message(&question_created(1, "ok")));
    assert_eq!(session.questions().len(), 1);
}

#[test]
fn test_seeded_list_reconciles() {
    let connector = trivia_live_sync::testing::ScriptedConnector::default();
    let config = SyncConfig::default().with_url("ws://127.0.0.1:3001/ws");
    let mut session = trivia_live_sync::LiveSession::new(
        &config,
        connector.clone(),
        trivia_live_sync::testing::ManualScheduler::default(),
    )
    .unwrap()
    .with_questions(vec![Question::new(1i64, "a"), Question::new(2i64, "b")]);
    session.handle(connector.opened());

    session.handle(connector.message(&question_updated(2, "b2")));
    session.handle(connector.message(&question_deleted(1)));
    assert_eq!(texts(&session), vec![(EntityId::Int(2), "b2".to_string())]);
}

/// Created/Updated/Deleted for one id, in every order that keeps Created
/// before Updated, with replays of both before the Deleted, leaves no entry.
#[test]
fn test_delete_wins_over_any_replay_pattern() {
    let created = || EntityEvent::Created(Question::new(5i64, "v1"));
    let updated = || EntityEvent::Updated(Question::new(5i64, "v2"));
    let deleted = || EntityEvent::<Question>::Deleted(EntityId::Int(5));

    let patterns: Vec<Vec<EntityEvent<Question>>> = vec![
        vec![created(), updated(), deleted()],
        vec![created(), created(), updated(), deleted()],
        vec![created(), updated(), updated(), created(), deleted()],
        vec![created(), created(), created(), updated(), updated(), deleted()],
        vec![updated(), created(), deleted()],
    ];

    for (i, events) in patterns.into_iter().enumerate() {
        let mut collection = EntityCollection::from_items(vec![Question::new(1i64, "other")]);
        for event in events {
            collection.apply(event);
        }
        assert!(
            !collection.contains(&EntityId::Int(5)),
            "pattern {} left id 5 behind",
            i
        );
        assert_eq!(collection.ids(), vec![EntityId::Int(1)], "pattern {}", i);
    }
}
